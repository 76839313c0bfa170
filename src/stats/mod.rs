// Paired statistical comparison of two chunking strategies


pub mod distribution;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::chunking::ChunkStrategy;
use crate::metrics::{Metric, RagasMetrics};

use distribution::{student_t_quantile, two_sided_p_value};

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
pub const CONFIDENCE: f64 = 0.95;

/// Standard deviations at or below this are treated as zero
const ZERO_SPREAD: f64 = 1e-12;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("Paired comparison needs equal sample counts, got {baseline} and {candidate}")]
    UnpairedSamples { baseline: usize, candidate: usize },
    #[error("No samples to compare")]
    NoSamples,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// At least two paired samples; tests, effect sizes and intervals are available
    Paired,
    /// A single sample per strategy; only the observed difference is reported
    PointEstimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
    Limited,
    PointEstimate,
}

impl fmt::Display for ConfidenceLevel {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Low => write!(f, "Low"),
            Self::Limited => write!(f, "Limited"),
            Self::PointEstimate => write!(f, "Point estimate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Strong,
    Moderate,
    Weak,
    Neutral,
    NotRecommended,
}

/// Samples of one strategy, one entry per question
#[derive(Debug, Clone, Copy)]
pub struct StrategySamples<'a> {
    pub strategy: ChunkStrategy,
    pub samples: &'a [RagasMetrics],
}

/// Paired test results for a single metric; differences are candidate minus baseline.
///
/// `None` marks values that are undefined for the data, such as a t statistic when every
/// paired difference is identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
    pub mean_difference: f64,
    /// Relative change of the mean in percent; 0 when the baseline mean is 0
    pub improvement_percent: f64,
    pub statistic: Option<f64>,
    pub degrees_of_freedom: Option<usize>,
    pub p_value: Option<f64>,
    pub significant: bool,
    /// Cohen's d with the pooled standard deviation of both samples
    pub effect_size: Option<f64>,
    pub confidence_interval: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricImprovement {
    pub metric: Metric,
    pub improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    /// Mean improvement percentage across metrics
    pub overall_improvement: f64,
    pub significant_count: usize,
    pub total_metrics: usize,
    pub best_improvement: Option<MetricImprovement>,
    pub worst_improvement: Option<MetricImprovement>,
    pub recommendation: Recommendation,
    pub recommendation_text: String,
    /// `None` when neither strategy is clearly better
    pub recommended_strategy: Option<ChunkStrategy>,
    pub confidence_level: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalComparison {
    pub baseline: ChunkStrategy,
    pub candidate: ChunkStrategy,
    pub mode: ComparisonMode,
    pub sample_size: usize,
    pub metrics: Vec<MetricComparison>,
    pub summary: ComparisonSummary,
}

impl StatisticalComparison {
    #[inline]
    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Compare two strategies over the same questions.
///
/// With a single pair the result is a point estimate: no statistic, p-value, effect size
/// or interval is reported and nothing is significant.
#[inline]
pub fn compare_paired(
    baseline: StrategySamples<'_>,
    candidate: StrategySamples<'_>,
) -> Result<StatisticalComparison, StatsError> {
    let n = baseline.samples.len();
    if n != candidate.samples.len() {
        return Err(StatsError::UnpairedSamples {
            baseline: n,
            candidate: candidate.samples.len(),
        });
    }
    if n == 0 {
        return Err(StatsError::NoSamples);
    }

    let mode = if n < 2 {
        ComparisonMode::PointEstimate
    } else {
        ComparisonMode::Paired
    };

    let metrics: Vec<MetricComparison> = Metric::ALL
        .into_iter()
        .map(|metric| {
            let a: Vec<f64> = baseline.samples.iter().map(|s| s.get(metric)).collect();
            let b: Vec<f64> = candidate.samples.iter().map(|s| s.get(metric)).collect();
            compare_metric(metric, &a, &b, mode)
        })
        .collect();

    let summary = summarize(&metrics, mode, baseline.strategy, candidate.strategy);
    debug!(
        "Compared {} vs {} over {} samples: {:?}, {} significant",
        baseline.strategy, candidate.strategy, n, summary.recommendation, summary.significant_count
    );

    Ok(StatisticalComparison {
        baseline: baseline.strategy,
        candidate: candidate.strategy,
        mode,
        sample_size: n,
        metrics,
        summary,
    })
}

/// Paired t-test on `candidate - baseline`: `(t, df, two-sided p)`.
///
/// `None` for fewer than two pairs or zero variance of the differences.
#[inline]
pub fn paired_t_test(baseline: &[f64], candidate: &[f64]) -> Option<(f64, usize, f64)> {
    let differences = differences(baseline, candidate);
    let n = differences.len();
    if n < 2 {
        return None;
    }
    let sd = sample_std(&differences)?;
    let t = mean(&differences) / (sd / (n as f64).sqrt());
    if !t.is_finite() {
        return None;
    }
    let df = n - 1;
    Some((t, df, two_sided_p_value(t, df as f64)))
}

/// Cohen's d of `candidate - baseline` using the pooled standard deviation
#[inline]
pub fn cohens_d(baseline: &[f64], candidate: &[f64]) -> Option<f64> {
    let pooled = ((sample_variance(baseline)? + sample_variance(candidate)?) / 2.0).sqrt();
    if pooled <= ZERO_SPREAD {
        return None;
    }
    let d = (mean(candidate) - mean(baseline)) / pooled;
    d.is_finite().then_some(d)
}

/// 95% confidence interval of the mean paired difference
#[inline]
pub fn mean_difference_interval(baseline: &[f64], candidate: &[f64]) -> Option<(f64, f64)> {
    let differences = differences(baseline, candidate);
    let n = differences.len();
    if n < 2 {
        return None;
    }
    let sd = sample_variance(&differences)?.sqrt();
    let critical = student_t_quantile(1.0 - (1.0 - CONFIDENCE) / 2.0, (n - 1) as f64);
    let margin = critical * sd / (n as f64).sqrt();
    let center = mean(&differences);
    Some((center - margin, center + margin))
}

fn compare_metric(
    metric: Metric,
    baseline: &[f64],
    candidate: &[f64],
    mode: ComparisonMode,
) -> MetricComparison {
    let baseline_mean = mean(baseline);
    let candidate_mean = mean(candidate);
    let mean_difference = mean(&differences(baseline, candidate));
    let improvement_percent = if baseline_mean > 0.0 {
        (candidate_mean - baseline_mean) / baseline_mean * 100.0
    } else {
        0.0
    };

    let mut comparison = MetricComparison {
        metric,
        baseline_mean,
        candidate_mean,
        mean_difference,
        improvement_percent,
        statistic: None,
        degrees_of_freedom: None,
        p_value: None,
        significant: false,
        effect_size: None,
        confidence_interval: None,
    };

    if mode == ComparisonMode::PointEstimate {
        return comparison;
    }

    if let Some((t, df, p)) = paired_t_test(baseline, candidate) {
        comparison.statistic = Some(t);
        comparison.p_value = Some(p);
        comparison.significant = p < SIGNIFICANCE_LEVEL;
        comparison.degrees_of_freedom = Some(df);
    }
    comparison.effect_size = cohens_d(baseline, candidate);
    comparison.confidence_interval = mean_difference_interval(baseline, candidate);
    comparison
}

fn summarize(
    metrics: &[MetricComparison],
    mode: ComparisonMode,
    baseline: ChunkStrategy,
    candidate: ChunkStrategy,
) -> ComparisonSummary {
    let total_metrics = metrics.len();
    let overall_improvement = if total_metrics == 0 {
        0.0
    } else {
        metrics.iter().map(|m| m.improvement_percent).sum::<f64>() / total_metrics as f64
    };

    let significant_count = metrics.iter().filter(|m| m.significant).count();
    let significant_gains = metrics
        .iter()
        .filter(|m| m.significant && m.improvement_percent > 0.0)
        .count();

    let improvement = |m: &MetricComparison| MetricImprovement {
        metric: m.metric,
        improvement: m.improvement_percent,
    };
    let best_improvement = metrics
        .iter()
        .reduce(|best, m| {
            if m.improvement_percent > best.improvement_percent {
                m
            } else {
                best
            }
        })
        .map(improvement);
    let worst_improvement = metrics
        .iter()
        .reduce(|worst, m| {
            if m.improvement_percent < worst.improvement_percent {
                m
            } else {
                worst
            }
        })
        .map(improvement);

    let recommendation = recommend(overall_improvement, significant_gains);
    let recommended_strategy = match recommendation {
        Recommendation::Strong | Recommendation::Moderate | Recommendation::Weak => {
            Some(candidate)
        }
        Recommendation::Neutral => None,
        Recommendation::NotRecommended => Some(baseline),
    };

    let confidence_level = match mode {
        ComparisonMode::PointEstimate => ConfidenceLevel::PointEstimate,
        ComparisonMode::Paired => confidence_level(metrics, significant_count),
    };

    ComparisonSummary {
        overall_improvement,
        significant_count,
        total_metrics,
        best_improvement,
        worst_improvement,
        recommendation,
        recommendation_text: recommendation_text(recommendation, baseline, candidate, mode),
        recommended_strategy,
        confidence_level,
    }
}

fn recommend(overall_improvement: f64, significant_gains: usize) -> Recommendation {
    if overall_improvement > 10.0 && significant_gains >= 3 {
        Recommendation::Strong
    } else if overall_improvement > 5.0 && significant_gains >= 2 {
        Recommendation::Moderate
    } else if overall_improvement > 0.0 && significant_gains >= 1 {
        Recommendation::Weak
    } else if overall_improvement > -5.0 {
        Recommendation::Neutral
    } else {
        Recommendation::NotRecommended
    }
}

fn confidence_level(metrics: &[MetricComparison], significant_count: usize) -> ConfidenceLevel {
    let effects: Vec<f64> = metrics
        .iter()
        .filter_map(|m| m.effect_size.map(f64::abs))
        .collect();
    let mean_effect = if effects.is_empty() {
        0.0
    } else {
        mean(&effects)
    };

    if significant_count >= 3 && mean_effect > 0.5 {
        ConfidenceLevel::High
    } else if significant_count >= 2 && mean_effect > 0.2 {
        ConfidenceLevel::Moderate
    } else if significant_count >= 1 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::Limited
    }
}

fn recommendation_text(
    recommendation: Recommendation,
    baseline: ChunkStrategy,
    candidate: ChunkStrategy,
    mode: ComparisonMode,
) -> String {
    let text = match recommendation {
        Recommendation::Strong => format!(
            "Strong recommendation: {} chunking shows significant improvements across \
             multiple metrics.",
            candidate
        ),
        Recommendation::Moderate => format!(
            "Moderate recommendation: {} chunking shows meaningful improvements in key \
             metrics. Validate further before adopting it.",
            candidate
        ),
        Recommendation::Weak => format!(
            "Weak recommendation: {} chunking shows some improvement but the benefit is \
             limited.",
            candidate
        ),
        Recommendation::Neutral => {
            "Neutral: both chunking strategies perform similarly on this document.".to_string()
        }
        Recommendation::NotRecommended => format!(
            "Not recommended: {} chunking performs better on this document.",
            baseline
        ),
    };

    match mode {
        ComparisonMode::Paired => text,
        ComparisonMode::PointEstimate => format!(
            "{} Based on a single question, so this is a point estimate without \
             significance testing.",
            text
        ),
    }
}

fn differences(baseline: &[f64], candidate: &[f64]) -> Vec<f64> {
    baseline
        .iter()
        .zip(candidate)
        .map(|(a, b)| b - a)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance; `None` for fewer than two values
fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

/// Sample standard deviation; `None` when it is zero or undefined
fn sample_std(values: &[f64]) -> Option<f64> {
    let sd = sample_variance(values)?.sqrt();
    (sd > ZERO_SPREAD).then_some(sd)
}
