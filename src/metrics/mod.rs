// RAGAS metric battery: faithfulness, answer relevancy, context precision,
// context recall and answer correctness

#[cfg(test)]
mod tests;

pub mod graded;
pub mod heuristics;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{Capabilities, CapabilityError};

pub use graded::{
    embedding_similarity, llm_correctness, llm_faithfulness, llm_relevancy, parse_rating,
};
pub use heuristics::{
    context_precision, context_recall, heuristic_faithfulness, keyword_relevancy, term_f1,
};

/// Where a score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Llm,
    Embedding,
    /// Exact computation that needs no capability
    Computed,
    /// Deterministic estimate standing in for a capability-backed score
    Heuristic,
}

/// A metric value in [0, 1] together with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub source: ScoreSource,
}

impl Score {
    /// Clamp into [0, 1]; NaN becomes 0
    #[inline]
    pub fn new(value: f64, source: ScoreSource) -> Self {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        Self { value, source }
    }

    #[inline]
    pub fn is_simulated(&self) -> bool {
        self.source == ScoreSource::Heuristic
    }

    /// Use a capability-backed value, or the heuristic when the capability failed
    #[inline]
    pub fn or_heuristic(
        result: Result<f64, CapabilityError>,
        source: ScoreSource,
        heuristic: impl FnOnce() -> f64,
    ) -> Self {
        match result {
            Ok(value) => Self::new(value, source),
            Err(e) => {
                debug!("Using heuristic score: {}", e);
                Self::new(heuristic(), ScoreSource::Heuristic)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Faithfulness,
    AnswerRelevancy,
    ContextPrecision,
    ContextRecall,
    AnswerCorrectness,
}

impl Metric {
    pub const ALL: [Self; 5] = [
        Self::Faithfulness,
        Self::AnswerRelevancy,
        Self::ContextPrecision,
        Self::ContextRecall,
        Self::AnswerCorrectness,
    ];

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Faithfulness => "faithfulness",
            Self::AnswerRelevancy => "answer_relevancy",
            Self::ContextPrecision => "context_precision",
            Self::ContextRecall => "context_recall",
            Self::AnswerCorrectness => "answer_correctness",
        }
    }
}

impl fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Five metric values, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RagasMetrics {
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub context_precision: f64,
    pub context_recall: f64,
    pub answer_correctness: f64,
}

impl RagasMetrics {
    #[inline]
    pub const fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Faithfulness => self.faithfulness,
            Metric::AnswerRelevancy => self.answer_relevancy,
            Metric::ContextPrecision => self.context_precision,
            Metric::ContextRecall => self.context_recall,
            Metric::AnswerCorrectness => self.answer_correctness,
        }
    }

    /// Unweighted mean of the five metrics
    #[inline]
    pub fn overall(&self) -> f64 {
        Metric::ALL.iter().map(|m| self.get(*m)).sum::<f64>() / Metric::ALL.len() as f64
    }
}

/// Per-question scores with their sources
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionScores {
    pub faithfulness: Score,
    pub answer_relevancy: Score,
    pub context_precision: Score,
    pub context_recall: Score,
    pub answer_correctness: Score,
}

impl QuestionScores {
    #[inline]
    pub const fn get(&self, metric: Metric) -> Score {
        match metric {
            Metric::Faithfulness => self.faithfulness,
            Metric::AnswerRelevancy => self.answer_relevancy,
            Metric::ContextPrecision => self.context_precision,
            Metric::ContextRecall => self.context_recall,
            Metric::AnswerCorrectness => self.answer_correctness,
        }
    }

    #[inline]
    pub const fn values(&self) -> RagasMetrics {
        RagasMetrics {
            faithfulness: self.faithfulness.value,
            answer_relevancy: self.answer_relevancy.value,
            context_precision: self.context_precision.value,
            context_recall: self.context_recall.value,
            answer_correctness: self.answer_correctness.value,
        }
    }

    /// True when any metric fell back to a heuristic estimate
    #[inline]
    pub fn is_simulated(&self) -> bool {
        Metric::ALL.iter().any(|m| self.get(*m).is_simulated())
    }
}

/// Everything the battery needs to score one question against one chunk set
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub expected_answer: &'a str,
    pub source_context: &'a [String],
    /// Retrieved chunk texts, best first
    pub retrieved: &'a [&'a str],
}

#[inline]
pub async fn faithfulness(
    answer: &str,
    contexts: &[&str],
    capabilities: &Capabilities,
) -> Score {
    let result = if capabilities.has_generator() {
        llm_faithfulness(answer, contexts, capabilities).await
    } else {
        Err(CapabilityError::Unavailable("generator"))
    };
    Score::or_heuristic(result, ScoreSource::Llm, || {
        heuristic_faithfulness(answer, contexts)
    })
}

/// LLM rating, else embedding cosine of question and answer, else keyword overlap
#[inline]
pub async fn answer_relevancy(question: &str, answer: &str, capabilities: &Capabilities) -> Score {
    if capabilities.has_generator() {
        if let Ok(value) = llm_relevancy(question, answer, capabilities).await {
            return Score::new(value, ScoreSource::Llm);
        }
    }
    let result = if capabilities.has_embedder() {
        embedding_similarity(question, answer, capabilities).await
    } else {
        Err(CapabilityError::Unavailable("embedder"))
    };
    Score::or_heuristic(result, ScoreSource::Embedding, || {
        keyword_relevancy(question, answer)
    })
}

/// `0.5 * F1 + 0.5 * semantic`, semantic being embedding cosine, else an LLM rating,
/// else the F1 itself
#[inline]
pub async fn answer_correctness(
    answer: &str,
    expected: &str,
    capabilities: &Capabilities,
) -> Score {
    let f1 = term_f1(answer, expected);

    if capabilities.has_embedder() {
        if let Ok(semantic) = embedding_similarity(answer, expected, capabilities).await {
            return Score::new(0.5 * f1 + 0.5 * semantic, ScoreSource::Embedding);
        }
    }
    let result = if capabilities.has_generator() {
        llm_correctness(answer, expected, capabilities).await
    } else {
        Err(CapabilityError::Unavailable("generator"))
    };
    match result {
        Ok(semantic) => Score::new(0.5 * f1 + 0.5 * semantic, ScoreSource::Llm),
        Err(_) => Score::new(f1, ScoreSource::Heuristic),
    }
}

/// Score one question with all five metrics
#[inline]
pub async fn evaluate_question(
    input: EvaluationInput<'_>,
    capabilities: &Capabilities,
) -> QuestionScores {
    let (faithfulness, answer_relevancy, answer_correctness) = tokio::join!(
        faithfulness(input.answer, input.retrieved, capabilities),
        answer_relevancy(input.question, input.answer, capabilities),
        answer_correctness(input.answer, input.expected_answer, capabilities),
    );

    QuestionScores {
        faithfulness,
        answer_relevancy,
        context_precision: Score::new(
            context_precision(input.retrieved, input.source_context),
            ScoreSource::Computed,
        ),
        context_recall: Score::new(
            context_recall(input.retrieved, input.source_context),
            ScoreSource::Computed,
        ),
        answer_correctness,
    }
}

/// Arithmetic mean of every metric; all zeros for no questions
#[inline]
pub fn aggregate(scores: &[QuestionScores]) -> RagasMetrics {
    if scores.is_empty() {
        return RagasMetrics::default();
    }
    let count = scores.len() as f64;
    let mean = |metric: Metric| scores.iter().map(|s| s.get(metric).value).sum::<f64>() / count;

    RagasMetrics {
        faithfulness: mean(Metric::Faithfulness),
        answer_relevancy: mean(Metric::AnswerRelevancy),
        context_precision: mean(Metric::ContextPrecision),
        context_recall: mean(Metric::ContextRecall),
        answer_correctness: mean(Metric::AnswerCorrectness),
    }
}
