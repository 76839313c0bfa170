// End-to-end naive vs semantic comparison of one document


use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::answer::{GeneratedAnswer, generate_answer};
use crate::capability::{Capabilities, CapabilityMode};
use crate::chunking::{
    Chunk, ChunkQuality, ChunkStrategy, DocumentInfo, QualityComparison, assess_quality,
    chunk_naive, chunk_semantic,
};
use crate::config::ComparisonConfig;
use crate::metrics::{EvaluationInput, QuestionScores, RagasMetrics, aggregate, evaluate_question};
use crate::questions::{TestQuestion, generate_questions};
use crate::retrieval::{
    RetrievalMethod, RetrievalWeights, embed_chunks, retrieve_with_embeddings,
};
use crate::stats::{StatisticalComparison, StrategySamples, compare_paired};
use crate::{EvalError, Result};

/// An input document; immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub title: Option<String>,
    pub mime_type: Option<String>,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            mime_type: None,
        }
    }

    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[inline]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub title: Option<String>,
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub info: DocumentInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub index: usize,
    pub score: f64,
}

/// Everything that happened to one question under one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvaluation {
    /// Position in [`ComparisonReport::questions`]
    pub question_index: usize,
    pub retrieval_method: RetrievalMethod,
    pub retrieved: Vec<RetrievedChunk>,
    pub answer: GeneratedAnswer,
    pub scores: QuestionScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub strategy: ChunkStrategy,
    pub chunks: Vec<Chunk>,
    pub quality: ChunkQuality,
    pub metrics: RagasMetrics,
    pub overall_score: f64,
    pub evaluations: Vec<QuestionEvaluation>,
    /// Questions whose retrieval fell back to `hybrid`
    pub retrieval_fallbacks: usize,
}

impl StrategyReport {
    #[inline]
    pub fn samples(&self) -> Vec<RagasMetrics> {
        self.evaluations.iter().map(|e| e.scores.values()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub config: ComparisonConfig,
    pub capability_mode: CapabilityMode,
    /// True when any reported score came from a heuristic instead of a model
    pub simulated: bool,
    pub capability_fallbacks: usize,
    pub document: DocumentSummary,
    /// Shared by both strategies, so the evaluation is paired
    pub questions: Vec<TestQuestion>,
    pub naive: StrategyReport,
    pub semantic: StrategyReport,
    pub quality_comparison: QualityComparison,
    pub statistics: StatisticalComparison,
}

/// Compare naive and semantic chunking on `document_text`.
///
/// Only invalid input and invalid configuration are errors; capability failures fall back
/// locally and show up in [`ComparisonReport::capability_mode`] and
/// [`ComparisonReport::simulated`].
#[inline]
pub async fn compare(
    document_text: &str,
    config: &ComparisonConfig,
    capabilities: &Capabilities,
) -> Result<ComparisonReport> {
    compare_document(&Document::new(document_text), config, capabilities).await
}

/// [`compare`] for a document with metadata
#[inline]
pub async fn compare_document(
    document: &Document,
    config: &ComparisonConfig,
    capabilities: &Capabilities,
) -> Result<ComparisonReport> {
    let text = document.text.as_str();
    if text.trim().is_empty() {
        return Err(EvalError::InvalidInput(
            "document text is empty".to_string(),
        ));
    }
    config.validate()?;

    let run_id = Uuid::new_v4();
    info!(
        "Starting comparison run {} ({} retrieval, top {}, capabilities: {})",
        run_id,
        config.retrieval_method,
        config.top_k,
        capabilities.mode()
    );

    let questions = generate_questions(
        text,
        config.num_questions,
        config.concurrency,
        capabilities,
    )
    .await;
    if questions.is_empty() {
        return Err(EvalError::InvalidInput(
            "document yields no test questions".to_string(),
        ));
    }

    let (naive_chunks, semantic) = tokio::join!(
        async { chunk_naive(text, config.chunk_size_tokens, config.overlap_tokens) },
        chunk_semantic(
            text,
            config.similarity_threshold,
            config.min_tokens,
            config.max_tokens,
            capabilities,
        ),
    );
    info!(
        "Chunked document into {} naive and {} semantic chunks",
        naive_chunks.len(),
        semantic.chunks.len()
    );
    if !semantic.used_similarity {
        warn!("Semantic chunking ran without sentence similarity");
    }

    let (naive, semantic) = tokio::join!(
        evaluate_strategy(
            ChunkStrategy::Naive,
            naive_chunks,
            &questions,
            config,
            capabilities
        ),
        evaluate_strategy(
            ChunkStrategy::Semantic,
            semantic.chunks,
            &questions,
            config,
            capabilities
        ),
    );

    let naive_samples = naive.samples();
    let semantic_samples = semantic.samples();
    let statistics = compare_paired(
        StrategySamples {
            strategy: ChunkStrategy::Naive,
            samples: &naive_samples,
        },
        StrategySamples {
            strategy: ChunkStrategy::Semantic,
            samples: &semantic_samples,
        },
    )
    .map_err(|e| EvalError::InvalidInput(e.to_string()))?;

    let simulated = naive
        .evaluations
        .iter()
        .chain(&semantic.evaluations)
        .any(|e| e.scores.is_simulated());

    let report = ComparisonReport {
        run_id,
        generated_at: Utc::now(),
        config: config.clone(),
        capability_mode: capabilities.mode(),
        simulated,
        capability_fallbacks: capabilities.fallback_count(),
        document: DocumentSummary {
            title: document.title.clone(),
            mime_type: document.mime_type.clone(),
            info: DocumentInfo::from_text(text),
        },
        questions,
        quality_comparison: QualityComparison::between(&naive.quality, &semantic.quality),
        naive,
        semantic,
        statistics,
    };

    info!(
        "Finished run {}: {:?} (overall {:+.1}%, mode {}, simulated: {})",
        report.run_id,
        report.statistics.summary.recommendation,
        report.statistics.summary.overall_improvement,
        report.capability_mode,
        report.simulated
    );
    Ok(report)
}

async fn evaluate_strategy(
    strategy: ChunkStrategy,
    chunks: Vec<Chunk>,
    questions: &[TestQuestion],
    config: &ComparisonConfig,
    capabilities: &Capabilities,
) -> StrategyReport {
    let weights = RetrievalWeights {
        hybrid_lexical: config.hybrid_lexical_weight,
        embedding: config.embedding_weight,
    };

    let chunk_embeddings = if config.retrieval_method.needs_embedder() {
        embed_chunks(&chunks, capabilities).await
    } else {
        None
    };

    let evaluations_future = stream::iter(questions.iter().enumerate())
        .map(|(index, question)| {
            evaluate_single(
                index,
                question,
                &chunks,
                chunk_embeddings.as_deref(),
                config,
                &weights,
                capabilities,
            )
        })
        .buffered(config.concurrency.max(1))
        .collect::<Vec<_>>();
    let (quality, evaluations) =
        tokio::join!(assess_quality(&chunks, capabilities), evaluations_future);

    let retrieval_fallbacks = evaluations
        .iter()
        .filter(|e| e.retrieval_method != config.retrieval_method)
        .count();
    let scores: Vec<QuestionScores> = evaluations.iter().map(|e| e.scores).collect();
    let metrics = aggregate(&scores);

    debug!(
        "{} strategy: {} chunks, overall score {:.3}",
        strategy,
        chunks.len(),
        metrics.overall()
    );

    StrategyReport {
        strategy,
        chunks,
        quality,
        overall_score: metrics.overall(),
        metrics,
        evaluations,
        retrieval_fallbacks,
    }
}

async fn evaluate_single(
    question_index: usize,
    question: &TestQuestion,
    chunks: &[Chunk],
    chunk_embeddings: Option<&[Vec<f32>]>,
    config: &ComparisonConfig,
    weights: &RetrievalWeights,
    capabilities: &Capabilities,
) -> QuestionEvaluation {
    let retrieval = retrieve_with_embeddings(
        &question.question,
        chunks,
        chunk_embeddings,
        config.top_k,
        config.retrieval_method,
        weights,
        capabilities,
    )
    .await;
    let retrieved = retrieval.texts();

    let answer = generate_answer(&question.question, &retrieved, capabilities).await;
    let scores = evaluate_question(
        EvaluationInput {
            question: &question.question,
            answer: &answer.text,
            expected_answer: &question.expected_answer,
            source_context: &question.source_context,
            retrieved: &retrieved,
        },
        capabilities,
    )
    .await;

    QuestionEvaluation {
        question_index,
        retrieval_method: retrieval.method,
        retrieved: retrieval
            .hits
            .iter()
            .map(|hit| RetrievedChunk {
                index: hit.chunk.index,
                score: hit.score,
            })
            .collect(),
        answer,
        scores,
    }
}
