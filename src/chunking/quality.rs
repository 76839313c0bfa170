use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Chunk;
use super::sentences::{sentence_texts, split_sentences};
use super::tokenizer::estimate_token_count;
use crate::capability::{Capabilities, cosine_similarity};

/// How a coherence score was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceMethod {
    /// Mean pairwise cosine similarity of the sentences inside each chunk
    SentenceSimilarity,
    /// `1 - variance / mean²` of chunk lengths
    LengthConsistency,
}

/// Size and coherence statistics for one chunk sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkQuality {
    pub total_chunks: usize,
    /// Mean chunk length in tokens
    pub avg_chunk_length: f64,
    /// Population variance of chunk lengths
    pub length_variance: f64,
    pub length_std: f64,
    pub coherence_score: f64,
    pub coherence_method: CoherenceMethod,
}

/// Naive vs semantic quality deltas; positive values favour semantic chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityComparison {
    pub coherence_improvement: f64,
    /// Reduction of length variance, in percent
    pub consistency_improvement: f64,
    pub chunks_difference: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub total_tokens: usize,
    pub total_sentences: usize,
}

impl DocumentInfo {
    #[inline]
    pub fn from_text(text: &str) -> Self {
        Self {
            total_tokens: estimate_token_count(text),
            total_sentences: split_sentences(text).len(),
        }
    }
}

impl QualityComparison {
    #[inline]
    pub fn between(naive: &ChunkQuality, semantic: &ChunkQuality) -> Self {
        let coherence_improvement = if naive.coherence_score > 0.0 {
            (semantic.coherence_score - naive.coherence_score) / naive.coherence_score * 100.0
        } else {
            0.0
        };
        let consistency_improvement = if naive.length_variance > 0.0 {
            (naive.length_variance - semantic.length_variance) / naive.length_variance * 100.0
        } else {
            0.0
        };

        Self {
            coherence_improvement,
            consistency_improvement,
            chunks_difference: semantic.total_chunks as i64 - naive.total_chunks as i64,
        }
    }
}

/// Compute length statistics and coherence for a chunk sequence.
///
/// Coherence uses sentence embeddings when an embedder is attached and answers, and the
/// length-consistency score otherwise.
#[inline]
pub async fn assess_quality(chunks: &[Chunk], capabilities: &Capabilities) -> ChunkQuality {
    if chunks.is_empty() {
        return ChunkQuality {
            total_chunks: 0,
            avg_chunk_length: 0.0,
            length_variance: 0.0,
            length_std: 0.0,
            coherence_score: 0.0,
            coherence_method: CoherenceMethod::LengthConsistency,
        };
    }

    let lengths: Vec<f64> = chunks.iter().map(|c| c.token_count as f64).collect();
    let count = lengths.len() as f64;
    let avg = lengths.iter().sum::<f64>() / count;
    let variance = lengths.iter().map(|l| (l - avg).powi(2)).sum::<f64>() / count;

    let (coherence_score, coherence_method) = match sentence_coherence(chunks, capabilities).await
    {
        Some(score) => (score, CoherenceMethod::SentenceSimilarity),
        None => (
            length_consistency(avg, variance),
            CoherenceMethod::LengthConsistency,
        ),
    };

    ChunkQuality {
        total_chunks: chunks.len(),
        avg_chunk_length: avg,
        length_variance: variance,
        length_std: variance.sqrt(),
        coherence_score,
        coherence_method,
    }
}

fn length_consistency(avg: f64, variance: f64) -> f64 {
    if avg <= 0.0 {
        return 0.0;
    }
    (1.0 - variance / (avg * avg)).clamp(0.0, 1.0)
}

async fn sentence_coherence(chunks: &[Chunk], capabilities: &Capabilities) -> Option<f64> {
    if !capabilities.has_embedder() {
        return None;
    }

    let per_chunk: Vec<Vec<String>> = chunks
        .iter()
        .map(|chunk| {
            sentence_texts(&chunk.text)
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .collect();
    let all_sentences: Vec<String> = per_chunk.iter().flatten().cloned().collect();
    let embeddings = capabilities.embed_batch(&all_sentences).await.ok()?;

    let mut offset = 0;
    let mut total = 0.0;
    for sentences in &per_chunk {
        let vectors = &embeddings[offset..offset + sentences.len()];
        offset += sentences.len();
        total += chunk_coherence(vectors);
    }

    let score = (total / per_chunk.len() as f64).clamp(0.0, 1.0);
    debug!("Sentence coherence over {} chunks: {:.3}", chunks.len(), score);
    Some(score)
}

/// Mean pairwise cosine similarity; a chunk with fewer than two sentences is fully coherent
fn chunk_coherence(vectors: &[Vec<f32>]) -> f64 {
    if vectors.len() < 2 {
        return 1.0;
    }

    let mut sum = 0.0;
    let mut pairs: u32 = 0;
    for (i, a) in vectors.iter().enumerate() {
        for b in &vectors[i + 1..] {
            sum += f64::from(cosine_similarity(a, b));
            pairs += 1;
        }
    }
    (sum / f64::from(pairs)).clamp(0.0, 1.0)
}
