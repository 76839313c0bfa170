// Top-K chunk retrieval with interchangeable scoring methods


pub mod tfidf;

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{Capabilities, cosine_similarity};
use crate::chunking::Chunk;

pub use tfidf::{TfIdfIndex, content_terms, terms};

/// Bonus added to the lexical score when the whole query occurs in a chunk
const PHRASE_MATCH_BONUS: f64 = 5.0;
/// Query terms must be longer than this to count lexically
const MIN_LEXICAL_TERM_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalMethod {
    #[serde(rename = "lexical")]
    Lexical,
    #[serde(rename = "tfidf")]
    TfIdf,
    #[serde(rename = "hybrid")]
    Hybrid,
    #[serde(rename = "embedding")]
    Embedding,
    #[serde(rename = "hybrid-embedding")]
    HybridEmbedding,
}

impl RetrievalMethod {
    pub const ALL: [Self; 5] = [
        Self::Lexical,
        Self::TfIdf,
        Self::Hybrid,
        Self::Embedding,
        Self::HybridEmbedding,
    ];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::TfIdf => "tfidf",
            Self::Hybrid => "hybrid",
            Self::Embedding => "embedding",
            Self::HybridEmbedding => "hybrid-embedding",
        }
    }

    #[inline]
    pub const fn needs_embedder(self) -> bool {
        matches!(self, Self::Embedding | Self::HybridEmbedding)
    }
}

impl fmt::Display for RetrievalMethod {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMethod {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "tf-idf" => Ok(Self::TfIdf),
            other => Self::ALL
                .into_iter()
                .find(|method| method.as_str() == other)
                .ok_or_else(|| {
                    format!(
                        "unknown retrieval method '{}' (expected one of: {})",
                        s,
                        Self::ALL.iter().join(", ")
                    )
                }),
        }
    }
}

/// Blend weights for the hybrid methods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalWeights {
    /// Lexical share of `hybrid`; TF-IDF receives the rest
    pub hybrid_lexical: f64,
    /// Embedding share of `hybrid-embedding`; lexical receives the rest
    pub embedding: f64,
}

impl Default for RetrievalWeights {
    #[inline]
    fn default() -> Self {
        Self {
            hybrid_lexical: 0.3,
            embedding: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Ranked chunks for one query, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub requested_method: RetrievalMethod,
    /// Method that produced the scores, after any fallback
    pub method: RetrievalMethod,
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    #[inline]
    pub fn texts(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.chunk.text.as_str()).collect()
    }

    #[inline]
    pub fn fell_back(&self) -> bool {
        self.method != self.requested_method
    }
}

/// Count of query terms (longer than three characters) contained in each chunk, plus a
/// bonus when the full query occurs verbatim. Matching is case-insensitive.
#[inline]
pub fn lexical_scores(query: &str, chunks: &[Chunk]) -> Vec<f64> {
    let phrase = query.trim().to_lowercase();
    let query_terms: Vec<String> = terms(query)
        .into_iter()
        .filter(|term| term.chars().count() > MIN_LEXICAL_TERM_CHARS)
        .unique()
        .collect();

    chunks
        .iter()
        .map(|chunk| {
            let text = chunk.text.to_lowercase();
            let matched = query_terms
                .iter()
                .filter(|term| text.contains(term.as_str()))
                .count() as f64;
            let bonus = if !phrase.is_empty() && text.contains(&phrase) {
                PHRASE_MATCH_BONUS
            } else {
                0.0
            };
            matched + bonus
        })
        .collect()
}

#[inline]
pub fn tfidf_scores(query: &str, chunks: &[Chunk]) -> Vec<f64> {
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    TfIdfIndex::new(&texts).scores(query)
}

/// Weighted blend of max-normalized lexical and TF-IDF scores
#[inline]
pub fn hybrid_scores(query: &str, chunks: &[Chunk], weights: &RetrievalWeights) -> Vec<f64> {
    let lexical = normalize_by_max(lexical_scores(query, chunks));
    let tfidf = normalize_by_max(tfidf_scores(query, chunks));
    lexical
        .into_iter()
        .zip(tfidf)
        .map(|(l, t)| weights.hybrid_lexical * l + (1.0 - weights.hybrid_lexical) * t)
        .collect()
}

/// Rank `chunks` for `query` and return the best `min(top_k, chunks.len())`.
///
/// Embedding-based methods fall back to `hybrid` when the embedder is missing or fails;
/// the effective method is recorded on the result. Equal scores keep chunk order.
#[inline]
pub async fn retrieve(
    query: &str,
    chunks: &[Chunk],
    top_k: usize,
    method: RetrievalMethod,
    weights: &RetrievalWeights,
    capabilities: &Capabilities,
) -> RetrievalResult {
    let chunk_embeddings = if method.needs_embedder() {
        embed_chunks(chunks, capabilities).await
    } else {
        None
    };
    retrieve_with_embeddings(
        query,
        chunks,
        chunk_embeddings.as_deref(),
        top_k,
        method,
        weights,
        capabilities,
    )
    .await
}

/// Embed every chunk of a strategy once, so concurrent queries share the vectors.
///
/// `None` when there is no embedder or the call fails.
#[inline]
pub async fn embed_chunks(
    chunks: &[Chunk],
    capabilities: &Capabilities,
) -> Option<Vec<Vec<f32>>> {
    if !capabilities.has_embedder() {
        return None;
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    match capabilities.embed_batch(&texts).await {
        Ok(embeddings) => Some(embeddings),
        Err(e) => {
            debug!("Chunk embeddings unavailable for retrieval: {}", e);
            None
        }
    }
}

/// [`retrieve`] against chunk embeddings computed by [`embed_chunks`].
///
/// Embedding-based methods fall back to `hybrid` when `chunk_embeddings` is `None` or does
/// not line up with `chunks`.
#[inline]
pub async fn retrieve_with_embeddings(
    query: &str,
    chunks: &[Chunk],
    chunk_embeddings: Option<&[Vec<f32>]>,
    top_k: usize,
    method: RetrievalMethod,
    weights: &RetrievalWeights,
    capabilities: &Capabilities,
) -> RetrievalResult {
    let (effective, scores) = match method {
        RetrievalMethod::Lexical => (method, lexical_scores(query, chunks)),
        RetrievalMethod::TfIdf => (method, tfidf_scores(query, chunks)),
        RetrievalMethod::Hybrid => (method, hybrid_scores(query, chunks, weights)),
        RetrievalMethod::Embedding | RetrievalMethod::HybridEmbedding => {
            match embedding_scores(query, chunks, chunk_embeddings, capabilities).await {
                Some(similarities) if method == RetrievalMethod::Embedding => {
                    (method, similarities)
                }
                Some(similarities) => {
                    let lexical = normalize_by_max(lexical_scores(query, chunks));
                    let blended = similarities
                        .into_iter()
                        .zip(lexical)
                        .map(|(e, l)| weights.embedding * e + (1.0 - weights.embedding) * l)
                        .collect();
                    (method, blended)
                }
                None => {
                    debug!("{} retrieval falling back to hybrid", method);
                    (
                        RetrievalMethod::Hybrid,
                        hybrid_scores(query, chunks, weights),
                    )
                }
            }
        }
    };

    let hits = chunks
        .iter()
        .zip(scores)
        .sorted_by(|(_, a), (_, b)| b.total_cmp(a))
        .take(top_k)
        .map(|(chunk, score)| ScoredChunk {
            chunk: chunk.clone(),
            score,
        })
        .collect();

    RetrievalResult {
        requested_method: method,
        method: effective,
        hits,
    }
}

async fn embedding_scores(
    query: &str,
    chunks: &[Chunk],
    chunk_embeddings: Option<&[Vec<f32>]>,
    capabilities: &Capabilities,
) -> Option<Vec<f64>> {
    let chunk_embeddings = chunk_embeddings.filter(|e| e.len() == chunks.len())?;
    let query_embedding = capabilities.embed(query).await.ok()?;

    Some(
        chunk_embeddings
            .iter()
            .map(|embedding| f64::from(cosine_similarity(&query_embedding, embedding)))
            .collect(),
    )
}

/// Divide by the maximum; all zeros when the maximum is not positive
fn normalize_by_max(scores: Vec<f64>) -> Vec<f64> {
    let max = scores.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.into_iter().map(|s| s / max).collect()
}
