// Document chunking: fixed-size token windows and similarity-grouped sentences


pub mod naive;
pub mod quality;
pub mod semantic;
pub mod sentences;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use naive::chunk_naive;
pub use quality::{ChunkQuality, CoherenceMethod, DocumentInfo, QualityComparison, assess_quality};
pub use semantic::{SemanticChunks, chunk_semantic};
pub use sentences::{sentence_texts, split_sentences};
pub use tokenizer::{Token, estimate_token_count, tokenize};

/// A contiguous piece of a document produced by one chunking strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Position of this chunk within its strategy's sequence
    pub index: usize,
    pub token_count: usize,
    /// Byte offsets of `text` in the source document
    pub char_span: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Naive,
    Semantic,
}

impl fmt::Display for ChunkStrategy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive => write!(f, "naive"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}
