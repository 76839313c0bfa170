use tracing::{debug, info};

use super::Chunk;
use super::sentences::split_sentences;
use super::tokenizer::estimate_token_count;
use crate::capability::{Capabilities, cosine_similarity};

/// Output of a semantic chunking pass
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticChunks {
    pub chunks: Vec<Chunk>,
    /// False when sentence embeddings were unavailable and only size bounds applied
    pub used_similarity: bool,
}

/// Group consecutive sentences into chunks, splitting where adjacent sentences diverge.
///
/// The open chunk is closed before a sentence when adding it would exceed `max_tokens` or
/// when its cosine similarity to the previous sentence is below `similarity_threshold`,
/// but never before the open chunk holds `min_tokens`. The last chunk may be shorter.
/// Without sentence embeddings only the size bounds are applied.
#[inline]
pub async fn chunk_semantic(
    text: &str,
    similarity_threshold: f32,
    min_tokens: usize,
    max_tokens: usize,
    capabilities: &Capabilities,
) -> SemanticChunks {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return SemanticChunks {
            chunks: Vec::new(),
            used_similarity: false,
        };
    }

    let embeddings = if capabilities.has_embedder() {
        let sentence_texts: Vec<String> = sentences
            .iter()
            .map(|range| text[range.clone()].to_string())
            .collect();
        capabilities.embed_batch(&sentence_texts).await.ok()
    } else {
        None
    };

    if embeddings.is_none() {
        info!("Sentence embeddings unavailable, semantic chunking uses size bounds only");
    }

    let mut chunks = Vec::new();
    let mut open: Option<(usize, usize)> = None;
    let mut open_tokens = 0;

    for (i, range) in sentences.iter().enumerate() {
        let sentence_tokens = estimate_token_count(&text[range.clone()]);

        if let Some((open_start, open_end)) = open {
            let exceeds_max = open_tokens + sentence_tokens > max_tokens;
            let diverges = embeddings.as_ref().is_some_and(|vectors| {
                cosine_similarity(&vectors[i - 1], &vectors[i]) < similarity_threshold
            });

            if (exceeds_max || diverges) && open_tokens >= min_tokens {
                push_chunk(text, &mut chunks, open_start, open_end, open_tokens);
                open = None;
                open_tokens = 0;
            }
        }

        open = Some(match open {
            Some((open_start, _)) => (open_start, range.end),
            None => (range.start, range.end),
        });
        open_tokens += sentence_tokens;
    }

    if let Some((open_start, open_end)) = open {
        push_chunk(text, &mut chunks, open_start, open_end, open_tokens);
    }

    debug!(
        "Semantic chunking grouped {} sentences into {} chunks",
        sentences.len(),
        chunks.len()
    );

    SemanticChunks {
        chunks,
        used_similarity: embeddings.is_some(),
    }
}

fn push_chunk(text: &str, chunks: &mut Vec<Chunk>, start: usize, end: usize, token_count: usize) {
    chunks.push(Chunk {
        text: text[start..end].to_string(),
        index: chunks.len(),
        token_count,
        char_span: Some((start, end)),
    });
}
