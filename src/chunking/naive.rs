use tracing::debug;

use super::Chunk;
use super::tokenizer::{Token, tokenize};

/// Split text into fixed-size token windows that overlap by `overlap_tokens`.
///
/// A window is ended at a sentence terminator or blank line in its last half when one
/// exists, otherwise at the last whitespace boundary, otherwise mid-word. The next window
/// starts `overlap_tokens` before the previous end but always at least one token later
/// than the previous start, so the pass terminates for any overlap.
#[inline]
pub fn chunk_naive(text: &str, chunk_size_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    let tokens = tokenize(text);
    let chunk_size = chunk_size_tokens.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < tokens.len() {
        let window_end = (start + chunk_size).min(tokens.len());
        let end = if window_end == tokens.len() {
            window_end
        } else {
            choose_end(text, &tokens, start, window_end)
        };

        let span = (tokens[start].start, tokens[end - 1].end);
        chunks.push(Chunk {
            text: text[span.0..span.1].to_string(),
            index: chunks.len(),
            token_count: end - start,
            char_span: Some(span),
        });

        if end == tokens.len() {
            break;
        }
        start = end.saturating_sub(overlap_tokens).max(start + 1);
    }

    debug!(
        "Naive chunking produced {} chunks from {} tokens (size {}, overlap {})",
        chunks.len(),
        tokens.len(),
        chunk_size,
        overlap_tokens
    );

    chunks
}

/// Pick the exclusive end token index for the window `start..window_end`
fn choose_end(text: &str, tokens: &[Token], start: usize, window_end: usize) -> usize {
    let half = (window_end - start).div_ceil(2);
    let sentence_floor = (start + half).max(start + 1);

    if let Some(end) = (sentence_floor..=window_end)
        .rev()
        .find(|&end| is_sentence_boundary(text, tokens, end))
    {
        return end;
    }

    ((start + 1)..=window_end)
        .rev()
        .find(|&end| !gap_before(text, tokens, end).is_empty())
        .unwrap_or(window_end)
}

/// Text between token `end - 1` and token `end`
fn gap_before<'a>(text: &'a str, tokens: &[Token], end: usize) -> &'a str {
    let gap_end = tokens.get(end).map_or(text.len(), |token| token.start);
    &text[tokens[end - 1].end..gap_end]
}

fn is_sentence_boundary(text: &str, tokens: &[Token], end: usize) -> bool {
    let gap = gap_before(text, tokens, end);
    if gap.matches('\n').count() >= 2 {
        return true;
    }
    let last = &text[tokens[end - 1].start..tokens[end - 1].end];
    matches!(last, "." | "!" | "?") && !gap.is_empty()
}
