use fancy_regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

// Terminal punctuation followed by whitespace or the end of text, or a blank line with
// either line ending
static SENTENCE_BOUNDARY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+(?=\s|$)|\r?\n[ \t\r]*\n").expect("valid regex"));

/// Split text into sentences, returning trimmed byte ranges into `text`.
///
/// The last sentence does not need a terminator.
#[inline]
pub fn split_sentences(text: &str) -> Vec<Range<usize>> {
    let mut sentences = Vec::new();
    let mut cursor = 0;

    for boundary in SENTENCE_BOUNDARY_REGEX.find_iter(text).flatten() {
        push_trimmed(text, cursor..boundary.end(), &mut sentences);
        cursor = boundary.end();
    }
    push_trimmed(text, cursor..text.len(), &mut sentences);

    sentences
}

/// Sentence texts, in document order
#[inline]
pub fn sentence_texts(text: &str) -> Vec<&str> {
    split_sentences(text)
        .into_iter()
        .map(|range| &text[range])
        .collect()
}

fn push_trimmed(text: &str, range: Range<usize>, sentences: &mut Vec<Range<usize>>) {
    let segment = &text[range.clone()];
    let trimmed_start = segment.len() - segment.trim_start().len();
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = range.start + trimmed_start;
    sentences.push(start..start + trimmed.len());
}
