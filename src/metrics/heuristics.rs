// Capability-free scorers. Precision and recall are exact computations; the others are
// deterministic estimates reported with `ScoreSource::Heuristic`.

use std::collections::HashSet;
use std::sync::LazyLock;

use fancy_regex::Regex;

use crate::retrieval::{content_terms, terms};

/// Share of a statement's content words that must occur in the context
const SUPPORT_THRESHOLD: f64 = 0.6;

static STATEMENT_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]+").expect("valid regex"));

const STATEMENT_STOPWORDS: &[&str] = &["this", "that", "these", "those", "with", "from"];
const QUESTION_STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "what", "how", "why", "when", "where", "which",
    "who", "does", "did", "do", "of", "to", "in", "on", "for", "about", "can", "you", "tell", "me",
];

/// Clauses of `text` separated by sentence punctuation or semicolons
#[inline]
pub fn extract_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut cursor = 0;
    for boundary in STATEMENT_SPLIT_REGEX.find_iter(text).flatten() {
        statements.push(text[cursor..boundary.start()].trim().to_string());
        cursor = boundary.end();
    }
    statements.push(text[cursor..].trim().to_string());
    statements.retain(|s| !s.is_empty());
    statements
}

/// Share of answer statements whose content words are mostly present in the context
#[inline]
pub fn heuristic_faithfulness(answer: &str, contexts: &[&str]) -> f64 {
    if answer.trim().is_empty() || contexts.is_empty() {
        return 0.0;
    }

    let statements = extract_statements(answer);
    if statements.is_empty() {
        return 1.0;
    }

    let context = contexts.join(" ").to_lowercase();
    let supported = statements
        .iter()
        .filter(|statement| is_statement_supported(statement, &context))
        .count();
    supported as f64 / statements.len() as f64
}

fn is_statement_supported(statement: &str, context_lower: &str) -> bool {
    let key_words: Vec<String> = terms(statement)
        .into_iter()
        .filter(|w| w.chars().count() > 3 && !STATEMENT_STOPWORDS.contains(&w.as_str()))
        .collect();
    if key_words.is_empty() {
        return true;
    }

    let found = key_words
        .iter()
        .filter(|word| context_lower.contains(word.as_str()))
        .count();
    found as f64 >= key_words.len() as f64 * SUPPORT_THRESHOLD
}

/// Share of the question's meaningful words repeated in the answer
#[inline]
pub fn keyword_relevancy(question: &str, answer: &str) -> f64 {
    let question_words: HashSet<String> = terms(question)
        .into_iter()
        .filter(|w| !QUESTION_STOPWORDS.contains(&w.as_str()))
        .collect();
    if question_words.is_empty() {
        return 0.5;
    }
    let answer_words: HashSet<String> = terms(answer).into_iter().collect();
    let overlap = question_words.intersection(&answer_words).count();
    (overlap as f64 / question_words.len() as f64).min(1.0)
}

/// Whether a retrieved text contains a source sentence or lies inside one
fn is_relevant(retrieved_lower: &str, source_lower: &[String]) -> bool {
    let retrieved = retrieved_lower.trim();
    !retrieved.is_empty()
        && source_lower
            .iter()
            .any(|sentence| retrieved.contains(sentence.as_str()) || sentence.contains(retrieved))
}

fn normalized_sources(source_context: &[String]) -> Vec<String> {
    source_context
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Average precision over ranks: the mean of precision@k at every relevant rank.
/// Nothing retrieved, or nothing relevant, scores 0.
#[inline]
pub fn context_precision(retrieved: &[&str], source_context: &[String]) -> f64 {
    let sources = normalized_sources(source_context);
    let mut relevant_so_far: u32 = 0;
    let mut precision_sum = 0.0;

    for (rank, text) in retrieved.iter().enumerate() {
        if is_relevant(&text.to_lowercase(), &sources) {
            relevant_so_far += 1;
            precision_sum += f64::from(relevant_so_far) / (rank + 1) as f64;
        }
    }

    if relevant_so_far == 0 {
        0.0
    } else {
        precision_sum / f64::from(relevant_so_far)
    }
}

/// Share of source sentences found in the concatenated retrieved text.
/// An empty source context is fully recalled.
#[inline]
pub fn context_recall(retrieved: &[&str], source_context: &[String]) -> f64 {
    let sources = normalized_sources(source_context);
    if sources.is_empty() {
        return 1.0;
    }
    let retrieved_text = retrieved.join(" ").to_lowercase();
    let found = sources
        .iter()
        .filter(|sentence| retrieved_text.contains(sentence.as_str()))
        .count();
    found as f64 / sources.len() as f64
}

/// F1 of the content-term sets of `answer` and `expected`
#[inline]
pub fn term_f1(answer: &str, expected: &str) -> f64 {
    let answer_terms = content_terms(answer);
    let expected_terms = content_terms(expected);

    if expected_terms.is_empty() {
        return if answer_terms.is_empty() { 1.0 } else { 0.5 };
    }
    if answer_terms.is_empty() {
        return 0.0;
    }

    let common = answer_terms.intersection(&expected_terms).count() as f64;
    if common == 0.0 {
        return 0.0;
    }
    let precision = common / answer_terms.len() as f64;
    let recall = common / expected_terms.len() as f64;
    2.0 * precision * recall / (precision + recall)
}
