// Answer simulation over retrieved context

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::{Capabilities, GenerationOptions};
use crate::chunking::sentence_texts;
use crate::retrieval::content_terms;

/// Returned by the extractive path when no retrieved sentence shares a term with the question
pub const NO_ANSWER_FOUND: &str = "No relevant answer found in the retrieved context.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Produced by the generator from the retrieved context
    Generated,
    /// Best-matching retrieved sentence
    Extractive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub source: AnswerSource,
}

/// Answer `question` from the retrieved chunk texts.
///
/// Uses the generator with a grounded prompt when one is attached; a missing generator, a
/// failed call or an empty reply falls back to [`extractive_answer`].
#[inline]
pub async fn generate_answer(
    question: &str,
    retrieved: &[&str],
    capabilities: &Capabilities,
) -> GeneratedAnswer {
    if capabilities.has_generator() && !retrieved.is_empty() {
        let prompt = grounded_prompt(question, retrieved);
        if let Ok(reply) = capabilities
            .complete(&prompt, &GenerationOptions::grounded())
            .await
        {
            let text = reply.trim();
            if !text.is_empty() {
                return GeneratedAnswer {
                    text: text.to_string(),
                    source: AnswerSource::Generated,
                };
            }
            debug!("Generator returned an empty answer, using extractive fallback");
        }
    }

    GeneratedAnswer {
        text: extractive_answer(question, retrieved),
        source: AnswerSource::Extractive,
    }
}

/// Pick the retrieved sentence sharing the most terms (longer than three characters) with
/// the question. Ties go to the earliest sentence.
#[inline]
pub fn extractive_answer(question: &str, retrieved: &[&str]) -> String {
    let question_terms = content_terms(question);
    let mut best: Option<(usize, &str)> = None;

    for sentence in retrieved.iter().flat_map(|text| sentence_texts(text)) {
        let shared = content_terms(sentence)
            .intersection(&question_terms)
            .count();
        if shared > 0 && best.is_none_or(|(score, _)| shared > score) {
            best = Some((shared, sentence));
        }
    }

    best.map_or_else(|| NO_ANSWER_FOUND.to_string(), |(_, s)| s.to_string())
}

fn grounded_prompt(question: &str, retrieved: &[&str]) -> String {
    format!(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say so briefly.\n\n\
         Context:\n{}\n\nQuestion: {}\nAnswer:",
        retrieved.join("\n\n"),
        question
    )
}
