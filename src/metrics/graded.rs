// Scorers backed by the generator or the embedder

use std::sync::LazyLock;

use fancy_regex::Regex;

use crate::capability::{Capabilities, CapabilityError, GenerationOptions, cosine_similarity};

static RATING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));

/// Ask the generator how well `answer` is supported by the context
#[inline]
pub async fn llm_faithfulness(
    answer: &str,
    contexts: &[&str],
    capabilities: &Capabilities,
) -> Result<f64, CapabilityError> {
    let prompt = format!(
        "Context:\n{}\n\nAnswer:\n{}\n\nOn a scale from 0 to 1, how completely is every claim \
         in the answer supported by the context? 1 means fully supported, 0 means \
         unsupported or contradicted. Reply with the number only.",
        contexts.join("\n\n"),
        answer
    );
    rate(&prompt, capabilities).await
}

#[inline]
pub async fn llm_relevancy(
    question: &str,
    answer: &str,
    capabilities: &Capabilities,
) -> Result<f64, CapabilityError> {
    let prompt = format!(
        "Question:\n{}\n\nAnswer:\n{}\n\nOn a scale from 0 to 1, how directly does the answer \
         address the question? Reply with the number only.",
        question, answer
    );
    rate(&prompt, capabilities).await
}

#[inline]
pub async fn llm_correctness(
    answer: &str,
    expected: &str,
    capabilities: &Capabilities,
) -> Result<f64, CapabilityError> {
    let prompt = format!(
        "Reference answer:\n{}\n\nCandidate answer:\n{}\n\nOn a scale from 0 to 1, how \
         closely does the candidate match the meaning of the reference? Reply with the \
         number only.",
        expected, answer
    );
    rate(&prompt, capabilities).await
}

/// Cosine similarity of two texts' embeddings, clamped to [0, 1]
#[inline]
pub async fn embedding_similarity(
    a: &str,
    b: &str,
    capabilities: &Capabilities,
) -> Result<f64, CapabilityError> {
    let embeddings = capabilities
        .embed_batch(&[a.to_string(), b.to_string()])
        .await?;
    match embeddings.as_slice() {
        [first, second] => Ok(f64::from(cosine_similarity(first, second)).clamp(0.0, 1.0)),
        _ => Err(CapabilityError::InvalidResponse {
            provider: "embedder".to_string(),
            message: format!("expected 2 embeddings, received {}", embeddings.len()),
        }),
    }
}

async fn rate(prompt: &str, capabilities: &Capabilities) -> Result<f64, CapabilityError> {
    let reply = capabilities
        .complete(prompt, &GenerationOptions::grading())
        .await?;
    parse_rating(&reply).ok_or_else(|| CapabilityError::InvalidResponse {
        provider: "generator".to_string(),
        message: format!("no rating in reply: {:?}", reply.trim()),
    })
}

/// Read the first number of a reply as a 0-1 rating.
///
/// Ratings given out of 10 or as percentages are rescaled.
#[inline]
pub fn parse_rating(reply: &str) -> Option<f64> {
    let number = RATING_REGEX.find(reply).ok()??;
    let value: f64 = number.as_str().parse().ok()?;
    let rating = if value <= 1.0 {
        value
    } else if value <= 10.0 {
        value / 10.0
    } else if value <= 100.0 {
        value / 100.0
    } else {
        return None;
    };
    Some(rating)
}
