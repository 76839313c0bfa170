use super::*;
use crate::capability::testing::ScriptedGenerator;
use std::sync::Arc;
use std::sync::atomic::Ordering;

const CONTEXT: &[&str] = &[
    "The Amazon rainforest spans nine countries. It produces a large share of the world's oxygen.",
    "Deforestation in the Amazon accelerated during the last decade due to cattle ranching.",
];

#[test]
fn extractive_picks_sentence_with_most_shared_terms() {
    let answer = extractive_answer("Why did deforestation of the Amazon accelerate?", CONTEXT);
    assert_eq!(
        answer,
        "Deforestation in the Amazon accelerated during the last decade due to cattle ranching."
    );
}

#[test]
fn extractive_returns_sentinel_without_overlap() {
    assert_eq!(
        extractive_answer("What is quantum entanglement?", CONTEXT),
        NO_ANSWER_FOUND
    );
    assert_eq!(extractive_answer("Anything?", &[]), NO_ANSWER_FOUND);
}

#[test]
fn extractive_ties_keep_first_sentence() {
    let answer = extractive_answer("amazon", CONTEXT);
    assert_eq!(answer, "The Amazon rainforest spans nine countries.");
}

#[tokio::test]
async fn generator_answer_is_used_when_available() {
    let generator = Arc::new(ScriptedGenerator::new(|prompt: &str| {
        assert!(prompt.contains("Context:"));
        assert!(prompt.contains("cattle ranching"));
        "  Cattle ranching drove it.  ".to_string()
    }));
    let capabilities = Capabilities::none().with_generator(Arc::clone(&generator) as _);

    let answer = generate_answer("Why did deforestation accelerate?", CONTEXT, &capabilities).await;

    assert_eq!(answer.source, AnswerSource::Generated);
    assert_eq!(answer.text, "Cattle ranching drove it.");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_generator_reply_falls_back_to_extraction() {
    let capabilities = Capabilities::none()
        .with_generator(Arc::new(ScriptedGenerator::new(|_: &str| "   ".to_string())));

    let answer = generate_answer("How many countries does the rainforest span?", CONTEXT, &capabilities).await;

    assert_eq!(answer.source, AnswerSource::Extractive);
    assert_eq!(answer.text, "The Amazon rainforest spans nine countries.");
}

#[tokio::test]
async fn no_generator_uses_extraction() {
    let answer = generate_answer("rainforest", CONTEXT, &Capabilities::none()).await;
    assert_eq!(answer.source, AnswerSource::Extractive);
}
