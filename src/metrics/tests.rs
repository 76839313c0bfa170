use super::*;
use crate::capability::testing::{FailingEmbedder, KeywordEmbedder, ScriptedGenerator};
use std::sync::Arc;

const CONTEXT: &[&str] = &["Human activities cause X through sustained emissions."];

fn sources(sentences: &[&str]) -> Vec<String> {
    sentences.iter().map(|s| (*s).to_string()).collect()
}

fn grounding_judge() -> Capabilities {
    Capabilities::none().with_generator(Arc::new(ScriptedGenerator::new(|prompt: &str| {
        if prompt.contains("aliens") {
            "0.05".to_string()
        } else {
            "0.95".to_string()
        }
    })))
}

#[tokio::test]
async fn faithfulness_follows_the_grader() {
    let capabilities = grounding_judge();

    let unfaithful = faithfulness("aliens cause X", CONTEXT, &capabilities).await;
    assert_eq!(unfaithful.source, ScoreSource::Llm);
    assert!(unfaithful.value < 0.1);

    let faithful = faithfulness(
        "Human activities cause X through sustained emissions.",
        CONTEXT,
        &capabilities,
    )
    .await;
    assert!(faithful.value > 0.9);
}

#[tokio::test]
async fn faithfulness_heuristic_without_generator() {
    let capabilities = Capabilities::none();

    let unfaithful = faithfulness("aliens cause X", CONTEXT, &capabilities).await;
    assert_eq!(unfaithful.source, ScoreSource::Heuristic);
    assert!(unfaithful.is_simulated());
    assert_eq!(unfaithful.value, 0.0);

    let faithful = faithfulness(CONTEXT[0], CONTEXT, &capabilities).await;
    assert_eq!(faithful.value, 1.0);
}

#[tokio::test]
async fn unparseable_rating_falls_back_to_heuristic() {
    let capabilities = Capabilities::none().with_generator(Arc::new(ScriptedGenerator::new(
        |_: &str| "I cannot rate this.".to_string(),
    )));

    let score = faithfulness(CONTEXT[0], CONTEXT, &capabilities).await;
    assert_eq!(score.source, ScoreSource::Heuristic);
    assert_eq!(score.value, 1.0);
    assert_eq!(capabilities.fallback_count(), 0);
}

#[test]
fn rating_parsing() {
    assert_eq!(parse_rating("0.8"), Some(0.8));
    assert_eq!(parse_rating("Score: 1"), Some(1.0));
    assert_eq!(parse_rating("8/10"), Some(0.8));
    assert_eq!(parse_rating("75%"), Some(0.75));
    assert_eq!(parse_rating("none"), None);
    assert_eq!(parse_rating("1234"), None);
}

#[test]
fn statements_split_on_punctuation() {
    assert_eq!(
        heuristics::extract_statements("First claim. Second claim; third claim!"),
        vec!["First claim", "Second claim", "third claim"]
    );
    assert!(heuristics::extract_statements(" . ; ").is_empty());
}

#[test]
fn precision_edge_cases() {
    let expected = sources(&["Paris is the capital of France."]);

    assert_eq!(context_precision(&[], &expected), 0.0);
    assert_eq!(
        context_precision(&["Lyon is a city.", "Nice is warm."], &expected),
        0.0
    );
    assert_eq!(
        context_precision(&["Paris is the capital of France. It is large."], &expected),
        1.0
    );
}

#[test]
fn precision_rewards_early_relevant_hits() {
    let expected = sources(&["Paris is the capital of France."]);
    let relevant = "Facts: Paris is the capital of France.";
    let noise = "Berlin has many museums.";

    let early = context_precision(&[relevant, noise, noise], &expected);
    let late = context_precision(&[noise, noise, relevant], &expected);

    assert_eq!(early, 1.0);
    assert!((late - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn recall_edge_cases() {
    let retrieved = ["Paris is the capital of France. Berlin is the capital of Germany."];

    assert_eq!(context_recall(&retrieved, &[]), 1.0);
    assert_eq!(context_recall(&[], &[]), 1.0);
    assert_eq!(
        context_recall(&[], &sources(&["Paris is the capital of France."])),
        0.0
    );
    let half = context_recall(
        &retrieved,
        &sources(&["Paris is the capital of France.", "Rome is in Italy."]),
    );
    assert!((half - 0.5).abs() < 1e-12);
}

#[test]
fn precision_and_recall_stay_in_unit_interval() {
    let texts = [
        "",
        "alpha beta",
        "Alpha beta gamma. Delta.",
        "gamma",
        "ALPHA BETA GAMMA.",
    ];
    let expected = sources(&["Alpha beta gamma.", "Delta.", ""]);
    for k in 0..=texts.len() {
        let retrieved = &texts[..k];
        let p = context_precision(retrieved, &expected);
        let r = context_recall(retrieved, &expected);
        assert!((0.0..=1.0).contains(&p), "precision {p}");
        assert!((0.0..=1.0).contains(&r), "recall {r}");
    }
}

#[test]
fn term_f1_cases() {
    assert_eq!(term_f1("", ""), 1.0);
    assert_eq!(term_f1("something", ""), 0.5);
    assert_eq!(term_f1("", "expected answer"), 0.0);
    assert_eq!(term_f1("water boils quickly", "water boils quickly"), 1.0);
    assert_eq!(term_f1("nothing shared", "water boils"), 0.0);

    // One shared term; "at" and "sea" are too short to count
    let f1 = term_f1("water flows", "water boils at sea level");
    let expected = 2.0 * 0.5 * (1.0 / 3.0) / (0.5 + 1.0 / 3.0);
    assert!((f1 - expected).abs() < 1e-12);
}

#[tokio::test]
async fn relevancy_prefers_llm_then_embedding_then_keywords() {
    let question = "Which river crosses Paris?";
    let answer = "The Seine river crosses Paris.";

    let heuristic = answer_relevancy(question, answer, &Capabilities::none()).await;
    assert_eq!(heuristic.source, ScoreSource::Heuristic);
    assert_eq!(heuristic.value, 1.0);

    let embedded = Capabilities::none()
        .with_embedder(Arc::new(KeywordEmbedder::new(&["river", "paris", "seine"])));
    let score = answer_relevancy(question, answer, &embedded).await;
    assert_eq!(score.source, ScoreSource::Embedding);
    assert!(score.value > 0.8 && score.value < 1.0);

    let graded = grounding_judge();
    let score = answer_relevancy(question, answer, &graded).await;
    assert_eq!(score.source, ScoreSource::Llm);
    assert!((score.value - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn correctness_blends_f1_with_semantic_similarity() {
    let answer = "Water boils at sea level";
    let expected = "Water boils at sea level";

    let heuristic = answer_correctness(answer, expected, &Capabilities::none()).await;
    assert_eq!(heuristic.source, ScoreSource::Heuristic);
    assert_eq!(heuristic.value, 1.0);

    let embedded =
        Capabilities::none().with_embedder(Arc::new(KeywordEmbedder::new(&["water", "boil"])));
    let score = answer_correctness("Water boils quickly", expected, &embedded).await;
    assert_eq!(score.source, ScoreSource::Embedding);
    let f1 = term_f1("Water boils quickly", expected);
    assert!((score.value - (0.5 * f1 + 0.5)).abs() < 1e-6);

    let failing_embedder = Capabilities::none()
        .with_embedder(Arc::new(FailingEmbedder))
        .with_generator(Arc::new(ScriptedGenerator::new(|_: &str| "0.5".to_string())));
    let score = answer_correctness(answer, expected, &failing_embedder).await;
    assert_eq!(score.source, ScoreSource::Llm);
    assert!((score.value - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn evaluate_question_marks_simulated_scores() {
    let source_context = sources(&["Human activities cause X through sustained emissions."]);
    let input = EvaluationInput {
        question: "What causes X?",
        answer: "Human activities cause X through sustained emissions.",
        expected_answer: "Human activities cause X through sustained emissions.",
        source_context: &source_context,
        retrieved: CONTEXT,
    };

    let scores = evaluate_question(input, &Capabilities::none()).await;
    assert!(scores.is_simulated());
    assert_eq!(scores.context_precision.source, ScoreSource::Computed);
    assert_eq!(scores.context_precision.value, 1.0);
    assert_eq!(scores.context_recall.value, 1.0);
    assert_eq!(scores.faithfulness.value, 1.0);

    let values = scores.values();
    for metric in Metric::ALL {
        assert!((0.0..=1.0).contains(&values.get(metric)), "{metric}");
    }
}

#[test]
fn scores_are_clamped() {
    assert_eq!(Score::new(f64::NAN, ScoreSource::Llm).value, 0.0);
    assert_eq!(Score::new(1.7, ScoreSource::Llm).value, 1.0);
    assert_eq!(Score::new(-0.2, ScoreSource::Embedding).value, 0.0);
}

#[test]
fn aggregate_is_the_mean() {
    let score = |v: f64| Score::new(v, ScoreSource::Computed);
    let question = |v: f64| QuestionScores {
        faithfulness: score(v),
        answer_relevancy: score(v),
        context_precision: score(1.0 - v),
        context_recall: score(v),
        answer_correctness: score(v),
    };

    let metrics = aggregate(&[question(0.2), question(0.6)]);
    assert!((metrics.faithfulness - 0.4).abs() < 1e-12);
    assert!((metrics.context_precision - 0.6).abs() < 1e-12);
    assert!((metrics.overall() - 0.44).abs() < 1e-12);

    assert_eq!(aggregate(&[]), RagasMetrics::default());
}
