// Test question generation shared by both chunking strategies


use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::LazyLock;

use fancy_regex::Regex;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capability::{Capabilities, GenerationOptions};
use crate::chunking::sentence_texts;

/// Consecutive sentences offered to the generator per question
const PASSAGE_SENTENCES: usize = 3;
/// Sentences with fewer words are only used when nothing longer exists
const MIN_SENTENCE_WORDS: usize = 6;
const MAX_DEFINITION_TERM_WORDS: usize = 4;
const MAX_ENTITIES: usize = 10;
const MAX_RELATIONSHIPS: usize = 10;
/// Relationship endpoints keep at most this many words next to the verb
const MAX_RELATION_PHRASE_WORDS: usize = 3;
/// Leading key facts scanned for the summary topic
const SUMMARY_TOPIC_FACTS: usize = 5;
const SUMMARY_SENTENCES: usize = 3;
const MIN_SUMMARY_TOPIC_CHARS: usize = 5;

static DEFINITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:the\s+|an?\s+)?(\w[\w\s-]*?)\s+(?:is|are|refers?\s+to|means?)\s+\S")
        .expect("valid regex")
});

static KEY_FACT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:is|are)\s+(?:a|an|the)\b|\bconsists?\s+of\b|\bincludes?\b|\bdefines?\b|\bprovides?\b|\ballows?\b|\benables?\b|\b(?:main|primary|key|important|significant)\b",
    )
    .expect("valid regex")
});

static DESCRIPTION_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:is|are|refers\s+to|means)\b").expect("valid regex")
});

// Subject phrase, relating verb, object phrase
static RELATIONSHIP_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\w+(?:\s+\w+)*?)\s+(?:leads?\s+to|results?\s+in|causes?)\s+(\w+(?:\s+\w+)*)",
        r"(?i)(\w+(?:\s+\w+)*?)\s+(?:includes?|contains?|consists?\s+of)\s+(\w+(?:\s+\w+)*)",
        r"(?i)(\w+(?:\s+\w+)*?)\s+(?:uses?|utilizes?|employs?)\s+(\w+(?:\s+\w+)*)",
        r"(?i)(\w+(?:\s+\w+)*?)\s+(?:differs?\s+from|contrasts?\s+with)\s+(\w+(?:\s+\w+)*)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

const PRONOUNS: &[&str] = &["it", "this", "that", "they", "these", "those", "there"];
const SUBJECT_STOPWORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "there", "then", "they", "what", "when", "where",
    "which", "while", "however", "who", "why", "how",
];
const CONNECTOR_WORDS: &[&str] = &["the", "a", "an", "to", "of", "and", "in", "on", "for"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    Generated,
    RuleBased,
}

/// A question with its reference answer and the document sentences it was drawn from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestQuestion {
    pub question: String,
    pub expected_answer: String,
    pub source_context: Vec<String>,
    pub origin: QuestionOrigin,
}

#[derive(Debug, Deserialize)]
struct QaReply {
    question: String,
    answer: String,
}

/// Generate up to `num_questions` questions from the whole document.
///
/// With a generator, passages spread evenly across the document are turned into
/// question/answer pairs; a passage whose reply cannot be parsed gets a rule-based
/// question instead. Without a generator the rule-based set is returned.
#[inline]
pub async fn generate_questions(
    document: &str,
    num_questions: usize,
    concurrency: usize,
    capabilities: &Capabilities,
) -> Vec<TestQuestion> {
    if !capabilities.has_generator() {
        let questions = rule_based_questions(document, num_questions);
        info!("Generated {} rule-based questions", questions.len());
        return questions;
    }

    let passages = select_passages(&candidate_sentences(document), num_questions);
    let questions: Vec<TestQuestion> = stream::iter(passages)
        .map(|passage| generated_question(passage, capabilities))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    info!(
        "Generated {} questions ({} from the generator)",
        questions.len(),
        questions
            .iter()
            .filter(|q| q.origin == QuestionOrigin::Generated)
            .count()
    );
    questions
}

/// Deterministic questions.
///
/// Definitions, key facts, recurring entities, relationships and a summary are taken in
/// turn, then the remaining sentences fill the set.
#[inline]
pub fn rule_based_questions(document: &str, num_questions: usize) -> Vec<TestQuestion> {
    let sentences = candidate_sentences(document);

    let mut definitions = Vec::new();
    let mut facts = Vec::new();
    let mut rest = Vec::new();
    for sentence in &sentences {
        if let Some(question) = definition_question(sentence) {
            definitions.push(question);
        } else if is_key_fact(sentence) {
            facts.push(fact_question(sentence));
        } else {
            rest.push(fact_question(sentence));
        }
    }
    let key_facts: Vec<&str> = sentences
        .iter()
        .map(String::as_str)
        .filter(|sentence| is_key_fact(sentence))
        .collect();

    let mut kinds = [
        definitions,
        facts,
        entity_questions(document, &sentences),
        relationship_questions(&sentences),
        summary_question(&key_facts, &sentences).into_iter().collect(),
    ]
    .map(Vec::into_iter);

    let mut questions: Vec<TestQuestion> = Vec::with_capacity(num_questions);
    loop {
        let before = questions.len();
        for kind in &mut kinds {
            questions.extend(kind.next());
        }
        if questions.len() == before {
            break;
        }
    }
    questions.extend(rest);

    questions
        .into_iter()
        .unique_by(|q| (q.question.clone(), q.expected_answer.clone()))
        .take(num_questions)
        .collect()
}

async fn generated_question(passage: Vec<String>, capabilities: &Capabilities) -> TestQuestion {
    let prompt = format!(
        "Text:\n{}\n\nWrite one specific question that this text answers, together with the \
         correct answer. Reply with JSON only, in the form \
         {{\"question\": \"...\", \"answer\": \"...\"}}.",
        passage.join(" ")
    );

    if let Ok(reply) = capabilities
        .complete(&prompt, &GenerationOptions::exploratory())
        .await
    {
        if let Some(qa) = parse_qa_reply(&reply) {
            return TestQuestion {
                question: qa.question,
                expected_answer: qa.answer,
                source_context: passage,
                origin: QuestionOrigin::Generated,
            };
        }
        debug!("Unparseable question reply, using rule-based question");
    }

    passage_question(passage)
}

/// Extract the first JSON object of a reply; both fields must be non-empty
fn parse_qa_reply(reply: &str) -> Option<QaReply> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let qa: QaReply = serde_json::from_str(&reply[start..=end]).ok()?;
    let qa = QaReply {
        question: qa.question.trim().to_string(),
        answer: qa.answer.trim().to_string(),
    };
    (!qa.question.is_empty() && !qa.answer.is_empty()).then_some(qa)
}

/// Rule-based question for a passage, keeping the whole passage as its source context
fn passage_question(passage: Vec<String>) -> TestQuestion {
    let question = passage
        .iter()
        .find_map(|sentence| definition_question(sentence))
        .or_else(|| passage.first().map(|sentence| fact_question(sentence)))
        .map_or_else(
            || "What does this document describe?".to_string(),
            |q| q.question,
        );

    TestQuestion {
        question,
        expected_answer: passage.join(" "),
        source_context: passage,
        origin: QuestionOrigin::RuleBased,
    }
}

/// Sentences long enough to ask about; all sentences when none qualify
fn candidate_sentences(document: &str) -> Vec<String> {
    let sentences: Vec<&str> = sentence_texts(document)
        .into_iter()
        .filter(|s| !s.ends_with('?'))
        .collect();
    let long: Vec<String> = sentences
        .iter()
        .filter(|s| s.split_whitespace().count() >= MIN_SENTENCE_WORDS)
        .map(|s| (*s).to_string())
        .collect();

    if long.is_empty() {
        sentences.into_iter().map(str::to_string).collect()
    } else {
        long
    }
}

/// Up to `count` passages of consecutive sentences, starting at evenly spaced positions
fn select_passages(sentences: &[String], count: usize) -> Vec<Vec<String>> {
    let count = count.min(sentences.len());
    (0..count)
        .map(|i| {
            let start = i * sentences.len() / count;
            let end = (start + PASSAGE_SENTENCES).min(sentences.len());
            sentences[start..end].to_vec()
        })
        .collect()
}

fn definition_question(sentence: &str) -> Option<TestQuestion> {
    let captures = DEFINITION_REGEX.captures(sentence).ok()??;
    let term = captures.get(1)?.as_str().trim();
    let words = term.split_whitespace().count();
    if words == 0
        || words > MAX_DEFINITION_TERM_WORDS
        || PRONOUNS.contains(&term.to_lowercase().as_str())
    {
        return None;
    }

    Some(TestQuestion {
        question: format!("What is {}?", term),
        expected_answer: sentence.to_string(),
        source_context: vec![sentence.to_string()],
        origin: QuestionOrigin::RuleBased,
    })
}

fn is_key_fact(sentence: &str) -> bool {
    KEY_FACT_REGEX.is_match(sentence).unwrap_or(false)
}

fn fact_question(sentence: &str) -> TestQuestion {
    let question = fact_subject(sentence).map_or_else(
        || "What does the document say about this topic?".to_string(),
        |subject| format!("What can you tell me about {}?", subject),
    );

    TestQuestion {
        question,
        expected_answer: sentence.to_string(),
        source_context: vec![sentence.to_string()],
        origin: QuestionOrigin::RuleBased,
    }
}

/// First capitalized or long word that is not a stopword
fn fact_subject(sentence: &str) -> Option<String> {
    sentence
        .split_whitespace()
        .map(clean_word)
        .filter(|word| !word.is_empty())
        .find(|word| {
            let capitalized = word.chars().next().is_some_and(char::is_uppercase);
            ((capitalized && word.chars().count() > 2) || word.chars().count() > 6)
                && !SUBJECT_STOPWORDS.contains(&word.to_lowercase().as_str())
        })
        .map(str::to_string)
}

/// Questions about capitalized terms that recur in the document, answered by the first
/// sentence that describes them
fn entity_questions(document: &str, sentences: &[String]) -> Vec<TestQuestion> {
    let words: Vec<&str> = document
        .split_whitespace()
        .map(clean_word)
        .filter(|word| is_entity_candidate(word))
        .collect();
    let counts: HashMap<&str, usize> = words.iter().copied().counts();

    words
        .iter()
        .copied()
        .unique()
        .filter(|word| counts.get(word).is_some_and(|&count| count > 1))
        .sorted_by_key(|word| Reverse(counts.get(word).copied().unwrap_or(0)))
        .take(MAX_ENTITIES)
        .filter_map(|entity| {
            sentences
                .iter()
                .find(|s| {
                    s.contains(entity) && DESCRIPTION_MARKER_REGEX.is_match(s).unwrap_or(false)
                })
                .map(|sentence| (entity, sentence))
        })
        .enumerate()
        .map(|(variant, (entity, sentence))| TestQuestion {
            question: entity_question_text(entity, variant),
            expected_answer: sentence.clone(),
            source_context: vec![sentence.clone()],
            origin: QuestionOrigin::RuleBased,
        })
        .collect()
}

fn entity_question_text(entity: &str, variant: usize) -> String {
    match variant % 4 {
        0 => format!("What do you know about {}?", entity),
        1 => format!("Describe {}.", entity),
        2 => format!("Explain {}.", entity),
        _ => format!("What is {}?", entity),
    }
}

fn is_entity_candidate(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
        && word.chars().count() > 2
        && !SUBJECT_STOPWORDS.contains(&word.to_lowercase().as_str())
}

/// Questions linking the subject and object of causal, part-of, usage and contrast
/// statements
fn relationship_questions(sentences: &[String]) -> Vec<TestQuestion> {
    sentences
        .iter()
        .filter_map(|sentence| {
            let (subject, object) = RELATIONSHIP_REGEXES.iter().find_map(|regex| {
                let captures = regex.captures(sentence).ok()??;
                let subject = relation_phrase(captures.get(1)?.as_str(), true)?;
                let object = relation_phrase(captures.get(2)?.as_str(), false)?;
                Some((subject, object))
            })?;
            Some((sentence, subject, object))
        })
        .take(MAX_RELATIONSHIPS)
        .enumerate()
        .map(|(variant, (sentence, subject, object))| TestQuestion {
            question: relationship_question_text(&subject, &object, variant),
            expected_answer: sentence.clone(),
            source_context: vec![sentence.clone()],
            origin: QuestionOrigin::RuleBased,
        })
        .collect()
}

fn relationship_question_text(subject: &str, object: &str, variant: usize) -> String {
    match variant % 3 {
        0 => format!("What is the relationship between {} and {}?", subject, object),
        1 => format!("How does {} relate to {}?", subject, object),
        _ => format!("Explain the connection between {} and {}.", subject, object),
    }
}

/// The words of `phrase` nearest the verb, without connector words at either end
fn relation_phrase(phrase: &str, before_verb: bool) -> Option<String> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let window = if before_verb {
        &words[words.len().saturating_sub(MAX_RELATION_PHRASE_WORDS)..]
    } else {
        &words[..words.len().min(MAX_RELATION_PHRASE_WORDS)]
    };

    let is_content = |word: &&str| !CONNECTOR_WORDS.contains(&word.to_lowercase().as_str());
    let start = window.iter().position(is_content)?;
    let end = window.iter().rposition(is_content)?;
    Some(window[start..=end].join(" "))
}

/// One question summarizing the most frequent topic among the leading key facts
fn summary_question(key_facts: &[&str], sentences: &[String]) -> Option<TestQuestion> {
    if key_facts.is_empty() {
        return None;
    }

    let (question, context) = match summary_topic(key_facts) {
        Some(topic) => {
            let needle = topic.to_lowercase();
            let mut context: Vec<String> = sentences
                .iter()
                .filter(|s| s.to_lowercase().contains(&needle))
                .take(SUMMARY_SENTENCES)
                .cloned()
                .collect();
            if context.is_empty() {
                context.push(key_facts[0].to_string());
            }
            (format!("Summarize the key points about {}.", topic), context)
        }
        None => (
            "What are the main points discussed in this document?".to_string(),
            key_facts.iter().take(2).map(|s| (*s).to_string()).collect(),
        ),
    };

    Some(TestQuestion {
        question,
        expected_answer: context.join(" "),
        source_context: context,
        origin: QuestionOrigin::RuleBased,
    })
}

/// Most common capitalized word longer than four characters; ties go to the earliest
fn summary_topic(key_facts: &[&str]) -> Option<String> {
    let words: Vec<&str> = key_facts
        .iter()
        .take(SUMMARY_TOPIC_FACTS)
        .flat_map(|fact| fact.split_whitespace())
        .map(clean_word)
        .filter(|word| {
            word.chars().next().is_some_and(char::is_uppercase)
                && word.chars().count() >= MIN_SUMMARY_TOPIC_CHARS
        })
        .collect();
    let counts: HashMap<&str, usize> = words.iter().copied().counts();

    words
        .iter()
        .copied()
        .unique()
        .fold(None, |best: Option<(&str, usize)>, word| {
            let count = counts.get(word).copied().unwrap_or(0);
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((word, count)),
            }
        })
        .map(|(word, _)| word.to_string())
}

fn clean_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
}
