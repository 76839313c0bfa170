// Deterministic capabilities shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{CapabilityError, Embedder, GenerationOptions, Generator};

/// Embeds text as keyword counts, one dimension per keyword
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect())
    }
}

/// [`KeywordEmbedder`] that sleeps before every embedding
pub struct SlowEmbedder {
    inner: KeywordEmbedder,
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(keywords: &[&'static str], delay: Duration) -> Self {
        Self {
            inner: KeywordEmbedder::new(keywords),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(text).await
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CapabilityError> {
        Err(CapabilityError::Request {
            provider: "mock".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Answers every prompt with the output of a closure
pub struct ScriptedGenerator<F> {
    script: F,
    pub calls: AtomicUsize,
}

impl<F> ScriptedGenerator<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(script: F) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<F> Generator for ScriptedGenerator<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    async fn complete(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.script)(prompt))
    }
}

pub struct SlowGenerator(pub Duration);

#[async_trait]
impl Generator for SlowGenerator {
    async fn complete(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, CapabilityError> {
        tokio::time::sleep(self.0).await;
        Ok("0.9".to_string())
    }
}
