// Injected embedding and generation capabilities
// Every component that talks to a model goes through `Capabilities`, which applies the
// per-call timeout, caches embeddings for the current run, and counts fallbacks.

pub mod ollama;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use ollama::OllamaClient;

pub const DEFAULT_CAPABILITY_TIMEOUT_SECONDS: u64 = 30;
/// Uncached texts sent per embedder call; each call gets its own timeout
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 16;

const EMBEDDER: &str = "embedder";
const GENERATOR: &str = "generator";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    #[error("{0} capability is not available")]
    Unavailable(&'static str),
    #[error("{capability} call timed out after {timeout:?}")]
    Timeout {
        capability: &'static str,
        timeout: Duration,
    },
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },
}

/// Produces embedding vectors for text.
///
/// The default [`embed_batch`](Embedder::embed_batch) calls [`embed`](Embedder::embed)
/// sequentially; backends with a native batch endpoint should override it.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Sampling options passed along with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationOptions {
    /// Low temperature, length bounded; used for answers grounded in retrieved context
    #[inline]
    pub const fn grounded() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 150,
        }
    }

    /// Deterministic and short; used when asking for a 0-1 rating
    #[inline]
    pub const fn grading() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 16,
        }
    }

    /// Used for question generation
    #[inline]
    pub const fn exploratory() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 200,
        }
    }
}

/// Produces text completions
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, CapabilityError>;
}

/// How much of the run was backed by real model calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityMode {
    /// Embedder and generator were supplied and no call fell back
    Full,
    /// At least one capability was missing or at least one call fell back
    Degraded,
    /// Neither capability was supplied
    Heuristic,
}

impl fmt::Display for CapabilityMode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Degraded => write!(f, "degraded"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// The capability set for a single comparison run
pub struct Capabilities {
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    timeout: Duration,
    embed_batch_size: usize,
    embedding_cache: Mutex<HashMap<String, Vec<f32>>>,
    fallbacks: AtomicUsize,
}

impl Default for Capabilities {
    #[inline]
    fn default() -> Self {
        Self {
            embedder: None,
            generator: None,
            timeout: Duration::from_secs(DEFAULT_CAPABILITY_TIMEOUT_SECONDS),
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            embedding_cache: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        }
    }
}

impl fmt::Debug for Capabilities {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("embedder", &self.embedder.is_some())
            .field("generator", &self.generator.is_some())
            .field("timeout", &self.timeout)
            .field("embed_batch_size", &self.embed_batch_size)
            .field("fallbacks", &self.fallback_count())
            .finish_non_exhaustive()
    }
}

impl Capabilities {
    /// A capability set with nothing attached; every component uses its heuristic path
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[inline]
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Split uncached texts into embedder calls of at most `size` texts
    #[inline]
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    #[inline]
    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    #[inline]
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    #[inline]
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mode(&self) -> CapabilityMode {
        match (self.has_embedder(), self.has_generator()) {
            (false, false) => CapabilityMode::Heuristic,
            (true, true) if self.fallback_count() == 0 => CapabilityMode::Full,
            _ => CapabilityMode::Degraded,
        }
    }

    /// Embed a single text, consulting the run cache first
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        if let Some(embedding) = self.cached_embedding(text) {
            return Ok(embedding);
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or(CapabilityError::Unavailable(EMBEDDER))?;

        let embedding = self.call(EMBEDDER, embedder.embed(text)).await?;
        self.store_embedding(text, &embedding);
        Ok(embedding)
    }

    /// Embed many texts, sending the uncached ones in slices of the embed batch size.
    ///
    /// Each slice is a separate timed call, so long inputs are bounded per slice rather
    /// than as a whole.
    #[inline]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or(CapabilityError::Unavailable(EMBEDDER))?;

        let mut missing: Vec<String> = Vec::new();
        for text in texts {
            if self.cached_embedding(text).is_none() && !missing.contains(text) {
                missing.push(text.clone());
            }
        }

        let mut fresh: HashMap<String, Vec<f32>> = HashMap::with_capacity(missing.len());
        if !missing.is_empty() {
            debug!(
                "Embedding {} uncached texts in batches of {}",
                missing.len(),
                self.embed_batch_size
            );
        }
        for slice in missing.chunks(self.embed_batch_size) {
            let embeddings = self.call(EMBEDDER, embedder.embed_batch(slice)).await?;
            if embeddings.len() != slice.len() {
                let error = CapabilityError::InvalidResponse {
                    provider: EMBEDDER.to_string(),
                    message: format!(
                        "expected {} embeddings, received {}",
                        slice.len(),
                        embeddings.len()
                    ),
                };
                self.note_fallback(EMBEDDER, &error);
                return Err(error);
            }
            for (text, embedding) in slice.iter().zip(embeddings) {
                self.store_embedding(text, &embedding);
                fresh.insert(text.clone(), embedding);
            }
        }

        texts
            .iter()
            .map(|text| {
                fresh
                    .get(text)
                    .cloned()
                    .or_else(|| self.cached_embedding(text))
                    .ok_or_else(|| CapabilityError::InvalidResponse {
                        provider: EMBEDDER.to_string(),
                        message: "embedding missing from batch response".to_string(),
                    })
            })
            .collect()
    }

    #[inline]
    pub async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, CapabilityError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(CapabilityError::Unavailable(GENERATOR))?;

        self.call(GENERATOR, generator.complete(prompt, options))
            .await
    }

    async fn call<T, F>(&self, capability: &'static str, future: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        let result = match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                capability,
                timeout: self.timeout,
            }),
        };

        if let Err(error) = &result {
            self.note_fallback(capability, error);
        }
        result
    }

    fn note_fallback(&self, capability: &'static str, error: &CapabilityError) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        warn!("{} call failed, falling back: {}", capability, error);
    }

    fn cached_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.embedding_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(text).cloned())
    }

    fn store_embedding(&self, text: &str, embedding: &[f32]) {
        if let Ok(mut cache) = self.embedding_cache.lock() {
            cache.insert(text.to_string(), embedding.to_vec());
        }
    }
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or zero magnitude
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}
