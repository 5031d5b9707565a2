
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::settings::EmbeddingConfig;
use crate::embeddings::chunking::Chunk;
use crate::{Result, VerdictError};

/// Produces raw embedding vectors. Implementations block the calling thread.
pub trait EmbeddingService: Send + Sync {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>>;
}

/// What to do when one text of a batch fails to embed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole batch on the first failure
    #[default]
    FailFast,
    /// Drop the failing item with a warning and keep the rest
    SkipAndLog,
}

/// The first failure of a fail-fast batch
#[derive(Debug)]
struct FailedText {
    index: usize,
    error: VerdictError,
}

/// A chunk together with its normalized vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Scale a vector to unit L2 norm. A zero vector is returned unchanged.
#[inline]
pub fn normalize_vector(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector;
    }
    for x in &mut vector {
        *x /= norm;
    }
    vector
}

/// Bounded-concurrency batch embedder.
///
/// Texts are sent on the blocking pool with at most `max_workers` requests
/// in flight. Every result is written back into the slot of its input, so
/// output order always matches input order.
#[derive(Clone)]
pub struct Embedder {
    service: Arc<dyn EmbeddingService>,
    model: String,
    max_workers: usize,
    failure_policy: FailurePolicy,
    show_progress: bool,
}

impl std::fmt::Debug for Embedder {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.model)
            .field("max_workers", &self.max_workers)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    #[inline]
    pub fn new(service: Arc<dyn EmbeddingService>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            max_workers: 4,
            failure_policy: FailurePolicy::FailFast,
            show_progress: false,
        }
    }

    #[inline]
    pub fn from_config(service: Arc<dyn EmbeddingService>, config: &EmbeddingConfig) -> Self {
        Self::new(service, config.model.clone())
            .with_max_workers(config.max_workers)
            .with_failure_policy(config.failure_policy)
    }

    #[inline]
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed and normalize a single text on the calling thread
    #[inline]
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.service.embed(&self.model, text).map(normalize_vector)
    }

    /// Embed every text; the first failure stops the batch
    #[inline]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_all(texts.to_vec(), FailurePolicy::FailFast)
            .await
            .map_err(|failed| failed.error)?
            .into_iter()
            .collect()
    }

    /// Embed chunks according to the configured failure policy
    #[inline]
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let results = self
            .embed_all(texts, self.failure_policy)
            .await
            .map_err(|failed| {
                let id = chunks
                    .get(failed.index)
                    .map_or_else(|| failed.index.to_string(), Chunk::id);
                VerdictError::Service(format!("Failed to embed chunk {}: {}", id, failed.error))
            })?;

        let mut embedded = Vec::with_capacity(chunks.len());
        let mut skipped = 0_usize;
        for (chunk, result) in chunks.into_iter().zip(results) {
            match result {
                Ok(vector) => embedded.push(EmbeddedChunk { chunk, vector }),
                Err(e) => {
                    warn!("Skipping chunk {}: {}", chunk.id(), e);
                    skipped += 1;
                }
            }
        }

        info!(
            "Embedded {} chunks ({} skipped)",
            embedded.len(),
            skipped
        );
        Ok(embedded)
    }

    /// One result per input, in input order. Under `FailFast` the stream is
    /// dropped at the first error so no further texts are sent.
    async fn embed_all(
        &self,
        texts: Vec<String>,
        policy: FailurePolicy,
    ) -> std::result::Result<Vec<Result<Vec<f32>>>, FailedText> {
        let total = texts.len();
        debug!(
            "Embedding {} texts with {} with up to {} workers",
            total, self.model, self.max_workers
        );

        let progress = self.progress_bar(total);
        let mut slots: Vec<Option<Result<Vec<f32>>>> = (0..total).map(|_| None).collect();

        let mut completed = stream::iter(texts.into_iter().enumerate())
            .map(|(index, text)| {
                let service = Arc::clone(&self.service);
                let model = self.model.clone();
                async move {
                    let result = tokio::task::spawn_blocking(move || {
                        service.embed(&model, &text).map(normalize_vector)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(VerdictError::Service(format!("Embedding task failed: {}", e)))
                    });
                    (index, result)
                }
            })
            .buffer_unordered(self.max_workers);

        while let Some((index, result)) = completed.next().await {
            match result {
                Err(error) if policy == FailurePolicy::FailFast => {
                    progress.abandon();
                    return Err(FailedText { index, error });
                }
                result => slots[index] = Some(result),
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(VerdictError::Service("Embedding result missing".to_string()))
                })
            })
            .collect())
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress || !console::Term::stderr().is_term() {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} Embedding [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }
}
