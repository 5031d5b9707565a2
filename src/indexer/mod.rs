// Indexer module
// Turns the cleaned corpus into embedded chunks and loads them into a vector index


use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::corpus::Document;
use crate::database::{EmbeddingRecord, VectorIndex};
use crate::embeddings::chunking::{ChunkingConfig, chunk_documents};
use crate::embeddings::embedder::{EmbeddedChunk, Embedder};
use crate::{Result, VerdictError};

/// Builds a vector collection from corpus documents
pub struct CorpusIndexer {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    cache_path: Option<PathBuf>,
}

/// First line of an embedded-chunk cache: the settings its chunks were made with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHeader {
    pub model: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_words: usize,
}

impl CacheHeader {
    #[inline]
    pub fn new(model: &str, chunking: &ChunkingConfig) -> Self {
        Self {
            model: model.to_string(),
            chunk_size: chunking.chunk_size,
            overlap: chunking.overlap,
            min_words: chunking.min_words,
        }
    }
}

/// Statistics about one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_skipped: usize,
    pub records_inserted: usize,
    pub loaded_from_cache: bool,
}

impl CorpusIndexer {
    #[inline]
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            index,
            chunking,
            cache_path: None,
        }
    }

    /// Reuse embedded chunks from `path` when it exists, otherwise write them there
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Chunk, embed and insert every document
    #[inline]
    pub async fn build(&self, documents: &[Document]) -> Result<BuildStats> {
        self.chunking.validate()?;

        let chunks = chunk_documents(documents, &self.chunking)?;
        if chunks.is_empty() {
            return Err(VerdictError::Input(
                "No chunks produced from the corpus, nothing to index".to_string(),
            ));
        }

        let mut stats = BuildStats {
            documents: documents.len(),
            chunks_created: chunks.len(),
            ..BuildStats::default()
        };
        info!(
            "Created {} chunks from {} documents",
            stats.chunks_created, stats.documents
        );

        let header = CacheHeader::new(self.embedder.model(), &self.chunking);
        let cached = match self.cache_path.as_deref() {
            Some(path) => self.load_matching_cache(path, &header).await?,
            None => None,
        };

        let embedded = match cached {
            Some(embedded) => {
                stats.loaded_from_cache = true;
                embedded
            }
            None => {
                let embedded = self.embedder.embed_chunks(chunks).await?;
                if let Some(path) = &self.cache_path {
                    write_embedded_cache(path, &header, &embedded).await?;
                }
                embedded
            }
        };

        if embedded.is_empty() {
            return Err(VerdictError::Service(
                "No chunk could be embedded, nothing to index".to_string(),
            ));
        }

        stats.chunks_embedded = embedded.len();
        stats.chunks_skipped = stats.chunks_created.saturating_sub(embedded.len());
        if stats.loaded_from_cache && embedded.len() != stats.chunks_created {
            warn!(
                "Cache holds {} chunks but the corpus produced {}",
                embedded.len(),
                stats.chunks_created
            );
            stats.chunks_skipped = 0;
        }

        let records: Vec<EmbeddingRecord> = embedded.into_iter().map(EmbeddingRecord::from).collect();
        stats.records_inserted = self.index.insert(&records).await?;

        let total = self.index.count().await?;
        info!(
            "Indexed {} records, collection now holds {}",
            stats.records_inserted, total
        );
        Ok(stats)
    }

    /// Cached chunks from `path`, or `None` when the file is absent or was
    /// written with other settings
    async fn load_matching_cache(
        &self,
        path: &Path,
        expected: &CacheHeader,
    ) -> Result<Option<Vec<EmbeddedChunk>>> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }

        let (header, embedded) = read_embedded_cache(path).await?;
        if header != *expected {
            warn!(
                "Cache {} was built with {:?}, current settings are {:?}; re-embedding",
                path.display(),
                header,
                expected
            );
            return Ok(None);
        }

        info!("Loading embedded chunks from {}", path.display());
        Ok(Some(embedded))
    }
}

/// Write a header line then one JSON line per chunk, creating parent directories
#[inline]
pub async fn write_embedded_cache(
    path: &Path,
    header: &CacheHeader,
    embedded: &[EmbeddedChunk],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut content = serde_json::to_string(header)
        .map_err(|e| VerdictError::Corpus(format!("Failed to serialize cache header: {}", e)))?;
    content.push('\n');
    for chunk in embedded {
        let line = serde_json::to_string(chunk)
            .map_err(|e| VerdictError::Corpus(format!("Failed to serialize chunk: {}", e)))?;
        content.push_str(&line);
        content.push('\n');
    }

    fs::write(path, content).await?;
    debug!("Cached {} embedded chunks in {}", embedded.len(), path.display());
    Ok(())
}

/// Read a cache written by [`write_embedded_cache`]
#[inline]
pub async fn read_embedded_cache(path: &Path) -> Result<(CacheHeader, Vec<EmbeddedChunk>)> {
    let content = fs::read_to_string(path).await?;
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let header = lines
        .next()
        .and_then(|(_, line)| serde_json::from_str::<CacheHeader>(line).ok())
        .ok_or_else(|| {
            VerdictError::Corpus(format!(
                "Cache {} has no settings header",
                path.display()
            ))
        })?;

    let embedded = lines
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|e| {
                VerdictError::Corpus(format!(
                    "Invalid cache line {} in {}: {}",
                    number + 1,
                    path.display(),
                    e
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((header, embedded))
}
