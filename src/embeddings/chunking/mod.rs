
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, VerdictError};
use crate::config::ConfigError;
use crate::corpus::{Document, Label};

/// Chunks with this many words or fewer are dropped
pub const DEFAULT_MIN_WORDS: usize = 10;

/// A contiguous word window taken from one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of the owning document in the merged corpus
    pub source_index: u64,
    /// Position of this chunk within its document
    pub chunk_index: u32,
    /// Window contents, words joined by single spaces
    pub text: String,
    pub label: Label,
    pub subject: String,
    pub date: String,
}

impl Chunk {
    /// Stable record id; rebuilding the same corpus yields the same ids
    #[inline]
    pub fn id(&self) -> String {
        format!("doc{}_chunk{}", self.source_index, self.chunk_index)
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Configuration for word-window chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in words
    pub chunk_size: usize,
    /// Words shared by consecutive windows
    pub overlap: usize,
    /// A window is kept only if it has more words than this
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 300,
            overlap: 30,
            min_words: DEFAULT_MIN_WORDS,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_window(self.chunk_size, self.overlap)
    }
}

fn validate_window(chunk_size: usize, overlap: usize) -> Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize(chunk_size));
    }
    if overlap >= chunk_size {
        return Err(ConfigError::InvalidOverlap(overlap, chunk_size));
    }
    Ok(())
}

/// Split text into overlapping word windows using the default minimum length.
///
/// `None`, empty and whitespace-only input yield an empty vector.
/// Fails with a configuration error when `overlap >= chunk_size`.
#[inline]
pub fn split_text(text: Option<&str>, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    split_text_with_min(text, chunk_size, overlap, DEFAULT_MIN_WORDS)
}

/// Split text into overlapping word windows.
///
/// Windows advance by `chunk_size - overlap` words and stop once a window
/// reaches the end of the text. Windows with `min_words` words or fewer are
/// discarded, which mostly affects the trailing window.
#[inline]
pub fn split_text_with_min(
    text: Option<&str>,
    chunk_size: usize,
    overlap: usize,
    min_words: usize,
) -> Result<Vec<String>> {
    validate_window(chunk_size, overlap)?;

    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        let window = &words[start..end];

        if window.len() > min_words {
            chunks.push(window.join(" "));
        }

        if end >= words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Chunk a document, copying its label, subject and date onto every chunk
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let windows = split_text_with_min(
        Some(&document.text),
        config.chunk_size,
        config.overlap,
        config.min_words,
    )?;

    let chunks = windows
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let chunk_index = u32::try_from(i).map_err(|_| {
                VerdictError::Input(format!(
                    "Document {} has too many chunks",
                    document.index
                ))
            })?;
            Ok(Chunk {
                source_index: document.index,
                chunk_index,
                text,
                label: document.label,
                subject: document.subject.clone(),
                date: document.date.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Chunked document {} into {} chunks",
        document.index,
        chunks.len()
    );

    Ok(chunks)
}

/// Chunk every document of a corpus, preserving document order
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunk_document(document, config)?);
    }

    debug!(
        "Chunked {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );

    Ok(chunks)
}
