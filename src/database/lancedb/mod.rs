// LanceDB vector database module
// Handles vector storage and similarity search for embedded chunks


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::corpus::Label;
use crate::embeddings::embedder::EmbeddedChunk;

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier; inserting an existing id replaces the record
    pub id: String,
    /// L2-normalized embedding
    pub vector: Vec<f32>,
    /// Chunk text
    pub document: String,
    pub metadata: ChunkMetadata,
}

/// Metadata stored alongside every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Index of the source article in the merged corpus
    pub index_article: u64,
    pub label: Label,
    pub subject: String,
    pub date: String,
}

impl From<EmbeddedChunk> for EmbeddingRecord {
    #[inline]
    fn from(embedded: EmbeddedChunk) -> Self {
        let EmbeddedChunk { chunk, vector } = embedded;
        Self {
            id: chunk.id(),
            vector,
            metadata: ChunkMetadata {
                index_article: chunk.source_index,
                label: chunk.label,
                subject: chunk.subject,
                date: chunk.date,
            },
            document: chunk.text,
        }
    }
}

/// Distance used for nearest-neighbor queries; smaller is more similar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// One minus cosine similarity
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

impl From<DistanceMetric> for lancedb::DistanceType {
    #[inline]
    fn from(metric: DistanceMetric) -> Self {
        match metric {
            DistanceMetric::L2 => Self::L2,
            DistanceMetric::Cosine => Self::Cosine,
        }
    }
}
