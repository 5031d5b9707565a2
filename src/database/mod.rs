// Database module
// Vector storage behind one async interface: LanceDB on disk, or in memory

pub mod lancedb;
pub mod memory;

use async_trait::async_trait;

use crate::Result;

pub use self::lancedb::{ChunkMetadata, DistanceMetric, EmbeddingRecord, SearchResult, VectorStore};
pub use memory::InMemoryVectorStore;

/// Nearest-neighbor storage for embedded chunks
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert records, replacing any with the same id. Returns the number written.
    async fn insert(&self, records: &[EmbeddingRecord]) -> Result<usize>;

    /// The `k` records nearest to `vector`, closest first
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    async fn count(&self) -> Result<usize>;
}

#[async_trait]
impl VectorIndex for VectorStore {
    #[inline]
    async fn insert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        Self::insert(self, records).await
    }

    #[inline]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        Self::query(self, vector, k).await
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        Self::count(self).await
    }
}
