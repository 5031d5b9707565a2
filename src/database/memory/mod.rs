#[cfg(test)]
mod tests;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DistanceMetric, EmbeddingRecord, SearchResult, VectorIndex};
use crate::{Result, VerdictError};

/// Brute-force vector index held in memory.
///
/// Same id-replacement and distance semantics as [`super::VectorStore`];
/// suited to tests and small corpora.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
    dimension: usize,
    distance: DistanceMetric,
}

impl InMemoryVectorStore {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dimension,
            distance: DistanceMetric::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, what: &str, len: usize) -> Result<()> {
        if len == self.dimension {
            Ok(())
        } else {
            Err(VerdictError::Database(format!(
                "{} has {} dimensions but the index expects {}",
                what, len, self.dimension
            )))
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorStore {
    #[inline]
    async fn insert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        for record in records {
            self.check_dimension(&format!("Record {}", record.id), record.vector.len())?;
        }

        let mut stored = self.records.write().await;
        let before = stored.len();
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        debug!(
            "In-memory index grew from {} to {} records",
            before,
            stored.len()
        );

        let written = records
            .iter()
            .map(|record| record.id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        Ok(written)
    }

    #[inline]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimension("Query vector", vector.len())?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let stored = self.records.read().await;
        let mut results: Vec<SearchResult> = stored
            .values()
            .map(|record| SearchResult {
                id: record.id.clone(),
                text: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: self.distance.distance(vector, &record.vector),
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        if k < results.len() {
            results.truncate(k);
        }
        Ok(results)
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
