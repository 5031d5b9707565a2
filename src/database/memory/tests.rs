use super::*;
use crate::corpus::Label;
use crate::database::ChunkMetadata;

fn record(id: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        vector,
        document: format!("document {}", id),
        metadata: ChunkMetadata {
            index_article: 1,
            label: Label::Fake,
            subject: "news".to_string(),
            date: "2021-01-01".to_string(),
        },
    }
}

async fn filled_store() -> InMemoryVectorStore {
    let store = InMemoryVectorStore::new(2);
    store
        .insert(&[
            record("a", vec![1.0, 0.0]),
            record("b", vec![0.0, 1.0]),
            record("c", vec![0.6, 0.8]),
        ])
        .await
        .expect("should insert");
    store
}

#[tokio::test]
async fn nearest_first() {
    let store = filled_store().await;

    let results = store.query(&[1.0, 0.0], 2).await.expect("should query");

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!(results[0].distance.abs() < 1e-6);
    assert_eq!(results[0].text, "document a");
}

#[tokio::test]
async fn k_beyond_size_returns_all() {
    let store = filled_store().await;
    let results = store.query(&[0.0, 1.0], 10).await.expect("should query");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].id, "b");
}

#[tokio::test]
async fn k_zero_returns_nothing() {
    let store = filled_store().await;
    assert!(store.query(&[0.0, 1.0], 0).await.expect("should query").is_empty());
}

#[tokio::test]
async fn same_id_replaces_record() {
    let store = filled_store().await;
    let written = store
        .insert(&[record("a", vec![0.0, 1.0]), record("a", vec![0.0, -1.0])])
        .await
        .expect("should insert");

    assert_eq!(written, 1);
    assert_eq!(store.count().await.expect("should count"), 3);

    let results = store.query(&[0.0, -1.0], 1).await.expect("should query");
    assert_eq!(results[0].id, "a");
    assert!(results[0].distance.abs() < 1e-6);
}

#[tokio::test]
async fn rejects_wrong_dimension() {
    let store = filled_store().await;

    let insert = store.insert(&[record("bad", vec![1.0, 0.0, 0.0])]).await;
    assert!(matches!(insert, Err(VerdictError::Database(_))));
    assert_eq!(store.count().await.expect("should count"), 3);

    let query = store.query(&[1.0], 1).await;
    assert!(matches!(query, Err(VerdictError::Database(_))));
}

#[tokio::test]
async fn cosine_metric_ignores_magnitude() {
    let store = InMemoryVectorStore::new(2).with_distance(DistanceMetric::Cosine);
    store
        .insert(&[record("far", vec![10.0, 0.0]), record("near", vec![0.1, 0.1])])
        .await
        .expect("should insert");

    let results = store.query(&[3.0, 3.0], 1).await.expect("should query");
    assert_eq!(results[0].id, "near");
}
