
use super::{ChunkMetadata, DistanceMetric, EmbeddingRecord};
use crate::corpus::Label;
use crate::{Result, VerdictError};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatchIterator, StringArray,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_INSERT_BATCH_SIZE: usize = 100;

/// A named LanceDB collection of embedded chunks
pub struct VectorStore {
    connection: Connection,
    table: Table,
    collection: String,
    vector_dimension: usize,
    distance: DistanceMetric,
    insert_batch_size: usize,
    show_progress: bool,
}

/// One nearest-neighbor hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("collection", &self.collection)
            .field("vector_dimension", &self.vector_dimension)
            .field("distance", &self.distance)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open a collection, creating the database directory and an empty table
    /// with `dimension`-wide vectors when needed. An existing table is kept
    /// as is and its own dimension wins.
    #[inline]
    pub async fn open(location: &Path, collection: &str, dimension: usize) -> Result<Self> {
        debug!(
            "Opening collection {} at {}",
            collection,
            location.display()
        );

        std::fs::create_dir_all(location).map_err(|e| {
            VerdictError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let connection = Self::connect(location).await?;

        let table = if Self::table_exists(&connection, collection).await? {
            debug!("Collection {} already exists, opening it", collection);
            Self::open_table(&connection, collection).await?
        } else {
            info!(
                "Creating collection {} with {} dimensions",
                collection, dimension
            );
            connection
                .create_empty_table(collection, create_schema(dimension)?)
                .execute()
                .await
                .map_err(|e| VerdictError::Database(format!("Failed to create table: {}", e)))?
        };

        Self::from_table(connection, table, collection).await
    }

    /// Open a collection that must already exist
    #[inline]
    pub async fn open_existing(location: &Path, collection: &str) -> Result<Self> {
        if !location.is_dir() {
            return Err(VerdictError::NotFound(format!(
                "Vector database not found at {}",
                location.display()
            )));
        }

        let connection = Self::connect(location).await?;

        if !Self::table_exists(&connection, collection).await? {
            return Err(VerdictError::NotFound(format!(
                "Collection '{}' does not exist in {}",
                collection,
                location.display()
            )));
        }

        let table = Self::open_table(&connection, collection).await?;
        Self::from_table(connection, table, collection).await
    }

    #[inline]
    #[must_use]
    pub const fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_insert_batch_size(mut self, batch_size: usize) -> Self {
        self.insert_batch_size = batch_size.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        self.vector_dimension
    }

    #[inline]
    pub const fn distance(&self) -> DistanceMetric {
        self.distance
    }

    /// Names of every collection in this database
    #[inline]
    pub async fn collection_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to list tables: {}", e)))
    }

    /// Upsert records in batches, one merge commit per batch. A record whose
    /// id already exists replaces the stored one; within one call the last
    /// record for an id wins.
    #[inline]
    pub async fn insert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        if records.is_empty() {
            debug!("No records to insert");
            return Ok(0);
        }

        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != self.vector_dimension)
        {
            return Err(VerdictError::Database(format!(
                "Record {} has {} dimensions but collection {} expects {}",
                bad.id,
                bad.vector.len(),
                self.collection,
                self.vector_dimension
            )));
        }

        let progress = self.progress_bar(records.len());
        let mut inserted = 0;
        for batch in records.chunks(self.insert_batch_size) {
            let unique = last_record_per_id(batch);

            let record_batch = self.create_record_batch(&unique)?;
            let schema = record_batch.schema();
            let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

            let mut merge = self.table.merge_insert(&["id"]);
            merge
                .when_matched_update_all(None)
                .when_not_matched_insert_all();
            merge
                .execute(Box::new(reader))
                .await
                .map_err(|e| VerdictError::Database(format!("Failed to upsert records: {}", e)))?;

            inserted += unique.len();
            progress.inc(batch.len() as u64);
            debug!("Upserted batch of {} records", unique.len());
        }
        progress.finish_and_clear();

        info!(
            "Inserted {} records into collection {}",
            inserted, self.collection
        );
        Ok(inserted)
    }

    /// The `k` records nearest to `vector`, closest first
    #[inline]
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        if vector.len() != self.vector_dimension {
            return Err(VerdictError::Database(format!(
                "Query vector has {} dimensions but collection {} expects {}",
                vector.len(),
                self.collection,
                self.vector_dimension
            )));
        }

        if self.count().await? == 0 {
            debug!("Collection {} is empty", self.collection);
            return Ok(Vec::new());
        }

        debug!("Searching {} nearest neighbors", k);

        let results = self
            .table
            .vector_search(vector)
            .map_err(|e| VerdictError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(self.distance.into())
            .limit(k)
            .execute()
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        search_results.truncate(k);
        Ok(search_results)
    }

    /// Number of records in the collection
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to count rows: {}", e)))
    }

    async fn connect(location: &Path) -> Result<Connection> {
        let uri = location.to_string_lossy();
        lancedb::connect(&uri)
            .read_consistency_interval(Duration::ZERO)
            .execute()
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to connect to LanceDB: {}", e)))
    }

    async fn table_exists(connection: &Connection, collection: &str) -> Result<bool> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|name| name == collection))
    }

    async fn open_table(connection: &Connection, collection: &str) -> Result<Table> {
        connection
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| VerdictError::Database(format!("Failed to open table: {}", e)))
    }

    async fn from_table(connection: Connection, table: Table, collection: &str) -> Result<Self> {
        let vector_dimension = detect_vector_dimension(&table).await?;
        info!(
            "Collection {} ready ({} dimensions)",
            collection, vector_dimension
        );

        Ok(Self {
            connection,
            table,
            collection: collection.to_string(),
            vector_dimension,
            distance: DistanceMetric::default(),
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            show_progress: false,
        })
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress || !console::Term::stderr().is_term() {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} Inserting [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }

    fn create_record_batch(&self, records: &[&EmbeddingRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self.vector_dimension;
        let list_len = list_size(vector_dim)?;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut documents = Vec::with_capacity(len);
        let mut index_articles = Vec::with_capacity(len);
        let mut labels = Vec::with_capacity(len);
        let mut subjects = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            documents.push(record.document.as_str());
            index_articles.push(record.metadata.index_article);
            labels.push(record.metadata.label.as_i32());
            subjects.push(record.metadata.subject.as_str());
            dates.push(record.metadata.date.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, list_len, Arc::new(values_array), None)
                .map_err(|e| {
                    VerdictError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(documents)),
            Arc::new(UInt64Array::from(index_articles)),
            Arc::new(Int32Array::from(labels)),
            Arc::new(StringArray::from(subjects)),
            Arc::new(StringArray::from(dates)),
        ];

        RecordBatch::try_new(create_schema(vector_dim)?, arrays)
            .map_err(|e| VerdictError::Database(format!("Failed to create record batch: {}", e)))
    }
}

/// Arrow list size for `vector_dim`-wide vectors
fn list_size(vector_dim: usize) -> Result<i32> {
    i32::try_from(vector_dim).map_err(|_| {
        VerdictError::Database(format!("Vector dimension {} is too large", vector_dim))
    })
}

/// Schema of a collection table with `vector_dim`-wide vectors
fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size(vector_dim)?,
            ),
            false,
        ),
        Field::new("document", DataType::Utf8, false),
        Field::new("index_article", DataType::UInt64, false),
        Field::new("label", DataType::Int32, false),
        Field::new("subject", DataType::Utf8, false),
        Field::new("date", DataType::Utf8, false),
    ])))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| VerdictError::Database(format!("Failed to get table schema: {}", e)))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            VerdictError::Database("Could not find vector column or determine dimension".to_string())
        })
}

/// Keep only the last record for each id, in order of last appearance
fn last_record_per_id(records: &[EmbeddingRecord]) -> Vec<&EmbeddingRecord> {
    let last_positions: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(i, record)| (record.id.as_str(), i))
        .collect();

    records
        .iter()
        .enumerate()
        .filter(|(i, record)| last_positions.get(record.id.as_str()) == Some(i))
        .map(|(_, record)| record)
        .collect()
}

async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<SearchResult>> {
    let mut search_results = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| VerdictError::Database(format!("Failed to read result stream: {}", e)))?
    {
        search_results.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results from stream", search_results.len());
    Ok(search_results)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| VerdictError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| VerdictError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let ids = column::<StringArray>(batch, "id")?;
    let documents = column::<StringArray>(batch, "document")?;
    let index_articles = column::<UInt64Array>(batch, "index_article")?;
    let labels = column::<Int32Array>(batch, "label")?;
    let subjects = column::<StringArray>(batch, "subject")?;
    let dates = column::<StringArray>(batch, "date")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    (0..batch.num_rows())
        .map(|row| {
            let label = Label::try_from(labels.value(row)).map_err(VerdictError::Database)?;
            if distances.is_null(row) {
                return Err(VerdictError::Database(format!(
                    "Missing distance for result {}",
                    ids.value(row)
                )));
            }
            let distance = distances.value(row);

            Ok(SearchResult {
                id: ids.value(row).to_string(),
                text: documents.value(row).to_string(),
                metadata: ChunkMetadata {
                    index_article: index_articles.value(row),
                    label,
                    subject: subjects.value(row).to_string(),
                    date: dates.value(row).to_string(),
                },
                distance,
            })
        })
        .collect()
}
