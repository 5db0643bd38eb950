//! LanceDB-backed similarity index.
//!
//! One table per collection. Besides the id, text and embedding, the
//! metadata keys the query analyzer filters on are stored as their own
//! columns so filters run inside LanceDB; the complete metadata map is kept
//! as a JSON string.

use crate::types::{Metadata, RetrievalHit};
use crate::vector_index::{cosine_distance, validate_batch, VectorIndex, WhereClause};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use insight_core::{AppError, AppResult};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Metadata keys stored as filterable columns, in schema order.
pub const FILTER_COLUMNS: [&str; 7] = [
    "original_feedback_id",
    "content_type",
    "project_name",
    "batch_id",
    "centre_name",
    "feedback_date",
    "course_name",
];

/// Ids per `id IN (...)` probe when checking for existing entries.
const ID_PROBE_CHUNK: usize = 500;

pub struct LanceDbIndex {
    table: Table,
    path: PathBuf,
    dimensions: usize,
}

impl LanceDbIndex {
    /// Create or open the collection table under `db_path`.
    pub async fn open(db_path: &Path, collection: &str, dimensions: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::Index(format!("Failed to create index directory {:?}: {}", db_path, e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == collection) {
            let table = conn
                .open_table(collection)
                .execute()
                .await
                .map_err(|e| AppError::Index(format!("Failed to open table: {}", e)))?;
            check_dimensions(&table, collection, dimensions).await?;
            table
        } else {
            let schema = create_schema(dimensions);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                collection,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to create table: {}", e)))?
        };

        debug!("Opened LanceDB collection '{}' at {:?}", collection, db_path);

        Ok(Self {
            table,
            path: db_path.to_path_buf(),
            dimensions,
        })
    }

    fn to_batch(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> AppResult<RecordBatch> {
        let schema = create_schema(self.dimensions);

        let values = Float32Array::from(vectors.iter().flatten().copied().collect::<Vec<f32>>());
        let embeddings = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimensions as i32,
            Arc::new(values),
            None,
        )
        .map_err(|e| AppError::Index(format!("Failed to build embedding column: {}", e)))?;

        let mut columns: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(ids.iter())),
            Arc::new(StringArray::from_iter_values(documents.iter())),
            Arc::new(embeddings),
        ];

        for key in FILTER_COLUMNS {
            let column: StringArray = metadatas
                .iter()
                .map(|metadata| metadata.get(key).map(String::as_str))
                .collect();
            columns.push(Arc::new(column));
        }

        let metadata_json = metadatas
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        columns.push(Arc::new(StringArray::from(metadata_json)));

        RecordBatch::try_new(schema, columns)
            .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
    }

    /// First id of `ids` that already has a row.
    async fn find_existing(&self, ids: &[String]) -> AppResult<Option<String>> {
        for probe in ids.chunks(ID_PROBE_CHUNK) {
            let list = probe
                .iter()
                .map(|id| format!("'{}'", id.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");

            let batches: Vec<RecordBatch> = self
                .table
                .query()
                .only_if(format!("id IN ({})", list))
                .limit(1)
                .execute()
                .await
                .map_err(|e| AppError::Index(format!("Failed to probe ids: {}", e)))?
                .try_collect()
                .await
                .map_err(|e| AppError::Index(format!("Failed to probe ids: {}", e)))?;

            for batch in &batches {
                if batch.num_rows() > 0 {
                    return Ok(Some(string_value(batch, "id", 0)?));
                }
            }
        }
        Ok(None)
    }
}

fn create_schema(dimensions: usize) -> Arc<Schema> {
    let mut fields = vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimensions as i32,
            ),
            false,
        ),
    ];
    fields.extend(
        FILTER_COLUMNS
            .iter()
            .map(|key| Field::new(*key, DataType::Utf8, true)),
    );
    fields.push(Field::new("metadata", DataType::Utf8, false));
    Arc::new(Schema::new(fields))
}

async fn check_dimensions(table: &Table, collection: &str, dimensions: usize) -> AppResult<()> {
    let schema = table
        .schema()
        .await
        .map_err(|e| AppError::Index(format!("Failed to read table schema: {}", e)))?;

    let stored = schema
        .field_with_name("embedding")
        .ok()
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => Some(*size as usize),
            _ => None,
        });

    match stored {
        Some(size) if size == dimensions => Ok(()),
        Some(size) => Err(AppError::Index(format!(
            "Collection '{}' holds {}-dimensional vectors, configured {}. Run `insight clear --purge` and reindex.",
            collection, size, dimensions
        ))),
        None => Err(AppError::Index(format!(
            "Collection '{}' has no embedding column",
            collection
        ))),
    }
}

fn string_value(batch: &RecordBatch, column: &str, row: usize) -> AppResult<String> {
    let array = batch
        .column_by_name(column)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Index(format!("Invalid {} column", column)))?;
    Ok(if array.is_null(row) {
        String::new()
    } else {
        array.value(row).to_string()
    })
}

fn embedding_value(batch: &RecordBatch, row: usize) -> AppResult<Vec<f32>> {
    let list = batch
        .column_by_name("embedding")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| AppError::Index("Invalid embedding column".to_string()))?;

    let values = list.value(row);
    let values = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| AppError::Index("Invalid embedding values".to_string()))?;

    Ok(values.values().to_vec())
}

fn check_filter(filter: &WhereClause) -> AppResult<()> {
    match filter.keys().find(|key| !FILTER_COLUMNS.contains(key)) {
        Some(key) => Err(AppError::Index(format!(
            "Cannot filter on '{}'. Filterable fields: {}",
            key,
            FILTER_COLUMNS.join(", ")
        ))),
        None => Ok(()),
    }
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend(&self) -> &str {
        "lancedb"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn add(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        documents: &[String],
        metadatas: &[Metadata],
    ) -> AppResult<()> {
        validate_batch(ids, vectors, documents, metadatas, self.dimensions)?;
        if ids.is_empty() {
            return Ok(());
        }

        if let Some(id) = self.find_existing(ids).await? {
            return Err(AppError::Index(format!("Id already indexed: '{}'", id)));
        }

        let batch = self.to_batch(ids, vectors, documents, metadatas)?;
        let schema = batch.schema();
        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to add entries: {}", e)))?;

        debug!("Inserted {} entries into LanceDB", ids.len());
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&WhereClause>,
    ) -> AppResult<Vec<RetrievalHit>> {
        if vector.len() != self.dimensions {
            return Err(AppError::Index(format!(
                "Query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut query = self
            .table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::Index(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(k);

        if let Some(filter) = filter {
            check_filter(filter)?;
            query = query.only_if(filter.to_sql());
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to execute search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| AppError::Index(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let metadata: Metadata =
                    serde_json::from_str(&string_value(batch, "metadata", row)?)?;
                let embedding = embedding_value(batch, row)?;
                hits.push(RetrievalHit::new(
                    string_value(batch, "id", row)?,
                    string_value(batch, "text", row)?,
                    metadata,
                    cosine_distance(vector, &embedding),
                ));
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        debug!(hits = hits.len(), k, filtered = filter.is_some(), "LanceDB search");
        Ok(hits)
    }

    async fn count(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))
    }

    async fn clear(&self) -> AppResult<()> {
        if self.count().await? > 0 {
            self.table
                .delete("id IS NOT NULL")
                .await
                .map_err(|e| AppError::Index(format!("Failed to clear index: {}", e)))?;
        }
        info!("Cleared LanceDB collection at {:?}", self.path);
        Ok(())
    }
}
