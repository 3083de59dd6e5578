// LanceDB snapshot store
// Each index id maps to a chunks table and a single-row manifest table


use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::lancedb::Connection;
use ::lancedb::arrow::SendableRecordBatchStream;
use ::lancedb::query::{ExecutableQuery, QueryBase};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tracing::{debug, info};

use super::SnapshotStore;
use crate::embeddings::chunking::Chunk;
use crate::index::{EmbeddedChunk, IndexManifest, IndexSnapshot};
use crate::{RagError, Result};

/// Snapshot store backed by a LanceDB directory
///
/// `write` drops the manifest table first and recreates it last, so an
/// interrupted write leaves no manifest and the id reads as absent.
pub struct LanceSnapshotStore {
    connection: Connection,
    path: PathBuf,
}

impl LanceSnapshotStore {
    /// Open (creating if needed) the LanceDB database at `path`
    #[inline]
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path).map_err(|e| {
            RagError::Storage(format!(
                "Failed to create index directory {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!("Connecting to LanceDB at {}", path.display());
        let connection = ::lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self { connection, path })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn chunks_table(id: &str) -> String {
        format!("{}_chunks", id)
    }

    fn manifest_table(id: &str) -> String {
        format!("{}_manifest", id)
    }

    fn vector_size(dimension: usize) -> Result<i32> {
        i32::try_from(dimension)
            .map_err(|_| RagError::Storage(format!("Vector dimension {} is too large", dimension)))
    }

    fn chunks_schema(dimension: usize) -> Result<Arc<Schema>> {
        let size = Self::vector_size(dimension)?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("position", DataType::UInt32, false),
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("source_path", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("start_offset", DataType::UInt64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    size,
                ),
                false,
            ),
        ])))
    }

    fn manifest_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("embedding_model_id", DataType::Utf8, false),
            Field::new("dimension", DataType::UInt64, false),
            Field::new("max_chunk_length", DataType::UInt64, false),
            Field::new("overlap_length", DataType::UInt64, false),
            Field::new("corpus_fingerprint", DataType::Utf8, false),
            Field::new("chunk_count", DataType::UInt64, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn chunks_batch(snapshot: &IndexSnapshot) -> Result<RecordBatch> {
        let dimension = snapshot.manifest.dimension;
        let len = snapshot.entries.len();

        let mut positions = Vec::with_capacity(len);
        let mut ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut source_paths = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut start_offsets = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * dimension);

        for (position, entry) in snapshot.entries.iter().enumerate() {
            if entry.vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.vector.len(),
                });
            }
            let position = u32::try_from(position)
                .map_err(|_| RagError::Storage("Too many chunks for one index".to_string()))?;

            positions.push(position);
            ids.push(entry.chunk.id.as_str());
            document_ids.push(entry.chunk.document_id.as_str());
            source_paths.push(entry.chunk.source_path.as_str());
            texts.push(entry.chunk.text.as_str());
            start_offsets.push(entry.chunk.start_offset as u64);
            flat_values.extend_from_slice(&entry.vector);
        }

        let schema = Self::chunks_schema(dimension)?;

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            Self::vector_size(dimension)?,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Storage(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt32Array::from(positions)),
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(source_paths)),
            Arc::new(StringArray::from(texts)),
            Arc::new(UInt64Array::from(start_offsets)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Storage(format!("Failed to create record batch: {}", e)))
    }

    fn manifest_batch(manifest: &IndexManifest) -> Result<RecordBatch> {
        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![manifest.embedding_model_id.as_str()])),
            Arc::new(UInt64Array::from(vec![manifest.dimension as u64])),
            Arc::new(UInt64Array::from(vec![manifest.max_chunk_length as u64])),
            Arc::new(UInt64Array::from(vec![manifest.overlap_length as u64])),
            Arc::new(StringArray::from(vec![manifest.corpus_fingerprint.as_str()])),
            Arc::new(UInt64Array::from(vec![manifest.chunk_count as u64])),
            Arc::new(StringArray::from(vec![manifest.created_at.to_rfc3339()])),
        ];

        RecordBatch::try_new(Self::manifest_schema(), arrays)
            .map_err(|e| RagError::Storage(format!("Failed to create manifest batch: {}", e)))
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|t| t == name))
    }

    async fn drop_table_if_exists(&self, name: &str) -> Result<()> {
        if self.table_exists(name).await? {
            debug!("Dropping table {}", name);
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| RagError::Storage(format!("Failed to drop table {}: {}", name, e)))?;
        }
        Ok(())
    }

    async fn create_table(&self, name: &str, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(
            std::iter::once(Ok(batch)),
            schema,
        ));
        self.connection
            .create_table(name, reader)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to create table {}: {}", name, e)))?;
        Ok(())
    }

    async fn read_all(&self, name: &str, limit: usize) -> Result<Vec<RecordBatch>> {
        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to open table {}: {}", name, e)))?;

        let mut stream: SendableRecordBatchStream = table
            .query()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to query table {}: {}", name, e)))?;

        let mut batches = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to read table {}: {}", name, e)))?
        {
            batches.push(batch);
        }
        Ok(batches)
    }

    fn parse_manifest(batches: &[RecordBatch]) -> Result<IndexManifest> {
        let batch = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| RagError::Storage("Manifest table is empty".to_string()))?;

        let created_at = string_column(batch, "created_at")?.value(0);
        let created_at = DateTime::parse_from_rfc3339(created_at)
            .map_err(|e| RagError::Storage(format!("Invalid manifest timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(IndexManifest {
            embedding_model_id: string_column(batch, "embedding_model_id")?
                .value(0)
                .to_string(),
            dimension: u64_column(batch, "dimension")?.value(0) as usize,
            max_chunk_length: u64_column(batch, "max_chunk_length")?.value(0) as usize,
            overlap_length: u64_column(batch, "overlap_length")?.value(0) as usize,
            corpus_fingerprint: string_column(batch, "corpus_fingerprint")?
                .value(0)
                .to_string(),
            chunk_count: u64_column(batch, "chunk_count")?.value(0) as usize,
            created_at,
        })
    }

    fn parse_chunks_batch(batch: &RecordBatch, rows: &mut Vec<(u32, EmbeddedChunk)>) -> Result<()> {
        let positions = batch
            .column_by_name("position")
            .ok_or_else(|| RagError::Storage("Missing position column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| RagError::Storage("Invalid position column type".to_string()))?;
        let ids = string_column(batch, "id")?;
        let document_ids = string_column(batch, "document_id")?;
        let source_paths = string_column(batch, "source_path")?;
        let texts = string_column(batch, "text")?;
        let start_offsets = u64_column(batch, "start_offset")?;
        let vectors = batch
            .column_by_name("vector")
            .ok_or_else(|| RagError::Storage("Missing vector column".to_string()))?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| RagError::Storage("Invalid vector column type".to_string()))?;

        for row in 0..batch.num_rows() {
            let vector_values = vectors.value(row);
            let vector = vector_values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| RagError::Storage("Invalid vector item type".to_string()))?
                .values()
                .to_vec();

            rows.push((
                positions.value(row),
                EmbeddedChunk {
                    chunk: Chunk {
                        id: ids.value(row).to_string(),
                        document_id: document_ids.value(row).to_string(),
                        source_path: source_paths.value(row).to_string(),
                        text: texts.value(row).to_string(),
                        start_offset: start_offsets.value(row) as usize,
                    },
                    vector,
                },
            ));
        }

        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Storage(format!("Invalid {} column type", name)))
}

fn u64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| RagError::Storage(format!("Invalid {} column type", name)))
}

#[async_trait]
impl SnapshotStore for LanceSnapshotStore {
    #[inline]
    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.table_exists(&Self::manifest_table(id)).await?
            && self.table_exists(&Self::chunks_table(id)).await?)
    }

    #[inline]
    async fn write(&self, id: &str, snapshot: &IndexSnapshot) -> Result<()> {
        let chunks_batch = Self::chunks_batch(snapshot)?;
        let manifest_batch = Self::manifest_batch(&snapshot.manifest)?;

        let manifest_table = Self::manifest_table(id);
        let chunks_table = Self::chunks_table(id);

        self.drop_table_if_exists(&manifest_table).await?;
        self.drop_table_if_exists(&chunks_table).await?;

        self.create_table(&chunks_table, chunks_batch).await?;
        self.create_table(&manifest_table, manifest_batch).await?;

        info!(
            "Wrote {} chunks for index '{}' to {}",
            snapshot.entries.len(),
            id,
            self.path.display()
        );
        Ok(())
    }

    #[inline]
    async fn read(&self, id: &str) -> Result<IndexSnapshot> {
        let manifest = self
            .read_manifest(id)
            .await?
            .ok_or_else(|| RagError::Storage(format!("No index stored under '{}'", id)))?;

        let chunks_table = Self::chunks_table(id);
        if !self.table_exists(&chunks_table).await? {
            return Err(RagError::Storage(format!(
                "Index '{}' has a manifest but no chunks table",
                id
            )));
        }

        let batches = self.read_all(&chunks_table, manifest.chunk_count).await?;
        let mut rows = Vec::with_capacity(manifest.chunk_count);
        for batch in &batches {
            Self::parse_chunks_batch(batch, &mut rows)?;
        }

        if rows.len() != manifest.chunk_count {
            return Err(RagError::Storage(format!(
                "Index '{}' manifest lists {} chunks but table holds {}",
                id,
                manifest.chunk_count,
                rows.len()
            )));
        }

        rows.sort_by_key(|(position, _)| *position);
        let entries = rows.into_iter().map(|(_, entry)| entry).collect();

        debug!("Read {} chunks for index '{}'", manifest.chunk_count, id);
        Ok(IndexSnapshot { manifest, entries })
    }

    #[inline]
    async fn read_manifest(&self, id: &str) -> Result<Option<IndexManifest>> {
        let manifest_table = Self::manifest_table(id);
        if !self.table_exists(&manifest_table).await? {
            return Ok(None);
        }

        let batches = self.read_all(&manifest_table, 1).await?;
        Self::parse_manifest(&batches).map(Some)
    }
}
