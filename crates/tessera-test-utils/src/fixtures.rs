//! Pre-built test fixtures for common test scenarios.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tessera_core::context::ExecutionContext;
use tessera_core::dataset::{DatasetMetadata, DatasetSchema, LogicalType};
use tessera_core::session::StorageSession;
use tessera_core::storage::StorageBackend;

use crate::storage::TracingMemoryBackend;

/// Storage, session and execution context wired together for one test.
///
/// Everything under `memory://<bucket>/` is served by [`Self::storage`].
pub struct TestContext {
    /// Shared storage backend.
    pub storage: Arc<TracingMemoryBackend>,
    /// Bucket name unique to this context.
    pub bucket: String,
}

impl TestContext {
    /// Creates a context with a unique bucket.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(TracingMemoryBackend::new()),
            bucket: format!("test-{}", ulid::Ulid::new().to_string().to_ascii_lowercase()),
        }
    }

    /// URI of `path` inside the test bucket.
    #[must_use]
    pub fn uri(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path.trim_start_matches('/'))
    }

    /// Storage key that `uri(path)` resolves to.
    #[must_use]
    pub fn key(&self, path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    /// Session mounting the tracing storage at `memory://<bucket>`.
    #[must_use]
    pub fn session(&self) -> StorageSession {
        let mut session = StorageSession::new();
        let storage: Arc<dyn StorageBackend> = self.storage.clone();
        session.mount_arc(&format!("memory://{}", self.bucket), storage);
        session
    }

    /// Execution context minting under `memory://<bucket>/raw`.
    #[must_use]
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::builder()
            .raw_output_prefix(self.uri("raw"))
            .session(self.session())
            .build()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Three-column batch: `a` (int64), `b` (utf8), `c` (float64), three rows.
pub fn sample_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, false),
        Field::new("b", DataType::Utf8, true),
        Field::new("c", DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3])),
        Arc::new(StringArray::from(vec![Some("x"), None, Some("z")])),
        Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
    ];
    RecordBatch::try_new(schema, columns).expect("valid sample batch")
}

/// Declared schema matching [`sample_batch`], with format `parquet`.
pub fn sample_schema() -> DatasetSchema {
    DatasetSchema::new()
        .with_column("a", LogicalType::Integer)
        .with_column("b", LogicalType::String)
        .with_column("c", LogicalType::Float)
        .with_format("parquet")
}

/// Metadata declaring only `columns`.
pub fn projection(columns: &[&str]) -> DatasetMetadata {
    DatasetMetadata::new(
        columns
            .iter()
            .fold(DatasetSchema::new(), |schema, name| {
                schema.with_column(*name, LogicalType::Other("any".into()))
            }),
    )
}

/// Column names of a batch, in order.
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}
