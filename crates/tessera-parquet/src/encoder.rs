//! Record batch to Parquet encoder.

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use tessera_core::context::ExecutionContext;
use tessera_core::dataset::{DatasetMetadata, DatasetSchema, DatasetValue, PersistedDataset};
use tessera_core::error::{Error, Result};
use tessera_core::handler::DatasetEncoder;
use tessera_core::key::FrameType;
use tessera_core::session::StorageSession;
use tessera_core::storage::{WritePrecondition, WriteResult};

use crate::{PART_FILE, codec};

/// Writes a [`RecordBatch`] as a Parquet directory with one part file.
///
/// An explicit destination is replaced: existing objects under it are
/// removed and the part is written unconditionally. A destination at a bucket
/// or filesystem root is rejected. A minted destination is
/// fresh, so the part is written create-only and a collision is an error.
#[derive(Debug, Clone)]
pub struct ParquetEncoder {
    protocol: String,
}

impl ParquetEncoder {
    /// Encoder serving `protocol`.
    #[must_use]
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
        }
    }

    /// Protocol this encoder was registered for.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }
}

#[async_trait]
impl DatasetEncoder for ParquetEncoder {
    fn frame_type(&self) -> FrameType {
        FrameType::of::<RecordBatch>()
    }

    fn name(&self) -> &'static str {
        "parquet-encoder"
    }

    async fn encode(
        &self,
        ctx: &ExecutionContext,
        dataset: &DatasetValue,
        schema: &DatasetSchema,
    ) -> Result<PersistedDataset> {
        let batch = dataset.require_frame::<RecordBatch>()?;
        let (uri, precondition) = match dataset.uri() {
            Some(uri) => (uri.to_string(), WritePrecondition::None),
            None => (ctx.random_remote_directory(), WritePrecondition::DoesNotExist),
        };

        let session = ctx.session::<StorageSession>()?;
        let (backend, dir) = session.resolve(&uri)?;

        if precondition == WritePrecondition::None {
            if dir.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "refusing to overwrite {uri}: destination is a storage root"
                )));
            }
            let existing = backend.list(&format!("{dir}/")).await?;
            for object in &existing {
                backend.delete(&object.path).await?;
            }
            if !existing.is_empty() {
                tracing::debug!(uri = %uri, removed = existing.len(), "cleared destination");
            }
        }

        let data = codec::write_batch(batch)?;
        let size = data.len();
        let key = if dir.is_empty() {
            PART_FILE.to_string()
        } else {
            format!("{dir}/{PART_FILE}")
        };

        match backend.put(&key, data, precondition).await? {
            WriteResult::Success { version } => {
                tracing::debug!(
                    uri = %uri,
                    protocol = %self.protocol,
                    rows = batch.num_rows(),
                    bytes = size,
                    version = %version,
                    "wrote parquet dataset"
                );
            }
            WriteResult::PreconditionFailed { current_version } => {
                return Err(Error::precondition(format!(
                    "minted destination {uri} already holds {PART_FILE} (version {current_version})"
                )));
            }
        }

        Ok(PersistedDataset::new(uri, DatasetMetadata::new(schema.clone())))
    }
}
