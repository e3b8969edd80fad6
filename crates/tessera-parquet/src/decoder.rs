//! Parquet to record batch decoder.

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use tessera_core::context::ExecutionContext;
use tessera_core::dataset::{DatasetMetadata, Frame, PersistedDataset};
use tessera_core::error::{Error, Result};
use tessera_core::handler::DatasetDecoder;
use tessera_core::key::FrameType;
use tessera_core::session::StorageSession;

use crate::codec;

/// Reads a Parquet file or directory into one [`RecordBatch`].
///
/// A URI naming an object is read directly. Otherwise every `*.parquet`
/// object under it is read in path order and concatenated.
#[derive(Debug, Clone)]
pub struct ParquetDecoder {
    protocol: String,
}

impl ParquetDecoder {
    /// Decoder serving `protocol`.
    #[must_use]
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
        }
    }

    /// Protocol this decoder was registered for.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }
}

#[async_trait]
impl DatasetDecoder for ParquetDecoder {
    fn frame_type(&self) -> FrameType {
        FrameType::of::<RecordBatch>()
    }

    fn name(&self) -> &'static str {
        "parquet-decoder"
    }

    async fn decode(
        &self,
        ctx: &ExecutionContext,
        persisted: &PersistedDataset,
        expected: &DatasetMetadata,
    ) -> Result<Frame> {
        let session = ctx.session::<StorageSession>()?;
        let (backend, key) = session.resolve(&persisted.uri)?;

        let parts = if !key.is_empty() && backend.head(&key).await?.is_some() {
            vec![key]
        } else {
            let prefix = if key.is_empty() {
                String::new()
            } else {
                format!("{key}/")
            };
            backend
                .list(&prefix)
                .await?
                .into_iter()
                .map(|meta| meta.path)
                .filter(|path| path.ends_with(".parquet"))
                .collect()
        };
        if parts.is_empty() {
            return Err(Error::NotFound(format!(
                "no parquet files at {}",
                persisted.uri
            )));
        }

        let projection = expected.projection();
        let mut schema = None;
        let mut batches = Vec::new();
        for part in &parts {
            let bytes = backend.get(part).await?;
            let (part_schema, part_batches) = codec::read_batches(&bytes, projection.as_deref())?;
            schema.get_or_insert(part_schema);
            batches.extend(part_batches);
        }

        let Some(schema) = schema else {
            return Err(Error::Internal {
                message: "parquet parts produced no schema".into(),
            });
        };
        let batch = codec::concat(&schema, &batches)?;

        tracing::debug!(
            uri = %persisted.uri,
            protocol = %self.protocol,
            parts = parts.len(),
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "read parquet dataset"
        );
        Ok(Frame::new(batch))
    }
}
