//! Encoder and decoder capabilities.
//!
//! Handlers are registered per (type, protocol, format) in a
//! [`HandlerRegistry`](crate::registry::HandlerRegistry). The contracts:
//!
//! | Capability | Input | Output |
//! |------------|-------|--------|
//! | [`DatasetEncoder`] | [`DatasetValue`] + target [`DatasetSchema`] | [`PersistedDataset`] |
//! | [`DatasetDecoder`] | [`PersistedDataset`] + expected [`DatasetMetadata`] | [`Frame`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_core::prelude::*;
//!
//! struct CsvEncoder;
//!
//! #[async_trait::async_trait]
//! impl DatasetEncoder for CsvEncoder {
//!     fn frame_type(&self) -> FrameType {
//!         FrameType::of::<MyTable>()
//!     }
//!
//!     async fn encode(
//!         &self,
//!         ctx: &ExecutionContext,
//!         dataset: &DatasetValue,
//!         schema: &DatasetSchema,
//!     ) -> Result<PersistedDataset> {
//!         let table = dataset.require_frame::<MyTable>()?;
//!         let uri = dataset
//!             .uri()
//!             .map_or_else(|| ctx.random_remote_directory(), str::to_string);
//!         // ... write `table` to `uri` ...
//!         Ok(PersistedDataset::new(uri, DatasetMetadata::new(schema.clone())))
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::dataset::{DatasetMetadata, DatasetSchema, DatasetValue, Frame, PersistedDataset};
use crate::error::Result;
use crate::key::FrameType;

/// Which capability a registry operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// [`DatasetEncoder`].
    Encoder,
    /// [`DatasetDecoder`].
    Decoder,
}

impl HandlerKind {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encoder => "encoder",
            Self::Decoder => "decoder",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists an in-memory dataset.
///
/// # Contract
///
/// - `dataset` carries a frame of [`frame_type`](Self::frame_type); use
///   [`DatasetValue::require_frame`] to enforce it.
/// - A URI on `dataset` is the write target and is overwritten; without one
///   the encoder writes to [`ExecutionContext::random_remote_directory`].
/// - The returned descriptor wraps `schema`, not a schema discovered from
///   the data.
/// - Failures propagate unchanged; the registry never retries.
#[async_trait]
pub trait DatasetEncoder: Send + Sync + 'static {
    /// The in-memory type this encoder accepts.
    fn frame_type(&self) -> FrameType;

    /// Handler name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Writes `dataset` and describes the written artifact.
    async fn encode(
        &self,
        ctx: &ExecutionContext,
        dataset: &DatasetValue,
        schema: &DatasetSchema,
    ) -> Result<PersistedDataset>;
}

/// Loads a persisted dataset into memory.
///
/// # Contract
///
/// - When `expected` declares columns, exactly those columns are read; a
///   declared column missing from the artifact is an error.
/// - Without declared columns, every stored column is returned.
/// - Sessions and clients come from `ctx` at call time, never from the
///   descriptor.
/// - The returned frame has type [`frame_type`](Self::frame_type).
#[async_trait]
pub trait DatasetDecoder: Send + Sync + 'static {
    /// The in-memory type this decoder produces.
    fn frame_type(&self) -> FrameType;

    /// Handler name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Reads `persisted` into memory.
    async fn decode(
        &self,
        ctx: &ExecutionContext,
        persisted: &PersistedDataset,
        expected: &DatasetMetadata,
    ) -> Result<Frame>;
}
