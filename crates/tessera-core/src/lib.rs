//! # tessera-core
//!
//! Pluggable codec registry for structured datasets.
//!
//! An in-memory table and a persisted artifact at a URI are two forms of the
//! same dataset. Converting between them is delegated to handlers selected on
//! three independent axes:
//!
//! - **Type**: the runtime type of the in-memory value ([`FrameType`])
//! - **Protocol**: the storage backend class of the URI (`file`, `s3`, `gs`, `abfs`)
//! - **Format**: the on-disk serialization (`parquet`, ...)
//!
//! This crate provides:
//!
//! - **Dataset types**: [`DatasetValue`], [`PersistedDataset`], schema metadata
//! - **Handler contracts**: [`DatasetEncoder`] and [`DatasetDecoder`]
//! - **Registry**: [`HandlerRegistry`] with wildcard matching and default selection
//! - **Engine**: [`DatasetEngine`], the caller-facing encode/decode entry point
//! - **Storage**: [`StorageBackend`] implementations and [`StorageSession`] mounts
//! - **Credentials**: a bearer-token cache over a pluggable secret store
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::prelude::*;
//!
//! let registry = HandlerRegistry::new();
//! tessera_parquet::register_handlers(&registry)?;
//!
//! let ctx = ExecutionContext::builder()
//!     .raw_output_prefix("s3://analytics/raw")
//!     .session(StorageSession::standard())
//!     .build();
//!
//! let engine = DatasetEngine::new(&registry);
//! let schema = DatasetSchema::new().with_format("parquet");
//! let persisted = engine.encode(&ctx, &DatasetValue::from_frame(batch), &schema).await?;
//! let batch: RecordBatch = engine.decode(&ctx, &persisted, &DatasetMetadata::empty()).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod credentials;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod handler;
pub mod key;
pub mod metrics;
pub mod object_store_backend;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tessera_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::context::ExecutionContext;
    pub use crate::dataset::{
        Column, DatasetMetadata, DatasetSchema, DatasetValue, Frame, LogicalType,
        PersistedDataset,
    };
    pub use crate::engine::DatasetEngine;
    pub use crate::error::{Error, Result};
    pub use crate::handler::{DatasetDecoder, DatasetEncoder, HandlerKind};
    pub use crate::key::{FrameType, HandlerKey, Selector};
    pub use crate::registry::{HandlerRegistry, Registration};
    pub use crate::session::StorageSession;
    pub use crate::storage::{MemoryBackend, StorageBackend, WritePrecondition, WriteResult};
}

// Re-export key types at crate root for ergonomics
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use credentials::{CredentialCache, Credentials, SecretStore, SecretStoreError};
pub use dataset::{
    Column, DatasetMetadata, DatasetSchema, DatasetValue, Frame, LogicalType, PersistedDataset,
};
pub use engine::DatasetEngine;
pub use error::{Error, Result};
pub use handler::{DatasetDecoder, DatasetEncoder, HandlerKind};
pub use key::{FrameType, HandlerKey, Selector};
pub use object_store_backend::ObjectStoreBackend;
pub use observability::{LogFormat, init_logging};
pub use protocol::{Location, ProtocolResolver};
pub use registry::{HandlerRegistry, Registration};
pub use session::StorageSession;
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult};
