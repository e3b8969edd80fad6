//! # tessera-parquet
//!
//! Arrow [`RecordBatch`](arrow::record_batch::RecordBatch) <-> Parquet
//! handlers for the tessera registry.
//!
//! Artifacts are directories holding `*.parquet` part files. The encoder
//! writes a single part, `part-00000.parquet`; the decoder reads every part
//! under the location (or a single file if the URI names one) and applies
//! the declared column projection.
//!
//! Storage is reached through the
//! [`StorageSession`](tessera_core::session::StorageSession) installed in the
//! execution context.
//!
//! ## Example
//!
//! ```rust,ignore
//! let registry = HandlerRegistry::new();
//! tessera_parquet::register_handlers(&registry)?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

mod codec;
pub mod decoder;
pub mod encoder;

use std::sync::Arc;

use tessera_core::error::Result;
use tessera_core::protocol;
use tessera_core::registry::{HandlerRegistry, Registration};

pub use decoder::ParquetDecoder;
pub use encoder::ParquetEncoder;

/// Format token served by this crate.
pub const PARQUET: &str = "parquet";

/// Name of the part file the encoder writes.
pub const PART_FILE: &str = "part-00000.parquet";

/// Protocols registered by [`register_handlers`].
pub const PROTOCOLS: [&str; 4] = [protocol::LOCAL, protocol::S3, protocol::GCS, protocol::ABFS];

/// Registers the encoder and decoder for every protocol in [`PROTOCOLS`].
///
/// None of them is the default for `RecordBatch`.
///
/// # Errors
///
/// Returns the registry error if any key is already taken or the registry is
/// sealed.
pub fn register_handlers(registry: &HandlerRegistry) -> Result<()> {
    register_handlers_for(registry, &PROTOCOLS)
}

/// Registers the encoder and decoder for each of `protocols`.
///
/// # Errors
///
/// Same as [`register_handlers`].
pub fn register_handlers_for(registry: &HandlerRegistry, protocols: &[&str]) -> Result<()> {
    for protocol in protocols {
        registry.register_encoder(
            Arc::new(ParquetEncoder::new(*protocol)),
            Registration::new(*protocol, PARQUET),
        )?;
        registry.register_decoder(
            Arc::new(ParquetDecoder::new(*protocol)),
            Registration::new(*protocol, PARQUET),
        )?;
    }
    tracing::info!(protocols = ?protocols, format = PARQUET, "registered parquet handlers");
    Ok(())
}
