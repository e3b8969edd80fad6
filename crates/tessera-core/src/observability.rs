//! Logging setup and span helpers.
//!
//! Library code only emits `tracing` events; binaries and tests decide where
//! they go by calling [`init_logging`].

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::handler::HandlerKind;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Safe to call multiple times; only the first call installs a subscriber.
/// `RUST_LOG` controls levels (e.g. `info`, `tessera_core=debug`).
///
/// # Example
///
/// ```rust
/// use tessera_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // try_init: a host application may already own the global subscriber
        let _ = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init(),
        };
    });
}

/// Creates the span wrapping one encode or decode call.
///
/// # Example
///
/// ```rust
/// use tessera_core::handler::HandlerKind;
/// use tessera_core::observability::codec_span;
///
/// let span = codec_span(HandlerKind::Encoder, "arrow_array::RecordBatch", "s3", "parquet");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn codec_span(kind: HandlerKind, type_name: &str, protocol: &str, format: &str) -> Span {
    tracing::info_span!(
        "codec",
        op = kind.as_str(),
        frame_type = type_name,
        protocol = protocol,
        format = format,
        uri = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn codec_span_accepts_late_uri() {
        let span = codec_span(HandlerKind::Decoder, "Frame", "gs", "*");
        span.record("uri", "gs://bucket/raw/x");
        let _guard = span.enter();
        tracing::info!("decoding");
    }
}
