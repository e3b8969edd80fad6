//! Caller-facing encode/decode entry points.
//!
//! [`DatasetEngine`] derives the dispatch key from the values it is given,
//! resolves the handler and awaits it once:
//!
//! - protocol: from the dataset URI, else from the context's output prefix
//! - format: from the declared schema, else any format (which falls back to
//!   the only handler registered for the type and protocol)
//! - type: from the in-memory frame (encode) or the requested `T` (decode)
//!
//! Handler failures are returned unchanged.

use std::any::Any;
use std::future::Future;
use std::time::Instant;

use tracing::Instrument;

use crate::context::ExecutionContext;
use crate::dataset::{DatasetMetadata, DatasetSchema, DatasetValue, Frame, PersistedDataset};
use crate::error::{Error, Result};
use crate::handler::HandlerKind;
use crate::key::{FrameType, Selector};
use crate::metrics::{self, Outcome};
use crate::observability::codec_span;
use crate::registry::{self, HandlerRegistry};

/// Encodes and decodes datasets through a [`HandlerRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct DatasetEngine<'r> {
    registry: &'r HandlerRegistry,
}

impl<'r> DatasetEngine<'r> {
    /// Engine over `registry`.
    #[must_use]
    pub fn new(registry: &'r HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry this engine dispatches through.
    #[must_use]
    pub fn registry(&self) -> &'r HandlerRegistry {
        self.registry
    }
}

impl DatasetEngine<'static> {
    /// Engine over the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryUninitialized`] before
    /// [`initialize_global`](crate::registry::initialize_global).
    pub fn global() -> Result<Self> {
        registry::global().map(Self::new)
    }
}

impl DatasetEngine<'_> {
    /// Persists `value` according to `schema`.
    ///
    /// A value that holds only a URI is already persisted; it is described
    /// without invoking any handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHandler`] when no encoder matches, or the encoder's
    /// own error.
    pub async fn encode(
        &self,
        ctx: &ExecutionContext,
        value: &DatasetValue,
        schema: &DatasetSchema,
    ) -> Result<PersistedDataset> {
        let Some(frame) = value.frame() else {
            let uri = value.uri().ok_or_else(|| {
                Error::InvalidInput("dataset value has neither frame nor uri".to_string())
            })?;
            tracing::debug!(uri, "dataset already persisted, skipping encoder");
            let metadata = value
                .metadata()
                .cloned()
                .unwrap_or_else(|| DatasetMetadata::new(schema.clone()));
            return Ok(PersistedDataset::new(uri, metadata));
        };

        let target = value.uri().unwrap_or_else(|| ctx.raw_output_prefix());
        let protocol = self.registry.protocol_of(target)?;
        let format = Selector::from(schema.format.as_deref());
        let frame_type = frame.frame_type();

        self.dispatch(HandlerKind::Encoder, frame_type, &protocol, &format, async {
            let encoder = self
                .registry
                .resolve_encoder(frame_type, protocol.as_str(), format.clone())?;
            tracing::debug!(encoder = encoder.name(), "encoding dataset");
            let persisted = encoder.encode(ctx, value, schema).await?;
            tracing::Span::current().record("uri", persisted.uri.as_str());
            Ok(persisted)
        })
        .await
    }

    /// Loads `persisted` as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHandler`] when no decoder for `T` matches,
    /// [`Error::TypeMismatch`] if the decoder returns another type, or the
    /// decoder's own error.
    pub async fn decode<T: Any + Send + Sync + Clone>(
        &self,
        ctx: &ExecutionContext,
        persisted: &PersistedDataset,
        expected: &DatasetMetadata,
    ) -> Result<T> {
        self.decode_frame(ctx, FrameType::of::<T>(), persisted, expected)
            .await?
            .into_inner::<T>()
    }

    /// Loads `persisted` as a type-erased frame of `frame_type`.
    ///
    /// # Errors
    ///
    /// Same as [`decode`](Self::decode).
    pub async fn decode_frame(
        &self,
        ctx: &ExecutionContext,
        frame_type: FrameType,
        persisted: &PersistedDataset,
        expected: &DatasetMetadata,
    ) -> Result<Frame> {
        let protocol = self.registry.protocol_of(&persisted.uri)?;
        let format = Selector::from(persisted.metadata.format().or_else(|| expected.format()));

        self.dispatch(HandlerKind::Decoder, frame_type, &protocol, &format, async {
            let decoder = self
                .registry
                .resolve_decoder(frame_type, protocol.as_str(), format.clone())?;
            tracing::Span::current().record("uri", persisted.uri.as_str());
            tracing::debug!(decoder = decoder.name(), "decoding dataset");
            let frame = decoder.decode(ctx, persisted, expected).await?;
            if frame.frame_type() != frame_type {
                return Err(Error::TypeMismatch {
                    expected: frame_type.name(),
                    found: frame.frame_type().name(),
                });
            }
            Ok(frame)
        })
        .await
    }

    async fn dispatch<T>(
        &self,
        kind: HandlerKind,
        frame_type: FrameType,
        protocol: &str,
        format: &Selector,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let format_label = format.to_string();
        let span = codec_span(kind, frame_type.name(), protocol, &format_label);
        let started = Instant::now();

        let result = call.instrument(span.clone()).await;

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(e) if e.is_resolution_failure() => Outcome::Unresolved,
            Err(_) => Outcome::Failure,
        };
        metrics::record_codec_call(kind, protocol, &format_label, outcome, started.elapsed());
        if let Err(e) = &result {
            span.in_scope(|| tracing::warn!(error = %e, "{kind} call failed"));
        }
        result
    }
}
