//! Dispatch contracts every registry must satisfy.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use tessera_core::prelude::*;
use tessera_core::protocol::{self, ProtocolResolver};

#[derive(Debug, Clone)]
struct Table;

struct TableEncoder;

#[async_trait]
impl DatasetEncoder for TableEncoder {
    fn frame_type(&self) -> FrameType {
        FrameType::of::<Table>()
    }

    async fn encode(
        &self,
        ctx: &ExecutionContext,
        dataset: &DatasetValue,
        schema: &DatasetSchema,
    ) -> Result<PersistedDataset> {
        dataset.require_frame::<Table>()?;
        let uri = dataset
            .uri()
            .map_or_else(|| ctx.random_remote_directory(), str::to_string);
        Ok(PersistedDataset::new(uri, DatasetMetadata::new(schema.clone())))
    }
}

struct TableDecoder;

#[async_trait]
impl DatasetDecoder for TableDecoder {
    fn frame_type(&self) -> FrameType {
        FrameType::of::<Table>()
    }

    async fn decode(
        &self,
        _ctx: &ExecutionContext,
        _persisted: &PersistedDataset,
        _expected: &DatasetMetadata,
    ) -> Result<Frame> {
        Ok(Frame::new(Table))
    }
}

fn same<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

fn table() -> FrameType {
    FrameType::of::<Table>()
}

#[test]
fn more_specific_format_beats_protocol_wildcard() {
    let registry = HandlerRegistry::new();
    let exact = Arc::new(TableEncoder);
    let wildcard = Arc::new(TableEncoder);
    registry
        .register_encoder(exact.clone(), Registration::new("s3", "parquet"))
        .unwrap();
    registry
        .register_encoder(wildcard.clone(), Registration::new("s3", Selector::Any))
        .unwrap();

    let resolved = registry.resolve_encoder(table(), "s3", "parquet").unwrap();
    assert!(same(&resolved, &exact));
    assert!(!same(&resolved, &wildcard));
}

#[test]
fn generic_default_serves_unregistered_protocol_and_format() {
    let registry = HandlerRegistry::new();
    let fallback = Arc::new(TableDecoder);
    registry
        .register_decoder(fallback.clone(), Registration::any().default_for_type())
        .unwrap();

    let resolved = registry.resolve_decoder(table(), "gcs", "parquet").unwrap();
    assert!(same(&resolved, &fallback));
}

#[test]
fn miss_names_type_protocol_and_format() {
    let registry = HandlerRegistry::new();
    registry
        .register_encoder(Arc::new(TableEncoder), Registration::new("s3", "parquet"))
        .unwrap();

    let err = registry.resolve_encoder(table(), "gs", "csv").err().unwrap();
    assert!(err.is_resolution_failure());
    let message = err.to_string();
    assert!(message.contains("Table"), "{message}");
    assert!(message.contains("gs"), "{message}");
    assert!(message.contains("csv"), "{message}");
}

#[test]
fn azure_alias_resolves_to_abfs_handler() {
    let registry = HandlerRegistry::new();
    let mut handlers = Vec::new();
    for token in [protocol::LOCAL, protocol::S3, protocol::GCS, protocol::ABFS] {
        let encoder = Arc::new(TableEncoder);
        registry
            .register_encoder(encoder.clone(), Registration::new(token, "parquet"))
            .unwrap();
        handlers.push((token, encoder));
    }
    registry.register_protocol_alias("wasbs", protocol::ABFS).unwrap();

    let abfs = &handlers
        .iter()
        .find(|(token, _)| *token == protocol::ABFS)
        .unwrap()
        .1;
    for alias in ["abfss", "az", "wasbs"] {
        let resolved = registry.resolve_encoder(table(), alias, "parquet").unwrap();
        assert!(same(&resolved, abfs), "alias {alias}");
    }
    for (token, encoder) in &handlers {
        if *token != protocol::ABFS {
            let resolved = registry.resolve_encoder(table(), "abfss", "parquet").unwrap();
            assert!(!same(&resolved, encoder));
        }
    }
}

#[tokio::test]
async fn engine_encodes_through_resolved_handler() {
    let registry = HandlerRegistry::new();
    registry
        .register_encoder(Arc::new(TableEncoder), Registration::new("memory", "parquet"))
        .unwrap();
    registry
        .register_decoder(Arc::new(TableDecoder), Registration::new("memory", "parquet"))
        .unwrap();

    let ctx = ExecutionContext::builder()
        .raw_output_prefix("memory://scratch")
        .build();
    let engine = DatasetEngine::new(&registry);
    let schema = DatasetSchema::new().with_format("parquet");

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(Table), &schema)
        .await
        .unwrap();
    assert!(persisted.uri.starts_with("memory://scratch/"));

    let _: Table = engine
        .decode(&ctx, &persisted, &DatasetMetadata::empty())
        .await
        .unwrap();
}

fn token() -> impl Strategy<Value = String> {
    // "x" prefix keeps generated tokens clear of the built-in aliases
    "x[a-z0-9]{1,6}"
}

proptest! {
    #[test]
    fn every_registered_triple_resolves_to_itself(
        keys in prop::collection::btree_set((token(), token()), 1..12)
    ) {
        let registry = HandlerRegistry::new();
        let mut registered = Vec::new();
        for (protocol, format) in &keys {
            let encoder = Arc::new(TableEncoder);
            registry
                .register_encoder(encoder.clone(), Registration::new(protocol.as_str(), format.as_str()))
                .unwrap();
            registered.push((protocol.clone(), format.clone(), encoder));
        }

        for (protocol, format, encoder) in &registered {
            let resolved = registry
                .resolve_encoder(table(), protocol.as_str(), format.as_str())
                .unwrap();
            prop_assert!(same(&resolved, encoder));
        }

        let listed: BTreeSet<_> = registry
            .encoder_keys()
            .unwrap()
            .into_iter()
            .map(|(key, _)| (key.protocol.to_string(), key.format.to_string()))
            .collect();
        prop_assert_eq!(listed, keys);
    }

    #[test]
    fn protocol_resolution_is_total(uri in ".{0,64}") {
        let token = ProtocolResolver::new().protocol_of(&uri);
        prop_assert!(!token.is_empty());
        prop_assert_eq!(token.clone(), token.to_ascii_lowercase());
    }
}
