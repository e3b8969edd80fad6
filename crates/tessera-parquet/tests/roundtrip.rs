//! End-to-end encode/decode through the registry and engine.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use tessera_core::prelude::*;
use tessera_core::protocol;
use tessera_parquet::{PARQUET, PART_FILE, register_handlers, register_handlers_for};
use tessera_test_utils::{
    StorageOp, TestContext, TracingMemoryBackend, column_names, init_test_logging, projection,
    sample_batch, sample_schema,
};

fn memory_registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    register_handlers_for(&registry, &[protocol::MEMORY]).unwrap();
    registry
}

#[tokio::test]
async fn roundtrip_through_minted_location() {
    init_test_logging();
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();
    assert!(persisted.uri.starts_with(&test.uri("raw/")));
    assert_eq!(persisted.metadata, DatasetMetadata::new(sample_schema()));

    let decoded: RecordBatch = engine
        .decode(&ctx, &persisted, &DatasetMetadata::empty())
        .await
        .unwrap();
    assert_eq!(column_names(&decoded), vec!["a", "b", "c"]);
    assert_eq!(decoded.columns(), sample_batch().columns());
}

#[tokio::test]
async fn minted_destination_is_written_create_only() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);
    let value = DatasetValue::from_frame(sample_batch());

    let first = engine.encode(&ctx, &value, &sample_schema()).await.unwrap();
    let second = engine.encode(&ctx, &value, &sample_schema()).await.unwrap();
    assert_ne!(first.uri, second.uri);

    let puts = test.storage.puts();
    assert_eq!(puts.len(), 2);
    assert!(
        puts.iter()
            .all(|(path, precondition)| path.ends_with(PART_FILE)
                && *precondition == WritePrecondition::DoesNotExist)
    );
    assert!(
        !test
            .storage
            .operations()
            .iter()
            .any(|op| matches!(op, StorageOp::Delete { .. }))
    );
}

#[tokio::test]
async fn explicit_destination_is_overwritten() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);
    let uri = test.uri("tables/events");

    // stale part from an earlier writer must not survive
    test.storage.seed(test.key("tables/events/part-00007.parquet"), "stale");

    let value = DatasetValue::from_frame(sample_batch()).with_uri(uri.clone());
    for _ in 0..2 {
        let persisted = engine.encode(&ctx, &value, &sample_schema()).await.unwrap();
        assert_eq!(persisted.uri, uri);
    }

    assert_eq!(
        test.storage.paths(),
        vec![test.key(&format!("tables/events/{PART_FILE}"))]
    );
    assert!(
        test.storage
            .puts()
            .iter()
            .all(|(_, precondition)| *precondition == WritePrecondition::None)
    );

    let decoded: RecordBatch = engine
        .decode(&ctx, &PersistedDataset::new(uri, DatasetMetadata::empty()), &DatasetMetadata::empty())
        .await
        .unwrap();
    assert_eq!(decoded.num_rows(), 3);
}

#[tokio::test]
async fn overwriting_a_bucket_root_is_rejected() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    test.storage.seed(test.key("other/team/data.parquet"), "keep");
    test.storage.seed(test.key(&format!("raw/older/{PART_FILE}")), "keep");

    let value = DatasetValue::from_frame(sample_batch()).with_uri(format!("memory://{}", test.bucket));
    let err = engine.encode(&ctx, &value, &sample_schema()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    assert_eq!(test.storage.paths().len(), 2);
    assert!(
        !test
            .storage
            .operations()
            .iter()
            .any(|op| matches!(op, StorageOp::Delete { .. } | StorageOp::Put { .. }))
    );
}

#[tokio::test]
async fn schema_without_format_roundtrips() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);
    let schema = DatasetSchema::new()
        .with_column("a", LogicalType::Integer)
        .with_column("b", LogicalType::String)
        .with_column("c", LogicalType::Float);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &schema)
        .await
        .unwrap();
    assert_eq!(persisted.metadata.format(), None);

    let decoded: RecordBatch = engine
        .decode(&ctx, &persisted, &projection(&["b"]))
        .await
        .unwrap();
    assert_eq!(column_names(&decoded), vec!["b"]);
}

#[tokio::test]
async fn projection_returns_exactly_declared_columns() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();

    let decoded: RecordBatch = engine
        .decode(&ctx, &persisted, &projection(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(column_names(&decoded), vec!["a", "b"]);
    assert_eq!(decoded.num_rows(), 3);
}

#[tokio::test]
async fn projecting_a_missing_column_fails() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();

    let err = engine
        .decode::<RecordBatch>(&ctx, &persisted, &projection(&["a", "zzz"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Codec { .. }));
    assert!(err.to_string().contains("zzz"));
}

#[tokio::test]
async fn single_file_uri_is_read_directly() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();
    let file = PersistedDataset::new(
        format!("{}/{PART_FILE}", persisted.uri),
        persisted.metadata.clone(),
    );

    let decoded: RecordBatch = engine
        .decode(&ctx, &file, &DatasetMetadata::empty())
        .await
        .unwrap();
    assert_eq!(decoded.num_rows(), 3);
}

#[tokio::test]
async fn empty_location_is_not_found() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    let err = engine
        .decode::<RecordBatch>(
            &ctx,
            &PersistedDataset::new(test.uri("nothing/here"), DatasetMetadata::empty()),
            &DatasetMetadata::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn storage_failures_propagate_unchanged() {
    let test = TestContext::new();
    let ctx = test.execution_context();
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);

    test.storage.inject_failure("raw/");
    let err = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage { .. }));
}

#[tokio::test]
async fn encoder_rejects_values_of_another_type() {
    let test = TestContext::new();
    let registry = memory_registry();
    let encoder = registry
        .resolve_encoder(FrameType::of::<RecordBatch>(), protocol::MEMORY, PARQUET)
        .unwrap();

    let err = encoder
        .encode(
            &test.execution_context(),
            &DatasetValue::from_frame(String::from("not a batch")),
            &sample_schema(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[tokio::test]
async fn missing_session_is_reported() {
    let registry = memory_registry();
    let engine = DatasetEngine::new(&registry);
    let ctx = ExecutionContext::builder()
        .raw_output_prefix("memory://bucket/raw")
        .build();

    let err = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionUnavailable { .. }));
}

#[tokio::test]
async fn abfss_destination_uses_abfs_handlers() {
    let registry = HandlerRegistry::new();
    register_handlers(&registry).unwrap();

    let storage = Arc::new(TracingMemoryBackend::new());
    let mut session = StorageSession::new();
    let backend: Arc<dyn StorageBackend> = storage.clone();
    session.mount_arc("abfs://container", backend);
    let ctx = ExecutionContext::builder()
        .raw_output_prefix("abfss://container/raw")
        .session(session)
        .build();
    let engine = DatasetEngine::new(&registry);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();
    assert!(persisted.uri.starts_with("abfss://container/raw/"));
    assert_eq!(storage.paths().len(), 1);

    let decoded: RecordBatch = engine
        .decode(&ctx, &persisted, &DatasetMetadata::empty())
        .await
        .unwrap();
    assert_eq!(decoded.num_columns(), 3);
}

#[tokio::test]
async fn registry_alias_covers_dispatch_and_storage() {
    let registry = HandlerRegistry::new();
    registry.register_protocol_alias("wasbs", protocol::ABFS).unwrap();
    register_handlers(&registry).unwrap();

    let storage = Arc::new(TracingMemoryBackend::new());
    let backend: Arc<dyn StorageBackend> = storage.clone();
    let mut session = StorageSession::for_registry(&registry).unwrap();
    session.mount_arc("abfs://container", backend);
    let ctx = ExecutionContext::builder()
        .raw_output_prefix("wasbs://container/raw")
        .session(session)
        .build();
    let engine = DatasetEngine::new(&registry);

    let persisted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();
    assert!(persisted.uri.starts_with("wasbs://container/raw/"));
    assert_eq!(storage.paths().len(), 1);

    let decoded: RecordBatch = engine
        .decode(&ctx, &persisted, &DatasetMetadata::empty())
        .await
        .unwrap();
    assert_eq!(decoded.num_rows(), 3);
}

#[tokio::test]
async fn local_filesystem_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let registry = HandlerRegistry::new();
    register_handlers(&registry).unwrap();
    let engine = DatasetEngine::new(&registry);
    let ctx = ExecutionContext::builder()
        .raw_output_prefix(format!("file://{}/raw", dir.path().display()))
        .session(StorageSession::standard())
        .build();

    let target = format!("{}/explicit", dir.path().display());
    let value = DatasetValue::from_frame(sample_batch()).with_uri(target.clone());
    let persisted = engine.encode(&ctx, &value, &sample_schema()).await.unwrap();
    assert!(dir.path().join("explicit").join(PART_FILE).is_file());

    let decoded: RecordBatch = engine
        .decode(&ctx, &persisted, &projection(&["c"]))
        .await
        .unwrap();
    assert_eq!(column_names(&decoded), vec!["c"]);

    let minted = engine
        .encode(&ctx, &DatasetValue::from_frame(sample_batch()), &sample_schema())
        .await
        .unwrap();
    assert!(minted.uri.starts_with(&format!("file://{}/raw/", dir.path().display())));
}

#[test]
fn register_handlers_covers_all_object_store_protocols() {
    let registry = HandlerRegistry::new();
    register_handlers(&registry).unwrap();

    let protocols: Vec<_> = registry
        .decoder_keys()
        .unwrap()
        .into_iter()
        .map(|(key, is_default)| {
            assert!(!is_default);
            assert_eq!(key.format, Selector::exact(PARQUET));
            key.protocol.to_string()
        })
        .collect();
    assert_eq!(protocols, vec!["abfs", "file", "gs", "s3"]);

    assert!(register_handlers(&registry).is_err());
}
