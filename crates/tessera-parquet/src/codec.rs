//! Parquet byte-level encoding for record batches.

use std::io::Cursor;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tessera_core::error::{Error, Result};

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(concat!("tessera-parquet ", env!("CARGO_PKG_VERSION")).to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Serializes one batch as a complete Parquet file.
pub(crate) fn write_batch(batch: &RecordBatch) -> Result<Bytes> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, batch.schema(), Some(writer_properties()))
        .map_err(|e| Error::codec(format!("parquet writer init failed: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| Error::codec(format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::codec(format!("parquet close failed: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Reads a Parquet file, optionally restricted to `columns`.
///
/// Returns the (projected) file schema alongside the batches so empty files
/// still report their columns.
pub(crate) fn read_batches(
    bytes: &Bytes,
    columns: Option<&[&str]>,
) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| Error::codec(format!("parquet reader init failed: {e}")))?;

    if let Some(columns) = columns {
        let indices = columns
            .iter()
            .map(|name| {
                builder.schema().index_of(name).map_err(|_| {
                    Error::codec(format!("column '{name}' not present in parquet file"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        builder = builder.with_projection(mask);
    }

    let reader = builder
        .build()
        .map_err(|e| Error::codec(format!("parquet reader build failed: {e}")))?;
    let schema = reader.schema();

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::codec(format!("parquet read batch failed: {e}")))?;
    Ok((schema, batches))
}

/// Concatenates batches that share `schema` into one.
pub(crate) fn concat(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch> {
    arrow::compute::concat_batches(schema, batches)
        .map_err(|e| Error::codec(format!("parquet parts have incompatible schemas: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn written_file_carries_created_by() {
        let bytes = write_batch(&batch()).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).unwrap();
        let kv = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        assert!(
            kv.iter()
                .any(|e| e.key == "created_by"
                    && e.value.as_deref().is_some_and(|v| v.starts_with("tessera-parquet")))
        );
    }

    #[test]
    fn projection_reads_requested_columns_only() {
        let bytes = write_batch(&batch()).unwrap();
        let (schema, batches) = read_batches(&bytes, Some(&["name"])).unwrap();
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.field(0).name(), "name");
        assert_eq!(concat(&schema, &batches).unwrap().num_rows(), 2);
    }

    #[test]
    fn unknown_column_is_a_codec_error() {
        let bytes = write_batch(&batch()).unwrap();
        let err = read_batches(&bytes, Some(&["id", "missing"])).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(read_batches(&Bytes::from_static(b"not parquet"), None).is_err());
    }
}
