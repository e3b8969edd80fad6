//! Dataset values, schema metadata and persisted-artifact descriptors.
//!
//! A [`DatasetValue`] is what user code holds: an in-memory [`Frame`], a URI,
//! or both. A [`PersistedDataset`] is the pure-data description of a stored
//! artifact: a location plus [`DatasetMetadata`]. Descriptors never carry live
//! resources, so they serialize to JSON.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::FrameType;

/// Logical column type declared in a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    /// Boolean values.
    Boolean,
    /// Signed integers.
    Integer,
    /// Floating point numbers.
    Float,
    /// UTF-8 strings.
    String,
    /// Raw bytes.
    Binary,
    /// Calendar dates.
    Date,
    /// Timestamps.
    Datetime,
    /// Durations.
    Duration,
    /// Any other type, by name.
    Other(String),
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared logical type.
    pub logical_type: LogicalType,
}

impl Column {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
        }
    }
}

/// Declared dataset schema: ordered columns and an optional storage format.
///
/// An empty column list means "no declared schema": readers return every
/// stored column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Ordered column declarations.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Storage format token (e.g. `parquet`), if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl DatasetSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, logical_type: LogicalType) -> Self {
        self.columns.push(Column::new(name, logical_type));
        self
    }

    /// Sets the storage format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Returns the declared column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Metadata wrapper carried by persisted artifacts and decode requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Declared schema, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<DatasetSchema>,
}

impl DatasetMetadata {
    /// Wraps a schema.
    #[must_use]
    pub fn new(schema: DatasetSchema) -> Self {
        Self {
            schema: Some(schema),
        }
    }

    /// Metadata without a declared schema.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the declared column names, or `None` when every column should
    /// be read.
    #[must_use]
    pub fn projection(&self) -> Option<Vec<&str>> {
        self.schema
            .as_ref()
            .filter(|s| !s.columns.is_empty())
            .map(DatasetSchema::column_names)
    }

    /// Returns the declared format, if any.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.schema.as_ref().and_then(|s| s.format.as_deref())
    }
}

/// Descriptor of a persisted artifact: where it lives and what it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDataset {
    /// Artifact location.
    pub uri: String,
    /// Declared metadata.
    #[serde(default)]
    pub metadata: DatasetMetadata,
}

impl PersistedDataset {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(uri: impl Into<String>, metadata: DatasetMetadata) -> Self {
        Self {
            uri: uri.into(),
            metadata,
        }
    }

    /// Serializes the descriptor to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization {
            message: format!("failed to serialize dataset descriptor: {e}"),
        })
    }

    /// Parses a descriptor from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the input is not a valid descriptor.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization {
            message: format!("failed to parse dataset descriptor: {e}"),
        })
    }
}

/// Type-erased in-memory dataset object.
///
/// Clones share the underlying value.
#[derive(Clone)]
pub struct Frame {
    value: Arc<dyn Any + Send + Sync>,
    frame_type: FrameType,
}

impl Frame {
    /// Wraps an in-memory value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            frame_type: FrameType::of::<T>(),
        }
    }

    /// Returns the runtime type of the wrapped value.
    #[must_use]
    pub const fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Borrows the value as `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the value out as `T`, cloning it if the frame is shared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the frame holds another type.
    pub fn into_inner<T: Any + Send + Sync + Clone>(self) -> Result<T> {
        let found = self.frame_type.name();
        self.value
            .downcast::<T>()
            .map(Arc::unwrap_or_clone)
            .map_err(|_| Error::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found,
            })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("frame_type", &self.frame_type.name())
            .finish_non_exhaustive()
    }
}

/// A dataset as held by user code.
///
/// At least one of the frame and the URI is always set.
#[derive(Debug, Clone)]
pub struct DatasetValue {
    frame: Option<Frame>,
    uri: Option<String>,
    metadata: Option<DatasetMetadata>,
}

impl DatasetValue {
    /// Creates a value from optional parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when both `frame` and `uri` are absent.
    pub fn new(frame: Option<Frame>, uri: Option<String>) -> Result<Self> {
        if frame.is_none() && uri.is_none() {
            return Err(Error::InvalidInput(
                "dataset value needs an in-memory frame or a uri".to_string(),
            ));
        }
        Ok(Self {
            frame,
            uri,
            metadata: None,
        })
    }

    /// Wraps an in-memory object.
    pub fn from_frame<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            frame: Some(Frame::new(value)),
            uri: None,
            metadata: None,
        }
    }

    /// References an already persisted dataset.
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            frame: None,
            uri: Some(uri.into()),
            metadata: None,
        }
    }

    /// Sets the destination/source URI.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns the in-memory frame, if any.
    #[must_use]
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Returns the URI, if any.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Returns the attached metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&DatasetMetadata> {
        self.metadata.as_ref()
    }

    /// Borrows the frame as `T`, enforcing the encoder precondition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionFailed`] if there is no frame and
    /// [`Error::TypeMismatch`] if the frame is not a `T`.
    pub fn require_frame<T: Any>(&self) -> Result<&T> {
        let frame = self.frame.as_ref().ok_or_else(|| {
            Error::precondition(format!(
                "dataset has no in-memory {} to encode",
                std::any::type_name::<T>()
            ))
        })?;
        frame.downcast_ref::<T>().ok_or_else(|| Error::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: frame.frame_type().name(),
        })
    }
}
