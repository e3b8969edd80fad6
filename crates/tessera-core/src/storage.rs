//! Object storage abstraction used by dataset handlers.
//!
//! Handlers move bytes through [`StorageBackend`] rather than a concrete
//! client, so the same encoder works against a local filesystem, an object
//! store or [`MemoryBackend`] in tests.
//!
//! Keys are plain `/`-separated object paths relative to the backend root.
//! Mapping a URI to a backend and key is the job of
//! [`StorageSession`](crate::session::StorageSession).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Precondition for a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Write only if no object exists at the path.
    DoesNotExist,
    /// Write unconditionally, replacing any existing object.
    None,
}

/// Outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// The object was written.
    Success {
        /// Version token of the new object.
        version: String,
    },
    /// The precondition did not hold; nothing was written.
    PreconditionFailed {
        /// Version token of the object that blocked the write.
        current_version: String,
    },
}

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Opaque version token.
    pub version: String,
    /// Last modification time, if the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend for dataset artifacts.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object.
    ///
    /// A failed precondition is reported as
    /// [`WriteResult::PreconditionFailed`], not as an error.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes an object. Succeeds if the object doesn't exist.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects under `prefix`, sorted by path.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Reads object metadata. Returns `None` if the object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    async fn get(&self, path: &str) -> Result<Bytes> {
        (**self).get(path).await
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        (**self).put(path, data, precondition).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        (**self).list(prefix).await
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        (**self).head(path).await
    }
}

/// In-memory storage backend.
///
/// Thread-safe via `RwLock`. Versions are per-path counters starting at 1.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: u64,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, path: &str) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: self.data.len() as u64,
            version: self.version.to_string(),
            last_modified: Some(self.last_modified),
        }
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

impl MemoryBackend {
    /// Creates an empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.objects.read().map_err(|_| poisoned())?.len())
    }

    /// Returns true when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        let current = objects.get(path);

        if let (WritePrecondition::DoesNotExist, Some(existing)) = (&precondition, current) {
            return Ok(WriteResult::PreconditionFailed {
                current_version: existing.version.to_string(),
            });
        }

        let version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version,
                last_modified: Utc::now(),
            },
        );
        drop(objects);

        Ok(WriteResult::Success {
            version: version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, obj)| obj.meta(path))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        Ok(self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .get(path)
            .map(|obj| obj.meta(path)))
    }
}
