//! Test storage with operation tracing.
//!
//! Records every call so tests can assert on how a handler touched storage,
//! e.g. that a minted destination was written create-only or that nothing
//! outside the destination was deleted.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tessera_core::error::{Error, Result};
use tessera_core::storage::{ObjectMeta, StorageBackend, WritePrecondition, WriteResult};

/// One call observed by [`TracingMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// `get(path)`.
    Get {
        /// Object key.
        path: String,
    },
    /// `head(path)`.
    Head {
        /// Object key.
        path: String,
    },
    /// `put(path, ..)`.
    Put {
        /// Object key.
        path: String,
        /// Payload length in bytes.
        size: usize,
        /// Requested precondition.
        precondition: WritePrecondition,
    },
    /// `delete(path)`.
    Delete {
        /// Object key.
        path: String,
    },
    /// `list(prefix)`.
    List {
        /// Listed prefix.
        prefix: String,
    },
}

impl StorageOp {
    fn target(&self) -> &str {
        match self {
            Self::Get { path }
            | Self::Head { path }
            | Self::Put { path, .. }
            | Self::Delete { path } => path,
            Self::List { prefix } => prefix,
        }
    }
}

#[derive(Debug, Clone)]
struct Object {
    data: Bytes,
    version: u64,
    written_at: DateTime<Utc>,
}

impl Object {
    fn meta(&self, path: &str) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: self.data.len() as u64,
            version: self.version.to_string(),
            last_modified: Some(self.written_at),
        }
    }
}

/// In-memory [`StorageBackend`] that records calls and fails on demand.
///
/// Clones share state, so a test can keep one handle while a session owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct TracingMemoryBackend {
    objects: Arc<Mutex<BTreeMap<String, Object>>>,
    log: Arc<Mutex<Vec<StorageOp>>>,
    failing_prefixes: Arc<Mutex<Vec<String>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("tracing storage lock poisoned")
}

impl TracingMemoryBackend {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        locked(&self.log).clone()
    }

    /// Recorded puts as `(path, precondition)`.
    #[must_use]
    pub fn puts(&self) -> Vec<(String, WritePrecondition)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StorageOp::Put {
                    path, precondition, ..
                } => Some((path, precondition)),
                _ => None,
            })
            .collect()
    }

    /// Makes every call whose path or prefix starts with `prefix` fail with a
    /// storage error.
    pub fn inject_failure(&self, prefix: impl Into<String>) {
        locked(&self.failing_prefixes).push(prefix.into());
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        locked(&self.objects).keys().cloned().collect()
    }

    /// Writes an object without recording the call.
    pub fn seed(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        let mut objects = locked(&self.objects);
        let path = path.into();
        let version = objects.get(&path).map_or(1, |o| o.version + 1);
        objects.insert(
            path,
            Object {
                data: data.into(),
                version,
                written_at: Utc::now(),
            },
        );
    }

    /// Fails the call if an injected prefix matches, otherwise records it.
    fn observe(&self, op: StorageOp) -> Result<()> {
        let target = op.target();
        if locked(&self.failing_prefixes)
            .iter()
            .any(|prefix| target.starts_with(prefix.as_str()))
        {
            return Err(Error::storage(format!("injected failure for {target}")));
        }
        locked(&self.log).push(op);
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageBackend for TracingMemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        self.observe(StorageOp::Get {
            path: path.to_string(),
        })?;
        locked(&self.objects)
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        self.observe(StorageOp::Head {
            path: path.to_string(),
        })?;
        Ok(locked(&self.objects).get(path).map(|o| o.meta(path)))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        self.observe(StorageOp::Put {
            path: path.to_string(),
            size: data.len(),
            precondition: precondition.clone(),
        })?;

        let mut objects = locked(&self.objects);
        let current = objects.get(path).map(|o| o.version);
        if let (WritePrecondition::DoesNotExist, Some(version)) = (&precondition, current) {
            return Ok(WriteResult::PreconditionFailed {
                current_version: version.to_string(),
            });
        }

        let version = current.map_or(1, |v| v + 1);
        objects.insert(
            path.to_string(),
            Object {
                data,
                version,
                written_at: Utc::now(),
            },
        );
        Ok(WriteResult::Success {
            version: version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.observe(StorageOp::Delete {
            path: path.to_string(),
        })?;
        locked(&self.objects).remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.observe(StorageOp::List {
            prefix: prefix.to_string(),
        })?;
        Ok(locked(&self.objects)
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, o)| o.meta(path))
            .collect())
    }
}
