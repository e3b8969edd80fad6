//! [`StorageBackend`] over the `object_store` crate.
//!
//! One backend wraps one bucket (or container, or filesystem root). Cloud
//! constructors are behind the `aws`, `gcp` and `azure` features and read
//! credentials from the standard environment variables of each provider.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend, WritePrecondition, WriteResult};

/// Storage backend backed by an [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreBackend {
    /// Wraps an existing store. `label` identifies it in errors and logs.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// Local filesystem rooted at `/`; keys are absolute paths without the
    /// leading slash.
    #[must_use]
    pub fn local() -> Self {
        Self::new(Arc::new(LocalFileSystem::new()), "file://")
    }

    /// Process-local in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory://")
    }

    /// Amazon S3 bucket, configured from `AWS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client cannot be built.
    #[cfg(feature = "aws")]
    pub fn s3(bucket: &str) -> Result<Self> {
        let store = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::Config(format!("failed to build s3 client for {bucket}: {e}")))?;
        Ok(Self::new(Arc::new(store), format!("s3://{bucket}")))
    }

    /// Google Cloud Storage bucket, configured from `GOOGLE_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client cannot be built.
    #[cfg(feature = "gcp")]
    pub fn gcs(bucket: &str) -> Result<Self> {
        let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::Config(format!("failed to build gcs client for {bucket}: {e}")))?;
        Ok(Self::new(Arc::new(store), format!("gs://{bucket}")))
    }

    /// Azure Blob Storage container, configured from `AZURE_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client cannot be built.
    #[cfg(feature = "azure")]
    pub fn azure(container: &str) -> Result<Self> {
        let store = object_store::azure::MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| {
                Error::Config(format!("failed to build azure client for {container}: {e}"))
            })?;
        Ok(Self::new(Arc::new(store), format!("abfs://{container}")))
    }

    fn map_err(&self, op: &str, path: &str, err: object_store::Error) -> Error {
        match err {
            object_store::Error::NotFound { .. } => {
                Error::NotFound(format!("object not found: {}/{path}", self.label))
            }
            other => {
                Error::storage_with_source(format!("{op} {}/{path} failed", self.label), other)
            }
        }
    }
}

fn to_meta(meta: object_store::ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        path: meta.location.to_string(),
        size: u64::try_from(meta.size).unwrap_or(u64::MAX),
        version: meta.e_tag.or(meta.version).unwrap_or_default(),
        last_modified: Some(meta.last_modified),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = Path::from(path);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.map_err("get", path, e))?;
        result.bytes().await.map_err(|e| self.map_err("get", path, e))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let location = Path::from(path);
        let options = match precondition {
            WritePrecondition::DoesNotExist => PutOptions::from(PutMode::Create),
            WritePrecondition::None => PutOptions::default(),
        };

        match self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await
        {
            Ok(result) => Ok(WriteResult::Success {
                version: result.e_tag.or(result.version).unwrap_or_default(),
            }),
            Err(object_store::Error::AlreadyExists { .. }) => {
                let current_version = self
                    .head(path)
                    .await?
                    .map(|meta| meta.version)
                    .unwrap_or_default();
                Ok(WriteResult::PreconditionFailed { current_version })
            }
            Err(e) => Err(self.map_err("put", path, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match self.store.delete(&Path::from(path)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(self.map_err("delete", path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let location = Path::from(prefix);
        let mut objects: Vec<ObjectMeta> = self
            .store
            .list(Some(&location))
            .map_ok(to_meta)
            .try_collect()
            .await
            .map_err(|e| self.map_err("list", prefix, e))?;
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        match self.store.head(&Path::from(path)).await {
            Ok(meta) => Ok(Some(to_meta(meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(self.map_err("head", path, e)),
        }
    }
}
