//! Storage session: maps URIs onto mounted storage backends.
//!
//! A [`StorageSession`] is the live handle handlers pull out of the
//! [`ExecutionContext`](crate::context::ExecutionContext). Dataset
//! descriptors only carry URIs; the session decides which backend serves them.
//!
//! Mounts are keyed by protocol and bucket:
//!
//! ```text
//! mount("s3://analytics", s3)     s3://analytics/raw/x  -> s3, "raw/x"
//! mount("memory://", mem)         memory://b/raw/x      -> mem, "b/raw/x"
//! mount("file:///", local)        /tmp/out              -> local, "tmp/out"
//! ```
//!
//! A bucket-specific mount wins over a protocol-wide one. On a protocol-wide
//! mount the bucket becomes the first key segment.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::object_store_backend::ObjectStoreBackend;
use crate::protocol::{self, Location, ProtocolResolver};
use crate::registry::HandlerRegistry;
use crate::storage::StorageBackend;

struct Mount {
    backend: Arc<dyn StorageBackend>,
    base: String,
}

/// Set of storage backends addressed by URI.
pub struct StorageSession {
    resolver: ProtocolResolver,
    mounts: HashMap<(String, String), Mount>,
}

impl fmt::Debug for StorageSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut roots: Vec<_> = self
            .mounts
            .iter()
            .map(|((protocol, bucket), mount)| format!("{protocol}://{bucket}/{}", mount.base))
            .collect();
        roots.sort();
        f.debug_struct("StorageSession")
            .field("mounts", &roots)
            .finish_non_exhaustive()
    }
}

impl Default for StorageSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Anchors a scheme-less relative path at the working directory.
fn anchor_relative(uri: &str) -> Result<Cow<'_, str>> {
    let path = uri.trim();
    let bytes = path.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.contains("://") || drive || Path::new(path).is_absolute() {
        return Ok(Cow::Borrowed(uri));
    }
    let absolute = std::path::absolute(path)
        .map_err(|e| Error::InvalidInput(format!("cannot resolve local path '{uri}': {e}")))?;
    Ok(Cow::Owned(absolute.to_string_lossy().into_owned()))
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

impl StorageSession {
    /// Creates a session without mounts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(ProtocolResolver::default())
    }

    /// Creates a session that parses URIs with `resolver`.
    #[must_use]
    pub fn with_resolver(resolver: ProtocolResolver) -> Self {
        Self {
            resolver,
            mounts: HashMap::new(),
        }
    }

    /// Creates a session that shares `registry`'s protocol aliases.
    ///
    /// Aliases registered on the registry afterwards are not seen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the registry's alias table is poisoned.
    pub fn for_registry(registry: &HandlerRegistry) -> Result<Self> {
        Ok(Self::with_resolver(registry.protocol_resolver()?))
    }

    /// Session with the local filesystem and an in-memory store mounted.
    #[must_use]
    pub fn standard() -> Self {
        Self::new().with_standard_mounts()
    }

    /// Mounts the local filesystem at `file:///` and an in-memory store at
    /// `memory://`.
    #[must_use]
    pub fn with_standard_mounts(self) -> Self {
        self.mount(&format!("{}:///", protocol::LOCAL), ObjectStoreBackend::local())
            .mount(&format!("{}://", protocol::MEMORY), ObjectStoreBackend::memory())
    }

    /// Mounts `backend` at `root`.
    ///
    /// `root` is a URI such as `s3://bucket`, `s3://bucket/prefix` or
    /// `memory://`. Mounting the same root twice replaces the earlier backend.
    #[must_use]
    pub fn mount(mut self, root: &str, backend: impl StorageBackend) -> Self {
        self.mount_arc(root, Arc::new(backend));
        self
    }

    /// Mounts a shared backend at `root`.
    pub fn mount_arc(&mut self, root: &str, backend: Arc<dyn StorageBackend>) {
        let location = Location::parse(root, &self.resolver);
        tracing::debug!(
            protocol = %location.protocol,
            bucket = %location.bucket,
            base = %location.path,
            "mounted storage backend"
        );
        self.mounts.insert(
            (location.protocol, location.bucket),
            Mount {
                backend,
                base: location.path,
            },
        );
    }

    /// Parses `uri` with this session's resolver.
    #[must_use]
    pub fn locate(&self, uri: &str) -> Location {
        Location::parse(uri, &self.resolver)
    }

    /// Finds the backend serving `uri` and the object key within it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no mount covers the URI, and
    /// [`Error::InvalidInput`] for a relative local path that cannot be
    /// anchored at the working directory.
    pub fn resolve(&self, uri: &str) -> Result<(Arc<dyn StorageBackend>, String)> {
        let location = if self.resolver.protocol_of(uri) == protocol::LOCAL {
            self.locate(&anchor_relative(uri)?)
        } else {
            self.locate(uri)
        };

        if let Some(mount) = self
            .mounts
            .get(&(location.protocol.clone(), location.bucket.clone()))
        {
            return Ok((
                Arc::clone(&mount.backend),
                join(&[&mount.base, &location.path]),
            ));
        }

        if let Some(mount) = self.mounts.get(&(location.protocol.clone(), String::new())) {
            return Ok((
                Arc::clone(&mount.backend),
                join(&[&mount.base, &location.bucket, &location.path]),
            ));
        }

        Err(Error::NotFound(format!(
            "no storage mounted for {uri} (protocol {}, bucket '{}')",
            location.protocol, location.bucket
        )))
    }
}
