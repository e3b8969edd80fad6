//! Execution context handed to every encode and decode call.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use ulid::Ulid;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Per-call environment for dataset handlers.
///
/// Carries the prefix under which fresh output directories are minted and an
/// optional live session (storage clients, compute sessions) that handlers
/// look up by type. Cloning is cheap.
#[derive(Clone)]
pub struct ExecutionContext {
    raw_output_prefix: String,
    session: Option<Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("raw_output_prefix", &self.raw_output_prefix)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl ExecutionContext {
    /// Starts building a context.
    #[must_use]
    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder::default()
    }

    /// Context with the prefix from `config` and no session.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::builder()
            .raw_output_prefix(config.raw_output_prefix.clone())
            .build()
    }

    /// Returns the output prefix.
    #[must_use]
    pub fn raw_output_prefix(&self) -> &str {
        &self.raw_output_prefix
    }

    /// Returns a fresh, unique directory URI under the output prefix.
    #[must_use]
    pub fn random_remote_directory(&self) -> String {
        let id = Ulid::new().to_string().to_ascii_lowercase();
        if self.raw_output_prefix.ends_with('/') {
            format!("{}{id}", self.raw_output_prefix)
        } else {
            format!("{}/{id}", self.raw_output_prefix)
        }
    }

    /// Returns the installed session as `S`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionUnavailable`] when no session is installed or
    /// it is not an `S`.
    pub fn session<S: Any + Send + Sync>(&self) -> Result<Arc<S>> {
        let session = self.session.clone().ok_or_else(|| Error::SessionUnavailable {
            message: format!(
                "no session installed; a {} is required",
                std::any::type_name::<S>()
            ),
        })?;
        session.downcast::<S>().map_err(|_| Error::SessionUnavailable {
            message: format!(
                "installed session is not a {}",
                std::any::type_name::<S>()
            ),
        })
    }
}

/// Builder for [`ExecutionContext`].
#[derive(Default)]
pub struct ExecutionContextBuilder {
    raw_output_prefix: Option<String>,
    session: Option<Arc<dyn Any + Send + Sync>>,
}

impl ExecutionContextBuilder {
    /// Sets the output prefix.
    #[must_use]
    pub fn raw_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.raw_output_prefix = Some(prefix.into());
        self
    }

    /// Installs a session value.
    #[must_use]
    pub fn session<S: Any + Send + Sync>(self, session: S) -> Self {
        self.shared_session(Arc::new(session))
    }

    /// Installs a shared session value.
    #[must_use]
    pub fn shared_session<S: Any + Send + Sync>(mut self, session: Arc<S>) -> Self {
        self.session = Some(session);
        self
    }

    /// Builds the context. The prefix defaults to [`EngineConfig::default`]'s.
    #[must_use]
    pub fn build(self) -> ExecutionContext {
        ExecutionContext {
            raw_output_prefix: self
                .raw_output_prefix
                .unwrap_or_else(|| EngineConfig::default().raw_output_prefix),
            session: self.session,
        }
    }
}
