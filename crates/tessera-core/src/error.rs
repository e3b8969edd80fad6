//! Error types and result aliases for tessera.
//!
//! Errors fall into four groups:
//! - **Configuration**: invalid registrations and registry lifecycle misuse,
//!   surfaced at load time.
//! - **Resolution**: no handler matches a requested key. The message names the
//!   type, protocol and format so the missing plugin can be identified.
//! - **Handler execution**: storage and codec failures raised inside a handler,
//!   propagated unchanged to the caller.
//! - **Degraded dependencies**: credential-store failures other than an absent
//!   store (which is logged and ignored).

use crate::handler::HandlerKind;

/// The result type used throughout tessera.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tessera operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A handler is already registered under an identical key.
    #[error(
        "duplicate {kind} registration for type {type_name}, protocol {protocol}, format {format}"
    )]
    DuplicateHandler {
        /// Capability that was being registered.
        kind: HandlerKind,
        /// Name of the in-memory type.
        type_name: &'static str,
        /// Protocol selector of the conflicting key.
        protocol: String,
        /// Format selector of the conflicting key.
        format: String,
    },

    /// No registered handler matches the requested key at any specificity.
    #[error("no {kind} registered for type {type_name}, protocol {protocol}, format {format}")]
    NoHandler {
        /// Capability that was requested.
        kind: HandlerKind,
        /// Name of the in-memory type.
        type_name: &'static str,
        /// Protocol that was attempted.
        protocol: String,
        /// Format that was attempted.
        format: String,
    },

    /// The registry no longer accepts registrations.
    #[error("registry is sealed: cannot register {kind} for type {type_name}")]
    RegistrySealed {
        /// Capability that was being registered.
        kind: HandlerKind,
        /// Name of the in-memory type.
        type_name: &'static str,
    },

    /// The process-wide registry was initialized more than once.
    #[error("global handler registry is already initialized")]
    RegistryAlreadyInitialized,

    /// The process-wide registry was queried before initialization.
    #[error("global handler registry has not been initialized")]
    RegistryUninitialized,

    /// An in-memory object had a different type than the handler expects.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type the handler was registered for.
        expected: &'static str,
        /// The type that was supplied.
        found: &'static str,
    },

    /// A precondition for the operation was not met.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition.
        message: String,
    },

    /// The execution context does not carry the session a handler needs.
    #[error("session unavailable: {message}")]
    SessionUnavailable {
        /// Description of the missing session.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure, including the location.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Encoding or decoding a file format failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The credential store failed for a reason other than being unavailable.
    #[error("credential store error: {0}")]
    Credentials(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new codec error.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a precondition failure.
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Returns true for configuration errors raised while populating a registry.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateHandler { .. }
                | Self::RegistrySealed { .. }
                | Self::RegistryAlreadyInitialized
                | Self::Config(_)
        )
    }

    /// Returns true when no handler matched a lookup.
    #[must_use]
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::NoHandler { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_handler_message_names_the_full_key() {
        let err = Error::NoHandler {
            kind: HandlerKind::Decoder,
            type_name: "Frame",
            protocol: "gs".into(),
            format: "csv".into(),
        };
        let message = err.to_string();
        assert!(message.contains("decoder"));
        assert!(message.contains("Frame"));
        assert!(message.contains("gs"));
        assert!(message.contains("csv"));
        assert!(err.is_resolution_failure());
        assert!(!err.is_configuration());
    }

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::other("disk on fire");
        let err = Error::storage_with_source("write s3://bucket/a failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
