//! Composite keys used to register and look up dataset handlers.
//!
//! A key has three independent axes:
//! - the runtime type of the in-memory value ([`FrameType`])
//! - the storage protocol ([`Selector`] over protocol tokens)
//! - the on-disk format ([`Selector`] over format tokens)
//!
//! Wildcards are modeled explicitly with [`Selector::Any`]; an empty token is
//! never used as a sentinel.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of an in-memory dataset type.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct FrameType {
    id: TypeId,
    name: &'static str,
}

impl FrameType {
    /// Returns the frame type of `T`.
    #[must_use]
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying type id.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for FrameType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FrameType {}

impl Hash for FrameType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A protocol or format component of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector {
    /// Matches any token.
    Any,
    /// Matches exactly this token.
    Exact(String),
}

impl Selector {
    /// Creates an exact selector.
    #[must_use]
    pub fn exact(token: impl Into<String>) -> Self {
        Self::Exact(token.into())
    }

    /// Returns the token if this selector is exact.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Exact(token) => Some(token),
        }
    }

    /// Returns true for [`Selector::Any`].
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub(crate) fn map_token(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Self::Any => Self::Any,
            Self::Exact(token) => Self::Exact(f(&token)),
        }
    }
}

impl From<&str> for Selector {
    fn from(token: &str) -> Self {
        Self::exact(token)
    }
}

impl From<String> for Selector {
    fn from(token: String) -> Self {
        Self::Exact(token)
    }
}

impl From<Option<&str>> for Selector {
    fn from(token: Option<&str>) -> Self {
        token.map_or(Self::Any, Self::exact)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(token) => f.write_str(token),
        }
    }
}

/// Full registration/lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    /// In-memory type handled.
    pub frame_type: FrameType,
    /// Storage protocol.
    pub protocol: Selector,
    /// File format.
    pub format: Selector,
}

impl HandlerKey {
    /// Creates a key.
    #[must_use]
    pub fn new(frame_type: FrameType, protocol: Selector, format: Selector) -> Self {
        Self {
            frame_type,
            protocol,
            format,
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.frame_type, self.protocol, self.format)
    }
}
