//! Handler registry and dispatch resolver.
//!
//! The registry maps [`HandlerKey`]s to encoder and decoder instances. It is
//! populated during an initialization phase and read for the rest of the
//! process lifetime.
//!
//! # Resolution Order
//!
//! For a request `(T, protocol, format)`, most specific first:
//!
//! 1. `(T, protocol, format)`
//! 2. `(T, protocol, *)`
//! 3. `(T, *, format)`
//! 4. the `default_for_type` handler registered for `(T, protocol)`
//! 5. the `default_for_type` handler registered for `(T, *)`
//! 6. when no format was requested: the only handler registered for
//!    `(T, protocol)`, if there is exactly one
//!
//! Nothing ever resolves across types. A miss returns
//! [`Error::NoHandler`] naming the full request.
//!
//! # Concurrency
//!
//! Tables sit behind `RwLock`s. Registration takes the write lock, resolution
//! takes a read lock only long enough to clone an `Arc` out, so handlers run
//! without any registry lock held.
//!
//! # Global Registry
//!
//! [`initialize_global`] runs every registration against a fresh registry,
//! seals it, and publishes it once. [`global`] returns it afterwards.
//!
//! ```rust,ignore
//! let registry = tessera_core::registry::initialize_global(|registry| {
//!     tessera_parquet::register_handlers(registry)
//! })?;
//! let encoder = registry.resolve_encoder(FrameType::of::<RecordBatch>(), "s3", "parquet")?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::{Error, Result};
use crate::handler::{DatasetDecoder, DatasetEncoder, HandlerKind};
use crate::key::{FrameType, HandlerKey, Selector};
use crate::metrics;
use crate::protocol::ProtocolResolver;

/// Options for a single registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Protocol the handler serves.
    pub protocol: Selector,
    /// Format the handler serves.
    pub format: Selector,
    /// Whether the handler is the fallback for its type (and protocol).
    pub default_for_type: bool,
    /// Whether an existing registration under the same key may be replaced.
    pub override_existing: bool,
}

impl Registration {
    /// Registration for `protocol` and `format`, not default, no override.
    #[must_use]
    pub fn new(protocol: impl Into<Selector>, format: impl Into<Selector>) -> Self {
        Self {
            protocol: protocol.into(),
            format: format.into(),
            default_for_type: false,
            override_existing: false,
        }
    }

    /// Protocol- and format-agnostic registration.
    #[must_use]
    pub fn any() -> Self {
        Self::new(Selector::Any, Selector::Any)
    }

    /// Marks the handler as the fallback for its type.
    #[must_use]
    pub fn default_for_type(mut self) -> Self {
        self.default_for_type = true;
        self
    }

    /// Allows replacing an existing registration.
    #[must_use]
    pub fn overriding(mut self) -> Self {
        self.override_existing = true;
        self
    }
}

struct Entry<H: ?Sized> {
    handler: Arc<H>,
    default_for_type: bool,
}

/// One capability's entries plus its default slots.
struct HandlerTable<H: ?Sized> {
    kind: HandlerKind,
    entries: HashMap<HandlerKey, Entry<H>>,
    /// `(type, protocol selector)` -> key of the default handler.
    defaults: HashMap<(FrameType, Selector), HandlerKey>,
}

impl<H: ?Sized> HandlerTable<H> {
    fn new(kind: HandlerKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    fn duplicate(&self, key: &HandlerKey) -> Error {
        Error::DuplicateHandler {
            kind: self.kind,
            type_name: key.frame_type.name(),
            protocol: key.protocol.to_string(),
            format: key.format.to_string(),
        }
    }

    fn insert(&mut self, key: HandlerKey, handler: Arc<H>, registration: &Registration) -> Result<()> {
        let replacing = self.entries.contains_key(&key);
        if replacing && !registration.override_existing {
            return Err(self.duplicate(&key));
        }

        let slot = (key.frame_type, key.protocol.clone());
        if registration.default_for_type {
            if let Some(existing) = self.defaults.get(&slot) {
                if existing != &key && !registration.override_existing {
                    return Err(self.duplicate(existing));
                }
            }
        }

        if replacing && !registration.default_for_type && self.defaults.get(&slot) == Some(&key) {
            self.defaults.remove(&slot);
        }
        if registration.default_for_type {
            if let Some(previous) = self.defaults.insert(slot, key.clone()) {
                if previous != key {
                    if let Some(entry) = self.entries.get_mut(&previous) {
                        entry.default_for_type = false;
                    }
                }
            }
        }
        self.entries.insert(
            key,
            Entry {
                handler,
                default_for_type: registration.default_for_type,
            },
        );
        Ok(())
    }

    fn resolve(
        &self,
        frame_type: FrameType,
        protocol: &Selector,
        format: &Selector,
    ) -> Option<(HandlerKey, Arc<H>)> {
        let specific = [
            HandlerKey::new(frame_type, protocol.clone(), format.clone()),
            HandlerKey::new(frame_type, protocol.clone(), Selector::Any),
            HandlerKey::new(frame_type, Selector::Any, format.clone()),
        ];
        let defaults = [
            self.defaults.get(&(frame_type, protocol.clone())),
            self.defaults.get(&(frame_type, Selector::Any)),
        ];

        specific
            .iter()
            .chain(defaults.into_iter().flatten())
            .find_map(|key| {
                self.entries
                    .get(key)
                    .map(|entry| (key.clone(), Arc::clone(&entry.handler)))
            })
            .or_else(|| {
                if format.is_any() {
                    self.sole_for_protocol(frame_type, protocol)
                } else {
                    None
                }
            })
    }

    /// The only entry for `(frame_type, protocol)`, whatever its format.
    fn sole_for_protocol(
        &self,
        frame_type: FrameType,
        protocol: &Selector,
    ) -> Option<(HandlerKey, Arc<H>)> {
        let mut candidates = self
            .entries
            .iter()
            .filter(|(key, _)| key.frame_type == frame_type && &key.protocol == protocol);
        let (key, entry) = candidates.next()?;
        candidates
            .next()
            .is_none()
            .then(|| (key.clone(), Arc::clone(&entry.handler)))
    }

    fn keys(&self) -> Vec<(HandlerKey, bool)> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.default_for_type))
            .collect();
        keys.sort_by(|(a, _), (b, _)| {
            (a.frame_type.name(), &a.protocol, &a.format).cmp(&(
                b.frame_type.name(),
                &b.protocol,
                &b.format,
            ))
        });
        keys
    }
}

/// Registry of dataset encoders and decoders.
pub struct HandlerRegistry {
    encoders: RwLock<HandlerTable<dyn DatasetEncoder>>,
    decoders: RwLock<HandlerTable<dyn DatasetDecoder>>,
    protocols: RwLock<ProtocolResolver>,
    sealed: AtomicBool,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

impl HandlerRegistry {
    /// Creates an empty registry with the default protocol aliases.
    #[must_use]
    pub fn new() -> Self {
        Self::with_protocols(ProtocolResolver::default())
    }

    /// Creates an empty registry with a custom protocol resolver.
    #[must_use]
    pub fn with_protocols(protocols: ProtocolResolver) -> Self {
        Self {
            encoders: RwLock::new(HandlerTable::new(HandlerKind::Encoder)),
            decoders: RwLock::new(HandlerTable::new(HandlerKind::Decoder)),
            protocols: RwLock::new(protocols),
            sealed: AtomicBool::new(false),
        }
    }

    /// Registers an encoder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateHandler`] if the key (or the requested default
    /// slot) is taken and `registration` does not override, and
    /// [`Error::RegistrySealed`] after [`seal`](Self::seal).
    pub fn register_encoder(
        &self,
        encoder: Arc<dyn DatasetEncoder>,
        registration: Registration,
    ) -> Result<()> {
        let frame_type = encoder.frame_type();
        let name = encoder.name();
        self.register(&self.encoders, frame_type, name, encoder, registration)
    }

    /// Registers a decoder.
    ///
    /// # Errors
    ///
    /// Same as [`register_encoder`](Self::register_encoder).
    pub fn register_decoder(
        &self,
        decoder: Arc<dyn DatasetDecoder>,
        registration: Registration,
    ) -> Result<()> {
        let frame_type = decoder.frame_type();
        let name = decoder.name();
        self.register(&self.decoders, frame_type, name, decoder, registration)
    }

    fn register<H: ?Sized>(
        &self,
        table: &RwLock<HandlerTable<H>>,
        frame_type: FrameType,
        name: &'static str,
        handler: Arc<H>,
        registration: Registration,
    ) -> Result<()> {
        let key = self.key(frame_type, registration.protocol.clone(), registration.format.clone())?;
        let mut table = table.write().map_err(|_| poisoned())?;
        if self.is_sealed() {
            return Err(Error::RegistrySealed {
                kind: table.kind,
                type_name: frame_type.name(),
            });
        }

        table.insert(key.clone(), handler, &registration)?;
        tracing::debug!(
            kind = %table.kind,
            key = %key,
            handler = name,
            default_for_type = registration.default_for_type,
            "registered dataset handler"
        );
        Ok(())
    }

    /// Makes `alias` dispatch like `canonical`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] after [`seal`](Self::seal).
    pub fn register_protocol_alias(&self, alias: &str, canonical: &str) -> Result<()> {
        if self.is_sealed() {
            return Err(Error::Config(format!(
                "cannot alias protocol '{alias}': registry is sealed"
            )));
        }
        self.protocols
            .write()
            .map_err(|_| poisoned())?
            .add_alias(alias, canonical);
        Ok(())
    }

    /// Resolves the encoder for `frame_type` at `protocol` and `format`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHandler`] when nothing matches.
    pub fn resolve_encoder(
        &self,
        frame_type: FrameType,
        protocol: impl Into<Selector>,
        format: impl Into<Selector>,
    ) -> Result<Arc<dyn DatasetEncoder>> {
        self.resolve(&self.encoders, frame_type, protocol.into(), format.into())
    }

    /// Resolves the decoder for `frame_type` at `protocol` and `format`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHandler`] when nothing matches.
    pub fn resolve_decoder(
        &self,
        frame_type: FrameType,
        protocol: impl Into<Selector>,
        format: impl Into<Selector>,
    ) -> Result<Arc<dyn DatasetDecoder>> {
        self.resolve(&self.decoders, frame_type, protocol.into(), format.into())
    }

    fn resolve<H: ?Sized>(
        &self,
        table: &RwLock<HandlerTable<H>>,
        frame_type: FrameType,
        protocol: Selector,
        format: Selector,
    ) -> Result<Arc<H>> {
        let request = self.key(frame_type, protocol, format)?;
        let table = table.read().map_err(|_| poisoned())?;

        match table.resolve(frame_type, &request.protocol, &request.format) {
            Some((matched, handler)) => {
                tracing::trace!(kind = %table.kind, request = %request, matched = %matched, "resolved dataset handler");
                Ok(handler)
            }
            None => {
                tracing::warn!(kind = %table.kind, request = %request, "no dataset handler registered");
                metrics::record_resolution_miss(table.kind);
                Err(Error::NoHandler {
                    kind: table.kind,
                    type_name: frame_type.name(),
                    protocol: request.protocol.to_string(),
                    format: request.format.to_string(),
                })
            }
        }
    }

    fn key(&self, frame_type: FrameType, protocol: Selector, format: Selector) -> Result<HandlerKey> {
        let protocols = self.protocols.read().map_err(|_| poisoned())?;
        Ok(HandlerKey::new(
            frame_type,
            protocol.map_token(|t| protocols.canonical(t)),
            format.map_token(|t| t.trim().to_ascii_lowercase()),
        ))
    }

    /// Derives the canonical protocol of `uri` using this registry's aliases.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the alias table lock is poisoned.
    pub fn protocol_of(&self, uri: &str) -> Result<String> {
        Ok(self
            .protocols
            .read()
            .map_err(|_| poisoned())?
            .protocol_of(uri))
    }

    /// Returns a copy of the protocol resolver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the alias table lock is poisoned.
    pub fn protocol_resolver(&self) -> Result<ProtocolResolver> {
        Ok(self.protocols.read().map_err(|_| poisoned())?.clone())
    }

    /// Registered encoder keys with their default flags, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the table lock is poisoned.
    pub fn encoder_keys(&self) -> Result<Vec<(HandlerKey, bool)>> {
        Ok(self.encoders.read().map_err(|_| poisoned())?.keys())
    }

    /// Registered decoder keys with their default flags, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the table lock is poisoned.
    pub fn decoder_keys(&self) -> Result<Vec<(HandlerKey, bool)>> {
        Ok(self.decoders.read().map_err(|_| poisoned())?.keys())
    }

    /// Stops accepting registrations.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// Returns true once [`seal`](Self::seal) has been called.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

static GLOBAL: OnceLock<HandlerRegistry> = OnceLock::new();

/// Builds, seals and publishes the process-wide registry.
///
/// `init` performs every registration. The registry becomes visible to
/// [`global`] only after `init` succeeded, so no resolution can observe a
/// partially populated registry.
///
/// # Errors
///
/// Returns the error of `init`, or [`Error::RegistryAlreadyInitialized`] if
/// the registry was already published.
pub fn initialize_global<F>(init: F) -> Result<&'static HandlerRegistry>
where
    F: FnOnce(&HandlerRegistry) -> Result<()>,
{
    if GLOBAL.get().is_some() {
        return Err(Error::RegistryAlreadyInitialized);
    }

    let registry = HandlerRegistry::new();
    init(&registry)?;
    registry.seal();

    GLOBAL
        .set(registry)
        .map_err(|_| Error::RegistryAlreadyInitialized)?;
    tracing::info!("global dataset handler registry initialized");
    GLOBAL.get().ok_or(Error::RegistryUninitialized)
}

/// Returns the process-wide registry.
///
/// # Errors
///
/// Returns [`Error::RegistryUninitialized`] before [`initialize_global`].
pub fn global() -> Result<&'static HandlerRegistry> {
    GLOBAL.get().ok_or(Error::RegistryUninitialized)
}
