//! Bearer-token cache backed by a pluggable secret store.
//!
//! Tokens are stored per endpoint under two entries, the access token and the
//! refresh token. A missing secret store is not an error: every operation
//! logs a warning and becomes a no-op, so callers fall back to an
//! interactive login instead of failing.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Endpoint used when none is given.
pub const DEFAULT_ENDPOINT: &str = "tessera-default";

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const NO_REFRESH_TOKEN: &str = "na";

/// Errors reported by a [`SecretStore`].
#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    /// No secret store exists on this host.
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    /// The store exists but the operation failed.
    #[error("secret store failure: {0}")]
    Backend(String),
}

/// A service/username keyed password store, as exposed by OS keyrings.
pub trait SecretStore: Send + Sync {
    /// Stores `password` for (`service`, `username`).
    ///
    /// # Errors
    ///
    /// Returns a [`SecretStoreError`] when the store rejects the write.
    fn set_password(
        &self,
        service: &str,
        username: &str,
        password: &str,
    ) -> std::result::Result<(), SecretStoreError>;

    /// Reads the password for (`service`, `username`), if any.
    ///
    /// # Errors
    ///
    /// Returns a [`SecretStoreError`] when the store cannot be read.
    fn get_password(
        &self,
        service: &str,
        username: &str,
    ) -> std::result::Result<Option<String>, SecretStoreError>;

    /// Removes the password for (`service`, `username`).
    ///
    /// # Errors
    ///
    /// Returns a [`SecretStoreError`] when the store rejects the delete.
    fn delete_password(
        &self,
        service: &str,
        username: &str,
    ) -> std::result::Result<(), SecretStoreError>;
}

/// Process-local secret store.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_failure() -> SecretStoreError {
    SecretStoreError::Backend("lock poisoned".into())
}

impl SecretStore for MemorySecretStore {
    fn set_password(
        &self,
        service: &str,
        username: &str,
        password: &str,
    ) -> std::result::Result<(), SecretStoreError> {
        self.secrets
            .write()
            .map_err(|_| lock_failure())?
            .insert((service.into(), username.into()), password.into());
        Ok(())
    }

    fn get_password(
        &self,
        service: &str,
        username: &str,
    ) -> std::result::Result<Option<String>, SecretStoreError> {
        Ok(self
            .secrets
            .read()
            .map_err(|_| lock_failure())?
            .get(&(service.into(), username.into()))
            .cloned())
    }

    fn delete_password(
        &self,
        service: &str,
        username: &str,
    ) -> std::result::Result<(), SecretStoreError> {
        let removed = self
            .secrets
            .write()
            .map_err(|_| lock_failure())?
            .remove(&(service.into(), username.into()));
        match removed {
            Some(_) => Ok(()),
            None => Err(SecretStoreError::Backend(format!(
                "no password stored for {service}/{username}"
            ))),
        }
    }
}

/// Store for hosts without a keyring; every call reports `Unavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSecretStore;

impl SecretStore for UnavailableSecretStore {
    fn set_password(&self, _: &str, _: &str, _: &str) -> std::result::Result<(), SecretStoreError> {
        Err(SecretStoreError::Unavailable("no keyring on this host".into()))
    }

    fn get_password(&self, _: &str, _: &str) -> std::result::Result<Option<String>, SecretStoreError> {
        Err(SecretStoreError::Unavailable("no keyring on this host".into()))
    }

    fn delete_password(&self, _: &str, _: &str) -> std::result::Result<(), SecretStoreError> {
        Err(SecretStoreError::Unavailable("no keyring on this host".into()))
    }
}

/// A bearer-token pair for one endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access token.
    pub access_token: String,
    /// Refresh token; `"na"` when the provider issued none.
    pub refresh_token: String,
    /// Endpoint the tokens belong to.
    pub for_endpoint: String,
    /// Lifetime in seconds, if known. Not persisted.
    pub expires_in: Option<u64>,
}

impl Credentials {
    /// Access token for [`DEFAULT_ENDPOINT`] without a refresh token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: NO_REFRESH_TOKEN.to_string(),
            for_endpoint: DEFAULT_ENDPOINT.to_string(),
            expires_in: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = token.into();
        self
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn for_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.for_endpoint = endpoint.into();
        self
    }

    /// Sets the lifetime.
    #[must_use]
    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("for_endpoint", &self.for_endpoint)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Caches [`Credentials`] in a [`SecretStore`].
#[derive(Clone)]
pub struct CredentialCache {
    store: Arc<dyn SecretStore>,
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache").finish_non_exhaustive()
    }
}

impl CredentialCache {
    /// Creates a cache over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Saves both tokens and returns the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the store fails for a reason other
    /// than being unavailable.
    pub fn store(&self, credentials: Credentials) -> Result<Credentials> {
        let endpoint = credentials.for_endpoint.as_str();
        let outcome = self
            .store
            .set_password(endpoint, REFRESH_TOKEN_KEY, &credentials.refresh_token)
            .and_then(|()| {
                self.store
                    .set_password(endpoint, ACCESS_TOKEN_KEY, &credentials.access_token)
            });
        degrade(outcome, "store", endpoint)?;
        Ok(credentials)
    }

    /// Loads the credentials for `endpoint`.
    ///
    /// Returns `None` when no access token is stored or the store is
    /// unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the store fails for a reason other
    /// than being unavailable.
    pub fn retrieve(&self, endpoint: &str) -> Result<Option<Credentials>> {
        let outcome = self
            .store
            .get_password(endpoint, ACCESS_TOKEN_KEY)
            .and_then(|access| {
                let refresh = self.store.get_password(endpoint, REFRESH_TOKEN_KEY)?;
                Ok((access, refresh))
            });

        let Some((access, refresh)) = degrade(outcome, "retrieve", endpoint)? else {
            return Ok(None);
        };
        let Some(access_token) = access else {
            return Ok(None);
        };
        Ok(Some(Credentials {
            access_token,
            refresh_token: refresh.unwrap_or_else(|| NO_REFRESH_TOKEN.to_string()),
            for_endpoint: endpoint.to_string(),
            expires_in: None,
        }))
    }

    /// Removes the credentials for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the store fails for a reason other
    /// than being unavailable.
    pub fn delete(&self, endpoint: &str) -> Result<()> {
        let outcome = self
            .store
            .delete_password(endpoint, ACCESS_TOKEN_KEY)
            .and_then(|()| self.store.delete_password(endpoint, REFRESH_TOKEN_KEY));
        degrade(outcome, "delete", endpoint).map(|_| ())
    }
}

/// `Unavailable` becomes `Ok(None)` with a warning; other failures propagate.
fn degrade<T>(
    outcome: std::result::Result<T, SecretStoreError>,
    op: &str,
    endpoint: &str,
) -> Result<Option<T>> {
    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(SecretStoreError::Unavailable(reason)) => {
            tracing::warn!(op, endpoint, %reason, "secret store unavailable, skipping credential cache");
            Ok(None)
        }
        Err(SecretStoreError::Backend(reason)) => Err(Error::Credentials(format!(
            "{op} credentials for {endpoint}: {reason}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_cache() -> CredentialCache {
        CredentialCache::new(Arc::new(MemorySecretStore::new()))
    }

    #[test]
    fn store_then_retrieve_roundtrip() {
        let cache = memory_cache();
        let stored = cache
            .store(
                Credentials::new("at-1")
                    .with_refresh_token("rt-1")
                    .for_endpoint("dns:///tessera.example.com")
                    .expires_in(3600),
            )
            .unwrap();
        assert_eq!(stored.expires_in, Some(3600));

        let loaded = cache
            .retrieve("dns:///tessera.example.com")
            .unwrap()
            .expect("credentials cached");
        assert_eq!(loaded.access_token, "at-1");
        assert_eq!(loaded.refresh_token, "rt-1");
        assert_eq!(loaded.expires_in, None);
        assert!(cache.retrieve(DEFAULT_ENDPOINT).unwrap().is_none());
    }

    #[test]
    fn default_refresh_token_is_placeholder() {
        let credentials = Credentials::new("at");
        assert_eq!(credentials.refresh_token, "na");
        assert_eq!(credentials.for_endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn delete_removes_both_entries() {
        let cache = memory_cache();
        cache.store(Credentials::new("at")).unwrap();
        cache.delete(DEFAULT_ENDPOINT).unwrap();
        assert!(cache.retrieve(DEFAULT_ENDPOINT).unwrap().is_none());

        let err = cache.delete(DEFAULT_ENDPOINT).unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn unavailable_store_degrades_to_noop() {
        let cache = CredentialCache::new(Arc::new(UnavailableSecretStore));
        let credentials = cache.store(Credentials::new("at")).unwrap();
        assert_eq!(credentials.access_token, "at");
        assert!(cache.retrieve(DEFAULT_ENDPOINT).unwrap().is_none());
        cache.delete(DEFAULT_ENDPOINT).unwrap();
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", Credentials::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
