//! Root key resolution.
//!
//! Verifiers never hold the root public key directly. They ask a
//! [`RootKeyProvider`], passing the optional root key id carried by the
//! token, so keys can be rotated or served from a file that is re-read on
//! every request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::KeyError;
use crate::key::PublicKey;

/// Resolves the public key that must have signed a token's authority block.
pub trait RootKeyProvider: Send + Sync {
    /// Return the root key for `key_id`, or the default key when the token
    /// carries no id.
    fn root_key(&self, key_id: Option<u32>) -> Result<PublicKey, KeyError>;
}

impl RootKeyProvider for PublicKey {
    fn root_key(&self, _key_id: Option<u32>) -> Result<PublicKey, KeyError> {
        Ok(*self)
    }
}

impl<T> RootKeyProvider for Arc<T>
where
    T: RootKeyProvider + ?Sized,
{
    fn root_key(&self, key_id: Option<u32>) -> Result<PublicKey, KeyError> {
        (**self).root_key(key_id)
    }
}

impl<T> RootKeyProvider for &T
where
    T: RootKeyProvider + ?Sized,
{
    fn root_key(&self, key_id: Option<u32>) -> Result<PublicKey, KeyError> {
        (**self).root_key(key_id)
    }
}

/// A public key file read on every lookup.
#[derive(Debug, Clone)]
pub struct PublicKeyFile {
    path: PathBuf,
}

impl PublicKeyFile {
    /// Resolve root keys from the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this provider reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RootKeyProvider for PublicKeyFile {
    fn root_key(&self, _key_id: Option<u32>) -> Result<PublicKey, KeyError> {
        PublicKey::read_file(&self.path)
    }
}

/// A fixed set of root keys indexed by key id.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: BTreeMap<u32, PublicKey>,
    default: Option<PublicKey>,
}

impl KeyRing {
    /// An empty key ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `key_id`.
    pub fn with_key(mut self, key_id: u32, key: PublicKey) -> Self {
        self.keys.insert(key_id, key);
        self
    }

    /// Use `key` for tokens without a root key id.
    pub fn with_default(mut self, key: PublicKey) -> Self {
        self.default = Some(key);
        self
    }
}

impl RootKeyProvider for KeyRing {
    fn root_key(&self, key_id: Option<u32>) -> Result<PublicKey, KeyError> {
        match key_id {
            Some(id) => self.keys.get(&id).copied().ok_or(KeyError::UnknownKeyId(id)),
            None => self
                .default
                .ok_or_else(|| KeyError::InvalidKey("no default root key".to_string())),
        }
    }
}
