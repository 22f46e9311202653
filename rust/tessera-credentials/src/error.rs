//! Error types for key material and key files.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, parsing, generating or using ed25519 keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// A key file could not be read or written.
    #[error("key file {}: {source}", path.display())]
    Io {
        /// The file that was accessed
        path: PathBuf,
        /// The underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// PEM or PKCS#8 encoding was malformed.
    #[error("malformed PEM key: {0}")]
    Pem(String),

    /// The bytes do not form a valid ed25519 key.
    #[error("invalid ed25519 key: {0}")]
    InvalidKey(String),

    /// A signature did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// Random number generation failed.
    #[error("RNG error: {0}")]
    Rng(getrandom::Error),

    /// A key provider has no key for the requested id.
    #[error("unknown root key id {0}")]
    UnknownKeyId(u32),
}

impl KeyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
