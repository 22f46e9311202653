//! Ed25519 key material for Tessera tokens.
//!
//! - [`KeyPair`] issues tokens and signs attenuation blocks.
//! - [`PublicKey`] verifies them.
//! - [`RootKeyProvider`] decouples verifiers from where the root key lives.

mod error;
mod key;
mod provider;

pub use error::KeyError;
pub use key::{KEY_LENGTH, KeyPair, PublicKey, SIGNATURE_LENGTH};
pub use provider::{KeyRing, PublicKeyFile, RootKeyProvider};
