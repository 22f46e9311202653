//! Server configuration.
//!
//! Every field has a default, so a caller only overrides what it needs with
//! struct update syntax.

use std::net::SocketAddr;
use std::path::PathBuf;

use tessera_datalog::RunLimits;

/// Default address the webhook listens on.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default location of the raw root public key.
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "tessera-key.pub";

/// Default cap on the size of a review request body: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Settings for configuring the webhook server.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Address to listen on. Defaults to `0.0.0.0:8080`.
    pub listen_addr: SocketAddr,
    /// File holding the root public key, re-read for every request.
    /// Defaults to `tessera-key.pub`.
    pub public_key_file: PathBuf,
    /// Bounds applied to every token evaluation.
    pub limits: RunLimits,
    /// Largest request body accepted; larger bodies are answered with
    /// `413 Payload Too Large`.
    pub max_body_bytes: usize,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_key_file: PathBuf::from(DEFAULT_PUBLIC_KEY_FILE),
            limits: RunLimits::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
