//! Errors that stop the webhook server from starting or serving.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that stop the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// The listen address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Other socket failures
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
