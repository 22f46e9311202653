//! Webhook server for Kubernetes token authentication and authorization.
//!
//! The API server posts a `TokenReview` to `/authenticate` and a
//! `SubjectAccessReview` to `/authorize`; both are answered from the token
//! alone, checked against the root public key.

#![warn(missing_docs)]

mod error;
mod server;
mod settings;

pub use error::WebhookError;
pub use server::{
    AUTHENTICATE_PATH, AUTHORIZE_PATH, HEALTH_PATH, Webhook, WebhookServer, run, serve,
};
pub use settings::{
    DEFAULT_LISTEN_ADDR, DEFAULT_MAX_BODY_BYTES, DEFAULT_PUBLIC_KEY_FILE, WebhookSettings,
};
