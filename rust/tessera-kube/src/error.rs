//! Error types for the Kubernetes layer

use tessera_datalog::{DatalogError, EvaluationError};
use tessera_token::TokenError;
use thiserror::Error;

/// Failures while deriving an identity from a verified token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The token does not establish exactly one username
    #[error("expected exactly one username, found {count}")]
    Ambiguous {
        /// Number of usernames found
        count: usize,
    },

    /// An identity fact holds something other than a single string
    #[error("{predicate} must hold a single string")]
    InvalidTerm {
        /// The offending predicate
        predicate: &'static str,
    },

    /// An identity query could not be built
    #[error(transparent)]
    Query(#[from] DatalogError),

    /// The identity query could not be evaluated
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Errors from the authentication, authorization and attenuation operations
#[derive(Error, Debug)]
pub enum KubeError {
    /// The token could not be decoded or verified
    #[error(transparent)]
    Token(#[from] TokenError),

    /// No identity could be derived from the token
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Evaluation exceeded its run limits
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// An attenuation request did not narrow anything
    #[error("attenuation requires at least one constraint or check")]
    EmptyConstraints,
}
