//! Authentication and authorization decisions for one token.

use tessera_credentials::RootKeyProvider;
use tessera_datalog::RunLimits;
use tessera_token::Token;

use crate::ambient::{RequestAttributes, ambient_context};
use crate::error::KubeError;
use crate::identity::{Identity, identity};

/// The authorizer's answer for a request.
///
/// A token can only ever narrow access: when every check passes the
/// decision is left to the other authorizers in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// All checks passed
    NoOpinion,
    /// A check failed or a deny policy matched
    Deny {
        /// Human readable reason, naming the failed check
        reason: String,
    },
}

impl Decision {
    /// Whether this decision denies the request.
    pub fn is_deny(&self) -> bool {
        matches!(self, Decision::Deny { .. })
    }
}

/// Decode and verify a base64 token, then derive the user it names.
pub fn authenticate<R>(
    token: &str,
    root: &R,
    limits: &RunLimits,
) -> Result<(Token, Identity), KubeError>
where
    R: RootKeyProvider + ?Sized,
{
    let token = Token::from_base64(token)?;
    let context = token.verify(root)?;
    let identity = identity(&context, limits)?;
    tracing::debug!(
        username = %identity.username,
        groups = identity.groups.len(),
        "Authenticated token"
    );
    Ok((token, identity))
}

/// Evaluate `token` against the attributes of one request.
pub fn authorize<R>(
    token: &Token,
    root: &R,
    attributes: &RequestAttributes,
    limits: &RunLimits,
) -> Result<Decision, KubeError>
where
    R: RootKeyProvider + ?Sized,
{
    let mut context = token.verify(root)?;
    context.merge(ambient_context(attributes));

    let evaluation = context.evaluate(limits)?;
    tracing::debug!(
        iterations = evaluation.iterations(),
        facts = evaluation.fact_count(),
        allowed = evaluation.is_allowed(),
        "Evaluated token"
    );
    Ok(match evaluation.into_outcome() {
        Ok(_) => Decision::NoOpinion,
        Err(denial) => Decision::Deny {
            reason: denial.to_string(),
        },
    })
}
