//! The `TokenReview` and `SubjectAccessReview` objects exchanged with the
//! Kubernetes API server, and the functions that answer them.
//!
//! Only the fields the webhooks read or write are modelled. Unknown request
//! fields are ignored on input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_credentials::RootKeyProvider;
use tessera_datalog::RunLimits;
use tessera_token::Token;

use crate::ambient::RequestAttributes;
use crate::authorize::{Decision, authenticate, authorize};
use crate::error::KubeError;

/// `extra` key under which an authenticated token is handed from the
/// authentication webhook to the authorization webhook.
pub const TOKEN_EXTRA_KEY: &str = "authentication.tessera.io/token";

/// API group version of `TokenReview`.
pub const TOKEN_REVIEW_API_VERSION: &str = "authentication.k8s.io/v1";

/// API group version of `SubjectAccessReview`.
pub const SUBJECT_ACCESS_REVIEW_API_VERSION: &str = "authorization.k8s.io/v1";

/// `authentication.k8s.io/v1` `TokenReview`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReview {
    /// Request api version, echoed in the response
    #[serde(default)]
    pub api_version: String,
    /// Request kind, echoed in the response
    #[serde(default)]
    pub kind: String,
    /// What to review
    #[serde(default)]
    pub spec: TokenReviewSpec,
    /// The answer
    #[serde(default)]
    pub status: TokenReviewStatus,
}

/// The token under review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewSpec {
    /// Base64 token, exactly as presented by the client
    #[serde(default)]
    pub token: String,
    /// Audiences the API server accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
}

/// Result of a token review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewStatus {
    /// Whether the token identifies a user
    #[serde(default)]
    pub authenticated: bool,
    /// The authenticated user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    /// Why authentication failed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// A Kubernetes user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Username
    #[serde(default)]
    pub username: String,
    /// Stable user id; tokens do not carry one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Group memberships
    #[serde(default)]
    pub groups: Vec<String>,
    /// Additional attributes
    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}

/// `authorization.k8s.io/v1` `SubjectAccessReview`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReview {
    /// Request api version, echoed in the response
    #[serde(default)]
    pub api_version: String,
    /// Request kind, echoed in the response
    #[serde(default)]
    pub kind: String,
    /// What to review
    #[serde(default)]
    pub spec: SubjectAccessReviewSpec,
    /// The answer
    #[serde(default)]
    pub status: SubjectAccessReviewStatus,
}

/// The request being authorized and the user making it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReviewSpec {
    /// Set for requests against API resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_attributes: Option<ResourceAttributes>,
    /// Set for requests against non-resource paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_resource_attributes: Option<NonResourceAttributes>,
    /// Username
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Group memberships
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Extra attributes from authentication
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
    /// User id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// Attributes of a resource request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    /// Namespace, empty for cluster scoped resources
    #[serde(default)]
    pub namespace: String,
    /// Verb
    #[serde(default)]
    pub verb: String,
    /// API group
    #[serde(default)]
    pub group: String,
    /// API version
    #[serde(default)]
    pub version: String,
    /// Resource type
    #[serde(default)]
    pub resource: String,
    /// Subresource
    #[serde(default)]
    pub subresource: String,
    /// Object name, empty for collection requests
    #[serde(default)]
    pub name: String,
}

/// Attributes of a non-resource request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonResourceAttributes {
    /// URL path
    #[serde(default)]
    pub path: String,
    /// Lowercase HTTP verb
    #[serde(default)]
    pub verb: String,
}

/// Result of an access review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReviewStatus {
    /// Whether the request is allowed
    #[serde(default)]
    pub allowed: bool,
    /// Whether the request is denied outright
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    /// Reason for the decision
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Why the decision could not be evaluated
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub evaluation_error: String,
}

impl SubjectAccessReviewSpec {
    /// The ambient attributes of the reviewed request.
    pub fn request_attributes(&self) -> RequestAttributes {
        match (&self.resource_attributes, &self.non_resource_attributes) {
            (Some(resource), _) => RequestAttributes {
                resource: resource.resource.clone(),
                namespace: resource.namespace.clone(),
                name: resource.name.clone(),
                verb: resource.verb.clone(),
            },
            (None, Some(non_resource)) => RequestAttributes::verb(non_resource.verb.clone()),
            (None, None) => RequestAttributes::default(),
        }
    }

    /// The token handed over by the authentication webhook, if any.
    pub fn token(&self) -> Option<&str> {
        self.extra
            .get(TOKEN_EXTRA_KEY)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Answer a `TokenReview`. Failures become `authenticated: false` with the
/// error text.
pub fn authenticate_review<R>(review: TokenReview, root: &R, limits: &RunLimits) -> TokenReview
where
    R: RootKeyProvider + ?Sized,
{
    let status = match authenticate(&review.spec.token, root, limits) {
        Ok((_, identity)) => TokenReviewStatus {
            authenticated: true,
            user: Some(UserInfo {
                username: identity.username,
                uid: String::new(),
                groups: identity.groups.into_iter().collect(),
                extra: BTreeMap::from([(
                    TOKEN_EXTRA_KEY.to_string(),
                    vec![review.spec.token.clone()],
                )]),
            }),
            error: String::new(),
        },
        Err(error) => {
            tracing::warn!(%error, "Rejected token");
            TokenReviewStatus {
                authenticated: false,
                user: None,
                error: error.to_string(),
            }
        }
    };

    TokenReview {
        api_version: or_default(review.api_version, TOKEN_REVIEW_API_VERSION),
        kind: or_default(review.kind, "TokenReview"),
        spec: TokenReviewSpec::default(),
        status,
    }
}

/// Answer a `SubjectAccessReview`.
///
/// A review without a token in its `extra` is left to other authorizers.
pub fn authorize_review<R>(
    review: SubjectAccessReview,
    root: &R,
    limits: &RunLimits,
) -> SubjectAccessReview
where
    R: RootKeyProvider + ?Sized,
{
    let status = match review.spec.token() {
        None => SubjectAccessReviewStatus::default(),
        Some(text) => {
            let attributes = review.spec.request_attributes();
            let decision = Token::from_base64(text)
                .map_err(KubeError::from)
                .and_then(|token| authorize(&token, root, &attributes, limits));
            match decision {
                Ok(Decision::NoOpinion) => SubjectAccessReviewStatus::default(),
                Ok(Decision::Deny { reason }) => SubjectAccessReviewStatus {
                    denied: true,
                    reason,
                    ..SubjectAccessReviewStatus::default()
                },
                Err(error) => {
                    tracing::warn!(%error, "Failed to evaluate token");
                    SubjectAccessReviewStatus {
                        denied: true,
                        evaluation_error: error.to_string(),
                        ..SubjectAccessReviewStatus::default()
                    }
                }
            }
        }
    };

    SubjectAccessReview {
        api_version: or_default(review.api_version, SUBJECT_ACCESS_REVIEW_API_VERSION),
        kind: or_default(review.kind, "SubjectAccessReview"),
        spec: SubjectAccessReviewSpec::default(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn it_reads_resource_attributes_from_json() -> TestResult {
        let review: SubjectAccessReview = serde_json::from_str(
            r#"{
                "apiVersion": "authorization.k8s.io/v1",
                "kind": "SubjectAccessReview",
                "spec": {
                    "resourceAttributes": {
                        "namespace": "default",
                        "verb": "get",
                        "group": "",
                        "resource": "pods"
                    },
                    "user": "alice",
                    "extra": {"authentication.tessera.io/token": ["abc"]}
                }
            }"#,
        )?;
        assert_eq!(
            review.spec.request_attributes(),
            RequestAttributes {
                resource: "pods".into(),
                namespace: "default".into(),
                name: String::new(),
                verb: "get".into(),
            }
        );
        assert_eq!(review.spec.token(), Some("abc"));
        Ok(())
    }

    #[test]
    fn it_uses_the_verb_of_non_resource_requests() {
        let spec = SubjectAccessReviewSpec {
            non_resource_attributes: Some(NonResourceAttributes {
                path: "/healthz".into(),
                verb: "get".into(),
            }),
            ..SubjectAccessReviewSpec::default()
        };
        assert_eq!(spec.request_attributes(), RequestAttributes::verb("get"));
    }

    #[test]
    fn it_serializes_status_fields_in_camel_case() -> TestResult {
        let status = SubjectAccessReviewStatus {
            denied: true,
            evaluation_error: "boom".into(),
            ..SubjectAccessReviewStatus::default()
        };
        assert_eq!(
            serde_json::to_value(&status)?,
            serde_json::json!({"allowed": false, "denied": true, "evaluationError": "boom"})
        );
        Ok(())
    }
}
