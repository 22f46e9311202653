//! Facts describing the request being authorized.

use tessera_datalog::{AuthorizerContext, Fact, Policy};

/// Predicate for the requested resource type.
pub const RESOURCE: &str = "k8s:resource";
/// Predicate for the request namespace.
pub const NAMESPACE: &str = "k8s:namespace";
/// Predicate for the requested object name.
pub const NAME: &str = "k8s:name";
/// Predicate for the request verb.
pub const VERB: &str = "k8s:verb";

/// The attributes of a Kubernetes request. Empty strings mean the attribute
/// does not apply, e.g. the namespace of a cluster scoped resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttributes {
    /// Resource type, e.g. `pods`
    pub resource: String,
    /// Namespace
    pub namespace: String,
    /// Object name
    pub name: String,
    /// Verb, e.g. `get`
    pub verb: String,
}

impl RequestAttributes {
    /// Attributes with only a verb set.
    pub fn verb(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            ..Self::default()
        }
    }
}

/// One fact per non-empty attribute.
pub fn ambient_facts(attributes: &RequestAttributes) -> Vec<Fact> {
    [
        (RESOURCE, &attributes.resource),
        (NAMESPACE, &attributes.namespace),
        (NAME, &attributes.name),
        (VERB, &attributes.verb),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(predicate, value)| Fact::new(predicate, [value.as_str()]))
    .collect()
}

/// Authorizer content for one request: the ambient facts and the catch-all
/// `allow if true` policy, so the decision rests on the token's checks.
pub fn ambient_context(attributes: &RequestAttributes) -> AuthorizerContext {
    ambient_facts(attributes)
        .into_iter()
        .fold(AuthorizerContext::new(), AuthorizerContext::with_fact)
        .with_policy(Policy::allow_all())
}
