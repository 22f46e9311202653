//! Narrowing a token to a set of Kubernetes request attributes.

use std::collections::BTreeSet;

use tessera_datalog::{Check, Predicate, Query};
use tessera_token::{BlockBuilder, Token};

use crate::ambient::{NAME, NAMESPACE, RESOURCE, VERB};
use crate::error::KubeError;

/// Allowed values per request attribute. An empty set leaves that
/// attribute unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    /// Allowed resource types
    pub resources: BTreeSet<String>,
    /// Allowed namespaces
    pub namespaces: BTreeSet<String>,
    /// Allowed object names
    pub names: BTreeSet<String>,
    /// Allowed verbs
    pub verbs: BTreeSet<String>,
}

impl Constraints {
    /// No constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `resource`.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.insert(resource.into());
        self
    }

    /// Allow `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Allow `name`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Allow `verb`.
    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verbs.insert(verb.into());
        self
    }

    /// True when no dimension is constrained.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
            && self.namespaces.is_empty()
            && self.names.is_empty()
            && self.verbs.is_empty()
    }

    /// One check per constrained dimension, each a disjunction over its
    /// allowed values.
    pub fn checks(&self) -> Vec<Check> {
        [
            (RESOURCE, &self.resources),
            (NAMESPACE, &self.namespaces),
            (NAME, &self.names),
            (VERB, &self.verbs),
        ]
        .into_iter()
        .filter_map(|(predicate, values)| one_of(predicate, values))
        .collect()
    }
}

fn one_of(predicate: &str, values: &BTreeSet<String>) -> Option<Check> {
    let queries = values
        .iter()
        .map(|value| Query::from(Predicate::new(predicate, [value.as_str()])));
    // Only fails for an empty set, which leaves the dimension open.
    Check::new(queries).ok()
}

/// Append a block restricting `token` to `constraints`.
pub fn attenuate(token: &Token, constraints: &Constraints) -> Result<Token, KubeError> {
    attenuate_with_checks(token, constraints, Vec::new())
}

/// Append a block holding the constraint checks followed by `checks`.
///
/// Fails with [`KubeError::EmptyConstraints`] when the block would be empty.
pub fn attenuate_with_checks(
    token: &Token,
    constraints: &Constraints,
    checks: Vec<Check>,
) -> Result<Token, KubeError> {
    let block = constraints
        .checks()
        .into_iter()
        .chain(checks)
        .fold(BlockBuilder::new(), BlockBuilder::with_check);
    if block.is_empty() {
        return Err(KubeError::EmptyConstraints);
    }
    Ok(token.append(block)?)
}
