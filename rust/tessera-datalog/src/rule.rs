//! Rules, checks and policies.
//!
//! A [`Query`] is a conjunction of predicates; the empty conjunction is the
//! literal `true` and matches exactly once with no bindings. A [`Rule`]
//! derives its head for every match of its body. A [`Check`] and a
//! [`Policy`] are disjunctions of queries.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::DatalogError;
use crate::predicate::Predicate;

/// A conjunction of body predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Query {
    predicates: Vec<Predicate>,
}

impl Query {
    /// Create a query from its conjuncts.
    pub fn new(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            predicates: predicates.into_iter().collect(),
        }
    }

    /// The query that is always satisfied.
    pub fn always() -> Self {
        Self::default()
    }

    /// The conjuncts of this query.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    fn variables(&self) -> BTreeSet<&str> {
        self.predicates
            .iter()
            .flat_map(Predicate::variables)
            .collect()
    }
}

impl From<Predicate> for Query {
    fn from(predicate: Predicate) -> Self {
        Query::new([predicate])
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return f.write_str("true");
        }
        for (index, predicate) in self.predicates.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(predicate, f)?;
        }
        Ok(())
    }
}

/// A range-restricted rule: every variable in the head occurs in the body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rule {
    head: Predicate,
    body: Query,
}

impl Rule {
    /// Create a rule, rejecting heads that use variables the body does not
    /// bind.
    pub fn new(head: Predicate, body: impl Into<Query>) -> Result<Self, DatalogError> {
        let body = body.into();
        let bound = body.variables();
        if let Some(variable) = head.variables().find(|name| !bound.contains(name)) {
            return Err(DatalogError::UnboundHeadVariable {
                variable: variable.to_string(),
            });
        }
        Ok(Self { head, body })
    }

    /// The derived predicate.
    pub fn head(&self) -> &Predicate {
        &self.head
    }

    /// The body that must match for the head to be derived.
    pub fn body(&self) -> &Query {
        &self.body
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.head, self.body)
    }
}

fn write_queries(f: &mut fmt::Formatter<'_>, queries: &[Query]) -> fmt::Result {
    for (index, query) in queries.iter().enumerate() {
        if index > 0 {
            f.write_str(" or ")?;
        }
        fmt::Display::fmt(query, f)?;
    }
    Ok(())
}

/// A disjunction of queries that must hold for authorization to proceed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Check {
    queries: Vec<Query>,
}

impl Check {
    /// Create a check from one or more alternative queries.
    pub fn new(queries: impl IntoIterator<Item = Query>) -> Result<Self, DatalogError> {
        let queries: Vec<Query> = queries.into_iter().collect();
        if queries.is_empty() {
            return Err(DatalogError::EmptyQueries { kind: "check" });
        }
        Ok(Self { queries })
    }

    /// The alternatives of this check.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("check if ")?;
        write_queries(f, &self.queries)
    }
}

/// Whether a matching policy grants or refuses the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// `allow if …`
    Allow,
    /// `deny if …`
    Deny,
}

/// An ordered allow/deny rule evaluated after all checks pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Policy {
    kind: PolicyKind,
    queries: Vec<Query>,
}

impl Policy {
    /// Create a policy from one or more alternative queries.
    pub fn new(
        kind: PolicyKind,
        queries: impl IntoIterator<Item = Query>,
    ) -> Result<Self, DatalogError> {
        let queries: Vec<Query> = queries.into_iter().collect();
        if queries.is_empty() {
            return Err(DatalogError::EmptyQueries { kind: "policy" });
        }
        Ok(Self { kind, queries })
    }

    /// `allow if true`
    pub fn allow_all() -> Self {
        Self {
            kind: PolicyKind::Allow,
            queries: vec![Query::always()],
        }
    }

    /// Whether this policy allows or denies.
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// The alternatives of this policy.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PolicyKind::Allow => f.write_str("allow if ")?,
            PolicyKind::Deny => f.write_str("deny if ")?,
        }
        write_queries(f, &self.queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn it_rejects_rules_with_unbound_head_variables() {
        let result = Rule::new(
            Predicate::new("username", [Term::var("x")]),
            Predicate::new("k8s:userinfo:username", [Term::var("y")]),
        );
        assert_eq!(
            result,
            Err(DatalogError::UnboundHeadVariable {
                variable: "x".into()
            })
        );
    }

    #[test]
    fn it_accepts_ground_heads_with_empty_bodies() {
        let rule = Rule::new(Predicate::new("ok", Vec::<Term>::new()), Query::always());
        assert!(rule.is_ok());
    }

    #[test]
    fn it_rejects_checks_without_queries() {
        assert!(Check::new(Vec::new()).is_err());
    }

    #[test]
    fn it_displays_disjunctive_checks() {
        let check = Check::new([
            Query::from(Predicate::new("k8s:verb", ["get"])),
            Query::from(Predicate::new("k8s:verb", ["list"])),
        ])
        .unwrap();
        assert_eq!(
            check.to_string(),
            r#"check if k8s:verb("get") or k8s:verb("list")"#
        );
        assert_eq!(Policy::allow_all().to_string(), "allow if true");
    }

    #[test]
    fn it_displays_rules_with_joined_bodies() {
        let rule = Rule::new(
            Predicate::new("can", [Term::var("user"), Term::var("verb")]),
            Query::new([
                Predicate::new("member", [Term::var("user"), Term::from("ops")]),
                Predicate::new("k8s:verb", [Term::var("verb")]),
            ]),
        )
        .unwrap();
        assert_eq!(
            rule.to_string(),
            r#"can($user, $verb) <- member($user, "ops"), k8s:verb($verb)"#
        );
    }
}
