//! Bounded forward-chaining evaluation.
//!
//! Rules are applied bottom-up until an iteration derives nothing new. Body
//! predicates are joined left to right against the facts visible to the
//! rule's scope. Evaluation fails closed whenever a [`RunLimits`] bound is
//! exceeded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::EvaluationError;
use crate::origin::{Origin, Scope};
use crate::predicate::{Fact, Predicate};
use crate::rule::{Check, Policy, PolicyKind, Query, Rule};
use crate::term::{Term, Value};

/// Bounds applied to a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Maximum number of facts, initial and derived
    pub max_facts: usize,
    /// Maximum number of fixpoint rounds
    pub max_iterations: usize,
    /// Maximum number of partial matches produced while joining one query
    pub max_matches: usize,
    /// Maximum number of fact unifications attempted over the whole
    /// evaluation, across every rule, check and policy
    pub max_unifications: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_facts: 1000,
            max_iterations: 100,
            max_matches: 10_000,
            max_unifications: 1_000_000,
        }
    }
}

type Bindings = BTreeMap<String, Value>;

/// Facts indexed by predicate name, then grouped by origin.
#[derive(Debug, Clone, Default)]
pub(crate) struct FactSet {
    facts: BTreeMap<String, BTreeMap<Origin, BTreeSet<Fact>>>,
    len: usize,
}

impl FactSet {
    pub(crate) fn insert(&mut self, origin: Origin, fact: Fact) -> bool {
        let inserted = self
            .facts
            .entry(fact.name().to_string())
            .or_default()
            .entry(origin)
            .or_default()
            .insert(fact);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    fn contains(&self, origin: &Origin, fact: &Fact) -> bool {
        self.facts
            .get(fact.name())
            .and_then(|by_origin| by_origin.get(origin))
            .is_some_and(|facts| facts.contains(fact))
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Origin, &Fact)> {
        self.facts.values().flat_map(|by_origin| {
            by_origin
                .iter()
                .flat_map(|(origin, facts)| facts.iter().map(move |fact| (origin, fact)))
        })
    }

    /// Facts named `name` whose origin is within `trusted`.
    fn visible<'a>(
        &'a self,
        name: &str,
        trusted: &'a Origin,
    ) -> impl Iterator<Item = (&'a Origin, &'a Fact)> {
        self.facts
            .get(name)
            .into_iter()
            .flat_map(move |by_origin| {
                by_origin
                    .iter()
                    .filter(move |(origin, _)| origin.is_trusted_by(trusted))
                    .flat_map(|(origin, facts)| facts.iter().map(move |fact| (origin, fact)))
            })
    }
}

/// Unification attempts spent so far by one evaluation.
pub(crate) struct Work<'a> {
    limits: &'a RunLimits,
    unifications: usize,
}

impl<'a> Work<'a> {
    pub(crate) fn new(limits: &'a RunLimits) -> Self {
        Self {
            limits,
            unifications: 0,
        }
    }

    fn unify(
        &mut self,
        predicate: &Predicate,
        fact: &Fact,
        bindings: &Bindings,
    ) -> Result<Option<Bindings>, EvaluationError> {
        if self.unifications >= self.limits.max_unifications {
            return Err(EvaluationError::TooManyUnifications {
                limit: self.limits.max_unifications,
            });
        }
        self.unifications += 1;
        Ok(unify(predicate, fact, bindings))
    }
}

fn unify(predicate: &Predicate, fact: &Fact, bindings: &Bindings) -> Option<Bindings> {
    if predicate.name != fact.name() || predicate.terms.len() != fact.values().len() {
        return None;
    }
    let mut extended = bindings.clone();
    for (term, value) in predicate.terms.iter().zip(fact.values()) {
        match term {
            Term::Value(expected) => {
                if expected != value {
                    return None;
                }
            }
            Term::Variable(name) => match extended.get(name) {
                Some(bound) if bound != value => return None,
                Some(_) => {}
                None => {
                    extended.insert(name.clone(), value.clone());
                }
            },
        }
    }
    Some(extended)
}

/// Every way `query` can be satisfied by the facts visible from `scope`.
fn solve(
    facts: &FactSet,
    scope: Scope,
    query: &Query,
    work: &mut Work<'_>,
) -> Result<Vec<(Bindings, Origin)>, EvaluationError> {
    let trusted = scope.trusted();
    let max_matches = work.limits.max_matches;
    let mut partial = vec![(Bindings::new(), Origin::from(scope))];
    for predicate in query.predicates() {
        let mut next = Vec::new();
        for (bindings, origin) in &partial {
            for (fact_origin, fact) in facts.visible(&predicate.name, &trusted) {
                if let Some(extended) = work.unify(predicate, fact, bindings)? {
                    if next.len() >= max_matches {
                        return Err(EvaluationError::TooManyMatches { limit: max_matches });
                    }
                    next.push((extended, origin.union(fact_origin)));
                }
            }
        }
        if next.is_empty() {
            return Ok(next);
        }
        partial = next;
    }
    Ok(partial)
}

fn substitute(head: &Predicate, bindings: &Bindings) -> Result<Fact, EvaluationError> {
    let values = head
        .terms
        .iter()
        .map(|term| match term {
            Term::Value(value) => Ok(value.clone()),
            Term::Variable(name) => {
                bindings
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvaluationError::UnboundVariable {
                        variable: name.clone(),
                    })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Fact::new(head.name.clone(), values))
}

fn satisfied(
    facts: &FactSet,
    scope: Scope,
    queries: &[Query],
    work: &mut Work<'_>,
) -> Result<bool, EvaluationError> {
    for query in queries {
        if !solve(facts, scope, query, work)?.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Apply `rules` until no new fact is derived.
pub(crate) fn saturate(
    facts: &mut FactSet,
    rules: &[(Scope, Rule)],
    work: &mut Work<'_>,
) -> Result<usize, EvaluationError> {
    let limits = *work.limits;
    if facts.len() > limits.max_facts {
        return Err(EvaluationError::TooManyFacts {
            limit: limits.max_facts,
        });
    }
    for iteration in 0..limits.max_iterations {
        let mut derived = Vec::new();
        for (scope, rule) in rules {
            for (bindings, origin) in solve(facts, *scope, rule.body(), work)? {
                let fact = substitute(rule.head(), &bindings)?;
                if !facts.contains(&origin, &fact) {
                    derived.push((origin, fact));
                }
            }
        }

        let mut changed = false;
        for (origin, fact) in derived {
            changed |= facts.insert(origin, fact);
            if facts.len() > limits.max_facts {
                return Err(EvaluationError::TooManyFacts {
                    limit: limits.max_facts,
                });
            }
        }
        if !changed {
            return Ok(iteration + 1);
        }
    }
    Err(EvaluationError::TooManyIterations {
        limit: limits.max_iterations,
    })
}

/// Head facts derived by `rule` at authorizer scope.
pub(crate) fn query(
    facts: &FactSet,
    rule: &Rule,
    work: &mut Work<'_>,
) -> Result<BTreeSet<Fact>, EvaluationError> {
    solve(facts, Scope::Authorizer, rule.body(), work)?
        .iter()
        .map(|(bindings, _)| substitute(rule.head(), bindings))
        .collect()
}

/// A check that had no satisfied query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    /// Where the check was declared
    pub scope: Scope,
    /// Position of the check within its scope
    pub index: usize,
    /// The check itself
    pub check: Check,
}

impl fmt::Display for FailedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check failed in {}: {}", self.scope, self.check)
    }
}

/// Why an evaluation did not end in an allow policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// One or more checks failed; the first is the reason
    FailedChecks(Vec<FailedCheck>),
    /// A `deny if` policy matched
    Policy {
        /// Position of the policy
        index: usize,
        /// The matching policy
        policy: Policy,
    },
    /// No policy matched
    NoMatchingPolicy,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::FailedChecks(failed) => match failed.first() {
                Some(first) => fmt::Display::fmt(first, f),
                None => f.write_str("check failed"),
            },
            Denial::Policy { index, policy } => {
                write!(f, "denied by policy {index}: {policy}")
            }
            Denial::NoMatchingPolicy => f.write_str("no matching policy"),
        }
    }
}

/// The outcome of a completed evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    outcome: Result<usize, Denial>,
    iterations: usize,
    fact_count: usize,
}

impl Evaluation {
    /// `Ok` with the index of the matching allow policy, or the denial.
    pub fn outcome(&self) -> &Result<usize, Denial> {
        &self.outcome
    }

    /// Consume the evaluation, keeping only its outcome.
    pub fn into_outcome(self) -> Result<usize, Denial> {
        self.outcome
    }

    /// Whether an allow policy matched and every check passed.
    pub fn is_allowed(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Number of fixpoint rounds run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of facts after saturation.
    pub fn fact_count(&self) -> usize {
        self.fact_count
    }
}

pub(crate) fn evaluate(
    mut facts: FactSet,
    rules: &[(Scope, Rule)],
    checks: &[(Scope, Check)],
    policies: &[Policy],
    limits: &RunLimits,
) -> Result<Evaluation, EvaluationError> {
    let mut work = Work::new(limits);
    let iterations = saturate(&mut facts, rules, &mut work)?;

    let mut failed = Vec::new();
    let mut position: BTreeMap<Scope, usize> = BTreeMap::new();
    for (scope, check) in checks {
        let index = position.entry(*scope).or_default();
        if !satisfied(&facts, *scope, check.queries(), &mut work)? {
            failed.push(FailedCheck {
                scope: *scope,
                index: *index,
                check: check.clone(),
            });
        }
        *index += 1;
    }

    let outcome = if !failed.is_empty() {
        Err(Denial::FailedChecks(failed))
    } else {
        let mut outcome = Err(Denial::NoMatchingPolicy);
        for (index, policy) in policies.iter().enumerate() {
            if satisfied(&facts, Scope::Authorizer, policy.queries(), &mut work)? {
                outcome = match policy.kind() {
                    PolicyKind::Allow => Ok(index),
                    PolicyKind::Deny => Err(Denial::Policy {
                        index,
                        policy: policy.clone(),
                    }),
                };
                break;
            }
        }
        outcome
    };

    tracing::debug!(
        iterations,
        facts = facts.len(),
        unifications = work.unifications,
        allowed = outcome.is_ok(),
        "Evaluation complete"
    );

    Ok(Evaluation {
        outcome,
        iterations,
        fact_count: facts.len(),
    })
}
