//! The per-evaluation world assembled from token blocks and ambient input.

use std::fmt;

use crate::engine::{self, Evaluation, FactSet, RunLimits, Work};
use crate::error::EvaluationError;
use crate::origin::{Origin, Scope};
use crate::predicate::Fact;
use crate::rule::{Check, Policy, Rule};

/// The facts, rules, checks and policies for one authorization decision.
///
/// A context is built fresh for every evaluation and consumed by
/// [`AuthorizerContext::evaluate`]; nothing in it outlives the call.
#[derive(Debug, Clone, Default)]
pub struct AuthorizerContext {
    facts: FactSet,
    rules: Vec<(Scope, Rule)>,
    checks: Vec<(Scope, Check)>,
    policies: Vec<Policy>,
}

impl AuthorizerContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact introduced by `scope`.
    pub fn add_fact(&mut self, scope: Scope, fact: Fact) {
        self.facts.insert(Origin::from(scope), fact);
    }

    /// Add a rule declared by `scope`.
    pub fn add_rule(&mut self, scope: Scope, rule: Rule) {
        self.rules.push((scope, rule));
    }

    /// Add a check declared by `scope`.
    pub fn add_check(&mut self, scope: Scope, check: Check) {
        self.checks.push((scope, check));
    }

    /// Append a policy. Policies are always authorizer content and are
    /// tried in insertion order.
    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Add a fact supplied by the authorizer.
    pub fn with_fact(mut self, fact: Fact) -> Self {
        self.add_fact(Scope::Authorizer, fact);
        self
    }

    /// Append a policy.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.add_policy(policy);
        self
    }

    /// Merge another context into this one, keeping every origin tag.
    pub fn merge(&mut self, other: AuthorizerContext) {
        for (origin, fact) in other.facts.iter() {
            self.facts.insert(origin.clone(), fact.clone());
        }
        self.rules.extend(other.rules);
        self.checks.extend(other.checks);
        self.policies.extend(other.policies);
    }

    /// Number of facts before evaluation.
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// The checks with the scope that declared them.
    pub fn checks(&self) -> &[(Scope, Check)] {
        &self.checks
    }

    /// Run rules to a fixpoint, then checks, then policies.
    pub fn evaluate(self, limits: &RunLimits) -> Result<Evaluation, EvaluationError> {
        engine::evaluate(
            self.facts,
            &self.rules,
            &self.checks,
            &self.policies,
            limits,
        )
    }

    /// Run rules to a fixpoint and return the distinct head facts `rule`
    /// derives from facts visible to the authorizer.
    pub fn query(&self, rule: &Rule, limits: &RunLimits) -> Result<Vec<Fact>, EvaluationError> {
        let mut facts = self.facts.clone();
        let mut work = Work::new(limits);
        engine::saturate(&mut facts, &self.rules, &mut work)?;
        Ok(engine::query(&facts, rule, &mut work)?.into_iter().collect())
    }
}

impl fmt::Display for AuthorizerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, fact) in self.facts.iter() {
            writeln!(f, "{fact};")?;
        }
        for (_, rule) in &self.rules {
            writeln!(f, "{rule};")?;
        }
        for (_, check) in &self.checks {
            writeln!(f, "{check};")?;
        }
        for policy in &self.policies {
            writeln!(f, "{policy};")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Denial;
    use crate::predicate::Predicate;
    use crate::rule::Query;
    use crate::term::Term;
    use testresult::TestResult;

    fn verb_check(verb: &str) -> Check {
        Check::new([Query::from(Predicate::new("k8s:verb", [verb]))]).unwrap()
    }

    #[test]
    fn it_allows_when_every_check_passes() -> TestResult {
        let mut context = AuthorizerContext::new()
            .with_fact(Fact::new("k8s:verb", ["get"]))
            .with_policy(Policy::allow_all());
        context.add_check(Scope::Block(1), verb_check("get"));

        let evaluation = context.evaluate(&RunLimits::default())?;
        assert_eq!(evaluation.outcome(), &Ok(0));
        Ok(())
    }

    #[test]
    fn it_reports_the_first_failing_check() -> TestResult {
        let mut context = AuthorizerContext::new()
            .with_fact(Fact::new("k8s:verb", ["delete"]))
            .with_policy(Policy::allow_all());
        context.add_check(Scope::Block(1), verb_check("get"));
        context.add_check(Scope::Block(2), verb_check("list"));

        let denial = context
            .evaluate(&RunLimits::default())?
            .into_outcome()
            .unwrap_err();
        let Denial::FailedChecks(failed) = &denial else {
            panic!("expected failed checks, got {denial:?}");
        };
        assert_eq!(failed.len(), 2);
        assert_eq!(
            denial.to_string(),
            r#"check failed in block 1: check if k8s:verb("get")"#
        );
        Ok(())
    }

    #[test]
    fn it_denies_without_a_matching_policy() -> TestResult {
        let evaluation = AuthorizerContext::new().evaluate(&RunLimits::default())?;
        assert_eq!(evaluation.into_outcome(), Err(Denial::NoMatchingPolicy));
        Ok(())
    }

    #[test]
    fn it_does_not_let_a_block_satisfy_another_blocks_check() -> TestResult {
        let mut context = AuthorizerContext::new().with_policy(Policy::allow_all());
        context.add_check(Scope::Block(1), verb_check("get"));
        context.add_fact(Scope::Block(2), Fact::new("k8s:verb", ["get"]));

        assert!(!context.evaluate(&RunLimits::default())?.is_allowed());
        Ok(())
    }

    #[test]
    fn it_queries_authority_facts_through_rules() -> TestResult {
        let mut context = AuthorizerContext::new();
        context.add_fact(
            Scope::Block(0),
            Fact::new("k8s:userinfo:username", ["alice"]),
        );
        context.add_fact(
            Scope::Block(1),
            Fact::new("k8s:userinfo:username", ["mallory"]),
        );

        let rule = Rule::new(
            Predicate::new("username", [Term::var("x")]),
            Predicate::new("k8s:userinfo:username", [Term::var("x")]),
        )?;
        let found = context.query(&rule, &RunLimits::default())?;
        assert_eq!(found, vec![Fact::new("username", ["alice"])]);
        Ok(())
    }

    #[test]
    fn it_charges_queries_against_the_work_budget() -> TestResult {
        let context = AuthorizerContext::new()
            .with_fact(Fact::new("k8s:userinfo:group", ["ops"]))
            .with_fact(Fact::new("k8s:userinfo:group", ["dev"]));
        let rule = Rule::new(
            Predicate::new("group", [Term::var("x")]),
            Predicate::new("k8s:userinfo:group", [Term::var("x")]),
        )?;
        let limits = RunLimits {
            max_unifications: 1,
            ..RunLimits::default()
        };
        assert_eq!(
            context.query(&rule, &limits),
            Err(EvaluationError::TooManyUnifications { limit: 1 })
        );
        assert_eq!(context.query(&rule, &RunLimits::default())?.len(), 2);
        Ok(())
    }
}
