//! Deriving a Kubernetes user from a verified token.
//!
//! Identity is established only by facts visible to the authorizer, which
//! means the authority block: an attenuation block cannot add usernames or
//! groups. Each `k8s:userinfo:group` fact names exactly one group; values
//! are never split.

use std::collections::BTreeSet;

use tessera_datalog::{AuthorizerContext, Fact, Predicate, Rule, RunLimits, Term};

use crate::error::IdentityError;

/// Predicate carrying the username.
pub const USERNAME: &str = "k8s:userinfo:username";

/// Predicate carrying one group membership.
pub const GROUP: &str = "k8s:userinfo:group";

/// The user a token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Kubernetes username
    pub username: String,
    /// Group names, sorted and deduplicated
    pub groups: BTreeSet<String>,
}

/// `head($name) <- source($name)`
fn projection(head: &str, source: &str) -> Result<Rule, IdentityError> {
    Ok(Rule::new(
        Predicate::new(head, [Term::var("name")]),
        Predicate::new(source, [Term::var("name")]),
    )?)
}

fn single_string(fact: &Fact, predicate: &'static str) -> Result<String, IdentityError> {
    match fact.values() {
        [value] => value
            .as_str()
            .map(str::to_string)
            .ok_or(IdentityError::InvalidTerm { predicate }),
        _ => Err(IdentityError::InvalidTerm { predicate }),
    }
}

/// Run the username and group queries against `context`.
pub fn identity(
    context: &AuthorizerContext,
    limits: &RunLimits,
) -> Result<Identity, IdentityError> {
    let usernames = context.query(&projection("username", USERNAME)?, limits)?;
    let username = match usernames.as_slice() {
        [fact] => single_string(fact, USERNAME)?,
        facts => return Err(IdentityError::Ambiguous { count: facts.len() }),
    };

    let groups = context
        .query(&projection("group", GROUP)?, limits)?
        .iter()
        .map(|fact| single_string(fact, GROUP))
        .collect::<Result<_, _>>()?;

    Ok(Identity { username, groups })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_datalog::{DatalogError, Scope, Value};
    use testresult::TestResult;

    fn context(facts: impl IntoIterator<Item = (Scope, Fact)>) -> AuthorizerContext {
        let mut context = AuthorizerContext::new();
        for (scope, fact) in facts {
            context.add_fact(scope, fact);
        }
        context
    }

    #[test]
    fn it_extracts_username_and_groups() -> TestResult {
        let context = context([
            (Scope::Block(0), Fact::new(USERNAME, ["alice"])),
            (Scope::Block(0), Fact::new(GROUP, ["ops"])),
            (Scope::Block(0), Fact::new(GROUP, ["dev,qa"])),
        ]);
        let identity = identity(&context, &RunLimits::default())?;
        assert_eq!(identity.username, "alice");
        assert_eq!(
            identity.groups,
            BTreeSet::from(["dev,qa".to_string(), "ops".to_string()])
        );
        Ok(())
    }

    #[test]
    fn it_requires_exactly_one_username() {
        let none = context([(Scope::Block(0), Fact::new(GROUP, ["ops"]))]);
        assert_eq!(
            identity(&none, &RunLimits::default()),
            Err(IdentityError::Ambiguous { count: 0 })
        );

        let two = context([
            (Scope::Block(0), Fact::new(USERNAME, ["alice"])),
            (Scope::Block(0), Fact::new(USERNAME, ["bob"])),
        ]);
        assert_eq!(
            identity(&two, &RunLimits::default()),
            Err(IdentityError::Ambiguous { count: 2 })
        );
    }

    #[test]
    fn it_ignores_identity_facts_from_attenuation_blocks() -> TestResult {
        let context = context([
            (Scope::Block(0), Fact::new(USERNAME, ["alice"])),
            (Scope::Block(1), Fact::new(USERNAME, ["mallory"])),
            (Scope::Block(1), Fact::new(GROUP, ["system:masters"])),
        ]);
        let identity = identity(&context, &RunLimits::default())?;
        assert_eq!(identity.username, "alice");
        assert!(identity.groups.is_empty());
        Ok(())
    }

    #[test]
    fn it_rejects_non_string_identity_terms() {
        let context = context([
            (Scope::Block(0), Fact::new(USERNAME, ["alice"])),
            (Scope::Block(0), Fact::new(GROUP, [Value::Integer(7)])),
        ]);
        assert_eq!(
            identity(&context, &RunLimits::default()),
            Err(IdentityError::InvalidTerm { predicate: GROUP })
        );
    }

    #[test]
    fn it_projects_identity_predicates_onto_a_single_variable() -> TestResult {
        assert_eq!(
            projection("group", GROUP)?.to_string(),
            "group($name) <- k8s:userinfo:group($name)"
        );
        Ok(())
    }

    #[test]
    fn it_keeps_rule_errors_apart_from_term_errors() {
        let error = IdentityError::from(DatalogError::UnboundHeadVariable {
            variable: "name".into(),
        });
        assert!(matches!(error, IdentityError::Query(_)));
        assert_eq!(
            error.to_string(),
            "Variable $name in rule head is not bound by the body"
        );
    }
}
