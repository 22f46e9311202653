//! Tessera Datalog
//!
//! A small, bounded logic engine for authorization decisions. Programs are
//! built from typed [`Fact`]s, range-restricted [`Rule`]s, disjunctive
//! [`Check`]s and ordered [`Policy`] statements. An [`AuthorizerContext`]
//! collects them with the [`Scope`] that introduced each one, and
//! [`AuthorizerContext::evaluate`] runs the rules to a fixpoint under
//! [`RunLimits`] before deciding.
//!
//! ```
//! use tessera_datalog::{AuthorizerContext, Check, Fact, Policy, RunLimits, Scope};
//!
//! let mut context = AuthorizerContext::new()
//!     .with_fact(Fact::new("k8s:verb", ["get"]))
//!     .with_policy(Policy::allow_all());
//! let check: Check = r#"check if k8s:verb("get") or k8s:verb("list")"#.parse().unwrap();
//! context.add_check(Scope::Block(1), check);
//!
//! assert!(context.evaluate(&RunLimits::default()).unwrap().is_allowed());
//! ```

#![warn(missing_docs)]

mod context;
mod engine;
mod error;
mod origin;
mod parser;
mod predicate;
mod rule;
mod term;

pub use context::AuthorizerContext;
pub use engine::{Denial, Evaluation, FailedCheck, RunLimits};
pub use error::{DatalogError, EvaluationError, ParseError};
pub use origin::Scope;
pub use parser::{parse_check, parse_fact, parse_policy, parse_rule};
pub use predicate::{Fact, Predicate};
pub use rule::{Check, Policy, PolicyKind, Query, Rule};
pub use term::{Term, Value};
