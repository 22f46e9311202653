//! Error types for the fact/rule model, the parser and the evaluator

use thiserror::Error;

/// Errors raised while constructing rules, checks and policies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatalogError {
    /// A head variable does not occur in any body predicate
    #[error("Variable ${variable} in rule head is not bound by the body")]
    UnboundHeadVariable {
        /// Name of the head variable, without the `$`
        variable: String,
    },

    /// A check or policy was built without any query
    #[error("{kind} requires at least one query")]
    EmptyQueries {
        /// `"check"` or `"policy"`
        kind: &'static str,
    },

    /// A fact was given a term that is not a concrete value
    #[error("Fact {name} contains variable ${variable}")]
    VariableInFact {
        /// Predicate name of the fact
        name: String,
        /// The variable that was found
        variable: String,
    },
}

/// Errors raised by the evaluator when a program exceeds its run limits or is
/// otherwise not evaluable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The total number of facts exceeded `max_facts`
    #[error("Evaluation exceeded the fact limit of {limit}")]
    TooManyFacts {
        /// The configured bound
        limit: usize,
    },

    /// The fixpoint did not converge within `max_iterations` rounds
    #[error("Evaluation exceeded the iteration limit of {limit}")]
    TooManyIterations {
        /// The configured bound
        limit: usize,
    },

    /// Joining rule bodies produced more than `max_matches` candidate matches
    #[error("Evaluation exceeded the match limit of {limit}")]
    TooManyMatches {
        /// The configured bound
        limit: usize,
    },

    /// The evaluation attempted more than `max_unifications` fact
    /// unifications in total
    #[error("Evaluation exceeded the unification limit of {limit}")]
    TooManyUnifications {
        /// The configured bound
        limit: usize,
    },

    /// A head variable was left unbound after matching the body
    #[error("Unbound variable ${variable} in rule head")]
    UnboundVariable {
        /// Name of the variable, without the `$`
        variable: String,
    },
}

/// A failure to parse the textual syntax
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at {offset}: {message}")]
pub struct ParseError {
    /// Byte offset into the input where parsing stopped
    pub offset: usize,
    /// Human readable reason
    pub message: String,
}

impl From<DatalogError> for ParseError {
    fn from(error: DatalogError) -> Self {
        ParseError {
            offset: 0,
            message: error.to_string(),
        }
    }
}
