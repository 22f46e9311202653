//! Values and terms.
//!
//! A [`Value`] is a concrete, typed literal. A [`Term`] is what may appear in
//! a predicate position of a rule, check or policy: either a concrete value
//! or a named variable bound during unification. Facts only ever hold
//! values, so the type system keeps variables out of the fact set.

use std::fmt;

/// A concrete, typed literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// UTF-8 string
    Str(String),
    /// Signed 64-bit integer
    Integer(i64),
    /// Arbitrary byte sequence
    Bytes(Vec<u8>),
    /// Boolean
    Bool(bool),
}

impl Value {
    /// Returns the string content if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(value) => {
                f.write_str("\"")?;
                for c in value.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Value::Integer(value) => write!(f, "{value}"),
            Value::Bytes(value) => {
                f.write_str("hex:")?;
                for byte in value {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// A term in a rule, check or policy predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A named variable, written `$name`
    Variable(String),
    /// A concrete value
    Value(Value),
}

impl Term {
    /// Create a variable term.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    /// Returns the variable name if this term is a variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            Term::Value(_) => None,
        }
    }
}

impl From<Value> for Term {
    fn from(value: Value) -> Self {
        Term::Value(value)
    }
}

macro_rules! impl_term_from_value {
    ($($source:ty),*) => {
        $(
            impl From<$source> for Term {
                fn from(value: $source) -> Self {
                    Term::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_term_from_value!(&str, String, &String, i64, bool, Vec<u8>);

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "${name}"),
            Term::Value(value) => fmt::Display::fmt(value, f),
        }
    }
}
