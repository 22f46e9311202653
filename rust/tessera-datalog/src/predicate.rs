//! Predicates and facts.

use std::fmt;

use crate::term::{Term, Value};

/// A predicate name applied to an ordered list of terms, as it appears in
/// rule heads and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Predicate {
    /// Predicate name, e.g. `k8s:verb`
    pub name: String,
    /// Positional terms
    pub terms: Vec<Term>,
}

impl Predicate {
    /// Create a predicate from a name and its terms.
    pub fn new<T>(name: impl Into<String>, terms: impl IntoIterator<Item = T>) -> Self
    where
        T: Into<Term>,
    {
        Self {
            name: name.into(),
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    /// Iterate over the variable names used by this predicate.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(Term::as_variable)
    }
}

impl From<Fact> for Predicate {
    fn from(fact: Fact) -> Self {
        Predicate {
            name: fact.name,
            terms: fact.values.into_iter().map(Term::Value).collect(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (index, term) in self.terms.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(term, f)?;
        }
        f.write_str(")")
    }
}

/// A ground predicate: a name applied to concrete values.
///
/// Facts are immutable values compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fact {
    name: String,
    values: Vec<Value>,
}

impl Fact {
    /// Create a fact from a name and its values.
    pub fn new<V>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Convert a predicate into a fact, returning the name of the first
    /// variable if the predicate is not ground.
    pub fn from_predicate(predicate: Predicate) -> Result<Self, String> {
        let mut values = Vec::with_capacity(predicate.terms.len());
        for term in predicate.terms {
            match term {
                Term::Value(value) => values.push(value),
                Term::Variable(name) => return Err(name),
            }
        }
        Ok(Self {
            name: predicate.name,
            values,
        })
    }

    /// The predicate name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The positional values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(value, f)?;
        }
        f.write_str(")")
    }
}
