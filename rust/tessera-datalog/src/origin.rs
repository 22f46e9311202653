//! Provenance tracking for facts.
//!
//! Every fact carries the set of blocks it was derived from. A rule or check
//! only sees facts whose origin is contained in the trusted set of its own
//! scope, so content appended by a later block can never satisfy a check of
//! an earlier one.

use std::collections::BTreeSet;
use std::fmt;

const AUTHORIZER: usize = usize::MAX;

/// Where a fact, rule or check was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Block `0` is the authority block, `i > 0` are attenuation blocks
    Block(usize),
    /// Content supplied by the party running the evaluation
    Authorizer,
}

impl Scope {
    fn id(self) -> usize {
        match self {
            Scope::Block(index) => index,
            Scope::Authorizer => AUTHORIZER,
        }
    }

    /// The block index, or `None` for the authorizer.
    pub fn block(self) -> Option<usize> {
        match self {
            Scope::Block(index) => Some(index),
            Scope::Authorizer => None,
        }
    }

    /// The origins visible from this scope: the authority block, the
    /// authorizer and the scope itself.
    pub(crate) fn trusted(self) -> Origin {
        let mut trusted = BTreeSet::from([0, AUTHORIZER]);
        trusted.insert(self.id());
        Origin(trusted)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Block(index) => write!(f, "block {index}"),
            Scope::Authorizer => f.write_str("authorizer"),
        }
    }
}

/// The set of scopes a fact was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Origin(BTreeSet<usize>);

impl Origin {
    /// Extend this origin with another.
    pub(crate) fn union(&self, other: &Origin) -> Origin {
        Origin(self.0.union(&other.0).copied().collect())
    }

    /// Whether every scope in this origin is also in `trusted`.
    pub(crate) fn is_trusted_by(&self, trusted: &Origin) -> bool {
        self.0.is_subset(&trusted.0)
    }
}

impl From<Scope> for Origin {
    fn from(scope: Scope) -> Self {
        Origin(BTreeSet::from([scope.id()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_trusts_authority_and_authorizer_from_every_block() {
        let trusted = Scope::Block(2).trusted();
        assert!(Origin::from(Scope::Block(0)).is_trusted_by(&trusted));
        assert!(Origin::from(Scope::Authorizer).is_trusted_by(&trusted));
        assert!(Origin::from(Scope::Block(2)).is_trusted_by(&trusted));
        assert!(!Origin::from(Scope::Block(1)).is_trusted_by(&trusted));
    }

    #[test]
    fn it_does_not_trust_attenuation_blocks_from_the_authorizer() {
        let derived = Origin::from(Scope::Block(0)).union(&Origin::from(Scope::Block(1)));
        assert!(!derived.is_trusted_by(&Scope::Authorizer.trusted()));
        assert!(derived.is_trusted_by(&Scope::Block(1).trusted()));
    }
}
