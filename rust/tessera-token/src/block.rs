//! Block content: the facts, rules and checks carried by one signed segment.

use std::fmt;

use tessera_datalog::{AuthorizerContext, Check, Fact, Rule, Scope};

/// Schema version written for new blocks.
pub const BLOCK_VERSION: u32 = 3;

/// Oldest block schema version this crate reads.
pub const MIN_BLOCK_VERSION: u32 = 3;

/// Newest block schema version this crate reads.
pub const MAX_BLOCK_VERSION: u32 = 6;

/// The decoded content of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub(crate) facts: Vec<Fact>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) checks: Vec<Check>,
    pub(crate) context: Option<String>,
    pub(crate) version: u32,
}

impl Block {
    /// Facts asserted by the block.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Rules declared by the block.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Checks declared by the block.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Free-form context string.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Schema version the block was encoded with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Add this block's content to `context` under `scope`.
    pub fn load_into(&self, scope: Scope, context: &mut AuthorizerContext) {
        for fact in &self.facts {
            context.add_fact(scope, fact.clone());
        }
        for rule in &self.rules {
            context.add_rule(scope, rule.clone());
        }
        for check in &self.checks {
            context.add_check(scope, check.clone());
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            writeln!(f, "// context: {context}")?;
        }
        for fact in &self.facts {
            writeln!(f, "{fact};")?;
        }
        for rule in &self.rules {
            writeln!(f, "{rule};")?;
        }
        for check in &self.checks {
            writeln!(f, "{check};")?;
        }
        Ok(())
    }
}

/// Accumulates the content of a block before it is signed.
#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    facts: Vec<Fact>,
    rules: Vec<Rule>,
    checks: Vec<Check>,
    context: Option<String>,
}

impl BlockBuilder {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a fact.
    pub fn add_fact(&mut self, fact: Fact) {
        self.facts.push(fact);
    }

    /// Declare a rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Declare a check.
    pub fn add_check(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// Attach a free-form context string.
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = Some(context.into());
    }

    /// Assert a fact.
    pub fn with_fact(mut self, fact: Fact) -> Self {
        self.add_fact(fact);
        self
    }

    /// Declare a rule.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Declare a check.
    pub fn with_check(mut self, check: Check) -> Self {
        self.add_check(check);
        self
    }

    /// Attach a free-form context string.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.set_context(context);
        self
    }

    /// Whether the block would carry no facts, rules or checks.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.rules.is_empty() && self.checks.is_empty()
    }

    pub(crate) fn build(self) -> Block {
        Block {
            facts: self.facts,
            rules: self.rules,
            checks: self.checks,
            context: self.context,
            version: BLOCK_VERSION,
        }
    }
}
