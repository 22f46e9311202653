//! Interned strings shared by every block of a token.
//!
//! Indices below [`OFFSET`] refer to the fixed default table. Indices from
//! [`OFFSET`] upward refer to symbols declared by the blocks themselves, in
//! block order: each block only carries the symbols it adds.

use crate::error::FormatError;

/// First index of block-declared symbols.
pub const OFFSET: u64 = 1024;

/// Symbols every token may use without declaring them.
pub const DEFAULT_SYMBOLS: [&str; 28] = [
    "read",
    "write",
    "resource",
    "operation",
    "right",
    "time",
    "role",
    "owner",
    "tenant",
    "namespace",
    "user",
    "team",
    "service",
    "admin",
    "email",
    "group",
    "member",
    "ip_address",
    "client",
    "client_ip",
    "domain",
    "path",
    "version",
    "cluster",
    "node",
    "hostname",
    "nonce",
    "query",
];

/// The cumulative symbol table of a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<String>,
}

impl SymbolTable {
    /// A table holding only the default symbols.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, symbol: &str) -> Option<u64> {
        if let Some(index) = DEFAULT_SYMBOLS.iter().position(|known| *known == symbol) {
            return Some(index as u64);
        }
        self.symbols
            .iter()
            .position(|known| known == symbol)
            .map(|index| OFFSET + index as u64)
    }

    /// Resolve an index to its symbol.
    pub fn get(&self, index: u64) -> Result<&str, FormatError> {
        let found = if index < OFFSET {
            usize::try_from(index)
                .ok()
                .and_then(|index| DEFAULT_SYMBOLS.get(index).copied())
        } else {
            usize::try_from(index - OFFSET)
                .ok()
                .and_then(|index| self.symbols.get(index))
                .map(String::as_str)
        };
        found.ok_or(FormatError::UnknownSymbol(index))
    }

    /// Return the index of `symbol`, adding it to the table if it is new.
    pub fn insert(&mut self, symbol: &str) -> u64 {
        match self.position(symbol) {
            Some(index) => index,
            None => {
                self.symbols.push(symbol.to_string());
                OFFSET + (self.symbols.len() - 1) as u64
            }
        }
    }

    /// Append the symbols declared by a block, rejecting redeclarations.
    pub fn extend(&mut self, declared: &[String]) -> Result<(), FormatError> {
        for symbol in declared {
            if self.position(symbol).is_some() {
                return Err(FormatError::DuplicateSymbol(symbol.clone()));
            }
            self.symbols.push(symbol.clone());
        }
        Ok(())
    }

    /// Symbols added since the table held `mark` block-declared symbols.
    pub fn since(&self, mark: usize) -> &[String] {
        self.symbols.get(mark..).unwrap_or_default()
    }

    /// Number of block-declared symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no block has declared any symbol.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_resolves_default_symbols_without_declaring_them() -> TestResult {
        let mut table = SymbolTable::new();
        assert_eq!(table.insert("group"), 15);
        assert_eq!(table.get(27)?, "query");
        assert!(table.is_empty());
        Ok(())
    }

    #[test]
    fn it_numbers_block_symbols_from_the_offset() -> TestResult {
        let mut table = SymbolTable::new();
        assert_eq!(table.insert("k8s:verb"), OFFSET);
        assert_eq!(table.insert("get"), OFFSET + 1);
        assert_eq!(table.insert("k8s:verb"), OFFSET);
        assert_eq!(table.since(1), ["get".to_string()]);
        assert_eq!(table.get(OFFSET + 1)?, "get");
        assert!(matches!(
            table.get(OFFSET + 2),
            Err(FormatError::UnknownSymbol(_))
        ));
        assert!(matches!(table.get(28), Err(FormatError::UnknownSymbol(28))));
        Ok(())
    }

    #[test]
    fn it_rejects_redeclared_symbols() {
        let mut table = SymbolTable::new();
        assert!(table.extend(&["read".to_string()]).is_err());
        assert!(table.extend(&["pods".to_string()]).is_ok());
        assert!(table.extend(&["pods".to_string()]).is_err());
    }
}
