//! Conversion between block content and its protobuf form.

use tessera_datalog::{Check, Fact, Predicate, Query, Rule, Term, Value};

use super::schema;
use crate::block::{Block, MAX_BLOCK_VERSION, MIN_BLOCK_VERSION};
use crate::error::FormatError;
use crate::symbol::SymbolTable;

/// Head used for the rules that encode check queries.
const QUERY_HEAD: &str = "query";

fn encode_term(term: &Term, symbols: &mut SymbolTable) -> Result<schema::TermV2, FormatError> {
    use schema::term_v2::Content;

    let content = match term {
        Term::Variable(name) => Content::Variable(
            u32::try_from(symbols.insert(name)).map_err(|_| FormatError::TooManySymbols)?,
        ),
        Term::Value(Value::Str(value)) => Content::String(symbols.insert(value)),
        Term::Value(Value::Integer(value)) => Content::Integer(*value),
        Term::Value(Value::Bytes(value)) => Content::Bytes(value.clone()),
        Term::Value(Value::Bool(value)) => Content::Bool(*value),
    };
    Ok(schema::TermV2 {
        content: Some(content),
    })
}

fn encode_predicate(
    predicate: &Predicate,
    symbols: &mut SymbolTable,
) -> Result<schema::PredicateV2, FormatError> {
    Ok(schema::PredicateV2 {
        name: symbols.insert(&predicate.name),
        terms: predicate
            .terms
            .iter()
            .map(|term| encode_term(term, symbols))
            .collect::<Result<_, _>>()?,
    })
}

fn encode_rule(
    head: &Predicate,
    body: &Query,
    symbols: &mut SymbolTable,
) -> Result<schema::RuleV2, FormatError> {
    Ok(schema::RuleV2 {
        head: encode_predicate(head, symbols)?,
        body: body
            .predicates()
            .iter()
            .map(|predicate| encode_predicate(predicate, symbols))
            .collect::<Result<_, _>>()?,
        expressions: Vec::new(),
        scope: Vec::new(),
    })
}

/// Encode `block`, adding the symbols it introduces to `symbols` and
/// declaring exactly those in the result.
pub(crate) fn encode_block(
    block: &Block,
    symbols: &mut SymbolTable,
) -> Result<schema::Block, FormatError> {
    let mark = symbols.len();
    let query_head = Predicate::new(QUERY_HEAD, Vec::<Term>::new());

    let facts_v2 = block
        .facts
        .iter()
        .map(|fact| -> Result<_, FormatError> {
            Ok(schema::FactV2 {
                predicate: encode_predicate(&Predicate::from(fact.clone()), symbols)?,
            })
        })
        .collect::<Result<_, _>>()?;
    let rules_v2 = block
        .rules
        .iter()
        .map(|rule| encode_rule(rule.head(), rule.body(), symbols))
        .collect::<Result<_, _>>()?;
    let checks_v2 = block
        .checks
        .iter()
        .map(|check| -> Result<_, FormatError> {
            Ok(schema::CheckV2 {
                queries: check
                    .queries()
                    .iter()
                    .map(|query| encode_rule(&query_head, query, symbols))
                    .collect::<Result<_, _>>()?,
                kind: None,
            })
        })
        .collect::<Result<_, _>>()?;

    Ok(schema::Block {
        symbols: symbols.since(mark).to_vec(),
        context: block.context.clone(),
        version: Some(block.version),
        facts_v2,
        rules_v2,
        checks_v2,
        scope: Vec::new(),
        public_keys: Vec::new(),
    })
}

fn decode_term(term: &schema::TermV2, symbols: &SymbolTable) -> Result<Term, FormatError> {
    use schema::term_v2::Content;

    Ok(match term.content.as_ref().ok_or(FormatError::MissingTerm)? {
        Content::Variable(index) => Term::Variable(symbols.get(u64::from(*index))?.to_string()),
        Content::Integer(value) => Term::Value(Value::Integer(*value)),
        Content::String(index) => Term::Value(Value::Str(symbols.get(*index)?.to_string())),
        Content::Date(_) => return Err(FormatError::Unsupported("date terms")),
        Content::Bytes(value) => Term::Value(Value::Bytes(value.clone())),
        Content::Bool(value) => Term::Value(Value::Bool(*value)),
    })
}

fn decode_predicate(
    predicate: &schema::PredicateV2,
    symbols: &SymbolTable,
) -> Result<Predicate, FormatError> {
    Ok(Predicate {
        name: symbols.get(predicate.name)?.to_string(),
        terms: predicate
            .terms
            .iter()
            .map(|term| decode_term(term, symbols))
            .collect::<Result<_, _>>()?,
    })
}

fn decode_body(rule: &schema::RuleV2, symbols: &SymbolTable) -> Result<Query, FormatError> {
    if !rule.expressions.is_empty() {
        return Err(FormatError::Unsupported("expressions"));
    }
    if !rule.scope.is_empty() {
        return Err(FormatError::Unsupported("scope annotations"));
    }
    Ok(Query::new(
        rule.body
            .iter()
            .map(|predicate| decode_predicate(predicate, symbols))
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

fn decode_check(check: &schema::CheckV2, symbols: &SymbolTable) -> Result<Check, FormatError> {
    if check
        .kind
        .is_some_and(|kind| kind != schema::check_v2::Kind::One as i32)
    {
        return Err(FormatError::Unsupported("check kinds other than `check if`"));
    }
    let queries = check
        .queries
        .iter()
        .map(|query| decode_body(query, symbols))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Check::new(queries)?)
}

/// Decode `block`, first extending `symbols` with the symbols it declares.
pub(crate) fn decode_block(
    block: schema::Block,
    symbols: &mut SymbolTable,
) -> Result<Block, FormatError> {
    let version = block.version.unwrap_or_default();
    if !(MIN_BLOCK_VERSION..=MAX_BLOCK_VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion(version));
    }
    if !block.scope.is_empty() {
        return Err(FormatError::Unsupported("scope annotations"));
    }
    if !block.public_keys.is_empty() {
        return Err(FormatError::Unsupported("public key tables"));
    }

    symbols.extend(&block.symbols)?;
    let symbols = &*symbols;

    let facts = block
        .facts_v2
        .iter()
        .map(|fact| -> Result<Fact, FormatError> {
            let predicate = decode_predicate(&fact.predicate, symbols)?;
            let name = predicate.name.clone();
            Fact::from_predicate(predicate)
                .map_err(|variable| FormatError::VariableInFact { name, variable })
        })
        .collect::<Result<_, _>>()?;
    let rules = block
        .rules_v2
        .iter()
        .map(|rule| -> Result<_, FormatError> {
            let head = decode_predicate(&rule.head, symbols)?;
            Ok(Rule::new(head, decode_body(rule, symbols)?)?)
        })
        .collect::<Result<_, _>>()?;
    let checks = block
        .checks_v2
        .iter()
        .map(|check| decode_check(check, symbols))
        .collect::<Result<_, _>>()?;

    Ok(Block {
        facts,
        rules,
        checks,
        context: block.context,
        version,
    })
}
