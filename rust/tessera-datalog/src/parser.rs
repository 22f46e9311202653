//! Textual syntax for facts, rules, checks and policies.
//!
//! ```text
//! fact    := name "(" value ("," value)* ")"
//! rule    := predicate "<-" body
//! check   := "check if" body ("or" body)*
//! policy  := ("allow" | "deny") "if" body ("or" body)*
//! body    := predicate ("," predicate)* | "true"
//! term    := "$" name | string | integer | "hex:" hexdigits | "true" | "false"
//! ```
//!
//! A trailing `;` is accepted. Every failure is returned as a [`ParseError`].

use std::str::FromStr;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{
        alpha1, alphanumeric1, char, digit1, hex_digit0, multispace0, multispace1,
    },
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::error::{DatalogError, ParseError};
use crate::predicate::{Fact, Predicate};
use crate::rule::{Check, Policy, PolicyKind, Query, Rule};
use crate::term::{Term, Value};

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alpha1,
        many0(alt((alphanumeric1, tag("_"), tag(":")))),
    ))(input)
}

fn variable(input: &str) -> IResult<&str, Term> {
    map(
        preceded(
            char('$'),
            recognize(pair(
                alt((alpha1, tag("_"))),
                many0(alt((alphanumeric1, tag("_"), tag(":")))),
            )),
        ),
        Term::var,
    )(input)
}

fn string(input: &str) -> IResult<&str, Value> {
    let escaped = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((
            value("\\", tag("\\")),
            value("\"", tag("\"")),
            value("\n", tag("n")),
            value("\t", tag("t")),
            value("\r", tag("r")),
        )),
    );
    map(
        delimited(char('"'), opt(escaped), char('"')),
        |content: Option<String>| Value::Str(content.unwrap_or_default()),
    )(input)
}

fn integer(input: &str) -> IResult<&str, Value> {
    map_res(recognize(pair(opt(char('-')), digit1)), |digits: &str| {
        digits.parse::<i64>().map(Value::Integer)
    })(input)
}

fn decode_hex(digits: &str) -> Result<Value, &'static str> {
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(&digits[at..at + 2], 16).map_err(|_| "invalid hex digit"))
        .collect::<Result<Vec<u8>, _>>()
        .map(Value::Bytes)
}

fn bytes(input: &str) -> IResult<&str, Value> {
    map_res(preceded(tag("hex:"), hex_digit0), decode_hex)(input)
}

fn boolean(input: &str) -> IResult<&str, Value> {
    alt((value(Value::Bool(true), tag("true")), value(Value::Bool(false), tag("false"))))(input)
}

fn term(input: &str) -> IResult<&str, Term> {
    alt((
        variable,
        map(alt((string, bytes, boolean, integer)), Term::Value),
    ))(input)
}

fn predicate(input: &str) -> IResult<&str, Predicate> {
    map(
        pair(
            identifier,
            preceded(
                multispace0,
                delimited(
                    char('('),
                    ws(separated_list0(ws(char(',')), term)),
                    char(')'),
                ),
            ),
        ),
        |(name, terms)| Predicate {
            name: name.to_string(),
            terms,
        },
    )(input)
}

fn body(input: &str) -> IResult<&str, Query> {
    alt((
        map(separated_list1(ws(char(',')), predicate), Query::new),
        value(Query::always(), tag("true")),
    ))(input)
}

fn disjunction(input: &str) -> IResult<&str, Vec<Query>> {
    separated_list1(tuple((multispace1, tag("or"), multispace1)), body)(input)
}

fn keyword_if<'a>(keyword: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    value((), tuple((tag(keyword), multispace1, tag("if"), multispace1)))
}

fn statement<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    all_consuming(delimited(
        multispace0,
        inner,
        pair(multispace0, opt(terminated(char(';'), multispace0))),
    ))
}

fn run<'a, O>(
    input: &'a str,
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Result<O, ParseError> {
    match statement(parser)(input) {
        Ok((_, output)) => Ok(output),
        Err(nom::Err::Error(error)) | Err(nom::Err::Failure(error)) => {
            let offset = input.len() - error.input.len();
            let message = match error.input.chars().next() {
                Some(_) => {
                    let snippet: String = error.input.chars().take(16).collect();
                    format!("unexpected input {snippet:?}")
                }
                None => "unexpected end of input".to_string(),
            };
            Err(ParseError { offset, message })
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError {
            offset: input.len(),
            message: "unexpected end of input".to_string(),
        }),
    }
}

/// Parse a single ground fact such as `k8s:userinfo:group("ops")`.
pub fn parse_fact(input: &str) -> Result<Fact, ParseError> {
    let predicate = run(input, predicate)?;
    let name = predicate.name.clone();
    Fact::from_predicate(predicate)
        .map_err(|variable| DatalogError::VariableInFact { name, variable }.into())
}

/// Parse a rule such as `username($x) <- k8s:userinfo:username($x)`.
pub fn parse_rule(input: &str) -> Result<Rule, ParseError> {
    let (head, body) = run(
        input,
        pair(predicate, preceded(ws(tag("<-")), body)),
    )?;
    Ok(Rule::new(head, body)?)
}

/// Parse a check such as `check if k8s:verb("get") or k8s:verb("list")`.
pub fn parse_check(input: &str) -> Result<Check, ParseError> {
    let queries = run(input, preceded(keyword_if("check"), disjunction))?;
    Ok(Check::new(queries)?)
}

/// Parse a policy such as `allow if true`.
pub fn parse_policy(input: &str) -> Result<Policy, ParseError> {
    let (kind, queries) = run(
        input,
        pair(
            alt((
                value(PolicyKind::Allow, keyword_if("allow")),
                value(PolicyKind::Deny, keyword_if("deny")),
            )),
            disjunction,
        ),
    )?;
    Ok(Policy::new(kind, queries)?)
}

impl FromStr for Fact {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_fact(input)
    }
}

impl FromStr for Rule {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_rule(input)
    }
}

impl FromStr for Check {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_check(input)
    }
}

impl FromStr for Policy {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_policy(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn it_parses_facts_with_every_value_kind() -> TestResult {
        let fact: Fact = r#"sample("a\"b", -12, hex:00ff, true)"#.parse()?;
        assert_eq!(
            fact,
            Fact::new(
                "sample",
                [
                    Value::from("a\"b"),
                    Value::Integer(-12),
                    Value::Bytes(vec![0x00, 0xff]),
                    Value::Bool(true),
                ]
            )
        );
        Ok(())
    }

    #[test]
    fn it_parses_empty_strings() -> TestResult {
        let fact: Fact = r#"k8s:namespace("")"#.parse()?;
        assert_eq!(fact, Fact::new("k8s:namespace", [""]));
        Ok(())
    }

    #[test]
    fn it_rejects_variables_in_facts() {
        let error = "k8s:verb($verb)".parse::<Fact>().unwrap_err();
        assert!(error.message.contains("$verb"));
    }

    #[test]
    fn it_parses_rules() -> TestResult {
        let rule: Rule = "group($x) <- k8s:userinfo:group($x)".parse()?;
        assert_eq!(rule.to_string(), "group($x) <- k8s:userinfo:group($x)");
        Ok(())
    }

    #[test]
    fn it_parses_disjunctive_checks() -> TestResult {
        let text = r#"check if k8s:verb("get") or k8s:verb("list"), k8s:namespace("default");"#;
        let check: Check = text.parse()?;
        assert_eq!(check.queries().len(), 2);
        assert_eq!(check.queries()[1].predicates().len(), 2);
        Ok(())
    }

    #[test]
    fn it_parses_policies() -> TestResult {
        let allow: Policy = "allow if true".parse()?;
        assert_eq!(allow, Policy::allow_all());
        let deny: Policy = r#"deny if k8s:verb("delete")"#.parse()?;
        assert_eq!(deny.kind(), PolicyKind::Deny);
        Ok(())
    }

    #[test]
    fn it_reports_the_offset_of_malformed_input() {
        let error = r#"check if k8s:verb("get"#.parse::<Check>().unwrap_err();
        assert_eq!(error.offset, 9);

        let error = "check if".parse::<Check>().unwrap_err();
        assert_eq!(error.offset, 8);
        assert_eq!(error.message, "unexpected end of input");
    }

    #[test]
    fn it_round_trips_display_output() -> TestResult {
        let text = r#"check if k8s:resource("pods"), k8s:name("a\nb") or k8s:verb("list")"#;
        let check: Check = text.parse()?;
        assert_eq!(check.to_string(), text);
        Ok(())
    }
}
