//! Cypher front end.
//!
//! Parses the supported read-only subset into the stage-list AST of [`ast`]:
//! `MATCH` / `OPTIONAL MATCH`, `WITH` and a final `RETURN`.

use ast::{CypherQuery, Expression, Stage};
use common::{ws, ParseResult};
use errors::OpenCypherParsingError;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::multispace0;
use nom::combinator::{map, opt};
use nom::multi::many1;
use nom::Parser;

pub mod ast;
mod common;
pub mod errors;
mod expression;
mod match_clause;
mod order_by_and_page_clause;
mod path_pattern;
mod return_clause;
mod where_clause;
mod with_clause;

fn parse_stage(input: &str) -> ParseResult<'_, Stage<'_>> {
    alt((
        map(match_clause::parse_match_clause, Stage::Match),
        map(with_clause::parse_with_clause, Stage::With),
        map(return_clause::parse_return_clause, Stage::Return),
    ))
    .parse(input)
}

pub fn parse_statement(input: &str) -> ParseResult<'_, CypherQuery<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (input, stages) = many1(parse_stage).parse(input)?;
    let (input, _) = opt(ws(tag(";"))).parse(input)?;
    Ok((input, CypherQuery { stages }))
}

/// Parse a complete query. Positions in the result are byte offsets into `input`.
pub fn parse_query(input: &str) -> Result<CypherQuery<'_>, OpenCypherParsingError<'_>> {
    match parse_statement(input) {
        Ok((remainder, mut query)) => {
            if !remainder.trim().is_empty() {
                return Err(OpenCypherParsingError::new(
                    remainder,
                    "Unexpected tokens after query",
                ));
            }
            rebase_positions(&mut query, input.len());
            Ok(query)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(OpenCypherParsingError::new("", "Incomplete input")),
    }
}

// Sub-parsers record the remaining input length; turn those into offsets.
fn rebase_positions(query: &mut CypherQuery<'_>, total: usize) {
    let rebase = |p: &mut usize| *p = total.saturating_sub(*p);
    for stage in &mut query.stages {
        match stage {
            Stage::Match(m) => {
                rebase(&mut m.position);
                for path in &mut m.path_patterns {
                    rebase(&mut path.position);
                    rebase(&mut path.start.position);
                    for connected in &mut path.chain {
                        rebase(&mut connected.relationship.position);
                        rebase(&mut connected.node.position);
                    }
                }
                if let Some(w) = &mut m.where_clause {
                    rebase(&mut w.position);
                }
            }
            Stage::With(w) => {
                rebase(&mut w.position);
                w.items.iter_mut().for_each(|i| rebase(&mut i.position));
                if let Some(wc) = &mut w.where_clause {
                    rebase(&mut wc.position);
                }
            }
            Stage::Return(r) => {
                rebase(&mut r.position);
                r.items.iter_mut().for_each(|i| rebase(&mut i.position));
            }
        }
    }
}

impl<'a> CypherQuery<'a> {
    /// Variables referenced anywhere in `expr`, in order of appearance.
    pub fn referenced_names(expr: &Expression<'a>) -> Vec<&'a str> {
        let mut names = vec![];
        collect_names(expr, &mut names);
        names
    }
}

fn collect_names<'a>(expr: &Expression<'a>, names: &mut Vec<&'a str>) {
    match expr {
        Expression::Variable(name) => {
            if !names.contains(name) {
                names.push(name);
            }
        }
        Expression::List(items) => items.iter().for_each(|e| collect_names(e, names)),
        Expression::Map(entries) => entries.iter().for_each(|kv| collect_names(&kv.value, names)),
        Expression::PropertyAccess(access) => collect_names(&access.base, names),
        Expression::OperatorApplication(app) => {
            app.operands.iter().for_each(|e| collect_names(e, names))
        }
        Expression::FunctionCall(call) => call.args.iter().for_each(|e| collect_names(e, names)),
        Expression::Case(case) => {
            if let Some(e) = &case.expr {
                collect_names(e, names);
            }
            for (when, then) in &case.when_then {
                collect_names(when, names);
                collect_names(then, names);
            }
            if let Some(e) = &case.else_expr {
                collect_names(e, names);
            }
        }
        Expression::Literal(_) | Expression::Parameter(_) | Expression::Star => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Direction, VariableLengthSpec};

    #[test]
    fn test_parse_full_query() {
        let query = "
            MATCH (a:Person)-[:KNOWS]->(b)
            WHERE a.age > 30
            WITH a, count(b) AS friends
            WHERE friends > 2
            RETURN a.name AS name, friends
            ORDER BY friends DESC
            LIMIT 10;
        ";
        let ast = parse_query(query).expect("query should parse");
        assert_eq!(ast.stages.len(), 3);
        match &ast.stages[0] {
            Stage::Match(m) => {
                assert_eq!(m.path_patterns.len(), 1);
                let rel = &m.path_patterns[0].chain[0].relationship;
                assert_eq!(rel.direction, Direction::Outgoing);
                assert_eq!(rel.labels, vec!["KNOWS"]);
                assert!(m.where_clause.is_some());
            }
            other => panic!("expected MATCH, got {:?}", other),
        }
        assert!(matches!(&ast.stages[1], Stage::With(w) if w.where_clause.is_some()));
        assert!(matches!(&ast.stages[2], Stage::Return(r) if r.limit.is_some()));
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let query = "MATCH (a)-->(b) RETURN a";
        let ast = parse_query(query).unwrap();
        let Stage::Match(m) = &ast.stages[0] else {
            panic!("expected MATCH")
        };
        assert_eq!(m.position, 0);
        assert_eq!(m.path_patterns[0].position, 6);
        assert_eq!(m.path_patterns[0].start.position, 6);
        assert_eq!(m.path_patterns[0].chain[0].relationship.position, 9);
        assert_eq!(m.path_patterns[0].chain[0].node.position, 12);
        let Stage::Return(r) = &ast.stages[1] else {
            panic!("expected RETURN")
        };
        assert_eq!(r.position, 16);
        assert_eq!(r.items[0].position, 23);
    }

    #[test]
    fn test_optional_match_and_fixed_length() {
        let ast = parse_query("MATCH (a) OPTIONAL MATCH (a)-[:R*2]-(c) RETURN c").unwrap();
        let Stage::Match(m) = &ast.stages[1] else {
            panic!("expected MATCH")
        };
        assert!(m.optional);
        assert_eq!(
            m.path_patterns[0].chain[0].relationship.variable_length,
            Some(VariableLengthSpec::fixed(2))
        );
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let err = parse_query("MATCH (a) RETURN a )").unwrap_err();
        assert!(err.to_string().contains("Unexpected tokens"));
        assert_eq!(err.offset_in("MATCH (a) RETURN a )"), 19);
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(parse_query("   ").is_err());
    }

    #[test]
    fn test_referenced_names() {
        let ast = parse_query("MATCH (a) RETURN a.x + b.y, a").unwrap();
        let Stage::Return(r) = &ast.stages[1] else {
            panic!("expected RETURN")
        };
        assert_eq!(
            CypherQuery::referenced_names(&r.items[0].expression),
            vec!["a", "b"]
        );
    }
}
