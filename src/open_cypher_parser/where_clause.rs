use nom::{combinator::cut, error::context, Parser};

use super::{
    ast::WhereClause,
    common::{keyword, mark_position, ParseResult},
    expression::parse_expression,
};

pub fn parse_where_clause(input: &str) -> ParseResult<'_, WhereClause<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, _) = keyword("WHERE").parse(input)?;
    let (input, conditions) =
        context("Error in where clause", cut(parse_expression)).parse(input)?;

    Ok((
        input,
        WhereClause {
            position,
            conditions,
        },
    ))
}
