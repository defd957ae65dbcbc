use nom::{
    character::complete::char,
    combinator::{cut, opt},
    error::context,
    multi::separated_list1,
    Parser,
};

use super::{
    ast::MatchClause,
    common::{keyword, mark_position, ws, ParseResult},
    path_pattern::parse_path_pattern,
    where_clause::parse_where_clause,
};

/// `[OPTIONAL] MATCH pattern (, pattern)* [WHERE expr]`
pub fn parse_match_clause(input: &str) -> ParseResult<'_, MatchClause<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, optional) = opt(keyword("OPTIONAL")).parse(input)?;
    let (input, _) = keyword("MATCH").parse(input)?;

    let (input, path_patterns) = context(
        "Error in match clause",
        cut(separated_list1(ws(char(',')), parse_path_pattern)),
    )
    .parse(input)?;

    let (input, where_clause) = opt(parse_where_clause).parse(input)?;

    Ok((
        input,
        MatchClause {
            position,
            optional: optional.is_some(),
            path_patterns,
            where_clause,
        },
    ))
}
