use nom::{
    combinator::{cut, opt},
    error::context,
    Parser,
};

use super::{
    ast::WithClause,
    common::{keyword, mark_position, ParseResult},
    order_by_and_page_clause::parse_order_by_and_page_clause,
    return_clause::parse_projection_items,
    where_clause::parse_where_clause,
};

/// `WITH [DISTINCT] items [ORDER BY ...] [SKIP n] [LIMIT n] [WHERE expr]`
pub fn parse_with_clause(input: &str) -> ParseResult<'_, WithClause<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, _) = keyword("WITH").parse(input)?;
    let (input, distinct) = opt(keyword("DISTINCT")).parse(input)?;
    let (input, items) =
        context("Error in with clause", cut(parse_projection_items)).parse(input)?;
    let (input, page) = parse_order_by_and_page_clause(input)?;
    let (input, where_clause) = opt(parse_where_clause).parse(input)?;

    Ok((
        input,
        WithClause {
            position,
            distinct: distinct.is_some(),
            items,
            order_by: page.order_by,
            skip: page.skip,
            limit: page.limit,
            where_clause,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_clause_full() {
        let (rest, clause) =
            parse_with_clause("WITH DISTINCT a, count(b) AS c ORDER BY c DESC LIMIT 5 WHERE c > 1 RETURN a")
                .unwrap();
        assert_eq!(rest, "RETURN a");
        assert!(clause.distinct);
        assert_eq!(clause.items.len(), 2);
        assert_eq!(clause.items[1].alias, Some("c"));
        assert_eq!(clause.order_by.len(), 1);
        assert!(clause.limit.is_some());
        assert!(clause.where_clause.is_some());
    }

    #[test]
    fn test_with_requires_items() {
        assert!(matches!(parse_with_clause("WITH RETURN a"), Err(nom::Err::Failure(_))));
    }
}
