use nom::{
    character::complete::char,
    combinator::{cut, opt},
    error::context,
    multi::separated_list1,
    sequence::preceded,
    Parser,
};

use super::{
    ast::{ProjectionItem, ReturnClause},
    common::{consumed, keyword, mark_position, parse_variable_name, ws, ParseResult},
    expression::parse_expression,
    order_by_and_page_clause::parse_order_by_and_page_clause,
};

/// `expr [AS alias]`, shared by `WITH` and `RETURN`.
pub fn parse_projection_item(input: &str) -> ParseResult<'_, ProjectionItem<'_>> {
    let (start, position) = mark_position(input)?;
    let (after_expr, expression) = parse_expression(start)?;
    let text = consumed(start, after_expr);
    let (input, alias) = opt(preceded(keyword("AS"), parse_variable_name)).parse(after_expr)?;

    Ok((
        input,
        ProjectionItem {
            position,
            expression,
            alias,
            text,
        },
    ))
}

pub fn parse_projection_items(input: &str) -> ParseResult<'_, Vec<ProjectionItem<'_>>> {
    separated_list1(ws(char(',')), parse_projection_item).parse(input)
}

pub fn parse_return_clause(input: &str) -> ParseResult<'_, ReturnClause<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, _) = keyword("RETURN").parse(input)?;
    let (input, distinct) = opt(keyword("DISTINCT")).parse(input)?;
    let (input, items) =
        context("Error in return clause", cut(parse_projection_items)).parse(input)?;
    let (input, page) = parse_order_by_and_page_clause(input)?;

    Ok((
        input,
        ReturnClause {
            position,
            distinct: distinct.is_some(),
            items,
            order_by: page.order_by,
            skip: page.skip,
            limit: page.limit,
        },
    ))
}
