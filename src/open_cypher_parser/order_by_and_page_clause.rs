use nom::{
    branch::alt,
    character::complete::char,
    combinator::{cut, map, opt},
    error::context,
    multi::separated_list1,
    sequence::preceded,
    Parser,
};

use super::{
    ast::{Expression, OrderByItem, SortOrder},
    common::{keyword, ws, ParseResult},
    expression::parse_expression,
};

/// Trailing `[ORDER BY ...] [SKIP n] [LIMIT n]` of `WITH` and `RETURN`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByAndPageClause<'a> {
    pub order_by: Vec<OrderByItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
}

fn parse_sort_order(input: &str) -> ParseResult<'_, SortOrder> {
    alt((
        map(keyword("ASCENDING"), |_| SortOrder::Asc),
        map(keyword("ASC"), |_| SortOrder::Asc),
        map(keyword("DESCENDING"), |_| SortOrder::Desc),
        map(keyword("DESC"), |_| SortOrder::Desc),
    ))
    .parse(input)
}

fn parse_order_by_item(input: &str) -> ParseResult<'_, OrderByItem<'_>> {
    let (input, expression) = parse_expression(input)?;
    let (input, order) = opt(parse_sort_order).parse(input)?;
    Ok((
        input,
        OrderByItem {
            expression,
            order: order.unwrap_or(SortOrder::Asc),
        },
    ))
}

fn parse_order_by(input: &str) -> ParseResult<'_, Vec<OrderByItem<'_>>> {
    preceded(
        (keyword("ORDER"), keyword("BY")),
        context(
            "Error in order by clause",
            cut(separated_list1(ws(char(',')), parse_order_by_item)),
        ),
    )
    .parse(input)
}

pub fn parse_order_by_and_page_clause(input: &str) -> ParseResult<'_, OrderByAndPageClause<'_>> {
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, skip) = opt(preceded(
        keyword("SKIP"),
        context("Error in skip clause", cut(parse_expression)),
    ))
    .parse(input)?;
    let (input, limit) = opt(preceded(
        keyword("LIMIT"),
        context("Error in limit clause", cut(parse_expression)),
    ))
    .parse(input)?;

    Ok((
        input,
        OrderByAndPageClause {
            order_by: order_by.unwrap_or_default(),
            skip,
            limit,
        },
    ))
}
