use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, opt, recognize},
    multi::{many1, separated_list0},
    sequence::{delimited, preceded, separated_pair},
    Parser,
};

use super::{
    ast::{
        Case, Expression, FunctionCall, Literal, Operator, OperatorApplication, PropertyAccess,
        PropertyKVPair,
    },
    common::{
        is_identifier_char, is_reserved_word, keyword, parse_identifier, parse_variable_name, ws,
        ParseResult,
    },
    errors::OpenCypherParsingError,
};

// Precedence, loosest first:
// OR, XOR, AND, NOT, comparison / string predicates / IN, IS [NOT] NULL,
// + -, * / %, ^, unary minus, property access, primary.
pub fn parse_expression(input: &str) -> ParseResult<'_, Expression<'_>> {
    parse_logical_or(input)
}

fn binary<'a>(operator: Operator, lhs: Expression<'a>, rhs: Expression<'a>) -> Expression<'a> {
    Expression::OperatorApplication(OperatorApplication {
        operator,
        operands: vec![lhs, rhs],
    })
}

fn unary(operator: Operator, operand: Expression<'_>) -> Expression<'_> {
    Expression::OperatorApplication(OperatorApplication {
        operator,
        operands: vec![operand],
    })
}

/// Left-associative chain `operand (operator operand)*`.
fn fold_binary<'a>(
    input: &'a str,
    operand: fn(&'a str) -> ParseResult<'a, Expression<'a>>,
    operator: fn(&'a str) -> ParseResult<'a, Operator>,
) -> ParseResult<'a, Expression<'a>> {
    let (mut input, mut lhs) = operand(input)?;
    loop {
        let (rest, op) = match operator(input) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        };
        let (rest, rhs) = operand(rest)?;
        lhs = binary(op, lhs, rhs);
        input = rest;
    }
    Ok((input, lhs))
}

fn parse_logical_or(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_logical_xor, |i| {
        map(keyword("OR"), |_| Operator::Or).parse(i)
    })
}

fn parse_logical_xor(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_logical_and, |i| {
        map(keyword("XOR"), |_| Operator::Xor).parse(i)
    })
}

fn parse_logical_and(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_logical_not, |i| {
        map(keyword("AND"), |_| Operator::And).parse(i)
    })
}

fn parse_logical_not(input: &str) -> ParseResult<'_, Expression<'_>> {
    if let Ok((rest, _)) = keyword("NOT").parse(input) {
        let (rest, operand) = parse_logical_not(rest)?;
        return Ok((rest, unary(Operator::Not, operand)));
    }
    parse_comparison(input)
}

fn comparison_operator(input: &str) -> ParseResult<'_, Operator> {
    alt((
        ws(alt((
            map(tag("<>"), |_| Operator::NotEqual),
            map(tag("!="), |_| Operator::NotEqual),
            map(tag("<="), |_| Operator::LessThanEqual),
            map(tag(">="), |_| Operator::GreaterThanEqual),
            map(tag("=~"), |_| Operator::RegexMatch),
            map(tag("="), |_| Operator::Equal),
            map(tag("<"), |_| Operator::LessThan),
            map(tag(">"), |_| Operator::GreaterThan),
        ))),
        map((keyword("STARTS"), keyword("WITH")), |_| Operator::StartsWith),
        map((keyword("ENDS"), keyword("WITH")), |_| Operator::EndsWith),
        map(keyword("CONTAINS"), |_| Operator::Contains),
        map(keyword("IN"), |_| Operator::In),
    ))
    .parse(input)
}

fn parse_comparison(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_null_predicate, comparison_operator)
}

fn parse_null_predicate(input: &str) -> ParseResult<'_, Expression<'_>> {
    let (input, expr) = parse_additive(input)?;
    let (input, op) = opt(preceded(
        keyword("IS"),
        alt((
            map((keyword("NOT"), keyword("NULL")), |_| Operator::IsNotNull),
            map(keyword("NULL"), |_| Operator::IsNull),
        )),
    ))
    .parse(input)?;

    match op {
        Some(op) => Ok((input, unary(op, expr))),
        None => Ok((input, expr)),
    }
}

fn parse_additive(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_multiplicative, |i| {
        ws(alt((
            map(char('+'), |_| Operator::Addition),
            map(char('-'), |_| Operator::Subtraction),
        )))
        .parse(i)
    })
}

fn parse_multiplicative(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_power, |i| {
        ws(alt((
            map(char('*'), |_| Operator::Multiplication),
            map(char('/'), |_| Operator::Division),
            map(char('%'), |_| Operator::ModuloDivision),
        )))
        .parse(i)
    })
}

fn parse_power(input: &str) -> ParseResult<'_, Expression<'_>> {
    fold_binary(input, parse_unary, |i| {
        map(ws(char('^')), |_| Operator::Exponentiation).parse(i)
    })
}

fn parse_unary(input: &str) -> ParseResult<'_, Expression<'_>> {
    if let Ok((rest, _)) = ws(char::<&str, OpenCypherParsingError>('-')).parse(input) {
        let (rest, operand) = parse_unary(rest)?;
        return Ok((rest, negate(operand)));
    }
    parse_postfix(input)
}

fn negate(expr: Expression<'_>) -> Expression<'_> {
    match expr {
        Expression::Literal(Literal::Integer(i)) => Expression::Literal(Literal::Integer(-i)),
        Expression::Literal(Literal::Float(f)) => Expression::Literal(Literal::Float(-f)),
        other => binary(
            Operator::Subtraction,
            Expression::Literal(Literal::Integer(0)),
            other,
        ),
    }
}

/// Primary expression followed by any number of `.key` accesses.
fn parse_postfix(input: &str) -> ParseResult<'_, Expression<'_>> {
    let (mut input, mut expr) = parse_primary(input)?;
    loop {
        match preceded(ws(char('.')), parse_identifier).parse(input) {
            Ok((rest, key)) => {
                expr = Expression::PropertyAccess(PropertyAccess {
                    base: Box::new(expr),
                    key,
                });
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, expr))
}

fn parse_primary(input: &str) -> ParseResult<'_, Expression<'_>> {
    alt((
        map(parse_literal, Expression::Literal),
        parse_parameter,
        parse_case_expression,
        parse_function_call,
        parse_list_expression,
        map(parse_property_map, Expression::Map),
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
        map(parse_variable_name, Expression::Variable),
    ))
    .parse(input)
}

pub fn parse_literal(input: &str) -> ParseResult<'_, Literal<'_>> {
    alt((
        parse_number,
        map(parse_string, Literal::String),
        map(keyword("TRUE"), |_| Literal::Boolean(true)),
        map(keyword("FALSE"), |_| Literal::Boolean(false)),
        map(keyword("NULL"), |_| Literal::Null),
    ))
    .parse(input)
}

fn parse_number(input: &str) -> ParseResult<'_, Literal<'_>> {
    let (rest, text) = ws(recognize((digit1, opt((char('.'), digit1))))).parse(input)?;
    let literal = if text.contains('.') {
        text.parse::<f64>().ok().map(Literal::Float)
    } else {
        text.parse::<i64>().ok().map(Literal::Integer)
    };
    match literal {
        Some(literal) => Ok((rest, literal)),
        None => Err(nom::Err::Failure(OpenCypherParsingError::new(
            input,
            "numeric literal out of range",
        ))),
    }
}

pub fn parse_string(input: &str) -> ParseResult<'_, &str> {
    ws(alt((
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
    )))
    .parse(input)
}

pub fn parse_parameter(input: &str) -> ParseResult<'_, Expression<'_>> {
    map(
        ws(preceded(char('$'), take_while1(is_identifier_char))),
        Expression::Parameter,
    )
    .parse(input)
}

fn parse_function_call(input: &str) -> ParseResult<'_, Expression<'_>> {
    let (rest, name) = parse_identifier(input)?;
    if is_reserved_word(name) {
        return Err(nom::Err::Error(OpenCypherParsingError::new(
            input,
            "reserved word used as a function name",
        )));
    }
    let (rest, _) = ws(char('(')).parse(rest)?;

    // count(*)
    if let Ok((after, _)) =
        (ws(char::<&str, OpenCypherParsingError>('*')), ws(char(')'))).parse(rest)
    {
        return Ok((
            after,
            Expression::FunctionCall(FunctionCall {
                name,
                args: vec![Expression::Star],
                distinct: false,
            }),
        ));
    }

    let (rest, distinct) = opt(keyword("DISTINCT")).parse(rest)?;
    let (rest, args) = separated_list0(ws(char(',')), parse_expression).parse(rest)?;
    let (rest, _) = ws(char(')')).parse(rest)?;

    Ok((
        rest,
        Expression::FunctionCall(FunctionCall {
            name,
            args,
            distinct: distinct.is_some(),
        }),
    ))
}

fn parse_case_expression(input: &str) -> ParseResult<'_, Expression<'_>> {
    let (input, _) = keyword("CASE").parse(input)?;

    // `CASE WHEN ...` has no operand; `CASE x WHEN ...` does
    let (input, expr) = if keyword("WHEN").parse(input).is_ok() {
        (input, None)
    } else {
        let (input, expr) = parse_expression(input)?;
        (input, Some(Box::new(expr)))
    };

    let (input, when_then) = many1(preceded(
        keyword("WHEN"),
        separated_pair(parse_expression, keyword("THEN"), parse_expression),
    ))
    .parse(input)?;
    let (input, else_expr) = opt(preceded(keyword("ELSE"), parse_expression)).parse(input)?;
    let (input, _) = keyword("END").parse(input)?;

    Ok((
        input,
        Expression::Case(Case {
            expr,
            when_then,
            else_expr: else_expr.map(Box::new),
        }),
    ))
}

fn parse_list_expression(input: &str) -> ParseResult<'_, Expression<'_>> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), parse_expression),
            ws(char(']')),
        ),
        Expression::List,
    )
    .parse(input)
}

/// `{key: expr, ...}`, used for map literals and inline node properties.
pub fn parse_property_map(input: &str) -> ParseResult<'_, Vec<PropertyKVPair<'_>>> {
    delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            map(
                separated_pair(parse_identifier, ws(char(':')), parse_expression),
                |(key, value)| PropertyKVPair { key, value },
            ),
        ),
        ws(char('}')),
    )
    .parse(input)
}
