use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{not, peek, recognize},
    error::ParseError,
    sequence::{delimited, pair, terminated},
    IResult, Parser,
};

use super::errors::OpenCypherParsingError;

pub type ParseResult<'a, O> = IResult<&'a str, O, OpenCypherParsingError<'a>>;

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

const RESERVED_WORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "WITH", "RETURN", "WHERE", "ORDER", "BY", "SKIP", "LIMIT", "AS", "AND",
    "OR", "XOR", "NOT", "IN", "IS", "NULL", "TRUE", "FALSE", "CASE", "WHEN", "THEN", "ELSE",
    "END", "DISTINCT", "STARTS", "ENDS", "CONTAINS", "ASC", "DESC", "ASCENDING", "DESCENDING",
];

pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

/// Case-insensitive keyword that is not the prefix of a longer identifier
/// (`ORDER` must not match the start of `ORDERS`).
pub fn keyword<'a>(
    kw: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = OpenCypherParsingError<'a>> {
    ws(terminated(
        tag_no_case(kw),
        not(peek(satisfy(is_identifier_char))),
    ))
}

/// Plain or backtick-quoted identifier. Reserved words are allowed here
/// (labels and property keys), see [`parse_variable_name`].
pub fn parse_identifier(input: &str) -> ParseResult<'_, &str> {
    ws(alt((
        delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
        recognize(pair(
            satisfy(|c: char| c.is_alphabetic() || c == '_'),
            take_while(is_identifier_char),
        )),
    )))
    .parse(input)
}

/// An identifier usable as a variable name.
pub fn parse_variable_name(input: &str) -> ParseResult<'_, &str> {
    let (rest, name) = parse_identifier(input)?;
    if !input.trim_start().starts_with('`') && is_reserved_word(name) {
        return Err(nom::Err::Error(OpenCypherParsingError::new(
            input,
            "reserved word used as a variable",
        )));
    }
    Ok((rest, name))
}

/// Skips leading whitespace and reports the remaining length, which the
/// top-level parser turns into a byte offset.
pub fn mark_position(input: &str) -> ParseResult<'_, usize> {
    let (input, _) = multispace0.parse(input)?;
    Ok((input, input.len()))
}

/// The text consumed between `before` and `after`, trimmed.
pub fn consumed<'a>(before: &'a str, after: &'a str) -> &'a str {
    before[..before.len() - after.len()].trim()
}
