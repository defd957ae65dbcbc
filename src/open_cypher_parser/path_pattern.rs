use nom::{
    character::complete::{char, digit1},
    combinator::opt,
    multi::{many0, separated_list1},
    sequence::{delimited, preceded, terminated},
    Parser,
};

use super::{
    ast::{
        ConnectedPattern, Direction, NodePattern, PathPattern, RelationshipPattern,
        VariableLengthSpec,
    },
    common::{mark_position, parse_identifier, parse_variable_name, ws, ParseResult},
    errors::OpenCypherParsingError,
    expression::parse_property_map,
};

/// Upper bound on relationships in one path pattern, guards against
/// pathological inputs.
const MAX_RELATIONSHIP_CHAIN_DEPTH: usize = 50;

/// `[p =] (node) (-[rel]- (node))*`
pub fn parse_path_pattern(input: &str) -> ParseResult<'_, PathPattern<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, path_variable) =
        opt(terminated(parse_variable_name, ws(char('=')))).parse(input)?;
    let (input, start) = parse_node_pattern(input)?;
    let (input, chain) = many0(parse_connected_pattern).parse(input)?;

    if chain.len() > MAX_RELATIONSHIP_CHAIN_DEPTH {
        return Err(nom::Err::Failure(OpenCypherParsingError::new(
            input,
            "path pattern has too many relationships",
        )));
    }

    Ok((
        input,
        PathPattern {
            position,
            path_variable,
            start,
            chain,
        },
    ))
}

fn parse_connected_pattern(input: &str) -> ParseResult<'_, ConnectedPattern<'_>> {
    let (input, relationship) = parse_relationship_pattern(input)?;
    let (input, node) = parse_node_pattern(input)?;
    Ok((input, ConnectedPattern { relationship, node }))
}

/// `(name:Label1:Label2 {key: value})`, every part optional.
pub fn parse_node_pattern(input: &str) -> ParseResult<'_, NodePattern<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, _) = ws(char('(')).parse(input)?;
    let (input, name) = opt(parse_variable_name).parse(input)?;
    let (input, labels) = parse_labels(input)?;
    let (input, properties) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;

    Ok((
        input,
        NodePattern {
            position,
            name,
            labels,
            properties: properties.unwrap_or_default(),
        },
    ))
}

fn parse_labels(input: &str) -> ParseResult<'_, Vec<&str>> {
    many0(preceded(ws(char(':')), parse_identifier)).parse(input)
}

/// `-->`, `<--`, `--` and their bracketed forms `-[r:T1|T2*2]->`.
pub fn parse_relationship_pattern(input: &str) -> ParseResult<'_, RelationshipPattern<'_>> {
    let (input, position) = mark_position(input)?;
    let (input, left_arrow) = opt(ws(char('<'))).parse(input)?;
    let (input, _) = ws(char('-')).parse(input)?;
    let (input, details) =
        opt(delimited(ws(char('[')), parse_relationship_details, ws(char(']')))).parse(input)?;
    let (input, _) = ws(char('-')).parse(input)?;
    let (input, right_arrow) = opt(ws(char('>'))).parse(input)?;

    let direction = match (left_arrow.is_some(), right_arrow.is_some()) {
        (false, true) => Direction::Outgoing,
        (true, false) => Direction::Incoming,
        _ => Direction::Either,
    };
    let (name, labels, variable_length) = details.unwrap_or((None, vec![], None));

    Ok((
        input,
        RelationshipPattern {
            position,
            name,
            labels,
            direction,
            variable_length,
        },
    ))
}

type RelationshipDetails<'a> = (Option<&'a str>, Vec<&'a str>, Option<VariableLengthSpec>);

fn parse_relationship_details(input: &str) -> ParseResult<'_, RelationshipDetails<'_>> {
    let (input, name) = opt(parse_variable_name).parse(input)?;
    let (input, labels) = opt(preceded(
        ws(char(':')),
        separated_list1(ws(char('|')), preceded(opt(ws(char(':'))), parse_identifier)),
    ))
    .parse(input)?;
    let (input, variable_length) = opt(parse_variable_length).parse(input)?;

    // relationship property maps are not part of the supported subset
    if let Ok((_, _)) = parse_property_map(input) {
        return Err(nom::Err::Failure(OpenCypherParsingError::new(
            input,
            "relationship properties are not supported",
        )));
    }

    Ok((input, (name, labels.unwrap_or_default(), variable_length)))
}

fn parse_hop_count(input: &str) -> ParseResult<'_, u32> {
    let (rest, digits) = ws(digit1).parse(input)?;
    match digits.parse::<u32>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => Err(nom::Err::Failure(OpenCypherParsingError::new(
            input,
            "hop count out of range",
        ))),
    }
}

/// `*`, `*3`, `*1..3`, `*..3`, `*2..`
fn parse_variable_length(input: &str) -> ParseResult<'_, VariableLengthSpec> {
    let (input, _) = ws(char('*')).parse(input)?;
    let (input, min_hops) = opt(parse_hop_count).parse(input)?;
    let (input, range) = opt(preceded(
        ws((char('.'), char('.'))),
        opt(parse_hop_count),
    ))
    .parse(input)?;

    let spec = match range {
        None => VariableLengthSpec {
            min_hops,
            max_hops: min_hops,
        },
        Some(max_hops) => VariableLengthSpec { min_hops, max_hops },
    };
    Ok((input, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Expression, Literal};

    #[test]
    fn test_node_pattern_full() {
        let (rest, node) = parse_node_pattern("(a:Person:Employee {name: 'Alice'}) rest").unwrap();
        assert_eq!(rest, "rest");
        assert_eq!(node.name, Some("a"));
        assert_eq!(node.labels, vec!["Person", "Employee"]);
        assert_eq!(node.properties.len(), 1);
        assert_eq!(node.properties[0].key, "name");
        assert_eq!(
            node.properties[0].value,
            Expression::Literal(Literal::String("Alice"))
        );
    }

    #[test]
    fn test_anonymous_node() {
        let (_, node) = parse_node_pattern("()").unwrap();
        assert_eq!(node.name, None);
        assert!(node.labels.is_empty());
    }

    #[test]
    fn test_relationship_directions() {
        let (_, rel) = parse_relationship_pattern("-->").unwrap();
        assert_eq!(rel.direction, Direction::Outgoing);
        let (_, rel) = parse_relationship_pattern("<-[r:KNOWS]-").unwrap();
        assert_eq!(rel.direction, Direction::Incoming);
        assert_eq!(rel.name, Some("r"));
        assert_eq!(rel.labels, vec!["KNOWS"]);
        let (_, rel) = parse_relationship_pattern("-[:A|B]-").unwrap();
        assert_eq!(rel.direction, Direction::Either);
        assert_eq!(rel.labels, vec!["A", "B"]);
    }

    #[test]
    fn test_variable_length() {
        let (_, rel) = parse_relationship_pattern("-[:KNOWS*2]->").unwrap();
        assert_eq!(rel.variable_length, Some(VariableLengthSpec::fixed(2)));
        let (_, rel) = parse_relationship_pattern("-[*1..3]->").unwrap();
        let spec = rel.variable_length.unwrap();
        assert_eq!((spec.min_hops, spec.max_hops), (Some(1), Some(3)));
        assert_eq!(spec.fixed_length(), None);
        let (_, rel) = parse_relationship_pattern("-[*]-").unwrap();
        assert_eq!(rel.variable_length.unwrap().fixed_length(), None);
    }

    #[test]
    fn test_path_pattern_chain_and_binding() {
        let (rest, path) = parse_path_pattern("p = (a)-[:R]->(b)<--(c) RETURN").unwrap();
        assert_eq!(rest, "RETURN");
        assert_eq!(path.path_variable, Some("p"));
        assert_eq!(path.start.name, Some("a"));
        assert_eq!(path.chain.len(), 2);
        assert_eq!(path.chain[1].node.name, Some("c"));
        assert_eq!(path.chain[1].relationship.direction, Direction::Incoming);
    }

    #[test]
    fn test_relationship_properties_rejected() {
        assert!(matches!(
            parse_relationship_pattern("-[r {since: 1}]->"),
            Err(nom::Err::Failure(_))
        ));
    }
}
