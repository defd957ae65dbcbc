//! Unit tests for query parsing edge cases and error handling
//!
//! Tests malformed queries, edge cases, and error conditions to ensure
//! robust parsing without panics.

#[cfg(test)]
mod parser_robustness_tests {
    use relgraph::open_cypher_parser::ast::{Direction, Stage};
    use relgraph::open_cypher_parser::parse_query;
    use relgraph::query_planner::errors::LoweringError;

    /// Test that malformed queries are rejected instead of panicking
    #[test]
    fn test_malformed_queries_are_errors() {
        let malformed_queries = vec![
            "",
            "MATCH",
            "MATCH (",
            "MATCH )",
            "MATCH (n",
            "MATCH (n-",
            "MATCH (n)-[]",
            "RETURN",
            "MATCH (n) RETURN n WHERE",
            "MATCH (n) INVALID_CLAUSE",
        ];

        for query in malformed_queries {
            assert!(parse_query(query).is_err(), "{:?} should not parse", query);
        }
    }

    #[test]
    fn test_whitespace_and_semicolon_are_accepted() {
        let query = parse_query("  MATCH (n:Person)\n\tRETURN n ;  ").unwrap();
        assert_eq!(query.stages.len(), 2);
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let query = parse_query("MATCH (a:Person)-[:KNOWS]->(b) WITH a RETURN a").unwrap();
        let Stage::Match(m) = &query.stages[0] else {
            panic!("expected a match stage");
        };
        let pattern = &m.path_patterns[0];
        assert_eq!(pattern.start.position, 6);
        assert_eq!(pattern.chain[0].relationship.position, 16);
        assert_eq!(pattern.chain[0].relationship.direction, Direction::Outgoing);
        assert_eq!(pattern.chain[0].node.position, 27);
        let Stage::With(w) = &query.stages[1] else {
            panic!("expected a with stage");
        };
        assert_eq!(w.position, 31);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let query = parse_query("match (a:Person) optional match (a)-[r]-(b) return distinct a").unwrap();
        assert_eq!(query.stages.len(), 3);
        assert!(matches!(&query.stages[1], Stage::Match(m) if m.optional));
    }

    #[test]
    fn test_error_converts_with_message() {
        let err = parse_query("MATCH (a:Person) RETURN a )").unwrap_err();
        let lowering: LoweringError = err.into();
        assert!(matches!(lowering, LoweringError::Parse(message) if !message.is_empty()));
    }
}
