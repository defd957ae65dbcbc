//! Single-table translations: stages, joins, filters and errors

#[cfg(test)]
mod translation_tests {
    use relgraph::config::LoweringConfig;
    use relgraph::open_cypher_parser::parse_query;
    use relgraph::query_planner::errors::LoweringError;
    use relgraph::query_planner::lower;
    use relgraph::query_planner::select_tree::BaseSelect;
    use relgraph::sql_generator::errors::RenderError;
    use relgraph::{cypher_to_sql, TranslationError};
    use test_case::test_case;

    use crate::common::social;

    fn translate(query: &str) -> Result<String, TranslationError> {
        cypher_to_sql(query, &social(), &LoweringConfig::default())
    }

    #[test]
    fn test_single_stage_sql() {
        assert_eq!(
            translate("MATCH (a:Person) RETURN a.name").unwrap(),
            "WITH \"SUB_1\" AS (SELECT \"a_6\".\"id\" AS \"a_6.__id0\", \
             \"a_6\".\"full_name\" AS \"a_6.name\" FROM \"persons\" AS \"a_6\") \
             SELECT \"SUB_1\".\"a_6.name\" AS \"a.name\" FROM \"SUB_1\""
        );
    }

    #[test_case("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN b.name", "JOIN \"knows\" AS" ; "directed relationship")]
    #[test_case("MATCH (c:Company)<-[:WORKS_AT]-(a:Person) RETURN a.name", "JOIN \"companies\" AS" ; "incoming relationship")]
    #[test_case("MATCH (a:Person) WHERE a.age > 30 RETURN a.name", "age\" > 30)" ; "where clause")]
    #[test_case("MATCH (a:Person) RETURN toUpper(a.name) AS n", "upper(\"SUB_1\".\"a_6.name\") AS \"n\"" ; "scalar function")]
    #[test_case("MATCH (a:Person) RETURN a.name ORDER BY a.name DESC LIMIT 5", " DESC LIMIT 5" ; "order and limit")]
    #[test_case("MATCH (a:Person) OPTIONAL MATCH (a)-[:WORKS_AT]->(c:Company) RETURN a.name, c.name", "LEFT JOIN (\"employment\"" ; "optional match")]
    #[test_case("MATCH (a:Person)-[:LIVES_IN]->(c:City) RETURN c.name, count(a) AS n", "GROUP BY 1" ; "grouping")]
    fn test_translation_contains(query: &str, fragment: &str) {
        let sql = translate(query).unwrap();
        assert!(sql.contains(fragment), "{}\n{}", query, sql);
    }

    #[test]
    fn test_optional_pattern_is_left_joined_as_one_group() {
        let sql = translate(
            "MATCH (a:Person) OPTIONAL MATCH (a)-[r:WORKS_AT]->(c:Company) WHERE c.name = 'x' RETURN a.age, c.name",
        )
        .unwrap();
        assert!(
            sql.contains(
                "LEFT JOIN (\"employment\" AS \"r_35\" JOIN \"companies\" AS \"c_50\" \
                 ON (\"r_35\".\"dst_id\" = \"c_50\".\"id\")) ON "
            ),
            "{}",
            sql
        );
        assert_eq!(sql.matches("LEFT JOIN").count(), 1, "{}", sql);
        let group_on = &sql[sql.find(")) ON ").unwrap()..];
        assert!(group_on.contains("\"src_id\""), "{}", sql);
        assert!(group_on.contains("= 'x')"), "{}", sql);
        assert!(!sql.contains(" WHERE "), "{}", sql);
    }

    #[test]
    fn test_optional_properties_of_bound_node_keep_unmatched_rows() {
        let sql = translate(
            "MATCH (a:Person) OPTIONAL MATCH (a {name: 'Ann'})-[:WORKS_AT]->(c:Company) RETURN a.age, c.name",
        )
        .unwrap();
        let first_stage = &sql[..sql.find(", \"SUB_2\" AS (").unwrap()];
        assert!(!first_stage.contains("WHERE"), "{}", sql);
        let group_on = &sql[sql.find("LEFT JOIN").unwrap()..];
        assert!(group_on.contains("\"a_6.name\" = 'Ann')"), "{}", sql);
        assert!(!sql.contains(" WHERE "), "{}", sql);
    }

    #[test_case("MATCH (a:Person) RETURN b", LoweringError::UndefinedVariable("b".to_string()) ; "undefined variable")]
    #[test_case("MATCH (x:Robot) RETURN x", LoweringError::NoTableForLabels(vec!["Robot".to_string()]) ; "unknown label")]
    #[test_case("MATCH (a:Person)-[:WORKS_AT]-(b:City) RETURN a", LoweringError::NoEdgeFound(vec!["WORKS_AT".to_string()]) ; "no edge between the tables")]
    fn test_lowering_errors(query: &str, expected: LoweringError) {
        match translate(query) {
            Err(TranslationError::Lowering(err)) => assert_eq!(err, expected),
            other => panic!("{} gave {:?}", query, other),
        }
    }

    #[test]
    fn test_parse_errors_surface_as_lowering_errors() {
        assert!(matches!(
            translate("MATCH (a:Person RETURN a"),
            Err(TranslationError::Lowering(LoweringError::Parse(_)))
        ));
    }

    #[test]
    fn test_returning_a_path_is_a_render_error() {
        assert!(matches!(
            translate("MATCH p = (a:Person)-[:KNOWS]->(b:Person) RETURN p"),
            Err(TranslationError::Render(RenderError::InvalidExpression(_)))
        ));
    }

    #[test]
    fn test_every_stage_is_one_named_subquery() {
        let schema = social();
        let ast = parse_query("MATCH (a:Person) WITH a.name AS n WHERE n <> 'x' RETURN n").unwrap();
        let lowered = lower(&ast, &schema).unwrap();
        let BaseSelect::Scope(scope) = &lowered.tree else {
            panic!("expected a scope");
        };
        assert_eq!(scope.with_queries.len(), 3);

        let sql = translate("MATCH (a:Person) WITH a.name AS n WHERE n <> 'x' RETURN n").unwrap();
        assert!(sql.starts_with("WITH \"SUB_1\" AS ("));
        assert!(sql.contains(", \"SUB_2\" AS ("));
        assert!(sql.contains(", \"SUB_3\" AS ("));
        assert!(!sql.contains("SUB_4"));
    }

    #[test]
    fn test_translation_is_deterministic() {
        let query = "MATCH (a:Person)-[:KNOWS]->(b:Person) WITH b, count(a) AS n RETURN b.name, n";
        assert_eq!(translate(query).unwrap(), translate(query).unwrap());
    }

    #[test]
    fn test_unread_alias_is_not_exported() {
        let sql = translate("MATCH (a:Person) WITH a, a AS b RETURN a.name").unwrap();
        assert!(!sql.contains("\"b_"), "{}", sql);
    }

    #[test]
    fn test_prefix_comes_from_config() {
        let config = LoweringConfig {
            subquery_prefix: "stage_".to_string(),
            ..Default::default()
        };
        let sql = cypher_to_sql("MATCH (a:Person) RETURN a.name", &social(), &config).unwrap();
        assert!(sql.ends_with("FROM \"stage_1\""), "{}", sql);
    }
}
