//! Labels stored in more than one table fork the query into unions

#[cfg(test)]
mod union_tests {
    use relgraph::config::LoweringConfig;
    use relgraph::open_cypher_parser::parse_query;
    use relgraph::query_planner::errors::LoweringError;
    use relgraph::query_planner::select_tree::BaseSelect;
    use relgraph::query_planner::{lower, lower_with_config};
    use relgraph::sql_generator::generate_sql;
    use relgraph::{cypher_to_sql, TranslationError};
    use test_case::test_case;

    use crate::common::ambiguous;

    fn translate(query: &str) -> Result<String, TranslationError> {
        cypher_to_sql(query, &ambiguous(), &LoweringConfig::default())
    }

    #[test_case("MATCH (p:Person) RETURN p.name", 2 ; "one ambiguous node")]
    #[test_case("MATCH (p:Person) MATCH (q:Person) RETURN p.name, q.name", 4 ; "two ambiguous nodes")]
    #[test_case("MATCH (p:Person)-[:WORKS_AT]->(c:Company) RETURN p.name", 1 ; "relationship narrows the candidates")]
    fn test_branch_count(query: &str, branches: usize) {
        let sql = translate(query).unwrap();
        assert_eq!(sql.matches(" UNION ALL ").count(), branches - 1, "{}", sql);
    }

    #[test]
    fn test_union_is_one_stage_of_the_outer_scope() {
        let schema = ambiguous();
        let ast = parse_query("MATCH (p:Person) RETURN p.name").unwrap();
        let lowered = lower(&ast, &schema).unwrap();
        let BaseSelect::Scope(scope) = &lowered.tree else {
            panic!("expected a scope");
        };
        assert_eq!(scope.with_queries.len(), 1);
        let BaseSelect::Union(union) = scope.with_queries[0].subquery.as_ref() else {
            panic!("expected a union stage");
        };
        assert_eq!(union.unions.len(), 2);
    }

    #[test]
    fn test_narrowed_query_reads_only_matching_table() {
        let sql = translate("MATCH (p:Person)-[:BUYS_FROM]->(c:Company) RETURN p.name").unwrap();
        assert!(sql.contains("FROM \"customers\""), "{}", sql);
        assert!(!sql.contains("employees"), "{}", sql);
    }

    #[test]
    fn test_branches_align_their_columns() {
        let sql = translate("MATCH (p:Person) RETURN p.name").unwrap();
        assert!(sql.contains("FROM \"employees\" AS \"p_6\""), "{}", sql);
        assert!(sql.contains("FROM \"customers\" AS \"p_6\""), "{}", sql);
        assert!(sql.ends_with("SELECT \"SUB_1\".\"_0\" AS \"p.name\" FROM \"SUB_1\""), "{}", sql);
    }

    #[test]
    fn test_count_is_summed_over_branches() {
        let sql = translate("MATCH (p:Person) WITH count(p) AS c RETURN c").unwrap();
        assert!(sql.ends_with("SELECT sum(\"SUB_1\".\"c_22\") AS \"c\" FROM \"SUB_1\""), "{}", sql);
    }

    #[test_case("avg" ; "average")]
    #[test_case("collect" ; "collect")]
    fn test_unrecombinable_aggregates_are_rejected(function: &str) {
        let query = format!("MATCH (p:Person) WITH {}(p.name) AS v RETURN v", function);
        assert!(matches!(
            translate(&query),
            Err(TranslationError::Lowering(LoweringError::InvalidExpression(_)))
        ));
    }

    #[test]
    fn test_paging_applies_to_the_union() {
        let sql = translate("MATCH (p:Person) RETURN DISTINCT p.name ORDER BY p.name LIMIT 3").unwrap();
        assert!(sql.contains("SELECT DISTINCT \"SUB_1\""), "{}", sql);
        assert!(sql.ends_with(" LIMIT 3"), "{}", sql);
        assert_eq!(sql.matches("LIMIT").count(), 1, "{}", sql);
    }

    #[test]
    fn test_combination_limit() {
        let schema = ambiguous();
        let ast = parse_query("MATCH (p:Person) MATCH (q:Person) RETURN p, q").unwrap();
        let config = LoweringConfig {
            max_union_combinations: 3,
            ..Default::default()
        };
        assert_eq!(
            lower_with_config(&ast, &schema, &config).unwrap_err(),
            LoweringError::TooManyUnionCombinations { count: 4, limit: 3 }
        );
    }

    #[test]
    fn test_names_restart_for_every_rendering() {
        let schema = ambiguous();
        let ast = parse_query("MATCH (p:Person) RETURN p.name").unwrap();
        let lowered = lower(&ast, &schema).unwrap();
        let config = LoweringConfig::default();
        let first = generate_sql(&lowered, &config).unwrap();
        let second = generate_sql(&lowered, &config).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("\"SUB_3\""));
        assert!(!first.contains("\"SUB_4\""));
    }
}
