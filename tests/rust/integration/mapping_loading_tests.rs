//! Mapping files as the CLI loads them

#[cfg(test)]
mod mapping_loading_tests {
    use std::io::Write;

    use relgraph::config::LoweringConfig;
    use relgraph::cypher_to_sql;
    use relgraph::graph_catalog::{load_mapping, GraphSchemaError};
    use tempfile::NamedTempFile;

    use crate::common::{mapping_from_yaml, social, SOCIAL_YAML};

    #[test]
    fn test_social_mapping_loads() {
        let mapping = social();
        assert_eq!(mapping.nodes().len(), 3);
        assert_eq!(mapping.edges().len(), 3);
        assert_eq!(
            mapping.node_by_table("persons").and_then(|n| n.attribute_column("name")),
            Some("full_name")
        );
        assert_eq!(mapping.tables_for_labels(&["Person".to_string()]).len(), 1);
        assert_eq!(mapping.tables_for_labels(&[]).len(), 3);
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_mapping(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, GraphSchemaError::ConfigReadError { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "nodes: [ {{ labels: Person").unwrap();
        let err = load_mapping(file.path()).unwrap_err();
        assert!(matches!(err, GraphSchemaError::ConfigParseError { .. }));
    }

    #[test]
    fn test_mismatched_hop_columns_are_rejected() {
        let yaml = SOCIAL_YAML.replacen("join_table_source_columns: [src_id]", "join_table_source_columns: [src_id, kind]", 1);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let err = load_mapping(file.path()).unwrap_err();
        assert!(matches!(err, GraphSchemaError::InvalidConfig { .. }));
    }

    #[test]
    fn test_row_restrictions_filter_the_node_table() {
        let yaml = SOCIAL_YAML.replacen(
            "attribute_columns: { name: full_name, age: age }",
            "attribute_columns: { name: full_name, age: age }\n    row_restrictions: [{ column: kind, value: person }]",
            1,
        );
        let schema = mapping_from_yaml(&yaml);
        let sql = cypher_to_sql("MATCH (a:Person) RETURN a.name", &schema, &LoweringConfig::default())
            .unwrap();
        assert!(sql.contains("(\"a_6\".\"kind\" = 'person')"), "{}", sql);
    }
}
