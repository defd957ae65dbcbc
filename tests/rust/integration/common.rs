use std::io::Write;

use relgraph::graph_catalog::{load_mapping, SchemaMapping};
use tempfile::NamedTempFile;

/// One label per table, edges between persons, companies and cities.
pub const SOCIAL_YAML: &str = r#"
nodes:
  - labels: [Person]
    table: persons
    id_columns: [id]
    attribute_columns: { name: full_name, age: age }
  - labels: [Company]
    table: companies
    id_columns: [id]
    attribute_columns: { name: name }
  - labels: [City]
    table: cities
    id_columns: [id]
    attribute_columns: { name: city_name }
edges:
  - label: KNOWS
    paths:
      - hops:
          - source_table: persons
            source_columns: [id]
            join_table: knows
            join_table_source_columns: [src_id]
            join_table_destination_columns: [dst_id]
            destination_table: persons
            destination_columns: [id]
  - label: WORKS_AT
    paths:
      - hops:
          - source_table: persons
            source_columns: [id]
            join_table: employment
            join_table_source_columns: [src_id]
            join_table_destination_columns: [dst_id]
            destination_table: companies
            destination_columns: [id]
  - label: LIVES_IN
    paths:
      - hops:
          - source_table: persons
            source_columns: [id]
            join_table: residence
            join_table_source_columns: [src_id]
            join_table_destination_columns: [dst_id]
            destination_table: cities
            destination_columns: [id]
"#;

/// `Person` is stored in two tables, each with its own edge to companies.
pub const AMBIGUOUS_YAML: &str = r#"
nodes:
  - labels: [Person]
    table: employees
    id_columns: [id]
    attribute_columns: { name: name }
  - labels: [Person]
    table: customers
    id_columns: [id]
    attribute_columns: { name: name }
  - labels: [Company]
    table: companies
    id_columns: [id]
    attribute_columns: { name: name }
edges:
  - label: WORKS_AT
    paths:
      - hops:
          - source_table: employees
            source_columns: [id]
            join_table: employment
            join_table_source_columns: [src_id]
            join_table_destination_columns: [dst_id]
            destination_table: companies
            destination_columns: [id]
  - label: BUYS_FROM
    paths:
      - hops:
          - source_table: customers
            source_columns: [id]
            join_table: orders
            join_table_source_columns: [src_id]
            join_table_destination_columns: [dst_id]
            destination_table: companies
            destination_columns: [id]
"#;

/// Writes `yaml` to a temporary file and loads it as a mapping.
pub fn mapping_from_yaml(yaml: &str) -> SchemaMapping {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    load_mapping(file.path()).unwrap()
}

pub fn social() -> SchemaMapping {
    mapping_from_yaml(SOCIAL_YAML)
}

pub fn ambiguous() -> SchemaMapping {
    mapping_from_yaml(AMBIGUOUS_YAML)
}
