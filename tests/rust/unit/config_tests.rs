//! Translator configuration loading

#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use relgraph::config::{ConfigError, LoweringConfig};
    use serial_test::serial;
    use tempfile::NamedTempFile;
    use validator::Validate;

    #[test]
    fn test_defaults_validate() {
        let config = LoweringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.subquery_prefix, "SUB_");
    }

    #[test]
    #[serial]
    fn test_env_values_are_read() {
        std::env::set_var("RELGRAPH_MAX_UNION_COMBINATIONS", "12");
        std::env::set_var("RELGRAPH_UNION_ALL", "false");
        let config = LoweringConfig::from_env();
        std::env::remove_var("RELGRAPH_MAX_UNION_COMBINATIONS");
        std::env::remove_var("RELGRAPH_UNION_ALL");

        let config = config.unwrap();
        assert_eq!(config.max_union_combinations, 12);
        assert!(!config.union_all);
    }

    #[test]
    fn test_yaml_with_bad_value_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "subquery_prefix: \"\"").unwrap();
        assert!(matches!(
            LoweringConfig::from_yaml_file(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = LoweringConfig {
            max_union_combinations: 9,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: LoweringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
