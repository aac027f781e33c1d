//! Additional tests for configuration parsing and validation

use super::{ConfigParser, EnvManager};
use crate::{
    cli::Cli,
    models::{config::parse_size_list, Config, TestConfiguration},
};
use clap::Parser;

/// Test edge cases in configuration validation
mod config_edge_cases {
    use super::*;

    #[test]
    fn test_limits_are_inclusive() {
        let mut config = Config::default();
        config.test.latency_samples = 100;
        config.test.concurrent_connections = 32;
        config.test.timeout_seconds = 300;
        config.test.download_sizes = vec![crate::models::config::MAX_PAYLOAD_BYTES];
        assert!(config.validate().is_ok());

        config.test.latency_samples = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_size_lists_are_allowed() {
        let config = TestConfiguration {
            download_sizes: vec![],
            upload_sizes: vec![],
            ..TestConfiguration::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let config = TestConfiguration {
            upload_sizes: vec![crate::models::config::MAX_PAYLOAD_BYTES + 1],
            ..TestConfiguration::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_endpoint_with_query_and_port() {
        let config = TestConfiguration {
            download_url: "https://speed.example.com:8443/down?region=eu".to_string(),
            ..TestConfiguration::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configuration_round_trips_through_json() {
        let json = r#"{"download_sizes":[1000],"loaded_latency_mode":"measured"}"#;
        let config: TestConfiguration = serde_json::from_str(json).unwrap();

        assert_eq!(config.download_sizes, vec![1000]);
        assert_eq!(config.upload_sizes, TestConfiguration::default().upload_sizes);
        assert_eq!(config.loaded_latency_mode, crate::types::LoadedLatencyMode::Measured);
        assert!(config.validate().is_ok());
    }
}

/// Test environment variable parsing edge cases
mod env_parsing_tests {
    use super::*;

    #[test]
    fn test_size_list_whitespace_and_trailing_commas() {
        assert_eq!(parse_size_list("sizes", " 100 , 200,,300, ").unwrap(), vec![100, 200, 300]);
        assert!(parse_size_list("sizes", "").unwrap().is_empty());
        assert!(parse_size_list("sizes", "1e6").is_err());
    }

    #[test]
    fn test_url_with_special_characters() {
        let url = "https://speed.example.com/v1/down?token=a%20b&x=1";
        assert!(EnvManager::validate_env_var("SPEEDTEST_DOWNLOAD_URL", url).is_ok());
    }

    #[test]
    fn test_loaded_latency_is_case_insensitive() {
        assert!(EnvManager::validate_env_var("SPEEDTEST_LOADED_LATENCY", "MEASURED").is_ok());
        assert!(EnvManager::validate_env_var("SPEEDTEST_LOADED_LATENCY", " Estimated ").is_ok());
    }
}

/// Precedence between configuration sources
mod precedence_tests {
    use super::*;

    #[test]
    fn test_cli_wins_over_preloaded_values() {
        let mut config = Config::default();
        config.test.concurrent_connections = 6;
        config.test.download_sizes = vec![1, 2, 3];

        let cli = Cli::parse_from(["nst", "--connections", "2"]);
        ConfigParser::new(cli).apply_cli_overrides(&mut config);

        assert_eq!(config.test.concurrent_connections, 2);
        assert_eq!(config.test.download_sizes, vec![1, 2, 3]);
    }

    #[test]
    fn test_json_disables_color() {
        let cli = Cli::parse_from(["nst", "--json"]);
        let config = ConfigParser::new(cli).parse_without_env().unwrap();
        assert!(config.json_output);
        assert!(!config.enable_color);
    }
}

/// Property-based tests for size list parsing
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_size_lists_round_trip(sizes in prop::collection::vec(1u64..=1_000_000_000, 0..8)) {
            let text = sizes.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
            prop_assert_eq!(parse_size_list("sizes", &text).unwrap(), sizes);
        }

        #[test]
        fn prop_sorted_sizes_are_ascending(sizes in prop::collection::vec(1u64..=1_000_000, 0..12)) {
            let config = TestConfiguration { download_sizes: sizes.clone(), ..TestConfiguration::default() };
            let sorted = config.sorted_download_sizes();
            prop_assert!(sorted.windows(2).all(|pair| pair[0] <= pair[1]));
            prop_assert_eq!(sorted.len(), sizes.len());
            // The configured order is left untouched
            prop_assert_eq!(&config.download_sizes, &sizes);
        }
    }
}
