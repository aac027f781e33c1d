//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Combines defaults, environment (.env included) and CLI arguments
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Build and validate the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Like `parse` but without reading the process environment
    pub fn parse_without_env(&self) -> Result<Config> {
        let mut config = Config::default();
        self.apply_cli_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;
        let test = &mut config.test;

        if let Some(ref sizes) = cli.download_sizes {
            test.download_sizes = sizes.as_slice().to_vec();
        }
        if let Some(ref sizes) = cli.upload_sizes {
            test.upload_sizes = sizes.as_slice().to_vec();
        }
        if let Some(samples) = cli.samples {
            test.latency_samples = samples;
        }
        if let Some(connections) = cli.connections {
            test.concurrent_connections = connections;
        }
        if let Some(timeout) = cli.timeout {
            test.timeout_seconds = timeout;
        }
        if let Some(ref url) = cli.download_url {
            test.download_url = url.clone();
        }
        if let Some(ref url) = cli.upload_url {
            test.upload_url = url.clone();
        }
        if let Some(ref url) = cli.latency_url {
            test.latency_url = url.clone();
        }
        if let Some(mode) = cli.loaded_latency {
            test.loaded_latency_mode = mode;
        }

        if cli.no_color || cli.json {
            config.enable_color = false;
        } else if cli.color {
            config.enable_color = true;
        }

        // CLI-only flags
        config.verbose = cli.verbose;
        config.debug = cli.debug;
        config.json_output = cli.json;
        if cli.bytes {
            config.show_bytes = true;
        }

        if cli.network_type.is_some() {
            config.network_type = cli.network_type.clone();
        }
        if cli.isp.is_some() {
            config.isp_name = cli.isp.clone();
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for debug output
pub fn display_config_summary(config: &Config) -> String {
    let test = &config.test;
    let mut summary = Vec::new();

    summary.push(format!("Download URL: {}", test.download_url));
    summary.push(format!("Upload URL: {}", test.upload_url));
    summary.push(format!("Latency URL: {}", test.latency_url));
    summary.push(format!("Download sizes: {:?}", test.sorted_download_sizes()));
    summary.push(format!("Upload sizes: {:?}", test.sorted_upload_sizes()));
    summary.push(format!("Latency samples: {}", test.latency_samples));
    summary.push(format!("Connections: {}", test.concurrent_connections));
    summary.push(format!("Timeout: {}s", test.timeout_seconds));
    summary.push(format!("Loaded latency: {}", test.loaded_latency_mode));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
