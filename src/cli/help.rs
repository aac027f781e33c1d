//! Topic help for the `nst` command line
//!
//! clap generates `--help`; this module adds the longer reference pages
//! reachable through `--help-topic`.

use crate::config::env::EnvManager;
use crate::defaults;
use colored::*;

/// Help pages for the CLI application
pub struct HelpSystem {
    platform: String,
}

impl HelpSystem {
    /// Topics accepted by `--help-topic`
    pub const TOPICS: &'static [&'static str] = &["config", "env", "aim", "output", "examples"];

    pub fn new() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
        }
    }

    /// Header, usage, options and examples
    pub fn display_main_help(&self, use_colors: bool) -> String {
        let mut help = String::new();

        help.push_str(&self.format_header(use_colors));
        help.push('\n');
        help.push_str(&self.format_usage_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_options_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_examples_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_footer(use_colors));

        help
    }

    /// Help for a single topic, `None` for unknown topics
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.to_lowercase().as_str() {
            "config" | "configuration" => Some(self.format_configuration_help(use_colors)),
            "env" | "environment" => Some(self.format_environment_help(use_colors)),
            "aim" | "scores" => Some(self.format_aim_help(use_colors)),
            "output" | "formatting" => Some(self.format_output_help(use_colors)),
            "examples" => Some(self.format_examples_section(use_colors)),
            _ => None,
        }
    }

    fn format_header(&self, use_colors: bool) -> String {
        let title = "Network Speed Tester";
        let subtitle = "HTTP latency, throughput and responsiveness measurement";
        let version = env!("CARGO_PKG_VERSION");

        if use_colors {
            format!(
                "{}\n{}\nVersion: {} | Platform: {}\n",
                title.bright_cyan().bold(),
                subtitle.bright_blue(),
                version.green(),
                self.platform.yellow()
            )
        } else {
            format!("{}\n{}\nVersion: {} | Platform: {}\n", title, subtitle, version, self.platform)
        }
    }

    fn format_usage_section(&self, use_colors: bool) -> String {
        let mut usage = format!("{}\n", section("USAGE:", use_colors));
        for pattern in ["nst [OPTIONS]", "nst --json [OPTIONS]", "nst --help-topic <TOPIC>"] {
            if use_colors {
                usage.push_str(&format!("  {}\n", pattern.bright_white()));
            } else {
                usage.push_str(&format!("  {}\n", pattern));
            }
        }
        usage
    }

    fn format_options_section(&self, use_colors: bool) -> String {
        let options = [
            OptionHelp {
                short: None,
                long: "download-sizes",
                value: "<BYTES>",
                description: "Download payload sizes, tested smallest first",
                example: Some("--download-sizes 100000,1000000,10000000"),
            },
            OptionHelp {
                short: None,
                long: "upload-sizes",
                value: "<BYTES>",
                description: "Upload payload sizes, tested smallest first",
                example: Some("--upload-sizes 100000,1000000"),
            },
            OptionHelp {
                short: Some("s"),
                long: "samples",
                value: "<N>",
                description: "Latency probes per latency stage (1-100)",
                example: None,
            },
            OptionHelp {
                short: Some("c"),
                long: "connections",
                value: "<N>",
                description: "Parallel connections per payload size (1-32)",
                example: None,
            },
            OptionHelp {
                short: Some("t"),
                long: "timeout",
                value: "<SECONDS>",
                description: "Request timeout in seconds (1-300)",
                example: None,
            },
            OptionHelp {
                short: None,
                long: "loaded-latency",
                value: "<MODE>",
                description: "estimated (default) or measured under load",
                example: Some("--loaded-latency measured"),
            },
            OptionHelp {
                short: None,
                long: "json",
                value: "",
                description: "Print the final result as JSON on stdout",
                example: None,
            },
            OptionHelp {
                short: None,
                long: "bytes",
                value: "",
                description: "Show speeds in MB/s instead of Mbps",
                example: None,
            },
            OptionHelp {
                short: None,
                long: "verbose",
                value: "",
                description: "Show per-size breakdowns and info logs",
                example: None,
            },
            OptionHelp {
                short: None,
                long: "debug",
                value: "",
                description: "Structured debug logs on stderr",
                example: None,
            },
        ];

        let mut output = format!("{}\n", section("OPTIONS:", use_colors));
        for option in options {
            output.push_str(&option.format(use_colors));
            output.push('\n');
        }
        output
    }

    fn format_examples_section(&self, use_colors: bool) -> String {
        let examples = [
            ExampleHelp {
                title: "Default test",
                command: "nst",
                description: "Full test against the default endpoints",
            },
            ExampleHelp {
                title: "Quick test",
                command: "nst --download-sizes 100000,1000000 --upload-sizes 100000 --samples 5",
                description: "Small payloads and fewer probes for slow or metered links",
            },
            ExampleHelp {
                title: "Measured loaded latency",
                command: "nst --loaded-latency measured --connections 6",
                description: "Probe latency under real download and upload load",
            },
            ExampleHelp {
                title: "Scripting",
                command: "nst --json --network-type wifi --isp \"Example Net\" > result.json",
                description: "Machine-readable record with network context",
            },
        ];

        let mut output = format!("{}\n", section("EXAMPLES:", use_colors));
        for example in examples {
            output.push_str(&example.format(use_colors));
            output.push('\n');
        }
        output
    }

    fn format_footer(&self, use_colors: bool) -> String {
        let mut footer = format!("{}\n", section("ADDITIONAL HELP:", use_colors));
        for topic in Self::TOPICS {
            let command = format!("--help-topic {}", topic);
            if use_colors {
                footer.push_str(&format!("  {}\n", command.bright_yellow()));
            } else {
                footer.push_str(&format!("  {}\n", command));
            }
        }
        footer
    }

    fn format_configuration_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", section("CONFIGURATION REFERENCE:", use_colors));

        help.push_str("CONFIGURATION PRIORITY (highest to lowest):\n");
        help.push_str("1. Command-line arguments\n");
        help.push_str("2. Environment variables and .env file\n");
        help.push_str("3. Default values\n\n");

        help.push_str("PARAMETER LIMITS:\n");
        help.push_str("- Payload sizes: 1 byte to 1 GB each; empty list skips that direction\n");
        help.push_str("- Latency samples: 1-100\n");
        help.push_str("- Connections: 1-32\n");
        help.push_str("- Timeout: 1-300 seconds per request\n");
        help.push_str("- Endpoints: http or https URLs\n\n");

        help.push_str("DEFAULTS:\n");
        help.push_str(&format!("- Download: {}\n", defaults::DEFAULT_DOWNLOAD_URL));
        help.push_str(&format!("- Upload: {}\n", defaults::DEFAULT_UPLOAD_URL));
        help.push_str(&format!("- Latency samples: {}\n", defaults::DEFAULT_LATENCY_SAMPLES));
        help.push_str(&format!("- Connections: {}\n", defaults::DEFAULT_CONCURRENT_CONNECTIONS));
        help.push_str(&format!("- Timeout: {}s\n", defaults::DEFAULT_TIMEOUT_SECONDS));

        help
    }

    fn format_environment_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", section("ENVIRONMENT VARIABLES REFERENCE:", use_colors));

        help.push_str("LOADING ORDER:\n");
        help.push_str("1. System environment variables\n");
        help.push_str("2. .env file in current directory (if present)\n");
        help.push_str("3. Command-line arguments (override both)\n\n");

        help.push_str(&EnvManager::display_env_help());
        help.push_str("\nEXAMPLE .env FILE:\n");
        help.push_str(&EnvManager::create_example_env_content());

        help
    }

    fn format_aim_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", section("AIM SCORES:", use_colors));

        help.push_str("Each use case is rated Excellent, Good, Fair, Poor or Very Poor.\n");
        help.push_str("Rows are checked top-down; the first row that matches wins.\n\n");

        help.push_str("STREAMING (download Mbps, latency ms):\n");
        help.push_str("  Excellent >=25 & <=50 | Good >=15 & <=100 | Fair >=5 & <=150 | Poor >=2\n\n");

        help.push_str("GAMING (latency ms, jitter ms, download Mbps):\n");
        help.push_str("  Excellent <=20 & <=5 & >=3 | Good <=50 & <=10 & >=1 | Fair <=100 & <=20 & >=0.5 | Poor <=150\n\n");

        help.push_str("VIDEO CALLS (upload Mbps, latency ms, jitter ms, download Mbps):\n");
        help.push_str("  Excellent >=2 & <=50 & <=10 & >=1 | Good >=1 & <=100 & <=20 & >=0.5\n");
        help.push_str("  Fair >=0.5 & <=150 & <=30 | Poor >=0.1\n\n");

        help.push_str("Scores use the unloaded latency and jitter.\n");
        help
    }

    fn format_output_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", section("OUTPUT REFERENCE:", use_colors));

        help.push_str("SPEEDS:\n");
        help.push_str("  Shown in Mbps (bits), or MB/s with --bytes. Measured in bytes per second.\n");
        help.push_str("  A stage reports the best per-size average across payload sizes.\n\n");

        help.push_str("LATENCY:\n");
        help.push_str("  Mean round-trip time of HEAD probes. Jitter is the standard deviation.\n");
        help.push_str("  Packet loss is the share of probes that failed or timed out.\n\n");

        help.push_str("LOADED LATENCY:\n");
        help.push_str("  estimated: upload figures are the download figures + 5 ms / + 1 ms\n");
        help.push_str("             and are marked as estimated in the report.\n");
        help.push_str("  measured:  probed under a background download, then upload, load.\n\n");

        help.push_str("EXIT CODES:\n");
        help.push_str("  0 success, 1 configuration, 2 network, 3 timeout, 130 cancelled\n");
        help
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn section(title: &str, use_colors: bool) -> String {
    if use_colors {
        title.bright_green().bold().to_string()
    } else {
        title.to_string()
    }
}

/// Helper struct for formatting individual options
struct OptionHelp {
    short: Option<&'static str>,
    long: &'static str,
    value: &'static str,
    description: &'static str,
    example: Option<&'static str>,
}

impl OptionHelp {
    fn format(&self, use_colors: bool) -> String {
        let mut option_str = String::new();

        if let Some(short) = self.short {
            if use_colors {
                option_str.push_str(&format!("  {}, ", format!("-{}", short).bright_cyan()));
            } else {
                option_str.push_str(&format!("  -{}, ", short));
            }
        } else {
            option_str.push_str("      ");
        }

        let long_with_value = if self.value.is_empty() {
            format!("--{}", self.long)
        } else {
            format!("--{} {}", self.long, self.value)
        };

        if use_colors {
            option_str.push_str(&format!("{:<30} {}", long_with_value.bright_cyan(), self.description.white()));
        } else {
            option_str.push_str(&format!("{:<30} {}", long_with_value, self.description));
        }

        if let Some(example) = self.example {
            if use_colors {
                option_str.push_str(&format!(
                    "\n{}{}",
                    " ".repeat(36),
                    format!("Example: {}", example).bright_blue().italic()
                ));
            } else {
                option_str.push_str(&format!("\n{}Example: {}", " ".repeat(36), example));
            }
        }

        option_str
    }
}

/// Helper struct for formatting examples
struct ExampleHelp {
    title: &'static str,
    command: &'static str,
    description: &'static str,
}

impl ExampleHelp {
    fn format(&self, use_colors: bool) -> String {
        if use_colors {
            format!(
                "  {}:\n    {}\n    {}\n",
                self.title.bright_yellow().bold(),
                self.command.bright_white(),
                self.description.bright_blue().italic()
            )
        } else {
            format!("  {}:\n    {}\n    {}\n", self.title, self.command, self.description)
        }
    }
}
