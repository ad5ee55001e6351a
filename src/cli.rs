//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Settings that also live in the config file are
//! optional here so that only explicit flags override the file.

use crate::models::{AdapterKind, RankingProfile};
use crate::report::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// threadscope - scrape a discussion thread and rank its replies
///
/// Fetches every post of a thread, reconstructs the reply tree and writes
/// an analytical report (ranked replies, author leaderboard, lexical
/// frequency, engagement distribution).
///
/// Examples:
///   threadscope https://x.com/Dwriteway/status/1991025255859544564
///   threadscope 1991025255859544564 --source search,nitter --search-url http://localhost:8000/search
///   threadscope output/thread-1991025255859544564-20251120-101500.json --format json
///   threadscope output/ --concurrency 8
///   threadscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Thread URL, numeric status id, posts JSON file, or a directory of JSON files
    #[arg(value_name = "INPUT", required_unless_present = "init_config")]
    pub input: Option<String>,

    /// Directory for the posts JSON and the report
    ///
    /// Default: from config or ./output
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Source adapters to try, in order (comma-separated)
    ///
    /// Example: --source search,nitter
    #[arg(short, long, value_name = "SOURCES", value_delimiter = ',')]
    pub source: Option<Vec<SourceChoice>>,

    /// Nitter instance to scrape
    #[arg(long, value_name = "HOST")]
    pub nitter_instance: Option<String>,

    /// Conversation search endpoint returning JSON
    #[arg(long, value_name = "URL", env = "THREADSCOPE_SEARCH_URL")]
    pub search_url: Option<String>,

    /// Headless browser rendering service (Browserless-compatible)
    #[arg(long, value_name = "URL", env = "THREADSCOPE_BROWSER_URL")]
    pub browser_url: Option<String>,

    /// Token for the browser rendering service
    #[arg(long, value_name = "TOKEN", env = "THREADSCOPE_BROWSER_TOKEN", hide_env_values = true)]
    pub browser_token: Option<String>,

    /// Maximum number of posts to fetch
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Ranking preset (summary for live fetches, detailed for JSON input)
    #[arg(short, long, value_name = "PROFILE")]
    pub profile: Option<RankingProfile>,

    /// Weight k in the reply score likes + k * retweets
    #[arg(long, value_name = "K")]
    pub retweet_weight: Option<u64>,

    /// Output format (markdown, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of JSON files analyzed concurrently in batch mode
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .threadscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .threadscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Adapters selectable with `--source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceChoice {
    /// Nitter HTML scrape
    Nitter,
    /// JSON conversation search
    Search,
    /// Headless browser rendering
    Browser,
}

impl From<SourceChoice> for AdapterKind {
    fn from(choice: SourceChoice) -> Self {
        match choice {
            SourceChoice::Nitter => AdapterKind::Nitter,
            SourceChoice::Search => AdapterKind::Search,
            SourceChoice::Browser => AdapterKind::Browser,
        }
    }
}

impl Args {
    /// Parse command-line arguments. Usage errors exit with code 1.
    pub fn parse_args() -> Self {
        match Self::try_parse() {
            Ok(args) => args,
            Err(e) => {
                let code = if e.use_stderr() { 1 } else { 0 };
                // Nothing useful to do if printing the usage fails.
                let _ = e.print();
                std::process::exit(code);
            }
        }
    }

    /// The positional input, empty if absent (validated first).
    pub fn input(&self) -> &str {
        self.input.as_deref().unwrap_or("").trim()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input().is_empty() {
            return Err("An input (thread URL, status id, JSON file or directory) is required".to_string());
        }

        // Validate service URL formats
        for (name, url) in [
            ("Search URL", &self.search_url),
            ("Browser URL", &self.browser_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", name));
                }
            }
        }

        if let Some(ref instance) = self.nitter_instance {
            if instance.trim().is_empty() {
                return Err("Nitter instance cannot be empty".to_string());
            }
        }

        if let Some(ref sources) = self.source {
            if sources.is_empty() {
                return Err("At least one source is required".to_string());
            }
        }

        // Validate concurrency
        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings. `config_verbose`
    /// is `[general] verbose` from the config file; `--quiet` beats it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_args() -> Args {
        Args {
            input: Some("https://x.com/user/status/123".to_string()),
            output_dir: None,
            source: None,
            nitter_instance: None,
            search_url: None,
            browser_url: None,
            browser_token: None,
            limit: None,
            profile: None,
            retweet_weight: None,
            format: None,
            timeout: None,
            concurrency: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "threadscope",
            "123",
            "--source",
            "search,nitter",
            "--profile",
            "detailed",
            "--format",
            "json",
            "-n",
            "50",
        ])
        .unwrap();
        assert_eq!(args.input(), "123");
        assert_eq!(
            args.source,
            Some(vec![SourceChoice::Search, SourceChoice::Nitter])
        );
        assert_eq!(args.profile, Some(RankingProfile::Detailed));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.limit, Some(50));
    }

    #[test]
    fn test_input_required_unless_init_config() {
        assert!(Args::try_parse_from(["threadscope"]).is_err());
        assert!(Args::try_parse_from(["threadscope", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_invalid_service_url() {
        let mut args = make_args();
        args.search_url = Some("localhost:8000".to_string());
        assert!(args.validate().is_err());

        args.search_url = None;
        args.browser_url = Some("ws://browser".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.limit = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_from_config() {
        let mut args = make_args();
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        config.sources.limit = 200;
        config.sources.search_url = Some("http://file-config".to_string());

        let mut args = make_args();
        args.source = Some(vec![SourceChoice::Browser, SourceChoice::Nitter]);
        args.retweet_weight = Some(3);
        args.output_dir = Some(PathBuf::from("reports"));
        config.merge_with_args(&args);

        assert_eq!(
            config.sources.order,
            vec![AdapterKind::Browser, AdapterKind::Nitter]
        );
        assert_eq!(config.sources.limit, 200);
        assert_eq!(
            config.sources.search_url.as_deref(),
            Some("http://file-config")
        );
        assert_eq!(config.ranking.retweet_weight, Some(3));
        assert_eq!(config.general.output_dir, "reports");
    }
}
