//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.threadscope.toml` files, and resolving the per-run settings every
//! pipeline stage receives.

use crate::models::{AdapterKind, RankingProfile};
use crate::report::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".threadscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Source adapter settings.
    #[serde(default)]
    pub sources: SourceConfig,

    /// Ranking overrides.
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory receiving posts JSON and reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of archives analyzed concurrently in batch mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Source adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Adapters to try, in order, until one yields posts.
    #[serde(default = "default_order")]
    pub order: Vec<AdapterKind>,

    /// Nitter host, with or without scheme.
    #[serde(default = "default_nitter_instance")]
    pub nitter_instance: String,

    /// Conversation search endpoint.
    #[serde(default)]
    pub search_url: Option<String>,

    /// Browserless-compatible rendering service.
    #[serde(default)]
    pub browser_url: Option<String>,

    #[serde(default)]
    pub browser_token: Option<String>,

    /// Maximum records kept per fetch.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Base backoff delay, doubled after each failed attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra wait after network idle before the page is captured.
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,

    /// Scrolls to the page bottom so lazily loaded replies render.
    #[serde(default = "default_scroll_count")]
    pub scroll_count: usize,

    #[serde(default = "default_scroll_wait_ms")]
    pub scroll_wait_ms: u64,

    /// Where a rendered page is saved when no posts could be scraped from
    /// it. Set from the output directory, never read from the file.
    #[serde(skip)]
    pub raw_html_dir: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            nitter_instance: default_nitter_instance(),
            search_url: None,
            browser_url: None,
            browser_token: None,
            limit: default_limit(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
            render_wait_ms: default_render_wait_ms(),
            scroll_count: default_scroll_count(),
            scroll_wait_ms: default_scroll_wait_ms(),
            raw_html_dir: None,
        }
    }
}

fn default_order() -> Vec<AdapterKind> {
    vec![AdapterKind::Nitter]
}

fn default_nitter_instance() -> String {
    "nitter.poast.org".to_string()
}

fn default_limit() -> usize {
    500
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_render_wait_ms() -> u64 {
    3000
}

fn default_scroll_count() -> usize {
    5
}

fn default_scroll_wait_ms() -> u64 {
    2000
}

/// Ranking overrides. Unset fields fall back to the active profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<RankingProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweet_weight: Option<u64>,

    /// Size of the flat ranked-replies list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,

    /// Character budget for ranked-list excerpts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt_chars: Option<usize>,
}

/// Ranking parameters after profile and overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    pub profile: RankingProfile,
    pub retweet_weight: u64,
    pub render: RenderOptions,
}

impl RankingConfig {
    /// Resolve against `fallback`, the profile the input kind implies.
    pub fn resolve(&self, fallback: RankingProfile) -> Ranking {
        let profile = self.profile.unwrap_or(fallback);
        Ranking {
            profile,
            retweet_weight: self
                .retweet_weight
                .unwrap_or_else(|| profile.retweet_weight()),
            render: RenderOptions {
                top_n: self.top_n.unwrap_or_else(|| profile.top_n()),
                excerpt_chars: self
                    .excerpt_chars
                    .unwrap_or_else(|| profile.excerpt_budget()),
            },
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Settings for one invocation, handed to every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub concurrency: usize,
    pub sources: SourceConfig,
    pub ranking: RankingConfig,
}

impl From<Config> for RunConfig {
    fn from(config: Config) -> Self {
        let output_dir = PathBuf::from(config.general.output_dir);
        let mut sources = config.sources;
        sources.raw_html_dir = Some(output_dir.clone());

        Self {
            output_dir,
            format: config.report.format,
            concurrency: config.general.concurrency.max(1),
            sources,
            ranking: config.ranking,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        // Sources
        if let Some(ref sources) = args.source {
            self.sources.order = sources.iter().map(|s| AdapterKind::from(*s)).collect();
        }
        if let Some(ref instance) = args.nitter_instance {
            self.sources.nitter_instance = instance.clone();
        }
        if args.search_url.is_some() {
            self.sources.search_url = args.search_url.clone();
        }
        if args.browser_url.is_some() {
            self.sources.browser_url = args.browser_url.clone();
        }
        if args.browser_token.is_some() {
            self.sources.browser_token = args.browser_token.clone();
        }
        if let Some(limit) = args.limit {
            self.sources.limit = limit;
        }
        if let Some(timeout) = args.timeout {
            self.sources.timeout_seconds = timeout;
        }

        // Ranking
        if args.profile.is_some() {
            self.ranking.profile = args.profile;
        }
        if args.retweet_weight.is_some() {
            self.ranking.retweet_weight = args.retweet_weight;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output_dir, "output");
        assert_eq!(config.sources.order, vec![AdapterKind::Nitter]);
        assert_eq!(config.sources.nitter_instance, "nitter.poast.org");
        assert_eq!(config.sources.limit, 500);
        assert_eq!(config.report.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "reports"
verbose = true

[sources]
order = ["search", "nitter"]
search_url = "http://localhost:8000/search"
limit = 100

[ranking]
profile = "detailed"
top_n = 5

[report]
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, "reports");
        assert!(config.general.verbose);
        assert_eq!(
            config.sources.order,
            vec![AdapterKind::Search, AdapterKind::Nitter]
        );
        assert_eq!(
            config.sources.search_url.as_deref(),
            Some("http://localhost:8000/search")
        );
        assert_eq!(config.sources.limit, 100);
        assert_eq!(config.sources.retries, 2);
        assert_eq!(config.sources.scroll_count, 5);
        assert_eq!(config.ranking.profile, Some(RankingProfile::Detailed));
        assert_eq!(config.report.format, OutputFormat::Json);
    }

    #[test]
    fn test_ranking_resolution() {
        let ranking = RankingConfig::default().resolve(RankingProfile::Summary);
        assert_eq!(ranking.retweet_weight, 1);
        assert_eq!(ranking.render.top_n, 30);
        assert_eq!(ranking.render.excerpt_chars, 400);

        let overrides = RankingConfig {
            profile: None,
            retweet_weight: Some(5),
            top_n: Some(3),
            excerpt_chars: None,
        };
        let ranking = overrides.resolve(RankingProfile::Detailed);
        assert_eq!(ranking.profile, RankingProfile::Detailed);
        assert_eq!(ranking.retweet_weight, 5);
        assert_eq!(ranking.render.top_n, 3);
        assert_eq!(ranking.render.excerpt_chars, 500);

        let pinned = RankingConfig {
            profile: Some(RankingProfile::Summary),
            ..Default::default()
        };
        assert_eq!(pinned.resolve(RankingProfile::Detailed).retweet_weight, 1);
    }

    #[test]
    fn test_run_config_from_config() {
        let mut config = Config::default();
        config.general.concurrency = 0;
        let run = RunConfig::from(config);
        assert_eq!(run.output_dir, PathBuf::from("output"));
        assert_eq!(run.concurrency, 1);
        assert_eq!(run.sources.raw_html_dir, Some(PathBuf::from("output")));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[sources]"));
        assert!(toml_str.contains("nitter_instance"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sources.limit, 500);
    }
}
