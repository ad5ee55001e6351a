//! threadscope - social-media thread scraper and analyzer
//!
//! Fetches every post of a discussion thread through a pluggable source
//! adapter (or reads a previously saved JSON file), rebuilds the reply
//! tree and writes a ranked analytical report.
//!
//! Exit codes:
//!   0 - A report was produced (possibly for an empty thread)
//!   1 - The input could not be resolved (invalid reference, unreadable
//!       file, no usable adapter, invalid arguments)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod normalize;
mod report;
mod sources;

use analysis::{analyze_records, ThreadAnalysis};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use cli::Args;
use config::{Config, Ranking, RunConfig, CONFIG_FILE};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use models::{RankingProfile, RawRecord, ReportMetadata};
use report::OutputFormat;
use error::ThreadError;
use sources::{build_adapter, SourceAdapter, ThreadRef};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("threadscope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    if let Err(e) = run(&args, RunConfig::from(config)).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .threadscope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize sources, ranking, and output.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` wins when set.
fn init_logging(args: &Args, config_verbose: bool) {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let installed = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()),
        Err(_) => tracing::subscriber::set_global_default(
            builder.with_max_level(args.log_level(config_verbose)).finish(),
        ),
    };

    installed.expect("Failed to set tracing subscriber");
}

/// Dispatch on the input: directory, JSON file, or thread reference.
async fn run(args: &Args, run: RunConfig) -> Result<()> {
    let start_time = Instant::now();

    let input = args.input();
    let path = Path::new(input);

    if path.is_dir() {
        run_batch(path, &run).await?;
    } else if path.is_file() || sources::is_json_file(path) {
        run_archive(path, &run)?;
    } else {
        run_live(input, &run, args.quiet).await?;
    }

    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Fetch a thread through the configured adapters and report on it.
async fn run_live(input: &str, run: &RunConfig, quiet: bool) -> Result<()> {
    let thread_ref = ThreadRef::parse(input)?;
    println!("🔗 Thread {}", thread_ref.id);

    let (source, records) = fetch_thread(&thread_ref, run, quiet).await?;
    let ranking = run.ranking.resolve(RankingProfile::Summary);
    println!(
        "⚖️  Ranking: {:?} profile, likes + {} × retweets",
        ranking.profile, ranking.retweet_weight
    );

    println!("\n🧮 Reconstructing thread...");
    let analysis = analyze_records(&records, ranking.retweet_weight);
    let generated_at = Utc::now();

    let posts_json = report::generate_posts_json(&analysis.thread.posts)?;
    let posts_path = report::write_new_output(
        &run.output_dir,
        &report::posts_file_name(&thread_ref.id, &generated_at),
        &posts_json,
    )?;
    println!("💾 Posts saved to: {}", posts_path.display());

    let report_path = write_report(
        &thread_ref.id,
        &source,
        &analysis,
        &ranking,
        run,
        generated_at,
    )?;

    print_summary(&analysis);
    println!("\n✅ Report saved to: {}", report_path.display());
    Ok(())
}

/// Build the configured adapters, in order, and fetch through them.
async fn fetch_thread(
    thread_ref: &ThreadRef,
    run: &RunConfig,
    quiet: bool,
) -> Result<(String, Vec<RawRecord>)> {
    let adapters = run
        .sources
        .order
        .iter()
        .map(|&kind| build_adapter(kind, &run.sources))
        .collect();

    fetch_from(adapters, thread_ref, run.sources.limit, quiet).await
}

/// Try each adapter in order until one yields records.
///
/// Fails only when no adapter could be constructed; adapters that run but
/// return nothing lead to an empty report. The returned label names the
/// adapter that produced the records, or every adapter tried.
async fn fetch_from(
    adapters: Vec<Result<Box<dyn SourceAdapter>, ThreadError>>,
    thread_ref: &ThreadRef,
    limit: usize,
    quiet: bool,
) -> Result<(String, Vec<RawRecord>)> {
    let mut tried = Vec::new();
    let mut unavailable = Vec::new();

    for adapter in adapters {
        let adapter = match adapter {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!("{}", e);
                unavailable.push(e.to_string());
                continue;
            }
        };
        let kind = adapter.kind();
        tried.push(kind.to_string());

        let pb = spinner(format!("Fetching thread via {}...", kind), quiet);
        let records = adapter.fetch(thread_ref, limit).await;
        pb.finish_and_clear();

        if records.is_empty() {
            println!("   ⚠️  {} returned no posts", kind);
            continue;
        }

        println!("📥 Fetched {} posts via {}", records.len(), kind);
        return Ok((kind.to_string(), records));
    }

    if tried.is_empty() {
        bail!("No source adapter available ({})", unavailable.join("; "));
    }

    warn!("No adapter returned posts, producing an empty report");
    Ok((tried.join(","), Vec::new()))
}

fn spinner(message: String, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Report on a single saved JSON file.
fn run_archive(path: &Path, run: &RunConfig) -> Result<()> {
    println!("📄 Reading posts from {}", path.display());

    let (analysis, report_path) = analyze_archive(path, run)?;

    print_summary(&analysis);
    println!("\n✅ Report saved to: {}", report_path.display());
    Ok(())
}

/// Load, analyze and report on one archive. Synchronous so batch mode can
/// run it on the blocking pool.
fn analyze_archive(path: &Path, run: &RunConfig) -> Result<(ThreadAnalysis, PathBuf)> {
    let records = sources::load_archive(path)?;
    let ranking = run.ranking.resolve(RankingProfile::Detailed);
    info!(
        file = %path.display(),
        profile = ?ranking.profile,
        retweet_weight = ranking.retweet_weight,
        "Analyzing archive"
    );
    let analysis = analyze_records(&records, ranking.retweet_weight);

    let thread_id = analysis
        .thread
        .main_post()
        .map(|post| post.id.clone())
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let report_path = write_report(
        &thread_id,
        &path.display().to_string(),
        &analysis,
        &ranking,
        run,
        Utc::now(),
    )?;

    Ok((analysis, report_path))
}

/// Report on every JSON file under a directory, `concurrency` at a time.
async fn run_batch(dir: &Path, run: &RunConfig) -> Result<()> {
    let files = sources::find_archives(dir)?;
    if files.is_empty() {
        bail!("No JSON files found in {}", dir.display());
    }

    println!(
        "📂 Analyzing {} JSON files from {} (concurrency {})",
        files.len(),
        dir.display(),
        run.concurrency
    );

    let results: Vec<(PathBuf, Result<PathBuf>)> = stream::iter(files.into_iter().map(|path| {
        let run = run.clone();
        async move {
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                analyze_archive(&task_path, &run).map(|(_, report_path)| report_path)
            })
            .await
            .context("Analysis task panicked")
            .and_then(|result| result);
            (path, result)
        }
    }))
    .buffer_unordered(run.concurrency)
    .collect()
    .await;

    let mut written = 0;
    for (path, result) in &results {
        match result {
            Ok(report_path) => {
                written += 1;
                println!("   ✅ {} → {}", path.display(), report_path.display());
            }
            Err(e) => {
                warn!(file = %path.display(), "Skipping: {:#}", e);
                println!("   ⚠️  {}: {:#}", path.display(), e);
            }
        }
    }

    println!(
        "\n📊 Batch complete: {} reports, {} skipped",
        written,
        results.len() - written
    );

    if written == 0 {
        bail!("No report could be produced from {}", dir.display());
    }
    Ok(())
}

/// Render the aggregate and write it in the configured format. An existing
/// report with the same name is kept and the new one gets a `-N` suffix.
fn write_report(
    thread_id: &str,
    source: &str,
    analysis: &ThreadAnalysis,
    ranking: &Ranking,
    run: &RunConfig,
    generated_at: DateTime<Utc>,
) -> Result<PathBuf> {
    let metadata = ReportMetadata {
        thread_id: thread_id.to_string(),
        source: source.to_string(),
        post_count: analysis.report.post_count,
        generated_at,
    };

    let document = report::render(&analysis.report, &ranking.render);
    let content = match run.format {
        OutputFormat::Json => report::generate_json_report(&metadata, &document, &analysis.report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&metadata, &document),
    };

    report::write_new_output(
        &run.output_dir,
        &report::report_file_name(thread_id, &generated_at, run.format),
        &content,
    )
}

fn print_summary(analysis: &ThreadAnalysis) {
    let report = &analysis.report;

    println!("\n📊 Thread Summary:");
    println!("   Posts: {}", report.post_count);
    if analysis.thread.is_empty() {
        println!("   ⚠️  No posts found, the report contains no data");
        return;
    }
    println!("   Replies: {}", analysis.thread.reply_count());
    println!("   Authors: {}", report.authors.len());
    if analysis.duplicates > 0 {
        println!("   Duplicates dropped: {}", analysis.duplicates);
    }
    if let Some(top) = report.ranked_replies.first() {
        println!("   Top reply: @{} (score {})", top.post.author, top.score);
    }
}

/// Load configuration from file or use defaults. Runs before logging is
/// initialized, so problems are printed to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdapterKind;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    struct StubAdapter {
        kind: AdapterKind,
        records: Vec<RawRecord>,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn kind(&self) -> AdapterKind {
            self.kind
        }

        async fn fetch(&self, _thread: &ThreadRef, limit: usize) -> Vec<RawRecord> {
            self.records.iter().take(limit).cloned().collect()
        }
    }

    fn stub(kind: AdapterKind, ids: &[&str]) -> Result<Box<dyn SourceAdapter>, ThreadError> {
        let records = ids
            .iter()
            .map(|id| RawRecord::new(kind).with("id", *id).with("author", "someone"))
            .collect();
        Ok(Box::new(StubAdapter { kind, records }))
    }

    fn missing(kind: AdapterKind) -> Result<Box<dyn SourceAdapter>, ThreadError> {
        Err(ThreadError::unavailable(kind, "not configured"))
    }

    fn thread_ref() -> ThreadRef {
        ThreadRef::parse("1").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_fails_without_any_adapter() {
        let adapters = vec![missing(AdapterKind::Search), missing(AdapterKind::Browser)];

        let err = fetch_from(adapters, &thread_ref(), 10, true).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("No source adapter available"));
        assert!(message.contains("search adapter unavailable"));
        assert!(message.contains("browser adapter unavailable"));
    }

    #[tokio::test]
    async fn test_fetch_empty_adapters_give_empty_result() {
        let adapters = vec![
            stub(AdapterKind::Nitter, &[]),
            missing(AdapterKind::Search),
            stub(AdapterKind::Browser, &[]),
        ];

        let (source, records) = fetch_from(adapters, &thread_ref(), 10, true).await.unwrap();
        assert_eq!(source, "nitter,browser");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_next_adapter() {
        let adapters = vec![
            stub(AdapterKind::Nitter, &[]),
            missing(AdapterKind::Search),
            stub(AdapterKind::Browser, &["1", "2", "3"]),
            stub(AdapterKind::Nitter, &["9"]),
        ];

        let (source, records) = fetch_from(adapters, &thread_ref(), 2, true).await.unwrap();
        assert_eq!(source, "browser");
        assert_eq!(records.len(), 2);
    }

    fn batch_run(output_dir: &Path) -> RunConfig {
        let mut run = RunConfig::from(Config::default());
        run.output_dir = output_dir.to_path_buf();
        run
    }

    fn report_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_batch_same_thread_keeps_every_report() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        // Two saved fetches of the same thread, analyzed within one second
        fs::write(
            input.path().join("a.json"),
            r#"[{"id": "1", "author": "op", "content": "first fetch"}]"#,
        )
        .unwrap();
        fs::write(
            input.path().join("b.json"),
            r#"[{"id": "1", "author": "op", "content": "second fetch"},
                {"id": "2", "author": "fan", "reply_to": "1"}]"#,
        )
        .unwrap();

        run_batch(input.path(), &batch_run(output.path())).await.unwrap();

        let names = report_files(output.path());
        assert_eq!(names.len(), 2, "reports: {:?}", names);
        assert!(names.iter().all(|n| n.starts_with("thread-report-1-")));

        let contents: Vec<String> = names
            .iter()
            .map(|n| fs::read_to_string(output.path().join(n)).unwrap())
            .collect();
        assert!(contents.iter().any(|c| c.contains("first fetch")));
        assert!(contents.iter().any(|c| c.contains("second fetch")));
    }

    #[tokio::test]
    async fn test_batch_skips_bad_files() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        fs::write(input.path().join("good.json"), r#"[{"id": "7", "author": "op"}]"#).unwrap();
        fs::write(input.path().join("bad.json"), "not json").unwrap();

        run_batch(input.path(), &batch_run(output.path())).await.unwrap();
        assert_eq!(report_files(output.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_batch_fails_when_nothing_is_written() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();

        assert!(run_batch(input.path(), &batch_run(output.path())).await.is_err());

        fs::write(input.path().join("bad.json"), r#"{"ok": true}"#).unwrap();
        assert!(run_batch(input.path(), &batch_run(output.path())).await.is_err());
    }
}
