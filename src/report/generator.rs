//! Report file generation.
//!
//! This module writes a rendered [`Document`] as Markdown or JSON and
//! serializes the canonical posts artifact. It makes no decisions of its
//! own: everything shown comes from the renderer.

use crate::models::{AggregateReport, Post, ReportMetadata};
use crate::report::renderer::{Document, Line, Section};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(metadata: &ReportMetadata, document: &Document) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", document.title));
    output.push_str(&generate_metadata_section(metadata));

    for section in &document.sections {
        output.push_str(&generate_section(section));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata block.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Thread ID:** {}\n", metadata.thread_id));
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!("- **Total posts:** {}\n", metadata.post_count));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

/// Generate one section. Consecutive list lines form one block.
fn generate_section(section: &Section) -> String {
    let mut block = format!("## {}\n\n", section.title);
    let mut in_list = false;

    for line in &section.lines {
        if in_list && !line.is_list_item() {
            block.push('\n');
        }
        block.push_str(&generate_line(line));
        in_list = line.is_list_item();
    }

    if in_list {
        block.push('\n');
    }

    block
}

/// Markdown for a single line.
fn generate_line(line: &Line) -> String {
    match line {
        Line::Heading { text } => format!("### {}\n\n", text),
        Line::Field { label, value } => format!("- **{}:** {}\n", label, value),
        Line::Quote { text } => format!("{}\n\n", prefix_lines(text, "> ")),
        Line::Ranked { rank, text } => format!("{}. {}\n", rank, text),
        Line::Excerpt { text } => format!("{}\n\n", prefix_lines(text, "   ")),
        Line::Bullet { text } => format!("- {}\n", text),
        Line::Text { text } => format!("{}\n\n", text),
        Line::Note { text } => format!("*{}*\n\n", text),
    }
}

/// Prefix every line of `text`; empty text still yields one prefixed line.
fn prefix_lines(text: &str, prefix: &str) -> String {
    if text.is_empty() {
        return prefix.trim_end().to_string();
    }
    text.lines()
        .map(|l| format!("{}{}", prefix, l).trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by threadscope*\n");

    footer
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    document: &'a Document,
    aggregate: &'a AggregateReport,
}

/// Generate a JSON report: metadata, rendered document, and the aggregate model.
pub fn generate_json_report(
    metadata: &ReportMetadata,
    document: &Document,
    aggregate: &AggregateReport,
) -> Result<String> {
    let report = JsonReport {
        metadata,
        document,
        aggregate,
    };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Serialize posts as the canonical JSON array.
pub fn generate_posts_json(posts: &[Post]) -> Result<String> {
    serde_json::to_string_pretty(posts).map_err(Into::into)
}

fn file_stamp(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// `thread-<id>-<stamp>.json`
pub fn posts_file_name(thread_id: &str, at: &DateTime<Utc>) -> String {
    format!("thread-{}-{}.json", thread_id, file_stamp(at))
}

/// `thread-report-<id>-<stamp>.<ext>`
pub fn report_file_name(thread_id: &str, at: &DateTime<Utc>, format: OutputFormat) -> String {
    format!(
        "thread-report-{}-{}.{}",
        thread_id,
        file_stamp(at),
        format.extension()
    )
}

/// Write `content` into `dir/name`, creating the directory if needed.
pub fn write_output(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(name);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

/// Write `content` into a new file in `dir`, never replacing an existing
/// one. On a name collision `-2`, `-3`, ... is inserted before the extension.
pub fn write_new_output(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };

    let mut attempt = 1;
    loop {
        let candidate = match (attempt, ext) {
            (1, _) => name.to_string(),
            (n, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
            (n, None) => format!("{}-{}", stem, n),
        };
        let path = dir.join(candidate);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()))
            }
        }
    }
}
