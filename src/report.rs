//! Markdown and JSON renderings of analysis and review results.

use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::domain::analysis::{ChangeTotals, MultiPrefixResult, PrefixMatchResult};
use crate::domain::review::{ReviewOutcome, ReviewReport};
use crate::error::{AppError, AppResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "md" | "markdown" => Some(ReportFormat::Markdown),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Report(format!("failed to serialise report: {err}")))
}

/// Writes to `output` when given, creating parent directories, else to stdout.
pub fn emit(content: &str, output: Option<&Path>) -> AppResult<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

pub fn analysis_markdown(result: &MultiPrefixResult) -> String {
    let mut md = String::from("# Commit Prefix Analysis\n\n");
    md.push_str(&format!(
        "Prefixes: {}\n\n",
        inline_list(result.prefixes.iter().map(String::as_str))
    ));
    md.push_str("## Summary\n\n");
    push_totals(&mut md, &result.summary);

    if result.is_empty() {
        md.push_str("\nNo commits matched.\n");
        return md;
    }

    md.push_str("\n## Commits\n\n| Hash | Date | Author | Message | +/- |\n|---|---|---|---|---|\n");
    for commit in &result.combined_commits {
        md.push_str(&format!(
            "| `{}` | {}{} | {} | {} | +{} / -{} |\n",
            commit.short_hash(),
            format_time(&commit.timestamp),
            if commit.timestamp_estimated { " (estimated)" } else { "" },
            escape_cell(&commit.author),
            escape_cell(&commit.message),
            commit.additions,
            commit.deletions,
        ));
    }

    md.push_str("\n## Files\n\n");
    for file in &result.combined_files {
        let marker = if result.combined_direct_files.contains(file) {
            ""
        } else {
            " (dependency)"
        };
        md.push_str(&format!("- `{file}`{marker}\n"));
    }

    for prefix_result in result.prefix_results.values() {
        push_prefix_section(&mut md, prefix_result);
    }
    md
}

fn push_prefix_section(md: &mut String, result: &PrefixMatchResult) {
    md.push_str(&format!("\n## Prefix `{}`\n\n", result.prefix));
    push_totals(md, &result.summary);
    md.push_str("\n| File | Changes |\n|---|---|\n");
    for (path, changes) in &result.file_changes {
        let kinds = changes
            .iter()
            .map(|change| match &change.old_path {
                Some(old) => format!("{} from `{old}` (+{}/-{})", change.kind.as_str(), change.additions, change.deletions),
                None => format!("{} (+{}/-{})", change.kind.as_str(), change.additions, change.deletions),
            })
            .collect::<Vec<_>>()
            .join(", ");
        md.push_str(&format!("| `{path}` | {kinds} |\n"));
    }
}

fn push_totals(md: &mut String, totals: &ChangeTotals) {
    md.push_str(&format!("- Commits: {}\n", totals.total_commits));
    md.push_str(&format!(
        "- Files: {} ({} changed directly)\n",
        totals.total_files, totals.total_direct_files
    ));
    md.push_str(&format!(
        "- Lines: +{} / -{}\n",
        totals.additions, totals.deletions
    ));
    if let Some(range) = &totals.time_range {
        md.push_str(&format!(
            "- Period: {} to {}\n",
            format_time(&range.start),
            format_time(&range.end)
        ));
    }
}

pub fn review_markdown(report: &ReviewReport) -> String {
    let mut md = String::from("# Code Review Report\n\n");
    md.push_str(&format!(
        "- Generated: {}\n- Model: {}\n- Since: {}\n- Prefixes: {}\n\n",
        format_time(&report.generated_at),
        report.model,
        report.since,
        inline_list(report.analysis.prefixes.iter().map(String::as_str)),
    ));

    let summary = &report.summary;
    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- Commits analysed: {}\n- Files reviewed: {} of {}\n- Responses mentioning issues: {}\n- High priority: {}\n",
        report.analysis.summary.total_commits,
        summary.files_reviewed,
        summary.total_files_found,
        summary.issues_found,
        summary.high_priority_issues,
    ));
    if !summary.languages.is_empty() {
        let languages = summary
            .languages
            .iter()
            .map(|(language, count)| format!("{language} ({count})"))
            .collect::<Vec<_>>()
            .join(", ");
        md.push_str(&format!("- Languages: {languages}\n"));
    }

    for file in &report.files {
        md.push_str(&format!(
            "\n## `{}`\n\n{} file, {} bytes\n",
            file.path, file.language, file.size_bytes
        ));
        for review in &file.reviews {
            md.push_str(&format!("\n### {}\n\n", review.kind.title()));
            match &review.outcome {
                ReviewOutcome::Completed(text) => md.push_str(text.trim()),
                ReviewOutcome::Failed(error) => md.push_str(&format!("> Review failed: {error}")),
            }
            md.push('\n');
        }
    }
    md
}

fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(TIME_FORMAT).to_string()
}

fn inline_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let items = items.map(|item| format!("`{item}`")).collect::<Vec<_>>();
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
