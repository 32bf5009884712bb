use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;

use crate::context::AppContext;
use crate::domain::analysis::{MultiPrefixResult, PrefixMatchResult};
use crate::error::AppResult;
use crate::report::{self, ReportFormat};
use crate::workflow::analysis::{
    AnalysisOptions, analyze_multiple_prefixes, analyze_pattern, analyze_prefix,
    analyze_requirement, files_for_review,
};

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Repository to analyse.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
    /// Commit message prefix to match; repeat for several.
    #[arg(short, long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,
    /// Requirement or ticket id, expanded to the usual conventional prefixes.
    /// Any --prefix values are added to them.
    #[arg(long, conflicts_with = "pattern")]
    pub requirement: Option<String>,
    /// Case-insensitive regex matched anywhere in the commit subject.
    #[arg(long)]
    pub pattern: Option<String>,
    /// Only commits more recent than this (any `git log --since` expression).
    #[arg(long)]
    pub since: Option<String>,
    #[arg(long)]
    pub until: Option<String>,
    /// Record at most N commits per prefix.
    #[arg(long, value_name = "N")]
    pub max_count: Option<usize>,
    /// Inspect only the N most recent commits of the log.
    #[arg(long, value_name = "N")]
    pub scan_limit: Option<usize>,
    /// Do not add files imported by the changed files.
    #[arg(long)]
    pub no_deps: bool,
    /// Print only the related file paths, one per line.
    #[arg(long)]
    pub files_only: bool,
    #[arg(long, default_value = "md", value_parser = parse_format)]
    pub format: ReportFormat,
    /// Write the report here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn parse_format(value: &str) -> Result<ReportFormat, String> {
    ReportFormat::from_str(value).ok_or_else(|| format!("unknown format '{value}' (md, json)"))
}

pub async fn run(ctx: &AppContext, args: AnalyzeArgs) -> AppResult<()> {
    let mut options = AnalysisOptions::from_config(&ctx.config);
    if let Some(since) = &args.since {
        options.query.since = Some(since.clone());
    }
    if args.until.is_some() {
        options.query.until = args.until.clone();
    }
    options.query.max_count = args.scan_limit;
    options.max_per_prefix = args.max_count;
    options.expand_dependencies &= !args.no_deps;

    if args.files_only {
        let files = match (&args.pattern, &args.requirement, args.prefixes.as_slice()) {
            (None, None, [prefix]) => files_for_review(ctx, prefix, &options).await?,
            _ => select(ctx, &args, &options)
                .await?
                .combined_files
                .into_iter()
                .collect(),
        };
        return report::emit(&files.join("\n"), args.output.as_deref());
    }

    let result = select(ctx, &args, &options).await?;
    if result.is_empty() {
        eprintln!("No commits matched the requested prefixes.");
    }

    let content = match args.format {
        ReportFormat::Markdown => report::analysis_markdown(&result),
        ReportFormat::Json => report::to_json(&result)?,
    };
    report::emit(&content, args.output.as_deref())
}

async fn select(
    ctx: &AppContext,
    args: &AnalyzeArgs,
    options: &AnalysisOptions,
) -> AppResult<MultiPrefixResult> {
    if let Some(pattern) = &args.pattern {
        let matched = analyze_pattern(ctx, pattern, options).await?;
        return Ok(single(matched));
    }
    if let Some(id) = &args.requirement {
        return analyze_requirement(ctx, id, &args.prefixes, options).await;
    }
    match args.prefixes.as_slice() {
        [prefix] => Ok(single(analyze_prefix(ctx, prefix, options).await?)),
        prefixes => analyze_multiple_prefixes(ctx, prefixes, options).await,
    }
}

fn single(result: PrefixMatchResult) -> MultiPrefixResult {
    let label = result.prefix.clone();
    let log_order = result
        .commits
        .iter()
        .map(|commit| commit.hash.clone())
        .collect::<Vec<_>>();
    let prefix_results = if result.commits.is_empty() {
        BTreeMap::new()
    } else {
        BTreeMap::from([(label.clone(), result)])
    };
    MultiPrefixResult::combine(vec![label], prefix_results, &log_order)
}
