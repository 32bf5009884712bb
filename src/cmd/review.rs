use std::path::PathBuf;

use clap::Args;
use tracing::{debug, warn};

use crate::cache::ReviewCache;
use crate::cmd::analyze::parse_format;
use crate::context::AppContext;
use crate::domain::review::{ReviewKind, ReviewReport};
use crate::error::AppResult;
use crate::report::{self, ReportFormat};
use crate::workflow::analysis::AnalysisOptions;
use crate::workflow::review::{ReviewRequest, review_prefixes};

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    /// Repository to review.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
    /// Commit message prefix to match; repeat for several. Defaults to the
    /// conventional feat/fix/refactor/docs/style/test/chore set.
    #[arg(short, long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,
    #[arg(long)]
    pub since: Option<String>,
    #[arg(long)]
    pub until: Option<String>,
    /// Review kind: code_review, bug_detection, security_check or
    /// performance_analysis. Repeat for several.
    #[arg(short, long = "kind", value_name = "KIND", value_parser = parse_kind)]
    pub kinds: Vec<ReviewKind>,
    /// Do not add files imported by the changed files.
    #[arg(long)]
    pub no_deps: bool,
    /// Always ask the model, ignoring cached responses.
    #[arg(long)]
    pub no_cache: bool,
    #[arg(long, default_value = "md", value_parser = parse_format)]
    pub format: ReportFormat,
    /// Write the report here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_kind(value: &str) -> Result<ReviewKind, String> {
    ReviewKind::from_str(value).ok_or_else(|| format!("unknown review kind '{value}'"))
}

pub async fn run(ctx: &AppContext, args: ReviewArgs) -> AppResult<ReviewReport> {
    let mut options = AnalysisOptions::from_config(&ctx.config);
    if let Some(since) = &args.since {
        options.query.since = Some(since.clone());
    }
    if args.until.is_some() {
        options.query.until = args.until.clone();
    }
    options.expand_dependencies &= !args.no_deps;

    let request = ReviewRequest {
        prefixes: args.prefixes,
        kinds: args.kinds,
        options,
    };

    let mut cache = if args.no_cache {
        None
    } else {
        match ReviewCache::load() {
            Ok(cache) => Some(cache),
            Err(err) => {
                warn!(error = %err, "review cache unavailable, continuing without it");
                None
            }
        }
    };

    let review = review_prefixes(ctx, &request, cache.as_mut()).await?;

    if let Some(cache) = &cache {
        match cache.save() {
            Ok(()) => debug!(entries = cache.len(), "saved review cache"),
            Err(err) => {
                warn!(path = %cache.path().display(), error = %err, "failed to save review cache")
            }
        }
    }

    let content = match args.format {
        ReportFormat::Markdown => report::review_markdown(&review),
        ReportFormat::Json => report::to_json(&review)?,
    };
    report::emit(&content, args.output.as_deref())?;
    Ok(review)
}
