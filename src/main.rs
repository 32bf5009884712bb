mod analysis;
mod cache;
mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod prompts;
mod report;
mod services;
mod telemetry;
mod workflow;

#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::cmd::analyze::{self, AnalyzeArgs};
use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::review::{self, ReviewArgs};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::AppResult;
use crate::infra::git::GitCli;
use crate::infra::llm::OpenAiClient;
use crate::services::VersionControlService;

#[derive(Parser)]
#[command(
    name = "commit-review",
    author,
    version,
    about = "Select files by commit prefix and review them with a language model"
)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve commit prefixes to commits and related files.
    Analyze(AnalyzeArgs),
    /// Review the files behind matching commits with a language model.
    Review(ReviewArgs),
    /// Manage CLI configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    match cli.command {
        Commands::Config(args) => {
            config_cmd::run(args.command)?;
            Ok(())
        }
        Commands::Analyze(args) => {
            let context = build_context(&args.repo)?;
            analyze::run(&context, args).await
        }
        Commands::Review(args) => {
            let context = build_context(&args.repo)?;
            if context.config.llm.api_key.is_none() {
                eprintln!(
                    "Warning: model API key not configured; run `commit-review config init` or set COMMIT_REVIEW_API_KEY."
                );
            }
            let report = review::run(&context, args).await?;
            eprintln!(
                "Reviewed {} of {} files from {} commits.",
                report.summary.files_reviewed,
                report.summary.total_files_found,
                report.analysis.summary.total_commits
            );
            Ok(())
        }
    }
}

fn build_context(repo: &Path) -> AppResult<AppContext> {
    let git = GitCli::open(repo)?;
    let config = AppConfig::load(git.root())?;
    let git = Arc::new(git.with_timeout(config.git_timeout));
    let language_model = Arc::new(OpenAiClient::new(&config.llm));

    Ok(AppContext::new(config, git, language_model))
}
