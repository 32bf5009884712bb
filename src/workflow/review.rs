use std::collections::BTreeMap;
use std::fs;

use chrono::Local;
use tracing::{info, warn};

use crate::cache::ReviewCache;
use crate::context::AppContext;
use crate::domain::review::{
    FileReview, KindReview, ReviewKind, ReviewOutcome, ReviewReport, ReviewSummary,
};
use crate::error::AppResult;
use crate::prompts::{SYSTEM_PROMPT, build_prompt, detect_language};
use crate::services::Conversation;
use crate::workflow::analysis::{AnalysisOptions, analyze_multiple_prefixes};

/// Conventional commit prefixes reviewed when none are given.
pub const DEFAULT_REVIEW_PREFIXES: &[&str] = &[
    "feat:", "fix:", "refactor:", "docs:", "style:", "test:", "chore:",
];

const ISSUE_KEYWORDS: &[&str] = &["bug", "error", "issue", "risk", "vulnerab"];
const HIGH_PRIORITY_KEYWORDS: &[&str] = &["critical", "severe", "high risk", "urgent"];

#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub prefixes: Vec<String>,
    pub kinds: Vec<ReviewKind>,
    pub options: AnalysisOptions,
}

/// Resolves the prefixes to files and asks the model to review each one.
///
/// A file that cannot be read or is blank is skipped. A failed model call is
/// recorded against that file and kind, and the review carries on.
pub async fn review_prefixes(
    ctx: &AppContext,
    request: &ReviewRequest,
    mut cache: Option<&mut ReviewCache>,
) -> AppResult<ReviewReport> {
    let prefixes = if request.prefixes.is_empty() {
        DEFAULT_REVIEW_PREFIXES
            .iter()
            .map(|prefix| prefix.to_string())
            .collect()
    } else {
        request.prefixes.clone()
    };
    let kinds = if request.kinds.is_empty() {
        ReviewKind::DEFAULT.to_vec()
    } else {
        request.kinds.clone()
    };

    let analysis = analyze_multiple_prefixes(ctx, &prefixes, &request.options).await?;
    let mut conversation = Conversation::new(ctx.language_model.clone());
    let root = &ctx.config.workspace_root;
    let mut files = Vec::new();

    for path in &analysis.combined_files {
        let content = match fs::read(root.join(path)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                warn!(file = %path, error = %err, "skipping unreadable file");
                continue;
            }
        };
        if content.trim().is_empty() {
            warn!(file = %path, "skipping empty file");
            continue;
        }

        let language = detect_language(path);
        let mut reviews = Vec::with_capacity(kinds.len());
        for &kind in &kinds {
            let key = ReviewCache::compute_key(conversation.model_name(), kind, &content);
            if let Some(cached) = cache.as_deref().and_then(|cache| cache.get(&key)) {
                reviews.push(KindReview {
                    kind,
                    outcome: ReviewOutcome::Completed(cached.to_string()),
                });
                continue;
            }

            let prompt = build_prompt(kind, path, language, &content);
            let outcome = match conversation.chat(&prompt, Some(SYSTEM_PROMPT), false).await {
                Ok(response) => {
                    if let Some(cache) = cache.as_deref_mut() {
                        cache.insert(key, kind, &response);
                    }
                    ReviewOutcome::Completed(response)
                }
                Err(err) => {
                    warn!(file = %path, kind = kind.as_str(), error = %err, "review failed");
                    ReviewOutcome::Failed(err.to_string())
                }
            };
            reviews.push(KindReview { kind, outcome });
        }

        info!(file = %path, language, "reviewed file");
        files.push(FileReview {
            path: path.clone(),
            language: language.to_string(),
            size_bytes: content.len(),
            reviews,
        });
    }

    let summary = summarize(&files, analysis.combined_files.len());
    Ok(ReviewReport {
        since: request.options.query.since.clone().unwrap_or_default(),
        generated_at: Local::now(),
        model: conversation.model_name().to_string(),
        analysis,
        files,
        summary,
    })
}

fn summarize(files: &[FileReview], total_files_found: usize) -> ReviewSummary {
    let mut languages = BTreeMap::new();
    let mut issues_found = 0;
    let mut high_priority_issues = 0;

    for file in files {
        *languages.entry(file.language.clone()).or_insert(0) += 1;
        for review in &file.reviews {
            let ReviewOutcome::Completed(text) = &review.outcome else {
                continue;
            };
            let text = text.to_lowercase();
            if mentions_any(&text, ISSUE_KEYWORDS) {
                issues_found += 1;
            }
            if mentions_any(&text, HIGH_PRIORITY_KEYWORDS) {
                high_priority_issues += 1;
            }
        }
    }

    ReviewSummary {
        files_reviewed: files.len(),
        total_files_found,
        issues_found,
        high_priority_issues,
        languages,
    }
}

fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}
