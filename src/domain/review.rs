use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::domain::analysis::MultiPrefixResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    CodeReview,
    BugDetection,
    SecurityCheck,
    PerformanceAnalysis,
}

impl ReviewKind {
    pub const DEFAULT: [ReviewKind; 3] = [
        ReviewKind::CodeReview,
        ReviewKind::BugDetection,
        ReviewKind::SecurityCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewKind::CodeReview => "code_review",
            ReviewKind::BugDetection => "bug_detection",
            ReviewKind::SecurityCheck => "security_check",
            ReviewKind::PerformanceAnalysis => "performance_analysis",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReviewKind::CodeReview => "Code Review",
            ReviewKind::BugDetection => "Bug Detection",
            ReviewKind::SecurityCheck => "Security Check",
            ReviewKind::PerformanceAnalysis => "Performance Analysis",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "code_review" | "review" => Some(ReviewKind::CodeReview),
            "bug_detection" | "bugs" => Some(ReviewKind::BugDetection),
            "security_check" | "security" => Some(ReviewKind::SecurityCheck),
            "performance_analysis" | "performance" => Some(ReviewKind::PerformanceAnalysis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Completed(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReview {
    pub kind: ReviewKind,
    pub outcome: ReviewOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReview {
    pub path: String,
    pub language: String,
    pub size_bytes: usize,
    pub reviews: Vec<KindReview>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub files_reviewed: usize,
    pub total_files_found: usize,
    pub issues_found: usize,
    pub high_priority_issues: usize,
    pub languages: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    pub since: String,
    pub generated_at: DateTime<Local>,
    pub model: String,
    pub analysis: MultiPrefixResult,
    pub files: Vec<FileReview>,
    pub summary: ReviewSummary,
}
