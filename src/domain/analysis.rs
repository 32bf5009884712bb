use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::domain::commit::{Commit, FileChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    /// Earliest and latest commit time. Commits whose date had to be estimated
    /// are only used when no commit carries a real date.
    pub fn spanning<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> Option<Self> {
        let commits = commits.into_iter().collect::<Vec<_>>();
        let known = commits
            .iter()
            .filter(|commit| !commit.timestamp_estimated)
            .map(|commit| commit.timestamp)
            .collect::<Vec<_>>();
        let stamps = if known.is_empty() {
            commits.iter().map(|commit| commit.timestamp).collect()
        } else {
            known
        };

        let start = stamps.iter().min()?;
        let end = stamps.iter().max()?;
        Some(Self {
            start: *start,
            end: *end,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeTotals {
    pub total_commits: usize,
    pub total_files: usize,
    pub total_direct_files: usize,
    pub additions: u64,
    pub deletions: u64,
    pub time_range: Option<TimeRange>,
}

impl ChangeTotals {
    fn over(commits: &[Commit], direct_files: usize, related_files: usize) -> Self {
        Self {
            total_commits: commits.len(),
            total_files: related_files,
            total_direct_files: direct_files,
            additions: commits.iter().map(|commit| commit.additions).sum(),
            deletions: commits.iter().map(|commit| commit.deletions).sum(),
            time_range: TimeRange::spanning(commits),
        }
    }
}

/// Commits and files selected by a single prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixMatchResult {
    /// The prefix exactly as the caller gave it.
    pub prefix: String,
    pub commits: Vec<Commit>,
    pub direct_files: BTreeSet<String>,
    /// Always a superset of `direct_files`.
    pub related_files: BTreeSet<String>,
    pub file_changes: BTreeMap<String, Vec<FileChange>>,
    pub summary: ChangeTotals,
}

impl PrefixMatchResult {
    pub fn new(prefix: String, commits: Vec<Commit>, dependencies: BTreeSet<String>) -> Self {
        let direct_files = direct_files_of(&commits);
        let mut related_files = dependencies;
        related_files.extend(direct_files.iter().cloned());

        let mut file_changes: BTreeMap<String, Vec<FileChange>> = BTreeMap::new();
        for change in commits.iter().flat_map(|commit| commit.changes.iter()) {
            file_changes
                .entry(change.file_path.clone())
                .or_default()
                .push(change.clone());
        }

        let summary = ChangeTotals::over(&commits, direct_files.len(), related_files.len());
        Self {
            prefix,
            commits,
            direct_files,
            related_files,
            file_changes,
            summary,
        }
    }

    pub fn empty(prefix: String) -> Self {
        Self::new(prefix, Vec::new(), BTreeSet::new())
    }

    pub fn contains_commit(&self, hash: &str) -> bool {
        self.commits.iter().any(|commit| commit.hash == hash)
    }
}

/// Union of the per-prefix results, with every commit counted once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiPrefixResult {
    pub prefixes: Vec<String>,
    /// Only prefixes with at least one matching commit appear here.
    pub prefix_results: BTreeMap<String, PrefixMatchResult>,
    pub combined_commits: Vec<Commit>,
    pub combined_files: BTreeSet<String>,
    pub combined_direct_files: BTreeSet<String>,
    pub summary: ChangeTotals,
}

impl MultiPrefixResult {
    pub fn empty(prefixes: Vec<String>) -> Self {
        Self {
            prefixes,
            prefix_results: BTreeMap::new(),
            combined_commits: Vec::new(),
            combined_files: BTreeSet::new(),
            combined_direct_files: BTreeSet::new(),
            summary: ChangeTotals::default(),
        }
    }

    /// Merges per-prefix results. `log_order` lists hashes in the order the
    /// log returned them and fixes the order of `combined_commits`.
    pub fn combine(
        prefixes: Vec<String>,
        prefix_results: BTreeMap<String, PrefixMatchResult>,
        log_order: &[String],
    ) -> Self {
        let mut by_hash: BTreeMap<&str, &Commit> = BTreeMap::new();
        let mut combined_files = BTreeSet::new();
        let mut combined_direct_files = BTreeSet::new();

        for result in prefix_results.values() {
            for commit in &result.commits {
                by_hash.entry(commit.hash.as_str()).or_insert(commit);
            }
            combined_files.extend(result.related_files.iter().cloned());
            combined_direct_files.extend(result.direct_files.iter().cloned());
        }

        let combined_commits = log_order
            .iter()
            .filter_map(|hash| by_hash.remove(hash.as_str()))
            .cloned()
            .collect::<Vec<_>>();

        let summary = ChangeTotals::over(
            &combined_commits,
            combined_direct_files.len(),
            combined_files.len(),
        );

        Self {
            prefixes,
            prefix_results,
            combined_commits,
            combined_files,
            combined_direct_files,
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.combined_commits.is_empty()
    }
}

pub fn direct_files_of(commits: &[Commit]) -> BTreeSet<String> {
    commits
        .iter()
        .flat_map(|commit| commit.files_changed.iter().cloned())
        .collect()
}
