//! Resolves commit prefixes (or a message pattern) to commits and files.
//!
//! The log is read once per call. Every requested prefix is tested against
//! each log entry, the union of matched commits is hydrated in one batched
//! pass, and each prefix's file set is expanded with discovered imports.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use regex::RegexBuilder;
use tracing::{debug, info};

use crate::analysis::dependencies::DependencyDiscoverer;
use crate::analysis::details::CommitDetailResolver;
use crate::analysis::log::parse_log;
use crate::analysis::prefix::PrefixMatcher;
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::domain::analysis::{MultiPrefixResult, PrefixMatchResult, direct_files_of};
use crate::domain::commit::CommitStub;
use crate::error::{AppError, AppResult};
use crate::services::LogQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub query: LogQuery,
    /// Caps the commits recorded under each prefix, newest first.
    pub max_per_prefix: Option<usize>,
    pub expand_dependencies: bool,
}

impl AnalysisOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            query: LogQuery {
                since: Some(config.since.clone()),
                until: config.until.clone(),
                max_count: None,
            },
            max_per_prefix: None,
            expand_dependencies: config.expand_dependencies,
        }
    }
}

/// Commits selected under one label, as indices into the log.
struct Selection {
    label: String,
    entries: Vec<usize>,
}

pub async fn analyze_multiple_prefixes(
    ctx: &AppContext,
    prefixes: &[String],
    options: &AnalysisOptions,
) -> AppResult<MultiPrefixResult> {
    let mut seen = HashSet::new();
    let requested = prefixes
        .iter()
        .filter(|prefix| seen.insert(*prefix))
        .cloned()
        .collect::<Vec<_>>();
    if requested.is_empty() {
        return Ok(MultiPrefixResult::empty(Vec::new()));
    }

    let stubs = fetch_log(ctx, &options.query).await?;
    let matchers = requested
        .iter()
        .map(|prefix| PrefixMatcher::new(prefix))
        .collect::<Vec<_>>();

    let mut selections = matchers
        .iter()
        .map(|matcher| Selection {
            label: matcher.prefix().to_string(),
            entries: Vec::new(),
        })
        .collect::<Vec<_>>();

    for (index, stub) in stubs.iter().enumerate() {
        for (matcher, selection) in matchers.iter().zip(selections.iter_mut()) {
            let full = options
                .max_per_prefix
                .is_some_and(|limit| selection.entries.len() >= limit);
            if !full && matcher.matches(&stub.message) {
                selection.entries.push(index);
            }
        }
    }

    let result = assemble(ctx, requested, &stubs, selections, options).await;
    info!(
        prefixes = result.prefixes.len(),
        matched = result.prefix_results.len(),
        commits = result.summary.total_commits,
        files = result.summary.total_files,
        "prefix analysis complete"
    );
    Ok(result)
}

/// Single-prefix analysis; a prefix without matches yields an empty result.
pub async fn analyze_prefix(
    ctx: &AppContext,
    prefix: &str,
    options: &AnalysisOptions,
) -> AppResult<PrefixMatchResult> {
    let prefixes = [prefix.to_string()];
    let mut result = analyze_multiple_prefixes(ctx, &prefixes, options).await?;
    Ok(result
        .prefix_results
        .remove(prefix)
        .unwrap_or_else(|| PrefixMatchResult::empty(prefix.to_string())))
}

/// Sorted related-file paths for one prefix.
pub async fn files_for_review(
    ctx: &AppContext,
    prefix: &str,
    options: &AnalysisOptions,
) -> AppResult<Vec<String>> {
    let result = analyze_prefix(ctx, prefix, options).await?;
    Ok(result.related_files.into_iter().collect())
}

/// Conventional commit prefixes that reference a requirement or ticket id.
pub fn requirement_prefixes(id: &str, extra: &[String]) -> Vec<String> {
    let id = id.trim();
    let mut prefixes = vec![
        format!("{id}:"),
        format!("feat({id}):"),
        format!("fix({id}):"),
        format!("feat: {id}"),
        format!("fix: {id}"),
    ];
    prefixes.extend(extra.iter().cloned());
    prefixes
}

pub async fn analyze_requirement(
    ctx: &AppContext,
    id: &str,
    extra: &[String],
    options: &AnalysisOptions,
) -> AppResult<MultiPrefixResult> {
    if id.trim().is_empty() {
        return Err(AppError::Configuration(
            "requirement id must not be empty".to_string(),
        ));
    }
    analyze_multiple_prefixes(ctx, &requirement_prefixes(id, extra), options).await
}

/// Selects commits whose subject matches `pattern` anywhere, ignoring case.
pub async fn analyze_pattern(
    ctx: &AppContext,
    pattern: &str,
    options: &AnalysisOptions,
) -> AppResult<PrefixMatchResult> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| AppError::Configuration(format!("invalid pattern '{pattern}': {err}")))?;

    let stubs = fetch_log(ctx, &options.query).await?;
    let mut entries = stubs
        .iter()
        .enumerate()
        .filter(|(_, stub)| regex.is_match(&stub.message))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    if let Some(limit) = options.max_per_prefix {
        entries.truncate(limit);
    }

    let selection = Selection {
        label: pattern.to_string(),
        entries,
    };
    let mut result = assemble(ctx, vec![pattern.to_string()], &stubs, vec![selection], options).await;
    Ok(result
        .prefix_results
        .remove(pattern)
        .unwrap_or_else(|| PrefixMatchResult::empty(pattern.to_string())))
}

/// Reads the base log. Any failure here is fatal for the caller.
async fn fetch_log(ctx: &AppContext, query: &LogQuery) -> AppResult<Vec<CommitStub>> {
    let output = ctx.version_control.run(&query.to_args()).await?;
    let stubs = parse_log(&output)
        .into_iter()
        .map(|parsed| parsed.into_value())
        .collect::<Vec<_>>();
    debug!(commits = stubs.len(), "read commit log");
    Ok(stubs)
}

async fn assemble(
    ctx: &AppContext,
    prefixes: Vec<String>,
    stubs: &[CommitStub],
    selections: Vec<Selection>,
    options: &AnalysisOptions,
) -> MultiPrefixResult {
    let mut wanted = BTreeSet::new();
    for selection in &selections {
        wanted.extend(selection.entries.iter().copied());
    }

    let mut hashes = HashSet::new();
    let matched = wanted
        .into_iter()
        .map(|index| stubs[index].clone())
        .filter(|stub| hashes.insert(stub.hash.clone()))
        .collect::<Vec<_>>();
    if matched.is_empty() {
        return MultiPrefixResult::empty(prefixes);
    }

    let resolver = CommitDetailResolver::new(ctx.version_control.as_ref(), ctx.config.batch_size);
    let commits = resolver.hydrate(&matched).await;

    let discoverer = DependencyDiscoverer::new(ctx.version_control.root(), &ctx.scanners);
    let mut scanned: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut prefix_results = BTreeMap::new();

    for selection in selections {
        if selection.entries.is_empty() {
            continue;
        }
        let selected = selection
            .entries
            .iter()
            .filter_map(|&index| commits.get(&stubs[index].hash).cloned())
            .collect::<Vec<_>>();

        let mut dependencies = BTreeSet::new();
        if options.expand_dependencies {
            for file in direct_files_of(&selected) {
                let found = scanned
                    .entry(file)
                    .or_insert_with_key(|file| discoverer.dependencies_of(file));
                dependencies.extend(found.iter().cloned());
            }
        }

        debug!(
            prefix = %selection.label,
            commits = selected.len(),
            dependencies = dependencies.len(),
            "assembled prefix result"
        );
        prefix_results.insert(
            selection.label.clone(),
            PrefixMatchResult::new(selection.label, selected, dependencies),
        );
    }

    let log_order = stubs.iter().map(|stub| stub.hash.clone()).collect::<Vec<_>>();
    MultiPrefixResult::combine(prefixes, prefix_results, &log_order)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::infra::git::GitCli;
    use crate::testing::{
        ScriptedGit, TestRepo, command_failed, context_with, git_available, show_targets,
    };

    struct FakeCommit {
        hash: &'static str,
        message: &'static str,
        files: &'static [&'static str],
    }

    const HISTORY: &[FakeCommit] = &[
        FakeCommit {
            hash: "c3",
            message: "docs: update",
            files: &["README.md"],
        },
        FakeCommit {
            hash: "c2",
            message: "fix: bug",
            files: &["a.py", "b.py"],
        },
        FakeCommit {
            hash: "c1",
            message: "feat: add X",
            files: &["a.py"],
        },
    ];

    fn respond(history: &'static [FakeCommit], args: &[String]) -> AppResult<String> {
        match args.first().map(String::as_str) {
            Some("log") => Ok(history
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    format!(
                        "{}|Dev|dev@example.com|2024-05-{:02} 10:00:00 +0000|{}",
                        c.hash,
                        10 - i,
                        c.message
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")),
            Some("show") => {
                let stat = args.iter().any(|a| a == "--shortstat");
                let mut out = String::new();
                for target in show_targets(args) {
                    let commit = history
                        .iter()
                        .find(|c| c.hash == target)
                        .ok_or_else(|| command_failed("bad object"))?;
                    out.push_str(&format!("\u{1e}{}\n", commit.hash));
                    if stat {
                        let n = commit.files.len();
                        out.push_str(&format!(" {n} files changed, {n} insertions(+), 1 deletion(-)\n"));
                    } else {
                        for file in commit.files {
                            out.push_str(&format!("1\t1\t{file}\n"));
                        }
                        for file in commit.files {
                            out.push_str(&format!("M\t{file}\n"));
                        }
                    }
                }
                Ok(out)
            }
            _ => Err(command_failed("unexpected command")),
        }
    }

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), "import util\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("util.py"), "").unwrap();
        dir
    }

    fn scripted(root: &Path) -> Arc<ScriptedGit> {
        Arc::new(ScriptedGit::new(root, |args| respond(HISTORY, args)))
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions {
            query: LogQuery::since("1 year ago"),
            max_per_prefix: None,
            expand_dependencies: true,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn selects_feature_and_fix_commits_only() {
        let dir = workspace();
        let git = scripted(dir.path());
        let ctx = context_with(git.clone());

        let result = analyze_multiple_prefixes(&ctx, &strings(&["feat:", "fix:"]), &options())
            .await
            .unwrap();

        let hashes = result
            .combined_commits
            .iter()
            .map(|c| c.hash.as_str())
            .collect::<Vec<_>>();
        assert_eq!(hashes, vec!["c2", "c1"]);
        assert_eq!(
            result.combined_files,
            BTreeSet::from_iter(strings(&["a.py", "b.py", "util.py"]))
        );
        assert_eq!(
            result.combined_direct_files,
            BTreeSet::from_iter(strings(&["a.py", "b.py"]))
        );
        assert!(!result.combined_files.contains("README.md"));
        assert_eq!(result.prefix_results.len(), 2);
        assert_eq!(result.summary.additions, 3);
        assert_eq!(result.summary.deletions, 2);

        // one log query, then one change and one stat query for the union
        assert_eq!(git.calls().len(), 3);
    }

    #[tokio::test]
    async fn commit_matching_two_prefixes_is_counted_once() {
        let dir = workspace();
        let ctx = context_with(scripted(dir.path()));

        let result =
            analyze_multiple_prefixes(&ctx, &strings(&["fix:", "FIX: b"]), &options())
                .await
                .unwrap();

        assert!(result.prefix_results["fix:"].contains_commit("c2"));
        assert!(result.prefix_results["FIX: b"].contains_commit("c2"));
        assert_eq!(result.combined_commits.len(), 1);
        assert_eq!(result.summary.total_commits, 1);
        assert_eq!(result.summary.additions, 2);
    }

    #[tokio::test]
    async fn prefixes_without_matches_are_omitted() {
        let dir = workspace();
        let ctx = context_with(scripted(dir.path()));

        let result =
            analyze_multiple_prefixes(&ctx, &strings(&["feat:", "perf:"]), &options())
                .await
                .unwrap();

        assert_eq!(result.prefixes, strings(&["feat:", "perf:"]));
        assert!(result.prefix_results.contains_key("feat:"));
        assert!(!result.prefix_results.contains_key("perf:"));
    }

    #[tokio::test]
    async fn empty_prefix_list_runs_no_queries() {
        let dir = workspace();
        let git = scripted(dir.path());
        let ctx = context_with(git.clone());

        let result = analyze_multiple_prefixes(&ctx, &[], &options()).await.unwrap();
        assert!(result.is_empty());
        assert!(result.prefix_results.is_empty());
        assert!(git.calls().is_empty());
    }

    #[tokio::test]
    async fn log_failure_is_fatal() {
        let git = Arc::new(ScriptedGit::new("/repo", |_| {
            Err(command_failed("fatal: bad since"))
        }));
        let ctx = context_with(git);

        let err = analyze_multiple_prefixes(&ctx, &strings(&["feat:"]), &options())
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, AppError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn detail_failures_degrade_to_empty_commits() {
        let dir = workspace();
        let git = Arc::new(ScriptedGit::new(dir.path(), |args| {
            if args[0] == "show" {
                Err(command_failed("object store unavailable"))
            } else {
                respond(HISTORY, args)
            }
        }));
        let ctx = context_with(git);

        let result = analyze_multiple_prefixes(&ctx, &strings(&["fix:"]), &options())
            .await
            .unwrap();
        let commit = &result.prefix_results["fix:"].commits[0];
        assert!(commit.files_changed.is_empty());
        assert_eq!((commit.additions, commit.deletions), (0, 0));
    }

    #[tokio::test]
    async fn caps_commits_per_prefix() {
        let dir = workspace();
        let ctx = context_with(scripted(dir.path()));
        let options = AnalysisOptions {
            max_per_prefix: Some(1),
            ..options()
        };

        let result = analyze_multiple_prefixes(&ctx, &strings(&["f"]), &options)
            .await
            .unwrap();
        let commits = &result.prefix_results["f"].commits;
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].hash, "c2");
    }

    #[tokio::test]
    async fn dependency_expansion_can_be_disabled() {
        let dir = workspace();
        let ctx = context_with(scripted(dir.path()));
        let options = AnalysisOptions {
            expand_dependencies: false,
            ..options()
        };

        let files = files_for_review(&ctx, "feat:", &options).await.unwrap();
        assert_eq!(files, strings(&["a.py"]));
    }

    #[tokio::test]
    async fn files_for_review_are_sorted_and_include_imports() {
        let dir = workspace();
        let ctx = context_with(scripted(dir.path()));

        let files = files_for_review(&ctx, "fix:", &options()).await.unwrap();
        assert_eq!(files, strings(&["a.py", "b.py", "util.py"]));

        let none = analyze_prefix(&ctx, "chore:", &options()).await.unwrap();
        assert_eq!(none.prefix, "chore:");
        assert!(none.commits.is_empty());
    }

    #[test]
    fn expands_requirement_id_into_prefixes() {
        let prefixes = requirement_prefixes(" REQ-7 ", &strings(&["REQ-7 "]));
        assert_eq!(
            prefixes,
            strings(&[
                "REQ-7:",
                "feat(REQ-7):",
                "fix(REQ-7):",
                "feat: REQ-7",
                "fix: REQ-7",
                "REQ-7 ",
            ])
        );
    }

    #[tokio::test]
    async fn requirement_analysis_rejects_blank_id() {
        let ctx = context_with(Arc::new(ScriptedGit::new("/repo", |_| Ok(String::new()))));
        let err = analyze_requirement(&ctx, "  ", &[], &options())
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn pattern_matches_anywhere_ignoring_case() {
        let dir = workspace();
        let ctx = context_with(scripted(dir.path()));

        let result = analyze_pattern(&ctx, "ADD|update", &options()).await.unwrap();
        let hashes = result
            .commits
            .iter()
            .map(|c| c.hash.as_str())
            .collect::<Vec<_>>();
        assert_eq!(hashes, vec!["c3", "c1"]);
        assert!(result.direct_files.contains("README.md"));
    }

    #[tokio::test]
    async fn invalid_pattern_is_a_configuration_error() {
        let dir = workspace();
        let git = scripted(dir.path());
        let ctx = context_with(git.clone());

        let err = analyze_pattern(&ctx, "feat(", &options())
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(git.calls().is_empty());
    }

    #[tokio::test]
    async fn resolves_a_real_repository() {
        if !git_available() {
            eprintln!("git not found, skipping");
            return;
        }
        let repo = TestRepo::init();
        repo.write("a.py", "import util\n");
        repo.write("util.py", "def helper(): pass\n");
        repo.commit("feat: add X");
        repo.write("a.py", "import util\nprint(1)\n");
        repo.write("b.py", "y = 2\n");
        let fix = repo.commit("fix: bug");
        repo.write("README.md", "# docs\n");
        repo.commit("docs: update");

        let git = Arc::new(GitCli::open(repo.path()).unwrap());
        let ctx = context_with(git);

        let result = analyze_multiple_prefixes(&ctx, &strings(&["feat:", "fix:"]), &options())
            .await
            .unwrap();

        assert_eq!(result.combined_commits.len(), 2);
        assert_eq!(result.combined_commits[0].hash, fix);
        assert_eq!(
            result.combined_files,
            BTreeSet::from_iter(strings(&["a.py", "b.py", "util.py"]))
        );
        assert!(!result.combined_files.contains("README.md"));

        let fix_commit = &result.combined_commits[0];
        assert_eq!((fix_commit.additions, fix_commit.deletions), (2, 0));
        assert!(fix_commit.changes.iter().any(|c| c.file_path == "b.py"
            && c.kind == crate::domain::commit::ChangeKind::Added));
    }

    #[tokio::test]
    async fn keeps_non_ascii_paths_readable() {
        if !git_available() {
            eprintln!("git not found, skipping");
            return;
        }
        let repo = TestRepo::init();
        repo.write("模块.py", "import util\n");
        repo.write("util.py", "def helper(): pass\n");
        repo.commit("feat: 中文文件");

        let git = Arc::new(GitCli::open(repo.path()).unwrap());
        let ctx = context_with(git);

        let result = analyze_multiple_prefixes(&ctx, &strings(&["feat:"]), &options())
            .await
            .unwrap();

        assert_eq!(
            result.combined_files,
            BTreeSet::from_iter(strings(&["util.py", "模块.py"]))
        );
        let commit = &result.combined_commits[0];
        assert!(commit.files_changed.contains(&"模块.py".to_string()));
        assert!(commit.changes.iter().any(|c| c.file_path == "模块.py"
            && c.kind == crate::domain::commit::ChangeKind::Added
            && c.additions == 1));
    }

    #[tokio::test]
    async fn records_deleted_files_from_a_real_repository() {
        if !git_available() {
            eprintln!("git not found, skipping");
            return;
        }
        let repo = TestRepo::init();
        repo.write("keep.py", "x = 1\n");
        repo.write("old.py", "a = 1\nb = 2\n");
        repo.commit("chore: seed");
        repo.remove("old.py");
        repo.commit("fix: drop old module");

        let git = Arc::new(GitCli::open(repo.path()).unwrap());
        let ctx = context_with(git);

        let result = analyze_prefix(&ctx, "fix:", &options()).await.unwrap();

        assert_eq!(result.commits.len(), 1);
        let commit = &result.commits[0];
        assert_eq!((commit.additions, commit.deletions), (0, 2));
        assert_eq!(commit.changes.len(), 1);
        let change = &commit.changes[0];
        assert_eq!(change.file_path, "old.py");
        assert_eq!(change.kind, crate::domain::commit::ChangeKind::Deleted);
        assert_eq!((change.additions, change.deletions), (0, 2));
        assert!(change.old_path.is_none());
    }
}
