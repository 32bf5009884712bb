//! Batched retrieval of per-commit file changes and line counts.
//!
//! Hashes are processed in fixed-size batches so the command line stays
//! bounded. A batch that fails as a whole is retried one hash at a time, and a
//! hash that still fails gets an empty file list and zero counts.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::commit::{
    ChangeKind, Commit, CommitDetail, CommitStub, FileChange, ParseWarning, Parsed,
};
use crate::services::VersionControlService;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Byte git prints (`%x1e`) before each commit hash in batched output.
const RECORD_SEPARATOR: char = '\u{1e}';
const RECORD_FORMAT: &str = "--format=%x1e%H";

/// `--raw` rather than `--name-status`: git drops numstat output when a
/// name-only format is requested, while raw lines carry the same status codes.
const CHANGE_ARGS: &[&str] = &["show", "--raw", "--numstat", RECORD_FORMAT];
const STAT_ARGS: &[&str] = &["show", "--shortstat", RECORD_FORMAT];

static INSERTIONS_AND_DELETIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+insertion.*?(\d+)\s+deletion").expect("invalid stat regex")
});
static INSERTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+insertion").expect("invalid insertion regex"));
static DELETIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+deletion").expect("invalid deletion regex"));

/// Result of one batched query: what was read, and which hashes need a retry.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub resolved: HashMap<String, T>,
    pub failed: Vec<String>,
}

pub struct CommitDetailResolver<'a> {
    vcs: &'a dyn VersionControlService,
    batch_size: usize,
}

impl<'a> CommitDetailResolver<'a> {
    pub fn new(vcs: &'a dyn VersionControlService, batch_size: usize) -> Self {
        Self {
            vcs,
            batch_size: batch_size.max(1),
        }
    }

    /// Details for every requested hash; the map always holds one entry per
    /// distinct input hash.
    pub async fn resolve(&self, hashes: &[String]) -> HashMap<String, CommitDetail> {
        let mut details = HashMap::with_capacity(hashes.len());

        for batch in hashes.chunks(self.batch_size) {
            let mut changes = self.collect(CHANGE_ARGS, batch, parse_change_record).await;
            let mut stats = self.collect(STAT_ARGS, batch, parse_stat_record).await;

            for hash in batch {
                let changes = changes.remove(hash).unwrap_or_default();
                let (additions, deletions) = stats.remove(hash).unwrap_or_default();
                details.insert(
                    hash.clone(),
                    CommitDetail {
                        files_changed: changed_paths(&changes),
                        changes,
                        additions,
                        deletions,
                    },
                );
            }
        }

        details
    }

    /// Joins log stubs with their details, keyed by hash.
    pub async fn hydrate(&self, stubs: &[CommitStub]) -> HashMap<String, Commit> {
        let hashes = stubs.iter().map(|stub| stub.hash.clone()).collect::<Vec<_>>();
        let mut details = self.resolve(&hashes).await;

        stubs
            .iter()
            .map(|stub| {
                let detail = details.remove(&stub.hash).unwrap_or_default();
                (stub.hash.clone(), Commit::from_parts(stub.clone(), detail))
            })
            .collect()
    }

    async fn collect<T, F>(&self, args: &[&str], batch: &[String], parse: F) -> HashMap<String, T>
    where
        T: Default,
        F: Fn(&str, &str) -> T + Copy,
    {
        let BatchOutcome {
            mut resolved,
            failed,
        } = self.try_batch(args, batch, parse).await;

        for hash in failed {
            let mut single = self
                .try_batch(args, std::slice::from_ref(&hash), parse)
                .await;
            let value = match single.resolved.remove(&hash) {
                Some(value) => value,
                None => {
                    warn!(commit = %hash, query = args[1], "commit details unavailable, using defaults");
                    T::default()
                }
            };
            resolved.insert(hash, value);
        }

        resolved
    }

    /// One query for the whole batch. Hashes the query could not answer come
    /// back in `failed` instead of as an error.
    pub async fn try_batch<T, F>(&self, args: &[&str], batch: &[String], parse: F) -> BatchOutcome<T>
    where
        F: Fn(&str, &str) -> T,
    {
        let mut command = args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>();
        command.extend(batch.iter().cloned());

        let output = match self.vcs.run(&command).await {
            Ok(output) => output,
            Err(err) => {
                if batch.len() > 1 {
                    warn!(size = batch.len(), error = %err, "batched git show failed, retrying per commit");
                } else {
                    debug!(error = %err, "git show failed");
                }
                return BatchOutcome {
                    resolved: HashMap::new(),
                    failed: batch.to_vec(),
                };
            }
        };

        let records = split_records(&output);
        let mut resolved = HashMap::with_capacity(batch.len());
        let mut failed = Vec::new();
        for hash in batch {
            let record = records
                .iter()
                .find(|(full_hash, _)| full_hash.starts_with(hash.as_str()));
            match record {
                Some((full_hash, body)) => {
                    resolved.insert(hash.clone(), parse(full_hash.as_str(), body.as_str()));
                }
                None => failed.push(hash.clone()),
            }
        }

        BatchOutcome { resolved, failed }
    }
}

/// Splits batched `git show` output into `(hash, body)` records.
pub fn split_records(output: &str) -> Vec<(String, String)> {
    output
        .split(RECORD_SEPARATOR)
        .filter_map(|chunk| {
            let (hash, body) = chunk.split_once('\n').unwrap_or((chunk, ""));
            let hash = hash.trim();
            if hash.is_empty() {
                None
            } else {
                Some((hash.to_string(), body.to_string()))
            }
        })
        .collect()
}

fn parse_change_record(hash: &str, body: &str) -> Vec<FileChange> {
    let parsed = parse_file_changes(body);
    if let Some(ParseWarning::UnpairedChangeLine(line)) = &parsed.warning {
        warn!(commit = hash, line = %line, "numstat and status lines did not pair up");
    }
    parsed.into_value()
}

fn parse_stat_record(hash: &str, body: &str) -> (u64, u64) {
    let parsed = parse_stats(body);
    if parsed.is_defaulted() {
        warn!(commit = hash, "no line counts in stat summary, assuming 0/0");
    }
    parsed.into_value()
}

/// Reads insertion and deletion counts from a summary such as
/// `2 files changed, 10 insertions(+), 5 deletions(-)`.
pub fn parse_stats(summary: &str) -> Parsed<(u64, u64)> {
    if let Some(caps) = INSERTIONS_AND_DELETIONS.captures(summary) {
        return Parsed::clean((capture_count(&caps, 1), capture_count(&caps, 2)));
    }

    let additions = INSERTIONS
        .captures(summary)
        .map(|caps| capture_count(&caps, 1));
    let deletions = DELETIONS
        .captures(summary)
        .map(|caps| capture_count(&caps, 1));

    match (additions, deletions) {
        (None, None) if summary.trim().is_empty() || summary.contains("changed") => {
            Parsed::clean((0, 0))
        }
        (None, None) => Parsed::defaulted((0, 0), ParseWarning::MissingStatSummary),
        (additions, deletions) => {
            Parsed::clean((additions.unwrap_or(0), deletions.unwrap_or(0)))
        }
    }
}

fn capture_count(caps: &regex::Captures<'_>, group: usize) -> u64 {
    caps.get(group)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Combines `--numstat` lines with status lines (`--name-status` or `--raw`
/// shape) of one commit.
///
/// Lines are told apart by shape and paired by position: the n-th numstat line
/// is assumed to describe the same file as the n-th status line. Both come from
/// the same `git show` invocation, which lists them in the same diff order.
pub fn parse_file_changes(body: &str) -> Parsed<Vec<FileChange>> {
    let mut numstats = Vec::new();
    let mut statuses = Vec::new();

    for line in body.lines().map(str::trim_end).filter(|line| !line.is_empty()) {
        if let Some(numstat) = NumstatLine::parse(line) {
            numstats.push(numstat);
        } else if let Some(status) = StatusLine::parse(line) {
            statuses.push(status);
        }
    }

    let mut warning = None;
    let pair_count = numstats.len().max(statuses.len());
    let mut changes = Vec::with_capacity(pair_count);

    for index in 0..pair_count {
        let change = match (numstats.get(index), statuses.get(index)) {
            (Some(numstat), Some(status)) => FileChange {
                file_path: status.path.clone(),
                kind: status.kind,
                additions: numstat.additions,
                deletions: numstat.deletions,
                old_path: status.old_path.clone(),
            },
            (Some(numstat), None) => {
                if warning.is_none() {
                    warning = Some(ParseWarning::UnpairedChangeLine(numstat.raw.clone()));
                }
                FileChange {
                    file_path: numstat.new_path(),
                    kind: ChangeKind::Modified,
                    additions: numstat.additions,
                    deletions: numstat.deletions,
                    old_path: None,
                }
            }
            (None, Some(status)) => {
                if warning.is_none() {
                    warning = Some(ParseWarning::UnpairedChangeLine(status.raw.clone()));
                }
                FileChange {
                    file_path: status.path.clone(),
                    kind: status.kind,
                    additions: 0,
                    deletions: 0,
                    old_path: status.old_path.clone(),
                }
            }
            (None, None) => continue,
        };
        changes.push(change);
    }

    Parsed {
        value: changes,
        warning,
    }
}

fn changed_paths(changes: &[FileChange]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::with_capacity(changes.len());
    for change in changes {
        if !paths.contains(&change.file_path) {
            paths.push(change.file_path.clone());
        }
    }
    paths
}

#[derive(Debug)]
struct NumstatLine {
    additions: u64,
    deletions: u64,
    path: String,
    raw: String,
}

impl NumstatLine {
    /// `additions<TAB>deletions<TAB>path`, where `-` marks a binary file.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, '\t');
        let additions = parse_numstat_count(parts.next()?)?;
        let deletions = parse_numstat_count(parts.next()?)?;
        let path = parts.next()?.to_string();
        Some(Self {
            additions,
            deletions,
            path,
            raw: line.to_string(),
        })
    }

    /// Destination of `old => new` and `dir/{old => new}/file` rename notation.
    fn new_path(&self) -> String {
        let path = self.path.as_str();
        if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
            if let Some((_, new)) = path[open + 1..close].split_once(" => ") {
                let joined = format!("{}{}{}", &path[..open], new, &path[close + 1..]);
                return joined.replace("//", "/");
            }
        }
        match path.split_once(" => ") {
            Some((_, new)) => new.to_string(),
            None => path.to_string(),
        }
    }
}

fn parse_numstat_count(field: &str) -> Option<u64> {
    if field == "-" {
        Some(0)
    } else if !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit()) {
        field.parse().ok()
    } else {
        None
    }
}

#[derive(Debug)]
struct StatusLine {
    kind: ChangeKind,
    path: String,
    old_path: Option<String>,
    raw: String,
}

impl StatusLine {
    /// `M<TAB>path`, or `R100<TAB>old<TAB>new` for renames and copies. Raw
    /// lines (`:100644 100644 abc123 def456 M<TAB>path`) carry the code as the
    /// last field before the first tab.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split('\t');
        let head = parts.next()?;
        let code = if head.starts_with(':') {
            head.rsplit(' ').next()?
        } else {
            head
        };
        let mut letters = code.chars();
        let first = letters.next()?;
        if !first.is_ascii_uppercase() || !letters.all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }

        let kind = ChangeKind::from_status(code).unwrap_or(ChangeKind::Modified);
        let paths = parts.collect::<Vec<_>>();
        let (path, old_path) = match (kind.carries_old_path(), paths.as_slice()) {
            (true, [old, new, ..]) => (new.to_string(), Some(old.to_string())),
            (_, [path, ..]) => (path.to_string(), None),
            (_, []) => return None,
        };

        Some(Self {
            kind,
            path,
            old_path,
            raw: line.to_string(),
        })
    }
}
