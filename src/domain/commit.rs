use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Header fields of one `git log` record, before file details are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStub {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Set when the date could not be parsed and `timestamp` is the time of the query.
    pub timestamp_estimated: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<FixedOffset>,
    pub timestamp_estimated: bool,
    pub message: String,
    pub files_changed: Vec<String>,
    pub changes: Vec<FileChange>,
    pub additions: u64,
    pub deletions: u64,
}

impl Commit {
    pub fn from_parts(stub: CommitStub, detail: CommitDetail) -> Self {
        Self {
            hash: stub.hash,
            author: stub.author,
            email: stub.email,
            timestamp: stub.timestamp,
            timestamp_estimated: stub.timestamp_estimated,
            message: stub.message,
            files_changed: detail.files_changed,
            changes: detail.changes,
            additions: detail.additions,
            deletions: detail.deletions,
        }
    }

    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

/// File lists and line counts retrieved for one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitDetail {
    pub files_changed: Vec<String>,
    pub changes: Vec<FileChange>,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl ChangeKind {
    /// Maps a `--name-status` code (`A`, `M`, `D`, `R100`, `C75`, ...) to a kind.
    pub fn from_status(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' => Some(ChangeKind::Added),
            'M' => Some(ChangeKind::Modified),
            'D' => Some(ChangeKind::Deleted),
            'R' => Some(ChangeKind::Renamed),
            'C' => Some(ChangeKind::Copied),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Copied => "copied",
        }
    }

    pub fn carries_old_path(&self) -> bool {
        matches!(self, ChangeKind::Renamed | ChangeKind::Copied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub file_path: String,
    pub kind: ChangeKind,
    pub additions: u64,
    pub deletions: u64,
    /// Present only for renames and copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
}

/// Outcome of a tolerant parse: the value is always usable, the warning says
/// whether it was read from the input or substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub value: T,
    pub warning: Option<ParseWarning>,
}

impl<T> Parsed<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn defaulted(value: T, warning: ParseWarning) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        self.warning.is_some()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    UnparsableTimestamp(String),
    MissingStatSummary,
    UnpairedChangeLine(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes_to_kinds() {
        assert_eq!(ChangeKind::from_status("A"), Some(ChangeKind::Added));
        assert_eq!(ChangeKind::from_status("R100"), Some(ChangeKind::Renamed));
        assert_eq!(ChangeKind::from_status("C075"), Some(ChangeKind::Copied));
        assert_eq!(ChangeKind::from_status("T"), None);
        assert_eq!(ChangeKind::from_status(""), None);
    }

    #[test]
    fn short_hash_handles_short_input() {
        let commit = Commit {
            hash: "abc".to_string(),
            author: String::new(),
            email: String::new(),
            timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            timestamp_estimated: false,
            message: String::new(),
            files_changed: Vec::new(),
            changes: Vec::new(),
            additions: 0,
            deletions: 0,
        };
        assert_eq!(commit.short_hash(), "abc");
    }
}
