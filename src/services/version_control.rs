use std::path::Path;

use async_trait::async_trait;

use crate::error::AppResult;

/// Record format of every log query: `hash|author|email|isoDate|subject`.
pub const LOG_FORMAT: &str = "--pretty=format:%H|%an|%ae|%ad|%s";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Passed to `git log --since` untouched; git validates it.
    pub since: Option<String>,
    pub until: Option<String>,
    pub max_count: Option<usize>,
}

impl LogQuery {
    pub fn since(since: impl Into<String>) -> Self {
        Self {
            since: Some(since.into()),
            ..Self::default()
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "log".to_string(),
            LOG_FORMAT.to_string(),
            "--date=iso".to_string(),
        ];
        if let Some(since) = &self.since {
            args.push("--since".to_string());
            args.push(since.clone());
        }
        if let Some(until) = &self.until {
            args.push("--until".to_string());
            args.push(until.clone());
        }
        if let Some(max_count) = self.max_count {
            args.push("-n".to_string());
            args.push(max_count.to_string());
        }
        args
    }
}

#[async_trait]
pub trait VersionControlService: Send + Sync {
    /// Repository working tree root; relative paths in results resolve against it.
    fn root(&self) -> &Path;

    /// Runs one query and returns stdout with trailing whitespace removed.
    async fn run(&self, args: &[String]) -> AppResult<String>;
}
