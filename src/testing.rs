//! Test doubles shared by the unit tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::services::{ChatMessage, LanguageModelService, VersionControlService};

type Responder = Box<dyn Fn(&[String]) -> AppResult<String> + Send + Sync>;

/// Answers git queries from a closure and records every call.
pub struct ScriptedGit {
    root: PathBuf,
    responder: Responder,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGit {
    pub fn new(
        root: impl Into<PathBuf>,
        responder: impl Fn(&[String]) -> AppResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            root: root.into(),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControlService for ScriptedGit {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn run(&self, args: &[String]) -> AppResult<String> {
        self.calls.lock().unwrap().push(args.to_vec());
        (self.responder)(args)
    }
}

type Replier = Box<dyn Fn(&[ChatMessage]) -> AppResult<String> + Send + Sync>;

/// Language model that answers from a closure and records every prompt.
pub struct ScriptedModel {
    replier: Replier,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(
        replier: impl Fn(&[ChatMessage]) -> AppResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            replier: Box::new(replier),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModelService for ScriptedModel {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> AppResult<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        (self.replier)(messages)
    }
}

/// Context over the given git double with a model that always says "ok".
pub fn context_with(version_control: Arc<dyn VersionControlService>) -> AppContext {
    let model = Arc::new(ScriptedModel::new(|_| Ok("ok".to_string())));
    context_with_model(version_control, model)
}

pub fn context_with_model(
    version_control: Arc<dyn VersionControlService>,
    language_model: Arc<dyn LanguageModelService>,
) -> AppContext {
    let config = AppConfig::new(version_control.root().to_path_buf());
    AppContext::new(config, version_control, language_model)
}

pub fn command_failed(stderr: &str) -> AppError {
    AppError::CommandFailed {
        command: "show".to_string(),
        stderr: stderr.to_string(),
    }
}

/// Hashes passed to a `git show` call (arguments that are not options).
pub fn show_targets(args: &[String]) -> Vec<&str> {
    args.iter()
        .skip(1)
        .filter(|arg| !arg.starts_with('-'))
        .map(String::as_str)
        .collect()
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Throwaway repository driven through the real `git` binary.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn init() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let repo = Self { dir };
        repo.git(&["init", "-q"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write file");
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.dir.path().join(relative)).expect("remove file");
    }

    /// Stages everything and commits; returns the new commit hash.
    pub fn commit(&self, message: &str) -> String {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args([
                "-c",
                "user.name=Test Dev",
                "-c",
                "user.email=dev@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .expect("run git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}
