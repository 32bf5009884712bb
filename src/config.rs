use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::details::DEFAULT_BATCH_SIZE;
use crate::error::{AppError, AppResult};
use crate::infra::git::DEFAULT_TIMEOUT;

const CONFIG_DIR_ENV: &str = "COMMIT_REVIEW_CONFIG_DIR";
const CONFIG_DIR_NAME: &str = "commit-review";
const CONFIG_FILE_NAME: &str = "config.json";

const API_KEY_ENV: &str = "COMMIT_REVIEW_API_KEY";
const BASE_URL_ENV: &str = "COMMIT_REVIEW_BASE_URL";
const MODEL_ENV: &str = "COMMIT_REVIEW_MODEL";

pub const DEFAULT_SINCE: &str = "1 month ago";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Everything a run needs, resolved once and handed to constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workspace_root: PathBuf,
    pub since: String,
    pub until: Option<String>,
    pub batch_size: usize,
    pub git_timeout: Duration,
    pub expand_dependencies: bool,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
        }
    }
}

impl LlmSettings {
    /// Stored values, then environment overrides, then defaults.
    pub fn resolve(stored: &StoredConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |var: &str, stored: &Option<String>| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .or_else(|| stored.clone().filter(|value| !value.trim().is_empty()))
        };

        Self {
            base_url: pick(BASE_URL_ENV, &stored.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: pick(API_KEY_ENV, &stored.api_key),
            model: pick(MODEL_ENV, &stored.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: stored.temperature,
        }
    }
}

impl AppConfig {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            since: DEFAULT_SINCE.to_string(),
            until: None,
            batch_size: DEFAULT_BATCH_SIZE,
            git_timeout: DEFAULT_TIMEOUT,
            expand_dependencies: true,
            llm: LlmSettings::default(),
        }
    }

    /// Reads the stored configuration and applies environment overrides.
    pub fn load(workspace_root: &Path) -> AppResult<Self> {
        let stored = StoredConfig::load()?;
        Ok(Self::from_stored(workspace_root, &stored, |var| {
            env::var(var).ok()
        }))
    }

    pub fn from_stored(
        workspace_root: &Path,
        stored: &StoredConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::new(workspace_root.to_path_buf());
        if let Some(since) = stored.default_since.as_deref().filter(|s| !s.trim().is_empty()) {
            config.since = since.to_string();
        }
        config.llm = LlmSettings::resolve(stored, lookup);
        config
    }
}

/// Settings persisted in `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub default_since: Option<String>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| AppError::Configuration(format!("invalid config file: {err}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}

pub fn config_directory() -> AppResult<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join(CONFIG_DIR_NAME));
    }
    env::var_os("HOME")
        .filter(|dir| !dir.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME))
        .ok_or_else(|| {
            AppError::Configuration("cannot locate a config directory; set HOME".to_string())
        })
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}
