use std::fs;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::config_directory;
use crate::domain::review::ReviewKind;
use crate::error::{AppError, AppResult};

const CACHE_FILE_NAME: &str = "review_cache.json";
const CACHE_LIMIT: usize = 256;

#[derive(Default, Serialize, Deserialize)]
struct CacheFile {
    entries: Vec<CacheEntry>,
}

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    key: String,
    kind: String,
    response: String,
}

/// Model responses keyed by model, review kind and file content, so an
/// unchanged file is not sent twice.
pub struct ReviewCache {
    file_path: PathBuf,
    file: CacheFile,
}

impl ReviewCache {
    pub fn load() -> AppResult<Self> {
        Self::load_from(config_directory()?.join(CACHE_FILE_NAME))
    }

    pub fn load_from(path: PathBuf) -> AppResult<Self> {
        let file = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<CacheFile>(&contents)
                .map_err(|err| AppError::Configuration(format!("invalid cache file: {err}")))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CacheFile::default(),
            Err(err) => return Err(AppError::Io(err)),
        };

        Ok(Self {
            file_path: path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.file
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.response.as_str())
    }

    /// Stores a response; the oldest entries go once the limit is exceeded.
    pub fn insert(&mut self, key: String, kind: ReviewKind, response: &str) {
        self.file.entries.retain(|entry| entry.key != key);
        self.file.entries.push(CacheEntry {
            key,
            kind: kind.as_str().to_string(),
            response: response.to_string(),
        });

        if self.file.entries.len() > CACHE_LIMIT {
            let overflow = self.file.entries.len() - CACHE_LIMIT;
            self.file.entries.drain(0..overflow);
        }
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.file)
            .map_err(|err| AppError::Configuration(format!("failed to write cache: {err}")))?;
        fs::write(&self.file_path, data)?;
        Ok(())
    }

    pub fn compute_key(model: &str, kind: ReviewKind, content: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(model.as_bytes());
        hasher.update(b"\0");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(content.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn keys_depend_on_model_kind_and_content() {
        let base = ReviewCache::compute_key("m", ReviewKind::CodeReview, "x = 1");
        assert_eq!(base, ReviewCache::compute_key("m", ReviewKind::CodeReview, "x = 1"));
        assert_ne!(base, ReviewCache::compute_key("n", ReviewKind::CodeReview, "x = 1"));
        assert_ne!(base, ReviewCache::compute_key("m", ReviewKind::BugDetection, "x = 1"));
        assert_ne!(base, ReviewCache::compute_key("m", ReviewKind::CodeReview, "x = 2"));
    }

    #[test]
    fn persists_and_evicts_oldest_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);

        let mut cache = ReviewCache::load_from(path.clone()).unwrap();
        for i in 0..CACHE_LIMIT + 2 {
            cache.insert(format!("k{i}"), ReviewKind::CodeReview, &format!("r{i}"));
        }
        assert_eq!(cache.len(), CACHE_LIMIT);
        assert!(cache.get("k0").is_none());
        assert!(cache.get("k1").is_none());
        cache.save().unwrap();

        let reloaded = ReviewCache::load_from(path).unwrap();
        assert_eq!(reloaded.get("k2"), Some("r2"));
        assert_eq!(reloaded.len(), CACHE_LIMIT);
    }

    #[test]
    fn reinserting_a_key_replaces_it() {
        let dir = TempDir::new().unwrap();
        let mut cache = ReviewCache::load_from(dir.path().join(CACHE_FILE_NAME)).unwrap();
        cache.insert("k".to_string(), ReviewKind::SecurityCheck, "old");
        cache.insert("k".to_string(), ReviewKind::SecurityCheck, "new");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), Some("new"));
    }
}
