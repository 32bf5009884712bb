//! Best-effort discovery of files imported by changed files.
//!
//! Scanning is textual: each language family has a scanner that pulls import
//! targets out with regexes and keeps only those that resolve to a file in the
//! repository. Dynamic imports are missed; nothing that does not exist on disk
//! is ever reported.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

static PYTHON_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"from\s+(\S+)\s+import|import\s+(\S+)").expect("invalid python import regex")
});
static WEB_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import.*from\s+['"]([^'"]+)['"]"#).expect("invalid import regex")
});
static WEB_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("invalid require regex")
});
static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"import\s+([a-zA-Z_][a-zA-Z0-9_.]*);").expect("invalid java import regex")
});

const WEB_EXTENSIONS: &[&str] = &[".js", ".ts", ".jsx", ".tsx"];

/// Read-only view of the working tree used to confirm candidate paths.
#[derive(Debug, Clone, Copy)]
pub struct RepoTree<'a> {
    root: &'a Path,
}

impl<'a> RepoTree<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// True when `relative` names a regular file under the root. Absolute
    /// paths and `..` segments never match, so nothing outside the tree does.
    pub fn contains(&self, relative: &str) -> bool {
        let path = Path::new(relative);
        let inside = path
            .components()
            .all(|part| matches!(part, Component::Normal(_) | Component::CurDir));
        !relative.is_empty() && inside && self.root.join(path).is_file()
    }
}

pub trait DependencyScanner: Send + Sync {
    fn language(&self) -> &'static str;

    /// Lower-case extensions without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Repository-relative paths of existing files that `file` imports.
    fn scan(&self, tree: &RepoTree<'_>, file: &str, content: &str) -> BTreeSet<String>;
}

pub struct PythonScanner;

impl DependencyScanner for PythonScanner {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn scan(&self, tree: &RepoTree<'_>, _file: &str, content: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for caps in PYTHON_IMPORT.captures_iter(content) {
            let Some(module) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let module = module.as_str().trim_end_matches([',', ';']);
            if module.is_empty() || module.starts_with('.') {
                continue;
            }

            let base = module.replace('.', "/");
            for candidate in [format!("{base}.py"), format!("{base}/__init__.py")] {
                if tree.contains(&candidate) {
                    found.insert(candidate);
                }
            }
        }
        found
    }
}

pub struct WebScriptScanner;

impl DependencyScanner for WebScriptScanner {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "ts", "jsx", "tsx"]
    }

    fn scan(&self, tree: &RepoTree<'_>, file: &str, content: &str) -> BTreeSet<String> {
        let base_dir = file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let targets = WEB_IMPORT
            .captures_iter(content)
            .chain(WEB_REQUIRE.captures_iter(content))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .filter(|target| target.starts_with('.'));

        let mut found = BTreeSet::new();
        for target in targets {
            let Some(resolved) = normalize_relative(base_dir, target) else {
                continue;
            };
            if tree.contains(&resolved) {
                found.insert(resolved);
                continue;
            }
            if let Some(candidate) = WEB_EXTENSIONS
                .iter()
                .map(|ext| format!("{resolved}{ext}"))
                .find(|candidate| tree.contains(candidate))
            {
                found.insert(candidate);
            }
        }
        found
    }
}

pub struct JavaScanner;

impl DependencyScanner for JavaScanner {
    fn language(&self) -> &'static str {
        "java"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn scan(&self, tree: &RepoTree<'_>, _file: &str, content: &str) -> BTreeSet<String> {
        JAVA_IMPORT
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| format!("{}.java", m.as_str().replace('.', "/")))
            .filter(|candidate| tree.contains(candidate))
            .collect()
    }
}

/// Extension to scanner table, built once and shared.
pub struct ScannerRegistry {
    by_extension: HashMap<&'static str, Arc<dyn DependencyScanner>>,
}

impl ScannerRegistry {
    pub fn new(scanners: Vec<Arc<dyn DependencyScanner>>) -> Self {
        let mut by_extension = HashMap::new();
        for scanner in scanners {
            for ext in scanner.extensions() {
                by_extension.insert(*ext, Arc::clone(&scanner));
            }
        }
        Self { by_extension }
    }

    pub fn scanner_for(&self, file: &str) -> Option<&dyn DependencyScanner> {
        let ext = Path::new(file).extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(ext.as_str()).map(|scanner| scanner.as_ref())
    }
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(PythonScanner),
            Arc::new(WebScriptScanner),
            Arc::new(JavaScanner),
        ])
    }
}

pub struct DependencyDiscoverer<'a> {
    tree: RepoTree<'a>,
    registry: &'a ScannerRegistry,
}

impl<'a> DependencyDiscoverer<'a> {
    pub fn new(root: &'a Path, registry: &'a ScannerRegistry) -> Self {
        Self {
            tree: RepoTree::new(root),
            registry,
        }
    }

    /// Union of the dependencies of every file. Files that are missing, have
    /// no scanner, or cannot be read contribute nothing.
    pub fn discover<'f>(&self, files: impl IntoIterator<Item = &'f String>) -> BTreeSet<String> {
        files
            .into_iter()
            .flat_map(|file| self.dependencies_of(file))
            .collect()
    }

    pub fn dependencies_of(&self, file: &str) -> BTreeSet<String> {
        if !self.tree.contains(file) {
            return BTreeSet::new();
        }
        let Some(scanner) = self.registry.scanner_for(file) else {
            return BTreeSet::new();
        };

        match fs::read_to_string(self.tree.root.join(file)) {
            Ok(content) => {
                let found = scanner.scan(&self.tree, file, &content);
                debug!(file, language = scanner.language(), count = found.len(), "scanned imports");
                found
            }
            Err(err) => {
                warn!(file, error = %err, "could not scan file for dependencies");
                BTreeSet::new()
            }
        }
    }
}

/// Joins `target` onto `base_dir` and folds `.` and `..` segments. Returns
/// `None` when the path would leave the repository.
fn normalize_relative(base_dir: &str, target: &str) -> Option<String> {
    let mut parts = base_dir
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
