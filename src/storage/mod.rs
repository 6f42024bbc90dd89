//! Filesystem document store
//!
//! The knowledge base persists everything as flat JSON files:
//! - `repos/<repo>/docs/` drafts mirroring source paths
//! - `repos/<repo>/materialized/` drafts with overrides applied
//! - `repos/<repo>/meta/` manifest and orphan report
//! - `repos/<repo>/openapi/openapi.json`
//! - `repos/<repo>/meta.json` repository summary
//! - `overrides/<repo>/` operator-authored patches
//!
//! Reads degrade gracefully: a missing file or directory is "no data".

mod lock;

pub use lock::{LockError, RepoLock};

use crate::doc::{FileDoc, Symbol};
use crate::repo::{to_posix, KbConfig};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Handle on the knowledge-base directory layout
#[derive(Debug, Clone)]
pub struct DocStore {
    repos_root: PathBuf,
    overrides_root: PathBuf,
}

impl DocStore {
    /// Create a store rooted at `root`, resolving relative config paths against it
    pub fn new(root: &Path, config: &KbConfig) -> Self {
        Self {
            repos_root: root.join(&config.repos_dir),
            overrides_root: root.join(&config.overrides_dir),
        }
    }

    pub fn repos_root(&self) -> &Path {
        &self.repos_root
    }

    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.repos_root.join(repo)
    }

    pub fn docs_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("docs")
    }

    pub fn materialized_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("materialized")
    }

    pub fn meta_dir(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("meta")
    }

    pub fn overrides_dir(&self, repo: &str) -> PathBuf {
        self.overrides_root.join(repo)
    }

    pub fn manifest_path(&self, repo: &str) -> PathBuf {
        self.meta_dir(repo).join("manifest.json")
    }

    pub fn orphan_report_path(&self, repo: &str) -> PathBuf {
        self.meta_dir(repo).join("orphan-overrides.json")
    }

    pub fn openapi_path(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("openapi").join("openapi.json")
    }

    pub fn repo_meta_path(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join("meta.json")
    }

    /// Draft doc path for a source file path relative to the repository root
    pub fn doc_path(&self, repo: &str, source_path: &str) -> PathBuf {
        self.docs_dir(repo).join(doc_relative_path(source_path))
    }

    pub fn materialized_path(&self, repo: &str, source_path: &str) -> PathBuf {
        self.materialized_dir(repo).join(doc_relative_path(source_path))
    }

    pub fn override_path(&self, repo: &str, source_path: &str) -> PathBuf {
        self.overrides_dir(repo).join(doc_relative_path(source_path))
    }

    /// Directory that serves docs for a repo: materialized when present, else drafts
    pub fn serving_dir(&self, repo: &str) -> PathBuf {
        let materialized = self.materialized_dir(repo);
        if materialized.is_dir() {
            materialized
        } else {
            self.docs_dir(repo)
        }
    }

    /// Create the per-repo directory skeleton
    pub fn ensure_scaffold(&self, repo: &str) -> Result<()> {
        for dir in [
            self.docs_dir(repo),
            self.meta_dir(repo),
            self.materialized_dir(repo),
            self.repo_dir(repo).join("openapi"),
        ] {
            std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }

    /// Names of all repositories present in the store, sorted
    pub fn list_repos(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.repos_root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.') && !name.starts_with('_'))
            .collect();
        names.sort();
        names
    }

    /// Load every parseable doc a repo serves, keyed by path relative to the serving dir.
    ///
    /// Malformed files are skipped with a warning.
    pub fn load_docs(&self, repo: &str) -> Vec<(String, FileDoc)> {
        let root = self.serving_dir(repo);
        let mut docs = Vec::new();

        for path in list_json_files(&root) {
            match read_file_doc_at(&path) {
                Ok(doc) => {
                    let rel = path.strip_prefix(&root).map(to_posix).unwrap_or_default();
                    docs.push((rel, doc));
                }
                Err(e) => warn!("skip doc {:?}: {:#}", path, e),
            }
        }

        docs
    }

    /// Read the served doc for a source path (with or without extension)
    pub fn read_file_doc(&self, repo: &str, path: &str) -> Option<FileDoc> {
        let rel = if path.ends_with(".json") {
            PathBuf::from(path)
        } else {
            doc_relative_path(path)
        };

        let materialized = self.materialized_dir(repo).join(&rel);
        let selected = if materialized.is_file() {
            materialized
        } else {
            self.docs_dir(repo).join(&rel)
        };
        read_file_doc_at(&selected).ok()
    }

    /// Find the first served doc declaring `symbol_id`
    pub fn find_symbol(&self, repo: &str, symbol_id: &str) -> Option<(FileDoc, Symbol)> {
        self.load_docs(repo).into_iter().find_map(|(_, doc)| {
            let symbol = doc.symbol(symbol_id)?.clone();
            Some((doc, symbol))
        })
    }
}

/// Map a source path to its doc path: same directories, extension replaced by `.json`
pub fn doc_relative_path(source_path: &str) -> PathBuf {
    Path::new(source_path).with_extension("json")
}

/// All `.json` files below `dir`, sorted; a missing directory yields nothing
pub fn list_json_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("walk error under {:?}: {}", dir, err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.ends_with(".json") && !name.starts_with('.')
        })
        .map(|e| e.into_path())
        .collect()
}

/// Read a stored doc, tolerating override tombstones
fn read_file_doc_at(path: &Path) -> Result<FileDoc> {
    let value = read_json::<serde_json::Value>(path)?;
    FileDoc::from_value(value).with_context(|| format!("Unexpected doc shape in {:?}", path))
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Read a JSON file, treating absence or malformation as `None`
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Option<T> {
    read_json(path).ok()
}

/// Write a value as pretty JSON with a trailing newline, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let mut content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    content.push('\n');

    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}
