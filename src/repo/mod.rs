//! Source repository access
//!
//! This module handles the repositories being documented:
//! - Knowledge-base configuration
//! - Discovery of code files under a repository's scan root
//! - Commit metadata from the repository's Git HEAD
//! - Dispatch payloads that trigger a generation run

mod config;
mod dispatch;

pub use config::{
    KbConfig, LockConfig, RepoConfig, SearchConfig, ValidateConfig, CONFIG_FILE,
};
pub use dispatch::{verify_signature, DispatchError, DispatchPayload};

use anyhow::{Context, Result};
use git2::Repository as GitRepo;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Placeholder used wherever a commit sha is unknown
pub const UNKNOWN_SHA: &str = "unknown";

/// A source repository being documented
pub struct SourceRepository {
    config: RepoConfig,
    code_extensions: Vec<String>,
}

impl SourceRepository {
    pub fn new(config: RepoConfig, code_extensions: &[String]) -> Self {
        Self {
            config,
            code_extensions: code_extensions.to_vec(),
        }
    }

    /// Get the repository configuration
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.config.source_root
    }

    /// Check if a path is a code file
    pub fn is_code_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.code_extensions.iter().any(|c| *c == ext)
            })
            .unwrap_or(false)
    }

    /// List all code files under the scan root, as absolute paths in walk order.
    ///
    /// A missing scan root yields an empty list. Entries that cannot be
    /// walked (unreadable directories, symlink loops) are skipped with a warning.
    pub fn list_code_files(&self) -> Vec<PathBuf> {
        let scan_root = self.config.scan_root();
        if !scan_root.is_dir() {
            debug!("scan root {:?} does not exist", scan_root);
            return Vec::new();
        }

        walkdir::WalkDir::new(&scan_root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("skip unwalkable entry under {:?}: {}", scan_root, err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && self.is_code_file(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    /// Select code files from a list of changed paths relative to the repository root.
    ///
    /// Only paths under the scan directory are kept.
    pub fn select_changed_files(&self, changed: &[String]) -> Vec<PathBuf> {
        let prefix = match self.config.source_dir.as_str() {
            "" | "." => String::new(),
            dir => format!("{}/", dir.trim_end_matches('/')),
        };

        changed
            .iter()
            .filter(|p| p.starts_with(&prefix))
            .map(|p| self.root().join(p))
            .filter(|p| self.is_code_file(p))
            .collect()
    }

    /// Path of `file` relative to the repository root, with `/` separators
    pub fn relative_path(&self, file: &Path) -> Result<String> {
        let rel = file
            .strip_prefix(self.root())
            .with_context(|| format!("{:?} is outside {:?}", file, self.root()))?;
        Ok(to_posix(rel))
    }

    /// Read the current HEAD commit of the source checkout, if it is a Git repository
    pub fn head_commit(&self) -> Option<String> {
        let repo = GitRepo::discover(self.root()).ok()?;
        let head = repo.head().ok()?;
        let commit = head.peel_to_commit().ok()?;
        Some(commit.id().to_string())
    }
}

/// Render a relative path with forward slashes
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Return the sha if it looks like a commit id, otherwise [`UNKNOWN_SHA`]
pub fn sha_safe(sha: &str) -> &str {
    if sha.len() >= 7 {
        sha
    } else {
        UNKNOWN_SHA
    }
}
