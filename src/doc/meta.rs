//! Repository-level summary documents

use super::FileDoc;
use serde::{Deserialize, Serialize};

/// Cached summary over a repository's doc collection (`repos/<name>/meta.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoMeta {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub github_url: String,
    pub default_branch: String,
    pub language: String,
    pub framework_tags: Vec<String>,
    pub last_synced_at: String,
    pub last_synced_commit: String,
    pub file_count: usize,
    pub symbol_count: usize,
}

impl RepoMeta {
    /// Recompute counts and dominant language from a set of docs
    pub fn with_docs(mut self, docs: &[FileDoc]) -> Self {
        self.file_count = docs.len();
        self.symbol_count = docs.iter().map(|d| d.symbols.len()).sum();

        let mut counts: Vec<(String, usize)> = Vec::new();
        for doc in docs {
            let lang = doc.source.language.to_string();
            match counts.iter_mut().find(|(l, _)| *l == lang) {
                Some(entry) => entry.1 += 1,
                None => counts.push((lang, 1)),
            }
        }
        // first language wins ties so the result is stable
        self.language = counts
            .iter()
            .fold(None::<&(String, usize)>, |best, c| match best {
                Some(b) if b.1 >= c.1 => Some(b),
                _ => Some(c),
            })
            .map(|(l, _)| l.clone())
            .unwrap_or_else(|| "unknown".to_string());
        self
    }
}

/// Generation statistics (`meta/manifest.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub repo_name: String,
    pub generated_at_iso: String,
    pub source_commit_sha: String,
    pub source_branch: String,
    pub docs_root: String,
    pub generated_files_count: usize,
    pub generator_version: String,
}

/// Overrides with no matching draft (`meta/orphan-overrides.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanReport {
    pub repo_name: String,
    pub orphan_overrides: Vec<String>,
    pub checked_at_iso: String,
}
