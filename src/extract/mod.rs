//! Draft document extraction
//!
//! This module turns a source checkout into draft file docs:
//! - Code files (regex scan for imports and exported declarations)
//! - HTTP route declarations (OpenAPI skeleton)

pub mod code;
pub mod openapi;

pub use code::{resolve_internal_path, CodeExtractor, Declaration};
pub use openapi::{generate_openapi, Endpoint, RouteExtractor};

use crate::doc::{now_iso, FileDoc, Manifest, RepoMeta, SCHEMA_VERSION};
use crate::repo::{sha_safe, SourceRepository, UNKNOWN_SHA};
use crate::storage::{doc_relative_path, list_json_files, read_json_opt, write_json, DocStore};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Per-run values stamped into every draft
#[derive(Debug, Clone)]
pub struct DraftContext<'a> {
    pub repo: &'a str,
    pub default_branch: &'a str,
    pub github_url: &'a str,
    pub commit_sha: &'a str,
    pub framework_tags: &'a [String],
    pub generated_at_iso: String,
}

impl DraftContext<'_> {
    /// `{github_url}/blob/{sha}/{path}`
    pub fn github_link(&self, path: &str) -> String {
        format!(
            "{}/blob/{}/{}",
            self.github_url.trim_end_matches('/'),
            self.commit_sha,
            path
        )
    }

    /// `/repos/{repo}/files/{path}`
    pub fn nx_link(&self, path: &str) -> String {
        format!("/repos/{}/files/{}", self.repo, path)
    }
}

/// Produces a draft doc from one source file.
///
/// Implementations must not fail on content: unrecognized input yields a doc
/// with empty exports and symbols.
pub trait Extractor {
    fn extract(&self, ctx: &DraftContext<'_>, source_path: &str, content: &str) -> FileDoc;
}

/// Overrides for a generation run, usually taken from a dispatch payload
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    /// Restrict generation to these paths (relative to the source root)
    pub changed_files: Option<Vec<String>>,
}

/// Outcome of a generation run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub repo: String,
    pub commit_sha: String,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    /// Source files not written because an earlier file owns the same doc path,
    /// as `(written, dropped)` pairs
    pub collisions: Vec<(String, String)>,
}

/// Generate draft docs for one repository, then refresh its manifest and meta.
///
/// Unreadable source files are skipped with a warning.
pub fn generate_repo(
    store: &DocStore,
    source: &SourceRepository,
    extractor: &dyn Extractor,
    options: &GenerateOptions,
) -> Result<GenerationReport> {
    let config = source.config();
    let repo = config.name.as_str();

    let commit_sha = options
        .commit_sha
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| source.head_commit())
        .unwrap_or_else(|| UNKNOWN_SHA.to_string());
    let commit_sha = sha_safe(&commit_sha).to_string();
    let branch = options
        .branch
        .clone()
        .unwrap_or_else(|| config.default_branch.clone());

    store.ensure_scaffold(repo)?;

    let files = match &options.changed_files {
        Some(changed) => source.select_changed_files(changed),
        None => source.list_code_files(),
    };
    debug!("{} candidate files in {}", files.len(), repo);

    let ctx = DraftContext {
        repo,
        default_branch: &branch,
        github_url: &config.github_url,
        commit_sha: &commit_sha,
        framework_tags: &config.framework_tags,
        generated_at_iso: now_iso(),
    };

    let mut written = Vec::new();
    let mut skipped = Vec::new();
    let mut collisions = Vec::new();
    let mut owners: HashMap<PathBuf, String> = HashMap::new();

    for file in files {
        let rel = source.relative_path(&file)?;
        if let Some(owner) = owners.get(&doc_relative_path(&rel)) {
            warn!("{} maps to the same doc as {}, not written", rel, owner);
            collisions.push((owner.clone(), rel));
            continue;
        }
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) => {
                warn!("skip unreadable source {:?}: {}", file, e);
                skipped.push(rel);
                continue;
            }
        };

        let doc = extractor.extract(&ctx, &rel, &content);
        write_json(&store.doc_path(repo, &rel), &doc)?;
        owners.insert(doc_relative_path(&rel), rel.clone());
        written.push(rel);
    }

    let manifest = Manifest {
        repo_name: repo.to_string(),
        generated_at_iso: ctx.generated_at_iso.clone(),
        source_commit_sha: commit_sha.clone(),
        source_branch: branch.clone(),
        docs_root: format!("repos/{}/docs", repo),
        generated_files_count: written.len(),
        generator_version: SCHEMA_VERSION.to_string(),
    };
    write_json(&store.manifest_path(repo), &manifest)?;

    let drafts: Vec<FileDoc> = list_json_files(&store.docs_dir(repo))
        .iter()
        .filter_map(|path| read_json_opt(path))
        .collect();
    let meta = RepoMeta {
        name: repo.to_string(),
        display_name: config.display_name.clone().unwrap_or_else(|| repo.to_string()),
        description: config.description.clone(),
        github_url: config.github_url.clone(),
        default_branch: branch.clone(),
        framework_tags: config.framework_tags.clone(),
        last_synced_at: ctx.generated_at_iso.clone(),
        last_synced_commit: commit_sha.clone(),
        ..Default::default()
    }
    .with_docs(&drafts);
    write_json(&store.repo_meta_path(repo), &meta)?;

    info!(
        "generated {} docs for {} at {} ({} skipped)",
        written.len(),
        repo,
        commit_sha,
        skipped.len()
    );

    Ok(GenerationReport {
        repo: repo.to_string(),
        commit_sha,
        written,
        skipped,
        collisions,
    })
}
