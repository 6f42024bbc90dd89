//! Cross-field and cross-file consistency rules
//!
//! Document rules: checks on a single doc that a schema cannot express
//! Repository checks: source tree vs. generated docs

use super::Violation;
use crate::repo::SourceRepository;
use crate::storage::{doc_relative_path, list_json_files, DocStore};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::warn;

/// Trait for per-document consistency rules
pub trait DocRule: Send + Sync {
    /// Rule name
    fn name(&self) -> &str;

    /// Check one parsed document; `label` identifies it in violations
    fn check(&self, label: &str, doc: &Value) -> Vec<Violation>;
}

/// Collection of document rules run on every doc
pub struct DocRules {
    rules: Vec<Box<dyn DocRule>>,
}

impl DocRules {
    /// Create the default rule set
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(ExportSymbolIntegrityRule), Box::new(InternalLinkRule)],
        }
    }

    /// Run all rules against a document
    pub fn check(&self, label: &str, doc: &Value) -> Vec<Violation> {
        self.rules
            .iter()
            .flat_map(|rule| rule.check(label, doc))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for DocRules {
    fn default() -> Self {
        Self::new()
    }
}

fn array<'a>(doc: &'a Value, pointer: &str) -> &'a [Value] {
    doc.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Every export must reference a symbol declared in the same document
struct ExportSymbolIntegrityRule;

impl DocRule for ExportSymbolIntegrityRule {
    fn name(&self) -> &str {
        "export_symbol_integrity"
    }

    fn check(&self, label: &str, doc: &Value) -> Vec<Violation> {
        let symbol_ids: HashSet<&str> = array(doc, "/symbols")
            .iter()
            .filter_map(|s| s.get("symbol_id").and_then(Value::as_str))
            .collect();

        array(doc, "/exports")
            .iter()
            .enumerate()
            .filter_map(|(i, export)| {
                let id = export.get("symbol_id").and_then(Value::as_str)?;
                if symbol_ids.contains(id) {
                    return None;
                }
                let name = export.get("name").and_then(Value::as_str).unwrap_or("");
                Some(Violation::new(
                    format!("{}:doc.exports[{}]", label, i),
                    format!("Export \"{}\" references missing symbol_id: {}", name, id),
                ))
            })
            .collect()
    }
}

/// Internal dependencies need a site-relative KB link and a GitHub link
struct InternalLinkRule;

impl DocRule for InternalLinkRule {
    fn name(&self) -> &str {
        "internal_links"
    }

    fn check(&self, label: &str, doc: &Value) -> Vec<Violation> {
        let mut out = Vec::new();

        for (i, dep) in array(doc, "/dependencies/internal").iter().enumerate() {
            let trace = format!("{}:doc.dependencies.internal[{}]", label, i);
            let nx = dep.get("link_to_nx_kb").and_then(Value::as_str);
            if !nx.is_some_and(|link| link.starts_with('/')) {
                out.push(Violation::new(trace.clone(), "invalid internal link_to_nx_kb"));
            }

            let github = dep.get("link_to_github").and_then(Value::as_str);
            if github.map_or(true, str::is_empty) {
                out.push(Violation::new(trace, "missing internal link_to_github"));
            }
        }

        out
    }
}

/// Compare a repository's source tree with its draft docs.
///
/// Produces at most one aggregated violation each for source files without
/// a draft, source files whose doc path is taken by another file (`a.ts` and
/// `a.tsx`), and drafts whose source file is gone. A missing scan root
/// skips the check.
pub fn check_mirror_consistency(store: &DocStore, source: &SourceRepository) -> Vec<Violation> {
    let repo = source.config().name.as_str();
    if !source.config().scan_root().is_dir() {
        return Vec::new();
    }

    let docs_dir = store.docs_dir(repo);
    let mut expected: HashSet<PathBuf> = HashSet::new();
    let mut missing = 0usize;
    let mut shared = 0usize;

    for file in source.list_code_files() {
        let rel = match source.relative_path(&file) {
            Ok(rel) => doc_relative_path(&rel),
            Err(e) => {
                warn!("skip {:?} in mirror check: {:#}", file, e);
                continue;
            }
        };
        if !docs_dir.join(&rel).is_file() {
            missing += 1;
        }
        if !expected.insert(rel) {
            shared += 1;
        }
    }

    let stale = list_json_files(&docs_dir)
        .iter()
        .filter_map(|path| path.strip_prefix(&docs_dir).ok())
        .filter(|rel| !expected.contains(*rel))
        .count();

    let mut out = Vec::new();
    if missing > 0 {
        out.push(Violation::new(
            repo,
            format!("missing {} mirrored docs files", missing),
        ));
    }
    if shared > 0 {
        out.push(Violation::new(
            repo,
            format!("{} source files share a doc path with another file", shared),
        ));
    }
    if stale > 0 {
        out.push(Violation::new(
            repo,
            format!("{} docs files have no source file", stale),
        ));
    }
    out
}
