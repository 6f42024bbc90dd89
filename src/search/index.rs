//! Static search index
//!
//! A denormalized snapshot of every served doc: one entry per file and one
//! per symbol. Rebuilt wholesale on each run.

use crate::doc::{now_iso, FileDoc};
use crate::storage::{write_json, DocStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub kind: EntryKind,
    pub repo: String,
    pub id: String,
    pub title: String,
    pub path: String,
    pub summary: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub generated_at_iso: String,
    pub entries: Vec<SearchIndexEntry>,
}

impl SearchIndex {
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(path, self)?;
        info!("wrote search index with {} entries to {:?}", self.entries.len(), path);
        Ok(())
    }
}

/// Index entries for one doc: the file first, then its symbols in order
pub fn doc_entries(repo: &str, doc: &FileDoc) -> Vec<SearchIndexEntry> {
    let mut keywords = vec![doc.source.language.to_string()];
    keywords.extend(doc.source.framework_tags.iter().cloned());
    keywords.retain(|k| !k.is_empty());

    let mut entries = vec![SearchIndexEntry {
        kind: EntryKind::File,
        repo: repo.to_string(),
        id: doc.doc_id.clone(),
        title: doc.file_name.clone(),
        path: doc.source.link_to_nx_kb.clone(),
        summary: doc.summary.purpose.clone(),
        keywords,
    }];

    entries.extend(doc.symbols.iter().map(|symbol| {
        let mut keywords = vec![symbol.kind.to_string(), doc.file_name.clone()];
        keywords.retain(|k| !k.is_empty());

        SearchIndexEntry {
            kind: EntryKind::Symbol,
            repo: repo.to_string(),
            id: symbol.symbol_id.clone(),
            title: symbol.name.clone(),
            path: format!("/repos/{}/symbols/{}", repo, symbol.symbol_id),
            summary: symbol.description_one_line.clone(),
            keywords,
        }
    }));

    entries
}

/// Build the index over `repos` in the given order
pub fn build_index(store: &DocStore, repos: &[String]) -> SearchIndex {
    let entries = repos
        .iter()
        .flat_map(|repo| {
            store
                .load_docs(repo)
                .into_iter()
                .flat_map(move |(_, doc)| doc_entries(repo, &doc))
        })
        .collect();

    SearchIndex {
        generated_at_iso: now_iso(),
        entries,
    }
}
