//! Read-time query engine over served docs
//!
//! Every doc in scope is scanned; each matching field becomes a result row.
//! Scoring per term: +1 for a case-insensitive substring hit, +0.5 more when
//! the term also appears as a whole word. Symbol rows get +1 and file rows
//! +2 on top.

use crate::doc::{FileDoc, SymbolKind};
use crate::repo::SearchConfig;
use crate::storage::DocStore;
use regex::Regex;
use serde::Serialize;

/// Minimum trimmed query length
pub const MIN_QUERY_LEN: usize = 2;

const SYMBOL_BOOST: f64 = 1.0;
const FILE_BOOST: f64 = 2.0;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: String,
    pub repo: Option<String>,
    /// Takes precedence over a `kind:` prefix in the query
    pub kind: Option<SymbolKind>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    File,
    Summary,
    Symbol,
    Export,
    Dependency,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub repo: String,
    pub file_path: String,
    pub file_name: String,
    pub match_type: MatchType,
    pub match_field: String,
    pub match_text: String,
    pub score: f64,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<SymbolKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// A query split into its text and optional `kind:` prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub text: String,
    pub kind: Option<SymbolKind>,
}

/// Split a recognised `kind:` prefix off the query.
///
/// An unrecognised prefix is left in place as part of the text.
pub fn parse_query(raw: &str) -> ParsedQuery {
    let trimmed = raw.trim();
    if let Some((prefix, rest)) = trimmed.split_once(':') {
        if let Some(kind) = SymbolKind::from_query_prefix(prefix.trim()) {
            return ParsedQuery {
                text: rest.trim().to_string(),
                kind: Some(kind),
            };
        }
    }
    ParsedQuery {
        text: trimmed.to_string(),
        kind: None,
    }
}

/// Lowercased query terms with their whole-word matchers
pub struct QueryTerms {
    terms: Vec<(String, Option<Regex>)>,
}

impl QueryTerms {
    pub fn new(text: &str) -> Self {
        let terms = text
            .to_lowercase()
            .split_whitespace()
            .map(|term| {
                let word = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))).ok();
                (term.to_string(), word)
            })
            .collect();
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Score `text` against all terms; zero means no match
    pub fn score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut score = 0.0;

        for (term, word) in &self.terms {
            if lower.contains(term.as_str()) {
                score += 1.0;
                if word.as_ref().is_some_and(|re| re.is_match(text)) {
                    score += 0.5;
                }
            }
        }

        score
    }
}

/// Score one text against a raw query string
pub fn score_match(text: &str, query: &str) -> f64 {
    QueryTerms::new(query).score(text)
}

/// Result rows for one doc, in field order
pub fn search_doc(doc: &FileDoc, repo: &str, terms: &QueryTerms) -> Vec<SearchResult> {
    let file_path = doc.source.file_path.as_str();
    let base_link = format!("/repos/{}/docs/{}", repo, file_path);
    let mut rows = Vec::new();

    let row = |match_type, match_field: String, match_text: &str, score, link: String, kind| {
        SearchResult {
            repo: repo.to_string(),
            file_path: file_path.to_string(),
            file_name: doc.file_name.clone(),
            match_type,
            match_field,
            match_text: match_text.to_string(),
            score,
            link,
            symbol_kind: kind,
        }
    };

    let score = terms.score(&format!("{} {}", doc.file_name, file_path));
    if score > 0.0 {
        rows.push(row(
            MatchType::File,
            "file".to_string(),
            file_path,
            score + FILE_BOOST,
            base_link.clone(),
            None,
        ));
    }

    let summary = &doc.summary;
    let score = terms.score(&format!("{} {}", summary.purpose, summary.problem_solved));
    if score > 0.0 {
        rows.push(row(
            MatchType::Summary,
            "summary".to_string(),
            &summary.purpose,
            score,
            base_link.clone(),
            None,
        ));
    }

    for symbol in &doc.symbols {
        let text = format!(
            "{} {} {}",
            symbol.name, symbol.description_one_line, symbol.details.what_it_does
        );
        let score = terms.score(&text);
        if score > 0.0 {
            rows.push(row(
                MatchType::Symbol,
                format!("symbol:{}", symbol.name),
                &symbol.description_one_line,
                score + SYMBOL_BOOST,
                format!("{}#{}", base_link, symbol.symbol_id),
                Some(symbol.kind),
            ));
        }
    }

    for export in &doc.exports {
        let score = terms.score(&format!("{} {}", export.name, export.description_one_line));
        if score > 0.0 {
            rows.push(row(
                MatchType::Export,
                format!("export:{}", export.name),
                &export.description_one_line,
                score,
                format!("{}#{}", base_link, export.symbol_id),
                Some(export.kind),
            ));
        }
    }

    let deps = &doc.dependencies;
    let dep_names = deps
        .external
        .iter()
        .map(|d| (d.name.as_str(), d.why_used.as_str()))
        .chain(
            deps.internal
                .iter()
                .map(|d| (d.import_path.as_str(), d.why_used.as_str())),
        );
    for (name, why_used) in dep_names {
        let score = terms.score(&format!("{} {}", name, why_used));
        if score > 0.0 {
            rows.push(row(
                MatchType::Dependency,
                format!("dep:{}", name),
                why_used,
                score,
                base_link.clone(),
                None,
            ));
        }
    }

    rows
}

/// Run a query over the store
pub fn search(store: &DocStore, config: &SearchConfig, options: &SearchOptions) -> SearchResponse {
    if options.query.trim().chars().count() < MIN_QUERY_LEN {
        return SearchResponse::default();
    }

    let parsed = parse_query(&options.query);
    let kind = options.kind.or(parsed.kind);
    let terms = QueryTerms::new(&parsed.text);
    if terms.is_empty() {
        return SearchResponse::default();
    }

    let repos = match &options.repo {
        Some(repo) => vec![repo.clone()],
        None => store.list_repos(),
    };

    let mut results: Vec<SearchResult> = repos
        .iter()
        .flat_map(|repo| {
            store
                .load_docs(repo)
                .into_iter()
                .flat_map(|(_, doc)| search_doc(&doc, repo, &terms))
                .collect::<Vec<_>>()
        })
        .filter(|r| kind.is_none() || r.symbol_kind == kind)
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));

    let total = results.len();
    let limit = options
        .limit
        .unwrap_or(config.default_limit)
        .min(config.max_limit);

    let results = results
        .into_iter()
        .skip(options.offset)
        .take(limit)
        .collect();

    SearchResponse { results, total }
}
