//! File-doc data model
//!
//! These types are the wire contract of the knowledge base: field names and
//! nesting match the JSON documents consumed by the presentation layer.
//! Deserialization is lenient (missing sections fall back to defaults) so that
//! hand-edited materialized documents still load for search and indexing.

mod meta;

pub use meta::{Manifest, OrphanReport, RepoMeta};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Schema version stamped on every generated document
pub const SCHEMA_VERSION: &str = "v1.0.0";

/// Reviewer recorded when an override patch touched a document
pub const MANUAL_OVERRIDE_REVIEWER: &str = "manual-override";

/// Current UTC time as an ISO-8601 timestamp with millisecond precision
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Source language tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ts,
    Tsx,
    Js,
    Jsx,
    Vue,
    #[default]
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "ts" => Language::Ts,
            "tsx" => Language::Tsx,
            "js" => Language::Js,
            "jsx" => Language::Jsx,
            "vue" => Language::Vue,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ts => "ts",
            Language::Tsx => "tsx",
            Language::Js => "js",
            Language::Jsx => "jsx",
            Language::Vue => "vue",
            Language::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a documented symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Component,
    Interface,
    Type,
    Enum,
    Value,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Component => "component",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::Value => "value",
            SymbolKind::Constant => "constant",
        }
    }

    /// Parse a kind as written in a search query, accepting the short aliases
    /// `func` and `comp`. Only kinds that can be searched for are accepted.
    pub fn from_query_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_lowercase().as_str() {
            "function" | "func" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "component" | "comp" => Some(SymbolKind::Component),
            "interface" => Some(SymbolKind::Interface),
            "type" => Some(SymbolKind::Type),
            "enum" => Some(SymbolKind::Enum),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an external dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Runtime,
    Dev,
    Peer,
}

/// Confidence level for generated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Structured documentation for one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDoc {
    pub schema_version: String,
    /// `{repo}:{relative_source_path}`
    pub doc_id: String,
    pub repo: RepoRef,
    pub file_name: String,
    pub source: SourceMetadata,
    pub summary: FileSummary,
    pub dependencies: FileDependencies,
    pub exports: Vec<FileExport>,
    pub symbols: Vec<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swagger: Option<SwaggerSection>,
    pub quality: Quality,
}

impl FileDoc {
    /// Deserialize a stored document.
    ///
    /// `null` values (override tombstones) are treated as absent fields.
    pub fn from_value(mut value: Value) -> serde_json::Result<Self> {
        drop_nulls(&mut value);
        serde_json::from_value(value)
    }

    /// Look up a symbol by id
    pub fn symbol(&self, symbol_id: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.symbol_id == symbol_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoRef {
    pub name: String,
    pub source_default_branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    pub file_path: String,
    pub commit_sha: String,
    pub generated_at_iso: String,
    pub language: Language,
    pub framework_tags: Vec<String>,
    pub link_to_github: String,
    pub link_to_nx_kb: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSummary {
    pub purpose: String,
    pub problem_solved: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDependencies {
    pub external: Vec<ExternalDependency>,
    pub internal: Vec<InternalDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalDependency {
    pub name: String,
    pub kind: DependencyKind,
    pub why_used: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalDependency {
    /// Specifier exactly as written in the import
    pub import_path: String,
    /// Project-relative path the specifier resolves to
    pub resolved_file_path: String,
    pub why_used: String,
    pub link_to_nx_kb: String,
    pub link_to_github: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExport {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub description_one_line: String,
    #[serde(default)]
    pub symbol_id: String,
}

/// A documented code-level entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol_id: String,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub description_one_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub details: SymbolDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<SymbolExamples>,
    #[serde(default)]
    pub locations: SymbolLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Returns,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub required: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Returns {
    #[serde(rename = "type")]
    pub ty: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolDetails {
    pub what_it_does: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_cases: Option<Vec<ErrorCase>>,
    /// Class-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<MethodDoc>>,
    /// Component-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_ui_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCase {
    pub condition: String,
    pub behavior: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodDoc {
    pub name: String,
    pub description_one_line: String,
    pub signature: Signature,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolExamples {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_correct: Option<CodeExample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensive_correct: Option<CodeExample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incorrect: Option<IncorrectExample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeExample {
    pub title: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncorrectExample {
    pub title: String,
    pub code: String,
    pub why_incorrect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolLocation {
    #[serde(deserialize_with = "line_number")]
    pub source_line_start: usize,
    #[serde(deserialize_with = "line_number")]
    pub source_line_end: usize,
    pub github_permalink: String,
    pub nx_kb_anchor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwaggerSection {
    pub covered_endpoints: Vec<SwaggerEndpointRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwaggerEndpointRef {
    pub method: String,
    pub path: String,
    pub operation_id: String,
    pub confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quality {
    pub generation_confidence: ConfidenceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_gaps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at_iso: Option<String>,
}

fn drop_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(drop_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(drop_nulls),
        _ => {}
    }
}

/// Any JSON number as a line number: fractions truncate, negatives clamp to 0
fn line_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let n = f64::deserialize(deserializer)?;
    Ok(if n.is_finite() && n > 0.0 { n as usize } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_prefix_aliases() {
        assert_eq!(SymbolKind::from_query_prefix("func"), Some(SymbolKind::Function));
        assert_eq!(SymbolKind::from_query_prefix("COMP"), Some(SymbolKind::Component));
        assert_eq!(SymbolKind::from_query_prefix("constant"), None);
        assert_eq!(SymbolKind::from_query_prefix("http"), None);
    }

    #[test]
    fn test_partial_doc_deserializes() {
        let doc: FileDoc = serde_json::from_str(
            r#"{"doc_id":"r:a.ts","file_name":"a.ts","summary":{"purpose":"p"}}"#,
        )
        .unwrap();

        assert_eq!(doc.summary.purpose, "p");
        assert!(doc.symbols.is_empty());
        assert_eq!(doc.source.language, Language::Unknown);
    }

    #[test]
    fn test_tombstones_and_loose_line_numbers_load() {
        let doc = FileDoc::from_value(serde_json::json!({
            "file_name": "a.ts",
            "summary": null,
            "symbols": [{
                "symbol_id": "a",
                "name": "a",
                "kind": "constant",
                "signature": null,
                "locations": {"source_line_start": 4.7, "source_line_end": -2}
            }]
        }))
        .unwrap();

        assert_eq!(doc.summary, FileSummary::default());
        assert_eq!(doc.symbols[0].locations.source_line_start, 4);
        assert_eq!(doc.symbols[0].locations.source_line_end, 0);
        assert!(doc.symbols[0].signature.is_none());
    }

    #[test]
    fn test_optional_sections_are_omitted() {
        let value = serde_json::to_value(FileDoc::default()).unwrap();
        assert!(value.get("swagger").is_none());
        assert!(value["quality"].get("last_reviewed_by").is_none());
    }
}
