//! Knowledge-base validation
//!
//! Every check runs and every violation is collected; the caller decides
//! whether to fail. Violations are data, not errors.

pub mod rules;
pub mod schema;
pub mod security;

pub use rules::{check_mirror_consistency, DocRule, DocRules};
pub use schema::{Schema, SchemaValidator, FILE_DOC_SCHEMA, OPENAPI_SCHEMA};
pub use security::{SecurityFinding, SecurityScanner};

use crate::repo::{to_posix, SourceRepository};
use crate::storage::{list_json_files, read_json, DocStore};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// A single validation failure located by `trace`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub trace: String,
    pub message: String,
}

impl Violation {
    pub fn new(trace: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            trace: trace.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.trace, self.message)
    }
}

/// Aggregated result of a validation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub files_checked: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.files_checked += other.files_checked;
        self.violations.extend(other.violations);
    }

    /// The first `max` violations, for display
    pub fn reported(&self, max: usize) -> &[Violation] {
        &self.violations[..self.violations.len().min(max)]
    }
}

/// Schemas and rules applied to a knowledge base
pub struct Validator {
    doc_schema: SchemaValidator,
    openapi_schema: SchemaValidator,
    rules: DocRules,
}

impl Validator {
    /// Use the built-in schemas
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            doc_schema: SchemaValidator::from_json(FILE_DOC_SCHEMA)?,
            openapi_schema: SchemaValidator::from_json(OPENAPI_SCHEMA)?,
            rules: DocRules::new(),
        })
    }

    /// Load schemas from `dir`, falling back to built-ins for files it lacks
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let Some(dir) = dir else {
            return Self::builtin();
        };

        let load = |name: &str, fallback: &str| -> Result<SchemaValidator> {
            let path = dir.join(name);
            if path.is_file() {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read schema {:?}", path))?;
                SchemaValidator::from_json(&text)
                    .with_context(|| format!("Failed to load schema {:?}", path))
            } else {
                SchemaValidator::from_json(fallback)
            }
        };

        Ok(Self {
            doc_schema: load("file-doc.schema.json", FILE_DOC_SCHEMA)?,
            openapi_schema: load("openapi.schema.json", OPENAPI_SCHEMA)?,
            rules: DocRules::new(),
        })
    }

    /// Schema and rule violations for one parsed doc
    pub fn validate_doc(&self, label: &str, doc: &Value) -> Vec<Violation> {
        let mut out = Vec::new();
        self.doc_schema.validate_at(doc, &format!("{}:doc", label), &mut out);
        out.extend(self.rules.check(label, doc));
        out
    }

    /// Validate a repository's drafts, materialized docs and OpenAPI document.
    ///
    /// With a source repository, mirror consistency is checked too.
    pub fn validate_repo(
        &self,
        store: &DocStore,
        repo: &str,
        source: Option<&SourceRepository>,
    ) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        for dir in [store.docs_dir(repo), store.materialized_dir(repo)] {
            for path in list_json_files(&dir) {
                let label = self.label(store, &path);
                report.files_checked += 1;

                match read_json::<Value>(&path) {
                    Ok(doc) => report.violations.extend(self.validate_doc(&label, &doc)),
                    Err(e) => report
                        .violations
                        .push(Violation::new(label, format!("malformed JSON ({})", root_cause(&e)))),
                }
            }
        }

        let openapi_path = store.openapi_path(repo);
        let label = self.label(store, &openapi_path);
        if openapi_path.is_file() {
            report.files_checked += 1;
            match read_json::<Value>(&openapi_path) {
                Ok(doc) => self
                    .openapi_schema
                    .validate_at(&doc, &label, &mut report.violations),
                Err(e) => report
                    .violations
                    .push(Violation::new(label, format!("malformed JSON ({})", root_cause(&e)))),
            }
        } else {
            report.violations.push(Violation::new(label, "missing openapi.json"));
        }

        if let Some(source) = source {
            report
                .violations
                .extend(check_mirror_consistency(store, source));
        }

        debug!(
            "validated {}: {} files, {} violations",
            repo,
            report.files_checked,
            report.violations.len()
        );
        Ok(report)
    }

    fn label(&self, store: &DocStore, path: &Path) -> String {
        path.strip_prefix(store.repos_root())
            .map(to_posix)
            .unwrap_or_else(|_| to_posix(path))
    }
}

fn root_cause(err: &anyhow::Error) -> String {
    err.root_cause().to_string()
}

/// Validate several repositories into one report
pub fn validate_all(
    validator: &Validator,
    store: &DocStore,
    repos: &[(String, Option<SourceRepository>)],
) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    for (repo, source) in repos {
        report.merge(validator.validate_repo(store, repo, source.as_ref())?);
    }
    info!(
        "validation checked {} files across {} repos: {} violations",
        report.files_checked,
        repos.len(),
        report.violations.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::KbConfig;
    use crate::storage::write_json;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_openapi_and_malformed_doc() {
        let tmp = TempDir::new().unwrap();
        let store = DocStore::new(tmp.path(), &KbConfig::default());
        std::fs::create_dir_all(store.docs_dir("r")).unwrap();
        std::fs::write(store.docs_dir("r").join("a.json"), "{oops").unwrap();

        let report = Validator::builtin()
            .unwrap()
            .validate_repo(&store, "r", None)
            .unwrap();

        assert!(!report.is_ok());
        assert_eq!(report.files_checked, 1);
        assert_eq!(report.violations.len(), 2);
        assert!(report.violations[0].message.starts_with("malformed JSON"));
        assert_eq!(
            report.violations[1].to_string(),
            "r/openapi/openapi.json: missing openapi.json"
        );
    }

    #[test]
    fn test_doc_violations_are_traced_by_file() {
        let tmp = TempDir::new().unwrap();
        let store = DocStore::new(tmp.path(), &KbConfig::default());
        write_json(
            &store.openapi_path("r"),
            &json!({"openapi": "3.1.0", "info": {"title": "r API", "version": "latest"}, "paths": {}}),
        )
        .unwrap();
        write_json(
            &store.materialized_path("r", "src/a.ts"),
            &json!({"summary": {"purpose": 3}}),
        )
        .unwrap();

        let validator = Validator::builtin().unwrap();
        let report = validator.validate_repo(&store, "r", None).unwrap();

        let rendered: Vec<String> = report.violations.iter().map(|v| v.to_string()).collect();
        assert!(rendered.contains(&"r/materialized/src/a.json:doc: missing required key doc_id".to_string()));
        assert!(rendered.contains(&"r/materialized/src/a.json:doc.summary.purpose: expected string".to_string()));
    }

    #[test]
    fn test_reported_is_capped() {
        let report = ValidationReport {
            files_checked: 0,
            violations: (0..5).map(|i| Violation::new(i.to_string(), "x")).collect(),
        };
        assert_eq!(report.reported(3).len(), 3);
        assert_eq!(report.reported(10).len(), 5);
    }

    #[test]
    fn test_schema_dir_override() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("file-doc.schema.json"),
            r#"{"type": "object", "required": ["custom"]}"#,
        )
        .unwrap();

        let validator = Validator::load(Some(tmp.path())).unwrap();
        let violations = validator.validate_doc("f", &json!({}));
        assert_eq!(violations[0].to_string(), "f:doc: missing required key custom");
    }
}
