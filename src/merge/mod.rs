//! Override merging
//!
//! A draft doc is regenerated on every run; operators correct it with a
//! patch under `overrides/<repo>/` mirroring the draft's relative path. The
//! merged result is written to `materialized/`.
//!
//! Merge rules, applied recursively:
//! - `null` in the patch replaces the draft value (tombstone)
//! - arrays are replaced wholesale, never concatenated or merged by index
//! - objects merge key by key; patch-only keys are added, draft-only keys kept
//! - any other patch value replaces the draft value

use crate::doc::{now_iso, OrphanReport, MANUAL_OVERRIDE_REVIEWER};
use crate::repo::to_posix;
use crate::storage::{list_json_files, read_json, write_json, DocStore};
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

/// Deep-merge `patch` onto `base`
pub fn deep_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (_, Value::Null) => Value::Null,
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

/// Produce the materialized doc for a draft and its optional patch.
///
/// When a patch is applied, `quality.last_reviewed_by` is set to
/// [`MANUAL_OVERRIDE_REVIEWER`] unless the merged doc already names a reviewer.
pub fn materialize(draft: Value, patch: Option<Value>) -> Value {
    let Some(patch) = patch else {
        return draft;
    };

    let mut merged = deep_merge(draft, patch);
    if let Value::Object(doc) = &mut merged {
        let quality = doc
            .entry("quality")
            .or_insert_with(|| Value::Object(Map::new()));
        if !quality.is_object() {
            *quality = Value::Object(Map::new());
        }
        if let Value::Object(quality) = quality {
            let reviewed = quality
                .get("last_reviewed_by")
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !reviewed {
                quality.insert(
                    "last_reviewed_by".to_string(),
                    Value::String(MANUAL_OVERRIDE_REVIEWER.to_string()),
                );
            }
        }
    }
    merged
}

/// Outcome of applying overrides to one repository
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub repo: String,
    /// Drafts written to `materialized/`
    pub materialized: usize,
    /// Drafts that had a patch applied
    pub patched: usize,
    /// Per-file problems; the affected file is skipped
    pub errors: Vec<String>,
    /// Override paths (without `.json`) that have no draft
    pub orphans: Vec<String>,
}

/// Materialize every draft of `repo` and write the orphan report
pub fn apply_overrides(store: &DocStore, repo: &str) -> Result<ApplyReport> {
    let docs_dir = store.docs_dir(repo);
    let overrides_dir = store.overrides_dir(repo);
    let materialized_dir = store.materialized_dir(repo);

    let mut report = ApplyReport {
        repo: repo.to_string(),
        ..Default::default()
    };

    for draft_path in list_json_files(&docs_dir) {
        let rel = relative(&draft_path, &docs_dir);

        let draft: Value = match read_json(&draft_path) {
            Ok(v) => v,
            Err(e) => {
                warn!("skip draft {}: {:#}", rel, e);
                report.errors.push(format!("{}: malformed draft", rel));
                continue;
            }
        };

        let override_path = overrides_dir.join(&rel);
        let patch = if override_path.is_file() {
            match read_json::<Value>(&override_path) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("skip override {}: {:#}", rel, e);
                    report.errors.push(format!("{}: malformed override", rel));
                    continue;
                }
            }
        } else {
            None
        };

        if patch.is_some() {
            report.patched += 1;
        }
        write_json(&materialized_dir.join(&rel), &materialize(draft, patch))?;
        report.materialized += 1;
    }

    report.orphans = find_orphans(store, repo);
    let orphan_report = OrphanReport {
        repo_name: repo.to_string(),
        orphan_overrides: report.orphans.clone(),
        checked_at_iso: now_iso(),
    };
    write_json(&store.orphan_report_path(repo), &orphan_report)?;

    for orphan in &report.orphans {
        warn!("orphan override in {}: {}", repo, orphan);
    }
    info!(
        "applied overrides for {}: {} materialized, {} patched",
        repo, report.materialized, report.patched
    );

    Ok(report)
}

/// Override files with no corresponding draft, as paths without `.json`
pub fn find_orphans(store: &DocStore, repo: &str) -> Vec<String> {
    let overrides_dir = store.overrides_dir(repo);
    let docs_dir = store.docs_dir(repo);

    list_json_files(&overrides_dir)
        .into_iter()
        .map(|path| relative(&path, &overrides_dir))
        .filter(|rel| !docs_dir.join(rel).is_file())
        .map(|rel| rel.trim_end_matches(".json").to_string())
        .collect()
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).map(to_posix).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::KbConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn draft() -> Value {
        json!({
            "doc_id": "r:src/a.ts",
            "summary": {"purpose": "Y", "problem_solved": "Z"},
            "exports": [{"name": "A"}, {"name": "B"}],
            "quality": {"generation_confidence": "medium"}
        })
    }

    #[test]
    fn test_empty_patch_is_identity() {
        assert_eq!(deep_merge(draft(), json!({})), draft());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let patch = json!({"summary": {"purpose": "X"}, "exports": [{"name": "C"}]});
        let once = deep_merge(draft(), patch.clone());
        let twice = deep_merge(once.clone(), patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_nested_object_merge() {
        let merged = deep_merge(draft(), json!({"summary": {"purpose": "X"}}));
        assert_eq!(merged["summary"], json!({"purpose": "X", "problem_solved": "Z"}));
    }

    #[test]
    fn test_arrays_are_replaced() {
        let merged = deep_merge(draft(), json!({"exports": [{"name": "C"}]}));
        assert_eq!(merged["exports"], json!([{"name": "C"}]));
    }

    #[test]
    fn test_null_is_tombstone() {
        let merged = deep_merge(draft(), json!({"summary": null, "extra": 1}));
        assert_eq!(merged["summary"], Value::Null);
        assert_eq!(merged["extra"], 1);
        assert_eq!(merged["doc_id"], "r:src/a.ts");
    }

    #[test]
    fn test_materialize_sets_reviewer() {
        let doc = materialize(draft(), Some(json!({"summary": {"purpose": "X"}})));
        assert_eq!(doc["quality"]["last_reviewed_by"], "manual-override");
        assert_eq!(doc["quality"]["generation_confidence"], "medium");

        let doc = materialize(
            draft(),
            Some(json!({"quality": {"last_reviewed_by": "alice"}})),
        );
        assert_eq!(doc["quality"]["last_reviewed_by"], "alice");

        assert_eq!(materialize(draft(), None), draft());
    }

    #[test]
    fn test_materialize_repairs_missing_quality() {
        let doc = materialize(json!({"doc_id": "x"}), Some(json!({"quality": null})));
        assert_eq!(doc["quality"]["last_reviewed_by"], "manual-override");
    }

    #[test]
    fn test_apply_overrides_and_orphans() {
        let tmp = TempDir::new().unwrap();
        let store = DocStore::new(tmp.path(), &KbConfig::default());

        write_json(&store.doc_path("r", "src/a.ts"), &draft()).unwrap();
        write_json(&store.doc_path("r", "src/b.ts"), &draft()).unwrap();
        write_json(
            &store.override_path("r", "src/a.ts"),
            &json!({"summary": {"purpose": "X"}}),
        )
        .unwrap();
        write_json(&store.override_path("r", "src/gone.ts"), &json!({})).unwrap();

        let report = apply_overrides(&store, "r").unwrap();
        assert_eq!(report.materialized, 2);
        assert_eq!(report.patched, 1);
        assert_eq!(report.orphans, vec!["src/gone"]);
        assert!(report.errors.is_empty());

        let a: Value = read_json(&store.materialized_path("r", "src/a.ts")).unwrap();
        assert_eq!(a["summary"]["purpose"], "X");
        let b: Value = read_json(&store.materialized_path("r", "src/b.ts")).unwrap();
        assert_eq!(b, draft());

        let orphans: OrphanReport = read_json(&store.orphan_report_path("r")).unwrap();
        assert_eq!(orphans.orphan_overrides, vec!["src/gone"]);
        // orphan overrides are reported, never removed
        assert!(store.override_path("r", "src/gone.ts").exists());
    }

    #[test]
    fn test_malformed_draft_is_reported_and_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = DocStore::new(tmp.path(), &KbConfig::default());
        write_json(&store.doc_path("r", "src/a.ts"), &draft()).unwrap();
        std::fs::write(store.docs_dir("r").join("bad.json"), "{oops").unwrap();

        let report = apply_overrides(&store, "r").unwrap();
        assert_eq!(report.materialized, 1);
        assert_eq!(report.errors, vec!["bad.json: malformed draft"]);
    }
}
