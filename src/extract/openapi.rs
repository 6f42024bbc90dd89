//! OpenAPI skeleton generation from Express-style route declarations
//!
//! Matches `app.get("/x", ...)` / `router.post('/y', ...)` calls. Each
//! method+path pair becomes one operation answering `200`.

use crate::repo::{to_posix, SourceRepository};
use crate::storage::{write_json, DocStore};
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const OPENAPI_VERSION: &str = "3.1.0";

/// A route found in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
    pub operation_id: String,
}

pub struct RouteExtractor {
    route_re: Regex,
    non_word_re: Regex,
}

impl RouteExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            route_re: Regex::new(
                r#"(?i)\b(?:app|router)\.(get|post|put|patch|delete|options|head)\s*\(\s*["'`]([^"'`]+)["'`]"#,
            )
            .context("Failed to compile route pattern")?,
            non_word_re: Regex::new(r"\W").context("Failed to compile sanitizer pattern")?,
        })
    }

    /// Routes declared in `content`; `rel_path` is relative to the scan root
    pub fn find_endpoints(&self, rel_path: &str, content: &str) -> Vec<Endpoint> {
        let file_key = self.non_word_re.replace_all(rel_path, "_");

        self.route_re
            .captures_iter(content)
            .map(|caps| {
                let method = caps[1].to_lowercase();
                let raw = &caps[2];
                let path = if raw.starts_with('/') {
                    raw.to_string()
                } else {
                    format!("/{}", raw)
                };
                Endpoint {
                    operation_id: format!("{}_{}", method, file_key),
                    method,
                    path,
                }
            })
            .collect()
    }
}

/// Build the OpenAPI document for a set of endpoints.
///
/// A later endpoint with the same method and path replaces an earlier one.
pub fn openapi_document(repo: &str, version: &str, endpoints: &[Endpoint]) -> Value {
    let mut paths = Map::new();
    for endpoint in endpoints {
        let entry = paths
            .entry(endpoint.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            methods.insert(
                endpoint.method.clone(),
                json!({
                    "operationId": endpoint.operation_id,
                    "responses": {
                        "200": { "description": "Successful response" }
                    }
                }),
            );
        }
    }

    json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": format!("{} API", repo),
            "version": version,
        },
        "paths": paths,
    })
}

/// Scan a repository for routes and write `openapi/openapi.json`.
///
/// Returns the number of endpoints found. `version` defaults to `latest`.
pub fn generate_openapi(
    store: &DocStore,
    source: &SourceRepository,
    version: Option<&str>,
) -> Result<usize> {
    let extractor = RouteExtractor::new()?;
    let scan_root = source.config().scan_root();
    let repo = source.config().name.as_str();

    let mut endpoints = Vec::new();
    for file in source.list_code_files() {
        let content = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                warn!("skip unreadable source {:?}: {}", file, e);
                continue;
            }
        };
        let rel = file
            .strip_prefix(&scan_root)
            .map(to_posix)
            .unwrap_or_else(|_| to_posix(&file));
        endpoints.extend(extractor.find_endpoints(&rel, &content));
    }

    let document = openapi_document(repo, version.unwrap_or("latest"), &endpoints);
    write_json(&store.openapi_path(repo), &document)?;

    info!("generated openapi for {} with {} endpoints", repo, endpoints.len());
    Ok(endpoints.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{KbConfig, RepoConfig};
    use crate::storage::read_json;
    use tempfile::TempDir;

    #[test]
    fn test_find_endpoints() {
        let extractor = RouteExtractor::new().unwrap();
        let code = r#"
router.get("/users/:id", handler);
app.POST('health', check);
client.get("/not-a-route");
"#;

        let endpoints = extractor.find_endpoints("routes/users.ts", code);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].method, "get");
        assert_eq!(endpoints[0].path, "/users/:id");
        assert_eq!(endpoints[0].operation_id, "get_routes_users_ts");
        assert_eq!(endpoints[1].method, "post");
        assert_eq!(endpoints[1].path, "/health");
    }

    #[test]
    fn test_document_shape() {
        let endpoints = vec![
            Endpoint {
                method: "get".into(),
                path: "/a".into(),
                operation_id: "get_a".into(),
            },
            Endpoint {
                method: "post".into(),
                path: "/a".into(),
                operation_id: "post_a".into(),
            },
        ];

        let doc = openapi_document("server_commons", "latest", &endpoints);
        assert_eq!(doc["openapi"], "3.1.0");
        assert_eq!(doc["info"]["title"], "server_commons API");
        assert_eq!(doc["paths"]["/a"]["post"]["operationId"], "post_a");
        assert_eq!(
            doc["paths"]["/a"]["get"]["responses"]["200"]["description"],
            "Successful response"
        );
    }

    #[test]
    fn test_generate_without_sources_writes_empty_paths() {
        let tmp = TempDir::new().unwrap();
        let config = KbConfig::default();
        let store = DocStore::new(tmp.path(), &config);
        let mut repo = RepoConfig::named("server_commons");
        repo.source_root = tmp.path().join("missing");
        let source = SourceRepository::new(repo, &config.code_extensions);

        let count = generate_openapi(&store, &source, Some("abcdef1")).unwrap();
        assert_eq!(count, 0);

        let doc: Value = read_json(&store.openapi_path("server_commons")).unwrap();
        assert_eq!(doc["info"]["version"], "abcdef1");
        assert!(doc["paths"].as_object().unwrap().is_empty());
    }
}
