//! Heuristic extraction from JavaScript/TypeScript source
//!
//! Recognizes:
//! - `import ... from "<specifier>"` statements (possibly multi-line)
//! - Exported declarations: function, const, class, interface, type, enum
//!
//! This is a line-oriented regex scan, not a parser. Anything it does not
//! recognize is ignored, so malformed source yields an empty doc body.

use super::{DraftContext, Extractor};
use crate::doc::{
    CodeExample, ConfidenceLevel, DependencyKind, ExternalDependency, FileDependencies, FileDoc,
    FileExport, FileSummary, IncorrectExample, InternalDependency, Language, Quality, RepoRef,
    SourceMetadata, Symbol, SymbolDetails, SymbolExamples, SymbolKind, SymbolLocation,
    SCHEMA_VERSION,
};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

/// An exported declaration found in source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub symbol_id: String,
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line number
    pub line: usize,
}

/// Regex-based extractor for the JS/TS family
pub struct CodeExtractor {
    import_re: Regex,
    export_re: Regex,
}

impl CodeExtractor {
    /// Create a new code extractor
    pub fn new() -> Result<Self> {
        let import_re = Regex::new(r#"(?s)\bimport\b.*?\bfrom\s+["']([^"']+)["']"#)
            .context("Failed to compile import pattern")?;
        let export_re = Regex::new(
            r"\bexport\s+(?:default\s+)?(?:declare\s+)?(?:async\s+)?(?P<kw>function\s*\*?|(?:const\s+)?enum|const|(?:abstract\s+)?class|interface|type)\s+(?P<name>[A-Za-z0-9_$]+)",
        )
        .context("Failed to compile export pattern")?;

        Ok(Self {
            import_re,
            export_re,
        })
    }

    /// Module specifiers of all `import ... from` statements, in order, without duplicates
    pub fn parse_imports(&self, content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.import_re
            .captures_iter(content)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .filter(|specifier| seen.insert(specifier.clone()))
            .collect()
    }

    /// Exported declarations, one per matching line.
    ///
    /// The symbol id is the declared name. A name declared twice in the same
    /// file keeps the bare id on its first declaration; later ones are
    /// qualified as `{name}_{kind}_L{line}` so ids stay unique.
    pub fn parse_declarations(&self, content: &str) -> Vec<Declaration> {
        let mut used = HashSet::new();
        let mut declarations = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let Some(caps) = self.export_re.captures(line) else {
                continue;
            };

            let name = caps["name"].to_string();
            let kind = kind_for_keyword(&caps["kw"]);
            let line_no = index + 1;

            let symbol_id = if used.contains(&name) {
                format!("{}_{}_L{}", name, kind, line_no)
            } else {
                name.clone()
            };
            used.insert(symbol_id.clone());

            declarations.push(Declaration {
                symbol_id,
                name,
                kind,
                line: line_no,
            });
        }

        declarations
    }
}

impl Extractor for CodeExtractor {
    fn extract(&self, ctx: &DraftContext<'_>, source_path: &str, content: &str) -> FileDoc {
        let file_name = Path::new(source_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source_path.to_string());
        let language = Path::new(source_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or_default();

        let github_path = ctx.github_link(source_path);
        let nx_path = ctx.nx_link(source_path);

        let (internal, external): (Vec<String>, Vec<String>) = self
            .parse_imports(content)
            .into_iter()
            .partition(|specifier| specifier.starts_with('.'));

        let internal = internal
            .into_iter()
            .map(|import_path| {
                let resolved = resolve_internal_path(source_path, &import_path);
                InternalDependency {
                    link_to_nx_kb: ctx.nx_link(&resolved),
                    link_to_github: ctx.github_link(&resolved),
                    resolved_file_path: resolved,
                    import_path,
                    why_used: "Imported from a local module to compose this file.".to_string(),
                }
            })
            .collect();

        let external = external
            .into_iter()
            .map(|name| ExternalDependency {
                name,
                kind: DependencyKind::Runtime,
                why_used: "Imported package used by this module.".to_string(),
            })
            .collect();

        let symbols: Vec<Symbol> = self
            .parse_declarations(content)
            .into_iter()
            .map(|decl| draft_symbol(decl, &github_path))
            .collect();

        let exports = symbols
            .iter()
            .map(|symbol| FileExport {
                name: symbol.name.clone(),
                kind: symbol.kind,
                description_one_line: symbol.description_one_line.clone(),
                symbol_id: symbol.symbol_id.clone(),
            })
            .collect();

        FileDoc {
            schema_version: SCHEMA_VERSION.to_string(),
            doc_id: format!("{}:{}", ctx.repo, source_path),
            repo: RepoRef {
                name: ctx.repo.to_string(),
                source_default_branch: ctx.default_branch.to_string(),
            },
            file_name,
            source: SourceMetadata {
                file_path: source_path.to_string(),
                commit_sha: ctx.commit_sha.to_string(),
                generated_at_iso: ctx.generated_at_iso.clone(),
                language,
                framework_tags: ctx.framework_tags.to_vec(),
                link_to_github: github_path,
                link_to_nx_kb: nx_path,
            },
            summary: FileSummary {
                purpose: format!("Documentation for {}.", source_path),
                problem_solved:
                    "Describes how this file contributes to its repository module architecture."
                        .to_string(),
            },
            dependencies: FileDependencies { external, internal },
            exports,
            symbols,
            swagger: None,
            quality: Quality {
                generation_confidence: ConfidenceLevel::Medium,
                known_gaps: Some(vec![
                    "Descriptions are generated heuristically and should be reviewed in PR."
                        .to_string(),
                ]),
                last_reviewed_by: None,
                last_reviewed_at_iso: None,
            },
        }
    }
}

fn kind_for_keyword(keyword: &str) -> SymbolKind {
    if keyword.starts_with("function") {
        SymbolKind::Function
    } else if keyword.ends_with("class") {
        SymbolKind::Class
    } else if keyword.ends_with("enum") {
        SymbolKind::Enum
    } else if keyword == "interface" {
        SymbolKind::Interface
    } else if keyword == "type" {
        SymbolKind::Type
    } else {
        SymbolKind::Constant
    }
}

fn draft_symbol(decl: Declaration, github_path: &str) -> Symbol {
    let name = decl.name;
    Symbol {
        description_one_line: format!("{} export in this file.", name),
        details: SymbolDetails {
            what_it_does: format!(
                "{} is exported from this module and participates in the module's contract.",
                name
            ),
            ..Default::default()
        },
        examples: Some(SymbolExamples {
            minimal_correct: Some(CodeExample {
                title: "Minimal usage".to_string(),
                code: format!("import {{ {} }} from \"module-path\";", name),
            }),
            extensive_correct: None,
            incorrect: Some(IncorrectExample {
                title: "Incorrect usage".to_string(),
                code: format!("import {{ Missing{} }} from \"module-path\";", name),
                why_incorrect: "The symbol name does not match the module export.".to_string(),
            }),
        }),
        locations: SymbolLocation {
            source_line_start: decl.line,
            source_line_end: decl.line,
            github_permalink: format!("{}#L{}", github_path, decl.line),
            nx_kb_anchor: format!("#{}", decl.symbol_id),
        },
        signature: None,
        symbol_id: decl.symbol_id,
        name,
        kind: decl.kind,
    }
}

/// Resolve a relative import specifier against the importing file's directory.
///
/// Both paths are project-relative with `/` separators; the result is
/// normalized lexically (no filesystem access). Climbing above the project
/// root keeps the leading `..` segments.
pub fn resolve_internal_path(source_path: &str, specifier: &str) -> String {
    let mut segments: Vec<&str> = source_path.split('/').collect();
    segments.pop();
    segments.retain(|s| !s.is_empty() && *s != ".");

    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DraftContext<'static> {
        DraftContext {
            repo: "client_commons",
            default_branch: "main",
            github_url: "https://github.com/acme/client",
            commit_sha: "abcdef1234",
            framework_tags: &[],
            generated_at_iso: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_extract_function_at_line() {
        let extractor = CodeExtractor::new().unwrap();
        let mut code = "\n".repeat(9);
        code.push_str("export function getUser(id) {\n  return db.get(id);\n}\n");

        let doc = extractor.extract(&ctx(), "users.ts", &code);

        assert_eq!(doc.symbols.len(), 1);
        let symbol = &doc.symbols[0];
        assert_eq!(symbol.name, "getUser");
        assert_eq!(symbol.kind, SymbolKind::Function);
        assert_eq!(symbol.locations.source_line_start, 10);
        assert_eq!(doc.exports.len(), 1);
        assert_eq!(doc.exports[0].symbol_id, "getUser");
        assert_eq!(doc.source.language, Language::Ts);
        assert_eq!(doc.doc_id, "client_commons:users.ts");
    }

    #[test]
    fn test_declaration_kinds() {
        let extractor = CodeExtractor::new().unwrap();
        let code = r#"
export async function load() {}
export const typeMap = {};
export default class Store {}
export abstract class Base {}
export interface Props {}
export type Id = string;
export enum Color { Red }
export const enum Flag { On }
function internal() {}
"#;

        let kinds: Vec<(String, SymbolKind)> = extractor
            .parse_declarations(code)
            .into_iter()
            .map(|d| (d.name, d.kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("load".to_string(), SymbolKind::Function),
                ("typeMap".to_string(), SymbolKind::Constant),
                ("Store".to_string(), SymbolKind::Class),
                ("Base".to_string(), SymbolKind::Class),
                ("Props".to_string(), SymbolKind::Interface),
                ("Id".to_string(), SymbolKind::Type),
                ("Color".to_string(), SymbolKind::Enum),
                ("Flag".to_string(), SymbolKind::Enum),
            ]
        );
    }

    #[test]
    fn test_duplicate_names_get_qualified_ids() {
        let extractor = CodeExtractor::new().unwrap();
        let code = "export function parse(a: string): A;\nexport function parse(a: number): B;\n";

        let decls = extractor.parse_declarations(code);
        assert_eq!(decls[0].symbol_id, "parse");
        assert_eq!(decls[1].symbol_id, "parse_function_L2");
    }

    #[test]
    fn test_imports_split_internal_external() {
        let extractor = CodeExtractor::new().unwrap();
        let code = r#"
import React from "react";
import {
    a,
    b,
} from './helpers';
import { c } from "../shared/c";
import { d } from "react";
"#;

        let doc = extractor.extract(&ctx(), "src/components/List.tsx", code);

        assert_eq!(doc.dependencies.external.len(), 1);
        assert_eq!(doc.dependencies.external[0].name, "react");

        let internal = &doc.dependencies.internal;
        assert_eq!(internal.len(), 2);
        assert_eq!(internal[0].resolved_file_path, "src/components/helpers");
        assert_eq!(internal[1].resolved_file_path, "src/shared/c");
        assert_eq!(
            internal[1].link_to_nx_kb,
            "/repos/client_commons/files/src/shared/c"
        );
        assert_eq!(
            internal[1].link_to_github,
            "https://github.com/acme/client/blob/abcdef1234/src/shared/c"
        );
    }

    #[test]
    fn test_malformed_source_degrades_to_empty() {
        let extractor = CodeExtractor::new().unwrap();
        let doc = extractor.extract(&ctx(), "src/x.js", "}}} export {{{ import from");

        assert!(doc.symbols.is_empty());
        assert!(doc.exports.is_empty());
        assert!(doc.dependencies.internal.is_empty());
    }

    #[test]
    fn test_resolve_internal_path() {
        assert_eq!(resolve_internal_path("src/a/b.ts", "./c"), "src/a/c");
        assert_eq!(resolve_internal_path("src/a/b.ts", "../../x/y"), "x/y");
        assert_eq!(resolve_internal_path("b.ts", "../up"), "../up");
        assert_eq!(resolve_internal_path("src/b.ts", "."), "src");
    }

    #[test]
    fn test_permalink_and_anchor() {
        let extractor = CodeExtractor::new().unwrap();
        let doc = extractor.extract(&ctx(), "src/a.ts", "export const LIMIT = 5;\n");

        let loc = &doc.symbols[0].locations;
        assert_eq!(
            loc.github_permalink,
            "https://github.com/acme/client/blob/abcdef1234/src/a.ts#L1"
        );
        assert_eq!(loc.nx_kb_anchor, "#LIMIT");
    }
}
