//! Command implementations

use super::{OutputFormat, SearchArgs, SourceArgs, ValidateArgs, VerifyDispatchArgs};
use crate::doc::{Manifest, OrphanReport, SymbolKind};
use crate::extract::{
    generate_openapi, generate_repo, CodeExtractor, GenerateOptions, GenerationReport,
};
use crate::merge::apply_overrides;
use crate::repo::{
    verify_signature, DispatchError, DispatchPayload, KbConfig, RepoConfig, SourceRepository,
};
use crate::search::{build_index, search, SearchOptions};
use crate::storage::{list_json_files, read_json_opt, DocStore, RepoLock};
use crate::validate::{validate_all, SecurityScanner, Validator};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A loaded knowledge base: root, configuration and store
pub struct Workspace {
    pub root: PathBuf,
    pub config: KbConfig,
    pub store: DocStore,
}

impl Workspace {
    /// Open the knowledge base at `root`, reading `config_path` if it exists
    pub fn open(root: &Path, config_path: &Path) -> Result<Self> {
        let config = KbConfig::load_or_default(config_path)?;
        let store = DocStore::new(root, &config);
        debug!("opened knowledge base at {:?}", root);

        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
        })
    }

    /// Repository names in scope: the selected one, else configured and stored ones
    pub fn repo_names(&self, selected: Option<&str>) -> Vec<String> {
        if let Some(name) = selected {
            return vec![name.to_string()];
        }

        let mut names: Vec<String> = self.config.repos.iter().map(|r| r.name.clone()).collect();
        names.extend(self.store.list_repos());
        names.sort();
        names.dedup();
        names
    }

    /// Source repository for `name` with its source root resolved against the KB root.
    ///
    /// `None` when the repository is not configured or has no `source_root`.
    pub fn source(&self, name: &str) -> Option<SourceRepository> {
        let config = self.config.repos.iter().find(|r| r.name == name)?;
        if config.source_root.as_os_str().is_empty() {
            return None;
        }
        let root = self.root.join(&config.source_root);
        Some(self.source_at(name, root))
    }

    /// Source repository for `name` read from an explicit checkout
    pub fn source_at(&self, name: &str, checkout: PathBuf) -> SourceRepository {
        let mut config = self.config.repo(name);
        config.source_root = checkout;
        SourceRepository::new(config, &self.config.code_extensions)
    }

    fn lock(&self, repo: &str) -> Result<RepoLock> {
        RepoLock::acquire(&self.store.meta_dir(repo), self.config.lock.stale_after_secs)
            .with_context(|| format!("Failed to lock repository {}", repo))
    }

    fn index_path(&self, output: Option<&Path>) -> PathBuf {
        match output {
            Some(path) => path.to_path_buf(),
            None => self.root.join(&self.config.index_path),
        }
    }
}

/// Source selection for generate/openapi/run, merged from flags and payload
struct SourceRun {
    repos: Vec<String>,
    options: GenerateOptions,
    source_path: Option<PathBuf>,
    github_url: Option<String>,
}

impl SourceRun {
    fn resolve(ws: &Workspace, args: &SourceArgs) -> Result<Self> {
        let payload = match &args.payload {
            Some(path) => Some(DispatchPayload::load(path)?),
            None => None,
        };

        let repo = args
            .repo
            .clone()
            .or_else(|| payload.as_ref().and_then(|p| p.repo_name.clone()));
        let repos = match repo {
            Some(name) => vec![name],
            None => ws.config.repos.iter().map(|r| r.name.clone()).collect(),
        };
        if repos.is_empty() {
            anyhow::bail!("No repositories configured. Pass --repo or add [[repos]] to kb.toml.");
        }
        if args.source_path.is_some() && repos.len() > 1 {
            anyhow::bail!("--source-path requires a single repository (use --repo)");
        }

        let options = GenerateOptions {
            commit_sha: args
                .commit_sha
                .clone()
                .or_else(|| payload.as_ref().and_then(|p| p.commit_sha.clone())),
            branch: args
                .branch
                .clone()
                .or_else(|| payload.as_ref().and_then(|p| p.branch.clone())),
            changed_files: payload
                .as_ref()
                .map(|p| p.changed_files.clone())
                .filter(|files| !files.is_empty()),
        };

        Ok(Self {
            repos,
            options,
            source_path: args.source_path.clone(),
            github_url: args.github_url.clone(),
        })
    }

    fn source(&self, ws: &Workspace, name: &str) -> Result<SourceRepository> {
        let source = match &self.source_path {
            Some(path) => ws.source_at(name, path.clone()),
            None => ws.source(name).with_context(|| {
                format!(
                    "No source_root configured for {}. Pass --source-path or set it in kb.toml.",
                    name
                )
            })?,
        };

        let mut config: RepoConfig = source.config().clone();
        if let Some(url) = &self.github_url {
            config.github_url = url.clone();
        }
        Ok(SourceRepository::new(config, &ws.config.code_extensions))
    }
}

/// Create kb.toml and the directory skeleton
pub fn init(root: &Path, config_path: &Path, force: bool, repos: &[String]) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!("Knowledge base already initialized. Use --force to re-initialize.");
    }

    let mut config = KbConfig::default();
    config.repos = repos.iter().map(|name| RepoConfig::named(name)).collect();
    config.save(config_path)?;

    let store = DocStore::new(root, &config);
    for repo in repos {
        store.ensure_scaffold(repo)?;
        std::fs::create_dir_all(store.overrides_dir(repo))
            .with_context(|| format!("Failed to create overrides for {}", repo))?;
    }

    println!("✓ Initialized knowledge base in {:?}", root);
    println!("  Config: {:?}", config_path);
    for repo in repos {
        println!("  Repository: {}", repo);
    }

    Ok(())
}

/// Generate draft docs
pub fn generate(ws: &Workspace, args: &SourceArgs) -> Result<()> {
    let run = SourceRun::resolve(ws, args)?;
    let extractor = CodeExtractor::new()?;

    for repo in &run.repos {
        let _lock = ws.lock(repo)?;
        let report = generate_repo(&ws.store, &run.source(ws, repo)?, &extractor, &run.options)?;

        println!(
            "✓ Generated {} docs for {} at {}",
            report.written.len(),
            repo,
            report.commit_sha
        );
        if !report.skipped.is_empty() {
            println!("  Skipped: {}", report.skipped.len());
        }
        report_collisions(&report);
    }

    Ok(())
}

fn report_collisions(report: &GenerationReport) {
    for (written, dropped) in &report.collisions {
        eprintln!("  Warning: {} shares a doc path with {}, not documented", dropped, written);
    }
}

/// Generate OpenAPI documents
pub fn openapi(ws: &Workspace, args: &SourceArgs) -> Result<()> {
    let run = SourceRun::resolve(ws, args)?;

    for repo in &run.repos {
        let _lock = ws.lock(repo)?;
        let count = generate_openapi(
            &ws.store,
            &run.source(ws, repo)?,
            run.options.commit_sha.as_deref(),
        )?;
        println!("✓ Generated openapi for {} with {} endpoints", repo, count);
    }

    Ok(())
}

/// Apply overrides
pub fn apply(ws: &Workspace, repo: Option<&str>) -> Result<()> {
    for repo in ws.repo_names(repo) {
        let _lock = ws.lock(&repo)?;
        apply_repo(ws, &repo)?;
    }
    Ok(())
}

fn apply_repo(ws: &Workspace, repo: &str) -> Result<()> {
    let report = apply_overrides(&ws.store, repo)?;

    println!(
        "✓ Applied overrides for {}: {} materialized, {} patched",
        repo, report.materialized, report.patched
    );
    for orphan in &report.orphans {
        println!("  Orphan override: {}", orphan);
    }
    for error in &report.errors {
        eprintln!("  Warning: {}", error);
    }
    Ok(())
}

/// Validate docs; fails when any violation is found
pub fn validate(ws: &Workspace, args: &ValidateArgs, format: OutputFormat) -> Result<()> {
    let names = ws.repo_names(args.repo.as_deref());
    if args.source_path.is_some() && names.len() > 1 {
        anyhow::bail!("--source-path requires a single repository (use --repo)");
    }

    let repos = names
        .into_iter()
        .map(|name| {
            let source = match &args.source_path {
                Some(path) => Some(ws.source_at(&name, path.clone())),
                None => ws.source(&name),
            };
            (name, source)
        })
        .collect();

    validate_sources(ws, repos, format)
}

fn validate_sources(
    ws: &Workspace,
    repos: Vec<(String, Option<SourceRepository>)>,
    format: OutputFormat,
) -> Result<()> {
    let schemas_dir = ws.config.schemas_dir.as_ref().map(|dir| ws.root.join(dir));
    let validator = Validator::load(schemas_dir.as_deref())?;

    for (name, source) in &repos {
        if source.is_none() {
            debug!("no source checkout for {}, skipping mirror check", name);
        }
    }

    let report = validate_all(&validator, &ws.store, &repos)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            if report.is_ok() {
                println!("✓ Validation passed ({} files)", report.files_checked);
            } else {
                eprintln!("Validation failed:");
                for violation in report.reported(ws.config.validate.max_reported) {
                    eprintln!(" - {}", violation);
                }
                let hidden = report
                    .violations
                    .len()
                    .saturating_sub(ws.config.validate.max_reported);
                if hidden > 0 {
                    eprintln!(" ... and {} more", hidden);
                }
            }
        }
    }

    if !report.is_ok() {
        anyhow::bail!("validation failed with {} violations", report.violations.len());
    }
    Ok(())
}

/// Scan every generated JSON file; fails on any finding
pub fn security_scan(ws: &Workspace, format: OutputFormat) -> Result<()> {
    let findings = SecurityScanner::new()?.scan_tree(ws.store.repos_root());

    match format {
        OutputFormat::Json => {
            let rendered: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        OutputFormat::Text => {
            if findings.is_empty() {
                println!("✓ Security scan passed");
            } else {
                eprintln!("Security scan failed:");
                for finding in &findings {
                    eprintln!(" - {}", finding);
                }
            }
        }
    }

    if !findings.is_empty() {
        anyhow::bail!("security scan failed with {} findings", findings.len());
    }
    Ok(())
}

/// Build and write the search index
pub fn index(ws: &Workspace, output: Option<&Path>) -> Result<()> {
    let repos = ws.store.list_repos();
    let index = build_index(&ws.store, &repos);
    let path = ws.index_path(output);
    index.write(&path)?;

    println!(
        "✓ Built search index with {} entries at {:?}",
        index.entries.len(),
        path
    );
    Ok(())
}

/// Run a search query
pub fn search_command(ws: &Workspace, args: &SearchArgs, format: OutputFormat) -> Result<()> {
    let kind = match &args.kind {
        Some(k) => Some(
            SymbolKind::from_query_prefix(k)
                .ok_or_else(|| anyhow::anyhow!("Unknown symbol kind: {}", k))?,
        ),
        None => None,
    };

    let options = SearchOptions {
        query: args.query.clone(),
        repo: args.repo.clone(),
        kind,
        limit: args.limit,
        offset: args.offset,
    };
    let response = search(&ws.store, &ws.config.search, &options);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => {
            if response.results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for result in &response.results {
                println!(
                    "{:>5.1}  {}/{}  {}",
                    result.score, result.repo, result.file_path, result.match_field
                );
                if !result.match_text.is_empty() {
                    println!("       {}", result.match_text);
                }
                println!("       {}", result.link);
            }
            println!(
                "\n{} of {} results",
                response.results.len(),
                response.total
            );
        }
    }

    Ok(())
}

/// Per-repository state shown by `status`
#[derive(Debug, Serialize)]
pub struct RepoStatus {
    pub name: String,
    pub docs: usize,
    pub materialized: usize,
    pub overrides: usize,
    pub orphan_overrides: usize,
    pub has_openapi: bool,
    pub locked: bool,
    pub manifest: Option<Manifest>,
}

fn repo_status(ws: &Workspace, repo: &str) -> RepoStatus {
    let store = &ws.store;
    let orphans: Option<OrphanReport> = read_json_opt(&store.orphan_report_path(repo));

    RepoStatus {
        name: repo.to_string(),
        docs: list_json_files(&store.docs_dir(repo)).len(),
        materialized: list_json_files(&store.materialized_dir(repo)).len(),
        overrides: list_json_files(&store.overrides_dir(repo)).len(),
        orphan_overrides: orphans.map(|r| r.orphan_overrides.len()).unwrap_or(0),
        has_openapi: store.openapi_path(repo).is_file(),
        locked: store.meta_dir(repo).join(".lock").exists(),
        manifest: read_json_opt(&store.manifest_path(repo)),
    }
}

/// Show per-repository state
pub fn status(ws: &Workspace, repo: Option<&str>, format: OutputFormat) -> Result<()> {
    let statuses: Vec<RepoStatus> = ws
        .repo_names(repo)
        .iter()
        .map(|name| repo_status(ws, name))
        .collect();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("Knowledge Base Status");
    println!("=====================\n");
    println!("Root: {:?}", ws.root);

    if statuses.is_empty() {
        println!("\nNo repositories. Run 'nxkb init --repo <name>' first.");
        return Ok(());
    }

    for status in &statuses {
        println!("\n{}", status.name);
        println!("  Docs: {}", status.docs);
        println!("  Materialized: {}", status.materialized);
        println!(
            "  Overrides: {} ({} orphaned)",
            status.overrides, status.orphan_overrides
        );
        println!("  OpenAPI: {}", if status.has_openapi { "yes" } else { "missing" });
        if let Some(manifest) = &status.manifest {
            println!(
                "  Last generated: {} at {} ({})",
                manifest.generated_at_iso, manifest.source_commit_sha, manifest.source_branch
            );
        }
        if status.locked {
            println!("  Locked: a run is in progress");
        }
    }

    Ok(())
}

/// Verify a dispatch payload signature
pub fn verify_dispatch(args: &VerifyDispatchArgs) -> Result<()> {
    let signature = args
        .signature
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(DispatchError::MissingSignature)?;
    let secret = args
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(DispatchError::MissingSecret)?;

    let payload = std::fs::read(&args.payload)
        .with_context(|| format!("Failed to read payload: {:?}", args.payload))?;
    verify_signature(&payload, secret, signature)?;

    println!("✓ Dispatch signature verified");
    Ok(())
}

/// Run the full pipeline
pub fn run(ws: &Workspace, args: &SourceArgs, format: OutputFormat) -> Result<()> {
    let run = SourceRun::resolve(ws, args)?;
    let extractor = CodeExtractor::new()?;

    for repo in &run.repos {
        info!("pipeline: {}", repo);
        let _lock = ws.lock(repo)?;
        let source = run.source(ws, repo)?;

        let report = generate_repo(&ws.store, &source, &extractor, &run.options)?;
        println!(
            "✓ Generated {} docs for {} at {}",
            report.written.len(),
            repo,
            report.commit_sha
        );
        report_collisions(&report);

        let endpoints = generate_openapi(&ws.store, &source, run.options.commit_sha.as_deref())?;
        println!("✓ Generated openapi for {} with {} endpoints", repo, endpoints);

        apply_repo(ws, repo)?;
    }

    let scope = match run.repos.as_slice() {
        [only] => vec![only.clone()],
        _ => ws.repo_names(None),
    };
    let mut repos = Vec::with_capacity(scope.len());
    for name in scope {
        let source = if run.repos.contains(&name) {
            Some(run.source(ws, &name)?)
        } else {
            ws.source(&name)
        };
        repos.push((name, source));
    }
    validate_sources(ws, repos, format)?;
    security_scan(ws, format)?;
    index(ws, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_repo_names_merge_config_and_store() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("kb.toml");
        init(tmp.path(), &config_path, false, &["b".to_string()]).unwrap();
        std::fs::create_dir_all(tmp.path().join("repos/a")).unwrap();

        let ws = Workspace::open(tmp.path(), &config_path).unwrap();
        assert_eq!(ws.repo_names(None), vec!["a", "b"]);
        assert_eq!(ws.repo_names(Some("z")), vec!["z"]);
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("kb.toml");
        init(tmp.path(), &config_path, false, &[]).unwrap();
        assert!(init(tmp.path(), &config_path, false, &[]).is_err());
        assert!(init(tmp.path(), &config_path, true, &[]).is_ok());
    }

    #[test]
    fn test_source_root_resolved_against_kb_root() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("kb.toml");
        let mut config = KbConfig::default();
        let mut repo = RepoConfig::named("r");
        repo.source_root = PathBuf::from("../source");
        config.repos.push(repo);
        config.save(&config_path).unwrap();

        let ws = Workspace::open(tmp.path(), &config_path).unwrap();
        assert_eq!(ws.source("r").unwrap().root(), tmp.path().join("../source"));
    }

    #[test]
    fn test_unset_source_root_has_no_source() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("kb.toml");
        init(tmp.path(), &config_path, false, &["r".to_string()]).unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();

        let ws = Workspace::open(tmp.path(), &config_path).unwrap();
        assert!(ws.source("r").is_none());
        assert!(ws.source("unknown").is_none());

        let checkout = tmp.path().join("checkout");
        assert_eq!(ws.source_at("r", checkout.clone()).root(), checkout);
    }
}
