//! Knowledge-base configuration (`kb.toml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file at the knowledge-base root
pub const CONFIG_FILE: &str = "kb.toml";

/// Configuration for a knowledge base and the repositories it documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbConfig {
    /// Directory holding one subdirectory per documented repository
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,

    /// Directory holding operator-authored override patches
    #[serde(default = "default_overrides_dir")]
    pub overrides_dir: PathBuf,

    /// Directory with replacement schema files (built-ins are used otherwise)
    #[serde(default)]
    pub schemas_dir: Option<PathBuf>,

    /// Output path of the static search index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// File extensions treated as code
    #[serde(default = "default_code_extensions")]
    pub code_extensions: Vec<String>,

    /// Repositories to document
    #[serde(default)]
    pub repos: Vec<RepoConfig>,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub validate: ValidateConfig,

    #[serde(default)]
    pub lock: LockConfig,
}

/// A documented source repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Checkout of the source repository
    #[serde(default)]
    pub source_root: PathBuf,

    /// Subdirectory of `source_root` that is scanned
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    #[serde(default)]
    pub github_url: String,

    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default = "default_framework_tags")]
    pub framework_tags: Vec<String>,
}

/// Query engine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

/// Validation report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Number of violations printed before the report is truncated
    #[serde(default = "default_max_reported")]
    pub max_reported: usize,
}

/// Run-lock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Age after which an existing lock file is considered abandoned
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("repos")
}

fn default_overrides_dir() -> PathBuf {
    PathBuf::from("overrides")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("public").join("search-index.json")
}

fn default_code_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx", "vue"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_source_dir() -> String {
    "src".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_framework_tags() -> Vec<String> {
    vec!["node".to_string(), "typescript".to_string()]
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_max_reported() -> usize {
    200
}

fn default_stale_after_secs() -> u64 {
    3600
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            repos_dir: default_repos_dir(),
            overrides_dir: default_overrides_dir(),
            schemas_dir: None,
            index_path: default_index_path(),
            code_extensions: default_code_extensions(),
            repos: Vec::new(),
            search: SearchConfig::default(),
            validate: ValidateConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            max_reported: default_max_reported(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl RepoConfig {
    /// Minimal configuration for a repository known only by name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            description: String::new(),
            source_root: PathBuf::new(),
            source_dir: default_source_dir(),
            github_url: String::new(),
            default_branch: default_branch(),
            framework_tags: default_framework_tags(),
        }
    }

    /// Directory that is walked for code files
    pub fn scan_root(&self) -> PathBuf {
        if self.source_dir.is_empty() || self.source_dir == "." {
            self.source_root.clone()
        } else {
            self.source_root.join(&self.source_dir)
        }
    }
}

impl KbConfig {
    /// Load configuration from `path`, or return defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: KbConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Find a repository by name, falling back to a bare default entry
    pub fn repo(&self, name: &str) -> RepoConfig {
        self.repos
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .unwrap_or_else(|| RepoConfig::named(name))
    }
}
