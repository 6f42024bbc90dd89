//! CLI interface using clap
//!
//! Provides the command-line interface for nxkb

mod commands;

pub use commands::*;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// nxkb - Build, validate and search a knowledge base generated from source
#[derive(Parser, Debug)]
#[command(name = "nxkb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Knowledge-base root (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file (defaults to <root>/kb.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create kb.toml and the directory skeleton
    Init(InitArgs),

    /// Generate draft docs from source
    Generate(SourceArgs),

    /// Generate the OpenAPI document from route declarations
    Openapi(SourceArgs),

    /// Apply overrides and write materialized docs
    Apply(RepoArgs),

    /// Validate docs, OpenAPI documents and mirror consistency
    Validate(ValidateArgs),

    /// Scan generated JSON for leaked credentials
    SecurityScan,

    /// Build the static search index
    Index(IndexArgs),

    /// Search the knowledge base
    Search(SearchArgs),

    /// Show per-repository state
    Status(RepoArgs),

    /// Verify the HMAC signature of a dispatch payload
    VerifyDispatch(VerifyDispatchArgs),

    /// Run the whole pipeline: generate, openapi, apply, validate, scan, index
    Run(SourceArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Repositories to register
    #[arg(long = "repo")]
    pub repos: Vec<String>,
}

/// Repository selection
#[derive(Args, Debug)]
pub struct RepoArgs {
    /// Restrict to one repository (defaults to all)
    #[arg(long)]
    pub repo: Option<String>,
}

/// Arguments for validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Restrict to one repository (defaults to all)
    #[arg(long)]
    pub repo: Option<String>,

    /// Source checkout to check mirror consistency against
    #[arg(long, env = "SOURCE_REPO_PATH")]
    pub source_path: Option<PathBuf>,
}

/// Arguments for commands that read a source checkout
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Repository to process (defaults to the payload's, then all configured)
    #[arg(long)]
    pub repo: Option<String>,

    /// Dispatch payload JSON (repo_name, commit_sha, branch, changed_files)
    #[arg(long)]
    pub payload: Option<PathBuf>,

    /// Source checkout path, overriding the configured source_root
    #[arg(long, env = "SOURCE_REPO_PATH")]
    pub source_path: Option<PathBuf>,

    /// Commit sha stamped on generated docs
    #[arg(long, env = "SOURCE_COMMIT_SHA")]
    pub commit_sha: Option<String>,

    /// Branch recorded in generated docs
    #[arg(long, env = "SOURCE_DEFAULT_BRANCH")]
    pub branch: Option<String>,

    /// GitHub URL used for permalinks
    #[arg(long, env = "SOURCE_REPO_GITHUB_URL")]
    pub github_url: Option<String>,
}

/// Arguments for index command
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Output file (defaults to the configured index_path)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Arguments for search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text, optionally prefixed with a kind (e.g. "component:Button")
    pub query: String,

    /// Restrict to one repository
    #[arg(long)]
    pub repo: Option<String>,

    /// Only symbol/export matches of this kind
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Maximum results (capped by search.max_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Results to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

/// Arguments for verify-dispatch command
#[derive(Args, Debug)]
pub struct VerifyDispatchArgs {
    /// Payload file exactly as signed
    #[arg(long)]
    pub payload: PathBuf,

    /// Hex HMAC-SHA256 signature
    #[arg(long, env = "DISPATCH_SIGNATURE", hide_env_values = true)]
    pub signature: Option<String>,

    /// Shared secret
    #[arg(long, env = "DISPATCH_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Configuration file path
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root.join(crate::repo::CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["nxkb", "generate", "--repo", "client_commons"]);
        if let Commands::Generate(args) = cli.command {
            assert_eq!(args.repo.as_deref(), Some("client_commons"));
        } else {
            panic!("expected generate");
        }
    }

    #[test]
    fn test_search_command() {
        let cli = Cli::parse_from([
            "nxkb", "search", "component:Button", "--limit", "5", "-o", "json",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        if let Commands::Search(args) = cli.command {
            assert_eq!(args.query, "component:Button");
            assert_eq!(args.limit, Some(5));
            assert_eq!(args.offset, 0);
        } else {
            panic!("expected search");
        }
    }

    #[test]
    fn test_validate_source_path() {
        let cli = Cli::parse_from([
            "nxkb", "validate", "--repo", "r", "--source-path", "/src/checkout",
        ]);
        if let Commands::Validate(args) = cli.command {
            assert_eq!(args.repo.as_deref(), Some("r"));
            assert_eq!(args.source_path, Some(PathBuf::from("/src/checkout")));
        } else {
            panic!("expected validate");
        }
    }

    #[test]
    fn test_init_repos() {
        let cli = Cli::parse_from(["nxkb", "init", "--repo", "a", "--repo", "b"]);
        if let Commands::Init(args) = cli.command {
            assert_eq!(args.repos, vec!["a", "b"]);
        }
    }

    #[test]
    fn test_config_path_default() {
        let cli = Cli::parse_from(["nxkb", "--root", "/kb", "status"]);
        assert_eq!(cli.config_path(), PathBuf::from("/kb/kb.toml"));
    }
}
