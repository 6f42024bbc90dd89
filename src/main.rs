//! nxkb - Knowledge-base build and validation pipeline
//!
//! Generates structured docs from source repositories, merges operator
//! overrides, validates the result and builds a search index.

use anyhow::Result;
use nxkb::cli::{
    apply, generate, index, init, openapi, run, search_command, security_scan, status,
    validate, verify_dispatch, Cli, Commands, Workspace,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config_path();

    if let Commands::Init(args) = &cli.command {
        return init(&cli.root, &config_path, args.force, &args.repos);
    }
    if let Commands::VerifyDispatch(args) = &cli.command {
        return verify_dispatch(args);
    }

    let ws = Workspace::open(&cli.root, &config_path)?;

    // Execute command
    match &cli.command {
        Commands::Init(_) | Commands::VerifyDispatch(_) => Ok(()),
        Commands::Generate(args) => generate(&ws, args),
        Commands::Openapi(args) => openapi(&ws, args),
        Commands::Apply(args) => apply(&ws, args.repo.as_deref()),
        Commands::Validate(args) => validate(&ws, args, cli.format),
        Commands::SecurityScan => security_scan(&ws, cli.format),
        Commands::Index(args) => index(&ws, args.output.as_deref()),
        Commands::Search(args) => search_command(&ws, args, cli.format),
        Commands::Status(args) => status(&ws, args.repo.as_deref(), cli.format),
        Commands::Run(args) => run(&ws, args, cli.format),
    }
}
