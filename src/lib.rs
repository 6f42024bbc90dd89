//! nxkb - Knowledge-base build and validation pipeline
//!
//! This library turns JavaScript/TypeScript source repositories into a
//! browsable JSON knowledge base: it extracts draft file docs, merges
//! operator overrides, validates the result and serves ranked search.

pub mod cli;
pub mod doc;
pub mod extract;
pub mod merge;
pub mod repo;
pub mod search;
pub mod storage;
pub mod validate;

/// Re-export commonly used types
pub use doc::{FileDoc, Symbol, SymbolKind};
pub use extract::{CodeExtractor, Extractor};
pub use repo::{KbConfig, SourceRepository};
pub use storage::DocStore;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "nxkb";
