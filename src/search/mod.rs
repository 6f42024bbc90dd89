//! Search over the knowledge base
//!
//! - `index`: static index file for client-side search
//! - `query`: ranked full-text query over served docs

pub mod index;
pub mod query;

pub use index::{build_index, doc_entries, EntryKind, SearchIndex, SearchIndexEntry};
pub use query::{
    parse_query, score_match, search, MatchType, ParsedQuery, SearchOptions, SearchResponse,
    SearchResult,
};
