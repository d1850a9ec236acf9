//! Libc database interaction module
//!
//! This module resolves symbol/address constraints to concrete libc builds
//! using the libc.blukat.me and libc.rip databases, and downloads the
//! matching shared objects.

pub mod backend;
pub mod catalog;
pub mod download;
pub mod search;
pub mod symbols;
pub mod verify;

pub use backend::{select_backend, Backend, Candidate};
pub use catalog::{LibraryCatalog, ResolvedLibrary};
pub use download::DownloadReport;
pub use search::LibcSearch;
pub use symbols::{canonical_symbol, ConstraintSet, SymbolConstraint};

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::transport::ReqwestTransport;

/// Probe the configured backends and return the one a search would use
pub async fn test_api_connection(config: &SearchConfig) -> Result<Backend, SearchError> {
    config.validate()?;
    let transport =
        ReqwestTransport::new(config).map_err(|e| SearchError::Config(e.to_string()))?;
    select_backend(&transport, &config.backends, config.probe_timeout()).await
}
