//! Search configuration
//!
//! All settings have defaults matching the public libc database mirrors, so a
//! configuration file only needs to list what it overrides.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Base URL of the libc.blukat.me web frontend
pub const BLUKAT_BASE_URL: &str = "https://libc.blukat.me/";

/// Base URL of the libc.rip API
pub const RIP_BASE_URL: &str = "https://libc.rip/";

/// Timeout for the backend reachability probe
const PROBE_TIMEOUT_MS: u64 = 2000;

/// Timeout for every other request
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of concurrent symbol table fetches or downloads
const MAX_WORKERS: usize = 10;

/// Protocol family spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Query-string search, candidates scraped from the HTML result page
    Blukat,
    /// JSON API returning symbol table URLs
    Rip,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Blukat => write!(f, "blukat"),
            BackendKind::Rip => write!(f, "rip"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blukat" => Ok(BackendKind::Blukat),
            "rip" => Ok(BackendKind::Rip),
            other => Err(SearchError::Config(format!(
                "unknown backend kind {:?} (expected blukat or rip)",
                other
            ))),
        }
    }
}

/// One candidate backend, probed in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub kind: BackendKind,
    pub base_url: String,
}

impl BackendEndpoint {
    pub fn new(kind: BackendKind, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { kind, base_url }
    }
}

impl FromStr for BackendEndpoint {
    type Err = SearchError;

    /// Parse `KIND=URL`, e.g. `rip=https://libc.rip/`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, url) = s.split_once('=').ok_or_else(|| {
            SearchError::Config(format!("expected KIND=URL for backend, got {:?}", s))
        })?;
        if url.trim().is_empty() {
            return Err(SearchError::Config(format!("empty URL for backend {:?}", s)));
        }
        Ok(Self::new(kind.parse()?, url.trim()))
    }
}

/// Which verification results count as duplicates of one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// Identical offset maps collapse, whatever the library names
    Offsets,
    /// Library name and offset map must both match
    #[default]
    IdentifierAndOffsets,
}

/// Configuration for a libc search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Backends in probe order
    pub backends: Vec<BackendEndpoint>,
    /// Reachability probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Timeout applied to every other request, in seconds
    pub request_timeout_secs: u64,
    /// Worker cap for verification and downloads
    pub max_workers: usize,
    /// User agent string
    pub user_agent: String,
    /// Duplicate detection rule
    pub dedup: DedupKey,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendEndpoint::new(BackendKind::Blukat, BLUKAT_BASE_URL),
                BackendEndpoint::new(BackendKind::Rip, RIP_BASE_URL),
            ],
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_workers: MAX_WORKERS,
            user_agent: format!("libcsearch/{}", env!("CARGO_PKG_VERSION")),
            dedup: DedupKey::default(),
        }
    }
}

impl SearchConfig {
    /// Load a JSON configuration file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, SearchError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SearchError> {
        let mut config: SearchConfig =
            serde_json::from_str(text).map_err(|e| SearchError::Config(e.to_string()))?;
        config.backends = config
            .backends
            .into_iter()
            .map(|b| BackendEndpoint::new(b.kind, b.base_url))
            .collect();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.backends.is_empty() {
            return Err(SearchError::Config("no backends configured".to_string()));
        }
        if self.max_workers == 0 {
            return Err(SearchError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
