//! Backend selection and candidate resolution
//!
//! Two libc database frontends are supported. `libc.blukat.me` takes the
//! constraints in a query string and answers with an HTML page listing
//! matching library identifiers. `libc.rip` takes a JSON body and answers
//! with a JSON array whose entries link to each match's symbol table.
//! [`select_backend`] probes the configured endpoints once and the chosen
//! [`Backend`] then decides every URL shape for the rest of the run.

use super::symbols::ConstraintSet;
use crate::config::{BackendEndpoint, BackendKind};
use crate::error::{status_reason, SearchError};
use crate::transport::Transport;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Suffix of symbol table resources on every backend
pub const SYMBOLS_SUFFIX: &str = ".symbols";

/// Library build identifiers as they appear in blukat result pages, e.g.
/// `libc6_2.27-3ubuntu1_amd64` or `musl_1.1.24-1_amd64`
const IDENTIFIER_PATTERN: &str = r"\b(?:musl|g?libc[0-9]?)_?[\w.+~-]*\.[\w.+~-]*-[\w.+~-]*";

/// A library suggested by the backend, not yet verified
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// Library identifier scraped from a result page
    Identifier(String),
    /// Direct link to the library's symbol table
    SymbolsUrl(String),
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Identifier(id) => write!(f, "{}", id),
            Candidate::SymbolsUrl(url) => write!(f, "{}", resource_name(url)),
        }
    }
}

/// Library name of a symbol table resource: its last path segment without
/// the `.symbols` suffix.
pub fn resource_name(url: &str) -> &str {
    let segment = url.rsplit('/').next().unwrap_or(url);
    segment.split(SYMBOLS_SUFFIX).next().unwrap_or(segment)
}

/// One entry of a libc.rip `/api/find` response
#[derive(Debug, Clone, Deserialize)]
struct RipMatch {
    #[serde(default)]
    id: String,
    symbols_url: String,
}

/// The backend committed to for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    kind: BackendKind,
    base_url: String,
}

impl Backend {
    pub fn new(endpoint: &BackendEndpoint) -> Self {
        Self {
            kind: endpoint.kind,
            base_url: endpoint.base_url.clone(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Candidate query URL for `constraints`
    pub fn query_url(&self, constraints: &ConstraintSet) -> String {
        match self.kind {
            BackendKind::Blukat => {
                let params: Vec<String> = constraints
                    .constraints()
                    .iter()
                    .map(|c| format!("{}:{}", c.name, c.address_hex()))
                    .collect();
                format!("{}?q={}", self.base_url, params.join(","))
            }
            BackendKind::Rip => format!("{}api/find", self.base_url),
        }
    }

    /// Where the symbol table of `candidate` lives
    pub fn symbols_url(&self, candidate: &Candidate) -> String {
        match candidate {
            Candidate::Identifier(id) => format!("{}d/{}{}", self.base_url, id, SYMBOLS_SUFFIX),
            Candidate::SymbolsUrl(url) => url.clone(),
        }
    }

    /// Where the shared object named `file_name` can be downloaded
    pub fn download_url(&self, file_name: &str) -> String {
        match self.kind {
            BackendKind::Blukat => format!("{}d/{}", self.base_url, file_name),
            BackendKind::Rip => format!("{}download/{}", self.base_url, file_name),
        }
    }

    /// Ask the backend which libraries match `constraints`.
    ///
    /// An empty list is a valid answer; only a failed request is an error.
    pub async fn resolve(
        &self,
        transport: &dyn Transport,
        constraints: &ConstraintSet,
    ) -> Result<Vec<Candidate>, SearchError> {
        if constraints.constraints().is_empty() {
            warn!("No symbol addresses given, skipping candidate query");
            return Ok(Vec::new());
        }

        let url = self.query_url(constraints);
        debug!("Querying {} for {}", url, constraints);

        let candidates = match self.kind {
            BackendKind::Blukat => self.resolve_blukat(transport, &url).await?,
            BackendKind::Rip => self.resolve_rip(transport, &url, constraints).await?,
        };

        info!("{} candidate(s) suggested by {}", candidates.len(), self.base_url);
        Ok(candidates)
    }

    async fn resolve_blukat(
        &self,
        transport: &dyn Transport,
        url: &str,
    ) -> Result<Vec<Candidate>, SearchError> {
        let response = transport
            .get(url)
            .await
            .map_err(|e| SearchError::BackendRequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(SearchError::BackendRequestFailed {
                url: url.to_string(),
                reason: status_reason(response.status),
            });
        }

        Ok(extract_identifiers(&response.text())?
            .into_iter()
            .map(Candidate::Identifier)
            .collect())
    }

    async fn resolve_rip(
        &self,
        transport: &dyn Transport,
        url: &str,
        constraints: &ConstraintSet,
    ) -> Result<Vec<Candidate>, SearchError> {
        let symbols: HashMap<&str, String> = constraints
            .constraints()
            .iter()
            .map(|c| (c.name.as_str(), c.address_hex()))
            .collect();
        let payload = serde_json::json!({ "symbols": symbols });

        let response = transport.post_json(url, &payload).await.map_err(|e| {
            SearchError::BackendRequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !response.is_success() {
            return Err(SearchError::BackendRequestFailed {
                url: url.to_string(),
                reason: status_reason(response.status),
            });
        }

        let matches: Vec<RipMatch> =
            serde_json::from_slice(&response.body).map_err(|e| {
                SearchError::BackendRequestFailed {
                    url: url.to_string(),
                    reason: format!("failed to parse response: {}", e),
                }
            })?;

        for m in &matches {
            debug!("{} suggested {} ({})", self.base_url, m.id, m.symbols_url);
        }

        Ok(matches
            .into_iter()
            .map(|m| Candidate::SymbolsUrl(m.symbols_url))
            .collect())
    }
}

/// Every library identifier in `text`, in order of appearance
pub fn extract_identifiers(text: &str) -> Result<Vec<String>, SearchError> {
    let regex = Regex::new(IDENTIFIER_PATTERN).map_err(|e| SearchError::Pattern(e.to_string()))?;
    Ok(regex
        .find_iter(text)
        .map(|m| {
            let token = m.as_str();
            token
                .strip_suffix(SYMBOLS_SUFFIX)
                .or_else(|| token.strip_suffix(".so"))
                .unwrap_or(token)
                .to_string()
        })
        .collect())
}

/// Probe `endpoints` in order and commit to the first one that answers a
/// HEAD request with a success status within `timeout`.
pub async fn select_backend(
    transport: &dyn Transport,
    endpoints: &[BackendEndpoint],
    timeout: Duration,
) -> Result<Backend, SearchError> {
    for endpoint in endpoints {
        match transport.head(&endpoint.base_url, timeout).await {
            Ok(status) if (200..300).contains(&status) => {
                info!("{} selected", endpoint.base_url);
                return Ok(Backend::new(endpoint));
            }
            Ok(status) => debug!("{} answered with status {}", endpoint.base_url, status),
            Err(e) => debug!("{} unreachable: {}", endpoint.base_url, e),
        }
    }

    Err(SearchError::BackendUnavailable {
        tried: endpoints.iter().map(|e| e.base_url.clone()).collect(),
    })
}
