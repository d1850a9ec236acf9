//! Error types shared by the resolution engine.

/// A failure reported by a [`Transport`](crate::transport::Transport) before any
/// HTTP status was received.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// Connecting to the server or reading the response failed.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// Errors produced while resolving and downloading libc candidates.
///
/// `BackendUnavailable` and `BackendRequestFailed` abort a run.
/// `SymbolMissing`, `SymbolTableUnreachable` and `DownloadFailed` only drop
/// the candidate they were raised for.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// None of the configured backends answered the reachability probe.
    #[error("libc database backends are inaccessible (tried {})", .tried.join(", "))]
    BackendUnavailable { tried: Vec<String> },

    /// The selected backend rejected or garbled the candidate query.
    #[error("candidate query to {url} failed: {reason}")]
    BackendRequestFailed { url: String, reason: String },

    /// A candidate's symbol table lacks one of the requested symbols.
    #[error("failed to find {symbol} in the {candidate} symbol table")]
    SymbolMissing { symbol: String, candidate: String },

    /// A candidate's symbol table could not be fetched.
    #[error("failed to retrieve symbol table {url}: {reason}")]
    SymbolTableUnreachable { url: String, reason: String },

    /// A candidate's library binary could not be fetched or stored.
    #[error("failed to download {candidate}: {reason}")]
    DownloadFailed { candidate: String, reason: String },

    /// A user-supplied address is not a hexadecimal number.
    #[error("invalid address {value:?} for symbol {symbol}")]
    InvalidAddress { symbol: String, value: String },

    /// Offset lookup for a symbol that was never resolved.
    #[error("{symbol} not found in libc {library}")]
    UnknownSymbol { symbol: String, library: String },

    /// A search pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(String),

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SearchError {
    /// Whether this error aborts the whole run rather than a single candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SearchError::BackendUnavailable { .. }
                | SearchError::BackendRequestFailed { .. }
                | SearchError::Pattern(_)
                | SearchError::Config(_)
        )
    }
}

/// Human-readable reason for a non-success HTTP status.
pub(crate) fn status_reason(status: u16) -> String {
    format!("server returned status code {}", status)
}
