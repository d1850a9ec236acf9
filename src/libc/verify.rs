//! Local verification of candidate symbol tables
//!
//! Symbol tables are plain text with one `name offset` pair per line, the
//! offset in hexadecimal:
//!
//! ```text
//! puts 00000000000809c0
//! str_bin_sh 1b3e9a
//! ```

use super::backend::{resource_name, Backend, Candidate};
use super::catalog::ResolvedLibrary;
use crate::error::{status_reason, SearchError};
use crate::transport::Transport;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;

/// Fetch `candidate`'s symbol table and resolve every name in `symbols`.
pub async fn verify_candidate(
    transport: &dyn Transport,
    backend: &Backend,
    candidate: &Candidate,
    symbols: &[String],
) -> Result<ResolvedLibrary, SearchError> {
    let url = backend.symbols_url(candidate);
    debug!("Fetching symbol table {}", url);

    let response = transport
        .get(&url)
        .await
        .map_err(|e| SearchError::SymbolTableUnreachable {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    if !response.is_success() {
        return Err(SearchError::SymbolTableUnreachable {
            url: url.clone(),
            reason: status_reason(response.status),
        });
    }

    let name = resource_name(&url);
    let offsets = parse_offsets(&response.text(), symbols, name)?;
    Ok(ResolvedLibrary::new(name, offsets))
}

/// Offsets of `symbols` in the symbol table `text` of library `library`.
///
/// Fails with `SymbolMissing` on the first symbol without a matching line.
pub fn parse_offsets(
    text: &str,
    symbols: &[String],
    library: &str,
) -> Result<BTreeMap<String, u64>, SearchError> {
    let mut offsets = BTreeMap::new();

    for symbol in symbols {
        let pattern = format!(r"(?m)^{}[ \t]+([0-9a-fA-F]+)\s*$", regex::escape(symbol));
        let regex = Regex::new(&pattern).map_err(|e| SearchError::Pattern(e.to_string()))?;

        let offset = regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| u64::from_str_radix(m.as_str(), 16).ok())
            .ok_or_else(|| SearchError::SymbolMissing {
                symbol: symbol.clone(),
                candidate: library.to_string(),
            })?;

        offsets.insert(symbol.clone(), offset);
    }

    Ok(offsets)
}
