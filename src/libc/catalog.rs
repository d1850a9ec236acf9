//! Verified libc builds and their deduplicated catalog

use super::symbols::canonical_symbol;
use crate::config::DedupKey;
use crate::error::SearchError;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A libc build whose symbol table defines every requested symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedLibrary {
    name: String,
    offsets: BTreeMap<String, u64>,
}

impl ResolvedLibrary {
    pub fn new(name: impl Into<String>, offsets: BTreeMap<String, u64>) -> Self {
        Self {
            name: name.into(),
            offsets,
        }
    }

    /// Library identifier, e.g. `libc6_2.27-3ubuntu1_amd64`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offsets(&self) -> &BTreeMap<String, u64> {
        &self.offsets
    }

    /// Offset of `symbol` inside this build, accepting user-facing aliases
    /// such as `binsh`.
    pub fn offset(&self, symbol: &str) -> Result<u64, SearchError> {
        self.offsets
            .get(canonical_symbol(symbol))
            .copied()
            .ok_or_else(|| SearchError::UnknownSymbol {
                symbol: symbol.to_string(),
                library: self.name.clone(),
            })
    }

    /// File name of the shared object as served by the backends
    pub fn file_name(&self) -> String {
        format!("{}.so", self.name)
    }
}

impl fmt::Display for ResolvedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[*]{}", self.name)?;
        for (symbol, offset) in &self.offsets {
            write!(f, "\n    {:12} 0x{:x}", symbol, offset)?;
        }
        Ok(())
    }
}

/// Ordered, deduplicated result of one search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LibraryCatalog {
    libraries: Vec<ResolvedLibrary>,
}

impl LibraryCatalog {
    /// Collapse duplicate verification results, keeping the first of each
    /// group in input order.
    pub fn deduplicate<I>(results: I, key: DedupKey) -> Self
    where
        I: IntoIterator<Item = ResolvedLibrary>,
    {
        let mut seen: HashSet<(Option<String>, BTreeMap<String, u64>)> = HashSet::new();
        let mut libraries = Vec::new();

        for library in results {
            let name = match key {
                DedupKey::Offsets => None,
                DedupKey::IdentifierAndOffsets => Some(library.name.clone()),
            };
            if seen.insert((name, library.offsets.clone())) {
                libraries.push(library);
            }
        }

        Self { libraries }
    }

    pub fn libraries(&self) -> &[ResolvedLibrary] {
        &self.libraries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedLibrary> {
        self.libraries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedLibrary> {
        self.libraries.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl<'a> IntoIterator for &'a LibraryCatalog {
    type Item = &'a ResolvedLibrary;
    type IntoIter = std::slice::Iter<'a, ResolvedLibrary>;

    fn into_iter(self) -> Self::IntoIter {
        self.libraries.iter()
    }
}
