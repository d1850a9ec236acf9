//! Symbol constraints supplied by the user
//!
//! A constraint pairs a libc symbol name with the address it was observed at
//! in the target process. Names go through [`canonical_symbol`] once, when
//! the set is built, so everything downstream sees backend spellings.

use crate::error::SearchError;
use log::warn;
use std::fmt;

/// User-facing spellings and the symbol names the libc databases use
const SYMBOL_ALIASES: &[(&str, &str)] = &[("binsh", "str_bin_sh")];

/// Map a user-facing symbol name to the name the backends index it under.
pub fn canonical_symbol(name: &str) -> &str {
    SYMBOL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Parse a hexadecimal address with or without a `0x` prefix.
pub fn parse_address(symbol: &str, value: &str) -> Result<u64, SearchError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    u64::from_str_radix(digits, 16).map_err(|_| SearchError::InvalidAddress {
        symbol: symbol.to_string(),
        value: value.to_string(),
    })
}

/// A symbol observed at a runtime address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolConstraint {
    pub name: String,
    pub address: u64,
}

impl SymbolConstraint {
    pub fn new(name: &str, address: u64) -> Self {
        Self {
            name: canonical_symbol(name).to_string(),
            address,
        }
    }

    /// Address as the backends expect it: lowercase hex, no prefix
    pub fn address_hex(&self) -> String {
        format!("{:x}", self.address)
    }
}

impl fmt::Display for SymbolConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:x}", self.name, self.address)
    }
}

/// Normalized constraints for one search
///
/// `lookups` holds symbols without a known address: they are not sent to the
/// backend but every candidate must still define them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: Vec<SymbolConstraint>,
    lookups: Vec<String>,
}

impl ConstraintSet {
    /// Pair `names` with `addresses` positionally.
    ///
    /// Names beyond the last address become lookup-only symbols; addresses
    /// beyond the last name are ignored.
    pub fn from_lists<N, A>(names: &[N], addresses: &[A]) -> Result<Self, SearchError>
    where
        N: AsRef<str>,
        A: AsRef<str>,
    {
        if addresses.len() > names.len() {
            warn!(
                "Ignoring {} address(es) without a symbol name",
                addresses.len() - names.len()
            );
        }

        let mut set = Self::default();
        for (name, address) in names.iter().zip(addresses) {
            let address = parse_address(name.as_ref(), address.as_ref())?;
            set.push_constraint(name.as_ref(), address);
        }
        for name in names.iter().skip(addresses.len()) {
            set.push_lookup(name.as_ref());
        }
        Ok(set)
    }

    /// Parse `NAME=ADDRESS` or bare `NAME` specifications.
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self, SearchError> {
        let mut set = Self::default();
        for spec in specs {
            let spec = spec.as_ref().trim();
            match spec.split_once(['=', ':']) {
                Some((name, address)) => {
                    let address = parse_address(name, address)?;
                    set.push_constraint(name.trim(), address);
                }
                None => set.push_lookup(spec),
            }
        }
        Ok(set)
    }

    pub fn push_constraint(&mut self, name: &str, address: u64) {
        self.constraints.push(SymbolConstraint::new(name, address));
    }

    pub fn push_lookup(&mut self, name: &str) {
        if !name.is_empty() {
            self.lookups.push(canonical_symbol(name).to_string());
        }
    }

    /// Constraints sent to the backend
    pub fn constraints(&self) -> &[SymbolConstraint] {
        &self.constraints
    }

    /// Every symbol a candidate must define, in first-seen order without
    /// repeats
    pub fn symbol_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let all = self
            .constraints
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.lookups.iter().map(String::as_str));
        for name in all {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.lookups.is_empty()
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .constraints
            .iter()
            .map(|c| c.to_string())
            .chain(self.lookups.iter().cloned())
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
