//! Tie-break oracle consulted when two engines disagree with equal confidence.
//!
//! The fusion core only ever asks whether a symbol is a known entry; richer
//! dictionary data stays behind [`DictionaryOracle`].

pub mod dictionary;

use std::collections::{BTreeSet, HashSet};

pub use dictionary::{DictionaryOracle, DictionaryRecord};

/// Read-only plausibility predicate, shared across concurrent fusion calls.
pub trait TieBreakOracle: Send + Sync {
    fn has_entry(&self, symbol: &str) -> bool;
}

/// Knows no entries; every tie falls through to the preferred engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOracle;

impl TieBreakOracle for NoOracle {
    fn has_entry(&self, _symbol: &str) -> bool {
        false
    }
}

impl TieBreakOracle for HashSet<String> {
    fn has_entry(&self, symbol: &str) -> bool {
        self.contains(symbol)
    }
}

impl TieBreakOracle for BTreeSet<String> {
    fn has_entry(&self, symbol: &str) -> bool {
        self.contains(symbol)
    }
}
