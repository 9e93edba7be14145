//! Common types shared between the engine and its collaborators.

use serde::{Deserialize, Serialize};

/// Contents of a single memory cell.
pub type Value = i64;

/// Index of a symbol (memory cell) in a symbol table.
///
/// Programs are compiled against a table, so a `SymbolId` is only
/// meaningful together with the table that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub usize);

impl SymbolId {
    /// Returns the raw cell index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}
