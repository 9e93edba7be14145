//! Symbol Table - the memory layout every node program is compiled against.
//!
//! A table is built once per run and shared read-only by all nodes. Its
//! layout is fixed and deterministic:
//!
//! ```text
//! ┌───────────┬────────────┬───────────────┬──────────┬─────────┬───────────┬────────┐
//! │ constants │ send[0..k] │ receive[0..k] │ incoming │ node_id │ variables │ extras │
//! └───────────┴────────────┴───────────────┴──────────┴─────────┴───────────┴────────┘
//! ```
//!
//! Each symbol carries two policies:
//! - `copy_to_next`: the value survives into the next tick unless overwritten,
//!   otherwise it resets to zero at every tick boundary
//! - `write_protected`: programs may read but never write it

use crate::error::ConfigError;
use gpnet_env::{SymbolId, Value};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a symbol's cell is seeded when a simulation begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialValue {
    /// Starts at zero
    Zero,

    /// Starts at a fixed value
    Constant(Value),

    /// Starts at the owning node's index
    NodeIndex,

    /// Starts at the number of nodes in the network
    NodeCount,
}

impl InitialValue {
    /// Resolves the policy for a particular node.
    pub fn resolve(&self, node_index: usize, node_count: usize) -> Value {
        match self {
            InitialValue::Zero => 0,
            InitialValue::Constant(v) => *v,
            InitialValue::NodeIndex => node_index as Value,
            InitialValue::NodeCount => node_count as Value,
        }
    }
}

/// The role a symbol plays in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Constant,
    Send,
    Receive,
    IncomingFlag,
    NodeId,
    Variable,
    User,
}

/// A named, policy-tagged memory cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Cell index
    pub id: SymbolId,

    /// Human-readable name (for dumps and logs)
    pub name: String,

    /// Role in the table
    pub kind: SymbolKind,

    /// Value survives the tick boundary when not overwritten
    pub copy_to_next: bool,

    /// Programs may not write this symbol
    pub write_protected: bool,

    /// Seed policy applied by `begin_simulation`
    pub initial: InitialValue,
}

/// A caller-supplied symbol appended after the built-in layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub name: String,
    pub copy_to_next: bool,
    pub write_protected: bool,
    pub initial: InitialValue,
}

impl SymbolSpec {
    /// A writable, persistent symbol starting at zero.
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            copy_to_next: true,
            write_protected: false,
            initial: InitialValue::Zero,
        }
    }

    /// A read-only symbol holding a fixed value.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            copy_to_next: true,
            write_protected: true,
            initial: InitialValue::Constant(value),
        }
    }
}

/// Counts that determine a table's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTableConfig {
    /// Number of general-purpose variables
    pub variable_count: usize,

    /// Whether to emit the constant symbols
    pub needs_constants: bool,

    /// Payload size; values below 1 are raised to 1
    pub send_receive_pairs: usize,
}

impl Default for SymbolTableConfig {
    fn default() -> Self {
        Self {
            variable_count: 2,
            needs_constants: true,
            send_receive_pairs: 1,
        }
    }
}

/// Constants emitted when a table asks for them: (name, policy).
const CONSTANTS: [(&str, InitialValue); 3] = [
    ("zero", InitialValue::Constant(0)),
    ("one", InitialValue::Constant(1)),
    ("node_count", InitialValue::NodeCount),
];

/// Ordered symbol collection plus the named slices the engine relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    constants: Range<usize>,
    send: Range<usize>,
    receive: Range<usize>,
    incoming: SymbolId,
    node_id: SymbolId,
    variables: Range<usize>,

    /// `copy_to_next` per cell, flattened for the per-tick roll
    copy_policy: Vec<bool>,

    /// `write_protected` per cell, flattened for write checks
    protection: Vec<bool>,
}

impl SymbolTable {
    /// Builds a table with the standard layout and no extra symbols.
    pub fn create(variable_count: usize, needs_constants: bool, send_receive_pairs: usize) -> Self {
        Self::create_with(variable_count, needs_constants, send_receive_pairs, Vec::new())
    }

    /// Builds a table from a serializable config.
    pub fn from_config(config: &SymbolTableConfig) -> Self {
        Self::create(
            config.variable_count,
            config.needs_constants,
            config.send_receive_pairs,
        )
    }

    /// Builds a table with caller-supplied symbols appended at the end.
    pub fn create_with(
        variable_count: usize,
        needs_constants: bool,
        send_receive_pairs: usize,
        extras: Vec<SymbolSpec>,
    ) -> Self {
        let pairs = send_receive_pairs.max(1);
        let mut symbols = Vec::new();

        let mut push = |name: String, kind, copy_to_next, write_protected, initial| {
            let id = SymbolId(symbols.len());
            symbols.push(Symbol {
                id,
                name,
                kind,
                copy_to_next,
                write_protected,
                initial,
            });
            id.0
        };

        let constants_start = 0;
        if needs_constants {
            for (name, initial) in CONSTANTS {
                push(name.to_string(), SymbolKind::Constant, true, true, initial);
            }
        }
        let constants = constants_start..if needs_constants { CONSTANTS.len() } else { 0 };

        let send_start = constants.end;
        for i in 0..pairs {
            push(format!("send{}", i), SymbolKind::Send, false, false, InitialValue::Zero);
        }
        let send = send_start..send_start + pairs;

        for i in 0..pairs {
            push(format!("recv{}", i), SymbolKind::Receive, false, true, InitialValue::Zero);
        }
        let receive = send.end..send.end + pairs;

        let incoming = SymbolId(push(
            "incoming".to_string(),
            SymbolKind::IncomingFlag,
            false,
            true,
            InitialValue::Zero,
        ));

        let node_id = SymbolId(push(
            "node_id".to_string(),
            SymbolKind::NodeId,
            true,
            false,
            InitialValue::NodeIndex,
        ));

        let variables_start = node_id.0 + 1;
        for i in 0..variable_count {
            push(format!("var{}", i), SymbolKind::Variable, true, false, InitialValue::Zero);
        }
        let variables = variables_start..variables_start + variable_count;

        for spec in extras {
            push(spec.name, SymbolKind::User, spec.copy_to_next, spec.write_protected, spec.initial);
        }

        let copy_policy = symbols.iter().map(|s| s.copy_to_next).collect();
        let protection = symbols.iter().map(|s| s.write_protected).collect();

        Self {
            symbols,
            constants,
            send,
            receive,
            incoming,
            node_id,
            variables,
            copy_policy,
            protection,
        }
    }

    /// Checks the layout is self-consistent.
    ///
    /// Tables built by `create*` always pass. Deserialized tables are checked
    /// for agreeing send/receive sizes, symbol ids matching cell positions,
    /// every range inside the table, and flattened policies matching the
    /// symbols they were derived from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send.len() != self.receive.len() {
            return Err(ConfigError::PayloadMismatch {
                send: self.send.len(),
                receive: self.receive.len(),
            });
        }

        let len = self.symbols.len();
        if self.symbols.iter().enumerate().any(|(i, s)| s.id.0 != i) {
            return Err(ConfigError::InconsistentTable {
                reason: "symbol ids do not match cell positions",
            });
        }

        let ranges = [&self.constants, &self.send, &self.receive, &self.variables];
        if ranges.iter().any(|r| r.start > r.end || r.end > len)
            || self.incoming.0 >= len
            || self.node_id.0 >= len
        {
            return Err(ConfigError::InconsistentTable {
                reason: "symbol range outside the table",
            });
        }

        let copies = self.symbols.iter().map(|s| s.copy_to_next);
        let protected = self.symbols.iter().map(|s| s.write_protected);
        if !self.copy_policy.iter().copied().eq(copies)
            || !self.protection.iter().copied().eq(protected)
        {
            return Err(ConfigError::InconsistentTable {
                reason: "cell policies disagree with symbols",
            });
        }

        Ok(())
    }

    /// Returns the `i`-th send symbol.
    ///
    /// # Panics
    /// If `i` is outside the send range.
    pub fn get_send_symbol(&self, i: usize) -> SymbolId {
        assert!(i < self.send.len(), "send symbol {} out of range (0..{})", i, self.send.len());
        SymbolId(self.send.start + i)
    }

    /// Returns the `i`-th receive symbol.
    ///
    /// # Panics
    /// If `i` is outside the receive range.
    pub fn get_receive_symbol(&self, i: usize) -> SymbolId {
        assert!(
            i < self.receive.len(),
            "receive symbol {} out of range (0..{})",
            i,
            self.receive.len()
        );
        SymbolId(self.receive.start + i)
    }

    /// Returns the `i`-th general-purpose variable.
    ///
    /// # Panics
    /// If `i` is outside the variable range.
    pub fn get_variable(&self, i: usize) -> SymbolId {
        assert!(
            i < self.variables.len(),
            "variable {} out of range (0..{})",
            i,
            self.variables.len()
        );
        SymbolId(self.variables.start + i)
    }

    /// Returns the `i`-th constant.
    ///
    /// # Panics
    /// If the table has no constants or `i` is out of range.
    pub fn get_constant(&self, i: usize) -> SymbolId {
        assert!(
            i < self.constants.len(),
            "constant {} out of range (0..{})",
            i,
            self.constants.len()
        );
        SymbolId(self.constants.start + i)
    }

    /// The incoming-message flag.
    pub fn incoming_symbol(&self) -> SymbolId {
        self.incoming
    }

    /// The node-identity symbol.
    pub fn node_id_symbol(&self) -> SymbolId {
        self.node_id
    }

    /// Looks a symbol up by name.
    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.id)
    }

    /// Returns a symbol's metadata, if it belongs to this table.
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0)
    }

    /// All symbols in cell order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Number of cells each node's memory holds.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Message payload size (== send range length == receive range length).
    pub fn payload_size(&self) -> usize {
        self.send.len()
    }

    /// Cell range of the send symbols.
    pub fn send_range(&self) -> Range<usize> {
        self.send.clone()
    }

    /// Cell range of the receive symbols.
    pub fn receive_range(&self) -> Range<usize> {
        self.receive.clone()
    }

    /// `copy_to_next` for every cell, in cell order.
    pub(crate) fn copy_policy(&self) -> &[bool] {
        &self.copy_policy
    }

    /// Returns `Some(true)` for protected cells, `None` for unknown ids.
    pub(crate) fn is_protected(&self, id: SymbolId) -> Option<bool> {
        self.protection.get(id.0).copied()
    }
}
