//! Node Memory - per-node double-buffered cell array.
//!
//! # Buffer discipline
//!
//! ```text
//!            ┌──────────── tick t ────────────┐
//!  deliver → next ──roll──► current ──read──► program ──write_next──► next
//!                   │
//!                   └─ next := copy_to_next ? current : 0
//! ```
//!
//! `current` is the fully resolved state of the previous tick and is never
//! written while a program runs. `next` is the state under construction.
//! The roll swaps the two buffers and rebuilds `next` from the new `current`
//! according to each symbol's `copy_to_next` policy, in a single pass.

use crate::symbols::SymbolTable;
use gpnet_env::{ProgramFault, SymbolId, Value};

/// Current/next cell buffers for one node.
#[derive(Debug, Clone)]
pub struct NodeMemory {
    current: Vec<Value>,
    next: Vec<Value>,
}

impl NodeMemory {
    /// Creates zeroed buffers sized for a table.
    pub fn new(table: &SymbolTable) -> Self {
        Self {
            current: vec![0; table.len()],
            next: vec![0; table.len()],
        }
    }

    /// Zero-fills both buffers and seeds them from the initial-value policies.
    ///
    /// `current` receives every symbol's seed; `next` is then prepared from it
    /// with the same copy/zero pass the roll uses, so persistent and
    /// write-protected seeds are in place before the first tick.
    pub fn begin_simulation(&mut self, table: &SymbolTable, node_index: usize, node_count: usize) {
        self.current.fill(0);
        self.next.fill(0);

        for symbol in table.symbols() {
            self.current[symbol.id.0] = symbol.initial.resolve(node_index, node_count);
        }
        for symbol in table.symbols() {
            if symbol.copy_to_next || symbol.write_protected {
                self.next[symbol.id.0] = self.current[symbol.id.0];
            }
        }
    }

    /// Promotes `next` to `current` and rebuilds `next` by symbol policy.
    pub fn roll(&mut self, table: &SymbolTable) {
        std::mem::swap(&mut self.current, &mut self.next);

        for ((next, &current), &copy) in self
            .next
            .iter_mut()
            .zip(self.current.iter())
            .zip(table.copy_policy())
        {
            *next = if copy { current } else { 0 };
        }
    }

    /// Reads a symbol from `current`. Unknown symbols read as zero.
    pub fn read(&self, symbol: SymbolId) -> Value {
        self.current.get(symbol.0).copied().unwrap_or(0)
    }

    /// Reads a symbol from `next` as staged so far.
    pub fn read_next(&self, symbol: SymbolId) -> Value {
        self.next.get(symbol.0).copied().unwrap_or(0)
    }

    /// Stages a program write into `next`.
    ///
    /// # Returns
    /// * `Err(ProgramFault::WriteProtected)` - Symbol is read-only for programs
    /// * `Err(ProgramFault::UnknownSymbol)` - Symbol is not in the table
    pub fn write_next(
        &mut self,
        table: &SymbolTable,
        symbol: SymbolId,
        value: Value,
    ) -> Result<(), ProgramFault> {
        match table.is_protected(symbol) {
            None => Err(ProgramFault::UnknownSymbol(symbol)),
            Some(true) => Err(ProgramFault::WriteProtected(symbol)),
            Some(false) => {
                self.next[symbol.0] = value;
                Ok(())
            }
        }
    }

    /// Engine-side write of an inbound payload into `next`.
    ///
    /// Fills the receive range and raises the incoming-message flag. Bypasses
    /// write protection: these cells are read-only to programs, not to the
    /// node delivering the message.
    pub fn deliver(&mut self, table: &SymbolTable, payload: &[Value]) {
        let receive = table.receive_range();
        self.next[receive].copy_from_slice(payload);
        self.next[table.incoming_symbol().0] = 1;
    }

    /// The send range of `next`, i.e. what a send this tick transmits.
    pub fn send_payload(&self, table: &SymbolTable) -> &[Value] {
        &self.next[table.send_range()]
    }

    /// Whether the program staged a change to any writable symbol.
    pub fn has_pending_change(&self, table: &SymbolTable) -> bool {
        table
            .symbols()
            .iter()
            .filter(|s| !s.write_protected)
            .any(|s| self.next[s.id.0] != self.current[s.id.0])
    }

    /// The resolved state programs read this tick.
    pub fn current(&self) -> &[Value] {
        &self.current
    }

    /// The state under construction.
    pub fn next(&self) -> &[Value] {
        &self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> SymbolTable {
        SymbolTable::create(2, true, 2)
    }

    #[test]
    fn test_begin_simulation_seeds_policies() {
        let table = table();
        let mut memory = NodeMemory::new(&table);

        memory.begin_simulation(&table, 4, 9);

        assert_eq!(memory.read(table.get_constant(1)), 1);
        assert_eq!(memory.read(table.get_constant(2)), 9);
        assert_eq!(memory.read(table.node_id_symbol()), 4);
        assert_eq!(memory.read(table.incoming_symbol()), 0);

        // Seeds survive the first roll
        memory.roll(&table);
        assert_eq!(memory.read(table.node_id_symbol()), 4);
        assert_eq!(memory.read(table.get_constant(2)), 9);
    }

    #[test]
    fn test_write_protected_rejected() {
        let table = table();
        let mut memory = NodeMemory::new(&table);
        memory.begin_simulation(&table, 0, 1);

        let recv = table.get_receive_symbol(0);
        assert_eq!(
            memory.write_next(&table, recv, 5),
            Err(ProgramFault::WriteProtected(recv))
        );
        assert_eq!(
            memory.write_next(&table, SymbolId(999), 5),
            Err(ProgramFault::UnknownSymbol(SymbolId(999)))
        );
        assert_eq!(memory.read_next(recv), 0);
    }

    #[test]
    fn test_copy_symbol_persists_across_ticks() {
        let table = table();
        let mut memory = NodeMemory::new(&table);
        memory.begin_simulation(&table, 0, 1);
        let var = table.get_variable(0);

        memory.roll(&table);
        memory.write_next(&table, var, 17).unwrap();

        memory.roll(&table);
        assert_eq!(memory.read(var), 17);

        // Not rewritten: still there a tick later
        memory.roll(&table);
        assert_eq!(memory.read(var), 17);
    }

    #[test]
    fn test_non_copy_symbol_resets() {
        let table = table();
        let mut memory = NodeMemory::new(&table);
        memory.begin_simulation(&table, 0, 1);
        let send = table.get_send_symbol(1);

        memory.roll(&table);
        memory.write_next(&table, send, 3).unwrap();

        memory.roll(&table);
        assert_eq!(memory.read(send), 3);

        memory.roll(&table);
        assert_eq!(memory.read(send), 0);
    }

    #[test]
    fn test_delivered_payload_survives_roll_once() {
        let table = table();
        let mut memory = NodeMemory::new(&table);
        memory.begin_simulation(&table, 0, 1);
        memory.roll(&table);

        memory.deliver(&table, &[8, 9]);
        memory.roll(&table);
        assert_eq!(memory.read(table.get_receive_symbol(0)), 8);
        assert_eq!(memory.read(table.get_receive_symbol(1)), 9);
        assert_eq!(memory.read(table.incoming_symbol()), 1);

        memory.roll(&table);
        assert_eq!(memory.read(table.get_receive_symbol(0)), 0);
        assert_eq!(memory.read(table.incoming_symbol()), 0);
    }

    #[test]
    fn test_pending_change_ignores_protected() {
        let table = table();
        let mut memory = NodeMemory::new(&table);
        memory.begin_simulation(&table, 0, 1);
        memory.roll(&table);
        assert!(!memory.has_pending_change(&table));

        memory.deliver(&table, &[1, 1]);
        assert!(!memory.has_pending_change(&table));

        memory.write_next(&table, table.get_variable(0), 1).unwrap();
        assert!(memory.has_pending_change(&table));
    }

    proptest! {
        #[test]
        fn prop_roll_applies_policy(values in proptest::collection::vec(-1000i64..1000, 13)) {
            let table = table();
            let mut memory = NodeMemory::new(&table);
            memory.begin_simulation(&table, 0, 1);
            memory.roll(&table);

            let writable: Vec<_> = table.symbols().iter().filter(|s| !s.write_protected).collect();
            for (symbol, v) in writable.iter().zip(&values) {
                memory.write_next(&table, symbol.id, *v).unwrap();
            }

            // Written in tick t, read in t+1
            memory.roll(&table);
            for (symbol, v) in writable.iter().zip(&values) {
                prop_assert_eq!(memory.read(symbol.id), *v);
            }

            // Not rewritten: copy symbols keep, others read zero
            memory.roll(&table);
            for (symbol, v) in writable.iter().zip(&values) {
                let expected = if symbol.copy_to_next { *v } else { 0 };
                prop_assert_eq!(memory.read(symbol.id), expected);
            }
        }
    }
}
