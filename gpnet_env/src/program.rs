//! Program artifact abstraction.

use crate::error::ProgramFault;
use crate::types::{SymbolId, Value};

/// What a program asks the node to do once its tick's execution finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionSignal {
    /// Done for this tick, nothing to send
    Continue,
    
    /// Done for this tick, send the send-symbol range
    Send,
    
    /// Done for good; the node terminates after this tick
    Halt,
    
    /// The program performed an invalid operation
    Fault(ProgramFault),
}

/// The only access a program has to node state during a tick.
///
/// Reads observe the fully resolved previous tick (`current`), writes land
/// in the state being built for the next tick (`next`).
///
/// ```text
///   tick t-1 program          tick t program           tick t+1 program
///        │ write_next               │ read                    │ read
///        ▼                          ▼                         ▼
///   [ next ] ── roll ──► [ current ]   [ next ] ── roll ──► [ current ]
/// ```
pub trait MemoryView {
    /// Reads a symbol from the current-state buffer.
    ///
    /// Unknown symbols read as zero.
    fn read(&self, symbol: SymbolId) -> Value;
    
    /// Writes a symbol into the next-state buffer.
    ///
    /// # Returns
    /// * `Ok(())` - Value staged for the next tick
    /// * `Err(ProgramFault::WriteProtected)` - Symbol may not be written by programs
    /// * `Err(ProgramFault::UnknownSymbol)` - Symbol is not in this node's table
    fn write_next(&mut self, symbol: SymbolId, value: Value) -> Result<(), ProgramFault>;
    
    /// Reads a symbol from the next-state buffer as staged so far.
    fn read_next(&self, symbol: SymbolId) -> Value;
    
    /// Requests that the send range be transmitted at the end of this tick.
    ///
    /// One-shot: the request is consumed by the tick that made it.
    fn request_send(&mut self);
    
    /// Returns this node's index within the network.
    fn node_index(&self) -> usize;
    
    /// Returns the number of nodes in the network.
    fn node_count(&self) -> usize;
}

/// A compiled program installed on one or more nodes.
///
/// # Implementations
///
/// - **Bytecode**: `gpnet_core::bytecode::Bytecode`, the interpreter target
///   for evolved programs
/// - **Native**: any `Fn(&mut dyn MemoryView) -> ExecutionSignal` closure
///
/// Programs must be stateless across ticks; everything a program remembers
/// lives in node memory. This is what lets one instance be shared by every
/// node of a network.
pub trait Program: Send + Sync {
    /// Runs one tick of the program against a node's memory.
    fn execute(&self, view: &mut dyn MemoryView) -> ExecutionSignal;
}

impl<F> Program for F
where
    F: Fn(&mut dyn MemoryView) -> ExecutionSignal + Send + Sync,
{
    fn execute(&self, view: &mut dyn MemoryView) -> ExecutionSignal {
        self(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    /// Flat view over one buffer, enough to drive a program by hand.
    struct FlatView {
        cells: Vec<Value>,
        protected: Vec<bool>,
        send: bool,
    }
    
    impl MemoryView for FlatView {
        fn read(&self, symbol: SymbolId) -> Value {
            self.cells.get(symbol.0).copied().unwrap_or(0)
        }
        
        fn write_next(&mut self, symbol: SymbolId, value: Value) -> Result<(), ProgramFault> {
            match self.protected.get(symbol.0) {
                None => Err(ProgramFault::UnknownSymbol(symbol)),
                Some(true) => Err(ProgramFault::WriteProtected(symbol)),
                Some(false) => {
                    self.cells[symbol.0] = value;
                    Ok(())
                }
            }
        }
        
        fn read_next(&self, symbol: SymbolId) -> Value {
            self.read(symbol)
        }
        
        fn request_send(&mut self) {
            self.send = true;
        }
        
        fn node_index(&self) -> usize {
            0
        }
        
        fn node_count(&self) -> usize {
            1
        }
    }
    
    #[test]
    fn test_closure_is_a_program() {
        let program = |view: &mut dyn MemoryView| {
            let v = view.read(SymbolId(0));
            match view.write_next(SymbolId(1), v + 1) {
                Ok(()) => ExecutionSignal::Send,
                Err(fault) => ExecutionSignal::Fault(fault),
            }
        };
        
        let mut view = FlatView {
            cells: vec![41, 0],
            protected: vec![true, false],
            send: false,
        };
        
        assert_eq!(program.execute(&mut view), ExecutionSignal::Send);
        assert_eq!(view.cells[1], 42);
    }
    
    #[test]
    fn test_protected_write_surfaces_as_fault() {
        let program = |view: &mut dyn MemoryView| match view.write_next(SymbolId(0), 7) {
            Ok(()) => ExecutionSignal::Continue,
            Err(fault) => ExecutionSignal::Fault(fault),
        };
        
        let mut view = FlatView {
            cells: vec![1],
            protected: vec![true],
            send: false,
        };
        
        assert_eq!(
            program.execute(&mut view),
            ExecutionSignal::Fault(ProgramFault::WriteProtected(SymbolId(0)))
        );
        assert_eq!(view.cells[0], 1);
        assert!(!view.send);
    }
}
