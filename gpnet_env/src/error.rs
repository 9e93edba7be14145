//! Error types raised by programs while they execute on a node.

use crate::types::SymbolId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A program-level fault. Terminal for the whole simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProgramFault {
    /// Attempted write to a write-protected symbol
    #[error("write to protected symbol {0}")]
    WriteProtected(SymbolId),
    
    /// Symbol id is not part of the node's table
    #[error("unknown symbol {0}")]
    UnknownSymbol(SymbolId),
    
    /// Operand stack was empty
    #[error("stack underflow")]
    StackUnderflow,
    
    /// Operand stack exceeded its depth limit
    #[error("stack overflow")]
    StackOverflow,
    
    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,
    
    /// Jump target outside the program
    #[error("invalid jump target {0}")]
    InvalidJump(usize),
    
    /// Instruction budget spent without finishing the tick
    #[error("instruction budget of {0} exhausted")]
    BudgetExhausted(usize),
    
    /// Fault raised by a native program
    #[error("program fault: {0}")]
    Custom(String),
}

impl ProgramFault {
    /// Creates a custom fault.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}
