//! Construction-time configuration errors.
//!
//! Everything here is detected before the first tick runs. Per-tick
//! failures are not errors in this sense: they end the run and surface as
//! [`crate::RunOutcome::Failed`].

use thiserror::Error;

/// A malformed network or symbol-table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A network needs at least one node
    #[error("network must have at least one node")]
    NoNodes,
    
    /// Delays must satisfy `0 < min <= max`
    #[error("invalid delay window [{min}, {max}]: require 0 < min <= max")]
    InvalidDelay { min: u64, max: u64 },
    
    /// The message pool must hold at least one buffer
    #[error("max_pending_messages must be at least 1")]
    ZeroCapacity,
    
    /// Program provider returned the wrong number of programs
    #[error("expected {expected} programs, got {got}")]
    ProgramCount { expected: usize, got: usize },
    
    /// Send and receive ranges disagree on the payload size
    #[error("send range has {send} symbols but receive range has {receive}")]
    PayloadMismatch { send: usize, receive: usize },
    
    /// A symbol table whose layout disagrees with its own symbols
    #[error("inconsistent symbol table: {reason}")]
    InconsistentTable { reason: &'static str },
}
