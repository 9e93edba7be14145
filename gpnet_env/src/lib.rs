//! gpnet Environment Abstraction Layer
//!
//! This crate defines everything the simulation engine consumes from its
//! collaborators, and nothing else:
//! - **Programs**: the compiled artifact installed on every node
//! - **Memory view**: the only window a program has onto node state
//! - **Randomness**: the seeded source that draws message delays
//!
//! The engine (`gpnet_core`) is generic over these traits, so the same
//! lock-step network can host bytecode produced by a genetic-programming
//! compiler, hand-written native closures, or anything in between.
//!
//! # Example
//!
//! ```ignore
//! use gpnet_env::{ExecutionSignal, MemoryView, SymbolId};
//!
//! // A native program that always broadcasts its own id.
//! let program = |view: &mut dyn MemoryView| {
//!     let id = view.read(SymbolId(4));
//!     match view.write_next(SymbolId(1), id) {
//!         Ok(()) => ExecutionSignal::Send,
//!         Err(fault) => ExecutionSignal::Fault(fault),
//!     }
//! };
//! ```

mod error;
mod program;
mod random;
mod types;

pub use error::ProgramFault;
pub use program::{ExecutionSignal, MemoryView, Program};
pub use random::{EntropyRandom, RandomSource, SeededRandom};
pub use types::{SymbolId, Value};
