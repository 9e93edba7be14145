//! gpnet Core - Deterministic Lock-Step Network Simulation
//!
//! This library evaluates candidate programs by running them on every node
//! of a small simulated network and reporting what happened:
//! 1. **Memory model**: per-node double-buffered cells with copy/zero and
//!    write-protection policies, so every program reads a consistent
//!    snapshot of the previous tick
//! 2. **Message model**: a bounded buffer pool, uniformly drawn propagation
//!    delays, FIFO inbound queues consumed one message per tick
//! 3. **Determinism**: fixed node order, fixed delivery order and a seeded
//!    random source make a run a pure function of (programs, config, seed)
//!
//! ```text
//!  ┌──────────┐  send   ┌────────┐ resolve ┌──────────────────┐
//!  │  Node i  │────────►│ Router │────────►│ DeliverySchedule │
//!  │ (memory, │         └────────┘         │ (tick + delay)   │
//!  │ program) │◄──────── queue ◄───────────┴──────────────────┘
//!  └──────────┘                    all buffers from MessagePool
//! ```

pub mod bytecode;
pub mod error;
pub mod memory;
pub mod network;
pub mod node;
pub mod pool;
pub mod result;
pub mod router;
pub mod schedule;
pub mod symbols;

// Re-export key types for convenience
pub use bytecode::{Bytecode, Instr};
pub use error::ConfigError;
pub use memory::NodeMemory;
pub use network::{Network, NetworkConfig};
pub use node::{Node, NodeState, StepError, StepOutcome};
pub use pool::{Message, MessageHandle, MessagePool};
pub use result::{FailureCause, NodeReport, RunOutcome, RunResult, RunStats};
pub use router::{Broadcast, Directed, Ring, Router};
pub use schedule::DeliverySchedule;
pub use symbols::{InitialValue, Symbol, SymbolKind, SymbolSpec, SymbolTable, SymbolTableConfig};
