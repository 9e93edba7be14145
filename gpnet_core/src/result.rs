//! Run results handed to the fitness evaluator.

use gpnet_env::{ProgramFault, SymbolId, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a run was abandoned.
///
/// Kept distinct so a driver can penalize a program that floods the network
/// differently from one that performs an invalid operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FailureCause {
    /// A node's program signalled a fault
    #[error("program fault: {0}")]
    ProgramFault(#[source] ProgramFault),

    /// A send found no free message buffer
    #[error("message pool exhausted (capacity {capacity})")]
    ResourceExhausted { capacity: usize },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// All requested ticks ran (or the run exited early without error)
    Completed,

    /// A node failed during `tick`; the run stopped there
    Failed {
        tick: u64,
        node: usize,
        cause: FailureCause,
    },
}

/// Per-node view of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Node index
    pub index: usize,

    /// Contents of the node's `current` buffer at the end of the run
    pub final_state: Vec<Value>,

    /// Ticks in which the node received nothing, sent nothing and changed nothing
    pub idle_step_count: u64,

    pub messages_sent: u64,
    pub messages_received: u64,

    /// Node executed `Halt`
    pub halted: bool,
}

impl NodeReport {
    /// Final value of one symbol.
    pub fn value(&self, symbol: SymbolId) -> Value {
        self.final_state.get(symbol.0).copied().unwrap_or(0)
    }
}

/// Network-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Messages scheduled (one per resolved destination)
    pub messages_sent: u64,

    /// Messages placed on a live node's queue
    pub messages_delivered: u64,

    /// Messages that reached a terminated node
    pub messages_dropped: u64,

    /// Highest number of simultaneously undelivered messages
    pub peak_in_flight: usize,

    /// Ticks in which every node was `Unchanged`
    pub idle_ticks: u64,

    /// Length of the all-`Unchanged` streak at the end of the run
    pub consecutive_idle_ticks: u64,
}

/// Everything a fitness evaluator may look at after a run.
///
/// Failed runs still carry the statistics accumulated up to the failing tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub outcome: RunOutcome,

    /// Fully completed ticks
    pub ticks_run: u64,

    pub nodes: Vec<NodeReport>,

    pub stats: RunStats,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Failure cause, if the run failed.
    pub fn failure_cause(&self) -> Option<&FailureCause> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Failed { cause, .. } => Some(cause),
        }
    }

    /// Final value of `symbol` on every node, in node order.
    pub fn symbol_values(&self, symbol: SymbolId) -> Vec<Value> {
        self.nodes.iter().map(|n| n.value(symbol)).collect()
    }

    /// Idle step count of every node, in node order.
    pub fn idle_counts(&self) -> Vec<u64> {
        self.nodes.iter().map(|n| n.idle_step_count).collect()
    }
}
