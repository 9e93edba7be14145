//! Evaluation scenarios for the simulation engine.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioId {
    /// GPN-001: Max-id election on a unidirectional ring
    RingElection,

    /// GPN-002: Max-id election with broadcast gossip on change
    BroadcastElection,

    /// GPN-003: Program that never acts; every node idles every tick
    Silent,

    /// GPN-004: Two senders against a single-buffer pool
    PoolExhaustion,

    /// GPN-005: Program that divides by zero mid-run
    ProgramFault,

    /// GPN-006: Fixed delay window; different seeds, identical runs
    FixedDelay,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::RingElection,
            ScenarioId::BroadcastElection,
            ScenarioId::Silent,
            ScenarioId::PoolExhaustion,
            ScenarioId::ProgramFault,
            ScenarioId::FixedDelay,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::RingElection => "ring_election",
            ScenarioId::BroadcastElection => "broadcast_election",
            ScenarioId::Silent => "silent",
            ScenarioId::PoolExhaustion => "pool_exhaustion",
            ScenarioId::ProgramFault => "program_fault",
            ScenarioId::FixedDelay => "fixed_delay",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::RingElection => "Ring of nodes gossiping ids every tick, verify max-id convergence",
            ScenarioId::BroadcastElection => "Broadcast on id change only, verify max-id convergence",
            ScenarioId::Silent => "No reads, writes or sends; idle count equals ticks run",
            ScenarioId::PoolExhaustion => "Pool of one buffer, two senders; run fails on resource exhaustion",
            ScenarioId::ProgramFault => "Division by zero at tick 5; run fails with a program fault",
            ScenarioId::FixedDelay => "min_delay == max_delay; two seeds produce identical results",
        }
    }

    /// Returns true if the scenario is expected to end in a failed run.
    pub fn expects_failure(&self) -> bool {
        matches!(self, ScenarioId::PoolExhaustion | ScenarioId::ProgramFault)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ring_election" | "ringelection" | "ring" | "gpn-001" => Ok(ScenarioId::RingElection),
            "broadcast_election" | "broadcastelection" | "broadcast" | "gpn-002" => {
                Ok(ScenarioId::BroadcastElection)
            }
            "silent" | "gpn-003" => Ok(ScenarioId::Silent),
            "pool_exhaustion" | "poolexhaustion" | "gpn-004" => Ok(ScenarioId::PoolExhaustion),
            "program_fault" | "programfault" | "fault" | "gpn-005" => Ok(ScenarioId::ProgramFault),
            "fixed_delay" | "fixeddelay" | "gpn-006" => Ok(ScenarioId::FixedDelay),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
