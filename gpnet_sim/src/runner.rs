//! Scenario runner - executes evaluation scenarios against the engine.

use crate::programs;
use crate::scenarios::ScenarioId;

use gpnet_core::{
    Broadcast, Bytecode, ConfigError, FailureCause, Network, NetworkConfig, Ring, Router,
    RunOutcome, RunResult, SymbolTable,
};
use gpnet_env::{ProgramFault, SeededRandom, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tick at which the `ProgramFault` scenario's program divides by zero.
const FAULT_TICK: u64 = 5;

/// Mixed into the seed for the second run of `FixedDelay`.
const SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// The engine's result; `None` if the network could not be built
    pub run: Option<RunResult>,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

impl ScenarioResult {
    fn rejected(scenario: ScenarioId, seed: u64, err: ConfigError) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            run: None,
            failure_reason: Some(format!("invalid network configuration: {}", err)),
        }
    }

    /// Ticks the underlying run lasted (0 if it never started).
    pub fn ticks_run(&self) -> u64 {
        self.run.as_ref().map_or(0, |r| r.ticks_run)
    }
}

/// Runs evaluation scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Network shape shared by every scenario
    config: NetworkConfig,

    /// Tick budget per run
    max_ticks: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_nodes: usize) -> Self {
        Self {
            seed,
            config: NetworkConfig::default()
                .with_nodes(num_nodes)
                .with_capacity(256),
            max_ticks: 200,
        }
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the whole network configuration.
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the tick budget.
    pub fn with_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Sets the delay window.
    pub fn with_delay(mut self, min_delay: u64, max_delay: u64) -> Self {
        self.config = self.config.with_delay(min_delay, max_delay);
        self
    }

    /// Sets the message pool capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity(capacity);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let verdict = match scenario {
            ScenarioId::RingElection => self.run_ring_election(),
            ScenarioId::BroadcastElection => self.run_broadcast_election(),
            ScenarioId::Silent => self.run_silent(),
            ScenarioId::PoolExhaustion => self.run_pool_exhaustion(),
            ScenarioId::ProgramFault => self.run_program_fault(),
            ScenarioId::FixedDelay => self.run_fixed_delay(),
        };

        let result = match verdict {
            Ok((run, failure_reason)) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: failure_reason.is_none(),
                run: Some(run),
                failure_reason,
            },
            Err(err) => ScenarioResult::rejected(scenario, self.seed, err),
        };

        if result.passed {
            info!(
                ticks = result.ticks_run(),
                "Scenario {} passed",
                scenario.name()
            );
        } else {
            warn!(
                "Scenario {} failed: {}",
                scenario.name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
        result
    }

    /// Builds a network on the standard table and runs it once.
    fn simulate<F>(
        &self,
        config: NetworkConfig,
        build: F,
        router: impl Router + 'static,
        seed: u64,
    ) -> Result<(RunResult, Arc<SymbolTable>), ConfigError>
    where
        F: FnOnce(&SymbolTable) -> Bytecode,
    {
        let table = Arc::new(programs::standard_table());
        let program = Arc::new(build(table.as_ref()));
        let mut network =
            Network::with_program(table.clone(), config, program, router, SeededRandom::new(seed))?;
        let result = network.run(self.max_ticks);

        debug!(
            ticks = result.ticks_run,
            sent = result.stats.messages_sent,
            delivered = result.stats.messages_delivered,
            peak = result.stats.peak_in_flight,
            "Run finished"
        );
        Ok((result, table))
    }

    /// GPN-001: ring election converges on the largest id.
    fn run_ring_election(&self) -> Result<(RunResult, Option<String>), ConfigError> {
        let (run, table) = self.simulate(
            self.config.clone(),
            programs::leader_election,
            Ring,
            self.seed,
        )?;
        let reason = check_converged(&run, &table);
        Ok((run, reason))
    }

    /// GPN-002: broadcast election converges on the largest id.
    fn run_broadcast_election(&self) -> Result<(RunResult, Option<String>), ConfigError> {
        let (run, table) = self.simulate(
            self.config.clone(),
            programs::leader_election_on_change,
            Broadcast,
            self.seed,
        )?;
        let reason = check_converged(&run, &table);
        Ok((run, reason))
    }

    /// GPN-003: a silent program idles on every node for every tick.
    fn run_silent(&self) -> Result<(RunResult, Option<String>), ConfigError> {
        let (run, _) = self.simulate(
            self.config.clone(),
            |_| programs::silent(),
            Broadcast,
            self.seed,
        )?;

        let reason = if let Some(cause) = run.failure_cause() {
            Some(format!("run failed: {}", cause))
        } else if run.ticks_run != self.max_ticks {
            Some(format!("ran {} of {} ticks", run.ticks_run, self.max_ticks))
        } else if run.nodes.iter().any(|n| n.idle_step_count != run.ticks_run) {
            Some(format!("idle counts {:?} != {}", run.idle_counts(), run.ticks_run))
        } else if run.stats.messages_sent != 0 {
            Some(format!("{} messages sent", run.stats.messages_sent))
        } else {
            None
        };
        Ok((run, reason))
    }

    /// GPN-004: two senders, one buffer.
    fn run_pool_exhaustion(&self) -> Result<(RunResult, Option<String>), ConfigError> {
        let nodes = self.config.node_count.max(2);
        let config = self.config.clone().with_nodes(nodes).with_capacity(1);
        let (run, _) = self.simulate(config, programs::flood, Ring, self.seed)?;

        let reason = match run.failure_cause() {
            Some(FailureCause::ResourceExhausted { capacity: 1 }) => None,
            Some(other) => Some(format!("wrong failure cause: {}", other)),
            None => Some("run completed without exhausting the pool".to_string()),
        };
        Ok((run, reason))
    }

    /// GPN-005: division by zero aborts the run at the faulting tick.
    fn run_program_fault(&self) -> Result<(RunResult, Option<String>), ConfigError> {
        let (run, _) = self.simulate(
            self.config.clone(),
            |table| programs::fault_at(table, FAULT_TICK),
            Ring,
            self.seed,
        )?;

        let expected = RunOutcome::Failed {
            tick: FAULT_TICK,
            node: 0,
            cause: FailureCause::ProgramFault(ProgramFault::DivisionByZero),
        };
        let reason = if run.outcome == expected {
            None
        } else {
            Some(format!("expected {:?}, got {:?}", expected, run.outcome))
        };
        Ok((run, reason))
    }

    /// GPN-006: a zero-width delay window makes the seed irrelevant.
    fn run_fixed_delay(&self) -> Result<(RunResult, Option<String>), ConfigError> {
        let delay = self.config.max_delay;
        let config = self.config.clone().with_delay(delay, delay);

        let (first, table) =
            self.simulate(config.clone(), programs::leader_election, Ring, self.seed)?;
        let (second, _) = self.simulate(
            config,
            programs::leader_election,
            Ring,
            self.seed ^ SEED_MIX,
        )?;

        let reason = if first != second {
            Some("runs with different seeds diverged".to_string())
        } else {
            check_converged(&first, &table)
        };
        Ok((first, reason))
    }
}

/// `None` if the run completed with every node holding the largest id.
fn check_converged(run: &RunResult, table: &SymbolTable) -> Option<String> {
    if let Some(cause) = run.failure_cause() {
        return Some(format!("run failed: {}", cause));
    }
    let leader = run.nodes.len().saturating_sub(1) as Value;
    let ids = run.symbol_values(table.node_id_symbol());
    if ids.iter().all(|&id| id == leader) {
        None
    } else {
        Some(format!("ids {:?} did not converge on {}", ids, leader))
    }
}
