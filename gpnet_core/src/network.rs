//! Network - lock-step simulation driver.
//!
//! # Tick structure
//!
//! ```text
//! for tick in 0..max_ticks:
//!     for node in nodes (index order):
//!         outcome = node.step()            // consume ≤1 message, roll, execute
//!         Error → abort run (Failed)
//!         outbox → router → schedule(tick + uniform[min_delay, max_delay])
//!     deliver everything due at tick + 1 onto destination queues
//!     track all-Unchanged streaks
//! ```
//!
//! Node order is fixed by index and messages due on the same tick are
//! delivered in scheduling order, so the delay draws from the seeded random
//! source are the only thing that varies between seeds.

use crate::error::ConfigError;
use crate::node::{Node, StepError, StepOutcome};
use crate::pool::{MessageHandle, MessagePool};
use crate::result::{FailureCause, NodeReport, RunOutcome, RunResult, RunStats};
use crate::router::Router;
use crate::schedule::DeliverySchedule;
use crate::symbols::SymbolTable;

use gpnet_env::{Program, RandomSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of nodes
    pub node_count: usize,

    /// Smallest propagation delay in ticks (>= 1)
    pub min_delay: u64,

    /// Largest propagation delay in ticks (>= min_delay)
    pub max_delay: u64,

    /// Cap on undelivered messages; also the message pool capacity
    pub max_pending_messages: usize,

    /// End the run early after this many all-idle ticks with nothing in flight
    pub quiescence_ticks: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            min_delay: 1,
            max_delay: 3,
            max_pending_messages: 64,
            quiescence_ticks: None,
        }
    }
}

impl NetworkConfig {
    /// Sets the node count.
    pub fn with_nodes(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    /// Sets the delay window.
    pub fn with_delay(mut self, min_delay: u64, max_delay: u64) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        self
    }

    /// Sets the pending-message cap.
    pub fn with_capacity(mut self, max_pending_messages: usize) -> Self {
        self.max_pending_messages = max_pending_messages;
        self
    }

    /// Enables the quiescence early exit.
    pub fn with_quiescence(mut self, ticks: u64) -> Self {
        self.quiescence_ticks = Some(ticks);
        self
    }

    /// Checks the invariants `node_count > 0`, `0 < min <= max`, capacity > 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_count == 0 {
            return Err(ConfigError::NoNodes);
        }
        if self.min_delay == 0 || self.min_delay > self.max_delay {
            return Err(ConfigError::InvalidDelay {
                min: self.min_delay,
                max: self.max_delay,
            });
        }
        if self.max_pending_messages == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

/// The simulated network: nodes, message pool, delivery schedule.
pub struct Network<R: RandomSource> {
    config: NetworkConfig,
    table: Arc<SymbolTable>,
    nodes: Vec<Node>,
    pool: MessagePool,
    schedule: DeliverySchedule,
    router: Box<dyn Router>,
    rng: R,

    /// Scratch buffer for router output
    destinations: Vec<usize>,

    /// Counters for the current run
    stats: RunStats,
}

impl<R: RandomSource> Network<R> {
    /// Builds a network whose nodes get their programs from `program_provider`.
    ///
    /// # Arguments
    /// * `table` - Symbol layout shared by every node
    /// * `config` - Node count, delay window, pending-message cap
    /// * `program_provider` - Called once per node index, in order
    /// * `router` - Destination resolution for sent payloads
    /// * `rng` - Source of message delays
    pub fn new<P>(
        table: Arc<SymbolTable>,
        config: NetworkConfig,
        mut program_provider: P,
        router: impl Router + 'static,
        rng: R,
    ) -> Result<Self, ConfigError>
    where
        P: FnMut(usize) -> Arc<dyn Program>,
    {
        config.validate()?;
        table.validate()?;

        let nodes = (0..config.node_count)
            .map(|i| Node::new(i, config.node_count, table.clone(), program_provider(i)))
            .collect();

        Ok(Self {
            pool: MessagePool::new(config.max_pending_messages, table.payload_size()),
            schedule: DeliverySchedule::new(),
            destinations: Vec::with_capacity(config.node_count),
            router: Box::new(router),
            stats: RunStats::default(),
            nodes,
            table,
            config,
            rng,
        })
    }

    /// Builds a network where every node runs the same program.
    pub fn with_program(
        table: Arc<SymbolTable>,
        config: NetworkConfig,
        program: Arc<dyn Program>,
        router: impl Router + 'static,
        rng: R,
    ) -> Result<Self, ConfigError> {
        Self::new(table, config, |_| program.clone(), router, rng)
    }

    /// Builds a network with one program per node.
    pub fn with_programs(
        table: Arc<SymbolTable>,
        config: NetworkConfig,
        programs: Vec<Arc<dyn Program>>,
        router: impl Router + 'static,
        rng: R,
    ) -> Result<Self, ConfigError> {
        if programs.len() != config.node_count {
            return Err(ConfigError::ProgramCount {
                expected: config.node_count,
                got: programs.len(),
            });
        }
        Self::new(table, config, |i| programs[i].clone(), router, rng)
    }

    /// Runs the simulation for at most `max_ticks` ticks.
    ///
    /// Every call starts from freshly seeded node memory. The random source
    /// is not rewound, so repeat runs on one instance draw new delays.
    pub fn run(&mut self, max_ticks: u64) -> RunResult {
        self.begin_simulation();

        debug!(
            nodes = self.nodes.len(),
            max_ticks,
            seed = self.rng.seed(),
            "Starting run"
        );

        let mut consecutive_idle = 0u64;

        for tick in 0..max_ticks {
            let mut all_unchanged = true;

            for i in 0..self.nodes.len() {
                match self.nodes[i].step(&mut self.pool) {
                    StepOutcome::Unchanged => {}
                    StepOutcome::Changed => all_unchanged = false,
                    StepOutcome::Error(err) => {
                        let cause = match err {
                            StepError::Fault(fault) => FailureCause::ProgramFault(fault),
                            StepError::PoolExhausted => FailureCause::ResourceExhausted {
                                capacity: self.pool.capacity(),
                            },
                        };
                        return self.fail(tick, i, cause, consecutive_idle);
                    }
                }

                if let Some(handle) = self.nodes[i].take_outbox() {
                    if let Err(cause) = self.dispatch(i, handle, tick) {
                        return self.fail(tick, i, cause, consecutive_idle);
                    }
                }
            }

            self.deliver_due(tick + 1);

            if all_unchanged {
                consecutive_idle += 1;
                self.stats.idle_ticks += 1;
            } else {
                consecutive_idle = 0;
            }

            if self.nodes.iter().all(|n| n.is_terminated()) {
                debug!(tick, "All nodes halted");
                return self.finish(tick + 1, consecutive_idle);
            }

            if let Some(window) = self.config.quiescence_ticks {
                if consecutive_idle >= window && self.pool.in_use() == 0 {
                    debug!(tick, window, "Network quiescent");
                    return self.finish(tick + 1, consecutive_idle);
                }
            }
        }

        self.finish(max_ticks, consecutive_idle)
    }

    /// Resets nodes, pool, schedule and counters.
    fn begin_simulation(&mut self) {
        let pool = &mut self.pool;
        self.schedule.clear(|handle| pool.release(handle));
        for node in &mut self.nodes {
            node.begin_simulation(&mut self.pool);
        }
        self.pool.reset();
        self.stats = RunStats::default();
    }

    /// Resolves destinations for a sent message and schedules one copy each.
    fn dispatch(&mut self, from: usize, handle: MessageHandle, tick: u64) -> Result<(), FailureCause> {
        let mut dests = std::mem::take(&mut self.destinations);
        dests.clear();

        let node_count = self.nodes.len();
        self.router
            .resolve(from, self.pool.payload(&handle), node_count, &mut dests);
        dests.retain(|&d| d < node_count);

        let result = self.schedule_copies(&dests, handle, tick);
        self.destinations = dests;
        result
    }

    fn schedule_copies(
        &mut self,
        dests: &[usize],
        handle: MessageHandle,
        tick: u64,
    ) -> Result<(), FailureCause> {
        let Some((&last, rest)) = dests.split_last() else {
            // Nobody to send to
            self.pool.release(handle);
            return Ok(());
        };

        for &dest in rest {
            let Some(copy) = self.pool.duplicate(&handle) else {
                self.pool.release(handle);
                return Err(FailureCause::ResourceExhausted {
                    capacity: self.pool.capacity(),
                });
            };
            self.schedule_one(copy, dest, tick);
        }
        self.schedule_one(handle, last, tick);
        Ok(())
    }

    fn schedule_one(&mut self, handle: MessageHandle, dest: usize, tick: u64) {
        let delay = self
            .rng
            .uniform_int(self.config.min_delay, self.config.max_delay);
        let arrival_tick = tick.saturating_add(delay);

        let message = self.pool.message_mut(&handle);
        message.destination = dest;
        message.arrival_tick = arrival_tick;

        self.schedule.schedule(arrival_tick, handle);
        self.stats.messages_sent += 1;
    }

    /// Moves every message due at `arrival_tick` onto its destination queue.
    fn deliver_due(&mut self, arrival_tick: u64) {
        let nodes = &mut self.nodes;
        let pool = &mut self.pool;
        let stats = &mut self.stats;

        self.schedule.drain_due(arrival_tick, |handle| {
            let dest = pool.message(&handle).destination;
            let node = &mut nodes[dest];
            if node.is_terminated() {
                pool.release(handle);
                stats.messages_dropped += 1;
            } else {
                trace!(arrival_tick, dest, slot = handle.slot(), "Delivered");
                node.enqueue(handle);
                stats.messages_delivered += 1;
            }
        });
    }

    fn fail(&mut self, tick: u64, node: usize, cause: FailureCause, consecutive_idle: u64) -> RunResult {
        debug!(tick, node, %cause, "Run failed");
        self.stats.consecutive_idle_ticks = consecutive_idle;
        self.report(RunOutcome::Failed { tick, node, cause }, tick)
    }

    fn finish(&mut self, ticks_run: u64, consecutive_idle: u64) -> RunResult {
        debug!(ticks_run, sent = self.stats.messages_sent, "Run completed");
        self.stats.consecutive_idle_ticks = consecutive_idle;
        self.report(RunOutcome::Completed, ticks_run)
    }

    fn report(&self, outcome: RunOutcome, ticks_run: u64) -> RunResult {
        let nodes = self
            .nodes
            .iter()
            .map(|n| NodeReport {
                index: n.index(),
                final_state: n.memory().current().to_vec(),
                idle_step_count: n.idle_step_count(),
                messages_sent: n.messages_sent(),
                messages_received: n.messages_received(),
                halted: n.is_terminated(),
            })
            .collect();

        let mut stats = self.stats.clone();
        stats.peak_in_flight = self.pool.peak_in_use();
        stats.messages_dropped += self.nodes.iter().map(|n| n.messages_dropped()).sum::<u64>();

        RunResult {
            outcome,
            ticks_run,
            nodes,
            stats,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Returns the shared symbol table.
    pub fn table(&self) -> &Arc<SymbolTable> {
        &self.table
    }

    /// Returns all nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Messages scheduled but not yet on a node's queue.
    pub fn in_flight(&self) -> usize {
        self.schedule.in_flight()
    }
}
