//! Fitness evaluation over finished runs.
//!
//! The engine reports raw state; this module turns a [`RunResult`] into the
//! scalar an evolutionary driver ranks candidates by. Higher is better.

use gpnet_core::{FailureCause, RunResult};
use gpnet_env::SymbolId;

/// Metrics derived from one run, handed to a [`FitnessProvider`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitnessContext {
    /// Ticks the run lasted
    pub ticks_run: u64,

    /// 1 - mean fraction of ticks each node spent idle (0.0 = never acted)
    pub reactiveness: f64,

    /// Fraction of nodes whose id symbol holds the largest node id
    pub correctness: f64,

    /// Messages scheduled per tick (spam metric)
    pub msgs_per_tick: f64,

    /// Why the run failed, if it did
    pub failure: Option<FailureCause>,
}

impl FitnessContext {
    /// Derives fitness metrics from a run.
    ///
    /// Node ids are seeded from node indices, so the legitimate leader of an
    /// `n`-node network is `n - 1`.
    pub fn from_run(result: &RunResult, id_symbol: SymbolId) -> Self {
        let nodes = result.nodes.len();
        let ticks = result.ticks_run;

        let reactiveness = if ticks == 0 || nodes == 0 {
            0.0
        } else {
            let idle_fraction: f64 = result
                .nodes
                .iter()
                .map(|n| n.idle_step_count.min(ticks) as f64 / ticks as f64)
                .sum::<f64>()
                / nodes as f64;
            1.0 - idle_fraction
        };

        let correctness = if nodes == 0 {
            0.0
        } else {
            let leader = (nodes - 1) as i64;
            let agreeing = result
                .symbol_values(id_symbol)
                .into_iter()
                .filter(|&v| v == leader)
                .count();
            agreeing as f64 / nodes as f64
        };

        let msgs_per_tick = if ticks == 0 {
            0.0
        } else {
            result.stats.messages_sent as f64 / ticks as f64
        };

        Self {
            ticks_run: ticks,
            reactiveness,
            correctness,
            msgs_per_tick,
            failure: result.failure_cause().cloned(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Trait for fitness calculation strategies.
pub trait FitnessProvider: Send + Sync {
    /// Calculate fitness score based on the provided context.
    /// Higher is better.
    fn calculate_fitness(&self, ctx: &FitnessContext) -> f64;

    /// Returns the name of this provider.
    fn name(&self) -> &str;
}

/// Scale applied to a failed run's score, per failure cause.
///
/// Defaults: a program fault scores zero, resource exhaustion keeps a tenth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailurePenalty {
    pub program_fault: f64,
    pub resource_exhausted: f64,
}

impl Default for FailurePenalty {
    fn default() -> Self {
        Self {
            program_fault: 0.0,
            resource_exhausted: 0.1,
        }
    }
}

impl FailurePenalty {
    fn apply(&self, failure: Option<&FailureCause>, score: f64) -> f64 {
        match failure {
            None => score,
            Some(FailureCause::ProgramFault(_)) => score * self.program_fault,
            Some(FailureCause::ResourceExhausted { .. }) => score * self.resource_exhausted,
        }
    }
}

/// Leader-election fitness.
/// Fitness = w_c * Correctness + w_r * Reactiveness - Cost * MsgsPerTick
pub struct LeaderElectionFitness {
    pub w_correctness: f64,
    pub w_reactiveness: f64,
    pub bandwidth_cost_factor: f64,
    pub penalty: FailurePenalty,
}

impl LeaderElectionFitness {
    pub fn new() -> Self {
        Self {
            w_correctness: 100.0,
            w_reactiveness: 10.0,
            bandwidth_cost_factor: 0.5,
            penalty: FailurePenalty::default(),
        }
    }
}

impl Default for LeaderElectionFitness {
    fn default() -> Self {
        Self::new()
    }
}

impl FitnessProvider for LeaderElectionFitness {
    fn calculate_fitness(&self, ctx: &FitnessContext) -> f64 {
        let score = (self.w_correctness * ctx.correctness)
            + (self.w_reactiveness * ctx.reactiveness)
            - (self.bandwidth_cost_factor * ctx.msgs_per_tick);

        self.penalty.apply(ctx.failure.as_ref(), score.max(0.0))
    }

    fn name(&self) -> &str {
        "LeaderElectionFitness"
    }
}

/// Rewards nodes that keep doing something, for classifier-style agents.
/// Fitness = 100 * Reactiveness
pub struct ReactivenessFitness {
    pub penalty: FailurePenalty,
}

impl ReactivenessFitness {
    pub fn new() -> Self {
        Self {
            penalty: FailurePenalty::default(),
        }
    }
}

impl Default for ReactivenessFitness {
    fn default() -> Self {
        Self::new()
    }
}

impl FitnessProvider for ReactivenessFitness {
    fn calculate_fitness(&self, ctx: &FitnessContext) -> f64 {
        self.penalty
            .apply(ctx.failure.as_ref(), 100.0 * ctx.reactiveness)
    }

    fn name(&self) -> &str {
        "ReactivenessFitness"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gpnet_core::{NodeReport, RunOutcome, RunStats};
    use gpnet_env::ProgramFault;

    const ID: SymbolId = SymbolId(1);

    fn node(index: usize, id: i64, idle: u64) -> NodeReport {
        NodeReport {
            index,
            final_state: vec![0, id],
            idle_step_count: idle,
            messages_sent: 0,
            messages_received: 0,
            halted: false,
        }
    }

    fn result(outcome: RunOutcome, nodes: Vec<NodeReport>, sent: u64) -> RunResult {
        RunResult {
            outcome,
            ticks_run: 10,
            nodes,
            stats: RunStats {
                messages_sent: sent,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_context_from_converged_run() {
        let run = result(
            RunOutcome::Completed,
            vec![node(0, 2, 0), node(1, 2, 5), node(2, 2, 10)],
            20,
        );
        let ctx = FitnessContext::from_run(&run, ID);

        assert_relative_eq!(ctx.correctness, 1.0);
        assert_relative_eq!(ctx.reactiveness, 0.5);
        assert_relative_eq!(ctx.msgs_per_tick, 2.0);
        assert!(!ctx.is_failed());
    }

    #[test]
    fn test_context_partial_agreement() {
        let run = result(
            RunOutcome::Completed,
            vec![node(0, 0, 10), node(1, 3, 10), node(2, 2, 10), node(3, 3, 10)],
            0,
        );
        let ctx = FitnessContext::from_run(&run, ID);

        assert_relative_eq!(ctx.correctness, 0.5);
        assert_relative_eq!(ctx.reactiveness, 0.0);
    }

    #[test]
    fn test_context_zero_ticks() {
        let mut run = result(RunOutcome::Completed, vec![node(0, 0, 0)], 3);
        run.ticks_run = 0;
        let ctx = FitnessContext::from_run(&run, ID);

        assert_relative_eq!(ctx.reactiveness, 0.0);
        assert_relative_eq!(ctx.msgs_per_tick, 0.0);
    }

    #[test]
    fn test_leader_election_fitness() {
        let fitness = LeaderElectionFitness::default();
        let ctx = FitnessContext {
            ticks_run: 10,
            reactiveness: 0.5,
            correctness: 1.0,
            msgs_per_tick: 2.0,
            failure: None,
        };

        assert_relative_eq!(fitness.calculate_fitness(&ctx), 100.0 + 5.0 - 1.0);
        assert_eq!(fitness.name(), "LeaderElectionFitness");
    }

    #[test]
    fn test_failure_penalties_differ_by_cause() {
        let fitness = LeaderElectionFitness::default();
        let base = FitnessContext {
            ticks_run: 4,
            reactiveness: 1.0,
            correctness: 1.0,
            msgs_per_tick: 0.0,
            failure: None,
        };

        let faulted = FitnessContext {
            failure: Some(FailureCause::ProgramFault(ProgramFault::StackUnderflow)),
            ..base.clone()
        };
        let flooded = FitnessContext {
            failure: Some(FailureCause::ResourceExhausted { capacity: 4 }),
            ..base.clone()
        };

        assert_relative_eq!(fitness.calculate_fitness(&base), 110.0);
        assert_relative_eq!(fitness.calculate_fitness(&faulted), 0.0);
        assert_relative_eq!(fitness.calculate_fitness(&flooded), 11.0);
    }

    #[test]
    fn test_reactiveness_fitness() {
        let fitness = ReactivenessFitness::default();
        let run = result(
            RunOutcome::Failed {
                tick: 10,
                node: 0,
                cause: FailureCause::ResourceExhausted { capacity: 1 },
            },
            vec![node(0, 0, 2), node(1, 1, 4)],
            0,
        );
        let ctx = FitnessContext::from_run(&run, ID);

        assert_relative_eq!(ctx.reactiveness, 0.7, epsilon = 1e-9);
        assert_relative_eq!(fitness.calculate_fitness(&ctx), 7.0, epsilon = 1e-9);
    }
}
