//! Parallel multi-seed evaluation.
//!
//! A single run is strictly sequential. Independent runs are not, so a batch
//! fans every (seed, scenario) pair out to tokio's blocking pool. Each worker
//! builds its own network, and with it its own message pool; nothing is
//! shared between runs but the immutable runner template.

use crate::error::SimError;
use crate::fitness::{FitnessContext, FitnessProvider};
use crate::runner::{ScenarioResult, ScenarioRunner};
use crate::scenarios::ScenarioId;

use gpnet_env::{EntropyRandom, RandomSource, SymbolId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Derives `count` independent run seeds from one master seed.
pub fn derive_seeds(master: u64, count: usize) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(master);
    (0..count).map(|_| rng.gen()).collect()
}

/// Draws a fresh, non-zero master seed from OS entropy.
///
/// Log the returned value: it is what reproduces the runs made from it.
pub fn entropy_seed() -> u64 {
    EntropyRandom::new().uniform_int(1, u64::MAX)
}

/// Runs scenarios across many seeds with bounded parallelism.
pub struct BatchEvaluator {
    runner: ScenarioRunner,
    slots: Arc<Semaphore>,
}

impl BatchEvaluator {
    /// Creates an evaluator running at most `max_parallel` simulations at once.
    pub fn new(runner: ScenarioRunner, max_parallel: usize) -> Self {
        Self {
            runner,
            slots: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// Runs every scenario for every seed.
    ///
    /// Results come back seed-major, in the order of `seeds` then
    /// `scenarios`, regardless of completion order.
    pub async fn evaluate_seeds(
        &self,
        scenarios: &[ScenarioId],
        seeds: &[u64],
    ) -> Result<Vec<ScenarioResult>, SimError> {
        let mut workers = Vec::with_capacity(seeds.len() * scenarios.len());

        for &seed in seeds {
            for &scenario in scenarios {
                let permit = self
                    .slots
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| SimError::Worker(e.to_string()))?;
                let runner = self.runner.clone().with_seed(seed);

                workers.push(tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    runner.run(scenario)
                }));
            }
        }

        let mut results = Vec::with_capacity(workers.len());
        for worker in workers {
            let result = worker
                .await
                .map_err(|e| SimError::Worker(e.to_string()))?;
            results.push(result);
        }

        debug!(runs = results.len(), "Batch complete");
        Ok(results)
    }
}

/// Mean fitness over a batch; runs that never started score zero.
pub fn mean_fitness(
    results: &[ScenarioResult],
    provider: &dyn FitnessProvider,
    id_symbol: SymbolId,
) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match &r.run {
            Some(run) => provider.calculate_fitness(&FitnessContext::from_run(run, id_symbol)),
            None => 0.0,
        })
        .sum();
    total / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::LeaderElectionFitness;
    use crate::programs::standard_table;
    use approx::assert_relative_eq;

    #[test]
    fn test_derive_seeds_deterministic() {
        let a = derive_seeds(42, 8);
        let b = derive_seeds(42, 8);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, derive_seeds(43, 8));
    }

    #[test]
    fn test_entropy_seed_is_usable() {
        let seed = entropy_seed();
        assert_ne!(seed, 0);
        assert_eq!(derive_seeds(seed, 3), derive_seeds(seed, 3));
    }

    proptest::proptest! {
        #[test]
        fn test_derived_seeds_extend_as_prefix(master in proptest::prelude::any::<u64>(), count in 0usize..32) {
            let short = derive_seeds(master, count);
            let long = derive_seeds(master, count + 4);
            proptest::prop_assert_eq!(short.len(), count);
            proptest::prop_assert_eq!(&long[..count], &short[..]);
        }
    }

    #[tokio::test]
    async fn test_results_in_seed_order() {
        let evaluator = BatchEvaluator::new(ScenarioRunner::new(0, 3).with_ticks(40), 2);
        let seeds = [5, 1, 9];
        let scenarios = [ScenarioId::RingElection, ScenarioId::Silent];

        let results = evaluator.evaluate_seeds(&scenarios, &seeds).await.unwrap();

        assert_eq!(results.len(), 6);
        let order: Vec<_> = results.iter().map(|r| (r.seed, r.scenario)).collect();
        assert_eq!(
            order,
            vec![
                (5, ScenarioId::RingElection),
                (5, ScenarioId::Silent),
                (1, ScenarioId::RingElection),
                (1, ScenarioId::Silent),
                (9, ScenarioId::RingElection),
                (9, ScenarioId::Silent),
            ]
        );
        assert!(results.iter().all(|r| r.passed));
    }

    #[tokio::test]
    async fn test_batch_matches_sequential() {
        let runner = ScenarioRunner::new(0, 4).with_ticks(30);
        let evaluator = BatchEvaluator::new(runner.clone(), 4);
        let seeds = derive_seeds(7, 4);

        let batch = evaluator
            .evaluate_seeds(&[ScenarioId::BroadcastElection], &seeds)
            .await
            .unwrap();

        for (result, &seed) in batch.iter().zip(&seeds) {
            let sequential = runner.clone().with_seed(seed).run(ScenarioId::BroadcastElection);
            assert_eq!(result.run, sequential.run);
        }
    }

    #[tokio::test]
    async fn test_mean_fitness_of_faulted_batch() {
        let evaluator = BatchEvaluator::new(ScenarioRunner::new(0, 3).with_ticks(40), 2);
        let results = evaluator
            .evaluate_seeds(&[ScenarioId::ProgramFault], &[1, 2])
            .await
            .unwrap();

        let id = standard_table().node_id_symbol();
        let fitness = mean_fitness(&results, &LeaderElectionFitness::default(), id);

        // Faulted runs score zero
        assert_relative_eq!(fitness, 0.0);
        assert_relative_eq!(mean_fitness(&[], &LeaderElectionFitness::default(), id), 0.0);
    }
}
