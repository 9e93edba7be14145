//! gpnet Simulation Harness
//!
//! This crate drives the `gpnet_core` engine the way an evolutionary search
//! would: install a program on every node, run the network for a bounded
//! number of ticks, and score what came out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     BatchEvaluator                       │
//! │      (tokio blocking pool, one Network per seed)         │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ ScenarioRunner                                     │  │
//! │  │   programs ──► Network::run ──► RunResult          │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │          │                              │                │
//! │  ┌───────▼─────────┐            ┌───────▼─────┐          │
//! │  │ FitnessProvider │            │  RunExport  │          │
//! │  └─────────────────┘            └─────────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gpnet_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 5).with_ticks(100);
//! let result = runner.run(ScenarioId::RingElection);
//! assert!(result.passed);
//! ```

mod batch;
mod error;
mod exporter;
mod fitness;
mod runner;
pub mod programs;
pub mod scenarios;

pub use batch::{derive_seeds, entropy_seed, mean_fitness, BatchEvaluator};
pub use error::SimError;
pub use exporter::RunExport;
pub use fitness::{
    FailurePenalty, FitnessContext, FitnessProvider, LeaderElectionFitness, ReactivenessFitness,
};
pub use runner::{ScenarioResult, ScenarioRunner};
