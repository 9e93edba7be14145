//! JSON exporter for finished runs.
//!
//! Writes one self-describing document per scenario run: what was run, with
//! which configuration, and everything the engine reported.

use crate::error::SimError;
use crate::runner::{ScenarioResult, ScenarioRunner};

use gpnet_core::{NetworkConfig, RunResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete run export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Network configuration the run used
    pub config: NetworkConfig,

    /// Tick budget
    pub max_ticks: u64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Fitness score, if a provider was applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,

    /// Engine result; absent when the network was never built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
}

impl RunExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, config: NetworkConfig, max_ticks: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            config,
            max_ticks,
            passed: false,
            failure_reason: None,
            fitness: None,
            result: None,
        }
    }

    /// Builds an export from a scenario result and the runner that produced it.
    pub fn from_scenario(runner: &ScenarioRunner, result: &ScenarioResult) -> Self {
        let mut export = Self::new(
            result.scenario.name(),
            result.seed,
            runner.config().clone(),
            runner.max_ticks(),
        );
        export.result = result.run.clone();
        export.finalize(result.passed, result.failure_reason.clone());
        export
    }

    /// Attaches a fitness score.
    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = Some(fitness);
        self
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads an export back from a JSON file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
