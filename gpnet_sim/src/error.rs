//! Harness errors.

use gpnet_core::ConfigError;
use thiserror::Error;

/// Errors surfaced by the harness outside of a simulation run.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid network configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("batch worker failed: {0}")]
    Worker(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
}
