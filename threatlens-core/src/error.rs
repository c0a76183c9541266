//! Top-level error types for ThreatLens

use thiserror::Error;

/// Errors surfaced at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or malformed scan parameters, rejected synchronously.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Startup-time misconfiguration (bad voting config, empty rule set, ...).
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Policy(#[from] crate::policy::PolicyError),
}
