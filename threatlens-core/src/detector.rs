//! Collaborator traits at the pipeline boundary
//!
//! The core never performs model inference or plugin work itself. It consumes
//! a [`Classifier`] for L2 head outputs and an ordered list of [`Detector`]
//! plugins evaluated after the built-in rules. Both are explicit capabilities
//! chosen at configuration time; there is no runtime availability probing.

use crate::types::{ClassifierOutput, Detection};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors a plugin detector may surface. The pipeline isolates these; a
/// failing plugin never aborts a scan.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector failed: {0}")]
    Failed(String),

    #[error("invalid detector input: {0}")]
    InvalidInput(String),
}

/// A pluggable detector producing additional L1-style detections.
///
/// Detectors are registered in an ordered list and evaluated after the core
/// rules. Every invocation is wrapped by the pipeline in a timeout and an
/// error boundary.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detector name, used in diagnostics.
    fn name(&self) -> &str;

    async fn detect(&self, text: &str) -> Result<Vec<Detection>, DetectorError>;

    /// Per-invocation timeout enforced by the pipeline.
    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }
}

/// Errors from the external ML classifier. Any of these degrade the scan to
/// an L1-only result; they are never fatal.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid head output: {0}")]
    InvalidOutput(String),
}

/// The five-head ML classifier, treated as a black box.
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the five head outputs for `text`. The core never embeds or
    /// runs tensors; that is entirely the implementor's concern.
    async fn classify(&self, text: &str) -> Result<ClassifierOutput, ClassifierError>;
}
