//! # threatlens-voting
//!
//! The L2 ensemble voting engine for ThreatLens.
//!
//! Five classifier heads (binary, family, severity, technique, harm) are
//! combined into one THREAT/NO_THREAT verdict with per-head rationale. The
//! binary head is the authoritative gate; the other heads refine candidates
//! through a weighted vote. Four interchangeable presets are provided as
//! plain data: `balanced`, `high_security`, `low_fp`, and `harm_focused`.

pub mod config;
pub mod engine;

pub use config::{
    BinaryHeadThresholds, DecisionThresholds, DistributionHeadThresholds, HarmHeadThresholds,
    HeadWeights, VotingConfig, DISTRIBUTION_TOLERANCE,
};
pub use engine::{VotingEngine, VotingError};
