//! # threatlens-core
//!
//! Core types and traits for the ThreatLens detection-and-decision pipeline.
//!
//! This crate provides the fundamental building blocks shared by the rule
//! engine, the voting engine, and the pipeline facade:
//! - **Type System**: severity ordering, detections, scan results, classifier
//!   head outputs, voting results, and the final pipeline result
//! - **Policy Model**: tenant policies, hierarchical resolution with an audit
//!   path, and an LRU policy cache
//! - **Collaborator Traits**: async interfaces for the external ML classifier
//!   and for pluggable detectors
//!
//! ## Example
//!
//! ```rust
//! use threatlens_core::policy::{preset_registry, resolve_policy};
//!
//! let mut registry = preset_registry();
//! let resolved = resolve_policy(Some("strict"), None, None, &mut registry, "balanced")
//!     .expect("system default is present");
//! assert_eq!(resolved.policy.id, "strict");
//! ```

pub mod detector;
pub mod error;
pub mod policy;
pub mod types;

// Re-export commonly used types
pub use detector::{Classifier, ClassifierError, Detector, DetectorError};
pub use error::PipelineError;
pub use policy::{
    App, CacheStats, OverrideAction, PolicyCache, PolicyError, PolicyMode, PolicyOverride,
    PolicyRegistry, PolicyResolutionResult, PolicySource, ResolutionSource, Tenant, TenantPolicy,
};
pub use types::{
    BinaryOutput, ClassifierOutput, DecisionAction, Detection, DistributionOutput, HeadKind,
    HeadVote, LabelScore, MultiLabelOutput, PatternMatch, PipelineMetadata, PipelineResult,
    PolicyDecision, RuleFamily, ScanMode, ScanResult, Severity, VoteDecision, VotingResult,
};
