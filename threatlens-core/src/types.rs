//! Core type definitions for ThreatLens
//!
//! This module defines the fundamental types used throughout the workspace:
//! - Severity ordering and scan modes
//! - L1 detections, matches, and scan results
//! - L2 classifier head outputs and voting results
//! - The final pipeline result consumed by telemetry collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ordinal threat severity.
///
/// Derives `Ord` so that `NONE < LOW < MEDIUM < HIGH < CRITICAL` holds as a
/// strict total order (variant declaration order is the comparison order).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a classifier severity-head label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Scan mode selecting the rule subset and latency target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Low-cost rule subset only, target < 3ms for the whole L1 pass.
    Fast,
    /// Full rule set, P95 target < 10ms.
    #[default]
    Balanced,
    /// Full rule set, no latency target.
    Thorough,
}

impl ScanMode {
    /// Soft latency target for this mode. Exceeding it never fails a scan;
    /// it is surfaced through `PipelineMetadata::deadline_exceeded`.
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            Self::Fast => Some(Duration::from_millis(3)),
            Self::Balanced => Some(Duration::from_millis(10)),
            Self::Thorough => None,
        }
    }
}

/// Threat family a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    PromptInjection,
    Jailbreak,
    DataExfiltration,
    CredentialLeak,
    Pii,
    Obfuscation,
}

/// A single positional pattern match.
///
/// The matched substring and its surrounding context are carried faithfully
/// for local explainability. Stripping them before any external transmission
/// is the telemetry serializer's responsibility, not this type's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Index of the pattern within its rule.
    pub pattern_index: usize,
    /// Byte offset where the match starts.
    pub start: usize,
    /// Byte offset one past the end of the match.
    pub end: usize,
    /// The matched substring.
    pub text: String,
    /// Capture group contents, in group order.
    pub captures: Vec<String>,
    /// Bounded context preceding the match.
    pub context_before: String,
    /// Bounded context following the match.
    pub context_after: String,
}

/// A single L1 rule hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub rule_id: String,
    pub rule_version: String,
    pub family: RuleFamily,
    pub severity: Severity,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub matches: Vec<PatternMatch>,
    pub detected_at: DateTime<Utc>,
}

/// Result of the L1 rule pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Detections in rule evaluation order.
    pub detections: Vec<Detection>,
    pub scanned_at: DateTime<Utc>,
    /// Length of the scanned input, in bytes.
    pub input_len: usize,
    /// Number of rules evaluated for this scan (mode-dependent).
    pub rules_evaluated: usize,
    pub duration: Duration,
}

impl ScanResult {
    /// Highest severity among detections, `Severity::None` when empty.
    pub fn max_severity(&self) -> Severity {
        self.detections
            .iter()
            .map(|d| d.severity)
            .max()
            .unwrap_or(Severity::None)
    }

    /// Highest confidence among detections at the given severity.
    pub fn max_confidence_at(&self, severity: Severity) -> f64 {
        self.detections
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.confidence)
            .fold(0.0, f64::max)
    }
}

/// One labeled probability from a classifier head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Binary head output: probability that the input is a threat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryOutput {
    pub threat: f64,
}

/// Softmax head output: label probabilities summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionOutput {
    pub scores: Vec<LabelScore>,
}

impl DistributionOutput {
    pub fn new(scores: Vec<LabelScore>) -> Self {
        Self { scores }
    }

    pub fn sum(&self) -> f64 {
        self.scores.iter().map(|s| s.score).sum()
    }

    /// Highest-probability label, ties broken by first occurrence.
    pub fn top(&self) -> Option<&LabelScore> {
        self.scores
            .iter()
            .reduce(|best, s| if s.score > best.score { s } else { best })
    }

    /// Whether the distribution sums to 1.0 within `tolerance`.
    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.sum() - 1.0).abs() <= tolerance
    }
}

/// Sigmoid head output: independent per-label probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLabelOutput {
    pub scores: Vec<LabelScore>,
}

impl MultiLabelOutput {
    pub fn new(scores: Vec<LabelScore>) -> Self {
        Self { scores }
    }

    pub fn max_score(&self) -> f64 {
        self.scores.iter().map(|s| s.score).fold(0.0, f64::max)
    }
}

/// Raw output of the five-head classifier for one input.
///
/// Produced by an external `Classifier` collaborator; the core never performs
/// inference itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutput {
    pub binary: BinaryOutput,
    pub family: DistributionOutput,
    pub severity: DistributionOutput,
    pub technique: DistributionOutput,
    pub harm: MultiLabelOutput,
}

/// Ensemble verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDecision {
    Threat,
    NoThreat,
}

/// Identifies one of the five classifier heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadKind {
    Binary,
    Family,
    Severity,
    Technique,
    Harm,
}

impl std::fmt::Display for HeadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Binary => "binary",
            Self::Family => "family",
            Self::Severity => "severity",
            Self::Technique => "technique",
            Self::Harm => "harm",
        };
        f.write_str(name)
    }
}

/// Per-head vote rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadVote {
    pub head: HeadKind,
    /// Raw probability the vote was taken on (top-label probability for
    /// distribution heads, max label probability for the harm head).
    pub probability: f64,
    /// Threshold applied to this head.
    pub threshold: f64,
    /// Vote outcome; `probability >= threshold` votes positive.
    pub vote: bool,
    /// Signed distance from the threshold (`probability - threshold`).
    pub margin: f64,
    /// Top label for distribution heads, absent for the binary head.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_label: Option<String>,
}

/// Result of the L2 ensemble vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingResult {
    pub decision: VoteDecision,
    /// Aggregate confidence in the decision, in [0, 1].
    pub confidence: f64,
    /// Severity implied by the severity head when the decision is THREAT,
    /// `Severity::None` otherwise.
    pub severity: Severity,
    /// One entry per evaluated head, binary first.
    pub head_votes: Vec<HeadVote>,
    /// Technique labels at or above the technique-head threshold.
    pub techniques: Vec<String>,
    /// Harm labels at or above the harm-head threshold.
    pub harms: Vec<String>,
}

impl VotingResult {
    pub fn is_threat(&self) -> bool {
        self.decision == VoteDecision::Threat
    }
}

/// Final per-scan action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Allow,
    Warn,
    Block,
}

/// The action taken plus where the governing policy came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub action: DecisionAction,
    pub policy_id: String,
    pub source: crate::policy::ResolutionSource,
}

/// Observability metadata attached to every pipeline result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub mode: ScanMode,
    pub duration: Duration,
    /// True when L2 was not attempted (fast mode, L1 critical short-circuit,
    /// or L2 disabled by request/policy).
    pub l2_skipped: bool,
    /// True when L2 was attempted but the classifier was unavailable or
    /// returned unusable output; the scan degraded to L1-only.
    pub l2_unavailable: bool,
    /// True when the mode's soft latency target was exceeded.
    pub deadline_exceeded: bool,
}

/// Combined decision with full provenance, consumed by the caller and by the
/// external telemetry sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub scan: ScanResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting: Option<VotingResult>,
    /// Maximum severity across L1 detections and the L2 verdict.
    pub combined_severity: Severity,
    pub total_detections: usize,
    pub should_block: bool,
    pub decision: PolicyDecision,
    pub metadata: PipelineMetadata,
}
