//! Merge stage: combines L1 findings, the L2 verdict, and the resolved
//! policy into one decision with full provenance.
//!
//! The blocking decision is evaluated over the union of L1 and L2 evidence.
//! A scan with zero rule matches but a qualifying L2-only verdict blocks
//! exactly like a rule hit of the same severity would.

use threatlens_core::policy::{
    OverrideAction, PolicyOverride, PolicyResolutionResult,
};
use threatlens_core::types::{
    DecisionAction, Detection, PipelineMetadata, PipelineResult, PolicyDecision, ScanResult,
    Severity, VotingResult,
};
use tracing::debug;

/// Combine the scan evidence under the resolved policy.
///
/// `confidence_override`, when present, replaces the policy's
/// `block_confidence_threshold` for this call only. Overrides are applied per
/// Detection after the baseline evaluation: `Suppress` removes matching
/// detections from the blocking calculation, `ForceBlock` escalates whenever
/// a matching detection survives.
pub fn merge(
    scan: ScanResult,
    voting: Option<VotingResult>,
    resolution: &PolicyResolutionResult,
    overrides: &[PolicyOverride],
    confidence_override: Option<f64>,
    metadata: PipelineMetadata,
) -> PipelineResult {
    let policy = &resolution.policy;

    let suppressed = |d: &Detection| {
        overrides
            .iter()
            .any(|o| o.action == OverrideAction::Suppress && o.applies_to(d))
    };
    let active: Vec<&Detection> = scan.detections.iter().filter(|d| !suppressed(d)).collect();

    let l1_severity = active
        .iter()
        .map(|d| d.severity)
        .max()
        .unwrap_or(Severity::None);
    let l1_confidence = active
        .iter()
        .filter(|d| d.severity == l1_severity)
        .map(|d| d.confidence)
        .fold(0.0, f64::max);

    // The L2 verdict counts as evidence only when it is a THREAT at or above
    // the policy's L2 confidence floor.
    let l2_evidence = voting
        .as_ref()
        .filter(|v| v.is_threat() && v.confidence >= policy.l2_threat_threshold)
        .map(|v| (v.severity, v.confidence));

    let combined_severity = match l2_evidence {
        Some((l2_severity, _)) => l1_severity.max(l2_severity),
        None => l1_severity,
    };

    // Confidence comes from whichever side produced the combined severity;
    // when both sides tie, the stronger confidence qualifies.
    let mut qualifying_confidence: f64 = 0.0;
    if combined_severity > Severity::None {
        if l1_severity == combined_severity {
            qualifying_confidence = l1_confidence;
        }
        if let Some((l2_severity, l2_confidence)) = l2_evidence {
            if l2_severity == combined_severity {
                qualifying_confidence = qualifying_confidence.max(l2_confidence);
            }
        }
    }

    let confidence_threshold =
        confidence_override.unwrap_or(policy.block_confidence_threshold);

    let mut should_block = policy.blocking_enabled
        && combined_severity >= policy.block_severity_threshold
        && qualifying_confidence >= confidence_threshold;

    if active.iter().any(|d| {
        overrides
            .iter()
            .any(|o| o.action == OverrideAction::ForceBlock && o.applies_to(d))
    }) {
        debug!("force-block override matched");
        should_block = true;
    }

    let has_threat_evidence = combined_severity > Severity::None || l2_evidence.is_some();
    let action = if should_block {
        DecisionAction::Block
    } else if has_threat_evidence {
        DecisionAction::Warn
    } else {
        DecisionAction::Allow
    };

    let total_detections = scan.detections.len();
    PipelineResult {
        scan,
        voting,
        combined_severity,
        total_detections,
        should_block,
        decision: PolicyDecision {
            action,
            policy_id: policy.id.clone(),
            source: resolution.source,
        },
        metadata,
    }
}
