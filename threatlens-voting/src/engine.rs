//! Ensemble voting engine (L2)
//!
//! Turns the five classifier head outputs into a single THREAT/NO_THREAT
//! verdict with per-head rationale. The engine performs no inference: it only
//! consumes [`ClassifierOutput`] values produced by an external collaborator.
//! Evaluation is deterministic; identical inputs and config always produce
//! the identical verdict.

use crate::config::{VotingConfig, DISTRIBUTION_TOLERANCE};
use thiserror::Error;
use threatlens_core::types::{
    ClassifierOutput, DistributionOutput, HeadKind, HeadVote, LabelScore, Severity, VoteDecision,
    VotingResult,
};
use tracing::debug;

/// Invalid classifier output or configuration.
#[derive(Debug, Error)]
pub enum VotingError {
    #[error("{head} head distribution sums to {sum}, expected 1.0")]
    InvalidDistribution { head: HeadKind, sum: f64 },

    #[error("{head} head probability {value} outside [0, 1]")]
    InvalidProbability { head: HeadKind, value: f64 },

    #[error("invalid voting config: {0}")]
    InvalidConfig(String),
}

/// The preset-agnostic voting engine.
pub struct VotingEngine {
    config: VotingConfig,
}

impl VotingEngine {
    pub fn new(config: VotingConfig) -> Result<Self, VotingError> {
        config.validate().map_err(VotingError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    /// Evaluate one classifier output.
    ///
    /// Algorithm: the binary head is the authoritative gate
    /// (`probability >= threshold` is a threat candidate; equality votes
    /// positive). The remaining heads run only for candidates unless
    /// `run_all_heads` is set, and can never turn a non-candidate into a
    /// threat. The verdict is a weighted vote share compared against the
    /// aggregate decision threshold.
    pub fn evaluate(&self, output: &ClassifierOutput) -> Result<VotingResult, VotingError> {
        self.validate_output(output)?;
        let cfg = &self.config;

        let binary_p = output.binary.threat;
        let binary_threshold = cfg.binary.threat_threshold;
        let candidate = binary_p >= binary_threshold;
        let binary_vote = HeadVote {
            head: HeadKind::Binary,
            probability: binary_p,
            threshold: binary_threshold,
            vote: candidate,
            margin: binary_p - binary_threshold,
            top_label: None,
        };

        // Binary-first short-circuit: non-candidates skip the remaining heads.
        if !candidate && !cfg.run_all_heads {
            debug!(probability = binary_p, "binary gate negative, short-circuiting");
            return Ok(VotingResult {
                decision: VoteDecision::NoThreat,
                confidence: 1.0 - binary_p,
                severity: Severity::None,
                head_votes: vec![binary_vote],
                techniques: Vec::new(),
                harms: Vec::new(),
            });
        }

        let family_vote = distribution_vote(
            HeadKind::Family,
            &output.family,
            cfg.family.min_probability,
        );
        let severity_vote = distribution_vote(
            HeadKind::Severity,
            &output.severity,
            cfg.severity.min_probability,
        );
        let technique_vote = distribution_vote(
            HeadKind::Technique,
            &output.technique,
            cfg.technique.min_probability,
        );

        let harm_p = output
            .harm
            .scores
            .iter()
            .filter(|s| !is_benign_label(&s.label))
            .map(|s| s.score)
            .fold(0.0, f64::max);
        let harm_vote = HeadVote {
            head: HeadKind::Harm,
            probability: harm_p,
            threshold: cfg.harm.label_threshold,
            vote: harm_p >= cfg.harm.label_threshold,
            margin: harm_p - cfg.harm.label_threshold,
            top_label: None,
        };

        let implied_severity = severity_vote.top_label.clone();
        let head_votes = vec![
            binary_vote,
            family_vote,
            severity_vote,
            technique_vote,
            harm_vote,
        ];

        let w = &cfg.weights;
        let weights = [w.binary, w.family, w.severity, w.technique, w.harm];
        let total_weight = w.total();

        let positive_weight: f64 = head_votes
            .iter()
            .zip(weights)
            .filter(|(vote, _)| vote.vote)
            .map(|(_, weight)| weight)
            .sum();
        let vote_share = positive_weight / total_weight;

        let weighted_probability: f64 = head_votes
            .iter()
            .zip(weights)
            .map(|(vote, weight)| vote.probability * weight)
            .sum::<f64>()
            / total_weight;

        // The binary gate stays authoritative even when all heads ran.
        let decision = if candidate && vote_share >= cfg.decision.threat_threshold {
            VoteDecision::Threat
        } else {
            VoteDecision::NoThreat
        };

        let confidence = match decision {
            VoteDecision::Threat => weighted_probability,
            VoteDecision::NoThreat => 1.0 - weighted_probability,
        };

        let (severity, techniques, harms) = if decision == VoteDecision::Threat {
            let severity = implied_severity
                .as_deref()
                .and_then(Severity::from_label)
                .unwrap_or(Severity::None);
            let techniques = output
                .technique
                .scores
                .iter()
                .filter(|s| !is_benign_label(&s.label) && s.score >= cfg.technique.min_probability)
                .map(|s| s.label.clone())
                .collect();
            let harms = output
                .harm
                .scores
                .iter()
                .filter(|s| !is_benign_label(&s.label) && s.score >= cfg.harm.label_threshold)
                .map(|s| s.label.clone())
                .collect();
            (severity, techniques, harms)
        } else {
            (Severity::None, Vec::new(), Vec::new())
        };

        debug!(?decision, confidence, vote_share, "ensemble vote complete");
        Ok(VotingResult {
            decision,
            confidence,
            severity,
            head_votes,
            techniques,
            harms,
        })
    }

    fn validate_output(&self, output: &ClassifierOutput) -> Result<(), VotingError> {
        if !(0.0..=1.0).contains(&output.binary.threat) {
            return Err(VotingError::InvalidProbability {
                head: HeadKind::Binary,
                value: output.binary.threat,
            });
        }

        for (head, dist) in [
            (HeadKind::Family, &output.family),
            (HeadKind::Severity, &output.severity),
            (HeadKind::Technique, &output.technique),
        ] {
            if !dist.is_normalized(DISTRIBUTION_TOLERANCE) {
                return Err(VotingError::InvalidDistribution {
                    head,
                    sum: dist.sum(),
                });
            }
        }

        // Harm scores are independent sigmoids, not required to sum to
        // anything, but each must be a probability.
        for score in &output.harm.scores {
            if !(0.0..=1.0).contains(&score.score) {
                return Err(VotingError::InvalidProbability {
                    head: HeadKind::Harm,
                    value: score.score,
                });
            }
        }
        Ok(())
    }
}

/// Labels that assert the absence of a threat. Mass on these labels never
/// counts as threat evidence, no matter how confident.
fn is_benign_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("benign") || label.eq_ignore_ascii_case("none")
}

fn distribution_vote(head: HeadKind, dist: &DistributionOutput, threshold: f64) -> HeadVote {
    // The head votes on its strongest threat-indicating label. A distribution
    // whose mass sits on benign/none contributes a negative vote with zero
    // probability. First label wins ties, matching the argmax convention.
    let mut top: Option<&LabelScore> = None;
    for score in &dist.scores {
        if is_benign_label(&score.label) {
            continue;
        }
        if top.map_or(true, |t| score.score > t.score) {
            top = Some(score);
        }
    }

    let probability = top.map_or(0.0, |s| s.score);
    HeadVote {
        head,
        probability,
        threshold,
        vote: top.is_some() && probability >= threshold,
        margin: probability - threshold,
        top_label: top.map(|s| s.label.clone()),
    }
}
