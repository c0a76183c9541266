//! Voting configuration and presets
//!
//! Presets are data, not code paths: the engine reads whatever thresholds and
//! weights it is given and stays preset-agnostic.

use serde::{Deserialize, Serialize};

/// Tolerance for softmax distributions summing to 1.0.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Threshold for the authoritative binary gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryHeadThresholds {
    /// `probability >= threat_threshold` makes the input a threat candidate.
    /// Equality votes positive by convention.
    pub threat_threshold: f64,
}

/// Threshold applied to a softmax head's top label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionHeadThresholds {
    pub min_probability: f64,
}

/// Threshold applied to each independent harm label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmHeadThresholds {
    pub label_threshold: f64,
}

/// Per-head weights used in the aggregate weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadWeights {
    pub binary: f64,
    pub family: f64,
    pub severity: f64,
    pub technique: f64,
    pub harm: f64,
}

impl HeadWeights {
    pub fn total(&self) -> f64 {
        self.binary + self.family + self.severity + self.technique + self.harm
    }
}

/// Aggregate decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    /// Weighted vote share at or above which the verdict is THREAT.
    pub threat_threshold: f64,
}

/// Full ensemble configuration. Loaded once at process start; read-only for
/// the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingConfig {
    pub binary: BinaryHeadThresholds,
    pub family: DistributionHeadThresholds,
    pub severity: DistributionHeadThresholds,
    pub technique: DistributionHeadThresholds,
    pub harm: HarmHeadThresholds,
    pub weights: HeadWeights,
    pub decision: DecisionThresholds,
    /// When set, the binary-first short-circuit is disabled and every head is
    /// evaluated even for non-candidates. Intended for audit/debug builds.
    pub run_all_heads: bool,
}

impl VotingConfig {
    /// Default trade-off preset.
    pub fn balanced() -> Self {
        Self {
            binary: BinaryHeadThresholds {
                threat_threshold: 0.5,
            },
            family: DistributionHeadThresholds {
                min_probability: 0.5,
            },
            severity: DistributionHeadThresholds {
                min_probability: 0.5,
            },
            technique: DistributionHeadThresholds {
                min_probability: 0.5,
            },
            harm: HarmHeadThresholds {
                label_threshold: 0.5,
            },
            weights: HeadWeights {
                binary: 2.0,
                family: 1.0,
                severity: 1.0,
                technique: 1.0,
                harm: 1.0,
            },
            decision: DecisionThresholds {
                threat_threshold: 0.5,
            },
            run_all_heads: false,
        }
    }

    /// Lower thresholds, more blocking.
    pub fn high_security() -> Self {
        Self {
            binary: BinaryHeadThresholds {
                threat_threshold: 0.35,
            },
            family: DistributionHeadThresholds {
                min_probability: 0.4,
            },
            severity: DistributionHeadThresholds {
                min_probability: 0.4,
            },
            technique: DistributionHeadThresholds {
                min_probability: 0.4,
            },
            harm: HarmHeadThresholds {
                label_threshold: 0.4,
            },
            decision: DecisionThresholds {
                threat_threshold: 0.4,
            },
            ..Self::balanced()
        }
    }

    /// Higher thresholds, fewer false positives.
    pub fn low_fp() -> Self {
        Self {
            binary: BinaryHeadThresholds {
                threat_threshold: 0.7,
            },
            family: DistributionHeadThresholds {
                min_probability: 0.6,
            },
            severity: DistributionHeadThresholds {
                min_probability: 0.6,
            },
            technique: DistributionHeadThresholds {
                min_probability: 0.6,
            },
            harm: HarmHeadThresholds {
                label_threshold: 0.6,
            },
            decision: DecisionThresholds {
                threat_threshold: 0.65,
            },
            ..Self::balanced()
        }
    }

    /// Weights the harm-type head more heavily.
    pub fn harm_focused() -> Self {
        Self {
            harm: HarmHeadThresholds {
                label_threshold: 0.35,
            },
            weights: HeadWeights {
                binary: 2.0,
                family: 1.0,
                severity: 1.0,
                technique: 1.0,
                harm: 2.5,
            },
            ..Self::balanced()
        }
    }

    /// Check thresholds and weights are usable.
    pub fn validate(&self) -> Result<(), String> {
        let thresholds = [
            ("binary", self.binary.threat_threshold),
            ("family", self.family.min_probability),
            ("severity", self.severity.min_probability),
            ("technique", self.technique.min_probability),
            ("harm", self.harm.label_threshold),
            ("decision", self.decision.threat_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} threshold {value} outside [0, 1]"));
            }
        }

        let weights = [
            self.weights.binary,
            self.weights.family,
            self.weights.severity,
            self.weights.technique,
            self.weights.harm,
        ];
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err("head weights must be finite and non-negative".to_string());
        }
        if self.weights.total() <= 0.0 {
            return Err("head weights must not all be zero".to_string());
        }
        Ok(())
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self::balanced()
    }
}
