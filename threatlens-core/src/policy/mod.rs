//! Tenant policy model and hierarchical resolution
//!
//! Policies are immutable value objects supplied by an external registry.
//! Resolution walks a four-level fallback chain (request override, app
//! default, tenant default, system default) and records every level in an
//! audit path regardless of outcome.

pub mod cache;

pub use cache::{CacheStats, PolicyCache};

use crate::types::{Detection, RuleFamily, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Baseline enforcement posture of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Monitor,
    Balanced,
    Strict,
}

/// Mode-based tenant policy: the baseline thresholds applied to a scan.
///
/// Immutable once loaded. Distinct from [`PolicyOverride`], which applies
/// condition-based adjustments per Detection after the baseline evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPolicy {
    pub id: String,
    pub name: String,
    /// `None` means a global preset usable by any tenant.
    pub tenant_id: Option<String>,
    pub mode: PolicyMode,
    pub blocking_enabled: bool,
    pub block_severity_threshold: Severity,
    /// Confidence in [0, 1] required before blocking.
    pub block_confidence_threshold: f64,
    pub l2_enabled: bool,
    /// Minimum L2 aggregate confidence for the verdict to count as evidence.
    pub l2_threat_threshold: f64,
}

impl TenantPolicy {
    /// Observe-only preset: nothing blocks.
    pub fn monitor() -> Self {
        Self {
            id: "monitor".to_string(),
            name: "Monitor".to_string(),
            tenant_id: None,
            mode: PolicyMode::Monitor,
            blocking_enabled: false,
            block_severity_threshold: Severity::Critical,
            block_confidence_threshold: 0.9,
            l2_enabled: true,
            l2_threat_threshold: 0.5,
        }
    }

    /// Default trade-off preset.
    pub fn balanced() -> Self {
        Self {
            id: "balanced".to_string(),
            name: "Balanced".to_string(),
            tenant_id: None,
            mode: PolicyMode::Balanced,
            blocking_enabled: true,
            block_severity_threshold: Severity::High,
            block_confidence_threshold: 0.7,
            l2_enabled: true,
            l2_threat_threshold: 0.5,
        }
    }

    /// Aggressive preset: blocks from MEDIUM severity.
    pub fn strict() -> Self {
        Self {
            id: "strict".to_string(),
            name: "Strict".to_string(),
            tenant_id: None,
            mode: PolicyMode::Strict,
            blocking_enabled: true,
            block_severity_threshold: Severity::Medium,
            block_confidence_threshold: 0.5,
            l2_enabled: true,
            l2_threat_threshold: 0.4,
        }
    }
}

/// An application registered under a tenant. References its default policy
/// by id only; policy bodies are never embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub tenant_id: String,
    pub default_policy_id: Option<String>,
}

/// A tenant with its default policy reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub default_policy_id: String,
}

/// Which level of the fallback chain produced the effective policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Request,
    App,
    Tenant,
    SystemDefault,
}

/// Effective policy plus the audit trail of how it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResolutionResult {
    pub policy: TenantPolicy,
    pub source: ResolutionSource,
    /// One entry per level visited, in order, regardless of outcome.
    pub resolution_path: Vec<String>,
}

/// What a matching override does to the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Escalate to a block whenever a matching detection is present.
    ForceBlock,
    /// Remove matching detections from the blocking calculation.
    Suppress,
}

/// Condition-based per-detection override, applied after the baseline
/// [`TenantPolicy`] evaluation. Kept as a separate tagged type on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverride {
    pub id: String,
    pub family: Option<RuleFamily>,
    pub min_severity: Option<Severity>,
    pub action: OverrideAction,
}

impl PolicyOverride {
    pub fn applies_to(&self, detection: &Detection) -> bool {
        if let Some(family) = self.family {
            if detection.family != family {
                return false;
            }
        }
        if let Some(min) = self.min_severity {
            if detection.severity < min {
                return false;
            }
        }
        true
    }
}

/// Errors from policy resolution and registry validation.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("system default policy `{0}` missing from registry")]
    MissingSystemDefault(String),
}

/// Read-mostly reference data supplied by the external policy repository.
pub type PolicyRegistry = HashMap<String, TenantPolicy>;

/// The built-in preset registry: monitor, balanced, strict.
pub fn preset_registry() -> PolicyRegistry {
    [
        TenantPolicy::monitor(),
        TenantPolicy::balanced(),
        TenantPolicy::strict(),
    ]
    .into_iter()
    .map(|p| (p.id.clone(), p))
    .collect()
}

/// A policy lookup by id. Takes `&mut self` so that caching wrappers can
/// update recency bookkeeping on reads.
pub trait PolicySource {
    fn policy(&mut self, id: &str) -> Option<TenantPolicy>;
}

impl PolicySource for PolicyRegistry {
    fn policy(&mut self, id: &str) -> Option<TenantPolicy> {
        self.get(id).cloned()
    }
}

/// Startup-time registry validation. The system default must exist; its
/// absence is a fatal misconfiguration, checked once, never per request.
pub fn validate_registry(
    source: &mut dyn PolicySource,
    system_default_id: &str,
) -> Result<(), PolicyError> {
    source
        .policy(system_default_id)
        .map(|_| ())
        .ok_or_else(|| PolicyError::MissingSystemDefault(system_default_id.to_string()))
}

/// Resolve the effective policy for a request.
///
/// Four-level fallback chain, each level appended to the audit path:
/// 1. request override (present but unknown ids fall through silently)
/// 2. app default
/// 3. tenant default
/// 4. system default — guaranteed by [`validate_registry`] at startup; a miss
///    here surfaces as [`PolicyError::MissingSystemDefault`].
pub fn resolve_policy(
    request_policy_id: Option<&str>,
    app: Option<&App>,
    tenant: Option<&Tenant>,
    source: &mut dyn PolicySource,
    system_default_id: &str,
) -> Result<PolicyResolutionResult, PolicyError> {
    let mut path = Vec::with_capacity(4);

    match request_policy_id {
        Some(id) => {
            if let Some(policy) = source.policy(id) {
                path.push(format!("request:{id}:hit"));
                return Ok(PolicyResolutionResult {
                    policy,
                    source: ResolutionSource::Request,
                    resolution_path: path,
                });
            }
            // Soft-override: an unknown request policy id is not an error.
            debug!(policy_id = id, "request policy not in registry, falling through");
            path.push(format!("request:{id}:miss"));
        }
        None => path.push("request:absent".to_string()),
    }

    match app {
        Some(a) => match a.default_policy_id.as_deref() {
            Some(id) => {
                if let Some(policy) = source.policy(id) {
                    path.push(format!("app:{id}:hit"));
                    return Ok(PolicyResolutionResult {
                        policy,
                        source: ResolutionSource::App,
                        resolution_path: path,
                    });
                }
                path.push(format!("app:{id}:miss"));
            }
            None => path.push(format!("app:{}:no_default", a.id)),
        },
        None => path.push("app:absent".to_string()),
    }

    match tenant {
        Some(t) => {
            let id = t.default_policy_id.as_str();
            if let Some(policy) = source.policy(id) {
                path.push(format!("tenant:{id}:hit"));
                return Ok(PolicyResolutionResult {
                    policy,
                    source: ResolutionSource::Tenant,
                    resolution_path: path,
                });
            }
            path.push(format!("tenant:{id}:miss"));
        }
        None => path.push("tenant:absent".to_string()),
    }

    match source.policy(system_default_id) {
        Some(policy) => {
            path.push(format!("system_default:{system_default_id}:hit"));
            Ok(PolicyResolutionResult {
                policy,
                source: ResolutionSource::SystemDefault,
                resolution_path: path,
            })
        }
        None => Err(PolicyError::MissingSystemDefault(
            system_default_id.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registry() -> PolicyRegistry {
        preset_registry()
    }

    #[test]
    fn test_request_policy_wins_when_present() {
        let mut reg = registry();
        let result =
            resolve_policy(Some("strict"), None, None, &mut reg, "balanced").unwrap();
        assert_eq!(result.policy.id, "strict");
        assert_eq!(result.source, ResolutionSource::Request);
        assert_eq!(result.resolution_path, vec!["request:strict:hit"]);
    }

    #[test]
    fn test_unknown_request_policy_falls_through() {
        let mut reg = registry();
        let result =
            resolve_policy(Some("nonexistent"), None, None, &mut reg, "balanced").unwrap();
        assert_eq!(result.policy.id, "balanced");
        assert_eq!(result.source, ResolutionSource::SystemDefault);
        assert_eq!(
            result.resolution_path,
            vec![
                "request:nonexistent:miss",
                "app:absent",
                "tenant:absent",
                "system_default:balanced:hit"
            ]
        );
    }

    #[test]
    fn test_app_default_used() {
        let mut reg = registry();
        let app = App {
            id: "app-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            default_policy_id: Some("monitor".to_string()),
        };
        let result = resolve_policy(None, Some(&app), None, &mut reg, "balanced").unwrap();
        assert_eq!(result.policy.id, "monitor");
        assert_eq!(result.source, ResolutionSource::App);
    }

    #[test]
    fn test_tenant_default_used() {
        let mut reg = registry();
        let app = App {
            id: "app-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            default_policy_id: None,
        };
        let tenant = Tenant {
            id: "tenant-1".to_string(),
            default_policy_id: "strict".to_string(),
        };
        let result =
            resolve_policy(None, Some(&app), Some(&tenant), &mut reg, "balanced").unwrap();
        assert_eq!(result.policy.id, "strict");
        assert_eq!(result.source, ResolutionSource::Tenant);
        assert_eq!(
            result.resolution_path,
            vec!["request:absent", "app:app-1:no_default", "tenant:strict:hit"]
        );
    }

    #[test]
    fn test_system_default_fallback() {
        let mut reg = registry();
        let result = resolve_policy(None, None, None, &mut reg, "balanced").unwrap();
        assert_eq!(result.policy.id, "balanced");
        assert_eq!(result.source, ResolutionSource::SystemDefault);
        assert_eq!(result.resolution_path.len(), 4);
    }

    #[test]
    fn test_missing_system_default_is_fatal() {
        let mut reg = registry();
        assert!(matches!(
            resolve_policy(None, None, None, &mut reg, "missing"),
            Err(PolicyError::MissingSystemDefault(_))
        ));
        assert!(validate_registry(&mut reg, "missing").is_err());
        assert!(validate_registry(&mut reg, "balanced").is_ok());
    }

    #[test]
    fn test_override_matching() {
        let detection = Detection {
            rule_id: "r".to_string(),
            rule_version: "1.0.0".to_string(),
            family: RuleFamily::CredentialLeak,
            severity: Severity::High,
            confidence: 0.9,
            matches: vec![],
            detected_at: Utc::now(),
        };

        let by_family = PolicyOverride {
            id: "o1".to_string(),
            family: Some(RuleFamily::CredentialLeak),
            min_severity: None,
            action: OverrideAction::ForceBlock,
        };
        assert!(by_family.applies_to(&detection));

        let wrong_family = PolicyOverride {
            family: Some(RuleFamily::Pii),
            ..by_family.clone()
        };
        assert!(!wrong_family.applies_to(&detection));

        let by_severity = PolicyOverride {
            id: "o2".to_string(),
            family: None,
            min_severity: Some(Severity::Critical),
            action: OverrideAction::Suppress,
        };
        assert!(!by_severity.applies_to(&detection));
    }

    #[test]
    fn test_preset_registry_contents() {
        let reg = preset_registry();
        assert_eq!(reg.len(), 3);
        assert!(reg["balanced"].blocking_enabled);
        assert!(!reg["monitor"].blocking_enabled);
        assert_eq!(reg["strict"].block_severity_threshold, Severity::Medium);
    }
}
