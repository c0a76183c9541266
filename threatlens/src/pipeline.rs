//! Pipeline orchestrator
//!
//! Coordinates the L1 rule pass, the optional L2 ensemble, plugin detectors,
//! and policy resolution into one [`PipelineResult`]. The orchestrator owns
//! the only piece of shared mutable state in the system — the policy cache —
//! and serializes access to it behind a mutex as the cache contract requires.

use crate::merge::merge;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use threatlens_core::detector::{Classifier, Detector};
use threatlens_core::error::PipelineError;
use threatlens_core::policy::{
    preset_registry, resolve_policy, validate_registry, App, OverrideAction, PolicyCache,
    PolicyOverride, PolicyRegistry, Tenant,
};
use threatlens_core::types::{PipelineMetadata, PipelineResult, ScanMode, Severity};
use threatlens_rules::{builtin_rules, Rule, RuleExecutor};
use threatlens_voting::{VotingConfig, VotingEngine};
use tracing::{debug, instrument, warn};

/// Default maximum accepted input size: 1 MiB.
pub const DEFAULT_MAX_INPUT_LEN: usize = 1 << 20;

const DEFAULT_CACHE_SIZE: usize = 128;

/// Parameters for one scan call.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub text: String,
    pub mode: ScanMode,
    /// Whether the caller wants L2 at all; the resolved policy can still
    /// disable it.
    pub l2_enabled: bool,
    /// Per-request override of the policy's block confidence threshold.
    pub confidence_threshold: Option<f64>,
    /// Request-level policy override (soft: unknown ids fall through).
    pub policy_id: Option<String>,
    pub app: Option<App>,
    pub tenant: Option<Tenant>,
}

impl ScanRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: ScanMode::Balanced,
            l2_enabled: true,
            confidence_threshold: None,
            policy_id: None,
            app: None,
            tenant: None,
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_l2(mut self, enabled: bool) -> Self {
        self.l2_enabled = enabled;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn with_policy_id(mut self, id: impl Into<String>) -> Self {
        self.policy_id = Some(id.into());
        self
    }

    pub fn with_app(mut self, app: App) -> Self {
        self.app = Some(app);
        self
    }

    pub fn with_tenant(mut self, tenant: Tenant) -> Self {
        self.tenant = Some(tenant);
        self
    }
}

/// Builder for [`Pipeline`]. All collaborators are explicit: the classifier
/// is an `Option` chosen at configuration time, never probed at runtime.
pub struct PipelineBuilder {
    rules: Vec<Rule>,
    voting: VotingConfig,
    classifier: Option<Arc<dyn Classifier>>,
    detectors: Vec<Arc<dyn Detector>>,
    registry: PolicyRegistry,
    system_default_id: String,
    overrides: Vec<PolicyOverride>,
    cache_size: usize,
    max_input_len: usize,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self {
            rules: builtin_rules(),
            voting: VotingConfig::default(),
            classifier: None,
            detectors: Vec::new(),
            registry: preset_registry(),
            system_default_id: "balanced".to_string(),
            overrides: Vec::new(),
            cache_size: DEFAULT_CACHE_SIZE,
            max_input_len: DEFAULT_MAX_INPUT_LEN,
        }
    }

    /// Replace the built-in rule set (supplied by the external rule-pack
    /// loader).
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_voting_config(mut self, config: VotingConfig) -> Self {
        self.voting = config;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Register a plugin detector; detectors run after the core rules, in
    /// registration order.
    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Replace the preset policy registry (supplied by the external policy
    /// repository).
    pub fn with_policies(mut self, registry: PolicyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_system_default(mut self, id: impl Into<String>) -> Self {
        self.system_default_id = id.into();
        self
    }

    pub fn with_override(mut self, policy_override: PolicyOverride) -> Self {
        self.overrides.push(policy_override);
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_max_input_len(mut self, len: usize) -> Self {
        self.max_input_len = len;
        self
    }

    /// Validate configuration and construct the pipeline.
    ///
    /// A missing system default policy is caught here, at startup, never per
    /// request.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let mut registry = self.registry;
        validate_registry(&mut registry, &self.system_default_id)?;

        let voting = VotingEngine::new(self.voting)
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let executor = RuleExecutor::new(self.rules);
        if executor.is_empty() {
            return Err(PipelineError::Config("no usable rules".to_string()));
        }
        if self.cache_size == 0 {
            return Err(PipelineError::Config("cache size must be non-zero".to_string()));
        }

        Ok(Pipeline {
            executor,
            voting,
            classifier: self.classifier,
            detectors: self.detectors,
            policies: Mutex::new(PolicyCache::new(registry, self.cache_size)),
            system_default_id: self.system_default_id,
            overrides: self.overrides,
            max_input_len: self.max_input_len,
        })
    }
}

/// The detection-and-decision pipeline.
///
/// Each `scan` invocation is independent; the rule set and voting config are
/// immutable and safe for concurrent reads.
pub struct Pipeline {
    executor: RuleExecutor,
    voting: VotingEngine,
    classifier: Option<Arc<dyn Classifier>>,
    detectors: Vec<Arc<dyn Detector>>,
    policies: Mutex<PolicyCache<PolicyRegistry>>,
    system_default_id: String,
    overrides: Vec<PolicyOverride>,
    max_input_len: usize,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Scan `request.text` and render a block/warn/allow decision.
    #[instrument(skip(self, request), fields(mode = ?request.mode, len = request.text.len()))]
    pub async fn scan(&self, request: &ScanRequest) -> Result<PipelineResult, PipelineError> {
        if request.text.is_empty() {
            return Err(PipelineError::InvalidInput("text must not be empty".to_string()));
        }
        if request.text.len() > self.max_input_len {
            return Err(PipelineError::InvalidInput(format!(
                "text length {} exceeds maximum {}",
                request.text.len(),
                self.max_input_len
            )));
        }
        if let Some(threshold) = request.confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PipelineError::InvalidInput(format!(
                    "confidence threshold {threshold} outside [0, 1]"
                )));
            }
        }

        let resolution = {
            let mut cache = self.policies.lock().expect("policy cache lock poisoned");
            resolve_policy(
                request.policy_id.as_deref(),
                request.app.as_ref(),
                request.tenant.as_ref(),
                &mut *cache,
                &self.system_default_id,
            )?
        };

        let start = Instant::now();
        let mut scan = self.executor.execute(&request.text, request.mode);

        // Plugin detectors run after the core rules, each inside its own
        // timeout and error boundary.
        for detector in &self.detectors {
            match tokio::time::timeout(detector.timeout(), detector.detect(&request.text)).await
            {
                Ok(Ok(detections)) => scan.detections.extend(detections),
                Ok(Err(e)) => {
                    warn!(detector = detector.name(), error = %e, "detector failed, skipping");
                }
                Err(_) => {
                    warn!(detector = detector.name(), "detector timed out, skipping");
                }
            }
        }

        let mut l2_skipped = false;
        let mut l2_unavailable = false;
        let mut voting = None;

        // Only a detection that survives Suppress overrides guarantees the
        // maximal severity; a suppressed critical must not starve L2.
        let l1_critical = scan.detections.iter().any(|d| {
            d.severity == Severity::Critical
                && !self
                    .overrides
                    .iter()
                    .any(|o| o.action == OverrideAction::Suppress && o.applies_to(d))
        });
        if request.mode == ScanMode::Fast {
            // Fast mode never triggers classifier evaluation.
            l2_skipped = true;
        } else if l1_critical {
            // L1 alone already guarantees the maximal severity; skipping L2
            // here is a latency optimization, not a decision shortcut.
            debug!("L1 critical detection, skipping L2");
            l2_skipped = true;
        } else if !request.l2_enabled || !resolution.policy.l2_enabled {
            l2_skipped = true;
        } else {
            match &self.classifier {
                None => l2_unavailable = true,
                Some(classifier) => match classifier.classify(&request.text).await {
                    Ok(output) => match self.voting.evaluate(&output) {
                        Ok(result) => voting = Some(result),
                        Err(e) => {
                            warn!(error = %e, "unusable classifier output, degrading to L1-only");
                            l2_unavailable = true;
                        }
                    },
                    Err(e) => {
                        warn!(classifier = classifier.name(), error = %e, "classifier unavailable, degrading to L1-only");
                        l2_unavailable = true;
                    }
                },
            }
        }

        let duration = start.elapsed();
        let metadata = PipelineMetadata {
            mode: request.mode,
            duration,
            l2_skipped,
            l2_unavailable,
            deadline_exceeded: request
                .mode
                .deadline()
                .is_some_and(|deadline| duration > deadline),
        };

        Ok(merge(
            scan,
            voting,
            &resolution,
            &self.overrides,
            request.confidence_threshold,
            metadata,
        ))
    }

    /// Policy cache statistics, for observability.
    pub fn cache_stats(&self) -> threatlens_core::policy::CacheStats {
        self.policies.lock().expect("policy cache lock poisoned").stats()
    }

    /// Number of usable rules in the L1 engine.
    pub fn rule_count(&self) -> usize {
        self.executor.len()
    }
}
