//! # threatlens-rules
//!
//! The L1 rule-matching engine for ThreatLens:
//! - **Pattern**: literal/regex match specifications with bounded context
//! - **PatternMatcher**: set-prefiltered positional matching over compiled
//!   patterns
//! - **RuleExecutor**: fail-isolated execution of an immutable rule set
//! - **Built-in rules**: prompt injection, jailbreak, credential, PII, and
//!   obfuscation coverage

pub mod executor;
pub mod pattern;
pub mod rule;

pub use executor::RuleExecutor;
pub use pattern::{CompiledPattern, Pattern, PatternError, PatternKind, PatternMatcher};
pub use rule::{builtin_rules, Rule, RuleMetrics};
