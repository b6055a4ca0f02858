//! Error types for Heal Core
//!
//! Covers:
//! - Remedy execution failures (including unknown remedy names)
//! - Escalation delivery failures
//! - Notification delivery failures
//! - Configuration loading and validation
//!
//! Remedy and escalation failures never abort a repair run; they are carried
//! in the [`RepairOutcome`](crate::RepairOutcome). [`HealError`] only covers
//! what stops a run or a healer from starting.

use heal_knowledge::StoreError;
use heal_patterns::PatternError;

/// Main self-healing error type
#[derive(Debug, thiserror::Error)]
pub enum HealError {
    /// Knowledge store error (also covers malformed signatures)
    #[error("knowledge store error: {0}")]
    Store(#[from] StoreError),

    /// Log buffer or scheduler error
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// Repair task ended without producing an outcome
    #[error("repair run aborted: {0}")]
    Interrupted(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Remedy execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemedyError {
    /// No remedy registered under this name
    #[error("unknown remedy: {0:?}")]
    Unknown(String),

    /// Remedy ran and reported failure
    #[error("remedy {name:?} failed: {reason}")]
    Failed {
        /// Remedy name
        name: String,
        /// Failure detail
        reason: String,
    },

    /// Remedy did not finish in time
    #[error("remedy {name:?} timed out after {timeout_ms}ms")]
    TimedOut {
        /// Remedy name
        name: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// Remedy could not be started
    #[error("remedy {name:?} could not be launched: {reason}")]
    Launch {
        /// Remedy name
        name: String,
        /// Launch failure detail
        reason: String,
    },

    /// Remedy task panicked
    #[error("remedy {name:?} aborted: {reason}")]
    Aborted {
        /// Remedy name
        name: String,
        /// Panic or cancellation detail
        reason: String,
    },
}

impl RemedyError {
    /// Failure reported by the remedy itself
    #[inline]
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Escalation delivery errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscalationError {
    /// Issue tracker rejected or dropped the request
    #[error("escalation delivery failed: {0}")]
    Delivery(String),

    /// Escalation did not complete in time
    #[error("escalation timed out after {timeout_ms}ms")]
    TimedOut {
        /// Timeout that elapsed
        timeout_ms: u64,
    },
}

/// Notification delivery errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A field holds an unusable value
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    /// Invalid field value
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
