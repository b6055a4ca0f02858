//! Heal Core - repair decisions and host wiring
//!
//! Ties the pattern and knowledge crates into a working self-healing loop:
//! - [`FixApplier`] decides, per error, between a learned remedy, the default
//!   keyword rules, and escalation to a human
//! - [`RemedyRegistry`] resolves remedy names and runs them under a timeout
//! - [`Escalator`] / [`Notifier`] are the outward-facing boundaries
//! - [`SelfHealer`] owns all of it and drives the periodic trend analysis and
//!   resource checks
//!
//! # Example
//!
//! ```rust,ignore
//! use heal_core::{HealerConfig, SelfHealer};
//!
//! # async fn example() -> Result<(), heal_core::HealError> {
//! let healer = SelfHealer::new(HealerConfig::default())?;
//! healer.start()?;
//!
//! healer.add_log("GET /orders slow response");
//! let fixed = healer.handle_error("database connection lost").await?;
//!
//! healer.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod escalation;
pub mod healer;
pub mod notifier;
pub mod outcome;
pub mod policy;
pub mod remedy;
pub mod report;

pub use config::{DefaultRule, HealerConfig, HealthConfig, RemedyCommand};
pub use error::{ConfigError, EscalationError, HealError, NotifyError, RemedyError};
pub use escalation::{escalation_body, escalation_title, Escalator, IssueId, LogEscalator};
pub use healer::{SelfHealer, SelfHealerBuilder};
pub use notifier::{Notifier, TracingNotifier};
pub use outcome::{AttemptSource, PolicyStep, RemedyAttempt, RepairOutcome, Resolution};
pub use policy::FixApplier;
pub use remedy::{CommandRemedy, FnRemedy, Remedy, RemedyKind, RemedyRegistry, RemedyResult};
pub use report::{ErrorReport, ReportId};

pub use heal_knowledge::{ErrorSignature, KnowledgeStore, RepairSuggestionEngine, ReportEntry};
pub use heal_patterns::{
    LatencyCheck, ModuleHealthCheck, PatternLogBuffer, PerformanceMonitor, Prediction,
    ResourceSample, ResourceSampler, TrendAnalyzer,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
