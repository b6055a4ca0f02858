//! Heal Patterns - log signal collection and trend prediction
//!
//! The leaf of the self-healing loop:
//! - [`PatternLogBuffer`] keeps a bounded, time-ordered window of log messages
//! - [`TrendAnalyzer`] turns the recent window into a [`Prediction`]
//! - [`TickScheduler`] drives any [`PeriodicTask`] on a fixed period
//! - [`PerformanceMonitor`] / [`ModuleHealthCheck`] feed resource signals
//!   into the buffer
//!
//! # Example
//!
//! ```rust,ignore
//! use heal_patterns::{PatternLogBuffer, TickScheduler, TrendAnalyzer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), heal_patterns::PatternError> {
//! let buffer = Arc::new(PatternLogBuffer::new(1000)?);
//! let analyzer = Arc::new(TrendAnalyzer::new(Arc::clone(&buffer)));
//!
//! let scheduler = TickScheduler::new();
//! scheduler.spawn(analyzer, Duration::from_secs(10))?;
//!
//! buffer.append("GET /users slow response");
//! # scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod buffer;
pub mod error;
pub mod health;
pub mod scheduler;
pub mod trend;

pub use buffer::{LogEntry, PatternFrequency, PatternLogBuffer, RecentLogs, DEFAULT_CAPACITY};
pub use error::PatternError;
pub use health::{
    HealthReport, LatencyCheck, ModuleHealthCheck, PerformanceMonitor, ProcessSampler,
    ResourceSample, ResourceSampler,
};
pub use scheduler::{PeriodicTask, TickScheduler};
pub use trend::{analyze, Prediction, TrendAnalyzer, TrendStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
