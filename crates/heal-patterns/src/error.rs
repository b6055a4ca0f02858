//! Error types for pattern collection and scheduling

/// Errors raised by the buffer and the tick scheduler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// Buffer capacity must be at least one entry
    #[error("invalid buffer capacity: {0}")]
    InvalidCapacity(usize),

    /// Tick period must be non-zero
    #[error("invalid tick period: period must be non-zero")]
    InvalidPeriod,

    /// Scheduler no longer accepts tasks
    #[error("scheduler has been shut down")]
    SchedulerShutDown,
}
