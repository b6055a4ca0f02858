//! Periodic task scheduling
//!
//! Replaces annotation-driven cron jobs with an explicit scheduler: every
//! registered [`PeriodicTask`] runs on its own tokio interval until
//! [`TickScheduler::shutdown`] is called.

use crate::error::PatternError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Work invoked once per tick
#[async_trait::async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run one pass
    async fn run(&self);
}

/// Interval-driven scheduler with cooperative shutdown
#[derive(Debug)]
pub struct TickScheduler {
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TickScheduler {
    /// Create an idle scheduler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Run `task` every `period`, starting one period from now
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `PatternError::InvalidPeriod` if `period` is zero
    /// - `PatternError::SchedulerShutDown` after [`shutdown`](Self::shutdown)
    pub fn spawn(
        &self,
        task: Arc<dyn PeriodicTask>,
        period: Duration,
    ) -> Result<(), PatternError> {
        if period.is_zero() {
            return Err(PatternError::InvalidPeriod);
        }
        if *self.shutdown.borrow() {
            return Err(PatternError::SchedulerShutDown);
        }

        let mut stop = self.shutdown.subscribe();
        tracing::info!(task = task.name(), period_ms = period.as_millis() as u64, "scheduling periodic task");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => task.run().await,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            tracing::debug!(task = task.name(), "periodic task stopped");
                            break;
                        }
                    }
                }
            }
        });

        self.handles.lock().push(handle);
        Ok(())
    }

    /// Number of tasks registered so far
    #[inline]
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether shutdown has been requested
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stop all tasks and wait for them to finish their current pass
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("periodic task ended abnormally: {}", e);
            }
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        runs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PeriodicTask for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_task_every_period() {
        let scheduler = TickScheduler::new();
        let counter = Arc::new(Counter::default());

        scheduler
            .spawn(counter.clone(), Duration::from_secs(10))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(counter.runs.load(Ordering::SeqCst) >= 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_stops_after_shutdown() {
        let scheduler = TickScheduler::new();
        let counter = Arc::new(Counter::default());
        scheduler
            .spawn(counter.clone(), Duration::from_secs(1))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await;
        let after_shutdown = counter.runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.runs.load(Ordering::SeqCst), after_shutdown);
        assert!(scheduler.is_shut_down());
    }

    #[tokio::test]
    async fn scheduler_rejects_zero_period_and_late_spawns() {
        let scheduler = TickScheduler::new();
        let counter = Arc::new(Counter::default());

        assert_eq!(
            scheduler.spawn(counter.clone(), Duration::ZERO),
            Err(PatternError::InvalidPeriod)
        );

        scheduler.shutdown().await;
        assert_eq!(
            scheduler.spawn(counter, Duration::from_secs(1)),
            Err(PatternError::SchedulerShutDown)
        );
        assert_eq!(scheduler.task_count(), 0);
    }
}
