//! Process health checks
//!
//! Two periodic checks turn resource readings into log signals:
//! - [`PerformanceMonitor`] samples process memory, by default every minute
//! - [`ModuleHealthCheck`] checks memory and response latency, by default
//!   every five minutes
//!
//! Anything out of bounds is appended to the shared [`PatternLogBuffer`], so a
//! slow response shows up in the slowness rate the [`TrendAnalyzer`] watches.
//!
//! [`TrendAnalyzer`]: crate::TrendAnalyzer

use crate::buffer::PatternLogBuffer;
use crate::scheduler::PeriodicTask;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};

/// Memory above which the performance monitor warns
pub const DEFAULT_PERFORMANCE_MEMORY_LIMIT_MB: f64 = 100.0;
/// Memory above which a module is considered unhealthy
pub const DEFAULT_HEALTH_MEMORY_LIMIT_MB: f64 = 150.0;
/// Response latency above which a module is considered unhealthy
pub const DEFAULT_SLOW_RESPONSE: Duration = Duration::from_millis(500);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One reading of the current process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// Resident memory in MB
    pub memory_mb: f64,
    /// CPU usage since the previous reading, in percent of one core
    pub cpu_percent: f32,
}

/// Source of resource readings
pub trait ResourceSampler: Send + Sync + fmt::Debug {
    /// Take a reading, `None` if the platform cannot provide one
    fn sample(&self) -> Option<ResourceSample>;
}

/// Reads the current process through `sysinfo`
pub struct ProcessSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl ProcessSampler {
    /// Sampler for the running process
    #[must_use]
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("process id unavailable, resource sampling disabled: {}", e);
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSampler")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl ResourceSampler for ProcessSampler {
    fn sample(&self) -> Option<ResourceSample> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        let process = system.process(pid)?;
        Some(ResourceSample {
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
            cpu_percent: process.cpu_usage(),
        })
    }
}

/// Measures how long the host takes to answer
#[async_trait::async_trait]
pub trait LatencyCheck: Send + Sync + fmt::Debug {
    /// Round-trip time, `None` if the target did not answer
    async fn measure(&self) -> Option<Duration>;
}

/// Warns when process memory crosses a limit
#[derive(Debug)]
pub struct PerformanceMonitor {
    sampler: Arc<dyn ResourceSampler>,
    buffer: Arc<PatternLogBuffer>,
    memory_limit_mb: f64,
}

impl PerformanceMonitor {
    /// Create monitor with the default memory limit
    #[must_use]
    pub fn new(sampler: Arc<dyn ResourceSampler>, buffer: Arc<PatternLogBuffer>) -> Self {
        Self {
            sampler,
            buffer,
            memory_limit_mb: DEFAULT_PERFORMANCE_MEMORY_LIMIT_MB,
        }
    }

    /// With memory limit
    #[inline]
    #[must_use]
    pub fn with_memory_limit_mb(mut self, limit: f64) -> Self {
        self.memory_limit_mb = limit;
        self
    }

    /// Take one reading, logging it and buffering a signal if over the limit
    pub fn check(&self) -> Option<ResourceSample> {
        let Some(sample) = self.sampler.sample() else {
            tracing::debug!("resource sample unavailable");
            return None;
        };

        if sample.memory_mb > self.memory_limit_mb {
            let signal = format!("High memory usage detected: {:.2} MB", sample.memory_mb);
            tracing::warn!(
                memory_mb = sample.memory_mb,
                limit_mb = self.memory_limit_mb,
                "{}",
                signal
            );
            self.buffer.append(signal);
        }
        tracing::debug!(
            memory_mb = sample.memory_mb,
            cpu_percent = sample.cpu_percent,
            "resource sample"
        );
        Some(sample)
    }
}

#[async_trait::async_trait]
impl PeriodicTask for PerformanceMonitor {
    fn name(&self) -> &str {
        "performance-monitor"
    }

    async fn run(&self) {
        self.check();
    }
}

/// Result of one module health check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// One line per failed check
    pub details: Vec<String>,
}

impl HealthReport {
    /// Whether every check passed
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.details.is_empty()
    }
}

/// Checks memory and, when configured, response latency
#[derive(Debug)]
pub struct ModuleHealthCheck {
    sampler: Arc<dyn ResourceSampler>,
    latency: Option<Arc<dyn LatencyCheck>>,
    buffer: Arc<PatternLogBuffer>,
    memory_limit_mb: f64,
    slow_response: Duration,
}

impl ModuleHealthCheck {
    /// Create check with default limits and no latency target
    #[must_use]
    pub fn new(sampler: Arc<dyn ResourceSampler>, buffer: Arc<PatternLogBuffer>) -> Self {
        Self {
            sampler,
            latency: None,
            buffer,
            memory_limit_mb: DEFAULT_HEALTH_MEMORY_LIMIT_MB,
            slow_response: DEFAULT_SLOW_RESPONSE,
        }
    }

    /// With latency target
    #[must_use]
    pub fn with_latency_check(mut self, latency: Arc<dyn LatencyCheck>) -> Self {
        self.latency = Some(latency);
        self
    }

    /// With memory limit
    #[inline]
    #[must_use]
    pub fn with_memory_limit_mb(mut self, limit: f64) -> Self {
        self.memory_limit_mb = limit;
        self
    }

    /// With slow-response limit
    #[inline]
    #[must_use]
    pub fn with_slow_response(mut self, limit: Duration) -> Self {
        self.slow_response = limit;
        self
    }

    /// Run every check, buffering one signal if any failed
    pub async fn check(&self) -> HealthReport {
        tracing::info!("performing module health check");
        let mut report = HealthReport::default();

        if let Some(sample) = self.sampler.sample() {
            if sample.memory_mb > self.memory_limit_mb {
                report
                    .details
                    .push(format!("High memory usage: {:.2} MB", sample.memory_mb));
            }
        }

        if let Some(latency) = &self.latency {
            match latency.measure().await {
                Some(elapsed) if elapsed > self.slow_response => report
                    .details
                    .push(format!("Slow response time: {}ms", elapsed.as_millis())),
                Some(_) => {}
                None => report.details.push("No response from latency target".to_string()),
            }
        }

        if report.is_healthy() {
            tracing::info!("all modules are healthy");
        } else {
            let signal = format!("Module health issues detected: {}", report.details.join(", "));
            tracing::warn!("{}", signal);
            self.buffer.append(signal);
        }
        report
    }
}

#[async_trait::async_trait]
impl PeriodicTask for ModuleHealthCheck {
    fn name(&self) -> &str {
        "module-health-check"
    }

    async fn run(&self) {
        self.check().await;
    }
}
