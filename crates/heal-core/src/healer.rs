//! Self-healer host wiring
//!
//! Owns every component of the loop and exposes the two ingestion points a
//! host application needs: [`SelfHealer::add_log`] for raw log lines and
//! [`SelfHealer::handle_error`] for failures. [`SelfHealer::start`] begins the
//! periodic trend analysis and resource checks; [`SelfHealer::shutdown`] stops
//! them.

use crate::config::HealerConfig;
use crate::error::HealError;
use crate::escalation::{Escalator, LogEscalator};
use crate::notifier::{Notifier, TracingNotifier};
use crate::outcome::RepairOutcome;
use crate::policy::FixApplier;
use crate::remedy::RemedyRegistry;
use crate::report::ErrorReport;
use heal_knowledge::{InMemoryKnowledgeStore, KnowledgeStore, RepairSuggestionEngine, ReportEntry};
use heal_patterns::{
    LatencyCheck, ModuleHealthCheck, PatternLogBuffer, PerformanceMonitor, PeriodicTask,
    Prediction, ProcessSampler, ResourceSampler, TickScheduler, TrendAnalyzer,
};
use std::fmt;
use std::sync::Arc;

/// Builder for [`SelfHealer`]
///
/// Anything not supplied falls back to: in-memory store, command remedies
/// from the config, log-only escalation, log-only notifications, and
/// resource readings of the current process. Without a latency check the
/// module health check only looks at memory.
pub struct SelfHealerBuilder {
    config: HealerConfig,
    store: Option<Arc<dyn KnowledgeStore>>,
    registry: Option<RemedyRegistry>,
    escalator: Option<Arc<dyn Escalator>>,
    notifier: Option<Arc<dyn Notifier>>,
    sampler: Option<Arc<dyn ResourceSampler>>,
    latency: Option<Arc<dyn LatencyCheck>>,
}

impl SelfHealerBuilder {
    /// With knowledge store
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// With remedy registry
    #[must_use]
    pub fn registry(mut self, registry: RemedyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// With escalator
    #[must_use]
    pub fn escalator(mut self, escalator: Arc<dyn Escalator>) -> Self {
        self.escalator = Some(escalator);
        self
    }

    /// With notifier
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// With resource sampler
    #[must_use]
    pub fn sampler(mut self, sampler: Arc<dyn ResourceSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// With latency target for the module health check
    #[must_use]
    pub fn latency_check(mut self, latency: Arc<dyn LatencyCheck>) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Validate the config and assemble the healer
    ///
    /// # Errors
    /// - `HealError::Config` if the config is invalid
    pub fn build(self) -> Result<SelfHealer, HealError> {
        let config = self.config;
        config.validate()?;

        let buffer = Arc::new(PatternLogBuffer::new(config.buffer_capacity)?);
        let analyzer = Arc::new(
            TrendAnalyzer::new(Arc::clone(&buffer))
                .with_window_minutes(config.trend_window_minutes)
                .with_actionable_threshold(config.actionable_prediction_threshold),
        );

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryKnowledgeStore::new()));
        let registry = self
            .registry
            .unwrap_or_else(|| RemedyRegistry::from_config(&config));
        let escalator = self.escalator.unwrap_or_else(|| Arc::new(LogEscalator));

        let fixer = Arc::new(FixApplier::new(
            RepairSuggestionEngine::new(store),
            Arc::new(registry),
            escalator,
            &config,
        ));

        let sampler = self
            .sampler
            .unwrap_or_else(|| Arc::new(ProcessSampler::new()));
        let monitor = Arc::new(
            PerformanceMonitor::new(Arc::clone(&sampler), Arc::clone(&buffer))
                .with_memory_limit_mb(config.health.performance_memory_limit_mb),
        );
        let mut health = ModuleHealthCheck::new(sampler, Arc::clone(&buffer))
            .with_memory_limit_mb(config.health.check_memory_limit_mb)
            .with_slow_response(config.health.slow_response());
        if let Some(latency) = self.latency {
            health = health.with_latency_check(latency);
        }

        Ok(SelfHealer {
            buffer,
            analyzer,
            monitor,
            health: Arc::new(health),
            fixer,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            scheduler: TickScheduler::new(),
            config,
        })
    }
}

/// The assembled self-healing loop
pub struct SelfHealer {
    config: HealerConfig,
    buffer: Arc<PatternLogBuffer>,
    analyzer: Arc<TrendAnalyzer>,
    monitor: Arc<PerformanceMonitor>,
    health: Arc<ModuleHealthCheck>,
    fixer: Arc<FixApplier>,
    notifier: Arc<dyn Notifier>,
    scheduler: TickScheduler,
}

impl SelfHealer {
    /// Start building a healer
    #[must_use]
    pub fn builder(config: HealerConfig) -> SelfHealerBuilder {
        SelfHealerBuilder {
            config,
            store: None,
            registry: None,
            escalator: None,
            notifier: None,
            sampler: None,
            latency: None,
        }
    }

    /// Healer with every default collaborator
    ///
    /// # Errors
    /// - `HealError::Config` if the config is invalid
    pub fn new(config: HealerConfig) -> Result<Self, HealError> {
        Self::builder(config).build()
    }

    /// Record a raw log line
    pub fn add_log(&self, message: impl Into<String>) {
        self.analyzer.add_log(message);
    }

    /// Log, repair and report one error
    ///
    /// Returns whether a remedy fixed it.
    ///
    /// # Errors
    /// - `HealError::Store` if the message is blank
    pub async fn handle_error(&self, report: impl Into<ErrorReport>) -> Result<bool, HealError> {
        Ok(self.handle_error_detailed(report).await?.resolved)
    }

    /// Like [`handle_error`](Self::handle_error) but returns the full outcome
    ///
    /// # Errors
    /// - `HealError::Store` if the message is blank
    pub async fn handle_error_detailed(
        &self,
        report: impl Into<ErrorReport>,
    ) -> Result<RepairOutcome, HealError> {
        let report = report.into();
        report.signature()?;

        self.buffer.append(format!("Error detected: {}", report.message));
        let outcome = self.fixer.run(&report).await?;

        let notice = if outcome.resolved {
            format!("Fixed: {}", report.message)
        } else {
            format!("Unresolved error: {}", report.message)
        };
        if let Err(e) = self.notifier.notify(&notice).await {
            tracing::warn!(report = %report.id, "notification dropped: {}", e);
        }

        Ok(outcome)
    }

    /// Prediction over the current window
    #[must_use]
    pub fn predict(&self) -> Prediction {
        self.analyzer.predict()
    }

    /// Begin periodic trend analysis and, if enabled, resource checks
    ///
    /// # Errors
    /// - `HealError::Pattern` if the healer was already shut down
    pub fn start(&self) -> Result<(), HealError> {
        let analyzer: Arc<dyn PeriodicTask> = Arc::clone(&self.analyzer) as _;
        self.scheduler.spawn(analyzer, self.config.trend_interval())?;

        let health = &self.config.health;
        if health.enabled {
            let monitor: Arc<dyn PeriodicTask> = Arc::clone(&self.monitor) as _;
            self.scheduler.spawn(monitor, health.performance_interval())?;
            let check: Arc<dyn PeriodicTask> = Arc::clone(&self.health) as _;
            self.scheduler.spawn(check, health.check_interval())?;
        }

        tracing::info!(
            interval_secs = self.config.trend_interval_secs,
            window_minutes = self.config.trend_window_minutes,
            health_checks = health.enabled,
            "self-healer started"
        );
        Ok(())
    }

    /// Stop periodic analysis and wait for the current tick
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        tracing::info!("self-healer stopped");
    }

    /// Learning report
    pub async fn repair_report(&self) -> Vec<ReportEntry> {
        self.fixer.repair_report().await
    }

    /// Log buffer
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &Arc<PatternLogBuffer> {
        &self.buffer
    }

    /// Trend analyzer
    #[inline]
    #[must_use]
    pub fn analyzer(&self) -> &Arc<TrendAnalyzer> {
        &self.analyzer
    }

    /// Memory monitor
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Module health check
    #[inline]
    #[must_use]
    pub fn health_check(&self) -> &Arc<ModuleHealthCheck> {
        &self.health
    }

    /// Decision policy
    #[inline]
    #[must_use]
    pub fn fixer(&self) -> &Arc<FixApplier> {
        &self.fixer
    }

    /// Effective configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HealerConfig {
        &self.config
    }
}

impl fmt::Debug for SelfHealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfHealer")
            .field("buffered", &self.buffer.len())
            .field("fixer", &self.fixer)
            .field("scheduled_tasks", &self.scheduler.task_count())
            .finish_non_exhaustive()
    }
}
