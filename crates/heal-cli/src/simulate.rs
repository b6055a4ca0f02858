//! Seeded error-stream simulation
//!
//! Drives a [`SelfHealer`] with a reproducible mix of failures and log noise.
//! The two built-in remedies succeed with configurable probabilities, so the
//! learning report shows how confidence settles over a run.

use async_trait::async_trait;
use heal_core::{
    EscalationError, Escalator, FnRemedy, HealError, HealerConfig, IssueId, RemedyError,
    RemedyKind, RemedyRegistry, SelfHealer,
};
use heal_knowledge::{InMemoryKnowledgeStore, ReportEntry};
use heal_patterns::Prediction;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Failures the simulator draws from
pub const ERROR_CATALOGUE: &[&str] = &[
    "database connection lost",
    "connection refused by orders-db",
    "request timeout on /checkout",
    "memory limit exceeded in worker",
    "TLS handshake failed with payments gateway",
];

const LOG_NOISE: &[&str] = &[
    "GET /orders 200",
    "GET /checkout slow response",
    "POST /payments 201",
    "ERROR upstream returned 502",
];

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Errors to feed through the healer
    pub errors: u64,
    /// Log lines added before each error
    pub logs_per_error: usize,
    /// Probability that the database remedy works
    pub db_success_rate: f64,
    /// Probability that the service restart works
    pub service_success_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            errors: 200,
            logs_per_error: 3,
            db_success_rate: 0.8,
            service_success_rate: 0.6,
        }
    }
}

/// Simulation results
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// Seed used
    pub seed: u64,
    /// Errors handled
    pub errors: u64,
    /// Errors a remedy fixed
    pub fixed: u64,
    /// Errors that escalated
    pub unresolved: u64,
    /// Issues filed
    pub escalations: usize,
    /// Learned knowledge, highest confidence first
    pub knowledge: Vec<ReportEntry>,
    /// Trend prediction at the end of the run
    pub prediction: Prediction,
}

impl SimulatorReport {
    /// Share of errors fixed without a human
    #[must_use]
    pub fn fix_rate(&self) -> f64 {
        if self.errors == 0 {
            0.0
        } else {
            self.fixed as f64 / self.errors as f64
        }
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Self-Healing Simulation ===\n");
        report.push_str(&format!("Seed: {}\n", self.seed));
        report.push_str(&format!("Errors handled: {}\n", self.errors));
        report.push_str(&format!(
            "Fixed: {} ({:.1}%)\n",
            self.fixed,
            self.fix_rate() * 100.0
        ));
        report.push_str(&format!("Unresolved: {}\n", self.unresolved));
        report.push_str(&format!("Escalations filed: {}\n", self.escalations));

        report.push_str("\nLearned repairs:\n");
        if self.knowledge.is_empty() {
            report.push_str("  (none)\n");
        }
        for entry in &self.knowledge {
            report.push_str(&format!(
                "  {:.2}  {} -> {}\n",
                entry.confidence, entry.signature, entry.best_solution
            ));
        }

        report.push_str(&format!(
            "\nTrend: {} (confidence {:.2})\n",
            self.prediction.message, self.prediction.confidence
        ));
        report
    }
}

#[derive(Debug, Default)]
struct CountingEscalator {
    filed: AtomicUsize,
}

#[async_trait]
impl Escalator for CountingEscalator {
    async fn create_issue_or_pr(&self, title: &str, _body: &str) -> Result<IssueId, EscalationError> {
        let n = self.filed.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(title, "simulated issue filed");
        Ok(IssueId::new(format!("SIM-{n}")))
    }
}

fn flaky_registry(
    config: &SimulatorConfig,
    rng: &Arc<Mutex<StdRng>>,
    timeout: std::time::Duration,
) -> RemedyRegistry {
    let mut registry = RemedyRegistry::new(timeout);
    for kind in RemedyKind::ALL {
        let rate = match kind {
            RemedyKind::RestartDatabaseConnection => config.db_success_rate,
            RemedyKind::RestartService => config.service_success_rate,
        }
        .clamp(0.0, 1.0);
        let rng = Arc::clone(rng);
        registry.register(Arc::new(FnRemedy::new(kind.name(), move || {
            if rng.lock().gen_bool(rate) {
                Ok(())
            } else {
                Err(RemedyError::failed(kind.name(), "simulated failure"))
            }
        })));
    }
    registry
}

/// Run the simulation against `store`
///
/// # Errors
/// - `HealError::Config` if `healer_config` is invalid
pub async fn run_simulator(
    config: &SimulatorConfig,
    healer_config: HealerConfig,
    store: Arc<InMemoryKnowledgeStore>,
) -> Result<SimulatorReport, HealError> {
    let rng = Arc::new(Mutex::new(StdRng::seed_from_u64(config.seed)));
    let escalator = Arc::new(CountingEscalator::default());

    let registry = flaky_registry(config, &rng, healer_config.remedy_timeout());
    let healer = SelfHealer::builder(healer_config)
        .store(store)
        .registry(registry)
        .escalator(Arc::clone(&escalator) as Arc<dyn Escalator>)
        .build()?;

    let mut fixed = 0;
    for _ in 0..config.errors {
        let (noise, message) = {
            let mut rng = rng.lock();
            let noise: Vec<&str> = (0..config.logs_per_error)
                .map(|_| LOG_NOISE[rng.gen_range(0..LOG_NOISE.len())])
                .collect();
            (noise, ERROR_CATALOGUE[rng.gen_range(0..ERROR_CATALOGUE.len())])
        };
        for line in noise {
            healer.add_log(line);
        }
        if healer.handle_error(message).await? {
            fixed += 1;
        }
    }

    let mut knowledge = healer.repair_report().await;
    knowledge.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.signature.cmp(&b.signature))
    });

    Ok(SimulatorReport {
        seed: config.seed,
        errors: config.errors,
        fixed,
        unresolved: config.errors - fixed,
        escalations: escalator.filed.load(Ordering::SeqCst),
        knowledge,
        prediction: healer.predict(),
    })
}
