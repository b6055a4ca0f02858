//! Fix applier - the repair decision policy
//!
//! ```text
//! Received -> SuggestionLookup -> AutoApply    -> Learn -> Resolved
//!                              \       | failure
//!                               -> DefaultFixes -> Learn -> Resolved
//!                                      | nothing succeeded
//!                                      -> Escalate -> Resolved (false)
//! ```
//!
//! At most one run per signature is in flight; runs for different signatures
//! proceed in parallel. Remedy failures never escape a run: they are recorded
//! as attempts and the policy moves on to the next branch.
//!
//! Each run executes on its own task. Dropping the future returned by
//! [`FixApplier::run`] detaches the caller; the run still finishes, learns its
//! outcome and releases the signature lock. A stuck issue tracker cannot hold
//! the lock past the escalation timeout.

use crate::config::{DefaultRule, HealerConfig};
use crate::error::{EscalationError, HealError};
use crate::escalation::{escalation_body, escalation_title, Escalator, IssueId};
use crate::outcome::{AttemptSource, PolicyStep, RemedyAttempt, RepairOutcome, Resolution};
use crate::remedy::RemedyRegistry;
use crate::report::ErrorReport;
use dashmap::DashMap;
use heal_knowledge::{ErrorSignature, RepairSuggestionEngine, ReportEntry};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Applies learned or default remedies, escalating when none work
pub struct FixApplier {
    inner: Arc<Inner>,
}

struct Inner {
    engine: RepairSuggestionEngine,
    registry: Arc<RemedyRegistry>,
    escalator: Arc<dyn Escalator>,
    rules: Vec<DefaultRule>,
    locks: DashMap<ErrorSignature, Arc<Mutex<()>>>,
    auto_apply_threshold: f64,
    escalation_timeout: Duration,
    title_max_chars: usize,
}

impl FixApplier {
    /// Create applier; rules and thresholds come from `config`
    #[must_use]
    pub fn new(
        engine: RepairSuggestionEngine,
        registry: Arc<RemedyRegistry>,
        escalator: Arc<dyn Escalator>,
        config: &HealerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                registry,
                escalator,
                rules: config.default_rules.clone(),
                locks: DashMap::new(),
                auto_apply_threshold: config.auto_apply_threshold,
                escalation_timeout: config.escalation_timeout(),
                title_max_chars: config.title_max_chars,
            }),
        }
    }

    /// Try to fix the reported error
    ///
    /// Returns `true` iff some remedy succeeded before escalation.
    ///
    /// # Errors
    /// - `HealError::Store` if the message is blank
    /// - `HealError::Interrupted` if the repair task panicked
    pub async fn attempt_fix(&self, report: &ErrorReport) -> Result<bool, HealError> {
        Ok(self.run(report).await?.resolved)
    }

    /// Run the policy and return everything it did
    ///
    /// # Errors
    /// - `HealError::Store` if the message is blank
    /// - `HealError::Interrupted` if the repair task panicked
    pub async fn run(&self, report: &ErrorReport) -> Result<RepairOutcome, HealError> {
        let signature = report.signature()?;
        let inner = Arc::clone(&self.inner);
        let message = report.message.clone();

        let outcome = tokio::spawn(async move { inner.run_locked(signature, &message).await })
            .await
            .map_err(|e| HealError::Interrupted(e.to_string()))?;

        tracing::info!(
            signature = %outcome.signature,
            resolved = outcome.resolved,
            attempts = outcome.attempts.len(),
            remedy = outcome.winning_remedy().unwrap_or("-"),
            escalation_failed = outcome.escalation_error().is_some(),
            "repair run finished"
        );
        Ok(outcome)
    }

    /// Learning report from the knowledge store
    pub async fn repair_report(&self) -> Vec<ReportEntry> {
        self.inner.engine.report().await
    }

    /// Suggestion engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &RepairSuggestionEngine {
        &self.inner.engine
    }

    /// Remedy registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<RemedyRegistry> {
        &self.inner.registry
    }

    /// Auto-apply confidence threshold
    #[inline]
    #[must_use]
    pub fn auto_apply_threshold(&self) -> f64 {
        self.inner.auto_apply_threshold
    }

    /// Signatures with a run in flight or queued
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.locks.len()
    }
}

impl Inner {
    async fn run_locked(&self, signature: ErrorSignature, message: &str) -> RepairOutcome {
        let lock = Arc::clone(
            self.locks
                .entry(signature.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = lock.lock().await;
        let outcome = self.decide(signature.clone(), message).await;
        drop(guard);
        drop(lock);

        // Nobody else holds the lock once only the map references it
        self.locks.remove_if(&signature, |_, l| Arc::strong_count(l) == 1);
        outcome
    }

    async fn decide(&self, signature: ErrorSignature, message: &str) -> RepairOutcome {
        let mut steps = Vec::with_capacity(6);
        let mut attempts: Vec<RemedyAttempt> = Vec::new();
        enter(&mut steps, &signature, PolicyStep::Received);
        enter(&mut steps, &signature, PolicyStep::SuggestionLookup);

        if let Some(suggestion) = self.engine.suggest(&signature).await {
            if suggestion.confidence > self.auto_apply_threshold {
                enter(&mut steps, &signature, PolicyStep::AutoApply);
                let attempt = self
                    .execute(&suggestion.solution, AttemptSource::Learned)
                    .await;
                let success = attempt.succeeded();
                attempts.push(attempt);

                enter(&mut steps, &signature, PolicyStep::Learn);
                self.engine.learn(&signature, &suggestion.solution, success).await;

                if success {
                    enter(&mut steps, &signature, PolicyStep::Resolved);
                    return RepairOutcome {
                        signature,
                        resolved: true,
                        resolution: Resolution::AutoApplied {
                            remedy: suggestion.solution,
                        },
                        attempts,
                        steps,
                    };
                }
            } else {
                tracing::debug!(
                    signature = %signature,
                    confidence = suggestion.confidence,
                    threshold = self.auto_apply_threshold,
                    "learned fix below auto-apply threshold"
                );
            }
        }

        enter(&mut steps, &signature, PolicyStep::DefaultFixes);
        for rule in self.rules.iter().filter(|r| r.matches(message)) {
            if attempts.iter().any(|a| a.remedy == rule.remedy) {
                tracing::debug!(remedy = %rule.remedy, "remedy already tried this run, skipping");
                continue;
            }

            let attempt = self.execute(&rule.remedy, AttemptSource::Default).await;
            let success = attempt.succeeded();
            attempts.push(attempt);

            if success {
                enter(&mut steps, &signature, PolicyStep::Learn);
                self.engine.learn(&signature, &rule.remedy, true).await;
                enter(&mut steps, &signature, PolicyStep::Resolved);
                return RepairOutcome {
                    signature,
                    resolved: true,
                    resolution: Resolution::DefaultFix {
                        remedy: rule.remedy.clone(),
                    },
                    attempts,
                    steps,
                };
            }
        }

        enter(&mut steps, &signature, PolicyStep::Escalate);
        let issue = self.escalate(message, &attempts).await;
        enter(&mut steps, &signature, PolicyStep::Resolved);

        RepairOutcome {
            signature,
            resolved: false,
            resolution: Resolution::Escalated { issue },
            attempts,
            steps,
        }
    }

    async fn execute(&self, remedy: &str, source: AttemptSource) -> RemedyAttempt {
        let result = self.registry.execute(remedy).await;
        match &result {
            Ok(()) => tracing::info!(remedy, ?source, "remedy succeeded"),
            Err(e) => tracing::warn!(remedy, ?source, "remedy failed: {}", e),
        }
        RemedyAttempt::new(remedy, source, result)
    }

    async fn escalate(
        &self,
        message: &str,
        attempts: &[RemedyAttempt],
    ) -> Result<IssueId, EscalationError> {
        let title = escalation_title(message, self.title_max_chars);
        let body = escalation_body(message, attempts);
        tracing::warn!(title = %title, attempts = attempts.len(), "no remedy succeeded, escalating");

        match tokio::time::timeout(
            self.escalation_timeout,
            self.escalator.create_issue_or_pr(&title, &body),
        )
        .await
        {
            Ok(Ok(issue)) => {
                tracing::info!(issue = %issue, "escalation filed");
                Ok(issue)
            }
            Ok(Err(e)) => {
                tracing::error!(title = %title, "{}", e);
                Err(e)
            }
            Err(_) => {
                let e = EscalationError::TimedOut {
                    timeout_ms: self.escalation_timeout.as_millis() as u64,
                };
                tracing::error!(title = %title, "{}", e);
                Err(e)
            }
        }
    }
}

impl fmt::Debug for FixApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixApplier")
            .field("registry", &self.inner.registry)
            .field("rules", &self.inner.rules)
            .field("auto_apply_threshold", &self.inner.auto_apply_threshold)
            .field("in_flight", &self.inner.locks.len())
            .finish_non_exhaustive()
    }
}

fn enter(steps: &mut Vec<PolicyStep>, signature: &ErrorSignature, step: PolicyStep) {
    tracing::debug!(signature = %signature, step = %step, "policy step");
    steps.push(step);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemedyError;
    use crate::escalation::MockEscalator;
    use crate::remedy::FnRemedy;
    use heal_knowledge::{InMemoryKnowledgeStore, KnowledgeStore, RepairRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DB: &str = "restart database connection";
    const SVC: &str = "restart service";

    fn sig(s: &str) -> ErrorSignature {
        ErrorSignature::new(s).unwrap()
    }

    fn counting(
        name: &str,
        succeed: bool,
        calls: &Arc<AtomicUsize>,
    ) -> Arc<FnRemedy<impl Fn() -> Result<(), RemedyError> + Send + Sync>> {
        let calls = Arc::clone(calls);
        let owned = name.to_string();
        Arc::new(FnRemedy::new(name, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            if succeed {
                Ok(())
            } else {
                Err(RemedyError::failed(owned.clone(), "still broken"))
            }
        }))
    }

    fn applier(
        store: Arc<InMemoryKnowledgeStore>,
        registry: RemedyRegistry,
        escalator: MockEscalator,
    ) -> FixApplier {
        FixApplier::new(
            RepairSuggestionEngine::new(store),
            Arc::new(registry),
            Arc::new(escalator),
            &HealerConfig::default(),
        )
    }

    fn no_escalation() -> MockEscalator {
        let mut escalator = MockEscalator::new();
        escalator.expect_create_issue_or_pr().never();
        escalator
    }

    #[tokio::test]
    async fn confident_learned_fix_runs_before_defaults() {
        let store = Arc::new(InMemoryKnowledgeStore::from_records([RepairRecord::new(
            sig("database connection lost"),
            DB,
        )
        .with_counts(8, 2)]));
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RemedyRegistry::new(Duration::from_secs(1)).with(counting(DB, true, &calls));

        let fixer = applier(Arc::clone(&store), registry, no_escalation());
        let outcome = fixer.run(&ErrorReport::new("database connection lost")).await.unwrap();

        assert!(outcome.resolved);
        assert_eq!(outcome.resolution, Resolution::AutoApplied { remedy: DB.into() });
        assert!(!outcome.steps.contains(&PolicyStep::DefaultFixes));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let record = store.record(&sig("database connection lost")).await.unwrap().unwrap();
        assert_eq!((record.success_count, record.fail_count), (9, 2));
    }

    #[tokio::test]
    async fn threshold_is_strict() {
        let store = Arc::new(InMemoryKnowledgeStore::from_records([RepairRecord::new(
            sig("worker crashed"),
            SVC,
        )
        .with_counts(7, 3)]));
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RemedyRegistry::new(Duration::from_secs(1)).with(counting(SVC, true, &calls));

        let mut escalator = MockEscalator::new();
        escalator
            .expect_create_issue_or_pr()
            .times(1)
            .returning(|_, _| Ok(IssueId::new("GH-7")));

        let fixer = applier(Arc::clone(&store), registry, escalator);
        let outcome = fixer.run(&ErrorReport::new("worker crashed")).await.unwrap();

        assert!(!outcome.resolved);
        assert!(!outcome.steps.contains(&PolicyStep::AutoApply));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.escalation(), Some(&IssueId::new("GH-7")));
    }

    #[tokio::test]
    async fn failed_learned_fix_falls_back_to_defaults() {
        let store = Arc::new(InMemoryKnowledgeStore::from_records([RepairRecord::new(
            sig("memory pressure on cache node"),
            DB,
        )
        .with_counts(9, 1)]));
        let db_calls = Arc::new(AtomicUsize::new(0));
        let svc_calls = Arc::new(AtomicUsize::new(0));
        let registry = RemedyRegistry::new(Duration::from_secs(1))
            .with(counting(DB, false, &db_calls))
            .with(counting(SVC, true, &svc_calls));

        let fixer = applier(Arc::clone(&store), registry, no_escalation());
        let outcome = fixer
            .run(&ErrorReport::new("memory pressure on cache node"))
            .await
            .unwrap();

        assert!(outcome.resolved);
        assert_eq!(outcome.resolution, Resolution::DefaultFix { remedy: SVC.into() });
        assert_eq!(
            outcome.steps,
            vec![
                PolicyStep::Received,
                PolicyStep::SuggestionLookup,
                PolicyStep::AutoApply,
                PolicyStep::Learn,
                PolicyStep::DefaultFixes,
                PolicyStep::Learn,
                PolicyStep::Resolved,
            ]
        );

        // One failure for the learned fix, then one success for the default;
        // the stored solution name stays put
        let record = store
            .record(&sig("memory pressure on cache node"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!((record.success_count, record.fail_count), (10, 2));
        assert_eq!(record.solution, DB);
    }

    #[tokio::test]
    async fn failed_learned_fix_is_not_retried_as_default() {
        let store = Arc::new(InMemoryKnowledgeStore::from_records([RepairRecord::new(
            sig("database deadlock"),
            DB,
        )
        .with_counts(4, 1)]));
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RemedyRegistry::new(Duration::from_secs(1)).with(counting(DB, false, &calls));

        let mut escalator = MockEscalator::new();
        escalator
            .expect_create_issue_or_pr()
            .times(1)
            .returning(|_, _| Ok(IssueId::new("GH-1")));

        let fixer = applier(store, registry, escalator);
        let outcome = fixer.run(&ErrorReport::new("database deadlock")).await.unwrap();

        assert!(!outcome.resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[tokio::test]
    async fn unknown_learned_remedy_counts_as_failure() {
        let store = Arc::new(InMemoryKnowledgeStore::from_records([RepairRecord::new(
            sig("queue stalled"),
            "flush queue",
        )
        .with_counts(5, 0)]));

        let mut escalator = MockEscalator::new();
        escalator
            .expect_create_issue_or_pr()
            .times(1)
            .returning(|_, _| Ok(IssueId::new("GH-2")));

        let fixer = applier(Arc::clone(&store), RemedyRegistry::new(Duration::from_secs(1)), escalator);
        let outcome = fixer.run(&ErrorReport::new("queue stalled")).await.unwrap();

        assert!(!outcome.resolved);
        assert_eq!(
            outcome.attempts[0].result,
            Err(RemedyError::Unknown("flush queue".into()))
        );
        let record = store.record(&sig("queue stalled")).await.unwrap().unwrap();
        assert_eq!((record.success_count, record.fail_count), (5, 1));
    }

    #[tokio::test]
    async fn escalation_failure_keeps_false() {
        let mut escalator = MockEscalator::new();
        escalator
            .expect_create_issue_or_pr()
            .times(1)
            .returning(|_, _| Err(EscalationError::Delivery("tracker returned 503".into())));

        let fixer = applier(
            Arc::new(InMemoryKnowledgeStore::new()),
            RemedyRegistry::new(Duration::from_secs(1)),
            escalator,
        );
        let outcome = fixer.run(&ErrorReport::new("disk full")).await.unwrap();

        assert!(!outcome.resolved);
        assert_eq!(
            outcome.resolution,
            Resolution::Escalated {
                issue: Err(EscalationError::Delivery("tracker returned 503".into()))
            }
        );
        assert_eq!(outcome.escalation(), None);
    }

    #[derive(Debug)]
    struct HungTracker;

    #[async_trait::async_trait]
    impl Escalator for HungTracker {
        async fn create_issue_or_pr(
            &self,
            _title: &str,
            _body: &str,
        ) -> Result<IssueId, EscalationError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_escalation_times_out() {
        let config = HealerConfig::default();
        let fixer = FixApplier::new(
            RepairSuggestionEngine::new(Arc::new(InMemoryKnowledgeStore::new())),
            Arc::new(RemedyRegistry::new(Duration::from_secs(1))),
            Arc::new(HungTracker),
            &config,
        );
        let outcome = fixer.run(&ErrorReport::new("disk full")).await.unwrap();

        assert!(!outcome.resolved);
        assert_eq!(
            outcome.escalation_error(),
            Some(&EscalationError::TimedOut {
                timeout_ms: config.escalation_timeout().as_millis() as u64
            })
        );
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let fixer = applier(
            Arc::new(InMemoryKnowledgeStore::new()),
            RemedyRegistry::new(Duration::from_secs(1)),
            no_escalation(),
        );
        let err = fixer.attempt_fix(&ErrorReport::new("   ")).await.unwrap_err();
        assert!(matches!(err, HealError::Store(_)));
    }

    #[tokio::test]
    async fn lock_entries_are_released() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RemedyRegistry::new(Duration::from_secs(1)).with(counting(SVC, true, &calls));
        let fixer = applier(Arc::new(InMemoryKnowledgeStore::new()), registry, no_escalation());

        assert!(fixer.attempt_fix(&ErrorReport::new("timeout")).await.unwrap());
        assert_eq!(fixer.in_flight(), 0);
    }
}
