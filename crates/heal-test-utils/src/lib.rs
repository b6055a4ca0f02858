//! Testing utilities for the heal workspace
//!
//! Scripted remedies, recording boundaries, and pre-seeded stores.

#![allow(missing_docs)]

use async_trait::async_trait;
use heal_core::{
    EscalationError, Escalator, HealerConfig, IssueId, Notifier, NotifyError, Remedy,
    RemedyError, RemedyRegistry, RemedyResult, SelfHealer,
};
use heal_knowledge::{ErrorSignature, InMemoryKnowledgeStore, RepairRecord};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Remedy that replays a fixed script of outcomes
///
/// Once the script runs out the last outcome repeats.
#[derive(Debug)]
pub struct ScriptedRemedy {
    name: String,
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedRemedy {
    pub fn new(name: &str, script: impl IntoIterator<Item = bool>) -> Self {
        let script: VecDeque<bool> = script.into_iter().collect();
        let fallback = script.back().copied().unwrap_or(true);
        Self {
            name: name.to_string(),
            script: Mutex::new(script),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(name: &str) -> Self {
        Self::new(name, [true])
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, [false])
    }

    /// Sleep before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Remedy for ScriptedRemedy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> RemedyResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let succeed = self.script.lock().pop_front().unwrap_or(self.fallback);
        if succeed {
            Ok(())
        } else {
            Err(RemedyError::failed(&self.name, "scripted failure"))
        }
    }
}

/// Escalator that keeps every request
#[derive(Debug, Default)]
pub struct RecordingEscalator {
    requests: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingEscalator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escalator whose deliveries always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(title, body)` pairs in arrival order
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Escalator for RecordingEscalator {
    async fn create_issue_or_pr(&self, title: &str, body: &str) -> Result<IssueId, EscalationError> {
        let mut requests = self.requests.lock();
        requests.push((title.to_string(), body.to_string()));
        if self.fail {
            return Err(EscalationError::Delivery("recording escalator set to fail".into()));
        }
        Ok(IssueId::new(format!("TEST-{}", requests.len())))
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

pub fn signature(message: &str) -> ErrorSignature {
    ErrorSignature::new(message).unwrap()
}

/// Store holding one record per `(signature, solution, successes, failures)`
pub fn seeded_store(seeds: &[(&str, &str, u64, u64)]) -> Arc<InMemoryKnowledgeStore> {
    Arc::new(InMemoryKnowledgeStore::from_records(seeds.iter().map(
        |(sig, solution, s, f)| RepairRecord::new(signature(sig), *solution).with_counts(*s, *f),
    )))
}

/// Registry over the given remedies with a one-second timeout
pub fn registry_with(remedies: &[Arc<ScriptedRemedy>]) -> RemedyRegistry {
    let mut registry = RemedyRegistry::new(Duration::from_secs(1));
    for remedy in remedies {
        registry.register(Arc::clone(remedy) as Arc<dyn Remedy>);
    }
    registry
}

/// Healer over the given store and remedies with recording boundaries
pub fn setup_test_healer(
    store: Arc<InMemoryKnowledgeStore>,
    remedies: &[Arc<ScriptedRemedy>],
) -> (SelfHealer, Arc<RecordingEscalator>, Arc<RecordingNotifier>) {
    let escalator = Arc::new(RecordingEscalator::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let healer = SelfHealer::builder(HealerConfig::default())
        .store(store)
        .registry(registry_with(remedies))
        .escalator(Arc::clone(&escalator) as Arc<dyn Escalator>)
        .notifier(Arc::clone(&notifier) as Arc<dyn Notifier>)
        .build()
        .unwrap();
    (healer, escalator, notifier)
}
