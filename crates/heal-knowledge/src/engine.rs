//! Repair suggestion engine
//!
//! Front door to the knowledge store for the decision policy. Store failures
//! never propagate from here: lookups degrade to "unknown" and updates are
//! best-effort, both with a logged warning.

use crate::record::{ErrorSignature, RepairRecord, RepairSuggestion, ReportEntry};
use crate::store::KnowledgeStore;
use std::sync::Arc;

/// Suggests remedies from learned outcomes
#[derive(Debug, Clone)]
pub struct RepairSuggestionEngine {
    store: Arc<dyn KnowledgeStore>,
}

impl RepairSuggestionEngine {
    /// Create engine over a shared store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Best known remedy for `signature`, or `None` if unknown or unreachable
    pub async fn suggest(&self, signature: &ErrorSignature) -> Option<RepairSuggestion> {
        match self.store.suggest(signature).await {
            Ok(Some(suggestion)) => {
                tracing::debug!(
                    signature = %signature,
                    solution = %suggestion.solution,
                    confidence = suggestion.confidence,
                    "suggested fix"
                );
                Some(suggestion)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    signature = %signature,
                    transient = e.is_transient(),
                    "suggestion lookup failed, treating as unknown: {}",
                    e
                );
                None
            }
        }
    }

    /// Record an outcome; a store failure is logged and dropped
    pub async fn learn(
        &self,
        signature: &ErrorSignature,
        solution: &str,
        success: bool,
    ) -> Option<RepairRecord> {
        match self.store.record_outcome(signature, solution, success).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    signature = %signature,
                    solution,
                    success,
                    transient = e.is_transient(),
                    "dropping repair outcome, store update failed: {}",
                    e
                );
                None
            }
        }
    }

    /// Learning report; empty if the store is unreachable
    pub async fn report(&self) -> Vec<ReportEntry> {
        self.store.report().await.unwrap_or_else(|e| {
            tracing::warn!("repair report unavailable: {}", e);
            Vec::new()
        })
    }

    /// Highest-confidence entries; empty if the store is unreachable
    pub async fn top(&self, n: usize) -> Vec<ReportEntry> {
        self.store.top(n).await.unwrap_or_else(|e| {
            tracing::warn!("ranked repair report unavailable: {}", e);
            Vec::new()
        })
    }

    /// Shared store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKnowledgeStore;
    use crate::sorted_set::{MemorySortedSet, SortedSetKnowledgeStore};

    fn sig(s: &str) -> ErrorSignature {
        ErrorSignature::new(s).unwrap()
    }

    #[tokio::test]
    async fn engine_suggests_learned_fix() {
        let engine = RepairSuggestionEngine::new(Arc::new(InMemoryKnowledgeStore::new()));
        let s = sig("connection refused");

        assert!(engine.suggest(&s).await.is_none());
        engine.learn(&s, "restart database connection", true).await.unwrap();

        let suggestion = engine.suggest(&s).await.unwrap();
        assert_eq!(suggestion.solution, "restart database connection");
        assert_eq!(suggestion.confidence, 1.0);
        assert_eq!(engine.report().await.len(), 1);
    }

    #[tokio::test]
    async fn engine_degrades_when_store_is_down() {
        let backend = Arc::new(MemorySortedSet::new());
        let engine = RepairSuggestionEngine::new(Arc::new(SortedSetKnowledgeStore::new(
            Arc::clone(&backend),
        )));
        let s = sig("timeout talking to cache");
        engine.learn(&s, "restart service", true).await.unwrap();

        backend.set_online(false);
        assert!(engine.suggest(&s).await.is_none());
        assert!(engine.learn(&s, "restart service", true).await.is_none());
        assert!(engine.report().await.is_empty());
        assert!(engine.top(5).await.is_empty());

        // The dropped update left the counters untouched
        backend.set_online(true);
        let record = engine.store().record(&s).await.unwrap().unwrap();
        assert_eq!(record.success_count, 1);
    }
}
