//! The knowledge store contract
//!
//! Every backend honours the same rules:
//! - `record_outcome` is atomic per signature (no lost updates)
//! - a record exists iff `record_outcome` was called for its signature
//! - confidence is derived from counters, never stored independently

use crate::error::StoreError;
use crate::record::{ErrorSignature, RepairRecord, RepairSuggestion, ReportEntry};

/// Persistent mapping from error signature to learned repair
#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync + std::fmt::Debug {
    /// Fold one outcome into the signature's record, creating it if absent
    ///
    /// Returns the record as it stands after the update.
    async fn record_outcome(
        &self,
        signature: &ErrorSignature,
        solution: &str,
        success: bool,
    ) -> Result<RepairRecord, StoreError>;

    /// Current record for a signature
    async fn record(&self, signature: &ErrorSignature) -> Result<Option<RepairRecord>, StoreError>;

    /// Stored solution and derived confidence, or `None` if never recorded
    async fn suggest(
        &self,
        signature: &ErrorSignature,
    ) -> Result<Option<RepairSuggestion>, StoreError> {
        Ok(self.record(signature).await?.map(|r| r.suggestion()))
    }

    /// One entry per known signature, in unspecified order
    async fn report(&self) -> Result<Vec<ReportEntry>, StoreError>;

    /// Up to `n` entries ordered by descending confidence
    async fn top(&self, n: usize) -> Result<Vec<ReportEntry>, StoreError> {
        let mut entries = self.report().await?;
        entries.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        entries.truncate(n);
        Ok(entries)
    }
}
