//! Process-lifetime knowledge store
//!
//! Records live in a sharded concurrent map. Each update runs under the
//! shard lock of its signature, so concurrent outcomes for the same signature
//! never lose increments while different signatures proceed in parallel.

use crate::error::StoreError;
use crate::record::{ErrorSignature, RepairRecord, ReportEntry};
use crate::store::KnowledgeStore;
use dashmap::DashMap;
use std::path::Path;

/// In-memory repair knowledge
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeStore {
    records: DashMap<ErrorSignature, RepairRecord>,
}

impl InMemoryKnowledgeStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-populated with records
    ///
    /// A later record for the same signature replaces an earlier one.
    pub fn from_records(records: impl IntoIterator<Item = RepairRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.signature.clone(), record);
        }
        store
    }

    /// Copy of every record, sorted by signature
    #[must_use]
    pub fn records(&self) -> Vec<RepairRecord> {
        let mut records: Vec<RepairRecord> =
            self.records.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.signature.cmp(&b.signature));
        records
    }

    /// Number of known signatures
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been learned yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write all records to a JSON snapshot
    ///
    /// # Errors
    /// - `StoreError::Snapshot` if serialization or the write fails
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.records())
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        tokio::fs::write(path.as_ref(), json)
            .await
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.as_ref().display())))?;
        tracing::debug!(path = %path.as_ref().display(), records = self.len(), "knowledge snapshot saved");
        Ok(())
    }

    /// Restore a store from a JSON snapshot
    ///
    /// # Errors
    /// - `StoreError::Snapshot` if the file cannot be read or decoded
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.as_ref().display())))?;
        let records: Vec<RepairRecord> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Ok(Self::from_records(records))
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn record_outcome(
        &self,
        signature: &ErrorSignature,
        solution: &str,
        success: bool,
    ) -> Result<RepairRecord, StoreError> {
        let mut entry = self
            .records
            .entry(signature.clone())
            .or_insert_with(|| RepairRecord::new(signature.clone(), solution));
        entry.apply(success);
        let record = entry.value().clone();
        drop(entry);

        tracing::info!(
            signature = %signature,
            solution,
            success,
            confidence = record.confidence(),
            "learned repair outcome"
        );
        Ok(record)
    }

    async fn record(&self, signature: &ErrorSignature) -> Result<Option<RepairRecord>, StoreError> {
        Ok(self.records.get(signature).map(|r| r.value().clone()))
    }

    async fn report(&self) -> Result<Vec<ReportEntry>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|e| e.value().report_entry())
            .collect())
    }
}
