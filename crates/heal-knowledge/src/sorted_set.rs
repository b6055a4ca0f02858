//! Durable knowledge layout over a key / sorted-set store
//!
//! Layout:
//! - `repair:record:<signature>` - hash with `solution`, `success_count`, `fail_count`
//! - `repair:rank` - sorted set, member = signature, score = derived confidence
//!
//! Counters in the hash are authoritative. The rank score is rewritten after
//! every update and only drives ordering for [`KnowledgeStore::top`].

use crate::error::StoreError;
use crate::record::{ErrorSignature, RepairRecord, ReportEntry};
use crate::store::KnowledgeStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Key prefix of per-signature record hashes
pub const RECORD_PREFIX: &str = "repair:record:";
/// Sorted set ranking signatures by confidence
pub const RANK_KEY: &str = "repair:rank";

const FIELD_SOLUTION: &str = "solution";
const FIELD_SUCCESS: &str = "success_count";
const FIELD_FAIL: &str = "fail_count";

/// Sorted-set member with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    /// Member name
    pub member: String,
    /// Ranking score
    pub score: f64,
}

/// Operations required from an external key / sorted-set store
#[async_trait::async_trait]
pub trait SortedSetBackend: Send + Sync + std::fmt::Debug {
    /// Replace all fields of the hash at `key` in one write
    async fn set_fields(&self, key: &str, fields: HashMap<String, String>) -> Result<(), StoreError>;

    /// All fields of the hash at `key` (empty if absent)
    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Insert `member` into the sorted set at `key`, or update its score
    async fn add_scored(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError>;

    /// Members ranked `start..=stop` by descending score
    async fn range_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<ScoredMember>, StoreError>;

    /// Every key beginning with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
struct SortedSetState {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashMap<String, f64>>,
}

/// In-process sorted-set backend
///
/// Stands in for an external server in tests and single-node deployments.
/// Can be switched offline to exercise the unavailable-store path.
#[derive(Debug)]
pub struct MemorySortedSet {
    state: Mutex<SortedSetState>,
    online: AtomicBool,
}

impl MemorySortedSet {
    /// Create empty, online backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SortedSetState::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away or coming back
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Drop all keys
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.hashes.clear();
        state.sets.clear();
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("sorted-set backend offline".to_string()))
        }
    }
}

impl Default for MemorySortedSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SortedSetBackend for MemorySortedSet {
    async fn set_fields(&self, key: &str, fields: HashMap<String, String>) -> Result<(), StoreError> {
        self.check_online()?;
        self.state.lock().hashes.insert(key.to_string(), fields);
        Ok(())
    }

    async fn get_fields(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check_online()?;
        Ok(self.state.lock().hashes.get(key).cloned().unwrap_or_default())
    }

    async fn add_scored(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.state
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn range_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.check_online()?;
        let state = self.state.lock();
        let Some(set) = state.sets.get(key) else {
            return Ok(Vec::new());
        };

        let mut members: Vec<ScoredMember> = set
            .iter()
            .map(|(member, score)| ScoredMember {
                member: member.clone(),
                score: *score,
            })
            .collect();
        members.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.member.cmp(&b.member)));

        Ok(members
            .into_iter()
            .skip(start)
            .take(stop.saturating_sub(start).saturating_add(1))
            .collect())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        let state = self.state.lock();
        Ok(state
            .hashes
            .keys()
            .chain(state.sets.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Knowledge store persisted through a [`SortedSetBackend`]
#[derive(Debug)]
pub struct SortedSetKnowledgeStore<B> {
    backend: Arc<B>,
    // Serializes read-modify-write per signature
    locks: DashMap<ErrorSignature, Arc<tokio::sync::Mutex<()>>>,
}

impl<B: SortedSetBackend> SortedSetKnowledgeStore<B> {
    /// Create store over a shared backend
    #[inline]
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            locks: DashMap::new(),
        }
    }

    /// Underlying backend
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn lock_for(&self, signature: &ErrorSignature) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(signature.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .value(),
        )
    }

    async fn load(&self, signature: &ErrorSignature) -> Result<Option<RepairRecord>, StoreError> {
        let key = record_key(signature);
        let fields = self.backend.get_fields(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_record(&key, signature.clone(), &fields).map(Some)
    }

    async fn update(
        &self,
        signature: &ErrorSignature,
        solution: &str,
        success: bool,
    ) -> Result<RepairRecord, StoreError> {
        let mut record = self
            .load(signature)
            .await?
            .unwrap_or_else(|| RepairRecord::new(signature.clone(), solution));
        record.apply(success);

        self.backend
            .set_fields(&record_key(signature), encode_record(&record))
            .await?;

        // Counters are already durable; a stale rank only affects ordering
        if let Err(e) = self
            .backend
            .add_scored(RANK_KEY, record.confidence(), signature.as_str())
            .await
        {
            tracing::warn!(signature = %signature, "failed to update confidence rank: {}", e);
        }
        Ok(record)
    }
}

#[async_trait::async_trait]
impl<B: SortedSetBackend> KnowledgeStore for SortedSetKnowledgeStore<B> {
    async fn record_outcome(
        &self,
        signature: &ErrorSignature,
        solution: &str,
        success: bool,
    ) -> Result<RepairRecord, StoreError> {
        let lock = self.lock_for(signature);
        let guard = lock.lock().await;
        let result = self.update(signature, solution, success).await;
        drop(guard);
        drop(lock);

        // Unused once only the map references it
        self.locks.remove_if(signature, |_, l| Arc::strong_count(l) == 1);

        let record = result?;
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
        self.load(signature).await
    }

    async fn report(&self) -> Result<Vec<ReportEntry>, StoreError> {
        let keys = self.backend.keys_with_prefix(RECORD_PREFIX).await?;
        let mut entries = Vec::with_capacity(keys.len());

        for key in keys {
            let raw = &key[RECORD_PREFIX.len()..];
            let signature = ErrorSignature::new(raw).map_err(|_| StoreError::CorruptRecord {
                key: key.clone(),
                reason: "empty signature".to_string(),
            })?;
            let fields = self.backend.get_fields(&key).await?;
            if fields.is_empty() {
                continue;
            }
            entries.push(decode_record(&key, signature, &fields)?.report_entry());
        }

        Ok(entries)
    }

    async fn top(&self, n: usize) -> Result<Vec<ReportEntry>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let ranked = self.backend.range_with_scores(RANK_KEY, 0, n - 1).await?;
        let mut entries = Vec::with_capacity(ranked.len());
        for scored in ranked {
            let Ok(signature) = ErrorSignature::new(scored.member) else {
                continue;
            };
            if let Some(record) = self.load(&signature).await? {
                entries.push(record.report_entry());
            }
        }
        Ok(entries)
    }
}

fn record_key(signature: &ErrorSignature) -> String {
    format!("{RECORD_PREFIX}{signature}")
}

fn encode_record(record: &RepairRecord) -> HashMap<String, String> {
    HashMap::from([
        (FIELD_SOLUTION.to_string(), record.solution.clone()),
        (FIELD_SUCCESS.to_string(), record.success_count.to_string()),
        (FIELD_FAIL.to_string(), record.fail_count.to_string()),
    ])
}

fn decode_record(
    key: &str,
    signature: ErrorSignature,
    fields: &HashMap<String, String>,
) -> Result<RepairRecord, StoreError> {
    let corrupt = |reason: String| StoreError::CorruptRecord {
        key: key.to_string(),
        reason,
    };

    let solution = fields
        .get(FIELD_SOLUTION)
        .ok_or_else(|| corrupt(format!("missing field {FIELD_SOLUTION}")))?;
    let count = |field: &str| -> Result<u64, StoreError> {
        fields
            .get(field)
            .ok_or_else(|| corrupt(format!("missing field {field}")))?
            .parse::<u64>()
            .map_err(|e| corrupt(format!("{field}: {e}")))
    };

    Ok(RepairRecord::new(signature, solution.clone()).with_counts(count(FIELD_SUCCESS)?, count(FIELD_FAIL)?))
}
