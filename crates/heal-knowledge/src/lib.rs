//! Heal Knowledge - the learning half of the repair loop
//!
//! Maps an error signature to the best known solution and its running
//! success/failure tally. Confidence is always derived from the tally:
//!
//! ```text
//! confidence = success_count / (success_count + fail_count)   (0 when both are 0)
//! ```
//!
//! Backends:
//! - [`InMemoryKnowledgeStore`] - process-lifetime map, optional JSON snapshots
//! - [`SortedSetKnowledgeStore`] - durable layout over any [`SortedSetBackend`]
//!
//! The [`RepairSuggestionEngine`] sits in front of either backend and turns
//! store failures into "unknown" so callers can degrade gracefully.

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod memory;
pub mod normalize;
pub mod record;
pub mod sorted_set;
pub mod store;

pub use engine::RepairSuggestionEngine;
pub use error::StoreError;
pub use memory::InMemoryKnowledgeStore;
pub use normalize::normalize_signature;
pub use record::{ErrorSignature, RepairRecord, RepairSuggestion, ReportEntry};
pub use sorted_set::{MemorySortedSet, ScoredMember, SortedSetBackend, SortedSetKnowledgeStore};
pub use store::KnowledgeStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
