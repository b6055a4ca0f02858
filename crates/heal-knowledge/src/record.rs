//! Learned repair records and the values derived from them

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Key identifying a class of failure
///
/// By default this is the raw error message. Callers that want fuzzy matching
/// normalize before constructing it (see [`crate::normalize_signature`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ErrorSignature(String);

impl ErrorSignature {
    /// Create a signature from an error message
    ///
    /// # Errors
    /// - `StoreError::InvalidSignature` if the message is empty or blank
    pub fn new(message: impl Into<String>) -> Result<Self, StoreError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(StoreError::InvalidSignature(message));
        }
        Ok(Self(message))
    }

    /// Signature text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ErrorSignature {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ErrorSignature> for String {
    fn from(value: ErrorSignature) -> Self {
        value.0
    }
}

impl AsRef<str> for ErrorSignature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ErrorSignature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One learned (signature -> solution) association with its tally
///
/// Counters only ever grow. The solution name is fixed by the first
/// outcome recorded for the signature; later outcomes only move the counters,
/// whichever remedy produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRecord {
    /// Normalized error the record is keyed on
    pub signature: ErrorSignature,
    /// Remedy name suggested for the signature
    pub solution: String,
    /// Outcomes that fixed the error
    pub success_count: u64,
    /// Outcomes that did not
    pub fail_count: u64,
}

impl RepairRecord {
    /// Fresh record with zero counts
    #[inline]
    #[must_use]
    pub fn new(signature: ErrorSignature, solution: impl Into<String>) -> Self {
        Self {
            signature,
            solution: solution.into(),
            success_count: 0,
            fail_count: 0,
        }
    }

    /// Record with explicit counts (imports, fixtures)
    #[inline]
    #[must_use]
    pub fn with_counts(mut self, success_count: u64, fail_count: u64) -> Self {
        self.success_count = success_count;
        self.fail_count = fail_count;
        self
    }

    /// Fold one outcome into the tally
    pub fn apply(&mut self, success: bool) {
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
    }

    /// Total number of recorded outcomes
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.success_count + self.fail_count
    }

    /// Empirical success ratio, 0 when nothing has been recorded
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    /// Suggestion derived at read time
    #[inline]
    #[must_use]
    pub fn suggestion(&self) -> RepairSuggestion {
        RepairSuggestion {
            solution: self.solution.clone(),
            confidence: self.confidence(),
        }
    }

    /// Report line for this record
    #[inline]
    #[must_use]
    pub fn report_entry(&self) -> ReportEntry {
        ReportEntry {
            signature: self.signature.clone(),
            best_solution: self.solution.clone(),
            confidence: self.confidence(),
        }
    }
}

/// Transient answer to "how do I fix this?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairSuggestion {
    /// Remedy name
    pub solution: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

/// One line of the learning report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Normalized error
    pub signature: ErrorSignature,
    /// Stored remedy name
    pub best_solution: String,
    /// Confidence at report time
    pub confidence: f64,
}
