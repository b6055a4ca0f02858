//! What a single policy run did

use crate::error::{EscalationError, RemedyError};
use crate::escalation::IssueId;
use heal_knowledge::ErrorSignature;
use std::fmt;

/// Decision policy states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyStep {
    /// Error accepted, signature derived
    Received,
    /// Knowledge store consulted
    SuggestionLookup,
    /// Learned remedy executed
    AutoApply,
    /// Keyword rules tried
    DefaultFixes,
    /// Outcome written to the store
    Learn,
    /// Handed to a human
    Escalate,
    /// Terminal
    Resolved,
}

impl fmt::Display for PolicyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::SuggestionLookup => "suggestion_lookup",
            Self::AutoApply => "auto_apply",
            Self::DefaultFixes => "default_fixes",
            Self::Learn => "learn",
            Self::Escalate => "escalate",
            Self::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// Where a remedy choice came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSource {
    /// Suggested by the knowledge store
    Learned,
    /// Matched by a keyword rule
    Default,
}

/// One remedy execution within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemedyAttempt {
    /// Remedy name
    pub remedy: String,
    /// Why it was chosen
    pub source: AttemptSource,
    /// Execution result
    pub result: Result<(), RemedyError>,
}

impl RemedyAttempt {
    /// Create attempt record
    #[must_use]
    pub fn new(remedy: impl Into<String>, source: AttemptSource, result: Result<(), RemedyError>) -> Self {
        Self {
            remedy: remedy.into(),
            source,
            result,
        }
    }

    /// Whether the remedy succeeded
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for RemedyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            AttemptSource::Learned => "learned",
            AttemptSource::Default => "default",
        };
        match &self.result {
            Ok(()) => write!(f, "{} ({source}): succeeded", self.remedy),
            Err(e) => write!(f, "{} ({source}): {e}", self.remedy),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Learned remedy succeeded
    AutoApplied {
        /// Remedy name
        remedy: String,
    },
    /// Keyword-rule remedy succeeded
    DefaultFix {
        /// Remedy name
        remedy: String,
    },
    /// Nothing worked; the issue is handed to a human
    Escalated {
        /// Tracker id, or why filing failed
        issue: Result<IssueId, EscalationError>,
    },
}

/// Full account of one policy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Signature the run was keyed on
    pub signature: ErrorSignature,
    /// Whether some remedy succeeded
    pub resolved: bool,
    /// Terminal branch
    pub resolution: Resolution,
    /// Remedies executed, in order
    pub attempts: Vec<RemedyAttempt>,
    /// States visited, in order
    pub steps: Vec<PolicyStep>,
}

impl RepairOutcome {
    /// Whether the run escalated
    #[inline]
    #[must_use]
    pub fn escalated(&self) -> bool {
        matches!(self.resolution, Resolution::Escalated { .. })
    }

    /// Issue filed, if any
    #[must_use]
    pub fn escalation(&self) -> Option<&IssueId> {
        match &self.resolution {
            Resolution::Escalated { issue } => issue.as_ref().ok(),
            _ => None,
        }
    }

    /// Why filing the escalation failed, if it did
    #[must_use]
    pub fn escalation_error(&self) -> Option<&EscalationError> {
        match &self.resolution {
            Resolution::Escalated { issue: Err(e) } => Some(e),
            _ => None,
        }
    }

    /// Remedy that fixed the error, if any
    #[must_use]
    pub fn winning_remedy(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::AutoApplied { remedy } | Resolution::DefaultFix { remedy } => Some(remedy),
            Resolution::Escalated { .. } => None,
        }
    }
}
