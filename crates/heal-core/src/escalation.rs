//! Human escalation
//!
//! When neither a learned nor a default remedy succeeds, the error is handed
//! to an [`Escalator`] that files an issue or pull request somewhere a human
//! will see it.

use crate::error::EscalationError;
use crate::outcome::RemedyAttempt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier returned by the issue tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Wrap a tracker id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Files unresolved errors for human attention
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Escalator: Send + Sync {
    /// Open an issue or pull request
    async fn create_issue_or_pr(&self, title: &str, body: &str) -> Result<IssueId, EscalationError>;
}

/// Escalator that only writes a warning to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEscalator;

#[async_trait]
impl Escalator for LogEscalator {
    async fn create_issue_or_pr(&self, title: &str, body: &str) -> Result<IssueId, EscalationError> {
        let id = IssueId::new(format!("local-{}", uuid::Uuid::new_v4()));
        tracing::warn!(issue = %id, title, body, "escalated to human");
        Ok(id)
    }
}

/// Issue title: `"Fix: "` plus the first `max_chars` characters of the message
///
/// `"..."` is appended when the message was cut.
#[must_use]
pub fn escalation_title(message: &str, max_chars: usize) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("Fix: {head}...")
    } else {
        format!("Fix: {head}")
    }
}

/// Issue body: the full message and every remedy tried
#[must_use]
pub fn escalation_body(message: &str, attempts: &[RemedyAttempt]) -> String {
    let mut body = format!("Unresolved error:\n\n{message}\n\nAttempted remedies:\n");
    if attempts.is_empty() {
        body.push_str("- none matched\n");
    }
    for attempt in attempts {
        body.push_str(&format!("- {attempt}\n"));
    }
    body
}
