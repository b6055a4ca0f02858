//! Incoming error reports

use heal_knowledge::{ErrorSignature, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique error report identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Ulid);

impl ReportId {
    /// Generate new report ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An observed failure handed to the healer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Report id
    pub id: ReportId,
    /// Error message, used verbatim as the signature
    pub message: String,
    /// Component that raised it
    pub source: Option<String>,
    /// When the report was created
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl ErrorReport {
    /// Report for `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: ReportId::new(),
            message: message.into(),
            source: None,
            received_at: chrono::Utc::now(),
        }
    }

    /// Report built from any error's display text
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(error.to_string())
    }

    /// With originating component
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Signature for the knowledge store
    ///
    /// # Errors
    /// - `StoreError::InvalidSignature` if the message is blank
    pub fn signature(&self) -> Result<ErrorSignature, StoreError> {
        ErrorSignature::new(self.message.clone())
    }
}

impl From<&str> for ErrorReport {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorReport {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
