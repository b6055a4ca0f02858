//! Outcome notifications

use crate::error::NotifyError;
use async_trait::async_trait;

/// Delivers "Fixed" / "Unresolved" messages to operators
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "heal::notify", "{}", message);
        Ok(())
    }
}
