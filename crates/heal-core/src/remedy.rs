//! Remedies and the remedy registry
//!
//! A remedy is a named, side-effecting repair action. The decision policy only
//! ever refers to remedies by name; the [`RemedyRegistry`] resolves names and
//! runs remedies under a timeout. Unknown names fail closed.

use crate::config::HealerConfig;
use crate::error::RemedyError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Result of one remedy execution
pub type RemedyResult = Result<(), RemedyError>;

/// A named repair action
#[async_trait]
pub trait Remedy: Send + Sync + fmt::Debug {
    /// Registry name
    fn name(&self) -> &str;

    /// Run the action once
    async fn execute(&self) -> RemedyResult;
}

/// Remedies the default rules know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemedyKind {
    /// Re-establish the database connection
    RestartDatabaseConnection,
    /// Restart the service process
    RestartService,
}

impl RemedyKind {
    /// Every built-in kind
    pub const ALL: [Self; 2] = [Self::RestartDatabaseConnection, Self::RestartService];

    /// Registry name
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RestartDatabaseConnection => "restart database connection",
            Self::RestartService => "restart service",
        }
    }
}

impl fmt::Display for RemedyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remedy that runs an external program
///
/// Success means the program exited with status zero.
#[derive(Debug, Clone)]
pub struct CommandRemedy {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandRemedy {
    /// Create from name, program and arguments
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&crate::config::RemedyCommand> for CommandRemedy {
    fn from(cmd: &crate::config::RemedyCommand) -> Self {
        Self::new(&cmd.name, &cmd.program, &cmd.args)
    }
}

#[async_trait]
impl Remedy for CommandRemedy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> RemedyResult {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RemedyError::Launch {
                name: self.name.clone(),
                reason: format!("{}: {e}", self.program),
            })?;

        if output.status.success() {
            tracing::debug!(
                remedy = %self.name,
                stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                "remedy command succeeded"
            );
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(RemedyError::failed(
                &self.name,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ))
        }
    }
}

/// Remedy backed by a synchronous closure
pub struct FnRemedy<F> {
    name: String,
    action: F,
}

impl<F> FnRemedy<F>
where
    F: Fn() -> RemedyResult + Send + Sync,
{
    /// Create from name and closure
    #[must_use]
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

impl<F> fmt::Debug for FnRemedy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRemedy").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Remedy for FnRemedy<F>
where
    F: Fn() -> RemedyResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> RemedyResult {
        (self.action)()
    }
}

/// Name to remedy lookup with bounded execution
#[derive(Debug, Clone)]
pub struct RemedyRegistry {
    remedies: HashMap<String, Arc<dyn Remedy>>,
    timeout: Duration,
}

impl RemedyRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            remedies: HashMap::new(),
            timeout,
        }
    }

    /// Registry holding the configured command remedies
    #[must_use]
    pub fn from_config(config: &HealerConfig) -> Self {
        let mut registry = Self::new(config.remedy_timeout());
        for cmd in &config.remedies {
            registry.register(Arc::new(CommandRemedy::from(cmd)));
        }
        registry
    }

    /// Register a remedy under its own name, returning any it replaced
    pub fn register(&mut self, remedy: Arc<dyn Remedy>) -> Option<Arc<dyn Remedy>> {
        self.remedies.insert(remedy.name().to_string(), remedy)
    }

    /// With a remedy registered
    #[must_use]
    pub fn with(mut self, remedy: Arc<dyn Remedy>) -> Self {
        self.register(remedy);
        self
    }

    /// Look up a remedy
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Remedy>> {
        self.remedies.get(name)
    }

    /// Whether `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.remedies.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.remedies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execution timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the remedy registered as `name`
    ///
    /// The remedy runs on its own task so a panic surfaces as
    /// `RemedyError::Aborted` instead of unwinding into the caller. A remedy
    /// still running when the timeout elapses is aborted.
    ///
    /// # Errors
    /// - `RemedyError::Unknown` if nothing is registered under `name`
    /// - `RemedyError::TimedOut` if the timeout elapses
    /// - whatever the remedy itself reports
    pub async fn execute(&self, name: &str) -> RemedyResult {
        let remedy = self
            .remedies
            .get(name)
            .cloned()
            .ok_or_else(|| RemedyError::Unknown(name.to_string()))?;

        tracing::debug!(remedy = name, timeout_ms = self.timeout.as_millis() as u64, "executing remedy");
        let mut task = tokio::spawn(async move { remedy.execute().await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(RemedyError::Aborted {
                name: name.to_string(),
                reason: join_err.to_string(),
            }),
            Err(_) => {
                task.abort();
                Err(RemedyError::TimedOut {
                    name: name.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

impl Default for RemedyRegistry {
    fn default() -> Self {
        Self::from_config(&HealerConfig::default())
    }
}
