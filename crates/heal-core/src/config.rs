//! Healer configuration
//!
//! Every field has a default, so a TOML file only needs the values it changes:
//!
//! ```toml
//! auto_apply_threshold = 0.75
//! remedy_timeout_secs = 30
//!
//! [[remedies]]
//! name = "restart service"
//! program = "systemctl"
//! args = ["restart", "api"]
//!
//! [health]
//! check_interval_secs = 120
//! ```

use crate::error::ConfigError;
use crate::remedy::RemedyKind;
use heal_patterns::health;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Shell-command remedy definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemedyCommand {
    /// Registry name
    pub name: String,
    /// Program to run
    pub program: String,
    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl RemedyCommand {
    /// Create a command definition
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

/// Keyword rule for the default-fix fallback
///
/// Matches when the error message contains any keyword, ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRule {
    /// Substrings that trigger the rule
    pub keywords: Vec<String>,
    /// Remedy name to run
    pub remedy: String,
}

impl DefaultRule {
    /// Create a rule
    #[must_use]
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>, remedy: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            remedy: remedy.into(),
        }
    }

    /// Whether `message` triggers this rule
    #[must_use]
    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.keywords
            .iter()
            .any(|k| message.contains(&k.to_lowercase()))
    }
}

/// Periodic resource checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the checks at all
    pub enabled: bool,
    /// Seconds between performance samples
    pub performance_interval_secs: u64,
    /// Memory in MB above which the performance monitor warns
    pub performance_memory_limit_mb: f64,
    /// Seconds between module health checks
    pub check_interval_secs: u64,
    /// Memory in MB above which the health check fails
    pub check_memory_limit_mb: f64,
    /// Latency in milliseconds above which the health check fails
    pub slow_response_ms: u64,
}

impl HealthConfig {
    /// Performance sampling interval
    #[inline]
    #[must_use]
    pub fn performance_interval(&self) -> Duration {
        Duration::from_secs(self.performance_interval_secs)
    }

    /// Module health check interval
    #[inline]
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Slow-response limit
    #[inline]
    #[must_use]
    pub fn slow_response(&self) -> Duration {
        Duration::from_millis(self.slow_response_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.performance_interval_secs == 0 {
            return Err(ConfigError::invalid("health.performance_interval_secs", "must be positive"));
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::invalid("health.check_interval_secs", "must be positive"));
        }
        for (field, value) in [
            ("health.performance_memory_limit_mb", self.performance_memory_limit_mb),
            ("health.check_memory_limit_mb", self.check_memory_limit_mb),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid(field, format!("{value} is not a positive size")));
            }
        }
        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            performance_interval_secs: 60,
            performance_memory_limit_mb: health::DEFAULT_PERFORMANCE_MEMORY_LIMIT_MB,
            check_interval_secs: 300,
            check_memory_limit_mb: health::DEFAULT_HEALTH_MEMORY_LIMIT_MB,
            slow_response_ms: health::DEFAULT_SLOW_RESPONSE.as_millis() as u64,
        }
    }
}

/// Self-healer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealerConfig {
    /// Log buffer capacity
    pub buffer_capacity: usize,
    /// Trend analysis window in minutes
    pub trend_window_minutes: u64,
    /// Seconds between trend analyzer ticks
    pub trend_interval_secs: u64,
    /// Learned remedies run automatically above this confidence
    pub auto_apply_threshold: f64,
    /// Predictions above this confidence are logged as warnings
    pub actionable_prediction_threshold: f64,
    /// Remedy execution timeout in seconds
    pub remedy_timeout_secs: u64,
    /// Escalation timeout in seconds
    pub escalation_timeout_secs: u64,
    /// Characters of the message kept in escalation titles
    pub title_max_chars: usize,
    /// Shell-command remedies
    pub remedies: Vec<RemedyCommand>,
    /// Ordered default-fix rules
    pub default_rules: Vec<DefaultRule>,
    /// Periodic resource checks
    pub health: HealthConfig,
}

impl HealerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With buffer capacity
    #[inline]
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// With auto-apply threshold
    #[inline]
    #[must_use]
    pub fn with_auto_apply_threshold(mut self, threshold: f64) -> Self {
        self.auto_apply_threshold = threshold;
        self
    }

    /// With remedy timeout
    #[inline]
    #[must_use]
    pub fn with_remedy_timeout(mut self, timeout: Duration) -> Self {
        self.remedy_timeout_secs = timeout.as_secs();
        self
    }

    /// With escalation timeout
    #[inline]
    #[must_use]
    pub fn with_escalation_timeout(mut self, timeout: Duration) -> Self {
        self.escalation_timeout_secs = timeout.as_secs();
        self
    }

    /// With trend tick interval
    #[inline]
    #[must_use]
    pub fn with_trend_interval(mut self, interval: Duration) -> Self {
        self.trend_interval_secs = interval.as_secs();
        self
    }

    /// With default-fix rules, replacing the built-in ones
    #[inline]
    #[must_use]
    pub fn with_default_rules(mut self, rules: Vec<DefaultRule>) -> Self {
        self.default_rules = rules;
        self
    }

    /// With resource check settings
    #[inline]
    #[must_use]
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    /// With shell-command remedies, replacing the built-in ones
    #[inline]
    #[must_use]
    pub fn with_remedies(mut self, remedies: Vec<RemedyCommand>) -> Self {
        self.remedies = remedies;
        self
    }

    /// Remedy timeout
    #[inline]
    #[must_use]
    pub fn remedy_timeout(&self) -> Duration {
        Duration::from_secs(self.remedy_timeout_secs)
    }

    /// Escalation timeout
    #[inline]
    #[must_use]
    pub fn escalation_timeout(&self) -> Duration {
        Duration::from_secs(self.escalation_timeout_secs)
    }

    /// Trend tick interval
    #[inline]
    #[must_use]
    pub fn trend_interval(&self) -> Duration {
        Duration::from_secs(self.trend_interval_secs)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` if validation fails
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`from_toml_str`](Self::from_toml_str)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded healer config");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// - `ConfigError::Render` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check field ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::invalid("buffer_capacity", "must be positive"));
        }
        if self.trend_window_minutes == 0 {
            return Err(ConfigError::invalid("trend_window_minutes", "must be positive"));
        }
        if self.trend_interval_secs == 0 {
            return Err(ConfigError::invalid("trend_interval_secs", "must be positive"));
        }
        for (field, value) in [
            ("auto_apply_threshold", self.auto_apply_threshold),
            ("actionable_prediction_threshold", self.actionable_prediction_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")));
            }
        }
        if self.remedy_timeout_secs == 0 {
            return Err(ConfigError::invalid("remedy_timeout_secs", "must be positive"));
        }
        if self.escalation_timeout_secs == 0 {
            return Err(ConfigError::invalid("escalation_timeout_secs", "must be positive"));
        }
        if self.title_max_chars == 0 {
            return Err(ConfigError::invalid("title_max_chars", "must be positive"));
        }
        if let Some(remedy) = self.remedies.iter().find(|r| r.name.trim().is_empty() || r.program.is_empty()) {
            return Err(ConfigError::invalid(
                "remedies",
                format!("remedy {:?} needs a name and a program", remedy.name),
            ));
        }
        if let Some(rule) = self.default_rules.iter().find(|r| r.keywords.iter().all(|k| k.is_empty())) {
            return Err(ConfigError::invalid(
                "default_rules",
                format!("rule for {:?} has no keywords", rule.remedy),
            ));
        }
        self.health.validate()
    }
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: heal_patterns::DEFAULT_CAPACITY,
            trend_window_minutes: heal_patterns::trend::DEFAULT_WINDOW_MINUTES,
            trend_interval_secs: 10,
            auto_apply_threshold: 0.7,
            actionable_prediction_threshold: heal_patterns::trend::DEFAULT_ACTIONABLE_THRESHOLD,
            remedy_timeout_secs: 15,
            escalation_timeout_secs: 10,
            title_max_chars: 50,
            remedies: RemedyKind::ALL
                .iter()
                .map(|kind| RemedyCommand::new(kind.name(), "echo", [kind.name()]))
                .collect(),
            default_rules: vec![
                DefaultRule::new(["database", "connection"], RemedyKind::RestartDatabaseConnection.name()),
                DefaultRule::new(["timeout", "memory"], RemedyKind::RestartService.name()),
            ],
            health: HealthConfig::default(),
        }
    }
}
