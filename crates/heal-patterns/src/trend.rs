//! Trend analysis over the recent log window
//!
//! A heuristic signal generator, not a classifier: two marker rates are
//! compared against fixed thresholds and mapped to a fixed prediction.

use crate::buffer::PatternLogBuffer;
use crate::scheduler::PeriodicTask;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Marker counted toward the error rate (case-insensitive)
pub const ERROR_MARKER: &str = "error";
/// Marker counted toward the slowness rate (case-insensitive)
pub const SLOW_MARKER: &str = "slow";

/// Error rate above which a high-error prediction is emitted
pub const ERROR_RATE_THRESHOLD: f64 = 0.30;
/// Slowness rate above which a performance prediction is emitted
pub const SLOW_RATE_THRESHOLD: f64 = 0.20;

/// Confidence attached to the high-error prediction
pub const HIGH_ERROR_CONFIDENCE: f64 = 0.90;
/// Confidence attached to the performance prediction
pub const PERFORMANCE_CONFIDENCE: f64 = 0.85;

/// Predictions strictly above this confidence are actionable
pub const DEFAULT_ACTIONABLE_THRESHOLD: f64 = 0.8;
/// Default look-back window
pub const DEFAULT_WINDOW_MINUTES: u64 = 5;

/// Message of the high-error prediction
pub const HIGH_ERROR_MESSAGE: &str = "High error rate detected";
/// Message of the performance prediction
pub const PERFORMANCE_MESSAGE: &str = "Potential performance issue detected";
/// Message when neither rate crosses its threshold
pub const NO_ISSUES_MESSAGE: &str = "No issues detected";

/// Outcome of one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Human-readable summary
    pub message: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

impl Prediction {
    /// Create new prediction
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>, confidence: f64) -> Self {
        Self {
            message: message.into(),
            confidence,
        }
    }

    /// Whether the prediction should be surfaced as a warning
    #[inline]
    #[must_use]
    pub fn is_actionable(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }
}

/// Raw counts behind a prediction
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendStats {
    /// Messages inspected
    pub total: usize,
    /// Messages carrying the error marker
    pub error_count: usize,
    /// Messages carrying the slowness marker
    pub slow_count: usize,
    /// `error_count / total`, 0 for an empty batch
    pub error_rate: f64,
    /// `slow_count / total`, 0 for an empty batch
    pub slow_rate: f64,
}

impl TrendStats {
    /// Count markers across `messages`
    pub fn collect<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = Self::default();
        for message in messages {
            let lower = message.as_ref().to_lowercase();
            stats.total += 1;
            if lower.contains(ERROR_MARKER) {
                stats.error_count += 1;
            }
            if lower.contains(SLOW_MARKER) {
                stats.slow_count += 1;
            }
        }

        let denominator = stats.total.max(1) as f64;
        stats.error_rate = stats.error_count as f64 / denominator;
        stats.slow_rate = stats.slow_count as f64 / denominator;
        stats
    }

    /// Map the rates onto a prediction
    #[must_use]
    pub fn prediction(&self) -> Prediction {
        if self.error_rate > ERROR_RATE_THRESHOLD {
            Prediction::new(HIGH_ERROR_MESSAGE, HIGH_ERROR_CONFIDENCE)
        } else if self.slow_rate > SLOW_RATE_THRESHOLD {
            Prediction::new(PERFORMANCE_MESSAGE, PERFORMANCE_CONFIDENCE)
        } else {
            Prediction::new(NO_ISSUES_MESSAGE, 0.0)
        }
    }
}

/// Predict from an arbitrary batch of messages
pub fn analyze<I, S>(messages: I) -> Prediction
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    TrendStats::collect(messages).prediction()
}

/// Periodic analyzer bound to a shared log buffer
#[derive(Debug)]
pub struct TrendAnalyzer {
    buffer: Arc<PatternLogBuffer>,
    window_minutes: u64,
    actionable_threshold: f64,
    last: Mutex<Option<Prediction>>,
}

impl TrendAnalyzer {
    /// Create analyzer with default window and threshold
    #[inline]
    #[must_use]
    pub fn new(buffer: Arc<PatternLogBuffer>) -> Self {
        Self {
            buffer,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            actionable_threshold: DEFAULT_ACTIONABLE_THRESHOLD,
            last: Mutex::new(None),
        }
    }

    /// With look-back window
    #[inline]
    #[must_use]
    pub fn with_window_minutes(mut self, minutes: u64) -> Self {
        self.window_minutes = minutes;
        self
    }

    /// With actionable threshold
    #[inline]
    #[must_use]
    pub fn with_actionable_threshold(mut self, threshold: f64) -> Self {
        self.actionable_threshold = threshold;
        self
    }

    /// Compute a prediction from the current window
    #[must_use]
    pub fn predict(&self) -> Prediction {
        analyze(&self.buffer.recent(self.window_minutes))
    }

    /// One scheduled pass: predict and report
    pub fn tick(&self) -> Prediction {
        let prediction = self.predict();
        if prediction.is_actionable(self.actionable_threshold) {
            tracing::warn!(
                message = %prediction.message,
                confidence = prediction.confidence,
                "Potential error predicted: {} (Confidence: {:.2}%)",
                prediction.message,
                prediction.confidence * 100.0
            );
        } else {
            tracing::debug!("No significant error patterns detected");
        }
        *self.last.lock() = Some(prediction.clone());
        prediction
    }

    /// Prediction made by the most recent [`tick`](Self::tick)
    #[must_use]
    pub fn last_prediction(&self) -> Option<Prediction> {
        self.last.lock().clone()
    }

    /// Add a message to the underlying buffer
    #[inline]
    pub fn add_log(&self, message: impl Into<String>) {
        self.buffer.append(message);
    }

    /// Shared buffer
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &Arc<PatternLogBuffer> {
        &self.buffer
    }

    /// Actionable threshold in use
    #[inline]
    #[must_use]
    pub fn actionable_threshold(&self) -> f64 {
        self.actionable_threshold
    }
}

#[async_trait::async_trait]
impl PeriodicTask for TrendAnalyzer {
    fn name(&self) -> &str {
        "trend-analyzer"
    }

    async fn run(&self) {
        self.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(marked: usize, marker: &str, total: usize) -> Vec<String> {
        (0..total)
            .map(|i| {
                if i < marked {
                    format!("request {i} {marker}")
                } else {
                    format!("request {i} ok")
                }
            })
            .collect()
    }

    #[test]
    fn high_error_rate() {
        let prediction = analyze(lines(4, "error", 10));
        assert_eq!(prediction, Prediction::new(HIGH_ERROR_MESSAGE, 0.90));
    }

    #[test]
    fn slow_rate_without_errors() {
        let prediction = analyze(lines(3, "slow", 10));
        assert_eq!(prediction, Prediction::new(PERFORMANCE_MESSAGE, 0.85));
    }

    #[test]
    fn unrelated_lines() {
        let prediction = analyze(lines(0, "", 10));
        assert_eq!(prediction, Prediction::new(NO_ISSUES_MESSAGE, 0.0));
    }

    #[test]
    fn error_rate_takes_priority_over_slowness() {
        let mut logs = lines(6, "ERROR", 10);
        logs.extend(lines(5, "slow", 5));
        let prediction = analyze(logs);
        assert_eq!(prediction.message, HIGH_ERROR_MESSAGE);
    }

    #[test]
    fn thresholds_are_strict() {
        // 3/10 errors is exactly 30%, not above it
        let prediction = analyze(lines(3, "error", 10));
        assert_eq!(prediction.message, NO_ISSUES_MESSAGE);

        // 2/10 slow is exactly 20%
        let prediction = analyze(lines(2, "slow", 10));
        assert_eq!(prediction.message, NO_ISSUES_MESSAGE);
    }

    #[test]
    fn empty_window_has_no_issues() {
        let stats = TrendStats::collect(Vec::<String>::new());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.error_rate, 0.0);
        assert_eq!(stats.prediction().confidence, 0.0);
    }

    #[test]
    fn analyzer_reads_buffer_window() {
        let buffer = Arc::new(PatternLogBuffer::default());
        let analyzer = TrendAnalyzer::new(Arc::clone(&buffer));

        for line in lines(5, "Error", 10) {
            analyzer.add_log(line);
        }

        let prediction = analyzer.tick();
        assert!(prediction.is_actionable(analyzer.actionable_threshold()));
        assert_eq!(prediction.message, HIGH_ERROR_MESSAGE);
    }

    #[test]
    fn performance_prediction_is_actionable_at_default_threshold() {
        let prediction = Prediction::new(PERFORMANCE_MESSAGE, PERFORMANCE_CONFIDENCE);
        assert!(prediction.is_actionable(DEFAULT_ACTIONABLE_THRESHOLD));
        assert!(!Prediction::new(NO_ISSUES_MESSAGE, 0.0).is_actionable(DEFAULT_ACTIONABLE_THRESHOLD));
    }
}
