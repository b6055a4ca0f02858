//! One-shot trend prediction over a log file

use heal_core::HealerConfig;
use heal_patterns::{PatternError, PatternFrequency, PatternLogBuffer, Prediction, TrendAnalyzer};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Leading words listed in the report
pub const TOP_PATTERNS: usize = 5;

/// Errors from [`predict_file`]
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Log file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Buffer could not be created
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Result of analyzing a log file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictReport {
    /// Non-empty lines read
    pub lines_read: usize,
    /// Lines still buffered after eviction
    pub retained: usize,
    /// Analyzer verdict
    pub prediction: Prediction,
    /// Whether the verdict clears the actionable threshold
    pub actionable: bool,
    /// Most common leading words
    pub top_patterns: Vec<PatternFrequency>,
}

impl fmt::Display for PredictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lines read: {} (retained {})", self.lines_read, self.retained)?;
        writeln!(
            f,
            "Prediction: {} (confidence {:.2}{})",
            self.prediction.message,
            self.prediction.confidence,
            if self.actionable { ", actionable" } else { "" }
        )?;
        if !self.top_patterns.is_empty() {
            writeln!(f, "Top patterns:")?;
            for p in &self.top_patterns {
                writeln!(f, "  {:>6}  {}", p.frequency, p.pattern)?;
            }
        }
        Ok(())
    }
}

/// Buffer every non-empty line of `path` and analyze the window
///
/// Lines are stamped on arrival, so the whole file falls inside the window;
/// only the buffer capacity limits what is analyzed.
///
/// # Errors
/// - `PredictError::Io` if the file cannot be read
/// - `PredictError::Pattern` if the configured capacity is zero
pub async fn predict_file(
    path: impl AsRef<Path>,
    config: &HealerConfig,
) -> Result<PredictReport, PredictError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PredictError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let buffer = Arc::new(PatternLogBuffer::new(config.buffer_capacity)?);
    let analyzer = TrendAnalyzer::new(Arc::clone(&buffer))
        .with_window_minutes(config.trend_window_minutes)
        .with_actionable_threshold(config.actionable_prediction_threshold);

    let mut lines_read = 0;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        analyzer.add_log(line);
        lines_read += 1;
    }
    tracing::debug!(path = %path.display(), lines_read, "log file buffered");

    let prediction = analyzer.tick();
    let mut top_patterns = buffer.pattern_frequencies();
    top_patterns.truncate(TOP_PATTERNS);

    Ok(PredictReport {
        lines_read,
        retained: buffer.len(),
        actionable: prediction.is_actionable(config.actionable_prediction_threshold),
        prediction,
        top_patterns,
    })
}
