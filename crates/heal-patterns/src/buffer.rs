//! Bounded log pattern buffer
//!
//! Keeps the most recent log messages in arrival order:
//! - FIFO eviction once the fixed capacity is exceeded
//! - Time-windowed snapshots for trend analysis
//! - First-word frequency breakdown of the retained entries
//!
//! The buffer is an owned component. Create it once, wrap it in an `Arc`, and
//! hand it to every producer and consumer that needs it.

use crate::error::PatternError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default number of retained entries
pub const DEFAULT_CAPACITY: usize = 1000;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// A single recorded log message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp in milliseconds
    pub timestamp_millis: i64,
    /// Free-form message text
    pub message: String,
}

/// Frequency of a leading word across retained entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFrequency {
    /// First whitespace-separated word of the message
    pub pattern: String,
    /// Number of entries starting with it
    pub frequency: usize,
}

/// Snapshot of messages inside a time window
///
/// Finite and restartable: iterate it as many times as needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentLogs {
    messages: Vec<String>,
}

impl RecentLogs {
    /// Iterate over the messages, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.messages.iter().map(String::as_str)
    }

    /// Number of messages in the window
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Consume into the owned messages
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.messages
    }
}

impl IntoIterator for RecentLogs {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecentLogs {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Bounded, time-ordered window of recent log events
#[derive(Debug)]
pub struct PatternLogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl PatternLogBuffer {
    /// Create a buffer retaining at most `capacity` entries
    ///
    /// # Errors
    /// - `PatternError::InvalidCapacity` if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self, PatternError> {
        if capacity == 0 {
            return Err(PatternError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Record a message stamped with the current time
    pub fn append(&self, message: impl Into<String>) {
        self.append_at(now_millis(), message);
    }

    /// Record a message with an explicit timestamp
    pub fn append_at(&self, timestamp_millis: i64, message: impl Into<String>) {
        let message = message.into();
        tracing::trace!(timestamp_millis, message = %message, "log added");

        let mut entries = self.entries.lock();
        entries.push_back(LogEntry {
            timestamp_millis,
            message,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Messages newer than `now - window_minutes`
    #[must_use]
    pub fn recent(&self, window_minutes: u64) -> RecentLogs {
        self.recent_at(now_millis(), window_minutes)
    }

    /// Messages newer than `now_millis - window_minutes`, for a caller-supplied clock
    #[must_use]
    pub fn recent_at(&self, now_millis: i64, window_minutes: u64) -> RecentLogs {
        let window = i64::try_from(window_minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(MILLIS_PER_MINUTE);
        let cutoff = now_millis.saturating_sub(window);

        let entries = self.entries.lock();
        let messages = entries
            .iter()
            .filter(|e| e.timestamp_millis > cutoff)
            .map(|e| e.message.clone())
            .collect();
        RecentLogs { messages }
    }

    /// Leading-word frequencies over all retained entries, most frequent first
    ///
    /// Ties are broken alphabetically so the output is deterministic.
    #[must_use]
    pub fn pattern_frequencies(&self) -> Vec<PatternFrequency> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        {
            let entries = self.entries.lock();
            for entry in entries.iter() {
                let key = entry.message.split(' ').next().unwrap_or_default();
                *counts.entry(key.to_string()).or_default() += 1;
            }
        }

        let mut patterns: Vec<PatternFrequency> = counts
            .into_iter()
            .map(|(pattern, frequency)| PatternFrequency { pattern, frequency })
            .collect();
        patterns.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        patterns
    }

    /// Copy of all retained entries, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of retained entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the buffer is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of retained entries
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PatternLogBuffer {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            entries: Mutex::new(VecDeque::with_capacity(DEFAULT_CAPACITY)),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn buffer_rejects_zero_capacity() {
        assert_eq!(
            PatternLogBuffer::new(0).unwrap_err(),
            PatternError::InvalidCapacity(0)
        );
    }

    #[test]
    fn buffer_evicts_oldest_past_capacity() {
        let buffer = PatternLogBuffer::new(DEFAULT_CAPACITY).unwrap();
        for i in 0..=DEFAULT_CAPACITY {
            buffer.append(format!("entry {i}"));
        }

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), DEFAULT_CAPACITY);
        assert_eq!(entries[0].message, "entry 1");
        assert_eq!(
            entries.last().unwrap().message,
            format!("entry {DEFAULT_CAPACITY}")
        );
    }

    #[test]
    fn recent_filters_by_window() {
        let buffer = PatternLogBuffer::default();
        let now = 10 * MILLIS_PER_MINUTE;

        buffer.append_at(now - 6 * MILLIS_PER_MINUTE, "too old");
        buffer.append_at(now - 5 * MILLIS_PER_MINUTE, "exactly on cutoff");
        buffer.append_at(now - MILLIS_PER_MINUTE, "fresh");

        let recent = buffer.recent_at(now, 5);
        assert_eq!(recent.iter().collect::<Vec<_>>(), vec!["fresh"]);
    }

    #[test]
    fn recent_is_restartable_and_side_effect_free() {
        let buffer = PatternLogBuffer::default();
        buffer.append("one");
        buffer.append("two");

        let recent = buffer.recent(5);
        let first: Vec<_> = recent.iter().collect();
        let second: Vec<_> = recent.iter().collect();
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn pattern_frequencies_sorted_descending() {
        let buffer = PatternLogBuffer::default();
        buffer.append("GET /users");
        buffer.append("POST /orders");
        buffer.append("GET /orders");
        buffer.append("GET /health");

        let patterns = buffer.pattern_frequencies();
        assert_eq!(patterns[0].pattern, "GET");
        assert_eq!(patterns[0].frequency, 3);
        assert_eq!(patterns[1].pattern, "POST");
        assert_eq!(patterns[1].frequency, 1);
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(capacity in 1usize..64, appends in 0usize..256) {
            let buffer = PatternLogBuffer::new(capacity).unwrap();
            for i in 0..appends {
                buffer.append_at(i as i64, format!("m{i}"));
            }
            prop_assert_eq!(buffer.len(), appends.min(capacity));

            // Retained entries are always the newest ones
            if appends > 0 {
                let last = buffer.snapshot().last().cloned().unwrap();
                prop_assert_eq!(last.message, format!("m{}", appends - 1));
            }
        }
    }
}
