// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line buffering and batch construction.
//!
//! A [`LogBuffer`] holds formatted lines until the flush policy decides they
//! should go out. Draining joins the lines into one block and empties the
//! buffer in the same call, so a line is either in the buffer or in exactly one
//! drained block, never both.
//!
//! # Size Limit
//!
//! Webhook endpoints reject messages above a fixed character count. A block
//! longer than the limit keeps its *tail*: the oldest characters are dropped and
//! replaced by [`ELLIPSIS`], because the most recent lines are usually the
//! interesting ones (the error that triggered the flush is always last).
//!
//! ```text
//! limit = 12
//! "alpha\nbeta\ngamma"  ->  "...eta\ngamma"
//! ```

use crate::config::ELLIPSIS;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::severity::Severity;

/// When a buffer should be flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Records at or above this severity flush immediately.
    pub flush_level: Severity,
    /// Buffered record count that forces a flush.
    pub max_entries: usize,
    /// Maximum age of the oldest unflushed data.
    pub interval: Duration,
}

impl FlushPolicy {
    /// True when at least one trigger fires.
    #[must_use]
    pub fn should_flush(&self, severity: Severity, buffered: usize, since_flush: Duration) -> bool {
        severity >= self.flush_level || buffered >= self.max_entries || since_flush >= self.interval
    }
}

/// Ordered buffer of formatted log lines.
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    max_message_length: usize,
    last_flush: Instant,
}

impl LogBuffer {
    #[must_use]
    pub fn new(max_message_length: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_message_length,
            last_flush: Instant::now(),
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn since_last_flush(&self) -> Duration {
        self.last_flush.elapsed()
    }

    /// Takes every buffered line as one newline-joined block, truncated to the
    /// configured length.
    ///
    /// Returns `None` and leaves the flush timestamp alone when the buffer is
    /// empty. Otherwise the buffer is emptied and the flush timestamp reset.
    pub fn drain(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }

        let joined = self.lines.drain(..).collect::<Vec<_>>().join("\n");
        self.last_flush = Instant::now();
        Some(truncate_tail(joined, self.max_message_length))
    }
}

/// Keeps the last `max_len - 3` characters of `text` behind an ellipsis when
/// `text` is longer than `max_len` characters.
///
/// Lengths are counted in `char`s, never splitting a code point.
#[must_use]
pub fn truncate_tail(text: String, max_len: usize) -> String {
    let total = text.chars().count();
    if total <= max_len {
        return text;
    }

    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let start = text
        .char_indices()
        .nth(total - keep)
        .map_or(text.len(), |(idx, _)| idx);

    let mut truncated = String::with_capacity(ELLIPSIS.len() + text.len() - start);
    truncated.push_str(ELLIPSIS);
    truncated.push_str(&text[start..]);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> FlushPolicy {
        FlushPolicy {
            flush_level: Severity::Warn,
            max_entries: 10,
            interval: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_policy_triggers() {
        let policy = policy();
        let fresh = Duration::from_millis(10);

        assert!(!policy.should_flush(Severity::Info, 1, fresh));
        assert!(!policy.should_flush(Severity::Debug, 9, fresh));
        assert!(policy.should_flush(Severity::Warn, 1, fresh));
        assert!(policy.should_flush(Severity::Error, 1, fresh));
        assert!(policy.should_flush(Severity::Info, 10, fresh));
        assert!(policy.should_flush(Severity::Info, 1, Duration::from_secs(1)));
    }

    #[test]
    fn test_drain_joins_lines_in_order() {
        let mut buffer = LogBuffer::new(2000);
        buffer.push("first".to_string());
        buffer.push("second".to_string());
        buffer.push("third".to_string());

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.drain().as_deref(), Some("first\nsecond\nthird"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_empty_is_none() {
        let mut buffer = LogBuffer::new(2000);
        assert_eq!(buffer.drain(), None);
    }

    #[test]
    fn test_drain_starts_fresh_batch() {
        let mut buffer = LogBuffer::new(2000);
        buffer.push("old".to_string());
        assert_eq!(buffer.drain().as_deref(), Some("old"));

        buffer.push("new".to_string());
        assert_eq!(buffer.drain().as_deref(), Some("new"));
    }

    #[test]
    fn test_drain_resets_flush_clock() {
        let mut buffer = LogBuffer::new(2000);
        std::thread::sleep(Duration::from_millis(20));
        buffer.push("line".to_string());
        assert!(buffer.since_last_flush() >= Duration::from_millis(20));

        buffer.drain();
        assert!(buffer.since_last_flush() < Duration::from_millis(20));
    }

    #[test]
    fn test_truncate_keeps_tail() {
        let text = "alpha\nbeta\ngamma".to_string();
        assert_eq!(truncate_tail(text, 12), "...eta\ngamma");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_tail("short".to_string(), 5), "short");
        assert_eq!(truncate_tail(String::new(), 5), "");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        // 10 three-byte chars
        let text = "█".repeat(10);
        let truncated = truncate_tail(text, 8);
        assert_eq!(truncated, format!("...{}", "█".repeat(5)));
        assert_eq!(truncated.chars().count(), 8);
    }

    #[test]
    fn test_oversized_batch_is_truncated_on_drain() {
        let mut buffer = LogBuffer::new(50);
        for i in 0..20 {
            buffer.push(format!("line number {i}"));
        }
        let block = buffer.drain().unwrap();
        assert_eq!(block.chars().count(), 50);
        assert!(block.starts_with("..."));
        assert!(block.ends_with("line number 19"));
    }

    proptest! {
        #[test]
        fn prop_truncation_preserves_suffix(text in "\\PC{0,300}", max_len in 4usize..200) {
            let truncated = truncate_tail(text.clone(), max_len);
            let total = text.chars().count();

            if total <= max_len {
                prop_assert_eq!(truncated, text);
            } else {
                prop_assert_eq!(truncated.chars().count(), max_len);
                prop_assert!(truncated.starts_with(ELLIPSIS));
                let tail: String = text.chars().skip(total - (max_len - 3)).collect();
                prop_assert!(truncated.ends_with(&tail));
            }
        }
    }
}
