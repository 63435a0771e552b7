// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::parser::ProgressUpdate;

/// Width of the rendered bar in characters.
pub const BAR_WIDTH: u64 = 20;

/// A progress checkpoint worth announcing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub description: String,
    pub percentage: u64,
    pub total: u64,
    pub eta: String,
}

impl Announcement {
    /// Count shown next to the bar. Derived from the percentage rather than the
    /// raw counter so the number always agrees with the bar.
    #[must_use]
    pub fn displayed_count(&self) -> u64 {
        self.percentage * self.total / 100
    }

    /// Renders `"{description}: [{bar}] [{count}/{total} | {eta}]"`.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}: [{}] [{}/{} | {}]",
            self.description,
            render_bar(self.percentage),
            self.displayed_count(),
            self.total,
            self.eta
        )
    }
}

/// Renders a [`BAR_WIDTH`] wide bar of `=` for the completed part and `-` for
/// the rest.
#[must_use]
pub fn render_bar(percentage: u64) -> String {
    let filled = (BAR_WIDTH * percentage.min(100) / 100) as usize;
    let empty = BAR_WIDTH as usize - filled;
    format!("{}{}", "=".repeat(filled), "-".repeat(empty))
}

/// Tracking state for one progress run.
///
/// The first update fixes the total and the description, and announces 0%
/// regardless of the counter it carries. Later updates announce only when the
/// percentage lands on a new checkpoint.
#[derive(Debug, Clone)]
pub struct ProgressSession {
    default_description: String,
    step: u64,
    description: Option<String>,
    total: Option<u64>,
    current: u64,
    last_percentage: Option<u64>,
}

impl ProgressSession {
    /// `intervals` must evenly divide 100; out-of-range values are clamped to
    /// `1..=100`.
    #[must_use]
    pub fn new(default_description: &str, intervals: u32) -> Self {
        let intervals = u64::from(intervals.clamp(1, 100));
        Self {
            default_description: default_description.to_string(),
            step: 100 / intervals,
            description: None,
            total: None,
            current: 0,
            last_percentage: None,
        }
    }

    /// Feeds one parsed update and returns the checkpoint to announce, if any.
    pub fn observe(&mut self, update: &ProgressUpdate<'_>) -> Option<Announcement> {
        if self.description.is_none() {
            let description = update.description();
            self.description = Some(if description.is_empty() {
                self.default_description.clone()
            } else {
                description
            });
        }

        let Some(total) = self.total else {
            self.total = Some(update.total);
            self.last_percentage = Some(0);
            return Some(self.announcement(0, update.total, update.eta));
        };

        self.current = update.current;
        let percentage = self.current.checked_mul(100)? / total;

        if percentage > 100 || percentage % self.step != 0 {
            return None;
        }
        if self.last_percentage == Some(percentage) {
            return None;
        }

        self.last_percentage = Some(percentage);
        Some(self.announcement(percentage, total, update.eta))
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        self.total.is_some()
    }

    /// True once the 100% checkpoint has been announced.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.last_percentage == Some(100)
    }

    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    #[must_use]
    pub fn last_percentage(&self) -> Option<u64> {
        self.last_percentage
    }

    /// Forgets the total, description and last checkpoint so the next update
    /// starts a new run.
    pub fn reset(&mut self) {
        self.description = None;
        self.total = None;
        self.current = 0;
        self.last_percentage = None;
    }

    fn announcement(&self, percentage: u64, total: u64, eta: &str) -> Announcement {
        Announcement {
            description: self
                .description
                .clone()
                .unwrap_or_else(|| self.default_description.clone()),
            percentage,
            total,
            eta: eta.to_string(),
        }
    }
}
