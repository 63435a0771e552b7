// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of terminal progress-bar lines.
//!
//! Recognition is a heuristic, not a grammar: any line holding both `%` and
//! `|` is treated as a progress update. Bars drawn by tqdm-style libraries look
//! like this:
//!
//! ```text
//! Processing:  45%|████▌     | 45/100 [00:04<00:05, 10.00it/s]
//! └── field 0 ──────┘└ bar ──┘└── field 2 ───────────────────┘
//! ```
//!
//! Field 0 carries the description and percentage, field 2 starts with the
//! `current/total` counter, and the last field holds the elapsed/ETA text.

/// One parsed progress line, borrowing from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate<'a> {
    /// Raw text of the first `|`-separated field, percentage included.
    pub label: &'a str,
    pub current: u64,
    pub total: u64,
    /// Trimmed text of the last `|`-separated field.
    pub eta: &'a str,
}

impl ProgressUpdate<'_> {
    /// Words of the label with every digit-bearing token removed and any
    /// trailing `:` trimmed. Empty when the bar has no description.
    ///
    /// Only needed once per run, so it is built on demand.
    #[must_use]
    pub fn description(&self) -> String {
        let words = self
            .label
            .split_whitespace()
            .filter(|word| !word.chars().any(|c| c.is_ascii_digit()))
            .collect::<Vec<_>>()
            .join(" ");
        words.trim_end_matches(':').to_string()
    }
}

/// True when `text` has the shape of a progress update.
#[must_use]
pub fn looks_like_progress(text: &str) -> bool {
    text.contains('%') && text.contains('|')
}

/// Parses a progress line.
///
/// Returns `None` when the line does not look like progress, has fewer than
/// three fields, has a non-numeric counter, or reports a total of zero.
#[must_use]
pub fn parse(text: &str) -> Option<ProgressUpdate<'_>> {
    if !looks_like_progress(text) {
        return None;
    }

    let fields: Vec<&str> = text.split('|').collect();
    let counter = fields.get(2)?.split_whitespace().next()?;
    let (current, total) = counter.split_once('/')?;
    let current = current.parse::<u64>().ok()?;
    let total = total.parse::<u64>().ok()?;
    if total == 0 {
        return None;
    }

    let eta = fields.last().map_or("", |f| f.trim());

    Some(ProgressUpdate {
        label: fields[0],
        current,
        total,
        eta,
    })
}
