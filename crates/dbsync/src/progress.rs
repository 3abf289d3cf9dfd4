//! 📊 progress.rs: "Are we there yet?" Every sync job, every time, forever.
//!
//! A spinner while the bucket is being walked, and a table at the end that
//! says what happened. Abandoned and failed batches show up here, not only
//! in the logs.
//!
//! ⚠️ Watching the spinner will not make it go faster. We've tried.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use indicatif::{ProgressBar, ProgressStyle};

use crate::bulk_writer::WriteOutcome;

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Seconds with two decimals. Lambda logs don't need HH:MM:SS.
fn format_elapsed(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

/// 📬 Tallies for one sink worker's batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub batches_written: usize,
    pub rows_written: usize,
    pub batches_abandoned: usize,
    pub batches_failed: usize,
    pub rows_unwritten: usize,
}

impl WriteStats {
    pub fn record(&mut self, outcome: &WriteOutcome, rows: usize) {
        match outcome {
            WriteOutcome::Written { .. } => {
                self.batches_written += 1;
                self.rows_written += rows;
            }
            WriteOutcome::Abandoned { unwritten, .. } => {
                self.batches_abandoned += 1;
                self.rows_written += rows.saturating_sub(*unwritten);
                self.rows_unwritten += unwritten;
            }
            WriteOutcome::Failed { .. } => {
                self.batches_failed += 1;
                self.rows_unwritten += rows;
            }
        }
    }

    pub fn merge(&mut self, other: WriteStats) {
        self.batches_written += other.batches_written;
        self.rows_written += other.rows_written;
        self.batches_abandoned += other.batches_abandoned;
        self.batches_failed += other.batches_failed;
        self.rows_unwritten += other.rows_unwritten;
    }
}

/// 🧾 What one run did, start to finish.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    pub run_id: String,
    pub keys_listed: usize,
    pub keys_skipped: usize,
    pub fetch_failures: usize,
    pub pages: usize,
    pub sections: usize,
    /// 🗂️ Sections classified but not written because `write_sections` is off.
    pub sections_skipped: usize,
    pub writes: WriteStats,
    pub rows_swept: usize,
    pub elapsed: Duration,
}

impl SyncSummary {
    /// ✅ Nothing abandoned, nothing failed, nothing unreadable.
    pub fn is_clean(&self) -> bool {
        self.fetch_failures == 0
            && self.writes.batches_abandoned == 0
            && self.writes.batches_failed == 0
    }

    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["dbsync", "count"]);

        let rows = [
            ("keys listed", self.keys_listed),
            ("keys skipped", self.keys_skipped),
            ("fetch failures", self.fetch_failures),
            ("pages", self.pages),
            ("sections", self.sections),
            ("sections not written", self.sections_skipped),
            ("batches written", self.writes.batches_written),
            ("rows written", self.writes.rows_written),
            ("batches abandoned", self.writes.batches_abandoned),
            ("batches failed", self.writes.batches_failed),
            ("rows not written", self.writes.rows_unwritten),
            ("orphans swept", self.rows_swept),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(format_number(value)).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new("elapsed"),
            Cell::new(format_elapsed(self.elapsed)).set_alignment(CellAlignment::Right),
        ]);
        table.to_string()
    }
}

/// 🌀 Spinner for the enumeration phase. Invisible when nobody is watching a terminal.
pub(crate) struct SyncProgress {
    spinner: ProgressBar,
}

impl std::fmt::Debug for SyncProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProgress").finish_non_exhaustive()
    }
}

impl SyncProgress {
    pub(crate) fn new(bucket_label: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message(format!("listing {bucket_label}"));
        Self { spinner }
    }

    pub(crate) fn update(&self, summary: &SyncSummary) {
        self.spinner.set_message(format!(
            "{} keys listed, {} pages, {} sections",
            format_number(summary.keys_listed),
            format_number(summary.pages),
            format_number(summary.sections)
        ));
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}
