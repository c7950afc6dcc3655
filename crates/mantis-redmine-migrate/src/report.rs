//! Per-run migration report: what each stage created, reused, and imported.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters for one row family. Keys are entity kind names plus the nested
/// content families (`journal`, `time_entry`, `attachment`, `custom_value`,
/// `membership`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTally {
    /// Records created in the target.
    pub created: u64,

    /// Records mapped onto an existing target record.
    pub reused: u64,

    /// Nested content rows carried along (notes, history, attachments, ...).
    pub imported: u64,
}

/// Collects tallies and warnings while a run executes.
#[derive(Debug)]
pub struct ReportAccumulator {
    run_id: String,
    preview: bool,
    started_at: DateTime<Utc>,
    tallies: BTreeMap<String, StageTally>,
    warnings: Vec<String>,
}

impl ReportAccumulator {
    pub fn new(preview: bool) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            preview,
            started_at: Utc::now(),
            tallies: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn tally_mut(&mut self, name: &str) -> &mut StageTally {
        self.tallies.entry(name.to_string()).or_default()
    }

    /// Count one created target record.
    pub fn created(&mut self, name: &str) {
        self.tally_mut(name).created += 1;
    }

    /// Count one mapping onto an existing target record.
    pub fn reused(&mut self, name: &str) {
        self.tally_mut(name).reused += 1;
    }

    /// Count a whole table of mappings onto existing target records.
    pub fn reused_many(&mut self, name: &str, count: u64) {
        self.tally_mut(name).reused += count;
    }

    /// Count nested content rows imported under a record.
    pub fn imported(&mut self, name: &str, rows: u64) {
        self.tally_mut(name).imported += rows;
    }

    /// Record a warning. Warnings are logged as they happen and repeated in
    /// the final report.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Freeze the accumulator into a report.
    pub fn finish(self, status: &str) -> MigrationReport {
        let completed_at = Utc::now();
        MigrationReport {
            run_id: self.run_id,
            mode: if self.preview { "preview" } else { "live" }.to_string(),
            status: status.to_string(),
            started_at: self.started_at,
            completed_at,
            duration_seconds: (completed_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            tallies: self.tallies,
            warnings: self.warnings,
        }
    }
}

/// Final report of one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// "preview" or "live".
    pub mode: String,

    /// Final status.
    pub status: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-kind counters, keyed by kind name.
    pub tallies: BTreeMap<String, StageTally>,

    /// Warnings raised during the run, in order.
    pub warnings: Vec<String>,
}

impl MigrationReport {
    /// Tally for one row family, zero when the stage never ran.
    pub fn tally(&self, name: &str) -> StageTally {
        self.tallies.get(name).copied().unwrap_or_default()
    }

    pub fn total_created(&self) -> u64 {
        self.tallies.values().map(|t| t.created).sum()
    }

    pub fn total_reused(&self) -> u64 {
        self.tallies.values().map(|t| t.reused).sum()
    }

    pub fn total_imported(&self) -> u64 {
        self.tallies.values().map(|t| t.imported).sum()
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text summary for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Run {} ({}) {} in {:.1}s\n",
            self.run_id, self.mode, self.status, self.duration_seconds
        ));
        out.push_str(&format!(
            "{:<20} {:>8} {:>8} {:>8}\n",
            "kind", "created", "reused", "imported"
        ));
        for (kind, tally) in &self.tallies {
            out.push_str(&format!(
                "{:<20} {:>8} {:>8} {:>8}\n",
                kind, tally.created, tally.reused, tally.imported
            ));
        }
        out.push_str(&format!(
            "{:<20} {:>8} {:>8} {:>8}\n",
            "total",
            self.total_created(),
            self.total_reused(),
            self.total_imported()
        ));
        if !self.warnings.is_empty() {
            out.push_str(&format!("\n{} warning(s):\n", self.warnings.len()));
            for warning in &self.warnings {
                out.push_str(&format!("  - {warning}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tallies_accumulate_per_name() {
        let mut acc = ReportAccumulator::new(false);
        acc.created("project");
        acc.created("project");
        acc.reused("user");
        acc.imported("journal", 5);
        acc.imported("journal", 2);

        let report = acc.finish("completed");
        assert_eq!(report.mode, "live");
        assert_eq!(report.tally("project").created, 2);
        assert_eq!(report.tally("user").reused, 1);
        assert_eq!(report.tally("journal").imported, 7);
        assert_eq!(report.tally("version"), StageTally::default());
        assert_eq!(report.total_created(), 2);
        assert_eq!(report.total_imported(), 7);
    }

    #[test]
    fn test_warnings_survive_into_report() {
        let mut acc = ReportAccumulator::new(true);
        acc.warn("relation 3 skipped");
        let report = acc.finish("completed");
        assert_eq!(report.mode, "preview");
        assert_eq!(report.warnings, vec!["relation 3 skipped".to_string()]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut acc = ReportAccumulator::new(false);
        acc.created("status");
        let report = acc.finish("completed");
        let json = report.to_json().unwrap();
        let parsed: MigrationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.tally("status").created, 1);
    }

    #[test]
    fn test_render_text_lists_kinds_and_warnings() {
        let mut acc = ReportAccumulator::new(false);
        acc.created("issue");
        acc.warn("something odd");
        let text = acc.finish("completed").render_text();
        assert!(text.contains("issue"));
        assert!(text.contains("1 warning(s)"));
        assert!(text.contains("something odd"));
    }
}
