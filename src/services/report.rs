use crate::domain::constants::{NOTE_LIMIT, PROFILE_ID};
use crate::domain::models::{
    CheckOutcome, ConformanceReport, OutcomeKind, ReportSummary, ReportTarget,
};
use crate::services::registry::Registry;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Single-writer collector. Workers call [`record`](Self::record) in
/// completion order; [`finalize`](Self::finalize) restores declaration order.
pub struct ReportAggregator<'r> {
    registry: &'r Registry,
    results: Mutex<Vec<CheckOutcome>>,
}

impl<'r> ReportAggregator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            results: Mutex::new(Vec::with_capacity(registry.len())),
        }
    }

    pub fn record(&self, mut outcome: CheckOutcome) {
        outcome.notes = outcome.notes.map(|n| truncate_note(&n));
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    pub fn len(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finalize(self, target: ReportTarget) -> ConformanceReport {
        let mut results = self
            .results
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let registry = self.registry;
        results.sort_by(|a, b| {
            registry
                .position(&a.check_id)
                .cmp(&registry.position(&b.check_id))
                .then_with(|| a.check_id.cmp(&b.check_id))
        });
        ConformanceReport {
            profile: PROFILE_ID.to_string(),
            generated_at: utc_now_iso(),
            target,
            summary: summarize(&results),
            results,
        }
    }
}

pub fn summarize(results: &[CheckOutcome]) -> ReportSummary {
    let mut summary = ReportSummary {
        total: results.len(),
        ..ReportSummary::default()
    };
    for r in results {
        match r.outcome {
            OutcomeKind::Pass => summary.passed += 1,
            OutcomeKind::Fail => summary.failed += 1,
            OutcomeKind::Skip => summary.skipped += 1,
            OutcomeKind::NotApplicable => summary.not_applicable += 1,
            OutcomeKind::Error => summary.error += 1,
            OutcomeKind::Xfail => summary.xfailed += 1,
        }
    }
    summary.exit_status = i32::from(results.iter().any(|r| r.outcome.is_blocking()));
    summary
}

/// Caps a note at [`NOTE_LIMIT`] characters, cutting on a char boundary.
pub fn truncate_note(note: &str) -> String {
    if note.chars().count() <= NOTE_LIMIT {
        return note.to_string();
    }
    let mut out: String = note.chars().take(NOTE_LIMIT - 3).collect();
    out.push_str("...");
    out
}

pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Writes the report as pretty JSON via a temp file in the destination
/// directory and a rename. No path means no file.
pub fn write_report(
    report: &ConformanceReport,
    path: Option<&Path>,
) -> anyhow::Result<Option<PathBuf>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create report directory {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("create temp report in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, report)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("persist report to {}", path.display()))?;
    Ok(Some(path.to_path_buf()))
}
