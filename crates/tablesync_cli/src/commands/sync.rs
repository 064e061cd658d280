//! Sync command implementation.

use super::{emit, OutputFormat};
use crate::settings::Settings;
use anyhow::{bail, Result};
use std::fmt::Write as _;
use tablesync_engine::SyncPassReport;

/// Runs the sync command. A `full` pass ignores the watermarks of every
/// active table.
///
/// Fails after printing the report if any table failed.
pub fn run(settings: &Settings, tables: &[String], full: bool, format: OutputFormat) -> Result<()> {
    let engine = settings.build_engine()?;
    let report = if full {
        engine.synchronize_all_full()
    } else {
        engine.synchronize_tables(tables)
    };
    emit(format, &report, || render(&report))?;

    if !report.failed_tables.is_empty() {
        bail!("{} table(s) failed to synchronize", report.failed_tables.len());
    }
    Ok(())
}

/// Text rendering of a pass report.
pub fn render(report: &SyncPassReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Synchronized {} table(s) in {} ms",
        report.tables.len(),
        report.duration_ms
    );

    let replayed = &report.replayed;
    if replayed.applied + replayed.retried + replayed.failed + replayed.deferred > 0 {
        let _ = writeln!(
            out,
            "Replayed: {} applied, {} retried, {} failed, {} deferred",
            replayed.applied, replayed.retried, replayed.failed, replayed.deferred
        );
    }

    for table in &report.tables {
        let _ = writeln!(
            out,
            "  {}: {} keys inspected, {} queued, {} applied, {} failed{}",
            table.table,
            table.keys_inspected,
            table.queued,
            table.applied,
            table.failed,
            if table.complete { "" } else { " (partial)" }
        );
    }

    if !report.failed_tables.is_empty() {
        let _ = writeln!(out, "Failed tables: {}", report.failed_tables.join(", "));
    }
    out
}
