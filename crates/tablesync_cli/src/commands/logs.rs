//! Logs command implementation.

use super::{emit, OutputFormat};
use crate::settings::Settings;
use anyhow::Result;
use std::fmt::Write as _;
use tablesync_protocol::SyncLogEntry;
use tracing::warn;

/// Runs the logs command.
pub fn run(settings: &Settings, limit: usize, format: OutputFormat) -> Result<()> {
    if !settings.log.persist {
        warn!("log.persist is off, only entries from this process are available");
    }
    let engine = settings.build_engine()?;
    let entries = engine.recent_logs(limit);
    emit(format, &entries, || render(&entries))
}

/// Text rendering, one line per entry.
pub fn render(entries: &[SyncLogEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        out.push_str("No log entries\n");
        return out;
    }
    for entry in entries {
        let _ = writeln!(
            out,
            "{:>6} {} {:<7} {:<6} {}->{} {}: {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.status,
            entry.operation,
            entry.source,
            entry.target,
            entry.table,
            entry.message
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_protocol::{LogOperation, LogStatus, StoreId};
    use tablesync_testkit::fixed_time;

    #[test]
    fn renders_one_line_per_entry() {
        let entries = vec![SyncLogEntry {
            id: 7,
            source: StoreId::A,
            target: StoreId::B,
            table: "person".into(),
            operation: LogOperation::Insert,
            status: LogStatus::Success,
            created_at: fixed_time(),
            message: "Row synchronized for key 1".into(),
        }];

        let text = render(&entries);
        assert_eq!(
            text,
            "     7 2024-06-01 12:00:00 SUCCESS INSERT dbA->dbB person: Row synchronized for key 1\n"
        );
        assert_eq!(render(&[]), "No log entries\n");
    }
}
