//! Tables command implementation.

use super::{emit, OutputFormat};
use crate::settings::Settings;
use anyhow::Result;
use std::fmt::Write as _;
use tablesync_protocol::TableSyncConfig;

/// Runs the tables command. Does not touch the stores.
pub fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
    emit(format, &settings.tables, || render(&settings.tables))
}

/// Text rendering, one line per table.
pub fn render(tables: &[TableSyncConfig]) -> String {
    let mut out = String::new();
    if tables.is_empty() {
        out.push_str("No tables configured\n");
        return out;
    }
    for table in tables {
        let columns = if table.includes_all_columns() {
            "*".to_string()
        } else {
            table.include_columns.join(", ")
        };
        let _ = writeln!(
            out,
            "{}{} key={} columns=[{}] tracking={}",
            table.table_name,
            if table.active { "" } else { " (inactive)" },
            table.primary_key,
            columns,
            table.tracking_column().as_deref().unwrap_or("-"),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_testkit::person_config;

    #[test]
    fn renders_each_table() {
        let tables = vec![
            person_config(),
            TableSyncConfig::new("audit", "id").with_active(false),
        ];
        let text = render(&tables);
        assert_eq!(
            text,
            "person key=id columns=[name, email, last_update] tracking=last_update\n\
             audit (inactive) key=id columns=[*] tracking=-\n"
        );
        assert_eq!(render(&[]), "No tables configured\n");
    }
}
