//! Status command implementation.

use super::{emit, OutputFormat};
use crate::settings::Settings;
use anyhow::Result;
use std::fmt::Write as _;
use tablesync_engine::HealthStatus;

/// Runs the status command.
///
/// The engine is built for this invocation, so its pending queues are empty.
pub fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
    let engine = settings.build_engine()?;
    let health = engine.health();
    emit(format, &health, || render(&health, settings))
}

fn availability(up: bool) -> &'static str {
    if up {
        "online"
    } else {
        "offline"
    }
}

/// Text rendering of a health probe.
pub fn render(health: &HealthStatus, settings: &Settings) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Store A: {} ({})",
        availability(health.db_a),
        settings.stores.a.path.display()
    );
    let _ = writeln!(
        out,
        "Store B: {} ({})",
        availability(health.db_b),
        settings.stores.b.path.display()
    );
    let _ = writeln!(out, "Pending to A: {}", health.pending_to_a);
    let _ = writeln!(out, "Pending to B: {}", health.pending_to_b);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn renders_both_stores() {
        let settings = Settings::from_toml(
            "[stores.a]\npath = \"a.db\"\n[stores.b]\npath = \"b.db\"\n",
            Path::new("/srv"),
        )
        .unwrap();
        let health = HealthStatus {
            db_a: true,
            db_b: false,
            pending_to_a: 0,
            pending_to_b: 3,
        };

        let text = render(&health, &settings);
        assert!(text.contains("Store A: online (/srv/a.db)"));
        assert!(text.contains("Store B: offline (/srv/b.db)"));
        assert!(text.contains("Pending to B: 3"));
    }
}
