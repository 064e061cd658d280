//! tablesync CLI
//!
//! Keeps configured tables of two SQLite databases in sync.
//!
//! # Commands
//!
//! - `run` - Run sync passes on an interval until interrupted
//! - `sync` - Run one sync pass over all or some tables
//! - `status` - Probe both stores
//! - `logs` - Show recent audit entries
//! - `tables` - List configured tables

mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::OutputFormat;
use settings::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Bidirectional table sync between two databases.
#[derive(Parser)]
#[command(name = "tablesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(global = true, short, long, default_value = "tablesync.toml")]
    settings: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run sync passes on the configured interval until interrupted
    Run {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Run one sync pass
    Sync {
        /// Tables to synchronize (all active tables if omitted)
        tables: Vec<String>,

        /// Compare whole tables, ignoring watermarks
        #[arg(long, conflicts_with = "tables")]
        full: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Probe both stores and show this process's pending operations
    ///
    /// Each invocation starts a fresh engine with empty queues, so the
    /// pending counts are always 0 here. Queues only build up inside a
    /// long-lived `run` process.
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show recent audit entries, newest first
    ///
    /// Entries from earlier invocations are only available when the
    /// settings enable `[log] persist = true`; otherwise the list is empty.
    Logs {
        /// Maximum number of entries (1-500)
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List configured tables
    Tables {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { once } => {
            let settings = Settings::load(&cli.settings)?;
            commands::run::run(&settings, once)?;
        }
        Commands::Sync {
            tables,
            full,
            format,
        } => {
            let settings = Settings::load(&cli.settings)?;
            commands::sync::run(&settings, &tables, full, format)?;
        }
        Commands::Status { format } => {
            let settings = Settings::load(&cli.settings)?;
            commands::status::run(&settings, format)?;
        }
        Commands::Logs { limit, format } => {
            let settings = Settings::load(&cli.settings)?;
            commands::logs::run(&settings, limit, format)?;
        }
        Commands::Tables { format } => {
            let settings = Settings::load(&cli.settings)?;
            commands::tables::run(&settings, format)?;
        }
        Commands::Version => {
            println!("tablesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn status_and_logs_explain_fresh_process_state() {
        let cli = Cli::command();
        let status = cli.find_subcommand("status").unwrap();
        let long = status.get_long_about().unwrap().to_string();
        assert!(long.contains("fresh engine"));
        assert!(long.contains("always 0"));

        let logs = cli.find_subcommand("logs").unwrap();
        let long = logs.get_long_about().unwrap().to_string();
        assert!(long.contains("persist = true"));
    }

    #[test]
    fn full_sync_cannot_name_tables() {
        let cli = Cli::try_parse_from(["tablesync", "sync", "--full"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync { full: true, .. }));
        assert!(Cli::try_parse_from(["tablesync", "sync", "--full", "person"]).is_err());
    }
}
