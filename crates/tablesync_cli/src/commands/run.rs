//! Run command implementation.

use super::{sync, OutputFormat};
use crate::settings::Settings;
use anyhow::{Context, Result};
use tablesync_engine::Scheduler;
use tracing::{info, warn};

/// Runs the run command.
///
/// Loops until Ctrl-C unless `once` is set or the scheduler is disabled,
/// in which case a single pass is run.
pub fn run(settings: &Settings, once: bool) -> Result<()> {
    let engine = settings.build_engine()?;

    if once || !settings.scheduler.enabled {
        let report = engine.synchronize_all();
        return super::emit(OutputFormat::Text, &report, || sync::render(&report));
    }

    let scheduler = Scheduler::new(engine, settings.scheduler.interval())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let passes = runtime.block_on(scheduler.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }));
    info!(passes, "shutting down");
    Ok(())
}
