//! Periodic sync passes.
//!
//! The engine itself is synchronous. The scheduler drives it from a tokio
//! runtime, running each pass on the blocking pool so store I/O never
//! stalls the reactor.

use crate::engine::{SyncEngine, SyncPassReport};
use crate::error::{EngineError, EngineResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Interval between passes when none is configured.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Runs [`SyncEngine::synchronize_all`] on a fixed interval.
///
/// Passes never overlap: a pass that overruns its slot delays the next
/// tick instead of queueing a burst of catch-up passes.
#[derive(Debug, Clone)]
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
}

impl Scheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Settings`] if `interval` is zero.
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> EngineResult<Self> {
        if interval.is_zero() {
            return Err(EngineError::Settings(
                "sync interval must be greater than zero".into(),
            ));
        }
        Ok(Self { engine, interval })
    }

    /// Returns the interval between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the engine being driven.
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Runs a single pass on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Task`] if the pass panicked or was cancelled.
    pub async fn run_once(&self) -> EngineResult<SyncPassReport> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.synchronize_all())
            .await
            .map_err(|e| EngineError::Task(e.to_string()))
    }

    /// Runs passes until `shutdown` resolves and returns how many passes
    /// completed.
    ///
    /// The first pass starts immediately. A pass in progress when shutdown
    /// fires is allowed to finish.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = self.interval.as_millis() as u64, "scheduler started");
        let mut passes = 0;
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => {
                            passes += 1;
                            debug!(
                                pass = passes,
                                tables = report.tables.len(),
                                failed = report.failed_tables.len(),
                                "scheduled pass finished"
                            );
                        }
                        Err(e) => error!(error = %e, "scheduled pass aborted"),
                    }
                }
            }
        }
        info!(passes, "scheduler stopped");
        passes
    }
}
