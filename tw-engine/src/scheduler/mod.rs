//! Polling schedulers
//!
//! Two background triggers share one lifecycle:
//!
//! - [`RegistrationScheduler`]: pushes a qualified participant into tier
//!   registration, at most once per cooldown per tier
//! - [`DistributionScheduler`]: calls the tier-wide royalty distribution once
//!   the ledger's distribution time has passed
//!
//! Each exposes a deterministic `tick(now)` for tests and a `start(period)`
//! that spawns a repeating task driven by `tokio::select!` over a shutdown
//! channel and an interval. Failures inside a tick are logged and dropped.

pub mod distribution;
pub mod registration;

pub use distribution::{DistributionReport, DistributionScheduler, DistributionTargets};
pub use registration::{RegistrationReport, RegistrationScheduler};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest period a scheduler runs at
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Work run on every scheduler tick
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Run one tick against the wall clock
    async fn run_tick(&self);
}

/// Spawn `task` on a repeating interval
///
/// The first tick fires immediately. Ticks are skipped, not queued, when one
/// overruns the period. A period below [`MIN_PERIOD`] is raised to it.
pub fn start<T: ScheduledTask>(task: Arc<T>, period: Duration) -> SchedulerHandle {
    let name = task.name();
    let period = if period < MIN_PERIOD {
        warn!(scheduler = name, period_ms = period.as_millis() as u64, "Scheduler period too short, using the minimum");
        MIN_PERIOD
    } else {
        period
    };
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let running = Arc::new(RwLock::new(true));
    let running_clone = running.clone();

    let join = tokio::spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(scheduler = name, period_secs = period.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(scheduler = name, "Scheduler received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    if *running_clone.read().await {
                        task.run_tick().await;
                    } else {
                        debug!(scheduler = name, "Scheduler paused, tick skipped");
                    }
                }
            }
        }

        info!(scheduler = name, "Scheduler stopped");
    });

    SchedulerHandle {
        shutdown_tx,
        running,
        join: Some(join),
    }
}

/// Controls a started scheduler
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for an in-flight tick to finish
    pub async fn stop(mut self) {
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(()).await;
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }

    pub async fn pause(&self) {
        *self.running.write().await = false;
    }

    pub async fn resume(&self) {
        *self.running.write().await = true;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Current unix time in milliseconds
pub(crate) fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Current unix time in seconds
pub(crate) fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
