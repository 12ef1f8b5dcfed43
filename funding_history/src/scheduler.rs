//! Periodic driver for the rollup manager.
//!
//! One refresh task and one retention task per resolution, each with its own
//! timer. A tick opens its own connection on the blocking pool, so a slow or
//! failing resolution never holds up another. Missed ticks are skipped; a
//! failed tick is logged and left for the next one to repair.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    db::connection::connect_sqlite,
    resolution::Resolution,
    rollup::{RollupManager, policy::ResolutionPolicy},
};

/// What a task does on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// `run_refresh_tick`.
    Refresh,
    /// `run_retention_sweep`.
    Retention,
}

/// Inputs to [`spawn`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Where each tick connects.
    pub database_url: String,
    /// Policies whose refresh cadence drives the refresh tasks.
    pub policies: Vec<ResolutionPolicy>,
    /// Cadence of every retention task.
    pub retention_sweep_interval: Duration,
}

/// Running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Number of running tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every task after its current tick and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for t in self.tasks {
            if let Err(e) = t.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}

/// Start the tasks on the current tokio runtime.
pub fn spawn(manager: Arc<RollupManager>, cfg: SchedulerConfig) -> anyhow::Result<SchedulerHandle> {
    let (tx, rx) = watch::channel(false);
    let sweep_every = cfg.retention_sweep_interval.to_std()?;
    let mut tasks = Vec::with_capacity(cfg.policies.len() * 2);

    for p in &cfg.policies {
        let refresh_every = p.refresh.schedule_interval.to_std()?;
        for (job, every) in [(Job::Refresh, refresh_every), (Job::Retention, sweep_every)] {
            tasks.push(tokio::spawn(run_job(
                Arc::clone(&manager),
                cfg.database_url.clone(),
                p.resolution,
                job,
                every,
                rx.clone(),
            )));
        }
    }
    info!(tasks = tasks.len(), "scheduler started");
    Ok(SchedulerHandle { shutdown: tx, tasks })
}

async fn run_job(
    manager: Arc<RollupManager>,
    database_url: String,
    res: Resolution,
    job: Job,
    every: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let manager = Arc::clone(&manager);
                let url = database_url.clone();
                let outcome = tokio::task::spawn_blocking(move || run_once(&manager, &url, res, job)).await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(resolution = %res, ?job, error = %format!("{e:#}"), "tick failed; next tick retries"),
                    Err(e) => warn!(resolution = %res, ?job, error = %e, "tick panicked; next tick retries"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!(resolution = %res, ?job, "scheduler task exiting");
}

/// One tick of one job, run synchronously.
pub fn run_once(manager: &RollupManager, database_url: &str, res: Resolution, job: Job) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(database_url)?;
    let now = Utc::now();
    match job {
        Job::Refresh => {
            let report = manager.run_refresh_tick(&mut conn, res, now)?;
            debug!(resolution = %res, written = report.backfill.buckets_written, "refresh tick");
        }
        Job::Retention => {
            let report = manager.run_retention_sweep(&mut conn, res, now)?;
            debug!(resolution = %res, deleted = report.deleted, "retention sweep");
        }
    }
    Ok(())
}
