//! # Scheduler
//!
//! One tokio task per entity and per report, each on its own interval.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  task "customers"   ●────────●────────●────────●      (every hour)     │
//! │  task "projects"    ●────────●────────●────────●                       │
//! │  task "balance"     ●────────●────────●────────●                       │
//! │                     ▲                                                   │
//! │                     first tick at startup when run_on_startup          │
//! │                                                                         │
//! │  A task awaits each cycle before waiting for its next tick, so one     │
//! │  entity never has two cycles in flight. A failed cycle is logged and   │
//! │  the next tick retries. Ctrl-C stops every task after its in-flight    │
//! │  cycle.                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::commands::Worker;
use tally_sync::ReportOutcome;

/// Runs every entity and report until Ctrl-C.
pub async fn run(worker: Worker) -> anyhow::Result<()> {
    let period = worker.config().sync.schedule_interval();
    let run_on_startup = worker.config().sync.run_on_startup;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    for entity in &worker.config().entities {
        let engine = Arc::new(worker.engine(&entity.name)?);
        let name = entity.name.clone();

        handles.push(tokio::spawn(schedule(
            period,
            run_on_startup,
            shutdown_rx.clone(),
            move || {
                let engine = engine.clone();
                let name = name.clone();
                async move {
                    match engine.sync().await {
                        Ok(outcome) => info!(entity = %name, ?outcome, "Scheduled cycle done"),
                        Err(e) => error!(
                            entity = %name,
                            error = %e,
                            retryable = e.is_retryable(),
                            "Scheduled cycle failed"
                        ),
                    }
                }
            },
        )));
    }

    let exporter = worker.report_exporter();
    for report in worker.config().reports.iter().cloned() {
        let exporter = exporter.clone();

        handles.push(tokio::spawn(schedule(
            period,
            run_on_startup,
            shutdown_rx.clone(),
            move || {
                let exporter = exporter.clone();
                let report = report.clone();
                async move {
                    match exporter.export(&report).await {
                        Ok(ReportOutcome::Written { blob }) => {
                            info!(report = %report.name, blob = %blob, "Report exported")
                        }
                        Ok(ReportOutcome::Skipped { status }) => {
                            info!(report = %report.name, status, "Report skipped")
                        }
                        Err(e) => error!(report = %report.name, error = %e, "Report export failed"),
                    }
                }
            },
        )));
    }

    info!(
        tasks = handles.len(),
        interval_secs = period.as_secs(),
        run_on_startup,
        "Scheduler started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown_tx.send(true)?;

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Scheduled task panicked");
        }
    }

    worker.close().await;
    info!("Scheduler stopped");
    Ok(())
}

/// Calls `job` every `period` until `shutdown` flips.
///
/// The first call happens immediately when `run_on_startup`, otherwise after
/// one period. Ticks missed while a job runs are delayed, not burst.
async fn schedule<F, Fut>(
    period: Duration,
    run_on_startup: bool,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let start = if run_on_startup {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => job().await,
        }
    }
}
