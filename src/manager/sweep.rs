/*!
 * Maintenance Sweep
 * Background task that trims the idle engine pool and reaps stuck jobs
 */

use super::ManagerInner;
use crate::core::limits::STUCK_JOB_TIMEOUT_MULTIPLIER;
use crate::events::JobEvent;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Control messages for the sweep task
#[derive(Debug, Clone)]
enum SweepCommand {
    /// Run a sweep immediately
    Trigger,
    /// Stop the sweep loop
    Shutdown,
}

/// Handle to the sweep background task
pub(super) struct SweepTask {
    command_tx: mpsc::UnboundedSender<SweepCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SweepTask {
    pub(super) fn spawn(inner: Arc<ManagerInner>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_sweep_loop(inner, command_rx));
        Self {
            command_tx,
            handle: Some(handle),
        }
    }

    /// Request an immediate sweep
    pub(super) fn trigger(&self) {
        let _ = self.command_tx.send(SweepCommand::Trigger);
    }

    /// Stop the sweep loop and wait for it to exit
    pub(super) async fn shutdown(mut self) {
        let _ = self.command_tx.send(SweepCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Sweep task shutdown error: {}", e);
            }
        }
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        // Best-effort stop if the handle was never awaited
        if self.handle.is_some() {
            let _ = self.command_tx.send(SweepCommand::Shutdown);
        }
    }
}

async fn run_sweep_loop(
    inner: Arc<ManagerInner>,
    mut command_rx: mpsc::UnboundedReceiver<SweepCommand>,
) {
    let mut interval = tokio::time::interval(inner.config.idle_sweep_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; consume it so the first real
    // sweep happens one full interval after startup
    interval.tick().await;

    info!(
        "Maintenance sweep started ({}ms interval)",
        inner.config.idle_sweep_interval_ms
    );

    loop {
        tokio::select! {
            _ = interval.tick() => run_sweep(&inner).await,
            Some(command) = command_rx.recv() => match command {
                SweepCommand::Trigger => run_sweep(&inner).await,
                SweepCommand::Shutdown => break,
            },
        }
    }

    info!("Maintenance sweep stopped");
}

async fn run_sweep(inner: &Arc<ManagerInner>) {
    let stats = inner.pool.sweep_idle(inner.config.idle_keep_target()).await;
    if stats.failed > 0 {
        inner.events.emit(JobEvent::SweepError {
            error: format!("{} engine(s) failed to close cleanly", stats.failed),
        });
    }

    let stuck_after = inner.config.job_timeout() * STUCK_JOB_TIMEOUT_MULTIPLIER;
    let reaped = inner.tracker.reap_stuck(stuck_after);
    let jobs_reaped = reaped.len();
    for job in &reaped {
        warn!(
            "Force-cleaned stuck job {} (started {:?} ago)",
            job.id,
            job.started_at.elapsed()
        );
        inner.events.emit(JobEvent::TimedOut {
            job_id: job.id,
            gauges: inner.gauges(),
        });
        inner.events.emit(JobEvent::Cleaned {
            job_id: job.id,
            gauges: inner.gauges(),
        });
    }
    if jobs_reaped > 0 {
        Arc::clone(inner).drain_queue();
    }

    inner.events.emit(JobEvent::SweepCompleted {
        engines_closed: stats.closed,
        jobs_reaped,
        gauges: inner.gauges(),
    });
}
