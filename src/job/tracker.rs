/*!
 * Job Lifecycle Tracker
 * Active-job accounting: admission bookkeeping, timeout ownership, and the
 * stuck-job safety net
 */

use super::types::{ManagerConfig, RenderJob};
use crate::core::types::{JobId, Size};
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::AbortHandle;

struct ActiveJob {
    job: RenderJob,
    /// Owned exclusively here; cleared exactly once on deregistration
    timeout: Option<AbortHandle>,
}

struct TrackerState {
    active: HashMap<JobId, ActiveJob>,
    memory_total: Size,
}

/// Tracks every admitted job from registration to its terminal transition.
/// All three terminal outcomes (completed, failed, timed out) converge on
/// the same deregistration path; a deregistered id is never revived.
pub struct LifecycleTracker {
    state: Mutex<TrackerState>,
    active_count: watch::Sender<usize>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        let (active_count, _) = watch::channel(0);
        Self {
            state: Mutex::new(TrackerState {
                active: HashMap::new(),
                memory_total: 0,
            }),
            active_count,
        }
    }

    /// Atomic admission test plus registration. The budget check runs before
    /// the new job's cost joins the total, so the recorded total may end up
    /// above the nominal budget once added; that slack is part of the
    /// contract, not a hard cap.
    pub fn try_admit(&self, job: RenderJob, config: &ManagerConfig) -> bool {
        let mut state = self.state.lock();
        let admitted = state.active.len() < config.max_concurrent_jobs
            && state.memory_total + job.estimated_cost < config.max_memory_budget_bytes;
        if admitted {
            state.memory_total += job.estimated_cost;
            state.active.insert(job.id, ActiveJob { job, timeout: None });
            self.active_count.send_replace(state.active.len());
        }
        admitted
    }

    /// Store the timeout abort handle for a registered job. If the job
    /// already finished, the timer is cancelled on the spot.
    pub fn arm_timeout(&self, job_id: JobId, handle: AbortHandle) {
        let mut state = self.state.lock();
        match state.active.get_mut(&job_id) {
            Some(active) => active.timeout = Some(handle),
            None => handle.abort(),
        }
    }

    /// Remove a job from the active set, cancel its timer, and subtract its
    /// cost from the running total (floored at zero). Idempotent: a second
    /// call for the same id is a no-op and never double-subtracts.
    /// Returns the job record when this call performed the removal.
    pub fn deregister(&self, job_id: JobId) -> Option<RenderJob> {
        let mut state = self.state.lock();
        let active = state.active.remove(&job_id)?;
        if let Some(handle) = active.timeout {
            handle.abort();
        }
        state.memory_total = state.memory_total.saturating_sub(active.job.estimated_cost);
        self.active_count.send_replace(state.active.len());
        debug!(
            "Job {} deregistered ({} active, {} bytes outstanding)",
            job_id,
            state.active.len(),
            state.memory_total
        );
        Some(active.job)
    }

    /// Force-deregister jobs older than `older_than` whose own timers failed
    /// to fire; the safety net behind the per-job timeout
    pub fn reap_stuck(&self, older_than: Duration) -> Vec<RenderJob> {
        let now = Instant::now();
        let stuck: Vec<JobId> = {
            let state = self.state.lock();
            state
                .active
                .values()
                .filter(|active| now.duration_since(active.job.started_at) > older_than)
                .map(|active| active.job.id)
                .collect()
        };
        stuck.into_iter().filter_map(|id| self.deregister(id)).collect()
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.state.lock().active.contains_key(&job_id)
    }

    pub fn running_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn memory_total(&self) -> Size {
        self.state.lock().memory_total
    }

    /// Receiver over the active-job count; shutdown waits for it to hit zero
    pub fn watch_active(&self) -> watch::Receiver<usize> {
        self.active_count.subscribe()
    }
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}
