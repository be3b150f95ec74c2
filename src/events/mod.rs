/*!
 * Observability Events
 * Strongly-typed lifecycle events delivered through an explicit listener
 * port registered at manager construction
 */

use crate::core::types::{JobId, Size};
use log::{info, warn};
use serde::Serialize;

/// Snapshot of manager pressure attached to most events
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Gauges {
    pub running_jobs: usize,
    pub queued_jobs: usize,
    pub idle_engines: usize,
    pub memory_total: Size,
}

/// Lifecycle events for logging and metrics; not required for correctness
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Started {
        job_id: JobId,
        estimated_cost: Size,
        gauges: Gauges,
    },
    Queued {
        job_id: JobId,
        gauges: Gauges,
    },
    Completed {
        job_id: JobId,
        duration_ms: u64,
        gauges: Gauges,
    },
    Errored {
        job_id: JobId,
        error: String,
        gauges: Gauges,
    },
    /// The job's time budget elapsed; its accounting slot was freed but the
    /// render itself keeps running
    TimedOut {
        job_id: JobId,
        gauges: Gauges,
    },
    Cleaned {
        job_id: JobId,
        gauges: Gauges,
    },
    SweepCompleted {
        engines_closed: usize,
        jobs_reaped: usize,
        gauges: Gauges,
    },
    SweepError {
        error: String,
    },
    ShutdownComplete,
}

/// Listener port for observability events
///
/// Passed into the manager at construction instead of registering on a
/// process-global emitter, so embedding code controls where events go.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Default sink: forwards events to the log facade
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: JobEvent) {
        match &event {
            JobEvent::Errored { job_id, error, gauges } => warn!(
                "Job {} failed: {} (running={}, queued={})",
                job_id, error, gauges.running_jobs, gauges.queued_jobs
            ),
            JobEvent::TimedOut { job_id, gauges } => warn!(
                "Job {} timed out; accounting slot released (running={}, memory={})",
                job_id, gauges.running_jobs, gauges.memory_total
            ),
            JobEvent::SweepError { error } => warn!("Maintenance sweep error: {}", error),
            JobEvent::Started { job_id, estimated_cost, gauges } => info!(
                "Job {} started (cost={}, running={}, memory={})",
                job_id, estimated_cost, gauges.running_jobs, gauges.memory_total
            ),
            JobEvent::Queued { job_id, gauges } => info!(
                "Job {} queued at depth {} (running={})",
                job_id, gauges.queued_jobs, gauges.running_jobs
            ),
            JobEvent::Completed { job_id, duration_ms, .. } => {
                info!("Job {} completed in {}ms", job_id, duration_ms)
            }
            JobEvent::Cleaned { job_id, gauges } => info!(
                "Job {} cleaned (running={}, queued={}, memory={})",
                job_id, gauges.running_jobs, gauges.queued_jobs, gauges.memory_total
            ),
            JobEvent::SweepCompleted { engines_closed, jobs_reaped, gauges } => info!(
                "Sweep complete: {} engine(s) closed, {} stuck job(s) reaped, {} idle",
                engines_closed, jobs_reaped, gauges.idle_engines
            ),
            JobEvent::ShutdownComplete => info!("Render manager shutdown complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = JobEvent::Started {
            job_id: 7,
            estimated_cost: 1024,
            gauges: Gauges::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "started");
        assert_eq!(json["job_id"], 7);
    }

    #[test]
    fn log_sink_accepts_all_variants() {
        let sink = LogSink;
        sink.emit(JobEvent::ShutdownComplete);
        sink.emit(JobEvent::SweepError { error: "boom".into() });
    }
}
