/*!
 * Job Types
 * Render-job data model and manager configuration
 */

use crate::convert::RenderOptions;
use crate::core::limits::{ENGINE_BASE_COST_BYTES, PAYLOAD_COST_FACTOR};
use crate::core::types::{JobId, Size};
use crate::engine::PdfOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Everything a job needs besides an engine: source content and knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    /// Source format name: "html", "markdown", "json", or "template"
    pub format: String,
    /// Document source in the given format
    pub content: String,
    /// Data object for template expansion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub options: RenderOptions,
    #[serde(default)]
    pub pdf: PdfOptions,
}

impl JobPayload {
    pub fn new(format: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            content: content.into(),
            data: None,
            options: RenderOptions::default(),
            pdf: PdfOptions::default(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_pdf(mut self, pdf: PdfOptions) -> Self {
        self.pdf = pdf;
        self
    }
}

/// Heuristic admission cost: fixed engine overhead plus double the
/// serialized payload size. Used only for admission accounting, never
/// compared against real process memory.
pub fn estimated_cost(payload: &JobPayload) -> Result<Size, serde_json::Error> {
    let serialized = serde_json::to_vec(payload)?;
    Ok(ENGINE_BASE_COST_BYTES + PAYLOAD_COST_FACTOR * serialized.len())
}

/// Bookkeeping record for one admitted job
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub id: JobId,
    pub submitted_at: Instant,
    pub started_at: Instant,
    pub estimated_cost: Size,
}

/// Immutable configuration for one manager instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Ceiling on simultaneously running jobs (queued jobs do not count)
    pub max_concurrent_jobs: usize,
    /// Ceiling on the summed estimated cost of running jobs
    pub max_memory_budget_bytes: Size,
    /// Per-job wall-clock budget before the accounting slot is reclaimed
    pub job_timeout_ms: u64,
    /// Period of the background maintenance sweep
    pub idle_sweep_interval_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            max_memory_budget_bytes: 512 * 1024 * 1024,
            job_timeout_ms: 60_000,
            idle_sweep_interval_ms: 30_000,
        }
    }
}

impl ManagerConfig {
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_memory_budget(mut self, bytes: Size) -> Self {
        self.max_memory_budget_bytes = bytes;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_idle_sweep_interval(mut self, interval: Duration) -> Self {
        self.idle_sweep_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn idle_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.idle_sweep_interval_ms)
    }

    /// Idle engines the sweep keeps warm: half the concurrency, at least one
    pub fn idle_keep_target(&self) -> usize {
        (self.max_concurrent_jobs / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn estimated_cost_follows_the_formula() {
        let payload = JobPayload::new("html", "a".repeat(1000));
        let serialized = serde_json::to_vec(&payload).unwrap().len();
        assert!(serialized > 1000);
        assert_eq!(
            estimated_cost(&payload).unwrap(),
            ENGINE_BASE_COST_BYTES + PAYLOAD_COST_FACTOR * serialized
        );
    }

    #[test]
    fn estimated_cost_grows_with_payload() {
        let small = estimated_cost(&JobPayload::new("html", "x")).unwrap();
        let large = estimated_cost(&JobPayload::new("html", "x".repeat(4096))).unwrap();
        assert!(large > small);
        assert!(small > ENGINE_BASE_COST_BYTES);
    }

    #[test]
    fn idle_keep_target_floors_at_one() {
        assert_eq!(ManagerConfig::default().with_max_concurrent_jobs(1).idle_keep_target(), 1);
        assert_eq!(ManagerConfig::default().with_max_concurrent_jobs(5).idle_keep_target(), 2);
        assert_eq!(ManagerConfig::default().with_max_concurrent_jobs(8).idle_keep_target(), 4);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = ManagerConfig::default()
            .with_max_concurrent_jobs(2)
            .with_job_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        let back: ManagerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_concurrent_jobs, 2);
        assert_eq!(back.job_timeout(), Duration::from_millis(250));
    }
}
