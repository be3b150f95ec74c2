/*!
 * System Limits and Constants
 *
 * Centralized location for render-manager limits, thresholds, and magic
 * numbers. Organized by domain for maintainability and discoverability.
 */

use std::time::Duration;

// =============================================================================
// ADMISSION ACCOUNTING
// =============================================================================

/// Fixed overhead charged to every job before payload size (32MB)
/// Approximates the working set of one headless browser rendering a single
/// document; a heuristic for admission accounting, never measured against
/// real process memory
pub const ENGINE_BASE_COST_BYTES: usize = 32 * 1024 * 1024;

/// Payload bytes are counted twice: once for the source content held by the
/// job, once for the DOM the engine builds from it
pub const PAYLOAD_COST_FACTOR: usize = 2;

// =============================================================================
// ENGINE POOL
// =============================================================================

/// An idle engine with this many open pages is recycled instead of reused
/// Pages leak when a render fails mid-flight; the ceiling bounds the damage
pub const MAX_ENGINE_PAGES: usize = 10;

// =============================================================================
// JOB LIFECYCLE
// =============================================================================

/// Multiplier over the per-job timeout after which the maintenance sweep
/// force-deregisters a job whose own timer failed to fire
pub const STUCK_JOB_TIMEOUT_MULTIPLIER: u32 = 2;

/// How long shutdown waits for in-flight jobs before abandoning them
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

// =============================================================================
// CHROMIUM ENGINE
// =============================================================================

/// Bound on waiting for the DevTools endpoint banner after process launch
pub const ENGINE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Bound on waiting for a page's load event before printing
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on waiting for the browser process to exit after Browser.close
pub const ENGINE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
