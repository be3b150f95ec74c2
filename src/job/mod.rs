/*!
 * Job Model
 * Render-job data model, FIFO queue, and lifecycle tracking
 */

pub mod queue;
pub mod tracker;
pub mod types;

pub use queue::{JobQueue, QueueEntry, QueuedRenderFn};
pub use tracker::LifecycleTracker;
pub use types::{estimated_cost, JobPayload, ManagerConfig, RenderJob};
