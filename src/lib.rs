/*!
 * docgen
 * On-demand document rendering: pooled headless-browser PDF generation
 * under bounded concurrency and memory budgets, with FIFO job queueing,
 * per-job timeouts, and graceful shutdown
 */

pub mod convert;
pub mod core;
pub mod engine;
pub mod events;
pub mod job;
pub mod manager;
pub mod observability;

// Re-exports
pub use crate::convert::{ConvertError, DocumentFormat, RenderOptions};
pub use crate::core::errors::{RenderError, RenderResult};
pub use crate::engine::{
    ChromiumDriver, EngineDriver, EngineError, EnginePool, EngineResult, LaunchConfig, PdfOptions,
    RenderEngine,
};
pub use crate::events::{EventSink, Gauges, JobEvent, LogSink};
pub use crate::job::types::{estimated_cost, JobPayload, ManagerConfig};
pub use crate::manager::{RenderManager, RenderManagerBuilder};
pub use crate::observability::init_tracing;
