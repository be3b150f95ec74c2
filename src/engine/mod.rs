/*!
 * Rendering Engines
 * Pooled headless-browser instances that turn HTML into PDF bytes
 */

pub mod cdp;
pub mod chromium;
mod driver;
pub mod pool;
mod types;

pub use chromium::ChromiumDriver;
pub use driver::{EngineDriver, RenderEngine};
pub use pool::{CloseStats, EnginePool};
pub use types::{EngineError, EngineResult, LaunchConfig, PdfOptions};
