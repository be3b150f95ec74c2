/*!
 * Engine Driver Traits
 * The seam between the manager and concrete browser implementations
 */

use super::types::{EngineResult, PdfOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// One heavyweight rendering engine instance
///
/// Owned by the pool while idle and lent to exactly one running job at a
/// time; a render function must not retain the engine past its own return.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render a complete HTML document to PDF bytes
    async fn render_pdf(&self, html: &str, options: &PdfOptions) -> EngineResult<Bytes>;

    /// Number of pages currently open; the pool's health check recycles
    /// engines whose count reaches the ceiling
    fn open_pages(&self) -> usize;

    /// Graceful close; the engine must not be used afterwards
    async fn close(&self) -> EngineResult<()>;
}

/// Constructs engines on demand for the pool
#[async_trait]
pub trait EngineDriver: Send + Sync {
    async fn launch(&self) -> EngineResult<Arc<dyn RenderEngine>>;
}
