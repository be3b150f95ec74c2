/*!
 * Error Types
 * Centralized error handling for the render manager
 */

use thiserror::Error;

pub use crate::convert::ConvertError;
pub use crate::engine::EngineError;

/// Common result type for render-manager operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors surfaced to job submitters
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("document conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("rendering engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("failed to serialize job payload for cost estimation: {0}")]
    PayloadSerialization(#[from] serde_json::Error),

    #[error("render manager is shutting down")]
    ShuttingDown,
}
