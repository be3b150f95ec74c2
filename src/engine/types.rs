/*!
 * Engine Types
 * Common types for the heavyweight-engine layer
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Engine operation result
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to launch rendering engine: {0}")]
    LaunchFailed(String),

    #[error("engine exited before the DevTools endpoint appeared")]
    HandshakeTimeout,

    #[error("DevTools connection failed: {0}")]
    Connection(String),

    #[error("DevTools call {method} failed: {message}")]
    Protocol { method: String, message: String },

    #[error("page did not finish loading within {0:?}")]
    PageLoadTimeout(Duration),

    #[error("engine returned a malformed payload: {0}")]
    InvalidPayload(String),

    #[error("engine close failed: {0}")]
    CloseFailed(String),

    #[error("protocol serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters forwarded to the engine's print-to-PDF call
///
/// Field names map one-to-one onto the DevTools `Page.printToPDF` parameters;
/// lengths are in inches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfOptions {
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub prefer_css_page_size: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        // A4 portrait with moderate margins
        Self {
            landscape: false,
            print_background: true,
            scale: 1.0,
            paper_width: 8.27,
            paper_height: 11.69,
            margin_top: 0.4,
            margin_bottom: 0.4,
            margin_left: 0.4,
            margin_right: 0.4,
            prefer_css_page_size: false,
        }
    }
}

/// Launch configuration for browser engines
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub binary: PathBuf,
    /// Extra flags appended after the built-in set
    pub extra_args: Vec<String>,
    /// Disable to run inside containers without user namespaces
    pub sandbox: bool,
}

impl LaunchConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
            sandbox: true,
        }
    }

    /// Resolve the engine binary: `DOCGEN_CHROMIUM_BIN` wins, then the first
    /// well-known name found on PATH, then a bare `chromium` fallback
    pub fn resolve() -> Self {
        if let Ok(explicit) = std::env::var("DOCGEN_CHROMIUM_BIN") {
            return Self::new(explicit);
        }
        for name in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Some(path) = find_on_path(name) {
                return Self::new(path);
            }
        }
        Self::new("chromium")
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
