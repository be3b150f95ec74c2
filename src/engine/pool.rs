/*!
 * Engine Pool
 * Bounded reuse of heavyweight rendering engines: health-checked reuse,
 * idle trimming, and best-effort close
 */

use super::driver::{EngineDriver, RenderEngine};
use super::types::EngineResult;
use crate::core::limits::MAX_ENGINE_PAGES;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Outcome of a trim or drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseStats {
    pub closed: usize,
    pub failed: usize,
}

pub struct EnginePool {
    driver: Arc<dyn EngineDriver>,
    idle: Mutex<VecDeque<Arc<dyn RenderEngine>>>,
    /// At most one idle engine per concurrency slot
    max_idle: usize,
}

impl EnginePool {
    pub fn new(driver: Arc<dyn EngineDriver>, max_idle: usize) -> Self {
        Self {
            driver,
            idle: Mutex::new(VecDeque::new()),
            max_idle,
        }
    }

    /// Reuse the oldest idle engine if it is healthy, otherwise close it and
    /// launch fresh. Launch failures propagate and fail the job.
    pub async fn acquire(&self) -> EngineResult<Arc<dyn RenderEngine>> {
        let reused = self.idle.lock().pop_front();
        if let Some(engine) = reused {
            let pages = engine.open_pages();
            if pages < MAX_ENGINE_PAGES {
                debug!("Reusing idle engine ({} open pages)", pages);
                return Ok(engine);
            }
            debug!("Recycling engine with {} open pages", pages);
            close_quietly(&engine).await;
        }
        info!("Launching fresh rendering engine");
        self.driver.launch().await
    }

    /// Return an engine after a job; kept warm only while the idle pool has
    /// spare capacity
    pub async fn release(&self, engine: Arc<dyn RenderEngine>) {
        let excess = {
            let mut idle = self.idle.lock();
            if idle.len() < self.max_idle {
                idle.push_back(engine);
                None
            } else {
                Some(engine)
            }
        };
        if let Some(engine) = excess {
            debug!("Idle pool full, closing returned engine");
            close_quietly(&engine).await;
        }
    }

    /// Trim the idle pool down to `target`, closing engines from the tail
    pub async fn sweep_idle(&self, target: usize) -> CloseStats {
        let trimmed: Vec<_> = {
            let mut idle = self.idle.lock();
            let excess = idle.len().saturating_sub(target);
            let split_at = idle.len() - excess;
            idle.split_off(split_at).into_iter().collect()
        };
        let stats = close_all(trimmed).await;
        if stats.closed + stats.failed > 0 {
            info!(
                "Idle sweep closed {} engine(s), {} failed to close",
                stats.closed, stats.failed
            );
        }
        stats
    }

    /// Close every idle engine; used by shutdown
    pub async fn drain(&self) -> CloseStats {
        let all: Vec<_> = self.idle.lock().drain(..).collect();
        close_all(all).await
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

async fn close_all(engines: Vec<Arc<dyn RenderEngine>>) -> CloseStats {
    let mut stats = CloseStats::default();
    for engine in engines {
        if close_quietly(&engine).await {
            stats.closed += 1;
        } else {
            stats.failed += 1;
        }
    }
    stats
}

/// Best-effort close; failures are logged and swallowed, and the engine is
/// considered gone from the pool's bookkeeping either way
async fn close_quietly(engine: &Arc<dyn RenderEngine>) -> bool {
    match engine.close().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Engine close failed (continuing): {}", e);
            false
        }
    }
}
