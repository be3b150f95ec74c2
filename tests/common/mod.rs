/*!
 * Shared test fixtures: stub engines, a counting driver, an event recorder,
 * and a concurrency probe
 */
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use docgen::{
    EngineDriver, EngineResult, EventSink, JobEvent, PdfOptions, RenderEngine,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory engine; renders instantly and tags output with the input length
#[derive(Default)]
pub struct StubEngine {
    pub pages: AtomicUsize,
    pub closed: AtomicBool,
}

#[async_trait]
impl RenderEngine for StubEngine {
    async fn render_pdf(&self, html: &str, _options: &PdfOptions) -> EngineResult<Bytes> {
        Ok(Bytes::from(format!("%PDF:{}", html.len())))
    }

    fn open_pages(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }

    async fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver that counts launches and remembers every engine it handed out
#[derive(Default)]
pub struct StubDriver {
    pub launched: AtomicUsize,
    pub engines: Mutex<Vec<Arc<StubEngine>>>,
}

impl StubDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launch_count(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn all_closed(&self) -> bool {
        self.engines
            .lock()
            .unwrap()
            .iter()
            .all(|engine| engine.closed.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl EngineDriver for StubDriver {
    async fn launch(&self) -> EngineResult<Arc<dyn RenderEngine>> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::new(StubEngine::default());
        self.engines.lock().unwrap().push(Arc::clone(&engine));
        Ok(engine)
    }
}

/// Event sink that records everything it sees
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<JobEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: JobEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Tracks the peak number of render functions running at once
#[derive(Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
