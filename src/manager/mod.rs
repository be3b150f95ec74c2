/*!
 * Render Manager
 * Admission control, FIFO queue draining, and shutdown coordination over
 * the engine pool and lifecycle tracker
 */

mod sweep;

use crate::convert;
use crate::core::errors::{RenderError, RenderResult};
use crate::core::limits::SHUTDOWN_GRACE_PERIOD;
use crate::core::types::{JobId, Size};
use crate::engine::{ChromiumDriver, EngineDriver, EnginePool, RenderEngine};
use crate::events::{EventSink, Gauges, JobEvent, LogSink};
use crate::job::queue::{JobQueue, QueueEntry, QueuedRenderFn};
use crate::job::tracker::LifecycleTracker;
use crate::job::types::{estimated_cost, JobPayload, ManagerConfig, RenderJob};
use bytes::Bytes;
use futures::FutureExt;
use log::{info, warn};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// The document-rendering resource manager.
///
/// One instance owns one engine pool, one budget, and one queue. Construct
/// it explicitly where the process bootstraps and inject it into whatever
/// handles requests; configuration is supplied once at construction.
pub struct RenderManager {
    inner: Arc<ManagerInner>,
    sweep: Mutex<Option<sweep::SweepTask>>,
}

pub(crate) struct ManagerInner {
    pub(crate) config: ManagerConfig,
    pub(crate) pool: EnginePool,
    pub(crate) tracker: LifecycleTracker,
    pub(crate) queue: JobQueue,
    pub(crate) events: Arc<dyn EventSink>,
    next_job_id: AtomicU64,
    /// Serializes admission decisions across submitters and the drain loop
    admission: Mutex<()>,
    shutting_down: AtomicBool,
}

/// Builder for `RenderManager`
pub struct RenderManagerBuilder {
    config: ManagerConfig,
    driver: Option<Arc<dyn EngineDriver>>,
    events: Option<Arc<dyn EventSink>>,
}

impl RenderManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: ManagerConfig::default(),
            driver: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_driver(mut self, driver: Arc<dyn EngineDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the manager and start its maintenance sweep.
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> RenderManager {
        let mut config = self.config;
        config.max_concurrent_jobs = config.max_concurrent_jobs.max(1);

        let driver = self
            .driver
            .unwrap_or_else(|| Arc::new(ChromiumDriver::default()));
        let events = self.events.unwrap_or_else(|| Arc::new(LogSink));

        let inner = Arc::new(ManagerInner {
            pool: EnginePool::new(driver, config.max_concurrent_jobs),
            tracker: LifecycleTracker::new(),
            queue: JobQueue::new(),
            events,
            next_job_id: AtomicU64::new(1),
            admission: Mutex::new(()),
            shutting_down: AtomicBool::new(false),
            config,
        });

        info!(
            "Render manager initialized: {} slot(s), {} byte budget, {}ms job timeout",
            inner.config.max_concurrent_jobs,
            inner.config.max_memory_budget_bytes,
            inner.config.job_timeout_ms
        );

        let sweep = sweep::SweepTask::spawn(Arc::clone(&inner));
        RenderManager {
            inner,
            sweep: Mutex::new(Some(sweep)),
        }
    }
}

impl Default for RenderManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderManager {
    pub fn builder() -> RenderManagerBuilder {
        RenderManagerBuilder::new()
    }

    /// Submit a render job. Runs immediately when concurrency and memory
    /// budgets allow; otherwise queues in strict FIFO order and resolves
    /// once admitted. An immediate job submitted later may start before an
    /// earlier queued one.
    pub async fn submit<F, Fut>(&self, render: F, payload: JobPayload) -> RenderResult<Bytes>
    where
        F: FnOnce(Arc<dyn RenderEngine>, JobPayload) -> Fut + Send + 'static,
        Fut: Future<Output = RenderResult<Bytes>> + Send + 'static,
    {
        let render: QueuedRenderFn = Box::new(move |engine, payload| render(engine, payload).boxed());
        Arc::clone(&self.inner).submit_boxed(render, payload).await
    }

    /// Composed entry point: convert the payload to printable HTML, then
    /// submit a job that drives an engine's print pipeline. Conversion
    /// failures, including unknown formats, reject before any admission or
    /// engine activity.
    pub async fn render_document(&self, payload: JobPayload) -> RenderResult<Bytes> {
        let html = convert::render_to_html(
            &payload.format,
            &payload.content,
            payload.data.as_ref(),
            &payload.options,
        )?;
        let pdf = payload.pdf.clone();
        self.submit(
            move |engine, _payload| async move {
                engine.render_pdf(&html, &pdf).await.map_err(RenderError::Engine)
            },
            payload,
        )
        .await
    }

    /// Drain in-flight work and release every engine.
    ///
    /// Queued entries are abandoned and their waiters observe
    /// `RenderError::ShuttingDown`; running jobs get the grace period to
    /// reach their cleaned state before being abandoned. Safe to call more
    /// than once; only the first call performs the teardown.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Render manager shutting down");

        let sweep = self.sweep.lock().take();
        if let Some(task) = sweep {
            task.shutdown().await;
        }

        let abandoned = self.inner.queue.clear();
        if abandoned > 0 {
            warn!("Abandoning {} queued job(s) at shutdown", abandoned);
        }

        let mut active = self.inner.tracker.watch_active();
        match timeout(SHUTDOWN_GRACE_PERIOD, active.wait_for(|count| *count == 0)).await {
            Ok(_) => info!("All in-flight jobs cleaned up"),
            Err(_) => warn!(
                "Grace period elapsed with {} job(s) still active; abandoning them",
                self.inner.tracker.running_count()
            ),
        }

        let stats = self.inner.pool.drain().await;
        if stats.closed + stats.failed > 0 {
            info!(
                "Closed {} idle engine(s) at shutdown ({} close failure(s))",
                stats.closed, stats.failed
            );
        }

        self.inner.events.emit(JobEvent::ShutdownComplete);
    }

    /// Run a maintenance sweep now instead of waiting for the interval
    pub fn force_sweep(&self) {
        if let Some(task) = self.sweep.lock().as_ref() {
            task.trigger();
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn running_jobs(&self) -> usize {
        self.inner.tracker.running_count()
    }

    pub fn queued_jobs(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn idle_engines(&self) -> usize {
        self.inner.pool.idle_count()
    }

    pub fn memory_total(&self) -> Size {
        self.inner.tracker.memory_total()
    }
}

impl ManagerInner {
    pub(crate) fn gauges(&self) -> Gauges {
        Gauges {
            running_jobs: self.tracker.running_count(),
            queued_jobs: self.queue.len(),
            idle_engines: self.pool.idle_count(),
            memory_total: self.tracker.memory_total(),
        }
    }

    async fn submit_boxed(
        self: Arc<Self>,
        render: QueuedRenderFn,
        payload: JobPayload,
    ) -> RenderResult<Bytes> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RenderError::ShuttingDown);
        }

        let cost = estimated_cost(&payload)?;
        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let submitted_at = Instant::now();

        let admitted = {
            let _guard = self.admission.lock();
            self.tracker.try_admit(
                RenderJob {
                    id: job_id,
                    submitted_at,
                    started_at: Instant::now(),
                    estimated_cost: cost,
                },
                &self.config,
            )
        };

        if admitted {
            return self.execute(job_id, cost, render, payload).await;
        }

        let (reply, result) = oneshot::channel();
        self.queue.push(QueueEntry {
            job_id,
            estimated_cost: cost,
            submitted_at,
            render,
            payload,
            reply,
        });
        self.events.emit(JobEvent::Queued {
            job_id,
            gauges: self.gauges(),
        });

        // Capacity may have freed between the admission test and the push
        Arc::clone(&self).drain_queue();

        // A shutdown racing this submission may have cleared the queue just
        // before the push landed; abandon the straggler too so its waiter
        // observes the shutdown instead of hanging
        if self.shutting_down.load(Ordering::SeqCst) {
            self.queue.clear();
        }

        match result.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RenderError::ShuttingDown),
        }
    }

    /// Run an admitted (already registered) job: arm its timeout, lend it an
    /// engine, and settle the bookkeeping afterwards regardless of outcome
    async fn execute(
        self: &Arc<Self>,
        job_id: JobId,
        cost: Size,
        render: QueuedRenderFn,
        payload: JobPayload,
    ) -> RenderResult<Bytes> {
        let started = Instant::now();
        self.events.emit(JobEvent::Started {
            job_id,
            estimated_cost: cost,
            gauges: self.gauges(),
        });

        // Bookkeeping-only timeout: reclaims the accounting slot but never
        // aborts the render itself
        let timer = tokio::spawn({
            let inner = Arc::clone(self);
            let budget = self.config.job_timeout();
            async move {
                tokio::time::sleep(budget).await;
                inner.handle_timeout(job_id);
            }
        });
        self.tracker.arm_timeout(job_id, timer.abort_handle());

        let result = match self.pool.acquire().await {
            Ok(engine) => {
                let outcome = render(Arc::clone(&engine), payload).await;
                self.pool.release(engine).await;
                outcome
            }
            Err(e) => Err(RenderError::Engine(e)),
        };

        match &result {
            Ok(_) => self.events.emit(JobEvent::Completed {
                job_id,
                duration_ms: started.elapsed().as_millis() as u64,
                gauges: self.gauges(),
            }),
            Err(e) => self.events.emit(JobEvent::Errored {
                job_id,
                error: e.to_string(),
                gauges: self.gauges(),
            }),
        }
        self.deregister(job_id);

        result
    }

    /// Deregistration path shared by every terminal transition: clean the
    /// tracker entry, announce it, and give freed capacity to the queue
    pub(crate) fn deregister(self: &Arc<Self>, job_id: JobId) {
        if self.tracker.deregister(job_id).is_some() {
            self.events.emit(JobEvent::Cleaned {
                job_id,
                gauges: self.gauges(),
            });
        }
        Arc::clone(self).drain_queue();
    }

    fn handle_timeout(self: Arc<Self>, job_id: JobId) {
        // Frees the accounting slot only; the in-flight render keeps running
        // and still settles its caller when it finishes
        if self.tracker.deregister(job_id).is_some() {
            warn!("Job {} exceeded its time budget; slot reclaimed", job_id);
            self.events.emit(JobEvent::TimedOut {
                job_id,
                gauges: self.gauges(),
            });
            self.events.emit(JobEvent::Cleaned {
                job_id,
                gauges: self.gauges(),
            });
            self.drain_queue();
        }
    }

    /// Admit queued entries head-first while capacity allows. Each admitted
    /// entry runs on its own task and settles its stored reply channel; a
    /// head that does not fit stops the loop so nothing skips ahead of it.
    pub(crate) fn drain_queue(self: Arc<Self>) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        loop {
            let entry = {
                let _guard = self.admission.lock();
                let Some(head) = self.queue.front_meta() else { break };
                let admitted = self.tracker.try_admit(
                    RenderJob {
                        id: head.job_id,
                        submitted_at: head.submitted_at,
                        started_at: Instant::now(),
                        estimated_cost: head.estimated_cost,
                    },
                    &self.config,
                );
                if !admitted {
                    break;
                }
                // Still under the admission guard, so the popped entry is the
                // head that was just admitted
                self.queue.pop()
            };
            let Some(entry) = entry else { break };

            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                let QueueEntry {
                    job_id,
                    estimated_cost,
                    render,
                    payload,
                    reply,
                    ..
                } = entry;
                let outcome = inner.execute(job_id, estimated_cost, render, payload).await;
                // An error settles this entry only; the drain keeps going
                let _ = reply.send(outcome);
            });
        }
    }
}
