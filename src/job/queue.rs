/*!
 * Job Queue
 * Strict-FIFO pending continuations awaiting admission
 */

use super::types::JobPayload;
use crate::core::errors::RenderResult;
use crate::core::types::{JobId, Size};
use crate::engine::RenderEngine;
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// Type-erased render function carried by a queue entry
pub type QueuedRenderFn =
    Box<dyn FnOnce(Arc<dyn RenderEngine>, JobPayload) -> BoxFuture<'static, RenderResult<Bytes>> + Send>;

/// Admission metadata for the queue head, readable without popping
#[derive(Debug, Clone, Copy)]
pub struct EntryMeta {
    pub job_id: JobId,
    pub estimated_cost: Size,
    pub submitted_at: Instant,
}

/// One not-yet-admitted job: the render continuation, its payload, and the
/// caller's pending-result handle. Destroyed by admission, never cancelled
/// individually.
pub struct QueueEntry {
    pub job_id: JobId,
    pub estimated_cost: Size,
    pub submitted_at: Instant,
    pub render: QueuedRenderFn,
    pub payload: JobPayload,
    pub reply: oneshot::Sender<RenderResult<Bytes>>,
}

impl QueueEntry {
    fn meta(&self) -> EntryMeta {
        EntryMeta {
            job_id: self.job_id,
            estimated_cost: self.estimated_cost,
            submitted_at: self.submitted_at,
        }
    }
}

/// FIFO queue; insertion order is admission priority, with no reordering
/// and no skipping ahead of an earlier entry
#[derive(Default)]
pub struct JobQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; returns the new queue depth
    pub fn push(&self, entry: QueueEntry) -> usize {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        entries.len()
    }

    /// Admission metadata for the head entry, if any
    pub fn front_meta(&self) -> Option<EntryMeta> {
        self.entries.lock().front().map(QueueEntry::meta)
    }

    /// Remove and return the head entry
    pub fn pop(&self) -> Option<QueueEntry> {
        self.entries.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every pending entry; their reply channels close and waiters
    /// observe the shutdown
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }
}
