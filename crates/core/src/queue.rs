//! Strictly ordered execution of playback side effects.
//!
//! Audio clips arrive as a burst of `audio` frames, but each one has to finish
//! playing (and updating the subtitle and avatar) before the next starts. The
//! queue runs one task at a time, in enqueue order, on a single worker.

use crate::protocol::Expression;
use futures::{FutureExt, future::BoxFuture};
use std::{
    collections::VecDeque,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

/// Metadata describing a queued task, used for logging and inspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMeta {
    pub label: &'static str,
    pub display_text: Option<String>,
    pub expressions: Vec<Expression>,
    /// The task originated from an event relayed by another group member.
    pub forwarded: bool,
}

impl TaskMeta {
    pub fn labelled(label: &'static str) -> Self {
        Self {
            label,
            ..Default::default()
        }
    }
}

/// One unit of ordered asynchronous work.
///
/// The wrapped future does nothing until the queue polls it, so anything it
/// reads is read at execution time rather than at enqueue time.
pub struct PlaybackTask {
    pub meta: TaskMeta,
    work: BoxFuture<'static, anyhow::Result<()>>,
}

impl PlaybackTask {
    pub fn new<F>(meta: TaskMeta, work: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            meta,
            work: Box::pin(work),
        }
    }
}

impl std::fmt::Debug for PlaybackTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackTask")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Lane {
    pending: VecDeque<PlaybackTask>,
    executing: bool,
}

struct QueueInner {
    lane: Mutex<Lane>,
    wake: Notify,
    busy: watch::Sender<bool>,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, Lane> {
        self.lane.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Worker(JoinHandle<()>);

impl Drop for Worker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// FIFO of `PlaybackTask`s executed one at a time.
///
/// Clones share the same queue and worker. The worker stops when the last
/// clone is dropped.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
    _worker: Arc<Worker>,
}

impl TaskQueue {
    /// Creates the queue and spawns its worker on the current Tokio runtime.
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        let inner = Arc::new(QueueInner {
            lane: Mutex::new(Lane::default()),
            wake: Notify::new(),
            busy,
        });
        let worker = tokio::spawn(run_worker(inner.clone()));
        Self {
            inner,
            _worker: Arc::new(Worker(worker)),
        }
    }

    /// Appends a task to the tail of the queue.
    pub fn enqueue(&self, task: PlaybackTask) {
        {
            let mut lane = self.inner.lock();
            debug!(label = task.meta.label, queued = lane.pending.len(), "Enqueuing playback task.");
            lane.pending.push_back(task);
            self.inner.busy.send_replace(true);
        }
        self.inner.wake.notify_one();
    }

    /// Drops every task that has not started yet. A running task is left alone.
    pub fn clear(&self) -> usize {
        let mut lane = self.inner.lock();
        let dropped = lane.pending.len();
        lane.pending.clear();
        if !lane.executing {
            self.inner.busy.send_replace(false);
        }
        if dropped > 0 {
            debug!(dropped, "Cleared pending playback tasks.");
        }
        dropped
    }

    /// Whether any task is queued or executing.
    pub fn has_pending(&self) -> bool {
        let lane = self.inner.lock();
        lane.executing || !lane.pending.is_empty()
    }

    /// Number of tasks waiting to start.
    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Number of tasks waiting to start whose label is not `label`.
    pub fn waiting_other_than(&self, label: &str) -> usize {
        self.inner
            .lock()
            .pending
            .iter()
            .filter(|task| task.meta.label != label)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Resolves once nothing is queued or executing.
    pub async fn wait_idle(&self) {
        let mut busy = self.inner.busy.subscribe();
        // The sender lives in `inner`, which we hold, so this cannot fail.
        let _ = busy.wait_for(|busy| !*busy).await;
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(inner: Arc<QueueInner>) {
    loop {
        let next = {
            let mut lane = inner.lock();
            match lane.pending.pop_front() {
                Some(task) => {
                    lane.executing = true;
                    Some(task)
                }
                None => {
                    lane.executing = false;
                    inner.busy.send_replace(false);
                    None
                }
            }
        };
        match next {
            Some(task) => execute(task).await,
            None => inner.wake.notified().await,
        }
    }
}

async fn execute(task: PlaybackTask) {
    let PlaybackTask { meta, work } = task;
    debug!(label = meta.label, forwarded = meta.forwarded, "Running playback task.");
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(label = meta.label, error = ?e, "Playback task failed."),
        Err(_) => error!(label = meta.label, "Playback task panicked."),
    }
}
