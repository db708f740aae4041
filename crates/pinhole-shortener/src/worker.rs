use crate::error::{Result, ShortenerError};
use parking_lot::Mutex;
use pinhole_core::ShortId;
use pinhole_storage::StorageService;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// A deferred soft-delete of `short_ids` on behalf of `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub owner_id: String,
    pub short_ids: Vec<ShortId>,
}

impl Task {
    pub fn new(owner_id: impl Into<String>, short_ids: Vec<ShortId>) -> Self {
        Self {
            owner_id: owner_id.into(),
            short_ids,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// Unbounded FIFO of tasks shared by many producers and many consumers.
///
/// [`push`](Self::push) never waits. [`pop`](Self::pop) waits until a task
/// is available or the queue is closed; once closed, remaining tasks are
/// still handed out until the queue is empty.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `task` and wakes one waiting consumer.
    pub fn push(&self, task: Task) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(ShortenerError::QueueClosed);
            }
            state.tasks.push_back(task);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Takes the oldest task, waiting while the queue is open and empty.
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Task> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a push or close in between is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(task) = state.tasks.pop_front() {
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stops accepting tasks and wakes every waiting consumer.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle of a [`TaskPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting new tasks.
    Active,
    /// Closed to new tasks, workers still draining.
    Closing,
    /// Closed and every worker has exited.
    Closed,
}

impl Display for PoolState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolState::Active => write!(f, "active"),
            PoolState::Closing => write!(f, "closing"),
            PoolState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Default)]
struct PoolStats {
    live_workers: AtomicUsize,
    processed: AtomicU64,
}

/// Decrements the live worker count when a worker exits, panics included.
struct LiveGuard(Arc<PoolStats>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A fixed set of workers applying deletion tasks through the storage
/// service.
///
/// A worker whose storage call fails logs the error and exits; the task is
/// dropped and the remaining workers keep going.
#[derive(Debug)]
pub struct TaskPool {
    queue: Arc<TaskQueue>,
    stats: Arc<PoolStats>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// Spawns `workers` worker tasks (at least one) on the current runtime.
    pub fn start(storage: StorageService, workers: usize) -> Self {
        let workers = workers.max(1);
        let queue = Arc::new(TaskQueue::new());
        let stats = Arc::new(PoolStats::default());
        stats.live_workers.store(workers, Ordering::Release);

        let handles = (0..workers)
            .map(|id| {
                let guard = LiveGuard(stats.clone());
                tokio::spawn(run_worker(id, queue.clone(), storage.clone(), guard))
            })
            .collect();

        info!(workers, "deletion workers started");
        Self {
            queue,
            stats,
            handles: Mutex::new(handles),
        }
    }

    /// Queues a deletion. Fails with [`ShortenerError::QueueClosed`] once
    /// the pool has been closed.
    pub fn push(&self, owner_id: impl Into<String>, short_ids: Vec<ShortId>) -> Result<()> {
        self.queue.push(Task::new(owner_id, short_ids))
    }

    /// Stops accepting tasks. Queued tasks are still processed; use
    /// [`join`](Self::join) to wait for them.
    pub fn close(&self) {
        if !self.queue.is_closed() {
            info!(pending = self.queue.len(), "closing deletion queue");
        }
        self.queue.close();
    }

    /// Waits for every worker to exit.
    pub async fn join(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "deletion worker aborted");
            }
        }
    }

    pub fn state(&self) -> PoolState {
        if !self.queue.is_closed() {
            PoolState::Active
        } else if self.live_workers() > 0 {
            PoolState::Closing
        } else {
            PoolState::Closed
        }
    }

    pub fn live_workers(&self) -> usize {
        self.stats.live_workers.load(Ordering::Acquire)
    }

    /// Number of queued tasks not yet taken by a worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total number of short ids submitted for deletion by completed tasks.
    pub fn processed(&self) -> u64 {
        self.stats.processed.load(Ordering::Acquire)
    }
}

async fn run_worker(id: usize, queue: Arc<TaskQueue>, storage: StorageService, guard: LiveGuard) {
    debug!(worker = id, "deletion worker running");

    while let Some(task) = queue.pop().await {
        let count = task.short_ids.len();
        trace!(worker = id, owner = %task.owner_id, count, "processing deletion task");

        if let Err(err) = storage
            .delete_by_owner(&task.owner_id, &task.short_ids)
            .await
        {
            error!(
                worker = id,
                owner = %task.owner_id,
                count,
                error = %err,
                "deletion task failed, stopping worker"
            );
            return;
        }

        guard.0.processed.fetch_add(count as u64, Ordering::AcqRel);
    }

    debug!(worker = id, "deletion worker stopped");
}
