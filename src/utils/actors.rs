//! Background task management: lifetime-tied task guards, observable task
//! outcomes, and the actor collection whose aggregate first error can be
//! awaited as a single future.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::utils::{AsyncVar, TaglogError};

use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::{AbortHandle, JoinHandle};

/// A spawned task that is aborted when the guard drops.
#[derive(Debug)]
pub struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    /// Spawns the future and ties its lifetime to the returned guard.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        TaskGuard(tokio::spawn(fut))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a spawned background computation whose result is observable
/// without consuming it. The task is aborted when the last handle drops.
#[derive(Clone, Debug)]
pub struct Outcome<T: Clone + Send + Sync + 'static> {
    cell: AsyncVar<Option<T>>,
    _task: Option<Arc<TaskGuard>>,
}

impl<T: Clone + Send + Sync + 'static> Outcome<T> {
    /// Spawns the computation; its result becomes observable once settled.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let cell = AsyncVar::new(None);
        let cell_ref = cell.clone();
        let guard = TaskGuard::spawn(async move {
            cell_ref.set(Some(fut.await));
        });
        Outcome {
            cell,
            _task: Some(Arc::new(guard)),
        }
    }

    /// An already-settled outcome.
    pub fn ready(value: T) -> Self {
        Outcome {
            cell: AsyncVar::new(Some(value)),
            _task: None,
        }
    }

    /// Non-blocking peek at the settled result, if any.
    pub fn peek(&self) -> Option<T> {
        self.cell.get()
    }

    /// True once the computation has settled.
    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Waits until the computation settles and returns its result.
    pub async fn wait(&self) -> T {
        let mut watch = self.cell.watch();
        loop {
            if let Some(v) = watch.current() {
                return v;
            }
            watch.changed().await;
        }
    }
}

/// A set of background tasks registered over a log system's lifetime. The
/// first non-cancellation error of any member is awaitable; all members are
/// aborted when the collection drops.
#[derive(Debug)]
pub struct ActorCollection {
    err_tx: mpsc::UnboundedSender<TaglogError>,
    err_rx: AsyncMutex<mpsc::UnboundedReceiver<TaglogError>>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl ActorCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        ActorCollection {
            err_tx,
            err_rx: AsyncMutex::new(err_rx),
            tasks: Mutex::new(vec![]),
        }
    }

    /// Spawns a task into the collection. Its error, if any, is kept for
    /// `first_error()`; cancellations are not reported.
    pub fn add<F>(&self, fut: F)
    where
        F: Future<Output = Result<(), TaglogError>> + Send + 'static,
    {
        let err_tx = self.err_tx.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = fut.await {
                if e != TaglogError::Cancelled {
                    let _ = err_tx.send(e);
                }
            }
        });
        self.tasks.lock().unwrap().push(handle.abort_handle());
    }

    /// Waits for the first error produced by any member task.
    pub async fn first_error(&self) -> TaglogError {
        let mut rx = self.err_rx.lock().await;
        // the sender half is owned by self, so recv() cannot see a closed
        // channel while the collection is alive
        rx.recv().await.unwrap_or(TaglogError::Cancelled)
    }
}

impl Default for ActorCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActorCollection {
    fn drop(&mut self) {
        for h in self.tasks.lock().unwrap().drain(..) {
            h.abort();
        }
    }
}

#[cfg(test)]
mod actors_tests {
    use super::*;
    use tokio::time::{self, Duration};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn outcome_spawn_wait() {
        let o = Outcome::spawn(async {
            time::sleep(Duration::from_millis(20)).await;
            42
        });
        assert!(!o.is_ready());
        assert_eq!(o.wait().await, 42);
        assert_eq!(o.peek(), Some(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn outcome_ready() {
        let o = Outcome::ready(7);
        assert!(o.is_ready());
        assert_eq!(o.wait().await, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn collection_surfaces_error() {
        let actors = ActorCollection::new();
        actors.add(async { Ok(()) });
        actors.add(async {
            time::sleep(Duration::from_millis(10)).await;
            Err(TaglogError::MasterLogFailed)
        });
        assert_eq!(actors.first_error().await, TaglogError::MasterLogFailed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn collection_ignores_cancelled() {
        let actors = ActorCollection::new();
        actors.add(async { Err(TaglogError::Cancelled) });
        actors.add(async {
            time::sleep(Duration::from_millis(20)).await;
            Err(TaglogError::BrokenPromise)
        });
        assert_eq!(actors.first_error().await, TaglogError::BrokenPromise);
    }
}
