//! Observable value cell built on `tokio::sync::watch`: writers publish a
//! new value, any number of observers grab the current one or await the next
//! assignment. Suitable for coarse-grained state (interface handles, failure
//! flags) that many tasks watch concurrently.

use std::sync::Arc;

use tokio::sync::watch;

/// A shared cell holding a current value; observers can await changes.
///
/// Cloning shares the underlying cell. Assignment wakes all observers, even
/// when the new value compares equal to the old one.
#[derive(Debug)]
pub struct AsyncVar<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T: Clone + Send + Sync + 'static> AsyncVar<T> {
    /// Creates a new observable cell with the given initial value.
    pub fn new(init: T) -> Self {
        let (tx, _rx) = watch::channel(init);
        AsyncVar { tx: Arc::new(tx) }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Assigns a new value, waking all observers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Completes when the value is next assigned after this call. For a
    /// wait that must not miss an assignment racing with a preceding read,
    /// take a `watch()` first and use its `current()`/`changed()` pair.
    pub async fn on_change(&self) {
        let mut rx = self.tx.subscribe();
        // the sender half lives at least as long as `self`
        let _ = rx.changed().await;
    }

    /// Starts observing the cell: assignments made after this call are never
    /// missed by the returned watch.
    pub fn watch(&self) -> AsyncVarWatch<T> {
        AsyncVarWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// One observer's view of an `AsyncVar`, pinned to a subscription point.
#[derive(Debug)]
pub struct AsyncVarWatch<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> AsyncVarWatch<T> {
    /// The current value, marked as seen: a subsequent `changed()` waits
    /// only for assignments made after this read.
    pub fn current(&mut self) -> T {
        self.rx.borrow_and_update().clone()
    }

    /// Completes at the first assignment not yet seen by this watch.
    pub async fn changed(&mut self) {
        // the sender half lives at least as long as the watched cell
        let _ = self.rx.changed().await;
    }
}

impl<T> Clone for AsyncVar<T> {
    fn clone(&self) -> Self {
        AsyncVar {
            tx: self.tx.clone(),
        }
    }
}

/// A one-shot-per-assignment wakeup primitive for multiple waiters.
#[derive(Debug, Clone)]
pub struct Trigger(AsyncVar<u64>);

impl Trigger {
    /// Creates a new trigger with no pending wakeups.
    pub fn new() -> Self {
        Trigger(AsyncVar::new(0))
    }

    /// Wakes everyone currently blocked in `on_trigger()`.
    pub fn trigger(&self) {
        self.0.set(self.0.get().wrapping_add(1));
    }

    /// Completes at the next `trigger()` call.
    pub async fn on_trigger(&self) {
        self.0.on_change().await;
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod asyncvar_tests {
    use super::*;
    use tokio::time::{self, Duration};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn var_get_set() {
        let v = AsyncVar::new(7);
        assert_eq!(v.get(), 7);
        v.set(8);
        assert_eq!(v.get(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn var_on_change() {
        let v = AsyncVar::new(0u64);
        let v_ref = v.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            v_ref.set(1);
        });
        v.on_change().await;
        assert_eq!(v.get(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn var_unconditional_wake() {
        // assignment of an equal value still wakes observers
        let v = AsyncVar::new(5);
        let v_ref = v.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            v_ref.set(5);
        });
        v.on_change().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn trigger_wakes_all() {
        let t = Trigger::new();
        let (t1, t2) = (t.clone(), t.clone());
        let w1 = tokio::spawn(async move { t1.on_trigger().await });
        let w2 = tokio::spawn(async move { t2.on_trigger().await });
        time::sleep(Duration::from_millis(20)).await;
        t.trigger();
        w1.await.unwrap();
        w2.await.unwrap();
    }
}
