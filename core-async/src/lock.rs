//! FIFO operation lock.
//!
//! [`OperationLock`] serializes asynchronous operations against one resource.
//! Each call to [`OperationLock::with_lock`] queues behind every call made
//! before it on the same instance, runs to completion, and only then lets the
//! next queued operation start.
//!
//! The lock is a single-permit tokio mutex. Tokio grants mutex acquisition in
//! request order, which gives the FIFO guarantee. The guard lives on the
//! stack of `with_lock`, so it is released when the operation returns, fails,
//! panics, or is dropped mid-flight.
//!
//! ```rust
//! use core_async::sync::OperationLock;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let lock = Arc::new(OperationLock::new("queue"));
//! let first = lock.with_lock(|| async { "first" });
//! let second = lock.with_lock(|| async { "second" });
//! let (a, b) = futures::join!(first, second);
//! assert_eq!((a, b), ("first", "second"));
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tracing::trace;

/// FIFO async mutex that serializes operations against one resource.
pub struct OperationLock {
    name: &'static str,
    tail: Mutex<()>,
    queued: AtomicUsize,
}

impl OperationLock {
    /// Create a new lock. `name` only appears in trace output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tail: Mutex::new(()),
            queued: AtomicUsize::new(0),
        }
    }

    /// Run `operation` once every previously queued operation has finished.
    ///
    /// The returned value is whatever the operation produced, including its
    /// error variant if it returns a `Result`. A failing operation releases the
    /// lock exactly like a successful one.
    pub async fn with_lock<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _queued = QueuedGuard::enter(&self.queued);
        let position = self.queued.load(Ordering::Relaxed);
        trace!(lock = self.name, position, "Waiting for operation lock");

        let _guard = self.tail.lock().await;
        trace!(lock = self.name, "Operation lock acquired");

        operation().await
    }

    /// Number of operations currently waiting for or holding the lock.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Returns `true` if an operation is currently running.
    pub fn is_locked(&self) -> bool {
        self.tail.try_lock().is_err()
    }
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new("operation")
    }
}

impl fmt::Debug for OperationLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationLock")
            .field("name", &self.name)
            .field("queued", &self.queued())
            .finish()
    }
}

/// Keeps `queued` accurate even when the caller's future is dropped.
struct QueuedGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> QueuedGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
