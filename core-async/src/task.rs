//! Spawning background work.
//!
//! Playback runs its transport event pump as a spawned task and keeps the
//! [`JoinHandle`] so the pump can be aborted on deactivate.

pub use tokio::task::{yield_now, JoinError, JoinHandle};

/// Spawn `future` on the ambient runtime. Panics outside one, like
/// `tokio::spawn`.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}
