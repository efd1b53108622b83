//! Async abstraction layer for the media core.
//!
//! All `core-*` crates depend on this crate instead of reaching for tokio
//! directly, so the executor stays swappable in one place.
//!
//! # Modules
//!
//! - `lock`: [`OperationLock`], the FIFO mutation serializer
//! - `sync`: broadcast channels and the tokio mutex
//! - `task`: spawning
//! - `time`: sleep and timeout
//! - `runtime`: runtime handles and `block_on`
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::OperationLock;
//!
//! # async fn example() {
//! let lock = OperationLock::new("transport");
//! let value = lock.with_lock(|| async { 42 }).await;
//! assert_eq!(value, 42);
//! # }
//! ```

pub mod lock;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use lock::OperationLock;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
