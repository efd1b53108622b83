//! Async-aware locks and channels.
//!
//! Event fan-out goes through [`broadcast`]; one-at-a-time mutations go
//! through [`OperationLock`]. Plain data guarded across `.await` points uses
//! the tokio [`Mutex`].
//!
//! ```rust
//! use core_async::sync::broadcast;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (tx, mut rx) = broadcast::channel(4);
//! tx.send("ended").unwrap();
//! assert_eq!(rx.recv().await.unwrap(), "ended");
//! # }
//! ```

pub use tokio::sync::{broadcast, Mutex, MutexGuard};

pub use crate::lock::OperationLock;
