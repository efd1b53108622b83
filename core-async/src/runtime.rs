//! Runtime utilities that abstract over the underlying async executor.
//!
//! Downstream crates never need to depend on Tokio directly for handles or
//! for driving a future to completion from synchronous code.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a lightweight current-thread runtime.
///
/// Must not be called from inside an async context; use [`Handle::try_current`]
/// to detect one first.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
