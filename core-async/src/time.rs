//! Timers used by the core: sleeping and bounding a future with a deadline.

pub use tokio::time::{sleep, timeout};

pub use std::time::{Duration, Instant};
