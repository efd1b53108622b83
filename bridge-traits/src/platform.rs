//! Marker traits keeping bridge trait bounds in one place.
//!
//! Bridge implementations are shared across async tasks behind `Arc`, so every
//! bridge trait requires `Send + Sync` through [`PlatformSendSync`].

/// Marker trait for types that can be shared freely across tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
