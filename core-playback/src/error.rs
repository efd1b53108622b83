//! # Playback Error Types

use core_plugins::PluginError;
use thiserror::Error;

/// Errors returned by [`PlaybackProvider`](crate::PlaybackProvider) operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The native transport rejected or failed an operation.
    #[error("Transport {operation} failed: {message}")]
    TransportFailure {
        operation: &'static str,
        message: String,
    },

    /// No stream URL could be resolved for a queued track.
    #[error("Failed to resolve stream for {track_id}: {message}")]
    StreamResolution { track_id: String, message: String },

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Reached the end of the queue and repeat is not `all`.
    #[error("No next track")]
    NoNextTrack,

    #[error("Queue index {index} out of range (queue length {len})")]
    QueueIndexOutOfRange { index: usize, len: usize },

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,
}

impl PlaybackError {
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        PlaybackError::TransportFailure {
            operation,
            message: message.into(),
        }
    }

    /// Returns `true` if the native engine failed.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, PlaybackError::TransportFailure { .. })
    }

    /// Returns `true` if the operation is not valid for the current queue state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoNextTrack
                | PlaybackError::NoTrackLoaded
                | PlaybackError::QueueIndexOutOfRange { .. }
        )
    }

    /// Returns `true` if calling `play` again may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::TransportFailure { .. } | PlaybackError::StreamResolution { .. }
        )
    }
}

impl From<PlaybackError> for PluginError {
    fn from(err: PlaybackError) -> Self {
        PluginError::provider(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
