use crate::manifest::{PluginCategory, PluginStatus};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Cannot {operation} plugin {id} while {status}")]
    InvalidState {
        id: String,
        status: PluginStatus,
        operation: &'static str,
    },

    #[error("Plugin {id} is the last available {category} and cannot be removed")]
    RequiredPlugin { id: String, category: PluginCategory },

    #[error("Plugin already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid manifest for '{id}': {reason}")]
    InvalidManifest { id: String, reason: String },

    #[error("Plugin {id} failed to initialize: {reason}")]
    InitializationFailed { id: String, reason: String },

    #[error("Plugin {id} failed to activate: {reason}")]
    ActivationFailed { id: String, reason: String },

    #[error("Plugin {id} is not a {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    #[error("Provider error: {0}")]
    Provider(String),
}

impl PluginError {
    pub fn provider(message: impl Into<String>) -> Self {
        PluginError::Provider(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PluginError::NotFound(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, PluginError::InvalidState { .. })
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
