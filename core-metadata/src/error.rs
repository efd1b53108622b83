use core_plugins::PluginError;
use thiserror::Error;

/// Errors from the album and lyrics lookups.
///
/// `Clone` because one in-flight fetch result is handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("No active provider for '{source_name}' with capability '{capability}'")]
    ProviderNotFound {
        source_name: String,
        capability: &'static str,
    },

    #[error("Invalid lookup key '{0}': expected 'source:id'")]
    InvalidKey(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("No lyrics found for track {0}")]
    LyricsNotFound(String),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
}

impl MetadataError {
    pub fn provider_not_found(source_name: impl Into<String>, capability: &'static str) -> Self {
        MetadataError::ProviderNotFound {
            source_name: source_name.into(),
            capability,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetadataError::ProviderNotFound { .. } | MetadataError::LyricsNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
