//! Plugin manifests and lifecycle status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PluginError, Result};

/// Capability category a plugin serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginCategory {
    MetadataProvider,
    AudioSourceProvider,
    PlaybackProvider,
    SyncProvider,
    LyricsProvider,
    Recommendation,
    Visualizer,
}

impl PluginCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCategory::MetadataProvider => "metadata-provider",
            PluginCategory::AudioSourceProvider => "audio-source-provider",
            PluginCategory::PlaybackProvider => "playback-provider",
            PluginCategory::SyncProvider => "sync-provider",
            PluginCategory::LyricsProvider => "lyrics-provider",
            PluginCategory::Recommendation => "recommendation",
            PluginCategory::Visualizer => "visualizer",
        }
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a registered plugin.
///
/// ```text
/// uninitialized --initialize--> ready --activate--> active
///       |                         ^                    |
///       +------> error <----------+---- deactivate ----+
///
/// destroy: any --> disabled (terminal until re-registered)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Active,
    Error,
    Disabled,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Uninitialized => "uninitialized",
            PluginStatus::Initializing => "initializing",
            PluginStatus::Ready => "ready",
            PluginStatus::Active => "active",
            PluginStatus::Error => "error",
            PluginStatus::Disabled => "disabled",
        }
    }

    /// Whether a plugin in this status can still serve its category.
    pub fn is_available(&self) -> bool {
        !matches!(self, PluginStatus::Error | PluginStatus::Disabled)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique id, e.g. `spotify-metadata`
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: PluginCategory,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// JSON schema of the plugin's settings
    #[serde(default)]
    pub config_schema: serde_json::Value,
}

impl PluginManifest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        category: PluginCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: None,
            category,
            capabilities: BTreeSet::new(),
            config_schema: serde_json::Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn with_config_schema(mut self, schema: serde_json::Value) -> Self {
        self.config_schema = schema;
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Checks id, name, version and schema shape.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| PluginError::InvalidManifest {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id cannot be empty"));
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(invalid("id cannot contain whitespace"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if !is_semver_like(&self.version) {
            return Err(invalid("version must look like MAJOR.MINOR.PATCH"));
        }
        if self.capabilities.iter().any(|c| c.trim().is_empty()) {
            return Err(invalid("capability names cannot be empty"));
        }
        if !(self.config_schema.is_null() || self.config_schema.is_object()) {
            return Err(invalid("config schema must be a JSON object"));
        }

        Ok(())
    }
}

/// `1.2.3`, optionally followed by `-pre` or `+build`.
fn is_semver_like(version: &str) -> bool {
    let core = version
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> PluginManifest {
        PluginManifest::new("native-player", "Native Player", "1.0.0", PluginCategory::PlaybackProvider)
            .with_capabilities(["play", "pause", "seek"])
    }

    #[test]
    fn test_manifest_validation() {
        assert!(manifest().validate().is_ok());

        let mut m = manifest();
        m.id = " ".to_string();
        assert!(matches!(m.validate(), Err(PluginError::InvalidManifest { .. })));

        let mut m = manifest();
        m.version = "1.0".to_string();
        assert!(m.validate().is_err());

        let mut m = manifest();
        m.version = "2.10.3-beta.1".to_string();
        assert!(m.validate().is_ok());

        let m = manifest().with_config_schema(serde_json::json!([1, 2]));
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_manifest_serde_shape() {
        let json = serde_json::to_value(manifest().with_description("Wraps the OS player")).unwrap();
        assert_eq!(json["category"], "playback-provider");
        assert_eq!(json["capabilities"], serde_json::json!(["pause", "play", "seek"]));
        assert!(json.get("configSchema").is_some());

        let back: PluginManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back.description.as_deref(), Some("Wraps the OS player"));
        assert!(back.has_capability("seek"));
    }

    #[test]
    fn test_status_availability() {
        assert!(PluginStatus::Ready.is_available());
        assert!(PluginStatus::Uninitialized.is_available());
        assert!(!PluginStatus::Error.is_available());
        assert!(!PluginStatus::Disabled.is_available());
        assert_eq!(PluginStatus::Active.to_string(), "active");
    }
}
