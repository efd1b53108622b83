//! Registry configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::manifest::PluginCategory;

/// Settings for [`PluginRegistry`](crate::PluginRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Categories that must always keep at least one usable plugin.
    /// `destroy`/`unregister` refuse to remove the last one.
    #[serde(default = "default_mandatory_categories")]
    pub mandatory_categories: BTreeSet<PluginCategory>,
}

fn default_mandatory_categories() -> BTreeSet<PluginCategory> {
    BTreeSet::from([PluginCategory::PlaybackProvider])
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mandatory_categories: default_mandatory_categories(),
        }
    }
}

impl RegistryConfig {
    /// No mandatory categories at all.
    pub fn permissive() -> Self {
        Self {
            mandatory_categories: BTreeSet::new(),
        }
    }

    pub fn with_mandatory(mut self, category: PluginCategory) -> Self {
        self.mandatory_categories.insert(category);
        self
    }

    pub fn is_mandatory(&self, category: PluginCategory) -> bool {
        self.mandatory_categories.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requires_playback_provider() {
        let config = RegistryConfig::default();
        assert!(config.is_mandatory(PluginCategory::PlaybackProvider));
        assert!(!config.is_mandatory(PluginCategory::LyricsProvider));
        assert!(!RegistryConfig::permissive().is_mandatory(PluginCategory::PlaybackProvider));
    }

    #[test]
    fn test_deserialize_fills_default() {
        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RegistryConfig::default());

        let config: RegistryConfig =
            serde_json::from_str(r#"{"mandatory_categories": ["metadata-provider"]}"#).unwrap();
        assert!(config.is_mandatory(PluginCategory::MetadataProvider));
        assert!(!config.is_mandatory(PluginCategory::PlaybackProvider));
    }
}
