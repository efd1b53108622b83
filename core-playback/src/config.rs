//! # Playback Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for [`PlaybackProvider`](crate::PlaybackProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// `skip_to_previous` restarts the current track instead of moving back
    /// once playback is past this point.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: Duration,

    /// Lower bound applied by `set_playback_rate`.
    #[serde(default = "default_min_rate")]
    pub min_rate: f32,

    /// Upper bound applied by `set_playback_rate`.
    #[serde(default = "default_max_rate")]
    pub max_rate: f32,

    /// Volume used when nothing is persisted.
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Settings key the volume is persisted under.
    #[serde(default = "default_volume_settings_key")]
    pub volume_settings_key: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            restart_threshold: default_restart_threshold(),
            min_rate: default_min_rate(),
            max_rate: default_max_rate(),
            default_volume: default_volume(),
            volume_settings_key: default_volume_settings_key(),
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_rate > 0.0 && self.min_rate <= self.max_rate) {
            return Err("min_rate must be > 0 and not exceed max_rate".to_string());
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err("default_volume must be between 0.0 and 1.0".to_string());
        }

        if self.volume_settings_key.trim().is_empty() {
            return Err("volume_settings_key cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn clamp_volume(volume: f32) -> f32 {
        if volume.is_nan() {
            return 0.0;
        }
        volume.clamp(0.0, 1.0)
    }

    pub fn clamp_rate(&self, rate: f32) -> f32 {
        if rate.is_nan() {
            return 1.0_f32.clamp(self.min_rate, self.max_rate);
        }
        rate.clamp(self.min_rate, self.max_rate)
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_restart_threshold() -> Duration {
    Duration::from_secs(3)
}

fn default_min_rate() -> f32 {
    0.5
}

fn default_max_rate() -> f32 {
    2.0
}

fn default_volume() -> f32 {
    1.0
}

fn default_volume_settings_key() -> String {
    "playback.volume".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.restart_threshold, Duration::from_secs(3));
        assert_eq!(config.min_rate, 0.5);
        assert_eq!(config.max_rate, 2.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PlaybackConfig::default();

        config.min_rate = 3.0;
        assert!(config.validate().is_err());
        config.min_rate = 0.5;

        config.default_volume = 1.5;
        assert!(config.validate().is_err());
        config.default_volume = 0.8;

        config.volume_settings_key = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamping() {
        let config = PlaybackConfig::default();
        assert_eq!(PlaybackConfig::clamp_volume(1.7), 1.0);
        assert_eq!(PlaybackConfig::clamp_volume(-0.2), 0.0);
        assert_eq!(PlaybackConfig::clamp_volume(f32::NAN), 0.0);
        assert_eq!(config.clamp_rate(4.0), 2.0);
        assert_eq!(config.clamp_rate(0.1), 0.5);
        assert_eq!(config.clamp_rate(1.25), 1.25);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: PlaybackConfig = serde_json::from_str(r#"{"max_rate": 3.0}"#).unwrap();
        assert_eq!(config.max_rate, 3.0);
        assert_eq!(config.volume_settings_key, "playback.volume");
    }
}
