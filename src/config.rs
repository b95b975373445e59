//! Driver configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, TelemetryError};

/// Tuning for the async [`Driver`](crate::Driver) poll loop.
///
/// Every field has a default, so a partial YAML document is enough:
///
/// ```
/// use racebridge::TrackerConfig;
///
/// let config = TrackerConfig::from_yaml("reconnect_delay_ms: 250\n").unwrap();
/// assert_eq!(config.poll_timeout_ms, 16);
/// assert_eq!(config.reconnect_delay().as_millis(), 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct TrackerConfig {
    /// Longest wait for one frame. The producer publishes at 60 Hz.
    pub poll_timeout_ms: u64,
    /// Pause between reconnect attempts after the connection is lost
    pub reconnect_delay_ms: u64,
    /// Consecutive transport errors tolerated before the driver stops
    pub max_consecutive_errors: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { poll_timeout_ms: 16, reconnect_delay_ms: 1000, max_consecutive_errors: 10 }
    }
}

impl TrackerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::parse("Tracker configuration", e.to_string()))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_frame_period() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_timeout(), Duration::from_millis(16));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.max_consecutive_errors, 10);
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let config =
            TrackerConfig::from_yaml("poll_timeout_ms: 5\nmax_consecutive_errors: 2\n").unwrap();
        assert_eq!(config.poll_timeout_ms, 5);
        assert_eq!(config.max_consecutive_errors, 2);
        assert_eq!(config.reconnect_delay_ms, 1000);
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = TrackerConfig::from_yaml("poll_timeout_ms: soon\n").unwrap_err();
        assert!(matches!(err, TelemetryError::Parse { .. }));
    }

    #[test]
    fn serializes_back_to_yaml() {
        let yaml = serde_yaml_ng::to_string(&TrackerConfig::default()).unwrap();
        assert!(yaml.contains("reconnect_delay_ms: 1000"));
        assert_eq!(TrackerConfig::from_yaml(&yaml).unwrap(), TrackerConfig::default());
    }
}
