//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagtrack_catalog::CatalogSettings;
use tagtrack_tunnel::SdrType;

use crate::error::ConfigError;

/// Default window for a command acknowledgment.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 2000;

/// Default window for controller heartbeats.
pub const DEFAULT_CONTROLLER_HEARTBEAT_MS: u64 = 6000;

/// Configuration for one control session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Repeat count required for confirmation, stamped onto every tag.
    pub k: u32,
    /// False alarm probability as a percentage.
    pub false_alarm_percent: f64,
    /// How long to wait for a command acknowledgment.
    pub ack_timeout_ms: u64,
    /// How long the controller may stay silent before it is considered lost.
    pub controller_heartbeat_ms: u64,
    /// Receiver hardware on the detector.
    pub sdr_type: SdrType,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let catalog = CatalogSettings::default();
        SessionConfig {
            k: catalog.k,
            false_alarm_percent: catalog.false_alarm_percent,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            controller_heartbeat_ms: DEFAULT_CONTROLLER_HEARTBEAT_MS,
            sdr_type: SdrType::AirspyMini,
        }
    }
}

impl SessionConfig {
    /// Check that every setting is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "ack_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.controller_heartbeat_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "controller_heartbeat_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if !self.false_alarm_percent.is_finite()
            || !(0.0..=100.0).contains(&self.false_alarm_percent)
        {
            return Err(ConfigError::Invalid {
                field: "false_alarm_percent",
                reason: format!("{} is not within 0-100", self.false_alarm_percent),
            });
        }
        Ok(())
    }

    /// Parameters the catalog parser stamps onto each tag.
    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            k: self.k,
            false_alarm_percent: self.false_alarm_percent,
        }
    }

    /// Acknowledgment window.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Controller heartbeat window.
    pub fn controller_heartbeat_window(&self) -> Duration {
        Duration::from_millis(self.controller_heartbeat_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.ack_timeout(), Duration::from_millis(2000));
        assert_eq!(config.controller_heartbeat_window(), Duration::from_millis(6000));
        assert_eq!(config.sdr_type, SdrType::AirspyMini);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = SessionConfig {
            ack_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "ack_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_catalog_settings_follow_config() {
        let config = SessionConfig {
            k: 7,
            false_alarm_percent: 2.5,
            ..Default::default()
        };
        let settings = config.catalog_settings();
        assert_eq!(settings.k, 7);
        assert!((settings.false_alarm_probability() - 0.025).abs() < 1e-12);
    }
}
