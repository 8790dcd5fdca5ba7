//! Runner configuration.
//!
//! Settings come from an optional YAML file and are then overridden by
//! command line flags:
//!
//! ```yaml
//! tag_file: tags.csv
//! session:
//!   k: 4
//!   false_alarm_percent: 1.0
//!   ack_timeout_ms: 2000
//!   controller_heartbeat_ms: 6000
//!   sdr_type: airspy_mini
//! transport:
//!   bind: 0.0.0.0:14580
//!   remote: 192.168.1.20:14580
//! keepalive_interval_ms: 1000
//! receive_timeout_ms: 1000
//! status_interval_ms: 5000
//! json_events: false
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagtrack_control::{
    ConfigError, ReceiveLoopConfig, SessionConfig, DEFAULT_KEEPALIVE_INTERVAL_MS,
    DEFAULT_RECEIVE_TIMEOUT_MS,
};

use crate::error::{RunnerError, RunnerResult};

/// Default local address for the tunnel socket.
pub const DEFAULT_BIND: &str = "0.0.0.0:14580";

/// Default interval between status tables.
pub const DEFAULT_STATUS_INTERVAL_MS: u64 = 5000;

/// Where tunnel datagrams are exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Local address to bind.
    pub bind: String,
    /// Telemetry link endpoint. Learned from the first datagram when unset.
    pub remote: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            bind: DEFAULT_BIND.to_string(),
            remote: None,
        }
    }
}

impl TransportConfig {
    /// Parsed local address.
    pub fn bind_addr(&self) -> RunnerResult<SocketAddr> {
        parse_addr("bind", &self.bind)
    }

    /// Parsed remote address, if configured.
    pub fn remote_addr(&self) -> RunnerResult<Option<SocketAddr>> {
        self.remote
            .as_deref()
            .map(|remote| parse_addr("remote", remote))
            .transpose()
    }
}

fn parse_addr(field: &'static str, value: &str) -> RunnerResult<SocketAddr> {
    value.parse().map_err(|_| RunnerError::Address {
        field,
        value: value.to_string(),
    })
}

/// Complete runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Session settings.
    pub session: SessionConfig,
    /// Tag catalog to upload.
    pub tag_file: Option<PathBuf>,
    /// Socket settings.
    pub transport: TransportConfig,
    /// Minimum time between keep-alives.
    pub keepalive_interval_ms: u64,
    /// Bound on one blocking receive.
    pub receive_timeout_ms: u64,
    /// Interval between status tables on stderr.
    pub status_interval_ms: u64,
    /// Print every session notification to stdout as a JSON line.
    pub json_events: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            session: SessionConfig::default(),
            tag_file: None,
            transport: TransportConfig::default(),
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            status_interval_ms: DEFAULT_STATUS_INTERVAL_MS,
            json_events: false,
        }
    }
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Tag catalog path.
    pub tag_file: Option<PathBuf>,
    /// Local address.
    pub bind: Option<String>,
    /// Remote address.
    pub remote: Option<String>,
    /// Repeat count.
    pub k: Option<u32>,
    /// False alarm percentage.
    pub false_alarm_percent: Option<f64>,
    /// JSON event output.
    pub json_events: Option<bool>,
}

impl RunnerConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> RunnerResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RunnerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Apply command line overrides.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(tag_file) = overrides.tag_file {
            self.tag_file = Some(tag_file);
        }
        if let Some(bind) = overrides.bind {
            self.transport.bind = bind;
        }
        if let Some(remote) = overrides.remote {
            self.transport.remote = Some(remote);
        }
        if let Some(k) = overrides.k {
            self.session.k = k;
        }
        if let Some(percent) = overrides.false_alarm_percent {
            self.session.false_alarm_percent = percent;
        }
        if let Some(json) = overrides.json_events {
            self.json_events = json;
        }
    }

    /// Check every setting.
    pub fn validate(&self) -> RunnerResult<()> {
        self.session.validate()?;
        for (field, value) in [
            ("keepalive_interval_ms", self.keepalive_interval_ms),
            ("receive_timeout_ms", self.receive_timeout_ms),
            ("status_interval_ms", self.status_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than 0".to_string(),
                }
                .into());
            }
        }
        self.transport.bind_addr()?;
        self.transport.remote_addr()?;
        Ok(())
    }

    /// Receive thread settings.
    pub fn receive_loop(&self) -> ReceiveLoopConfig {
        ReceiveLoopConfig {
            keepalive_interval_ms: self.keepalive_interval_ms,
            receive_timeout_ms: self.receive_timeout_ms,
        }
    }

    /// Interval between status tables.
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }
}
