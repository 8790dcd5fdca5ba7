//! Control session for the remote tag detector.
//!
//! The session uploads the tag catalog to the detector, starts and stops
//! detection, and turns the detector's reports into liveness flags and
//! per-channel pulse aggregates.
//!
//! # Architecture
//!
//! - [`SequencedCommandLink`] keeps at most one command outstanding and
//!   matches acknowledgments against it.
//! - [`HeartbeatMonitor`] tracks whether the remote controller is alive.
//! - [`DetectionTracker`] folds pulses into [`DetectorChannel`]s.
//! - [`ControlOrchestrator`] owns all of the above plus the [`TimerQueue`]
//!   and drives the upload workflow.
//! - [`spawn_session`] runs an orchestrator on its own thread next to a
//!   receive thread, returning a [`SessionHandle`].
//!
//! The display and the telemetry link are reached through the
//! [`SessionObserver`] and [`TunnelTransport`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagtrack_control::{spawn_session, ControlOrchestrator, NullObserver, ReceiveLoopConfig, SessionConfig};
//!
//! let transport = Arc::new(my_transport);
//! let mut session = ControlOrchestrator::new(SessionConfig::default(), transport.clone(), Box::new(NullObserver));
//! session.load_catalog(catalog, std::time::Instant::now())?;
//! let handle = spawn_session(session, transport, ReceiveLoopConfig::default())?;
//! ```

mod actor;
mod config;
mod detection;
mod error;
mod heartbeat;
mod link;
mod observer;
mod orchestrator;
pub mod session_metrics;
mod timer;
mod transport;

pub use actor::{
    spawn_session, ReceiveLoopConfig, SessionEvent, SessionHandle, SessionRequest,
    DEFAULT_KEEPALIVE_INTERVAL_MS, DEFAULT_RECEIVE_TIMEOUT_MS,
};
pub use config::{SessionConfig, DEFAULT_ACK_TIMEOUT_MS, DEFAULT_CONTROLLER_HEARTBEAT_MS};
pub use detection::{ChannelSummary, DetectionTracker, DetectorChannel, PulseOutcome};
pub use error::{ConfigError, SessionError, SessionResult, TransportError};
pub use heartbeat::{HeartbeatMonitor, HeartbeatUpdate};
pub use link::{AckOutcome, SequencedCommandLink};
pub use observer::{LivenessSource, NullObserver, SessionObserver};
pub use orchestrator::{tag_info, ControlOrchestrator, Phase, SessionSnapshot};
pub use session_metrics::describe_metrics;
pub use timer::{TimerKey, TimerQueue};
pub use transport::TunnelTransport;
