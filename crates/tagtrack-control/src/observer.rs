//! Notifications from the session to whoever displays its state.

use serde::Serialize;
use tagtrack_tunnel::CommandId;

use crate::detection::ChannelSummary;
use crate::orchestrator::Phase;

/// What a liveness notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "source", content = "channel", rename_all = "snake_case")]
pub enum LivenessSource {
    /// The remote controller's heartbeat.
    Controller,
    /// A detector channel's zero-frequency heartbeat pulses.
    DetectorHeartbeat(u32),
    /// A detector channel's confirmed pulses.
    PulseStale(u32),
}

impl std::fmt::Display for LivenessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LivenessSource::Controller => write!(f, "controller"),
            LivenessSource::DetectorHeartbeat(id) => write!(f, "channel {} heartbeat", id),
            LivenessSource::PulseStale(id) => write!(f, "channel {} pulses", id),
        }
    }
}

/// Receives session state changes.
///
/// Every method runs on the session thread, in the order the changes
/// happened. Implementations must not block for long.
pub trait SessionObserver: Send {
    /// `source` went silent (`lost == true`) or came back.
    fn liveness_changed(&mut self, source: LivenessSource, lost: bool);

    /// The detector channel set was derived from a newly confirmed catalog.
    fn channels_populated(&mut self, channels: &[ChannelSummary]);

    /// A channel's aggregated SNR changed.
    fn channel_updated(&mut self, _channel: &ChannelSummary) {}

    /// The upload and detection state machine moved.
    fn phase_changed(&mut self, _phase: Phase) {}

    /// No acknowledgment arrived for `command` within the window.
    fn command_timed_out(&mut self, _command: CommandId) {}
}

/// Observer that discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn liveness_changed(&mut self, _source: LivenessSource, _lost: bool) {}

    fn channels_populated(&mut self, _channels: &[ChannelSummary]) {}
}
