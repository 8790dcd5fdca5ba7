//! Console status display.
//!
//! [`ConsoleDisplay`] is the session observer. It records every notification
//! on a shared [`StatusBoard`] that the main thread prints periodically, and
//! optionally echoes each notification to stdout as a JSON line.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tagtrack_control::{ChannelSummary, LivenessSource, Phase, SessionObserver};
use tagtrack_tunnel::CommandId;
use tracing::{info, warn};

#[derive(Debug)]
struct BoardState {
    controller_lost: bool,
    phase: Phase,
    channels: BTreeMap<u32, ChannelSummary>,
    command_timeouts: u64,
}

impl Default for BoardState {
    fn default() -> Self {
        BoardState {
            controller_lost: true,
            phase: Phase::AwaitingController,
            channels: BTreeMap::new(),
            command_timeouts: 0,
        }
    }
}

/// Session state as last reported to the display.
#[derive(Clone, Default)]
pub struct StatusBoard {
    state: Arc<Mutex<BoardState>>,
}

impl StatusBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer that writes to this board.
    pub fn observer(&self, json_events: bool) -> ConsoleDisplay {
        ConsoleDisplay {
            state: Arc::clone(&self.state),
            json_events,
        }
    }

    /// Whether the controller is considered lost.
    pub fn controller_lost(&self) -> bool {
        self.state.lock().controller_lost
    }

    /// Last reported phase.
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Last reported state of a channel.
    pub fn channel(&self, channel_id: u32) -> Option<ChannelSummary> {
        self.state.lock().channels.get(&channel_id).cloned()
    }

    /// Commands that went unacknowledged.
    pub fn command_timeouts(&self) -> u64 {
        self.state.lock().command_timeouts
    }

    /// Render the status table.
    pub fn render(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Controller: {}   Phase: {}   Unacknowledged: {}",
            if state.controller_lost { "LOST" } else { "alive" },
            state.phase,
            state.command_timeouts
        );
        let _ = writeln!(
            out,
            "┌{}┬{}┬{}┬{}┬{}┬{}┐",
            "─".repeat(9),
            "─".repeat(12),
            "─".repeat(12),
            "─".repeat(10),
            "─".repeat(9),
            "─".repeat(11)
        );
        let _ = writeln!(
            out,
            "│ {:^7} │ {:^10} │ {:^10} │ {:^8} │ {:^7} │ {:^9} │",
            "Channel", "Label", "Freq MHz", "SNR", "Pulses", "Heartbeat"
        );
        let _ = writeln!(
            out,
            "├{}┼{}┼{}┼{}┼{}┼{}┤",
            "─".repeat(9),
            "─".repeat(12),
            "─".repeat(12),
            "─".repeat(10),
            "─".repeat(9),
            "─".repeat(11)
        );
        for channel in state.channels.values() {
            let snr = channel
                .aggregate_snr
                .map_or_else(|| "-".to_string(), |snr| format!("{:.1}", snr));
            let _ = writeln!(
                out,
                "│ {:7} │ {:10} │ {:10.4} │ {:>8} │ {:7} │ {:9} │",
                channel.channel_id,
                channel.label,
                f64::from(channel.frequency_hz) / 1e6,
                snr,
                if channel.stale { "stale" } else { "ok" },
                if channel.heartbeat_lost { "lost" } else { "ok" }
            );
        }
        let _ = writeln!(
            out,
            "└{}┴{}┴{}┴{}┴{}┴{}┘",
            "─".repeat(9),
            "─".repeat(12),
            "─".repeat(12),
            "─".repeat(10),
            "─".repeat(9),
            "─".repeat(11)
        );
        out
    }

    /// Print the status table to stderr.
    pub fn print(&self) {
        eprintln!();
        eprint!("{}", self.render());
    }
}

/// One notification, as printed in JSON mode.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent<'a> {
    /// Liveness flag change.
    Liveness {
        /// What changed.
        #[serde(flatten)]
        source: LivenessSource,
        /// New state.
        lost: bool,
    },
    /// Channel set derived.
    ChannelsPopulated {
        /// The channels.
        channels: &'a [ChannelSummary],
    },
    /// Channel aggregate changed.
    ChannelUpdated {
        /// The channel.
        channel: &'a ChannelSummary,
    },
    /// Workflow phase changed.
    PhaseChanged {
        /// New phase.
        phase: Phase,
    },
    /// A command went unacknowledged.
    CommandTimedOut {
        /// The command.
        command: CommandId,
    },
}

/// Session observer feeding a [`StatusBoard`].
pub struct ConsoleDisplay {
    state: Arc<Mutex<BoardState>>,
    json_events: bool,
}

impl ConsoleDisplay {
    fn emit(&self, event: &DisplayEvent<'_>) {
        if !self.json_events {
            return;
        }
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Display: failed to encode event: {}", e),
        }
    }
}

impl SessionObserver for ConsoleDisplay {
    fn liveness_changed(&mut self, source: LivenessSource, lost: bool) {
        info!("Display: {} {}", source, if lost { "lost" } else { "restored" });
        {
            let mut state = self.state.lock();
            match source {
                LivenessSource::Controller => state.controller_lost = lost,
                LivenessSource::DetectorHeartbeat(id) => {
                    if let Some(channel) = state.channels.get_mut(&id) {
                        channel.heartbeat_lost = lost;
                    }
                }
                LivenessSource::PulseStale(id) => {
                    if let Some(channel) = state.channels.get_mut(&id) {
                        channel.stale = lost;
                    }
                }
            }
        }
        self.emit(&DisplayEvent::Liveness { source, lost });
    }

    fn channels_populated(&mut self, channels: &[ChannelSummary]) {
        {
            let mut state = self.state.lock();
            state.channels = channels
                .iter()
                .map(|channel| (channel.channel_id, channel.clone()))
                .collect();
        }
        self.emit(&DisplayEvent::ChannelsPopulated { channels });
    }

    fn channel_updated(&mut self, channel: &ChannelSummary) {
        self.state
            .lock()
            .channels
            .insert(channel.channel_id, channel.clone());
        self.emit(&DisplayEvent::ChannelUpdated { channel });
    }

    fn phase_changed(&mut self, phase: Phase) {
        self.state.lock().phase = phase;
        self.emit(&DisplayEvent::PhaseChanged { phase });
    }

    fn command_timed_out(&mut self, command: CommandId) {
        self.state.lock().command_timeouts += 1;
        self.emit(&DisplayEvent::CommandTimedOut { command });
    }
}
