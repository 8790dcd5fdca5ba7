//! Metric definitions for the control session.
//!
//! Counters go through the `metrics` facade; without an installed recorder
//! they are no-ops.

use metrics::{describe_counter, Unit};

/// A counter declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a counter with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            description: "",
            labels: &[],
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the recorder.
    pub fn describe(&self) {
        describe_counter!(self.name, Unit::Count, self.description);
    }
}

/// All session metrics.
pub mod metric_defs {
    use super::Metric;

    /// Tunnel frames received from the detector.
    pub const FRAMES_RECEIVED: Metric = Metric::counter("tagtrack.tunnel.frames_received")
        .with_description("Tunnel frames received from the detector");

    /// Frames dropped before reaching the session state.
    pub const FRAMES_DROPPED: Metric = Metric::counter("tagtrack.tunnel.frames_dropped")
        .with_description("Tunnel frames dropped as undecodable or unexpected")
        .with_labels(&["reason"]);

    /// Commands sent to the detector.
    pub const COMMANDS_SENT: Metric = Metric::counter("tagtrack.link.commands_sent")
        .with_description("Commands sent to the detector")
        .with_labels(&["command"]);

    /// Acknowledgments matched to the outstanding command.
    pub const ACKS_RECEIVED: Metric = Metric::counter("tagtrack.link.acks_received")
        .with_description("Acknowledgments matched to the outstanding command")
        .with_labels(&["result"]);

    /// Commands that went unacknowledged.
    pub const ACK_TIMEOUTS: Metric = Metric::counter("tagtrack.link.ack_timeouts")
        .with_description("Commands with no acknowledgment inside the window");

    /// Acknowledgments for a command other than the outstanding one.
    pub const ACK_DESYNCS: Metric = Metric::counter("tagtrack.link.ack_desyncs")
        .with_description("Acknowledgments that did not match the outstanding command");

    /// Confirmed pulses routed to a detector channel.
    pub const CONFIRMED_PULSES: Metric = Metric::counter("tagtrack.detection.confirmed_pulses")
        .with_description("Confirmed pulses routed to a detector channel")
        .with_labels(&["channel"]);

    /// Every metric, for [`describe_metrics`](super::describe_metrics).
    pub const ALL: &[Metric] = &[
        FRAMES_RECEIVED,
        FRAMES_DROPPED,
        COMMANDS_SENT,
        ACKS_RECEIVED,
        ACK_TIMEOUTS,
        ACK_DESYNCS,
        CONFIRMED_PULSES,
    ];
}

/// Describe every session metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
