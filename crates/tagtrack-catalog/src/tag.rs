//! Parsed tag definitions.

use serde::{Deserialize, Serialize};

/// Label used when an interval label is left empty.
pub const DEFAULT_INTERVAL_LABEL: &str = "-";

/// One configured RF tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDefinition {
    /// Tag id (even, greater than 1, unique within a catalog).
    pub id: u32,
    /// Display label, defaults to the id.
    pub label: String,
    /// Transmit frequency.
    pub frequency_hz: u32,
    /// Pulse width, nonzero.
    pub pulse_width_ms: u32,
    /// First intra-pulse interval, nonzero.
    pub intra_pulse1_ms: u32,
    /// Label for the first interval's channel.
    pub intra_pulse1_label: String,
    /// Second intra-pulse interval, zero for none.
    pub intra_pulse2_ms: u32,
    /// Label for the second interval's channel.
    pub intra_pulse2_label: String,
    /// Inter-pulse uncertainty, nonzero.
    pub ip_uncertainty_ms: u32,
    /// Inter-pulse jitter, nonzero.
    pub ip_jitter_ms: u32,
    /// Repeat count required for confirmation.
    pub k: u32,
    /// False alarm probability in [0, 1].
    pub false_alarm_probability: f64,
}

impl TagDefinition {
    /// Whether this tag spawns a second detector channel.
    pub fn has_second_interval(&self) -> bool {
        self.intra_pulse2_ms != 0
    }
}
