//! Common types used in the tunnel protocol.

use crate::constants::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kinds of message that can travel through the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
#[repr(u32)]
pub enum CommandId {
    /// Acknowledgment of a command.
    Ack = COMMAND_ID_ACK,
    /// Begin a tag upload.
    StartTags = COMMAND_ID_START_TAGS,
    /// Finish a tag upload.
    EndTags = COMMAND_ID_END_TAGS,
    /// One tag definition.
    Tag = COMMAND_ID_TAG,
    /// Start pulse detection.
    StartDetection = COMMAND_ID_START_DETECTION,
    /// Stop pulse detection.
    StopDetection = COMMAND_ID_STOP_DETECTION,
    /// Pulse report.
    Pulse = COMMAND_ID_PULSE,
    /// Raw SDR capture.
    RawCapture = COMMAND_ID_RAW_CAPTURE,
    /// Liveness report.
    Heartbeat = COMMAND_ID_HEARTBEAT,
}

impl CommandId {
    /// Look up a command id, returning `None` for ids this protocol does not define.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            COMMAND_ID_ACK => Some(CommandId::Ack),
            COMMAND_ID_START_TAGS => Some(CommandId::StartTags),
            COMMAND_ID_END_TAGS => Some(CommandId::EndTags),
            COMMAND_ID_TAG => Some(CommandId::Tag),
            COMMAND_ID_START_DETECTION => Some(CommandId::StartDetection),
            COMMAND_ID_STOP_DETECTION => Some(CommandId::StopDetection),
            COMMAND_ID_PULSE => Some(CommandId::Pulse),
            COMMAND_ID_RAW_CAPTURE => Some(CommandId::RawCapture),
            COMMAND_ID_HEARTBEAT => Some(CommandId::Heartbeat),
            _ => None,
        }
    }

    /// The numeric id written on the wire.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Size of the payload that follows the command id.
    pub const fn payload_size(self) -> usize {
        match self {
            CommandId::Ack => ACK_PAYLOAD_SIZE,
            CommandId::StartTags => START_TAGS_PAYLOAD_SIZE,
            CommandId::EndTags => END_TAGS_PAYLOAD_SIZE,
            CommandId::Tag => TAG_PAYLOAD_SIZE,
            CommandId::StartDetection => START_DETECTION_PAYLOAD_SIZE,
            CommandId::StopDetection => STOP_DETECTION_PAYLOAD_SIZE,
            CommandId::Pulse => PULSE_PAYLOAD_SIZE,
            CommandId::RawCapture => RAW_CAPTURE_PAYLOAD_SIZE,
            CommandId::Heartbeat => HEARTBEAT_PAYLOAD_SIZE,
        }
    }

    /// Short name used in logs and metric labels.
    pub const fn name(self) -> &'static str {
        match self {
            CommandId::Ack => "ack",
            CommandId::StartTags => "start_tags",
            CommandId::EndTags => "end_tags",
            CommandId::Tag => "tag",
            CommandId::StartDetection => "start_detection",
            CommandId::StopDetection => "stop_detection",
            CommandId::Pulse => "pulse",
            CommandId::RawCapture => "raw_capture",
            CommandId::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result carried by an [`Ack`].
///
/// Any value other than [`COMMAND_RESULT_SUCCESS`] is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    /// Command failed on the detector.
    Failure,
    /// Command succeeded.
    Success,
}

impl CommandResult {
    /// Whether the command succeeded.
    pub fn is_success(self) -> bool {
        self == CommandResult::Success
    }
}

impl From<u32> for CommandResult {
    fn from(code: u32) -> Self {
        match code {
            COMMAND_RESULT_SUCCESS => CommandResult::Success,
            _ => CommandResult::Failure,
        }
    }
}

impl From<CommandResult> for u32 {
    fn from(result: CommandResult) -> Self {
        match result {
            CommandResult::Success => COMMAND_RESULT_SUCCESS,
            CommandResult::Failure => COMMAND_RESULT_FAILURE,
        }
    }
}

/// Originator of a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemId {
    /// The onboard telemetry controller.
    Controller,
    /// The channelizer process.
    Channelizer,
    /// Unknown originator.
    Unknown(u16),
}

impl From<u16> for SystemId {
    fn from(value: u16) -> Self {
        match value {
            HEARTBEAT_SYSTEM_ID_CONTROLLER => SystemId::Controller,
            HEARTBEAT_SYSTEM_ID_CHANNELIZER => SystemId::Channelizer,
            _ => SystemId::Unknown(value),
        }
    }
}

impl From<SystemId> for u16 {
    fn from(id: SystemId) -> Self {
        match id {
            SystemId::Controller => HEARTBEAT_SYSTEM_ID_CONTROLLER,
            SystemId::Channelizer => HEARTBEAT_SYSTEM_ID_CHANNELIZER,
            SystemId::Unknown(value) => value,
        }
    }
}

/// Status reported in a controller heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControllerStatus {
    /// Waiting for tags to be sent.
    #[default]
    Idle,
    /// In the middle of the tag receive sequence.
    ReceivingTags,
    /// Tags are known, waiting for detection start.
    HasTags,
    /// Detection is in progress.
    Detecting,
    /// Capturing raw data.
    Capturing,
    /// Status code this protocol version does not define.
    Unknown(u16),
}

impl From<u16> for ControllerStatus {
    fn from(value: u16) -> Self {
        match value {
            HEARTBEAT_STATUS_IDLE => ControllerStatus::Idle,
            HEARTBEAT_STATUS_RECEIVING_TAGS => ControllerStatus::ReceivingTags,
            HEARTBEAT_STATUS_HAS_TAGS => ControllerStatus::HasTags,
            HEARTBEAT_STATUS_DETECTING => ControllerStatus::Detecting,
            HEARTBEAT_STATUS_CAPTURE => ControllerStatus::Capturing,
            _ => ControllerStatus::Unknown(value),
        }
    }
}

impl From<ControllerStatus> for u16 {
    fn from(status: ControllerStatus) -> Self {
        match status {
            ControllerStatus::Idle => HEARTBEAT_STATUS_IDLE,
            ControllerStatus::ReceivingTags => HEARTBEAT_STATUS_RECEIVING_TAGS,
            ControllerStatus::HasTags => HEARTBEAT_STATUS_HAS_TAGS,
            ControllerStatus::Detecting => HEARTBEAT_STATUS_DETECTING,
            ControllerStatus::Capturing => HEARTBEAT_STATUS_CAPTURE,
            ControllerStatus::Unknown(value) => value,
        }
    }
}

/// Receiver hardware the detector should drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SdrType {
    /// Airspy Mini.
    #[default]
    AirspyMini,
    /// Airspy HF+.
    AirspyHf,
    /// Type code this protocol version does not define.
    Unknown(u32),
}

impl From<u32> for SdrType {
    fn from(value: u32) -> Self {
        match value {
            SDR_TYPE_AIRSPY_MINI => SdrType::AirspyMini,
            SDR_TYPE_AIRSPY_HF => SdrType::AirspyHf,
            _ => SdrType::Unknown(value),
        }
    }
}

impl From<SdrType> for u32 {
    fn from(sdr: SdrType) -> Self {
        match sdr {
            SdrType::AirspyMini => SDR_TYPE_AIRSPY_MINI,
            SdrType::AirspyHf => SDR_TYPE_AIRSPY_HF,
            SdrType::Unknown(value) => value,
        }
    }
}

// ============================================================================
// Message Payloads
// ============================================================================

/// Acknowledgment of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Raw id of the command being acknowledged.
    pub command: u32,
    /// Outcome of the command.
    pub result: CommandResult,
}

impl Ack {
    /// The acknowledged command, if it is one this protocol defines.
    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::from_u32(self.command)
    }
}

/// Liveness report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Who sent the heartbeat.
    pub system_id: SystemId,
    /// Reported status (meaningful for controller heartbeats).
    pub status: ControllerStatus,
}

/// Vehicle position at pulse time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

/// Vehicle attitude quaternion at pulse time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// W component.
    pub w: f32,
}

/// A pulse report from one detector channel.
///
/// A report with `frequency_hz == 0` is a detector heartbeat rather than a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PulseInfo {
    /// Channel id (tag id, or tag id + 1 for the second interval).
    pub tag_id: u32,
    /// Pulse frequency, zero for a detector heartbeat.
    pub frequency_hz: u32,
    /// Pulse start time in seconds.
    pub start_time_s: f64,
    /// Predicted start time of the next pulse in seconds.
    pub predicted_next_start_s: f64,
    /// Signal-to-noise ratio of this pulse.
    pub snr: f64,
    /// Short-time Fourier transform score.
    pub stft_score: f64,
    /// Sequence counter of the pulse group this pulse belongs to.
    pub group_seq_counter: u16,
    /// Index of the pulse within its group.
    pub group_index: u16,
    /// Signal-to-noise ratio of the whole group.
    pub group_snr: f64,
    /// Noise power spectral density.
    pub noise_psd: f64,
    /// Raw detection status.
    pub detection_status: u8,
    /// Nonzero once the detector has confirmed the pulse group.
    pub confirmed_status: u8,
    /// Vehicle position.
    pub position: Position,
    /// Vehicle orientation.
    pub orientation: Orientation,
}

impl PulseInfo {
    /// Whether this report is a detector heartbeat.
    pub fn is_detector_heartbeat(&self) -> bool {
        self.frequency_hz == 0
    }

    /// Whether the detector confirmed the pulse group.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_status != 0
    }
}

/// Channelizer plan fields carried with each tag.
///
/// Written as zero unless a tuner fills them in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelPlan {
    /// Channelizer channel number.
    pub channel_number: u32,
    /// Center frequency of that channel.
    pub channel_center_frequency_hz: u32,
    /// Mean of the first intra-pulse interval distribution.
    pub ip1_mu: f64,
    /// Deviation of the first intra-pulse interval distribution.
    pub ip1_sigma: f64,
    /// Mean of the second intra-pulse interval distribution.
    pub ip2_mu: f64,
    /// Deviation of the second intra-pulse interval distribution.
    pub ip2_sigma: f64,
}

/// A tag definition as uploaded to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TagInfo {
    /// Tag id (even, greater than 1).
    pub id: u32,
    /// Tag transmit frequency.
    pub frequency_hz: u32,
    /// Pulse width.
    pub pulse_width_ms: u32,
    /// First intra-pulse interval.
    pub intra_pulse1_ms: u32,
    /// Second intra-pulse interval, zero when the tag has none.
    pub intra_pulse2_ms: u32,
    /// Intra-pulse uncertainty.
    pub ip_uncertainty_ms: u32,
    /// Intra-pulse jitter.
    pub ip_jitter_ms: u32,
    /// Repeat count required for confirmation.
    pub k: u32,
    /// Tolerated false alarm probability.
    pub false_alarm_probability: f64,
    /// Channelizer plan.
    pub channel_plan: ChannelPlan,
}
