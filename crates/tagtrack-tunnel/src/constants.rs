//! Protocol constants
//!
//! Command ids, result codes and payload sizes shared by both ends of the
//! tunnel. Payload sizes exclude the leading 4 byte command id.

// ============================================================================
// Framing
// ============================================================================

/// Size of every tunnel frame handed to the transport. Unused bytes are zero.
pub const TUNNEL_FRAME_SIZE: usize = 128;

/// Size of the command id that prefixes every message.
pub const COMMAND_ID_SIZE: usize = 4;

// ============================================================================
// Command Ids
// ============================================================================

/// Acknowledgment of a previously sent command.
pub const COMMAND_ID_ACK: u32 = 1;
/// Previous tag set should be cleared, new tags are about to be uploaded.
pub const COMMAND_ID_START_TAGS: u32 = 2;
/// All new tags have been uploaded.
pub const COMMAND_ID_END_TAGS: u32 = 3;
/// A single tag definition.
pub const COMMAND_ID_TAG: u32 = 4;
/// Start pulse detection.
pub const COMMAND_ID_START_DETECTION: u32 = 5;
/// Stop pulse detection.
pub const COMMAND_ID_STOP_DETECTION: u32 = 6;
/// Detected pulse report (also used as a per-channel detector heartbeat).
pub const COMMAND_ID_PULSE: u32 = 7;
/// Capture raw SDR data.
pub const COMMAND_ID_RAW_CAPTURE: u32 = 8;
/// Periodic liveness report.
pub const COMMAND_ID_HEARTBEAT: u32 = 9;
// NOTE: ids 10 and 11 mark rotation start/stop in detector logs and are never sent.

// ============================================================================
// Ack Results
// ============================================================================

/// The acknowledged command failed.
pub const COMMAND_RESULT_FAILURE: u32 = 0;
/// The acknowledged command succeeded.
pub const COMMAND_RESULT_SUCCESS: u32 = 1;

// ============================================================================
// Heartbeat Values
// ============================================================================

/// Heartbeat sent by the onboard telemetry controller.
pub const HEARTBEAT_SYSTEM_ID_CONTROLLER: u16 = 1;
/// Heartbeat sent by the channelizer process.
pub const HEARTBEAT_SYSTEM_ID_CHANNELIZER: u16 = 2;

/// Waiting for tags to be sent.
pub const HEARTBEAT_STATUS_IDLE: u16 = 0;
/// In the middle of the tag receive sequence.
pub const HEARTBEAT_STATUS_RECEIVING_TAGS: u16 = 1;
/// Tags are known, waiting for detection start.
pub const HEARTBEAT_STATUS_HAS_TAGS: u16 = 2;
/// Detection is in progress.
pub const HEARTBEAT_STATUS_DETECTING: u16 = 3;
/// Capturing raw data.
pub const HEARTBEAT_STATUS_CAPTURE: u16 = 4;

// ============================================================================
// SDR Types
// ============================================================================

/// Airspy Mini receiver.
pub const SDR_TYPE_AIRSPY_MINI: u32 = 1;
/// Airspy HF+ receiver.
pub const SDR_TYPE_AIRSPY_HF: u32 = 2;

// ============================================================================
// Payload Sizes
// ============================================================================

/// command (4) + result (4)
pub const ACK_PAYLOAD_SIZE: usize = 8;
/// system_id (2) + status (2)
pub const HEARTBEAT_PAYLOAD_SIZE: usize = 4;
/// 2 x u32 + 4 x f64 + 2 x u16 + 2 x f64 + 2 x u8 + 3 x f64 + 4 x f32
pub const PULSE_PAYLOAD_SIZE: usize = 102;
/// sdr_type (4)
pub const START_TAGS_PAYLOAD_SIZE: usize = 4;
/// 8 x u32 + f64 + 2 x u32 + 4 x f64
pub const TAG_PAYLOAD_SIZE: usize = 80;
/// No fields.
pub const END_TAGS_PAYLOAD_SIZE: usize = 0;
/// radio_center_hz (4) + sdr_type (4)
pub const START_DETECTION_PAYLOAD_SIZE: usize = 8;
/// No fields.
pub const STOP_DETECTION_PAYLOAD_SIZE: usize = 0;
/// sdr_type (4)
pub const RAW_CAPTURE_PAYLOAD_SIZE: usize = 4;
