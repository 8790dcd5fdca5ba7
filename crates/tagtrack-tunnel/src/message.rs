//! Typed tunnel messages and their fixed binary layouts.
//!
//! Each message is the 4 byte command id followed by its fields in declaration
//! order, all little-endian, with no padding between fields.

use bytes::{Buf, BufMut};

use crate::constants::*;
use crate::error::DecodeError;
use crate::types::*;

/// A message carried through the tunnel, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum TunnelMessage {
    /// Acknowledgment of the outstanding command.
    Ack(Ack),

    /// Liveness report from the controller or channelizer.
    Heartbeat(Heartbeat),

    /// Pulse report (or detector heartbeat when `frequency_hz` is zero).
    Pulse(PulseInfo),

    /// Clear the detector's tag set and begin a new upload.
    StartTags {
        /// Receiver hardware in use.
        sdr_type: SdrType,
    },

    /// One tag definition.
    Tag(TagInfo),

    /// All tags have been uploaded.
    EndTags,

    /// Start pulse detection.
    StartDetection {
        /// Frequency to tune the receiver to.
        radio_center_hz: u32,
        /// Receiver hardware in use.
        sdr_type: SdrType,
    },

    /// Stop pulse detection.
    StopDetection,

    /// Capture raw receiver samples.
    RawCapture {
        /// Receiver hardware in use.
        sdr_type: SdrType,
    },
}

impl TunnelMessage {
    /// The command id this message is sent under.
    pub fn command_id(&self) -> CommandId {
        match self {
            TunnelMessage::Ack(_) => CommandId::Ack,
            TunnelMessage::Heartbeat(_) => CommandId::Heartbeat,
            TunnelMessage::Pulse(_) => CommandId::Pulse,
            TunnelMessage::StartTags { .. } => CommandId::StartTags,
            TunnelMessage::Tag(_) => CommandId::Tag,
            TunnelMessage::EndTags => CommandId::EndTags,
            TunnelMessage::StartDetection { .. } => CommandId::StartDetection,
            TunnelMessage::StopDetection => CommandId::StopDetection,
            TunnelMessage::RawCapture { .. } => CommandId::RawCapture,
        }
    }

    /// Encode the message to its unpadded wire form.
    pub fn encode(&self) -> Vec<u8> {
        let command = self.command_id();
        let mut buf = Vec::with_capacity(COMMAND_ID_SIZE + command.payload_size());
        buf.put_u32_le(command.as_u32());

        match self {
            TunnelMessage::Ack(ack) => {
                buf.put_u32_le(ack.command);
                buf.put_u32_le(ack.result.into());
            }

            TunnelMessage::Heartbeat(heartbeat) => {
                buf.put_u16_le(heartbeat.system_id.into());
                buf.put_u16_le(heartbeat.status.into());
            }

            TunnelMessage::Pulse(pulse) => {
                buf.put_u32_le(pulse.tag_id);
                buf.put_u32_le(pulse.frequency_hz);
                buf.put_f64_le(pulse.start_time_s);
                buf.put_f64_le(pulse.predicted_next_start_s);
                buf.put_f64_le(pulse.snr);
                buf.put_f64_le(pulse.stft_score);
                buf.put_u16_le(pulse.group_seq_counter);
                buf.put_u16_le(pulse.group_index);
                buf.put_f64_le(pulse.group_snr);
                buf.put_f64_le(pulse.noise_psd);
                buf.put_u8(pulse.detection_status);
                buf.put_u8(pulse.confirmed_status);
                buf.put_f64_le(pulse.position.x);
                buf.put_f64_le(pulse.position.y);
                buf.put_f64_le(pulse.position.z);
                buf.put_f32_le(pulse.orientation.x);
                buf.put_f32_le(pulse.orientation.y);
                buf.put_f32_le(pulse.orientation.z);
                buf.put_f32_le(pulse.orientation.w);
            }

            TunnelMessage::StartTags { sdr_type } | TunnelMessage::RawCapture { sdr_type } => {
                buf.put_u32_le((*sdr_type).into());
            }

            TunnelMessage::Tag(tag) => {
                buf.put_u32_le(tag.id);
                buf.put_u32_le(tag.frequency_hz);
                buf.put_u32_le(tag.pulse_width_ms);
                buf.put_u32_le(tag.intra_pulse1_ms);
                buf.put_u32_le(tag.intra_pulse2_ms);
                buf.put_u32_le(tag.ip_uncertainty_ms);
                buf.put_u32_le(tag.ip_jitter_ms);
                buf.put_u32_le(tag.k);
                buf.put_f64_le(tag.false_alarm_probability);
                buf.put_u32_le(tag.channel_plan.channel_number);
                buf.put_u32_le(tag.channel_plan.channel_center_frequency_hz);
                buf.put_f64_le(tag.channel_plan.ip1_mu);
                buf.put_f64_le(tag.channel_plan.ip1_sigma);
                buf.put_f64_le(tag.channel_plan.ip2_mu);
                buf.put_f64_le(tag.channel_plan.ip2_sigma);
            }

            TunnelMessage::StartDetection {
                radio_center_hz,
                sdr_type,
            } => {
                buf.put_u32_le(*radio_center_hz);
                buf.put_u32_le((*sdr_type).into());
            }

            TunnelMessage::EndTags | TunnelMessage::StopDetection => {}
        }

        buf
    }

    /// Decode a message from the meaningful prefix of a frame.
    ///
    /// The bytes after the command id must be exactly the size of the
    /// command's layout.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() < COMMAND_ID_SIZE {
            return Err(DecodeError::FrameTooShort {
                expected: COMMAND_ID_SIZE,
                actual: frame.len(),
            });
        }

        let mut buf = frame;
        let raw_command = buf.get_u32_le();
        let command = CommandId::from_u32(raw_command).ok_or(DecodeError::UnknownCommand(raw_command))?;

        if buf.remaining() != command.payload_size() {
            return Err(DecodeError::SizeMismatch {
                command: command.name(),
                expected: command.payload_size(),
                actual: buf.remaining(),
            });
        }

        let message = match command {
            CommandId::Ack => TunnelMessage::Ack(Ack {
                command: buf.get_u32_le(),
                result: CommandResult::from(buf.get_u32_le()),
            }),

            CommandId::Heartbeat => TunnelMessage::Heartbeat(Heartbeat {
                system_id: SystemId::from(buf.get_u16_le()),
                status: ControllerStatus::from(buf.get_u16_le()),
            }),

            CommandId::Pulse => TunnelMessage::Pulse(decode_pulse(&mut buf)),

            CommandId::StartTags => TunnelMessage::StartTags {
                sdr_type: SdrType::from(buf.get_u32_le()),
            },

            CommandId::Tag => TunnelMessage::Tag(decode_tag(&mut buf)),

            CommandId::EndTags => TunnelMessage::EndTags,

            CommandId::StartDetection => TunnelMessage::StartDetection {
                radio_center_hz: buf.get_u32_le(),
                sdr_type: SdrType::from(buf.get_u32_le()),
            },

            CommandId::StopDetection => TunnelMessage::StopDetection,

            CommandId::RawCapture => TunnelMessage::RawCapture {
                sdr_type: SdrType::from(buf.get_u32_le()),
            },
        };

        Ok(message)
    }
}

// Callers have already checked the remaining length against the layout size.
fn decode_pulse(buf: &mut &[u8]) -> PulseInfo {
    PulseInfo {
        tag_id: buf.get_u32_le(),
        frequency_hz: buf.get_u32_le(),
        start_time_s: buf.get_f64_le(),
        predicted_next_start_s: buf.get_f64_le(),
        snr: buf.get_f64_le(),
        stft_score: buf.get_f64_le(),
        group_seq_counter: buf.get_u16_le(),
        group_index: buf.get_u16_le(),
        group_snr: buf.get_f64_le(),
        noise_psd: buf.get_f64_le(),
        detection_status: buf.get_u8(),
        confirmed_status: buf.get_u8(),
        position: Position {
            x: buf.get_f64_le(),
            y: buf.get_f64_le(),
            z: buf.get_f64_le(),
        },
        orientation: Orientation {
            x: buf.get_f32_le(),
            y: buf.get_f32_le(),
            z: buf.get_f32_le(),
            w: buf.get_f32_le(),
        },
    }
}

fn decode_tag(buf: &mut &[u8]) -> TagInfo {
    TagInfo {
        id: buf.get_u32_le(),
        frequency_hz: buf.get_u32_le(),
        pulse_width_ms: buf.get_u32_le(),
        intra_pulse1_ms: buf.get_u32_le(),
        intra_pulse2_ms: buf.get_u32_le(),
        ip_uncertainty_ms: buf.get_u32_le(),
        ip_jitter_ms: buf.get_u32_le(),
        k: buf.get_u32_le(),
        false_alarm_probability: buf.get_f64_le(),
        channel_plan: ChannelPlan {
            channel_number: buf.get_u32_le(),
            channel_center_frequency_hz: buf.get_u32_le(),
            ip1_mu: buf.get_f64_le(),
            ip1_sigma: buf.get_f64_le(),
            ip2_mu: buf.get_f64_le(),
            ip2_sigma: buf.get_f64_le(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat_bytes(system_id: u16, status: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u32_le(COMMAND_ID_HEARTBEAT);
        buf.put_u16_le(system_id);
        buf.put_u16_le(status);
        buf
    }

    #[test]
    fn test_encoded_sizes_match_layouts() {
        let cases = [
            TunnelMessage::Ack(Ack { command: 2, result: CommandResult::Success }),
            TunnelMessage::Heartbeat(Heartbeat {
                system_id: SystemId::Controller,
                status: ControllerStatus::Idle,
            }),
            TunnelMessage::Pulse(PulseInfo::default()),
            TunnelMessage::StartTags { sdr_type: SdrType::AirspyMini },
            TunnelMessage::Tag(TagInfo::default()),
            TunnelMessage::EndTags,
            TunnelMessage::StartDetection { radio_center_hz: 0, sdr_type: SdrType::AirspyMini },
            TunnelMessage::StopDetection,
            TunnelMessage::RawCapture { sdr_type: SdrType::AirspyHf },
        ];

        for message in &cases {
            let encoded = message.encode();
            assert_eq!(
                encoded.len(),
                COMMAND_ID_SIZE + message.command_id().payload_size(),
                "wrong size for {:?}",
                message.command_id()
            );
            assert!(encoded.len() <= TUNNEL_FRAME_SIZE);
        }
    }

    #[test]
    fn test_decode_heartbeat() {
        let message = TunnelMessage::decode(&heartbeat_bytes(1, 3)).expect("should decode");
        assert_eq!(
            message,
            TunnelMessage::Heartbeat(Heartbeat {
                system_id: SystemId::Controller,
                status: ControllerStatus::Detecting,
            })
        );
    }

    #[test]
    fn test_decode_heartbeat_wrong_size() {
        let mut bytes = heartbeat_bytes(1, 0);
        bytes.push(0);
        assert_eq!(
            TunnelMessage::decode(&bytes),
            Err(DecodeError::SizeMismatch {
                command: "heartbeat",
                expected: HEARTBEAT_PAYLOAD_SIZE,
                actual: HEARTBEAT_PAYLOAD_SIZE + 1,
            })
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let bytes = 10u32.to_le_bytes();
        assert_eq!(TunnelMessage::decode(&bytes), Err(DecodeError::UnknownCommand(10)));
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(
            TunnelMessage::decode(&[1, 0]),
            Err(DecodeError::FrameTooShort { expected: 4, actual: 2 })
        );
    }

    #[test]
    fn test_ack_layout() {
        let encoded = TunnelMessage::Ack(Ack { command: COMMAND_ID_END_TAGS, result: CommandResult::Failure }).encode();
        assert_eq!(encoded, vec![1, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_pulse_field_offsets() {
        let pulse = PulseInfo {
            tag_id: 4,
            frequency_hz: 146_000_000,
            snr: 7.5,
            group_seq_counter: 0x0102,
            confirmed_status: 1,
            orientation: Orientation { w: 1.0, ..Default::default() },
            ..Default::default()
        };
        let encoded = TunnelMessage::Pulse(pulse).encode();

        assert_eq!(&encoded[4..8], &4u32.to_le_bytes());
        assert_eq!(&encoded[8..12], &146_000_000u32.to_le_bytes());
        // snr follows start_time and predicted_next_start
        assert_eq!(&encoded[28..36], &7.5f64.to_le_bytes());
        assert_eq!(&encoded[44..46], &0x0102u16.to_le_bytes());
        // confirmed_status sits right after detection_status
        assert_eq!(encoded[65], 1);
        assert_eq!(&encoded[102..106], &1.0f32.to_le_bytes());

        assert_eq!(TunnelMessage::decode(&encoded), Ok(TunnelMessage::Pulse(pulse)));
    }

    #[test]
    fn test_tag_reserved_fields_default_to_zero() {
        let tag = TagInfo {
            id: 6,
            frequency_hz: 150_000_000,
            pulse_width_ms: 15,
            intra_pulse1_ms: 1000,
            intra_pulse2_ms: 0,
            ip_uncertainty_ms: 60,
            ip_jitter_ms: 20,
            k: 4,
            false_alarm_probability: 0.01,
            channel_plan: ChannelPlan::default(),
        };
        let encoded = TunnelMessage::Tag(tag).encode();
        assert!(encoded[44..].iter().all(|&b| b == 0));
        assert_eq!(&encoded[36..44], &0.01f64.to_le_bytes());
    }
}
