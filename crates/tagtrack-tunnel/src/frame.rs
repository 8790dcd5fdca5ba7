//! Padded tunnel frames.
//!
//! The telemetry tunnel only carries fixed size payloads, so every message is
//! zero padded to [`TUNNEL_FRAME_SIZE`] bytes and the true length travels
//! next to it.
//!
//! ```text
//! +-------------+---------------------+------------------------+
//! | command id  | command fields      | zero padding           |
//! | (u32 LE)    | (payload_len - 4)   | (128 - payload_len)    |
//! +-------------+---------------------+------------------------+
//! ```

use crate::constants::TUNNEL_FRAME_SIZE;
use crate::error::{DecodeError, FrameError};
use crate::message::TunnelMessage;

/// A fixed size tunnel frame plus the length of its meaningful prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelFrame {
    bytes: [u8; TUNNEL_FRAME_SIZE],
    payload_len: usize,
}

impl TunnelFrame {
    /// Pad an encoded message out to a full frame.
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > TUNNEL_FRAME_SIZE {
            return Err(FrameError::PayloadTooLarge {
                max: TUNNEL_FRAME_SIZE,
                actual: payload.len(),
            });
        }
        let mut bytes = [0u8; TUNNEL_FRAME_SIZE];
        bytes[..payload.len()].copy_from_slice(payload);
        Ok(TunnelFrame {
            bytes,
            payload_len: payload.len(),
        })
    }

    /// Accept a frame as delivered by the transport.
    ///
    /// `received` may be shorter than a full frame if the transport trimmed
    /// the padding; it must still cover `payload_len` bytes.
    pub fn from_received(received: &[u8], payload_len: usize) -> Result<Self, FrameError> {
        if payload_len > TUNNEL_FRAME_SIZE {
            return Err(FrameError::PayloadTooLarge {
                max: TUNNEL_FRAME_SIZE,
                actual: payload_len,
            });
        }
        if payload_len > received.len() {
            return Err(FrameError::LengthExceedsFrame {
                declared: payload_len,
                received: received.len(),
            });
        }
        Self::from_payload(&received[..payload_len])
    }

    /// The whole padded frame.
    pub fn as_bytes(&self) -> &[u8; TUNNEL_FRAME_SIZE] {
        &self.bytes
    }

    /// The meaningful prefix of the frame.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.payload_len]
    }

    /// Length of the meaningful prefix.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}

impl std::fmt::Debug for TunnelFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelFrame")
            .field("payload", &self.payload())
            .finish()
    }
}

/// Translates between typed messages and padded frames.
///
/// Purely a format translation; sequencing and retries live with the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct TunnelCodec;

impl TunnelCodec {
    /// Encode a message into a padded frame.
    pub fn encode(message: &TunnelMessage) -> Result<TunnelFrame, FrameError> {
        let payload = message.encode();
        log::trace!(
            "TunnelCodec: encoded {} ({} bytes)",
            message.command_id(),
            payload.len()
        );
        TunnelFrame::from_payload(&payload)
    }

    /// Decode the meaningful prefix of a received frame.
    pub fn decode(payload: &[u8]) -> Result<TunnelMessage, DecodeError> {
        TunnelMessage::decode(payload)
    }
}
