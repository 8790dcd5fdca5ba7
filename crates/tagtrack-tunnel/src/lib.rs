//! Tag Detector Tunnel Protocol
//!
//! This crate provides the message types and binary codec for the control link
//! between a ground station and a remote RF tag detector. Messages travel as
//! opaque payloads inside the vehicle telemetry link's tunnel message, so every
//! message is a fixed-layout structure padded out to a 128 byte frame.
//!
//! # Protocol Overview
//!
//! Every message starts with a 4 byte little-endian command id followed by the
//! command specific fields, also little-endian with no interior padding:
//!
//! - **Commands** (ground → detector): `StartTags`, `Tag`, `EndTags`,
//!   `StartDetection`, `StopDetection`, `RawCapture`. Each is answered by an `Ack`.
//! - **Reports** (detector → ground): `Ack`, `Heartbeat`, `Pulse`
//!
//! The transport carries the true payload length alongside the padded frame;
//! the padding bytes are never interpreted.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagtrack_tunnel::{TunnelCodec, TunnelMessage, SdrType};
//!
//! let frame = TunnelCodec::encode(&TunnelMessage::StartTags { sdr_type: SdrType::AirspyMini })?;
//! assert_eq!(frame.as_bytes().len(), 128);
//!
//! let message = TunnelCodec::decode(frame.payload())?;
//! ```

mod constants;
mod error;
mod frame;
mod message;
mod types;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use message::*;
pub use types::*;
