//! UDP carriage for tunnel frames.
//!
//! Each datagram carries one frame prefixed by its payload length:
//!
//! ```text
//! +-------------+----------------------------------+
//! | payload_len | frame (128 bytes, zero padded)   |
//! | (u8)        |                                  |
//! +-------------+----------------------------------+
//! ```
//!
//! A datagram holding only a zero length byte is a keep-alive.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use parking_lot::Mutex;
use tagtrack_control::{TransportError, TunnelTransport};
use tagtrack_tunnel::{FrameError, TunnelFrame, TUNNEL_FRAME_SIZE};
use tracing::{debug, info, trace, warn};

/// Size of a full frame datagram.
pub const DATAGRAM_SIZE: usize = 1 + TUNNEL_FRAME_SIZE;

/// Keep-alive datagram.
pub const KEEPALIVE_DATAGRAM: [u8; 1] = [0];

/// Wrap a frame for the wire.
pub fn encode_datagram(frame: &TunnelFrame) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(DATAGRAM_SIZE);
    // Payloads never exceed the frame size, which fits in a byte
    datagram.push(frame.payload_len() as u8);
    datagram.extend_from_slice(frame.as_bytes());
    datagram
}

/// Unwrap a datagram. Keep-alives yield `Ok(None)`.
pub fn decode_datagram(datagram: &[u8]) -> Result<Option<TunnelFrame>, FrameError> {
    match datagram.split_first() {
        None => Ok(None),
        Some((0, [])) => Ok(None),
        Some((&payload_len, frame)) => TunnelFrame::from_received(frame, usize::from(payload_len)).map(Some),
    }
}

/// Tunnel transport over a UDP socket.
pub struct UdpTunnelTransport {
    socket: UdpSocket,
    remote: Mutex<Option<SocketAddr>>,
    learn_remote: bool,
}

impl UdpTunnelTransport {
    /// Bind `bind`. With no `remote`, replies go to whoever sent last.
    pub fn bind(bind: SocketAddr, remote: Option<SocketAddr>) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        info!(
            "Transport: listening on {}, remote {}",
            socket.local_addr()?,
            remote.map_or_else(|| "learned".to_string(), |addr| addr.to_string())
        );
        Ok(UdpTunnelTransport {
            socket,
            remote: Mutex::new(remote),
            learn_remote: remote.is_none(),
        })
    }

    /// Bound local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Current remote endpoint.
    pub fn remote(&self) -> Option<SocketAddr> {
        *self.remote.lock()
    }

    fn send_datagram(&self, datagram: &[u8]) -> Result<(), TransportError> {
        let remote = self.remote().ok_or_else(|| {
            TransportError::Io(io::Error::new(io::ErrorKind::NotConnected, "remote endpoint unknown"))
        })?;
        self.socket.send_to(datagram, remote)?;
        Ok(())
    }
}

impl TunnelTransport for UdpTunnelTransport {
    fn send_frame(&self, frame: &TunnelFrame) -> Result<(), TransportError> {
        let datagram = encode_datagram(frame);
        trace!("Transport: tx {}", hex::encode(&datagram[..1 + frame.payload_len()]));
        self.send_datagram(&datagram)
    }

    fn recv_frame(&self, timeout: Duration) -> Result<Option<TunnelFrame>, TransportError> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        let mut buf = [0u8; DATAGRAM_SIZE + 1];
        let (len, from) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if self.learn_remote {
            let mut remote = self.remote.lock();
            if *remote != Some(from) {
                debug!("Transport: remote is now {}", from);
                *remote = Some(from);
            }
        }

        let datagram = &buf[..len];
        trace!("Transport: rx {} bytes from {}", len, from);
        match decode_datagram(datagram) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("Transport: dropping datagram from {}: {}", from, e);
                Ok(None)
            }
        }
    }

    fn send_keepalive(&self) -> Result<(), TransportError> {
        if self.remote().is_none() {
            return Ok(());
        }
        self.send_datagram(&KEEPALIVE_DATAGRAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagtrack_tunnel::{SdrType, TunnelCodec, TunnelMessage};

    #[test]
    fn test_datagram_layout() {
        let frame = TunnelCodec::encode(&TunnelMessage::StartTags {
            sdr_type: SdrType::AirspyMini,
        })
        .unwrap();
        let datagram = encode_datagram(&frame);

        assert_eq!(datagram.len(), DATAGRAM_SIZE);
        assert_eq!(datagram[0], 8);
        assert_eq!(&datagram[1..5], &[2, 0, 0, 0]);
        assert!(datagram[9..].iter().all(|&b| b == 0));
        assert_eq!(decode_datagram(&datagram).unwrap(), Some(frame));
    }

    #[test]
    fn test_keepalive_datagram() {
        assert_eq!(decode_datagram(&KEEPALIVE_DATAGRAM).unwrap(), None);
        assert_eq!(decode_datagram(&[]).unwrap(), None);
    }

    #[test]
    fn test_trimmed_datagram_accepted() {
        let frame = TunnelCodec::encode(&TunnelMessage::EndTags).unwrap();
        let decoded = decode_datagram(&[4, 3, 0, 0, 0]).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_length_beyond_datagram_rejected() {
        assert!(matches!(
            decode_datagram(&[12, 1, 0, 0, 0]),
            Err(FrameError::LengthExceedsFrame { declared: 12, received: 4 })
        ));
    }
}
