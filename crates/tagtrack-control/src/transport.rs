//! Transport seam between the session and the vehicle telemetry link.

use std::time::Duration;

use tagtrack_tunnel::TunnelFrame;

use crate::error::TransportError;

/// Carries tunnel frames to and from the remote detector.
///
/// Implementations move the padded 128 byte frame together with its true
/// payload length. `send_frame` is called from the session thread while
/// `recv_frame` blocks on the receive thread, so both must be callable
/// through a shared reference.
pub trait TunnelTransport: Send + Sync {
    /// Send one frame to the detector.
    fn send_frame(&self, frame: &TunnelFrame) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next frame.
    ///
    /// Returns `Ok(None)` when the timeout elapses without traffic.
    fn recv_frame(&self, timeout: Duration) -> Result<Option<TunnelFrame>, TransportError>;

    /// Keep the underlying link open while no commands are flowing.
    fn send_keepalive(&self) -> Result<(), TransportError>;
}
