//! Threaded session runtime.
//!
//! The [`ControlOrchestrator`] lives on a single session thread and is only
//! reachable through a channel of [`SessionEvent`]s. Timers fire on that same
//! thread: it waits on the channel until the next timer deadline. A second
//! thread blocks on the transport, forwarding received frames into the channel
//! and sending keep-alives while the link is quiet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tagtrack_catalog::TagCatalog;
use tagtrack_tunnel::TunnelFrame;
use tracing::{debug, error, info, trace, warn};

use crate::error::{SessionError, SessionResult, TransportError};
use crate::orchestrator::{ControlOrchestrator, SessionSnapshot};
use crate::transport::TunnelTransport;

/// Default interval between keep-alives.
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 1000;

/// Default bound on a single blocking receive.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;

/// Settings for the receive thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveLoopConfig {
    /// Minimum time between keep-alives.
    pub keepalive_interval_ms: u64,
    /// Bound on one blocking receive.
    pub receive_timeout_ms: u64,
}

impl Default for ReceiveLoopConfig {
    fn default() -> Self {
        ReceiveLoopConfig {
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }
}

impl ReceiveLoopConfig {
    /// Minimum time between keep-alives.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Bound on one blocking receive.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Operations the supervising layer can request.
#[derive(Debug)]
pub enum SessionRequest {
    /// Upload the catalog.
    SendTags,
    /// Start detection.
    StartDetection,
    /// Stop detection.
    StopDetection,
    /// Record raw samples.
    RawCapture,
    /// Replace the catalog.
    LoadCatalog(TagCatalog),
}

/// Messages processed by the session thread.
#[derive(Debug)]
pub enum SessionEvent {
    /// A frame from the detector.
    Frame(TunnelFrame),
    /// A supervisor request and where to send its result.
    Request(SessionRequest, Sender<SessionResult<()>>),
    /// Ask for a snapshot.
    Snapshot(Sender<SessionSnapshot>),
    /// Shut the session down.
    Stop,
}

// ============================================================================
// Session Handle
// ============================================================================

/// Handle to a running session.
pub struct SessionHandle {
    events: Sender<SessionEvent>,
    stop_flag: Arc<AtomicBool>,
    session_thread: Option<JoinHandle<SessionResult<()>>>,
    receive_thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Upload the catalog to the detector.
    pub fn send_tags(&self) -> SessionResult<()> {
        self.request(SessionRequest::SendTags)
    }

    /// Start detection.
    pub fn start_detection(&self) -> SessionResult<()> {
        self.request(SessionRequest::StartDetection)
    }

    /// Stop detection.
    pub fn stop_detection(&self) -> SessionResult<()> {
        self.request(SessionRequest::StopDetection)
    }

    /// Record raw samples.
    pub fn raw_capture(&self) -> SessionResult<()> {
        self.request(SessionRequest::RawCapture)
    }

    /// Replace the catalog.
    pub fn load_catalog(&self, catalog: TagCatalog) -> SessionResult<()> {
        self.request(SessionRequest::LoadCatalog(catalog))
    }

    /// Current session state.
    pub fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.events
            .send(SessionEvent::Snapshot(reply_tx))
            .map_err(|_| SessionError::Stopped)?;
        reply_rx.recv().map_err(|_| SessionError::Stopped)
    }

    /// Whether the session thread has exited.
    pub fn is_finished(&self) -> bool {
        self.session_thread
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Stop the session and wait for both threads.
    ///
    /// Returns the error that ended the session, if it ended on its own.
    pub fn stop(mut self) -> SessionResult<()> {
        let _ = self.events.send(SessionEvent::Stop);
        self.finish()
    }

    /// Wait for the session to end on its own.
    pub fn join(mut self) -> SessionResult<()> {
        self.finish()
    }

    fn request(&self, request: SessionRequest) -> SessionResult<()> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.events
            .send(SessionEvent::Request(request, reply_tx))
            .map_err(|_| SessionError::Stopped)?;
        reply_rx.recv().map_err(|_| SessionError::Stopped)?
    }

    fn finish(&mut self) -> SessionResult<()> {
        let result = match self.session_thread.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!("Session: session thread panicked");
                Err(SessionError::Stopped)
            }),
            None => Ok(()),
        };
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.receive_thread.take() {
            if handle.join().is_err() {
                error!("Session: receive thread panicked");
            }
        }
        result
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = self.events.send(SessionEvent::Stop);
        // Threads exit on their own
    }
}

/// Run `orchestrator` on its own thread, receiving through `transport`.
pub fn spawn_session(
    orchestrator: ControlOrchestrator,
    transport: Arc<dyn TunnelTransport>,
    receive: ReceiveLoopConfig,
) -> std::io::Result<SessionHandle> {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let stop_flag = Arc::new(AtomicBool::new(false));

    let session_stop = Arc::clone(&stop_flag);
    let session_thread = thread::Builder::new()
        .name("tagtrack-session".to_string())
        .spawn(move || {
            let result = session_thread_main(orchestrator, events_rx);
            session_stop.store(true, Ordering::Relaxed);
            result
        })?;

    let receive_stop = Arc::clone(&stop_flag);
    let receive_events = events_tx.clone();
    let receive_thread = thread::Builder::new()
        .name("tagtrack-receive".to_string())
        .spawn(move || receive_thread_main(transport, receive, receive_events, receive_stop));

    let receive_thread = match receive_thread {
        Ok(handle) => handle,
        Err(e) => {
            let _ = events_tx.send(SessionEvent::Stop);
            let _ = session_thread.join();
            return Err(e);
        }
    };

    Ok(SessionHandle {
        events: events_tx,
        stop_flag,
        session_thread: Some(session_thread),
        receive_thread: Some(receive_thread),
    })
}

// ============================================================================
// Thread Bodies
// ============================================================================

/// Drains session events until stopped, firing timers as they come due.
fn session_thread_main(
    mut orchestrator: ControlOrchestrator,
    events: Receiver<SessionEvent>,
) -> SessionResult<()> {
    info!("Session: started");
    let result = loop {
        let received = match orchestrator.next_deadline() {
            Some(deadline) => events.recv_deadline(deadline),
            None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let event = match received {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                orchestrator.poll_timers(Instant::now());
                continue;
            }
            // All handles dropped
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        };

        // Timers due before this event fire first
        let now = Instant::now();
        orchestrator.poll_timers(now);

        match event {
            SessionEvent::Frame(frame) => {
                match orchestrator.process_incoming_frame(frame.payload(), now) {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => {
                        error!("Session: {}", e);
                        break Err(e);
                    }
                    Err(e) => warn!("Session: {}", e),
                }
            }
            SessionEvent::Request(request, reply) => {
                debug!("Session: request {:?}", request);
                let result = match request {
                    SessionRequest::SendTags => orchestrator.send_tags(now),
                    SessionRequest::StartDetection => orchestrator.start_detection(now),
                    SessionRequest::StopDetection => orchestrator.stop_detection(now),
                    SessionRequest::RawCapture => orchestrator.raw_capture(now),
                    SessionRequest::LoadCatalog(catalog) => orchestrator.load_catalog(catalog, now),
                };
                let _ = reply.send(result);
            }
            SessionEvent::Snapshot(reply) => {
                let _ = reply.send(orchestrator.snapshot());
            }
            SessionEvent::Stop => break Ok(()),
        }
    };
    orchestrator.stop();
    result
}

/// Blocks on the transport and forwards frames to the session thread.
fn receive_thread_main(
    transport: Arc<dyn TunnelTransport>,
    config: ReceiveLoopConfig,
    events: Sender<SessionEvent>,
    stop_flag: Arc<AtomicBool>,
) {
    let mut last_keepalive: Option<Instant> = None;

    while !stop_flag.load(Ordering::Relaxed) {
        if last_keepalive.map_or(true, |at| at.elapsed() >= config.keepalive_interval()) {
            if let Err(e) = transport.send_keepalive() {
                warn!("Receive: keep-alive failed: {}", e);
            }
            last_keepalive = Some(Instant::now());
        }

        match transport.recv_frame(config.receive_timeout()) {
            Ok(Some(frame)) => {
                trace!("Receive: frame of {} bytes", frame.payload_len());
                if events.send(SessionEvent::Frame(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(TransportError::Closed) => {
                info!("Receive: transport closed");
                break;
            }
            Err(e) => {
                warn!("Receive: {}", e);
                thread::sleep(config.receive_timeout());
            }
        }
    }
    debug!("Receive: exiting");
}
