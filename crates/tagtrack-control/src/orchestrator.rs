//! Tag upload and detection state machine.
//!
//! The orchestrator owns all session state: the catalog, the command link,
//! controller liveness, the detector channels and every timer. It is driven
//! from a single thread; each entry point takes the current time so timers
//! can be evaluated without a clock of its own.
//!
//! ```text
//! AwaitingController --first heartbeat--> UploadingTags --ack--> SendingTag(0)
//!     --ack--> SendingTag(1) ... --ack--> AwaitingEndTagsAck --ack--> TagsConfirmed
//!     --StartDetection sent--> DetectionRequested --ack--> Detecting
//! ```
//!
//! A failed ack from any state moves to `Aborted`.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tagtrack_catalog::{TagCatalog, TagDefinition};
use tagtrack_tunnel::{
    Ack, CommandId, ControllerStatus, Heartbeat, PulseInfo, TagInfo, TunnelCodec, TunnelMessage,
};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::detection::{ChannelSummary, DetectionTracker, PulseOutcome};
use crate::error::{SessionError, SessionResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::link::{AckOutcome, SequencedCommandLink};
use crate::observer::{LivenessSource, SessionObserver};
use crate::session_metrics::metric_defs;
use crate::timer::{TimerKey, TimerQueue};
use crate::transport::TunnelTransport;

// ============================================================================
// Phase
// ============================================================================

/// Where the session is in the upload and detection workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "tag_index", rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the controller before uploading tags.
    AwaitingController,
    /// StartTags sent.
    UploadingTags,
    /// Tag at this catalog index sent.
    SendingTag(usize),
    /// EndTags sent.
    AwaitingEndTagsAck,
    /// The detector holds the catalog.
    TagsConfirmed,
    /// StartDetection sent.
    DetectionRequested,
    /// The detector is detecting.
    Detecting,
    /// The detector rejected a command.
    Aborted,
}

impl Phase {
    /// Whether a tag upload is in flight.
    pub fn is_uploading(self) -> bool {
        matches!(
            self,
            Phase::UploadingTags | Phase::SendingTag(_) | Phase::AwaitingEndTagsAck
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::AwaitingController => write!(f, "awaiting controller"),
            Phase::UploadingTags => write!(f, "uploading tags"),
            Phase::SendingTag(index) => write!(f, "sending tag {}", index + 1),
            Phase::AwaitingEndTagsAck => write!(f, "awaiting end of tags"),
            Phase::TagsConfirmed => write!(f, "tags confirmed"),
            Phase::DetectionRequested => write!(f, "detection requested"),
            Phase::Detecting => write!(f, "detecting"),
            Phase::Aborted => write!(f, "aborted"),
        }
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Whether the controller is considered lost.
    pub controller_lost: bool,
    /// Last status the controller reported.
    pub controller_status: ControllerStatus,
    /// Workflow phase.
    pub phase: Phase,
    /// Command awaiting acknowledgment.
    pub expected_ack: Option<CommandId>,
    /// Number of tags in the loaded catalog.
    pub catalog_tags: usize,
    /// Detector channels.
    pub channels: Vec<ChannelSummary>,
    /// Whether the session has been stopped.
    pub stopped: bool,
}

/// Convert a catalog entry to its wire form. The channel plan is filled in
/// by the detector.
pub fn tag_info(tag: &TagDefinition) -> TagInfo {
    TagInfo {
        id: tag.id,
        frequency_hz: tag.frequency_hz,
        pulse_width_ms: tag.pulse_width_ms,
        intra_pulse1_ms: tag.intra_pulse1_ms,
        intra_pulse2_ms: tag.intra_pulse2_ms,
        ip_uncertainty_ms: tag.ip_uncertainty_ms,
        ip_jitter_ms: tag.ip_jitter_ms,
        k: tag.k,
        false_alarm_probability: tag.false_alarm_probability,
        ..Default::default()
    }
}

// ============================================================================
// Control Orchestrator
// ============================================================================

/// Drives one control session with the remote detector.
pub struct ControlOrchestrator {
    config: SessionConfig,
    catalog: Option<TagCatalog>,
    link: SequencedCommandLink,
    heartbeat: HeartbeatMonitor,
    tracker: DetectionTracker,
    timers: TimerQueue,
    observer: Box<dyn SessionObserver>,
    phase: Phase,
    stopped: bool,
}

impl ControlOrchestrator {
    /// Create a session sending through `transport` and reporting to `observer`.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn TunnelTransport>,
        observer: Box<dyn SessionObserver>,
    ) -> Self {
        let link = SequencedCommandLink::new(transport, config.ack_timeout());
        let heartbeat = HeartbeatMonitor::new(config.controller_heartbeat_window());
        ControlOrchestrator {
            config,
            catalog: None,
            link,
            heartbeat,
            tracker: DetectionTracker::new(),
            timers: TimerQueue::new(),
            observer,
            phase: Phase::AwaitingController,
            stopped: false,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Loaded catalog.
    pub fn catalog(&self) -> Option<&TagCatalog> {
        self.catalog.as_ref()
    }

    /// Command awaiting acknowledgment.
    pub fn expected_ack(&self) -> Option<CommandId> {
        self.link.expected_ack()
    }

    /// Whether the controller is considered lost.
    pub fn controller_lost(&self) -> bool {
        self.heartbeat.is_lost()
    }

    /// Detector channels.
    pub fn tracker(&self) -> &DetectionTracker {
        &self.tracker
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Replace the catalog.
    ///
    /// An upload in flight is abandoned and the workflow returns to waiting
    /// for [`send_tags`](Self::send_tags).
    pub fn load_catalog(&mut self, catalog: TagCatalog, now: Instant) -> SessionResult<()> {
        self.ensure_running()?;
        self.poll_timers(now);
        if self.phase.is_uploading() {
            warn!("Orchestrator: catalog replaced during upload, upload abandoned");
            self.link.reset(&mut self.timers);
        }
        info!("Orchestrator: catalog loaded with {} tags", catalog.len());
        self.catalog = Some(catalog);
        if self.phase != Phase::Aborted {
            self.set_phase(Phase::AwaitingController);
        }
        Ok(())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start uploading the catalog to the detector.
    pub fn send_tags(&mut self, now: Instant) -> SessionResult<()> {
        self.ensure_running()?;
        self.poll_timers(now);
        if self.catalog.as_ref().map_or(true, TagCatalog::is_empty) {
            return Err(SessionError::NoCatalog);
        }
        self.send(
            &TunnelMessage::StartTags {
                sdr_type: self.config.sdr_type,
            },
            now,
        )?;
        self.set_phase(Phase::UploadingTags);
        Ok(())
    }

    /// Ask the detector to start detecting at the catalog's tuned frequency.
    pub fn start_detection(&mut self, now: Instant) -> SessionResult<()> {
        self.ensure_running()?;
        self.poll_timers(now);
        self.send_start_detection(now)
    }

    /// Ask the detector to stop detecting.
    pub fn stop_detection(&mut self, now: Instant) -> SessionResult<()> {
        self.ensure_running()?;
        self.poll_timers(now);
        self.send(&TunnelMessage::StopDetection, now)
    }

    /// Ask the detector to record raw samples.
    pub fn raw_capture(&mut self, now: Instant) -> SessionResult<()> {
        self.ensure_running()?;
        self.poll_timers(now);
        self.send(
            &TunnelMessage::RawCapture {
                sdr_type: self.config.sdr_type,
            },
            now,
        )
    }

    /// Stop the session. Every timer is cancelled and later operations fail.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.link.reset(&mut self.timers);
        self.timers.cancel_all();
        self.stopped = true;
        info!("Orchestrator: stopped in phase {}", self.phase);
    }

    /// Point-in-time view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            controller_lost: self.heartbeat.is_lost(),
            controller_status: self.heartbeat.status(),
            phase: self.phase,
            expected_ack: self.link.expected_ack(),
            catalog_tags: self.catalog.as_ref().map_or(0, TagCatalog::len),
            channels: self.tracker.summaries(),
            stopped: self.stopped,
        }
    }

    // ========================================================================
    // Incoming Frames
    // ========================================================================

    /// Handle one payload received from the detector.
    ///
    /// Undecodable frames are dropped. An error is returned only when a send
    /// triggered by the frame fails or the detector rejected a command.
    pub fn process_incoming_frame(&mut self, payload: &[u8], now: Instant) -> SessionResult<()> {
        self.ensure_running()?;
        self.poll_timers(now);
        metrics::counter!(metric_defs::FRAMES_RECEIVED.name).increment(1);

        let message = match TunnelCodec::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Orchestrator: dropping frame: {}", e);
                metrics::counter!(metric_defs::FRAMES_DROPPED.name, "reason" => "decode").increment(1);
                return Ok(());
            }
        };

        match message {
            TunnelMessage::Ack(ack) => self.handle_ack(&ack, now),
            TunnelMessage::Heartbeat(heartbeat) => self.handle_heartbeat(&heartbeat, now),
            TunnelMessage::Pulse(pulse) => {
                self.handle_pulse(&pulse, now);
                Ok(())
            }
            other => {
                warn!("Orchestrator: unexpected {} from detector", other.command_id());
                metrics::counter!(metric_defs::FRAMES_DROPPED.name, "reason" => "unexpected").increment(1);
                Ok(())
            }
        }
    }

    fn handle_ack(&mut self, ack: &Ack, now: Instant) -> SessionResult<()> {
        let (command, result) = match self.link.on_ack(ack, &mut self.timers) {
            AckOutcome::Accepted { command, result } => (command, result),
            AckOutcome::Desync { .. } => return Ok(()),
        };

        if !result.is_success() {
            error!("Orchestrator: detector rejected {}", command);
            self.set_phase(Phase::Aborted);
            return Err(SessionError::CommandFailed { command });
        }
        debug!("Orchestrator: {} acknowledged", command);

        match command {
            CommandId::StartTags | CommandId::Tag => self.send_next_tag(now),
            CommandId::EndTags => self.confirm_tags(now),
            CommandId::StartDetection => {
                if matches!(self.phase, Phase::TagsConfirmed | Phase::DetectionRequested) {
                    self.set_phase(Phase::Detecting);
                }
                Ok(())
            }
            CommandId::StopDetection => {
                if matches!(self.phase, Phase::DetectionRequested | Phase::Detecting) {
                    self.set_phase(Phase::TagsConfirmed);
                }
                Ok(())
            }
            CommandId::RawCapture => {
                info!("Orchestrator: raw capture started");
                Ok(())
            }
            CommandId::Ack | CommandId::Pulse | CommandId::Heartbeat => Ok(()),
        }
    }

    fn send_next_tag(&mut self, now: Instant) -> SessionResult<()> {
        let index = match self.phase {
            Phase::UploadingTags => 0,
            Phase::SendingTag(previous) => previous + 1,
            phase => {
                debug!("Orchestrator: tag ack outside upload in phase {}", phase);
                return Ok(());
            }
        };

        let next = self
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.tag_at(index))
            .map(tag_info);
        match next {
            Some(info) => {
                debug!("Orchestrator: sending tag {} (id {})", index + 1, info.id);
                self.send(&TunnelMessage::Tag(info), now)?;
                self.set_phase(Phase::SendingTag(index));
            }
            None => {
                self.send(&TunnelMessage::EndTags, now)?;
                self.set_phase(Phase::AwaitingEndTagsAck);
            }
        }
        Ok(())
    }

    fn confirm_tags(&mut self, now: Instant) -> SessionResult<()> {
        if self.phase != Phase::AwaitingEndTagsAck {
            debug!("Orchestrator: end of tags ack in phase {}", self.phase);
            return Ok(());
        }
        self.set_phase(Phase::TagsConfirmed);

        if let Some(catalog) = &self.catalog {
            self.tracker.populate_from_catalog(catalog, &mut self.timers, now);
        }
        let channels = self.tracker.summaries();
        self.observer.channels_populated(&channels);

        self.send_start_detection(now)
    }

    fn send_start_detection(&mut self, now: Instant) -> SessionResult<()> {
        let radio_center_hz = self
            .catalog
            .as_ref()
            .and_then(TagCatalog::radio_center_hz)
            .ok_or(SessionError::NoCatalog)?;
        self.send(
            &TunnelMessage::StartDetection {
                radio_center_hz,
                sdr_type: self.config.sdr_type,
            },
            now,
        )?;
        if self.phase == Phase::TagsConfirmed {
            self.set_phase(Phase::DetectionRequested);
        }
        Ok(())
    }

    fn handle_heartbeat(&mut self, heartbeat: &Heartbeat, now: Instant) -> SessionResult<()> {
        let Some(update) = self.heartbeat.on_heartbeat(heartbeat, &mut self.timers, now) else {
            return Ok(());
        };
        if update.recovered {
            self.observer.liveness_changed(LivenessSource::Controller, false);
        }
        if !update.first_heartbeat {
            return Ok(());
        }

        if self.catalog.as_ref().map_or(true, TagCatalog::is_empty) {
            warn!("Orchestrator: controller is up but no tags are loaded");
            return Ok(());
        }
        info!("Orchestrator: controller is up, uploading tags");
        self.send_tags(now)
    }

    fn handle_pulse(&mut self, pulse: &PulseInfo, now: Instant) {
        let Some(catalog) = &self.catalog else {
            warn!("Orchestrator: pulse for {} with no tags loaded", pulse.tag_id);
            metrics::counter!(metric_defs::FRAMES_DROPPED.name, "reason" => "no_catalog").increment(1);
            return;
        };
        let known = catalog.get(pulse.tag_id & !1).is_some();
        debug!(
            "Orchestrator: pulse tag {} freq {} snr {:.1} confirmed {} known {}",
            pulse.tag_id,
            pulse.frequency_hz,
            pulse.snr,
            pulse.is_confirmed(),
            known
        );

        match self.tracker.handle_pulse(pulse, &mut self.timers, now) {
            PulseOutcome::Heartbeat {
                channel_id,
                recovered: true,
            } => {
                self.observer
                    .liveness_changed(LivenessSource::DetectorHeartbeat(channel_id), false);
            }
            PulseOutcome::Confirmed {
                channel_id,
                snr_changed,
                recovered,
            } => {
                if recovered {
                    self.observer
                        .liveness_changed(LivenessSource::PulseStale(channel_id), false);
                }
                if snr_changed {
                    if let Some(channel) = self.tracker.channel(channel_id) {
                        self.observer.channel_updated(&channel.summary());
                    }
                }
            }
            _ => {}
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Earliest pending timer deadline.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at or before `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        while let Some(key) = self.timers.pop_expired(now) {
            match key {
                TimerKey::AckTimeout => {
                    if let Some(command) = self.link.on_ack_timeout() {
                        self.observer.command_timed_out(command);
                    }
                }
                TimerKey::ControllerHeartbeat => {
                    if self.heartbeat.on_timeout() {
                        self.observer.liveness_changed(LivenessSource::Controller, true);
                    }
                }
                TimerKey::ChannelHeartbeat(channel_id) => {
                    if self.tracker.on_heartbeat_timeout(channel_id) {
                        self.observer
                            .liveness_changed(LivenessSource::DetectorHeartbeat(channel_id), true);
                    }
                }
                TimerKey::ChannelStale(channel_id) => {
                    if self.tracker.on_stale_timeout(channel_id) {
                        self.observer
                            .liveness_changed(LivenessSource::PulseStale(channel_id), true);
                    }
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn send(&mut self, message: &TunnelMessage, now: Instant) -> SessionResult<()> {
        self.link.send(message, &mut self.timers, now)
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        debug!("Orchestrator: {} -> {}", self.phase, phase);
        self.phase = phase;
        self.observer.phase_changed(phase);
    }

    fn ensure_running(&self) -> SessionResult<()> {
        if self.stopped {
            return Err(SessionError::Stopped);
        }
        Ok(())
    }
}
