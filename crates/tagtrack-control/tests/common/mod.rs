//! Shared helpers for session tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tagtrack_catalog::{parse_catalog, CatalogSettings, TagCatalog};
use tagtrack_control::{
    ChannelSummary, LivenessSource, Phase, SessionObserver, TransportError, TunnelTransport,
};
use tagtrack_tunnel::{
    Ack, CommandId, CommandResult, ControllerStatus, Heartbeat, PulseInfo, SystemId, TunnelCodec,
    TunnelFrame, TunnelMessage,
};

// ============================================================================
// Transport
// ============================================================================

/// Transport that records every sent frame and replays scripted inbound frames.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<TunnelFrame>>,
    keepalives: Mutex<usize>,
    inbound: Option<Receiver<TunnelFrame>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbound(inbound: Receiver<TunnelFrame>) -> Self {
        RecordingTransport {
            inbound: Some(inbound),
            ..Default::default()
        }
    }

    /// Every sent message, decoded.
    pub fn sent(&self) -> Vec<TunnelMessage> {
        self.sent
            .lock()
            .iter()
            .map(|frame| TunnelCodec::decode(frame.payload()).unwrap())
            .collect()
    }

    /// Command ids of every sent message.
    pub fn sent_commands(&self) -> Vec<CommandId> {
        self.sent().iter().map(TunnelMessage::command_id).collect()
    }

    pub fn keepalives(&self) -> usize {
        *self.keepalives.lock()
    }
}

impl TunnelTransport for RecordingTransport {
    fn send_frame(&self, frame: &TunnelFrame) -> Result<(), TransportError> {
        self.sent.lock().push(frame.clone());
        Ok(())
    }

    fn recv_frame(&self, timeout: Duration) -> Result<Option<TunnelFrame>, TransportError> {
        let Some(inbound) = &self.inbound else {
            std::thread::sleep(timeout);
            return Ok(None);
        };
        match inbound.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn send_keepalive(&self) -> Result<(), TransportError> {
        *self.keepalives.lock() += 1;
        Ok(())
    }
}

// ============================================================================
// Observer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Liveness(LivenessSource, bool),
    Populated(Vec<ChannelSummary>),
    Updated(ChannelSummary),
    Phase(Phase),
    TimedOut(CommandId),
}

/// Observer that records notifications into a shared list.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    notes: Arc<Mutex<Vec<Note>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    pub fn liveness(&self, source: LivenessSource) -> Vec<bool> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Liveness(s, lost) if s == source => Some(lost),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.notes.lock().clear();
    }
}

impl SessionObserver for RecordingObserver {
    fn liveness_changed(&mut self, source: LivenessSource, lost: bool) {
        self.notes.lock().push(Note::Liveness(source, lost));
    }

    fn channels_populated(&mut self, channels: &[ChannelSummary]) {
        self.notes.lock().push(Note::Populated(channels.to_vec()));
    }

    fn channel_updated(&mut self, channel: &ChannelSummary) {
        self.notes.lock().push(Note::Updated(channel.clone()));
    }

    fn phase_changed(&mut self, phase: Phase) {
        self.notes.lock().push(Note::Phase(phase));
    }

    fn command_timed_out(&mut self, command: CommandId) {
        self.notes.lock().push(Note::TimedOut(command));
    }
}

// ============================================================================
// Frames and Catalogs
// ============================================================================

pub const TAG_FREQUENCY_HZ: u32 = 146_000_000;

/// One-tag catalog: id 4, interval 1000 ms, no second interval.
pub fn single_tag_catalog(k: u32) -> TagCatalog {
    let settings = CatalogSettings {
        k,
        false_alarm_percent: 1.0,
    };
    parse_catalog("4, collar, 146000000, 1000, slow, 0, , 15, 60, 20\n", &settings).unwrap()
}

pub fn frame(message: TunnelMessage) -> TunnelFrame {
    TunnelCodec::encode(&message).unwrap()
}

pub fn ack(command: CommandId, result: CommandResult) -> Vec<u8> {
    TunnelMessage::Ack(Ack {
        command: command.as_u32(),
        result,
    })
    .encode()
}

pub fn ok(command: CommandId) -> Vec<u8> {
    ack(command, CommandResult::Success)
}

pub fn controller_heartbeat() -> Vec<u8> {
    TunnelMessage::Heartbeat(Heartbeat {
        system_id: SystemId::Controller,
        status: ControllerStatus::Idle,
    })
    .encode()
}

pub fn confirmed_pulse(tag_id: u32, seq: u16, snr: f64) -> Vec<u8> {
    TunnelMessage::Pulse(PulseInfo {
        tag_id,
        frequency_hz: TAG_FREQUENCY_HZ,
        snr,
        group_seq_counter: seq,
        confirmed_status: 1,
        ..Default::default()
    })
    .encode()
}

pub fn detector_heartbeat(tag_id: u32) -> Vec<u8> {
    TunnelMessage::Pulse(PulseInfo {
        tag_id,
        ..Default::default()
    })
    .encode()
}
