//! One-outstanding-command link to the detector.
//!
//! Every command the ground station sends is answered by an [`Ack`] naming
//! the command. The link keeps at most one command outstanding: sending a
//! new one replaces the previous expectation and restarts the ack timer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tagtrack_tunnel::{Ack, CommandId, CommandResult, TunnelCodec, TunnelMessage};
use tracing::{debug, trace, warn};

use crate::error::SessionResult;
use crate::session_metrics::metric_defs;
use crate::timer::{TimerKey, TimerQueue};
use crate::transport::TunnelTransport;

/// How an incoming ack related to the outstanding command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The ack answered the outstanding command.
    Accepted {
        /// The acknowledged command.
        command: CommandId,
        /// What the detector reported.
        result: CommandResult,
    },
    /// The ack named some other command; nothing changed.
    Desync {
        /// What the link was waiting for.
        expected: Option<CommandId>,
        /// Raw command id carried by the ack.
        actual: u32,
    },
}

/// Sends commands and matches acknowledgments against them.
pub struct SequencedCommandLink {
    transport: Arc<dyn TunnelTransport>,
    ack_timeout: Duration,
    expected: Option<CommandId>,
    commands_sent: u64,
}

impl SequencedCommandLink {
    /// Create a link over `transport` with the given ack window.
    pub fn new(transport: Arc<dyn TunnelTransport>, ack_timeout: Duration) -> Self {
        SequencedCommandLink {
            transport,
            ack_timeout,
            expected: None,
            commands_sent: 0,
        }
    }

    /// The command awaiting acknowledgment, if any.
    pub fn expected_ack(&self) -> Option<CommandId> {
        self.expected
    }

    /// Number of commands transmitted.
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }

    /// Transmit `message` and wait for its ack.
    ///
    /// If the transmit fails nothing is left outstanding.
    pub fn send(
        &mut self,
        message: &TunnelMessage,
        timers: &mut TimerQueue,
        now: Instant,
    ) -> SessionResult<()> {
        let command = message.command_id();
        timers.cancel(TimerKey::AckTimeout);
        if let Some(previous) = self.expected.take() {
            debug!("Link: {} replaces outstanding {}", command, previous);
        }

        let frame = TunnelCodec::encode(message)?;
        trace!("Link: tx {} [{}]", command, hex::encode(frame.payload()));
        self.transport.send_frame(&frame)?;

        timers.arm(TimerKey::AckTimeout, now, self.ack_timeout);
        self.expected = Some(command);
        self.commands_sent += 1;
        metrics::counter!(metric_defs::COMMANDS_SENT.name, "command" => command.name()).increment(1);
        Ok(())
    }

    /// Match `ack` against the outstanding command.
    pub fn on_ack(&mut self, ack: &Ack, timers: &mut TimerQueue) -> AckOutcome {
        match self.expected {
            Some(command) if command.as_u32() == ack.command => {
                timers.cancel(TimerKey::AckTimeout);
                self.expected = None;
                let label = if ack.result.is_success() { "success" } else { "failure" };
                metrics::counter!(metric_defs::ACKS_RECEIVED.name, "result" => label).increment(1);
                AckOutcome::Accepted {
                    command,
                    result: ack.result,
                }
            }
            expected => {
                let expected_name = expected.map_or("nothing", CommandId::name);
                let actual_name = ack.command_id().map_or("unknown", CommandId::name);
                warn!(
                    "Link: ack for {} ({}) while waiting for {}",
                    actual_name, ack.command, expected_name
                );
                metrics::counter!(metric_defs::ACK_DESYNCS.name).increment(1);
                AckOutcome::Desync {
                    expected,
                    actual: ack.command,
                }
            }
        }
    }

    /// The ack timer fired. Returns the command that went unanswered.
    pub fn on_ack_timeout(&mut self) -> Option<CommandId> {
        let command = self.expected.take()?;
        warn!("Link: no ack for {} within {:?}", command, self.ack_timeout);
        metrics::counter!(metric_defs::ACK_TIMEOUTS.name).increment(1);
        Some(command)
    }

    /// Forget the outstanding command.
    pub fn reset(&mut self, timers: &mut TimerQueue) {
        timers.cancel(TimerKey::AckTimeout);
        self.expected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::Mutex;
    use tagtrack_tunnel::{SdrType, TunnelFrame};

    #[derive(Default)]
    struct Capture {
        frames: Mutex<Vec<TunnelFrame>>,
        fail: bool,
    }

    impl TunnelTransport for Capture {
        fn send_frame(&self, frame: &TunnelFrame) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Closed);
            }
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn recv_frame(&self, _timeout: Duration) -> Result<Option<TunnelFrame>, TransportError> {
            Ok(None)
        }

        fn send_keepalive(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn start_tags() -> TunnelMessage {
        TunnelMessage::StartTags {
            sdr_type: SdrType::AirspyMini,
        }
    }

    fn ack(command: CommandId, result: CommandResult) -> Ack {
        Ack {
            command: command.as_u32(),
            result,
        }
    }

    #[test]
    fn test_send_arms_timer_and_expects_ack() {
        let transport = Arc::new(Capture::default());
        let mut link = SequencedCommandLink::new(transport.clone(), Duration::from_millis(2000));
        let mut timers = TimerQueue::new();
        let now = Instant::now();

        link.send(&start_tags(), &mut timers, now).unwrap();

        assert_eq!(link.expected_ack(), Some(CommandId::StartTags));
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(2000)));
        assert_eq!(transport.frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_matching_ack_clears_expectation() {
        let mut link = SequencedCommandLink::new(Arc::new(Capture::default()), Duration::from_millis(2000));
        let mut timers = TimerQueue::new();
        link.send(&start_tags(), &mut timers, Instant::now()).unwrap();

        let outcome = link.on_ack(&ack(CommandId::StartTags, CommandResult::Success), &mut timers);

        assert_eq!(
            outcome,
            AckOutcome::Accepted {
                command: CommandId::StartTags,
                result: CommandResult::Success
            }
        );
        assert_eq!(link.expected_ack(), None);
        assert!(!timers.is_armed(TimerKey::AckTimeout));
    }

    #[test]
    fn test_mismatched_ack_keeps_expectation() {
        let mut link = SequencedCommandLink::new(Arc::new(Capture::default()), Duration::from_millis(2000));
        let mut timers = TimerQueue::new();
        link.send(&start_tags(), &mut timers, Instant::now()).unwrap();

        let outcome = link.on_ack(&ack(CommandId::EndTags, CommandResult::Success), &mut timers);

        assert_eq!(
            outcome,
            AckOutcome::Desync {
                expected: Some(CommandId::StartTags),
                actual: CommandId::EndTags.as_u32()
            }
        );
        assert_eq!(link.expected_ack(), Some(CommandId::StartTags));
        assert!(timers.is_armed(TimerKey::AckTimeout));
    }

    #[test]
    fn test_timeout_clears_expectation() {
        let mut link = SequencedCommandLink::new(Arc::new(Capture::default()), Duration::from_millis(2000));
        let mut timers = TimerQueue::new();
        link.send(&start_tags(), &mut timers, Instant::now()).unwrap();

        assert_eq!(link.on_ack_timeout(), Some(CommandId::StartTags));
        assert_eq!(link.expected_ack(), None);
        assert_eq!(link.on_ack_timeout(), None);
    }

    #[test]
    fn test_failed_transmit_leaves_nothing_outstanding() {
        let transport = Arc::new(Capture {
            fail: true,
            ..Default::default()
        });
        let mut link = SequencedCommandLink::new(transport, Duration::from_millis(2000));
        let mut timers = TimerQueue::new();

        assert!(link.send(&start_tags(), &mut timers, Instant::now()).is_err());
        assert_eq!(link.expected_ack(), None);
        assert!(!timers.is_armed(TimerKey::AckTimeout));
    }
}
