//! Threaded session runtime.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use crossbeam_channel::Sender;
use tagtrack_control::{
    spawn_session, ControlOrchestrator, Phase, ReceiveLoopConfig, SessionConfig, SessionError,
    SessionHandle, TunnelTransport,
};
use tagtrack_tunnel::{CommandId, CommandResult, TunnelFrame, TunnelMessage};

const WAIT: Duration = Duration::from_secs(5);

fn receive_config() -> ReceiveLoopConfig {
    ReceiveLoopConfig {
        keepalive_interval_ms: 20,
        receive_timeout_ms: 10,
    }
}

fn start(catalog: bool) -> (SessionHandle, Arc<RecordingTransport>, Sender<TunnelFrame>) {
    let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
    let transport = Arc::new(RecordingTransport::with_inbound(inbound_rx));
    let shared: Arc<dyn TunnelTransport> = transport.clone();

    let mut orchestrator = ControlOrchestrator::new(
        SessionConfig::default(),
        Arc::clone(&shared),
        Box::new(RecordingObserver::new()),
    );
    if catalog {
        orchestrator.load_catalog(single_tag_catalog(4), Instant::now()).unwrap();
    }
    let handle = spawn_session(orchestrator, shared, receive_config()).unwrap();
    (handle, transport, inbound_tx)
}

fn push(inbound: &Sender<TunnelFrame>, payload: Vec<u8>) {
    inbound.send(TunnelFrame::from_payload(&payload).unwrap()).unwrap();
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_session_uploads_through_threads() {
    let (handle, transport, inbound) = start(true);

    push(&inbound, controller_heartbeat());
    wait_for(|| transport.sent_commands() == vec![CommandId::StartTags]);

    push(&inbound, ok(CommandId::StartTags));
    wait_for(|| transport.sent_commands().len() == 2);
    push(&inbound, ok(CommandId::Tag));
    wait_for(|| transport.sent_commands().len() == 3);
    push(&inbound, ok(CommandId::EndTags));
    wait_for(|| transport.sent_commands().len() == 4);
    push(&inbound, ok(CommandId::StartDetection));
    wait_for(|| handle.snapshot().unwrap().phase == Phase::Detecting);

    assert!(matches!(transport.sent()[3], TunnelMessage::StartDetection { .. }));
    assert_eq!(handle.snapshot().unwrap().channels.len(), 1);
    assert!(transport.keepalives() >= 1);

    handle.stop().unwrap();
}

#[test]
fn test_requests_reach_session() {
    let (handle, transport, _inbound) = start(false);

    assert!(matches!(handle.send_tags(), Err(SessionError::NoCatalog)));
    handle.load_catalog(single_tag_catalog(4)).unwrap();
    handle.send_tags().unwrap();
    assert_eq!(transport.sent_commands(), vec![CommandId::StartTags]);

    handle.raw_capture().unwrap();
    handle.stop_detection().unwrap();
    assert_eq!(
        transport.sent_commands(),
        vec![CommandId::StartTags, CommandId::RawCapture, CommandId::StopDetection]
    );
    assert_eq!(handle.snapshot().unwrap().expected_ack, Some(CommandId::StopDetection));

    handle.stop().unwrap();
}

#[test]
fn test_ack_timeout_fires_on_session_thread() {
    let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded::<TunnelFrame>();
    let transport = Arc::new(RecordingTransport::with_inbound(inbound_rx));
    let shared: Arc<dyn TunnelTransport> = transport.clone();
    let config = SessionConfig {
        ack_timeout_ms: 50,
        ..Default::default()
    };
    let mut orchestrator = ControlOrchestrator::new(config, Arc::clone(&shared), Box::new(RecordingObserver::new()));
    orchestrator.load_catalog(single_tag_catalog(4), Instant::now()).unwrap();
    let handle = spawn_session(orchestrator, shared, receive_config()).unwrap();

    handle.send_tags().unwrap();
    wait_for(|| handle.snapshot().unwrap().expected_ack.is_none());
    assert_eq!(transport.sent_commands(), vec![CommandId::StartTags]);

    drop(inbound_tx);
    handle.stop().unwrap();
}

#[test]
fn test_failed_ack_ends_session() {
    let (handle, _transport, inbound) = start(true);

    push(&inbound, controller_heartbeat());
    push(&inbound, ack(CommandId::StartTags, CommandResult::Failure));
    wait_for(|| handle.is_finished());

    assert!(matches!(handle.send_tags(), Err(SessionError::Stopped)));
    assert!(matches!(
        handle.join(),
        Err(SessionError::CommandFailed {
            command: CommandId::StartTags
        })
    ));
}
