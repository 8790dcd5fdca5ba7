//! End-to-end sessions over localhost UDP.

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serial_test::serial;
use tagtrack_control::Phase;
use tagtrack_runner::transport::{decode_datagram, encode_datagram};
use tagtrack_runner::{Runner, RunnerConfig, TransportConfig};
use tagtrack_tunnel::{
    Ack, CommandId, CommandResult, ControllerStatus, Heartbeat, SystemId, TunnelCodec, TunnelMessage,
};

const WAIT: Duration = Duration::from_secs(5);

/// Stand-in for the telemetry link end of the tunnel.
struct FakeLink {
    socket: UdpSocket,
    runner: SocketAddr,
}

impl FakeLink {
    fn new(runner: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        FakeLink { socket, runner }
    }

    fn send(&self, message: TunnelMessage) {
        let frame = TunnelCodec::encode(&message).unwrap();
        self.socket.send_to(&encode_datagram(&frame), self.runner).unwrap();
    }

    fn ack(&self, command: CommandId) {
        self.send(TunnelMessage::Ack(Ack {
            command: command.as_u32(),
            result: CommandResult::Success,
        }));
    }

    /// Next command from the runner, skipping keep-alives.
    fn next_command(&self) -> TunnelMessage {
        let deadline = Instant::now() + WAIT;
        let mut buf = [0u8; 256];
        while Instant::now() < deadline {
            let Ok((len, _)) = self.socket.recv_from(&mut buf) else {
                continue;
            };
            if let Some(frame) = decode_datagram(&buf[..len]).unwrap() {
                return TunnelCodec::decode(frame.payload()).unwrap();
            }
        }
        panic!("no command from runner");
    }
}

fn tag_file(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("tagtrack-runner-{}-{}.csv", name, std::process::id()));
    std::fs::write(
        &path,
        "# id, name, freq_hz, ip_msecs_1, ip_msecs_1_id, ip_msecs_2, ip_msecs_2_id, pulse_width_msecs, ip_uncertainty_msecs, ip_jitter_msecs\n\
         2, collar, 150100000, 1500, slow, 3000, fast, 15, 60, 20\n",
    )
    .unwrap();
    path
}

fn config(tag_file: PathBuf, remote: Option<SocketAddr>) -> RunnerConfig {
    RunnerConfig {
        tag_file: Some(tag_file),
        transport: TransportConfig {
            bind: "127.0.0.1:0".to_string(),
            remote: remote.map(|addr| addr.to_string()),
        },
        keepalive_interval_ms: 50,
        receive_timeout_ms: 20,
        ..Default::default()
    }
}

fn controller_heartbeat() -> TunnelMessage {
    TunnelMessage::Heartbeat(Heartbeat {
        system_id: SystemId::Controller,
        status: ControllerStatus::Idle,
    })
}

fn wait_for_phase(runner: &Runner, phase: Phase) {
    let deadline = Instant::now() + WAIT;
    while runner.handle().snapshot().unwrap().phase != phase {
        assert!(Instant::now() < deadline, "phase {} not reached", phase);
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
#[serial]
fn test_upload_over_udp_with_learned_remote() {
    let path = tag_file("learned");
    let runner = Runner::start(&config(path.clone(), None)).unwrap();
    let link = FakeLink::new(runner.transport().local_addr().unwrap());

    link.send(controller_heartbeat());
    assert_eq!(
        link.next_command(),
        TunnelMessage::StartTags {
            sdr_type: Default::default()
        }
    );
    assert_eq!(runner.transport().remote(), Some(link.socket.local_addr().unwrap()));

    link.ack(CommandId::StartTags);
    match link.next_command() {
        TunnelMessage::Tag(tag) => {
            assert_eq!(tag.id, 2);
            assert_eq!(tag.intra_pulse2_ms, 3000);
        }
        other => panic!("expected tag, got {:?}", other),
    }
    link.ack(CommandId::Tag);
    assert_eq!(link.next_command(), TunnelMessage::EndTags);
    link.ack(CommandId::EndTags);
    assert!(matches!(
        link.next_command(),
        TunnelMessage::StartDetection {
            radio_center_hz: 150_100_000,
            ..
        }
    ));
    link.ack(CommandId::StartDetection);

    wait_for_phase(&runner, Phase::Detecting);
    assert_eq!(runner.board().phase(), Phase::Detecting);
    assert!(runner.board().channel(2).is_some());
    assert!(runner.board().channel(3).is_some());

    runner.stop().unwrap();
    let _ = std::fs::remove_file(path);
}

#[test]
#[serial]
fn test_configured_remote_receives_keepalives() {
    let link_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    link_socket.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    let path = tag_file("keepalive");

    let runner = Runner::start(&config(path.clone(), Some(link_socket.local_addr().unwrap()))).unwrap();

    let mut buf = [0u8; 256];
    let (len, from) = link_socket.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], &[0]);
    assert_eq!(from, runner.transport().local_addr().unwrap());

    runner.stop().unwrap();
    let _ = std::fs::remove_file(path);
}

#[test]
#[serial]
fn test_missing_tag_file_fails_start() {
    let missing = std::env::temp_dir().join("tagtrack-runner-does-not-exist.csv");
    assert!(Runner::start(&config(missing, None)).is_err());
}
