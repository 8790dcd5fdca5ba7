//! Controller liveness tracking.

use std::time::{Duration, Instant};

use tagtrack_tunnel::{ControllerStatus, Heartbeat, SystemId};
use tracing::{debug, info, warn};

use crate::timer::{TimerKey, TimerQueue};

/// What a controller heartbeat changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatUpdate {
    /// The controller was lost and is now back.
    pub recovered: bool,
    /// This is the first controller heartbeat of the session.
    pub first_heartbeat: bool,
}

/// Tracks whether the remote controller is alive.
///
/// The controller counts as lost until its first heartbeat arrives.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    window: Duration,
    lost: bool,
    status: ControllerStatus,
    first_heartbeat_seen: bool,
    heartbeats: u64,
}

impl HeartbeatMonitor {
    /// Create a monitor that declares the controller lost after `window` of silence.
    pub fn new(window: Duration) -> Self {
        HeartbeatMonitor {
            window,
            lost: true,
            status: ControllerStatus::Idle,
            first_heartbeat_seen: false,
            heartbeats: 0,
        }
    }

    /// Whether the controller is currently considered lost.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Last status the controller reported.
    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    /// Controller heartbeats received.
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// Record a heartbeat. Only controller heartbeats produce an update.
    pub fn on_heartbeat(
        &mut self,
        heartbeat: &Heartbeat,
        timers: &mut TimerQueue,
        now: Instant,
    ) -> Option<HeartbeatUpdate> {
        if heartbeat.system_id != SystemId::Controller {
            debug!(
                "Heartbeat: {:?} status {:?}",
                heartbeat.system_id, heartbeat.status
            );
            return None;
        }

        let recovered = self.lost;
        if recovered {
            info!("Heartbeat: controller alive, status {:?}", heartbeat.status);
        }
        self.lost = false;
        self.status = heartbeat.status;
        self.heartbeats += 1;
        timers.arm(TimerKey::ControllerHeartbeat, now, self.window);

        let first_heartbeat = !self.first_heartbeat_seen;
        self.first_heartbeat_seen = true;

        Some(HeartbeatUpdate {
            recovered,
            first_heartbeat,
        })
    }

    /// The liveness window elapsed. Returns whether the controller just became lost.
    pub fn on_timeout(&mut self) -> bool {
        if self.lost {
            return false;
        }
        warn!("Heartbeat: controller lost, no heartbeat for {:?}", self.window);
        self.lost = true;
        true
    }
}
