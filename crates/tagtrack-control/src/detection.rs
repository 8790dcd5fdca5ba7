//! Per-channel pulse aggregation and liveness.
//!
//! Each tag yields one detector channel per configured intra-pulse interval:
//! the first interval keeps the tag id, the second uses `tag id + 1`. Tag ids
//! are even, so the two never collide.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tagtrack_catalog::{TagCatalog, TagDefinition};
use tagtrack_tunnel::PulseInfo;
use tracing::{debug, info, trace, warn};

use crate::session_metrics::metric_defs;
use crate::timer::{TimerKey, TimerQueue};

/// Display view of a detector channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    /// Channel id, as carried in pulse `tag_id`.
    pub channel_id: u32,
    /// Catalog tag the channel belongs to.
    pub tag_id: u32,
    /// Interval label from the catalog.
    pub label: String,
    /// Tag frequency.
    pub frequency_hz: u32,
    /// Expected time between pulses.
    pub interval_ms: u32,
    /// Highest SNR in the current pulse group.
    pub aggregate_snr: Option<f64>,
    /// Sequence counter of the current pulse group.
    pub group_seq: Option<u16>,
    /// No confirmed pulse inside the window.
    pub stale: bool,
    /// No detector heartbeat inside the window.
    pub heartbeat_lost: bool,
}

/// One monitored interval of a tag.
#[derive(Debug, Clone)]
pub struct DetectorChannel {
    channel_id: u32,
    tag_id: u32,
    label: String,
    frequency_hz: u32,
    interval_ms: u32,
    k: u32,
    last_group_seq: Option<u16>,
    aggregate_snr: Option<f64>,
    stale: bool,
    heartbeat_lost: bool,
    confirmed_pulses: u64,
}

impl DetectorChannel {
    fn new(channel_id: u32, tag: &TagDefinition, interval_ms: u32, label: &str) -> Self {
        DetectorChannel {
            channel_id,
            tag_id: tag.id,
            label: label.to_string(),
            frequency_hz: tag.frequency_hz,
            interval_ms,
            k: tag.k,
            last_group_seq: None,
            aggregate_snr: None,
            stale: true,
            heartbeat_lost: true,
            confirmed_pulses: 0,
        }
    }

    /// Channel id.
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// How long the channel may stay silent: `(k + 1) * interval`.
    pub fn window(&self) -> Duration {
        Duration::from_millis((u64::from(self.k) + 1) * u64::from(self.interval_ms))
    }

    /// Highest SNR seen in the current pulse group.
    pub fn aggregate_snr(&self) -> Option<f64> {
        self.aggregate_snr
    }

    /// Whether confirmed pulses have stopped arriving.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Whether detector heartbeats have stopped arriving.
    pub fn is_heartbeat_lost(&self) -> bool {
        self.heartbeat_lost
    }

    /// Confirmed pulses received.
    pub fn confirmed_pulses(&self) -> u64 {
        self.confirmed_pulses
    }

    /// Display view.
    pub fn summary(&self) -> ChannelSummary {
        ChannelSummary {
            channel_id: self.channel_id,
            tag_id: self.tag_id,
            label: self.label.clone(),
            frequency_hz: self.frequency_hz,
            interval_ms: self.interval_ms,
            aggregate_snr: self.aggregate_snr,
            group_seq: self.last_group_seq,
            stale: self.stale,
            heartbeat_lost: self.heartbeat_lost,
        }
    }

    fn apply_confirmed(&mut self, pulse: &PulseInfo) -> bool {
        let previous = self.aggregate_snr;
        let snr = match (self.last_group_seq, self.aggregate_snr) {
            (Some(seq), Some(current)) if seq == pulse.group_seq_counter => current.max(pulse.snr),
            _ => pulse.snr,
        };
        self.last_group_seq = Some(pulse.group_seq_counter);
        self.aggregate_snr = Some(snr);
        self.confirmed_pulses += 1;
        previous != self.aggregate_snr
    }
}

/// What a pulse did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PulseOutcome {
    /// No channel carries the pulse's tag id.
    UnknownChannel,
    /// Zero-frequency detector heartbeat.
    Heartbeat {
        /// Channel the heartbeat belongs to.
        channel_id: u32,
        /// The channel's heartbeat had timed out and is now back.
        recovered: bool,
    },
    /// Confirmed pulse folded into the channel aggregate.
    Confirmed {
        /// Channel the pulse belongs to.
        channel_id: u32,
        /// The aggregated SNR changed.
        snr_changed: bool,
        /// The channel was stale and is now back.
        recovered: bool,
    },
    /// Unconfirmed pulse, logged only.
    Unconfirmed {
        /// Channel the pulse belongs to.
        channel_id: u32,
    },
}

/// The set of detector channels for the confirmed catalog.
#[derive(Debug, Default)]
pub struct DetectionTracker {
    channels: BTreeMap<u32, DetectorChannel>,
}

impl DetectionTracker {
    /// Create a tracker with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the tracker has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Look up a channel by id.
    pub fn channel(&self, channel_id: u32) -> Option<&DetectorChannel> {
        self.channels.get(&channel_id)
    }

    /// Display view of every channel, ordered by id.
    pub fn summaries(&self) -> Vec<ChannelSummary> {
        self.channels.values().map(DetectorChannel::summary).collect()
    }

    /// Replace the channel set with one derived from `catalog`.
    ///
    /// New channels count as stale with their heartbeat lost until the detector
    /// reports. Both liveness timers of every new channel start running immediately.
    pub fn populate_from_catalog(&mut self, catalog: &TagCatalog, timers: &mut TimerQueue, now: Instant) {
        self.clear(timers);

        for tag in catalog {
            let first = DetectorChannel::new(tag.id, tag, tag.intra_pulse1_ms, &tag.intra_pulse1_label);
            self.channels.insert(first.channel_id, first);
            if tag.has_second_interval() {
                let second =
                    DetectorChannel::new(tag.id + 1, tag, tag.intra_pulse2_ms, &tag.intra_pulse2_label);
                self.channels.insert(second.channel_id, second);
            }
        }

        for channel in self.channels.values() {
            timers.arm(TimerKey::ChannelHeartbeat(channel.channel_id), now, channel.window());
            timers.arm(TimerKey::ChannelStale(channel.channel_id), now, channel.window());
        }
        info!("Detection: {} channels from {} tags", self.channels.len(), catalog.len());
    }

    /// Drop every channel and its timers.
    pub fn clear(&mut self, timers: &mut TimerQueue) {
        for id in self.channels.keys() {
            timers.cancel(TimerKey::ChannelHeartbeat(*id));
            timers.cancel(TimerKey::ChannelStale(*id));
        }
        self.channels.clear();
    }

    /// Route a pulse to its channel.
    pub fn handle_pulse(&mut self, pulse: &PulseInfo, timers: &mut TimerQueue, now: Instant) -> PulseOutcome {
        let Some(channel) = self.channels.get_mut(&pulse.tag_id) else {
            debug!("Detection: pulse for unknown channel {}", pulse.tag_id);
            return PulseOutcome::UnknownChannel;
        };
        let channel_id = channel.channel_id;

        if pulse.is_detector_heartbeat() {
            let recovered = std::mem::replace(&mut channel.heartbeat_lost, false);
            timers.arm(TimerKey::ChannelHeartbeat(channel_id), now, channel.window());
            trace!("Detection[{}]: heartbeat", channel_id);
            return PulseOutcome::Heartbeat { channel_id, recovered };
        }

        if !pulse.is_confirmed() {
            trace!(
                "Detection[{}]: unconfirmed pulse snr {:.1} seq {}",
                channel_id, pulse.snr, pulse.group_seq_counter
            );
            return PulseOutcome::Unconfirmed { channel_id };
        }

        let snr_changed = channel.apply_confirmed(pulse);
        let recovered = std::mem::replace(&mut channel.stale, false);
        timers.arm(TimerKey::ChannelStale(channel_id), now, channel.window());
        metrics::counter!(metric_defs::CONFIRMED_PULSES.name, "channel" => channel_id.to_string()).increment(1);
        debug!(
            "Detection[{}]: confirmed pulse snr {:.1} seq {} aggregate {:?}",
            channel_id, pulse.snr, pulse.group_seq_counter, channel.aggregate_snr
        );

        PulseOutcome::Confirmed {
            channel_id,
            snr_changed,
            recovered,
        }
    }

    /// A channel's heartbeat window elapsed. Returns whether its flag just flipped.
    pub fn on_heartbeat_timeout(&mut self, channel_id: u32) -> bool {
        match self.channels.get_mut(&channel_id) {
            Some(channel) if !channel.heartbeat_lost => {
                warn!("Detection[{}]: detector heartbeat lost", channel_id);
                channel.heartbeat_lost = true;
                true
            }
            _ => false,
        }
    }

    /// A channel's pulse window elapsed. Returns whether its flag just flipped.
    pub fn on_stale_timeout(&mut self, channel_id: u32) -> bool {
        match self.channels.get_mut(&channel_id) {
            Some(channel) if !channel.stale => {
                info!("Detection[{}]: stale", channel_id);
                channel.stale = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: u32, ip1: u32, ip2: u32, k: u32) -> TagDefinition {
        TagDefinition {
            id,
            label: format!("tag-{}", id),
            frequency_hz: 146_000_000,
            pulse_width_ms: 15,
            intra_pulse1_ms: ip1,
            intra_pulse1_label: "slow".to_string(),
            intra_pulse2_ms: ip2,
            intra_pulse2_label: "fast".to_string(),
            ip_uncertainty_ms: 60,
            ip_jitter_ms: 20,
            k,
            false_alarm_probability: 0.01,
        }
    }

    fn tracker_for(tags: Vec<TagDefinition>, timers: &mut TimerQueue, now: Instant) -> DetectionTracker {
        let catalog = TagCatalog::from_tags(tags).unwrap();
        let mut tracker = DetectionTracker::new();
        tracker.populate_from_catalog(&catalog, timers, now);
        tracker
    }

    fn confirmed(tag_id: u32, seq: u16, snr: f64) -> PulseInfo {
        PulseInfo {
            tag_id,
            frequency_hz: 146_000_000,
            snr,
            group_seq_counter: seq,
            confirmed_status: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_second_interval_adds_channel() {
        let mut timers = TimerQueue::new();
        let tracker = tracker_for(vec![tag(4, 1000, 2500, 3)], &mut timers, Instant::now());

        assert_eq!(tracker.len(), 2);
        let summaries = tracker.summaries();
        assert_eq!(summaries[0].channel_id, 4);
        assert_eq!(summaries[0].label, "slow");
        assert_eq!(summaries[1].channel_id, 5);
        assert_eq!(summaries[1].label, "fast");
        assert_eq!(summaries[1].interval_ms, 2500);
        assert_eq!(tracker.channel(5).unwrap().window(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_single_interval_tag() {
        let mut timers = TimerQueue::new();
        let tracker = tracker_for(vec![tag(6, 1000, 0, 3)], &mut timers, Instant::now());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.channel(7).is_none());
    }

    #[test]
    fn test_snr_group_aggregation() {
        let mut timers = TimerQueue::new();
        let now = Instant::now();
        let mut tracker = tracker_for(vec![tag(4, 1000, 0, 2)], &mut timers, now);

        tracker.handle_pulse(&confirmed(4, 5, 3.0), &mut timers, now);
        tracker.handle_pulse(&confirmed(4, 5, 7.0), &mut timers, now);
        let outcome = tracker.handle_pulse(&confirmed(4, 5, 2.0), &mut timers, now);
        assert_eq!(
            outcome,
            PulseOutcome::Confirmed {
                channel_id: 4,
                snr_changed: false,
                recovered: false
            }
        );
        assert_eq!(tracker.channel(4).unwrap().aggregate_snr(), Some(7.0));

        tracker.handle_pulse(&confirmed(4, 6, 4.0), &mut timers, now);
        assert_eq!(tracker.channel(4).unwrap().aggregate_snr(), Some(4.0));
        assert_eq!(tracker.channel(4).unwrap().confirmed_pulses(), 4);
    }

    #[test]
    fn test_unconfirmed_pulse_leaves_aggregate() {
        let mut timers = TimerQueue::new();
        let now = Instant::now();
        let mut tracker = tracker_for(vec![tag(4, 1000, 0, 2)], &mut timers, now);

        let mut pulse = confirmed(4, 1, 9.0);
        pulse.confirmed_status = 0;
        assert_eq!(
            tracker.handle_pulse(&pulse, &mut timers, now),
            PulseOutcome::Unconfirmed { channel_id: 4 }
        );
        assert_eq!(tracker.channel(4).unwrap().aggregate_snr(), None);
    }

    #[test]
    fn test_unknown_channel() {
        let mut timers = TimerQueue::new();
        let now = Instant::now();
        let mut tracker = tracker_for(vec![tag(4, 1000, 0, 2)], &mut timers, now);
        assert_eq!(
            tracker.handle_pulse(&confirmed(10, 1, 1.0), &mut timers, now),
            PulseOutcome::UnknownChannel
        );
    }

    #[test]
    fn test_new_channels_start_unheard() {
        let mut timers = TimerQueue::new();
        let now = Instant::now();
        let mut tracker = tracker_for(vec![tag(4, 1000, 2500, 2)], &mut timers, now);

        for summary in tracker.summaries() {
            assert!(summary.stale);
            assert!(summary.heartbeat_lost);
        }
        // Flags already set, so the first windows flip nothing
        assert!(!tracker.on_heartbeat_timeout(4));
        assert!(!tracker.on_stale_timeout(5));

        let outcome = tracker.handle_pulse(&confirmed(5, 1, 4.0), &mut timers, now);
        assert_eq!(
            outcome,
            PulseOutcome::Confirmed {
                channel_id: 5,
                snr_changed: true,
                recovered: true
            }
        );
        assert!(!tracker.channel(5).unwrap().is_stale());
        assert!(tracker.channel(4).unwrap().is_stale());
    }

    #[test]
    fn test_heartbeat_clears_flag() {
        let mut timers = TimerQueue::new();
        let now = Instant::now();
        let mut tracker = tracker_for(vec![tag(4, 1000, 0, 2)], &mut timers, now);

        let heartbeat = PulseInfo {
            tag_id: 4,
            ..Default::default()
        };
        assert_eq!(
            tracker.handle_pulse(&heartbeat, &mut timers, now),
            PulseOutcome::Heartbeat {
                channel_id: 4,
                recovered: true
            }
        );
        assert!(!tracker.channel(4).unwrap().is_heartbeat_lost());

        assert!(tracker.on_heartbeat_timeout(4));
        assert!(!tracker.on_heartbeat_timeout(4));

        assert_eq!(
            tracker.handle_pulse(&heartbeat, &mut timers, now),
            PulseOutcome::Heartbeat {
                channel_id: 4,
                recovered: true
            }
        );
        assert_eq!(
            tracker.handle_pulse(&heartbeat, &mut timers, now),
            PulseOutcome::Heartbeat {
                channel_id: 4,
                recovered: false
            }
        );
        assert_eq!(tracker.channel(4).unwrap().aggregate_snr(), None);
    }

    #[test]
    fn test_stale_after_window() {
        let mut timers = TimerQueue::new();
        let now = Instant::now();
        let mut tracker = tracker_for(vec![tag(4, 1000, 0, 2)], &mut timers, now);
        let pulse_at = now + Duration::from_millis(500);
        tracker.handle_pulse(&confirmed(4, 1, 5.0), &mut timers, pulse_at);

        let mut fired = Vec::new();
        while let Some(key) = timers.pop_expired(pulse_at + Duration::from_millis(2999)) {
            fired.push(key);
        }
        assert_eq!(fired, vec![TimerKey::ChannelHeartbeat(4)]);

        assert_eq!(
            timers.pop_expired(pulse_at + Duration::from_millis(3001)),
            Some(TimerKey::ChannelStale(4))
        );
        assert!(tracker.on_stale_timeout(4));
        assert!(tracker.channel(4).unwrap().is_stale());
    }
}
