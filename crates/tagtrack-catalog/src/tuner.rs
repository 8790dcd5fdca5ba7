//! Receiver tuning for a catalog.

use crate::error::{CatalogError, CatalogResult};
use crate::tag::TagDefinition;

/// Pick the receiver center frequency for a set of tags.
///
/// Only single-tag catalogs can be tuned: the center frequency is that tag's
/// frequency.
pub fn tune(tags: &[TagDefinition]) -> CatalogResult<u32> {
    match tags {
        [tag] => Ok(tag.frequency_hz),
        _ => Err(CatalogError::Tuning { count: tags.len() }),
    }
}

/// Channelizer geometry of a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelizerPlan {
    /// Receiver sample rate.
    pub sample_rate_hz: f64,
    /// Number of channelizer channels across the band.
    pub channel_count: u32,
}

impl ChannelizerPlan {
    /// Plan for the Airspy Mini at its 3.75 MS/s rate.
    pub const AIRSPY_MINI: ChannelizerPlan = ChannelizerPlan {
        sample_rate_hz: 3_750_000.0,
        channel_count: 100,
    };

    /// Full receiver bandwidth.
    pub fn full_bandwidth_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Bandwidth of a single channel.
    pub fn channel_bandwidth_hz(&self) -> f64 {
        self.sample_rate_hz / f64::from(self.channel_count)
    }

    /// Center frequency of the lowest channel when tuned to `center_hz`.
    pub fn first_channel_frequency_hz(&self, center_hz: u32) -> f64 {
        f64::from(center_hz) - self.full_bandwidth_hz() / 2.0 - self.channel_bandwidth_hz() / 2.0
    }
}
