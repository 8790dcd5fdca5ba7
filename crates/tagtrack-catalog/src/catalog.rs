//! The tuned tag catalog.

use tracing::info;

use crate::error::CatalogResult;
use crate::tag::TagDefinition;
use crate::tuner::{tune, ChannelizerPlan};

/// Longest intra-pulse interval across a catalog and the largest `k` seen
/// alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntraPulseBound {
    /// Longest interval.
    pub interval_ms: u32,
    /// Largest repeat count among tags contributing the longest interval.
    pub k: u32,
}

/// An ordered, immutable set of tags plus the receiver frequency they tune to.
///
/// A catalog is replaced wholesale on reload and never edited in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagCatalog {
    tags: Vec<TagDefinition>,
    radio_center_hz: Option<u32>,
}

impl TagCatalog {
    /// A catalog with no tags, used before any tag file is loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build and tune a catalog from parsed tags.
    pub fn from_tags(tags: Vec<TagDefinition>) -> CatalogResult<Self> {
        let center = tune(&tags)?;
        let plan = ChannelizerPlan::AIRSPY_MINI;
        info!(
            "TagCatalog: tuned {} tag(s) to {} Hz (first channel {:.0} Hz, channel width {:.0} Hz)",
            tags.len(),
            center,
            plan.first_channel_frequency_hz(center),
            plan.channel_bandwidth_hz()
        );
        Ok(TagCatalog {
            tags,
            radio_center_hz: Some(center),
        })
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the catalog has no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags in file order.
    pub fn tags(&self) -> &[TagDefinition] {
        &self.tags
    }

    /// Tag at a position in file order.
    pub fn tag_at(&self, index: usize) -> Option<&TagDefinition> {
        self.tags.get(index)
    }

    /// Look up a tag by id.
    pub fn get(&self, id: u32) -> Option<&TagDefinition> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    /// Iterate over tags in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, TagDefinition> {
        self.tags.iter()
    }

    /// Receiver center frequency, `None` for an empty catalog.
    pub fn radio_center_hz(&self) -> Option<u32> {
        self.radio_center_hz
    }

    /// Longest intra-pulse interval across both intervals of every tag.
    pub fn max_intra_pulse(&self) -> Option<IntraPulseBound> {
        if self.tags.is_empty() {
            return None;
        }

        let mut bound = IntraPulseBound { interval_ms: 0, k: 0 };
        for tag in &self.tags {
            for interval in [tag.intra_pulse1_ms, tag.intra_pulse2_ms] {
                if interval >= bound.interval_ms {
                    bound.interval_ms = interval;
                    bound.k = bound.k.max(tag.k);
                }
            }
        }
        Some(bound)
    }
}

impl<'a> IntoIterator for &'a TagCatalog {
    type Item = &'a TagDefinition;
    type IntoIter = std::slice::Iter<'a, TagDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}
