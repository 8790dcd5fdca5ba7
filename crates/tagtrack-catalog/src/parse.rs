//! Tag file parsing.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::catalog::TagCatalog;
use crate::error::{CatalogError, CatalogResult};
use crate::tag::{TagDefinition, DEFAULT_INTERVAL_LABEL};

/// Field order of a tag line.
pub const LINE_FORMAT: &str = "id, name, freq_hz, ip_msecs_1, ip_msecs_1_id, ip_msecs_2, ip_msecs_2_id, pulse_width_msecs, ip_uncertainty_msecs, ip_jitter_msecs";

/// Number of comma separated fields on a tag line.
pub const FIELD_COUNT: usize = 10;

/// Marks a comment line.
pub const COMMENT_MARKER: char = '#';

/// Session-wide detection parameters stamped onto every parsed tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogSettings {
    /// Repeat count required for confirmation.
    pub k: u32,
    /// False alarm probability as a percentage (0-100).
    pub false_alarm_percent: f64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            k: 4,
            false_alarm_percent: 1.0,
        }
    }
}

impl CatalogSettings {
    /// Check that the settings are in range.
    pub fn validate(&self) -> CatalogResult<()> {
        if !self.false_alarm_percent.is_finite()
            || !(0.0..=100.0).contains(&self.false_alarm_percent)
        {
            return Err(CatalogError::InvalidSetting {
                field: "false_alarm_percent",
                reason: format!("{} is not within 0-100", self.false_alarm_percent),
            });
        }
        Ok(())
    }

    /// False alarm probability as a fraction.
    pub fn false_alarm_probability(&self) -> f64 {
        self.false_alarm_percent / 100.0
    }
}

/// Parse and tune a catalog from tag file text.
pub fn parse_catalog(text: &str, settings: &CatalogSettings) -> CatalogResult<TagCatalog> {
    let tags = parse_tags(text, settings)?;
    TagCatalog::from_tags(tags)
}

/// Read, parse and tune a catalog from a tag file.
pub fn load_catalog_file(path: &Path, settings: &CatalogSettings) -> CatalogResult<TagCatalog> {
    let text = std::fs::read_to_string(path)?;
    debug!("TagCatalog: loading {}", path.display());
    parse_catalog(&text, settings)
}

/// Parse every tag line without tuning.
pub fn parse_tags(text: &str, settings: &CatalogSettings) -> CatalogResult<Vec<TagDefinition>> {
    settings.validate()?;

    let mut tags = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
            continue;
        }

        let tag = parse_line(line, trimmed, settings)?;
        if !seen.insert(tag.id) {
            return Err(CatalogError::DuplicateId { line, id: tag.id });
        }
        tags.push(tag);
    }

    debug!("TagCatalog: parsed {} tags", tags.len());
    Ok(tags)
}

fn parse_line(line: usize, text: &str, settings: &CatalogSettings) -> CatalogResult<TagDefinition> {
    let values: Vec<&str> = text.split(',').map(str::trim).collect();
    if values.len() != FIELD_COUNT {
        return Err(CatalogError::FieldCount {
            line,
            expected: FIELD_COUNT,
            actual: values.len(),
        });
    }

    let id = parse_id(line, values[0])?;
    let label = non_empty_or(values[1], &id.to_string());
    let frequency_hz = parse_u32(line, "freq_hz", values[2])?;
    let intra_pulse1_ms = parse_nonzero(line, "ip_msecs_1", values[3])?;
    let intra_pulse1_label = non_empty_or(values[4], DEFAULT_INTERVAL_LABEL);
    let intra_pulse2_ms = parse_u32(line, "ip_msecs_2", values[5])?;
    let intra_pulse2_label = non_empty_or(values[6], DEFAULT_INTERVAL_LABEL);
    let pulse_width_ms = parse_nonzero(line, "pulse_width_msecs", values[7])?;
    let ip_uncertainty_ms = parse_nonzero(line, "ip_uncertainty_msecs", values[8])?;
    let ip_jitter_ms = parse_nonzero(line, "ip_jitter_msecs", values[9])?;

    Ok(TagDefinition {
        id,
        label,
        frequency_hz,
        pulse_width_ms,
        intra_pulse1_ms,
        intra_pulse1_label,
        intra_pulse2_ms,
        intra_pulse2_label,
        ip_uncertainty_ms,
        ip_jitter_ms,
        k: settings.k,
        false_alarm_probability: settings.false_alarm_probability(),
    })
}

fn parse_id(line: usize, value: &str) -> CatalogResult<u32> {
    let invalid = || CatalogError::InvalidNumber {
        line,
        field: "id",
        value: value.to_string(),
    };

    let id: i64 = value.parse().map_err(|_| invalid())?;
    if id <= 1 {
        return Err(CatalogError::IdNotGreaterThanOne { line, value: id });
    }
    if id % 2 != 0 {
        return Err(CatalogError::IdNotEven { line, value: id });
    }
    u32::try_from(id).map_err(|_| invalid())
}

fn parse_u32(line: usize, field: &'static str, value: &str) -> CatalogResult<u32> {
    value.parse().map_err(|_| CatalogError::InvalidNumber {
        line,
        field,
        value: value.to_string(),
    })
}

fn parse_nonzero(line: usize, field: &'static str, value: &str) -> CatalogResult<u32> {
    match parse_u32(line, field, value)? {
        0 => Err(CatalogError::ZeroValue { line, field }),
        parsed => Ok(parsed),
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
