// Pitch location classification and per-batter location profiles.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ZoneGeometry;
use crate::data::types::{PitchEvent, PlayerId};
use crate::engine::aggregate::PlateAppearance;

/// Four-way location bucket, from most to least hittable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PitchZone {
    Heart,
    Zone,
    Chase,
    Waste,
}

/// Classify a located pitch against a strike zone.
///
/// Heart is checked first: within `heart_half_width` of the plate center and
/// at least `heart_margin` inside both the top and bottom of the zone.
pub fn classify(plate_x: f64, plate_z: f64, sz_top: f64, sz_bot: f64, geom: &ZoneGeometry) -> PitchZone {
    let heart_top = sz_top - geom.heart_margin;
    let heart_bot = sz_bot + geom.heart_margin;
    if plate_x.abs() <= geom.heart_half_width && (heart_bot..=heart_top).contains(&plate_z) {
        return PitchZone::Heart;
    }

    if plate_x.abs() <= geom.plate_half_width && (sz_bot..=sz_top).contains(&plate_z) {
        return PitchZone::Zone;
    }

    let buffer = geom.chase_buffer;
    if plate_x.abs() <= geom.plate_half_width + buffer
        && (sz_bot - buffer..=sz_top + buffer).contains(&plate_z)
    {
        return PitchZone::Chase;
    }

    PitchZone::Waste
}

/// Classify a raw pitch, or `None` when it cannot take part in location
/// aggregation: missing or non-finite location, or a zone whose top is not
/// above its bottom. Missing zone bounds fall back to the configured default.
pub fn classify_pitch(pitch: &PitchEvent, geom: &ZoneGeometry) -> Option<PitchZone> {
    let x = pitch.plate_x.filter(|v| v.is_finite())?;
    let z = pitch.plate_z.filter(|v| v.is_finite())?;
    let top = pitch.sz_top.unwrap_or(geom.default_top);
    let bot = pitch.sz_bot.unwrap_or(geom.default_bottom);
    if !top.is_finite() || !bot.is_finite() || top <= bot {
        return None;
    }
    Some(classify(x, z, top, bot, geom))
}

/// Per-bucket pitch counts. Only located pitches are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneCounts {
    pub heart: u32,
    pub zone: u32,
    pub chase: u32,
    pub waste: u32,
}

impl ZoneCounts {
    pub fn record(&mut self, zone: PitchZone) {
        match zone {
            PitchZone::Heart => self.heart += 1,
            PitchZone::Zone => self.zone += 1,
            PitchZone::Chase => self.chase += 1,
            PitchZone::Waste => self.waste += 1,
        }
    }

    pub fn merge(&mut self, other: &ZoneCounts) {
        self.heart += other.heart;
        self.zone += other.zone;
        self.chase += other.chase;
        self.waste += other.waste;
    }

    pub fn located(&self) -> u32 {
        self.heart + self.zone + self.chase + self.waste
    }
}

/// Location mix of the pitches a batter saw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationProfile {
    pub located_pitches: u32,
    pub heart_pct: f64,
    /// Heart plus rest-of-zone.
    pub zone_pct: f64,
    pub chase_pct: f64,
    pub waste_pct: f64,
}

impl LocationProfile {
    /// `None` when no pitch was located.
    pub fn from_counts(counts: &ZoneCounts) -> Option<Self> {
        let located = counts.located();
        if located == 0 {
            return None;
        }
        let n = located as f64;
        Some(LocationProfile {
            located_pitches: located,
            heart_pct: counts.heart as f64 / n,
            zone_pct: (counts.heart + counts.zone) as f64 / n,
            chase_pct: counts.chase as f64 / n,
            waste_pct: counts.waste as f64 / n,
        })
    }
}

/// Location profile for every batter with at least one located pitch.
pub fn profile_locations(pas: &[PlateAppearance]) -> BTreeMap<PlayerId, LocationProfile> {
    let mut counts: BTreeMap<PlayerId, ZoneCounts> = BTreeMap::new();
    for pa in pas {
        counts.entry(pa.batter).or_default().merge(&pa.zones);
    }
    counts
        .into_iter()
        .filter_map(|(batter, c)| LocationProfile::from_counts(&c).map(|p| (batter, p)))
        .collect()
}
