// Event aggregation: pitches -> plate appearances with lineup context.
//
// Pitches are grouped by (game, half, inning, at-bat number). Within each
// half-inning the batting order is the at-bat-number sequence of batters;
// the on-deck and preceding hitters are the nearest *distinct* batters after
// and before a PA in that sequence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ZoneGeometry;
use crate::data::types::{GameId, HalfInning, PitchEvent, PlayerId};
use crate::engine::location::{classify_pitch, ZoneCounts};

/// How on-deck/preceding lookups treat the edges of a half-inning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// The last batter of a half-inning has no on-deck hitter and the leadoff
    /// batter has no preceding hitter.
    #[default]
    Absent,
    /// Look across the batting side's other half-innings of the same game:
    /// the last batter's on-deck hitter is the next inning's leadoff man.
    CarryOver,
}

/// Plate appearance identity. Field order gives the sort order: a batting
/// side's PAs in a game are contiguous and in inning / at-bat order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaKey {
    pub game_id: GameId,
    pub half: HalfInning,
    pub inning: u8,
    pub at_bat_number: u32,
}

impl PaKey {
    fn of(pitch: &PitchEvent) -> Self {
        PaKey {
            game_id: pitch.game_id,
            half: pitch.half,
            inning: pitch.inning,
            at_bat_number: pitch.at_bat_number,
        }
    }

    fn same_half_inning(&self, other: &PaKey) -> bool {
        self.same_side(other) && self.inning == other.inning
    }

    fn same_side(&self, other: &PaKey) -> bool {
        self.game_id == other.game_id && self.half == other.half
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlateAppearance {
    pub key: PaKey,
    pub batter: PlayerId,
    /// Every distinct pitcher in the PA, in pitch order. The first entry
    /// threw the first pitch.
    pub pitchers: Vec<PlayerId>,
    pub on_deck: Option<PlayerId>,
    pub preceding: Option<PlayerId>,
    pub zones: ZoneCounts,
    pub total_pitches: u32,
}

impl PlateAppearance {
    fn open(pitch: &PitchEvent) -> Self {
        PlateAppearance {
            key: PaKey::of(pitch),
            batter: pitch.batter,
            pitchers: vec![pitch.pitcher],
            on_deck: None,
            preceding: None,
            zones: ZoneCounts::default(),
            total_pitches: 0,
        }
    }

    pub fn heart_pitches(&self) -> u32 {
        self.zones.heart
    }

    pub fn located_pitches(&self) -> u32 {
        self.zones.located()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    pub pitches: usize,
    pub plate_appearances: usize,
    pub half_innings: usize,
    /// Pitches kept in their PA but left out of location aggregation.
    pub unlocated_pitches: usize,
    /// Pitches whose batter disagreed with the rest of their PA.
    pub mismatched_batter_pitches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Ordered by `PaKey`.
    pub plate_appearances: Vec<PlateAppearance>,
    pub summary: AggregationSummary,
}

/// Build plate appearances from raw pitches. Output order depends only on
/// the PA keys; a PA's batter is the batter on its first pitch in input
/// order.
pub fn aggregate(pitches: &[PitchEvent], geom: &ZoneGeometry, policy: BoundaryPolicy) -> Aggregation {
    let mut summary = AggregationSummary {
        pitches: pitches.len(),
        ..Default::default()
    };

    let mut grouped: BTreeMap<PaKey, PlateAppearance> = BTreeMap::new();
    for pitch in pitches {
        let pa = grouped
            .entry(PaKey::of(pitch))
            .or_insert_with(|| PlateAppearance::open(pitch));

        if pa.batter != pitch.batter {
            debug!(
                "game {} at-bat {}: pitch to batter {} inside PA of batter {}",
                pitch.game_id, pitch.at_bat_number, pitch.batter, pa.batter
            );
            summary.mismatched_batter_pitches += 1;
            continue;
        }

        if !pa.pitchers.contains(&pitch.pitcher) {
            pa.pitchers.push(pitch.pitcher);
        }
        pa.total_pitches += 1;
        match classify_pitch(pitch, geom) {
            Some(zone) => pa.zones.record(zone),
            None => summary.unlocated_pitches += 1,
        }
    }

    let mut pas: Vec<PlateAppearance> = grouped.into_values().collect();
    summary.plate_appearances = pas.len();
    summary.half_innings = count_runs(&pas, |a, b| a.same_half_inning(b));

    assign_lineup_context(&mut pas, policy);

    Aggregation {
        plate_appearances: pas,
        summary,
    }
}

/// Number of maximal runs of consecutive PAs whose keys satisfy `same`.
fn count_runs(pas: &[PlateAppearance], same: impl Fn(&PaKey, &PaKey) -> bool) -> usize {
    pas.windows(2)
        .filter(|w| !same(&w[0].key, &w[1].key))
        .count()
        + usize::from(!pas.is_empty())
}

/// Fill `on_deck` / `preceding` for every PA. Lookups never leave the
/// segment (half-inning or game side, per `policy`) the PA belongs to.
fn assign_lineup_context(pas: &mut [PlateAppearance], policy: BoundaryPolicy) {
    let same_segment = |a: &PaKey, b: &PaKey| match policy {
        BoundaryPolicy::Absent => a.same_half_inning(b),
        BoundaryPolicy::CarryOver => a.same_side(b),
    };

    let mut start = 0;
    while start < pas.len() {
        let mut end = start + 1;
        while end < pas.len() && same_segment(&pas[start].key, &pas[end].key) {
            end += 1;
        }

        let order: Vec<PlayerId> = pas[start..end].iter().map(|pa| pa.batter).collect();
        for (i, pa) in pas[start..end].iter_mut().enumerate() {
            let batter = order[i];
            pa.on_deck = order[i + 1..].iter().copied().find(|&b| b != batter);
            pa.preceding = order[..i].iter().rev().copied().find(|&b| b != batter);
        }

        start = end;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    fn geom() -> ZoneGeometry {
        ModelConfig::default().zone
    }

    /// Heart-zone pitch for the given PA slot.
    fn pitch(game: u32, inning: u8, half: HalfInning, ab: u32, batter: u32) -> PitchEvent {
        PitchEvent {
            game_id: game,
            inning,
            half,
            at_bat_number: ab,
            batter,
            pitcher: 900,
            plate_x: Some(0.0),
            plate_z: Some(2.5),
            sz_top: Some(3.5),
            sz_bot: Some(1.5),
        }
    }

    fn context(agg: &Aggregation, batter: u32) -> Vec<(Option<u32>, Option<u32>)> {
        agg.plate_appearances
            .iter()
            .filter(|pa| pa.batter == batter)
            .map(|pa| (pa.preceding, pa.on_deck))
            .collect()
    }

    /// Game 1: top 1 = A(1) B(2) C(3); top 2 = D(4) A(1); bottom 1 = X(10) Y(11).
    fn small_game() -> Vec<PitchEvent> {
        use HalfInning::*;
        vec![
            pitch(1, 1, Top, 1, 1),
            pitch(1, 1, Top, 1, 1),
            pitch(1, 1, Top, 2, 2),
            pitch(1, 1, Top, 3, 3),
            pitch(1, 1, Bottom, 4, 10),
            pitch(1, 1, Bottom, 5, 11),
            pitch(1, 2, Top, 6, 4),
            pitch(1, 2, Top, 7, 1),
        ]
    }

    #[test]
    fn pitches_group_into_plate_appearances() {
        let agg = aggregate(&small_game(), &geom(), BoundaryPolicy::Absent);
        assert_eq!(agg.summary.pitches, 8);
        assert_eq!(agg.summary.plate_appearances, 7);
        assert_eq!(agg.summary.half_innings, 3);
        let first = &agg.plate_appearances[0];
        assert_eq!(first.batter, 1);
        assert_eq!(first.total_pitches, 2);
        assert_eq!(first.heart_pitches(), 2);
    }

    #[test]
    fn on_deck_and_preceding_within_half_inning() {
        let agg = aggregate(&small_game(), &geom(), BoundaryPolicy::Absent);
        assert_eq!(context(&agg, 2), vec![(Some(1), Some(3))]);
        assert_eq!(context(&agg, 10), vec![(None, Some(11))]);
        assert_eq!(context(&agg, 11), vec![(Some(10), None)]);
    }

    #[test]
    fn absent_policy_stops_at_half_inning_edges() {
        let agg = aggregate(&small_game(), &geom(), BoundaryPolicy::Absent);
        // Batter 1 leads off the 1st and bats last in the 2nd.
        assert_eq!(context(&agg, 1), vec![(None, Some(2)), (Some(4), None)]);
        assert_eq!(context(&agg, 3), vec![(Some(2), None)]);
        assert_eq!(context(&agg, 4), vec![(None, Some(1))]);
    }

    #[test]
    fn carry_over_policy_crosses_innings_but_not_sides() {
        let agg = aggregate(&small_game(), &geom(), BoundaryPolicy::CarryOver);
        assert_eq!(context(&agg, 3), vec![(Some(2), Some(4))]);
        assert_eq!(context(&agg, 4), vec![(Some(3), Some(1))]);
        // Bottom half never sees the top half's hitters.
        assert_eq!(context(&agg, 11), vec![(Some(10), None)]);
    }

    #[test]
    fn carry_over_never_crosses_games() {
        use HalfInning::*;
        let pitches = vec![pitch(1, 9, Top, 70, 5), pitch(2, 1, Top, 1, 6)];
        let agg = aggregate(&pitches, &geom(), BoundaryPolicy::CarryOver);
        assert_eq!(context(&agg, 5), vec![(None, None)]);
        assert_eq!(context(&agg, 6), vec![(None, None)]);
    }

    #[test]
    fn context_skips_repeated_batter() {
        use HalfInning::*;
        // Batter 1 appears twice in a row (e.g. inning ended on a pickoff).
        let pitches = vec![
            pitch(1, 1, Top, 1, 7),
            pitch(1, 1, Top, 2, 1),
            pitch(1, 2, Top, 3, 1),
            pitch(1, 2, Top, 4, 8),
        ];
        let agg = aggregate(&pitches, &geom(), BoundaryPolicy::CarryOver);
        assert_eq!(context(&agg, 1), vec![(Some(7), Some(8)), (Some(7), Some(8))]);
    }

    #[test]
    fn input_order_does_not_change_output() {
        let forward = aggregate(&small_game(), &geom(), BoundaryPolicy::Absent);
        let mut reversed_input = small_game();
        reversed_input.reverse();
        let reversed = aggregate(&reversed_input, &geom(), BoundaryPolicy::Absent);
        assert_eq!(forward.plate_appearances, reversed.plate_appearances);
    }

    #[test]
    fn unlocated_pitch_stays_in_pa() {
        let mut pitches = small_game();
        pitches[1].plate_x = None;
        let agg = aggregate(&pitches, &geom(), BoundaryPolicy::Absent);
        let first = &agg.plate_appearances[0];
        assert_eq!(first.total_pitches, 2);
        assert_eq!(first.located_pitches(), 1);
        assert_eq!(agg.summary.unlocated_pitches, 1);
    }

    #[test]
    fn mismatched_batter_pitch_dropped() {
        let mut pitches = small_game();
        pitches[1].batter = 99;
        let agg = aggregate(&pitches, &geom(), BoundaryPolicy::Absent);
        assert_eq!(agg.plate_appearances[0].total_pitches, 1);
        assert_eq!(agg.summary.mismatched_batter_pitches, 1);
        assert!(agg.plate_appearances.iter().all(|pa| pa.batter != 99));
    }

    #[test]
    fn pitching_change_mid_pa_records_both_pitchers() {
        let mut pitches = small_game();
        pitches[1].pitcher = 901;
        let agg = aggregate(&pitches, &geom(), BoundaryPolicy::Absent);
        let first = &agg.plate_appearances[0];
        assert_eq!(first.pitchers, vec![900, 901]);
    }

    #[test]
    fn empty_input() {
        let agg = aggregate(&[], &geom(), BoundaryPolicy::Absent);
        assert!(agg.plate_appearances.is_empty());
        assert_eq!(agg.summary.half_innings, 0);
    }
}
