// Opposing pitcher quality faced by each batter.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::QualificationConfig;
use crate::data::types::{GameId, PitcherSeason, PlayerId};
use crate::engine::aggregate::PlateAppearance;

/// FIP- of an exactly league-average pitcher.
pub const NEUTRAL_FIP_MINUS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentProfile {
    /// Mean FIP- over distinct (game, pitcher) matchups.
    pub mean_fip_minus: f64,
    pub matchups: u32,
    pub unique_pitchers: u32,
    /// Matchups whose pitcher had no qualified row, counted at a neutral 100.
    pub unrated_matchups: u32,
}

impl OpponentProfile {
    /// Mean FIP- faced, or `None` when no matchup was against a rated pitcher.
    pub fn rated_fip_minus(&self) -> Option<f64> {
        (self.unrated_matchups < self.matchups).then_some(self.mean_fip_minus)
    }
}

/// FIP- of every pitcher meeting the innings and batters-faced minimums.
/// A later row for the same pitcher replaces an earlier one.
pub fn rated_pitchers(pitchers: &[PitcherSeason], qualification: &QualificationConfig) -> BTreeMap<PlayerId, f64> {
    pitchers
        .iter()
        .filter(|p| p.ip >= qualification.min_pitcher_ip && p.tbf >= qualification.min_pitcher_tbf)
        .filter(|p| p.fip_minus.is_finite())
        .map(|p| (p.player_id, p.fip_minus))
        .collect()
}

/// Sample mean FIP- of the rated pitchers, or 100 when there are none.
pub fn league_fip_minus(rated: &BTreeMap<PlayerId, f64>) -> f64 {
    if rated.is_empty() {
        return NEUTRAL_FIP_MINUS;
    }
    rated.values().sum::<f64>() / rated.len() as f64
}

/// Average opponent FIP- for every batter in `pas`. Each pitcher counts once
/// per game no matter how many PAs the batter had against him. Unrated
/// pitchers count as exactly league average (100), so they never move the
/// pitcher adjustment.
pub fn profile_opponents(pas: &[PlateAppearance], rated: &BTreeMap<PlayerId, f64>) -> BTreeMap<PlayerId, OpponentProfile> {
    let mut matchups: BTreeMap<PlayerId, BTreeSet<(GameId, PlayerId)>> = BTreeMap::new();
    for pa in pas {
        let set = matchups.entry(pa.batter).or_default();
        for &pitcher in &pa.pitchers {
            set.insert((pa.key.game_id, pitcher));
        }
    }

    matchups
        .into_iter()
        .map(|(batter, set)| {
            let mut sum = 0.0;
            let mut unrated = 0u32;
            for (_, pitcher) in &set {
                match rated.get(pitcher) {
                    Some(fip_minus) => sum += fip_minus,
                    None => {
                        sum += NEUTRAL_FIP_MINUS;
                        unrated += 1;
                    }
                }
            }
            let unique_pitchers = set.iter().map(|(_, p)| *p).collect::<BTreeSet<_>>().len();
            if unrated > 0 {
                debug!("batter {}: {} of {} matchups unrated", batter, unrated, set.len());
            }
            let profile = OpponentProfile {
                mean_fip_minus: sum / set.len() as f64,
                matchups: set.len() as u32,
                unique_pitchers: unique_pitchers as u32,
                unrated_matchups: unrated,
            };
            (batter, profile)
        })
        .collect()
}
