// Lineup protection scores: mean season wOBA of the hitters around a batter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::data::types::{GameId, PlayerId};
use crate::engine::aggregate::PlateAppearance;

/// Protection context for one batter.
///
/// `behind` averages the on-deck hitter's season wOBA over the batter's
/// PAs; `in_front` does the same for the preceding hitter. Each is `None`
/// when no PA had a context hitter with a known season wOBA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectionScore {
    pub behind: Option<f64>,
    pub in_front: Option<f64>,
    pub behind_samples: u32,
    pub in_front_samples: u32,
    pub plate_appearances: u32,
    pub games: u32,
}

impl ProtectionScore {
    /// Neither score could be computed.
    pub fn is_insufficient(&self) -> bool {
        self.behind.is_none() && self.in_front.is_none()
    }
}

#[derive(Default)]
struct Accumulator {
    behind_sum: f64,
    behind_n: u32,
    in_front_sum: f64,
    in_front_n: u32,
    pas: u32,
    games: BTreeSet<GameId>,
}

fn mean(sum: f64, n: u32) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

/// Score every batter that appears in `pas`. Context hitters missing from
/// `season_woba` contribute no sample.
pub fn score_protection(
    pas: &[PlateAppearance],
    season_woba: &HashMap<PlayerId, f64>,
) -> BTreeMap<PlayerId, ProtectionScore> {
    let mut acc: BTreeMap<PlayerId, Accumulator> = BTreeMap::new();

    for pa in pas {
        let entry = acc.entry(pa.batter).or_default();
        entry.pas += 1;
        entry.games.insert(pa.key.game_id);

        if let Some(woba) = pa.on_deck.and_then(|id| season_woba.get(&id)) {
            entry.behind_sum += woba;
            entry.behind_n += 1;
        }
        if let Some(woba) = pa.preceding.and_then(|id| season_woba.get(&id)) {
            entry.in_front_sum += woba;
            entry.in_front_n += 1;
        }
    }

    acc.into_iter()
        .map(|(batter, a)| {
            let score = ProtectionScore {
                behind: mean(a.behind_sum, a.behind_n),
                in_front: mean(a.in_front_sum, a.in_front_n),
                behind_samples: a.behind_n,
                in_front_samples: a.in_front_n,
                plate_appearances: a.pas,
                games: a.games.len() as u32,
            };
            (batter, score)
        })
        .collect()
}
