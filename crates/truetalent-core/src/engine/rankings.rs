// Leaderboards over a composed projection table.

use serde::Serialize;

use crate::engine::compose::{ProjectionRow, ProjectionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Leaderboard {
    /// Highest adjusted wOBA.
    TopAdjusted,
    /// Context helped most; only rows above the median boost.
    MostBoosted,
    /// Context hurt most ("biggest risers"); only rows below the median.
    MostSuppressed,
    BestProtected,
    WorstProtected,
    /// Largest park boost.
    ParkEffect,
}

impl Leaderboard {
    pub const ALL: [Leaderboard; 6] = [
        Leaderboard::TopAdjusted,
        Leaderboard::MostBoosted,
        Leaderboard::MostSuppressed,
        Leaderboard::BestProtected,
        Leaderboard::WorstProtected,
        Leaderboard::ParkEffect,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Leaderboard::TopAdjusted => "Top adjusted wOBA",
            Leaderboard::MostBoosted => "Most context-boosted",
            Leaderboard::MostSuppressed => "Biggest risers (context-suppressed)",
            Leaderboard::BestProtected => "Best lineup protection",
            Leaderboard::WorstProtected => "Worst lineup protection",
            Leaderboard::ParkEffect => "Largest park boost",
        }
    }
}

/// Median of `values`; mean of the middle pair for even counts.
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Sort by `key` (ties on player id) and keep the first `limit`.
fn ranked<'a>(
    mut rows: Vec<&'a ProjectionRow>,
    key: impl Fn(&ProjectionRow) -> f64,
    descending: bool,
    limit: usize,
) -> Vec<&'a ProjectionRow> {
    rows.sort_by(|a, b| {
        let ord = key(a).total_cmp(&key(b));
        let ord = if descending { ord.reverse() } else { ord };
        ord.then(a.player_id.cmp(&b.player_id))
    });
    rows.truncate(limit);
    rows
}

impl ProjectionTable {
    /// Median context boost across every row in the table.
    pub fn median_context_boost(&self) -> Option<f64> {
        median(self.rows.iter().map(ProjectionRow::context_boost).collect())
    }

    /// Up to `limit` rows for `board`, among rows with at least `min_pa`.
    /// Ties break on player id.
    pub fn leaderboard(&self, board: Leaderboard, limit: usize, min_pa: u32) -> Vec<&ProjectionRow> {
        let eligible = self.rows.iter().filter(|r| r.pa >= min_pa);
        let behind = |r: &ProjectionRow| r.protection_behind.unwrap_or(f64::NAN);

        match board {
            Leaderboard::TopAdjusted => ranked(eligible.collect(), |r| r.adjusted_woba, true, limit),
            Leaderboard::MostBoosted | Leaderboard::MostSuppressed => {
                let Some(m) = self.median_context_boost() else {
                    return Vec::new();
                };
                let boosted = board == Leaderboard::MostBoosted;
                let rows = eligible
                    .filter(|r| if boosted { r.context_boost() > m } else { r.context_boost() < m })
                    .collect();
                ranked(rows, ProjectionRow::context_boost, boosted, limit)
            }
            Leaderboard::BestProtected | Leaderboard::WorstProtected => {
                let rows = eligible.filter(|r| r.protection_behind.is_some()).collect();
                ranked(rows, behind, board == Leaderboard::BestProtected, limit)
            }
            Leaderboard::ParkEffect => {
                let rows = eligible.filter(|r| !r.missing_park).collect();
                ranked(rows, |r| r.park_adj, true, limit)
            }
        }
    }
}
