// Projection composer: layer boosts -> adjusted, true-talent wOBA and wRC+.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::config::{ModelConfig, QualificationConfig, TalentConfig};
use crate::data::types::{BatterSeason, PlayerId, SourceTables, WobaConstants};
use crate::engine::layers::{
    location_boost, park_boost, pitcher_boost, protection_boost, LayerAdjustments, LayerSet,
    LeagueBaselines,
};
use crate::engine::ContextTables;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One qualified batter. Flat so it serializes to a single CSV record.
///
/// The four `*_adj` columns are always reported, enabled or not; `total_adj`
/// sums only the enabled ones. Absent adjustments are written as zero with
/// the matching flag set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRow {
    pub player_id: PlayerId,
    pub name: String,
    pub team: String,
    pub pa: u32,
    pub observed_woba: f64,
    pub protection_behind: Option<f64>,
    pub protection_in_front: Option<f64>,
    pub park_factor: Option<f64>,
    pub opp_fip_minus: Option<f64>,
    pub unique_pitchers: Option<u32>,
    pub heart_pct: Option<f64>,
    pub zone_pct: Option<f64>,
    pub chase_pct: Option<f64>,
    pub waste_pct: Option<f64>,
    /// PAs found in the pitch data, and the games they span.
    pub tracked_pa: u32,
    pub games: u32,
    pub protection_adj: f64,
    pub park_adj: f64,
    pub pitcher_adj: f64,
    pub location_adj: f64,
    pub total_adj: f64,
    pub adjusted_woba: f64,
    pub true_talent_woba: f64,
    pub wrc_plus: Option<f64>,
    pub insufficient_protection: bool,
    pub missing_park: bool,
    pub missing_opponents: bool,
    pub missing_location: bool,
}

impl ProjectionRow {
    /// How much the enabled context inflated the observed line.
    pub fn context_boost(&self) -> f64 {
        self.observed_woba - self.adjusted_woba
    }
}

/// wOBA-to-runs conversion used for wRC+.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearWeights {
    pub woba_scale: f64,
    pub runs_per_pa: f64,
}

/// Result of one composition. Rows are ordered by player id.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionTable {
    pub layers: LayerSet,
    pub baselines: LeagueBaselines,
    pub linear_weights: Option<LinearWeights>,
    pub rows: Vec<ProjectionRow>,
}

impl ProjectionTable {
    pub fn get(&self, player_id: PlayerId) -> Option<&ProjectionRow> {
        self.rows
            .binary_search_by_key(&player_id, |r| r.player_id)
            .ok()
            .map(|i| &self.rows[i])
    }
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

/// Batters meeting the PA minimum, one per id, id order. Duplicates resolve
/// first (later rows win), so a stale qualifying row never shadows the latest.
pub fn qualified_batters<'a>(batters: &'a [BatterSeason], qualification: &QualificationConfig) -> Vec<&'a BatterSeason> {
    let by_id: BTreeMap<PlayerId, &BatterSeason> = batters.iter().map(|b| (b.player_id, b)).collect();
    by_id
        .into_values()
        .filter(|b| b.pa >= qualification.min_batter_pa)
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// League reference points over the qualified population.
pub fn league_baselines(qualified: &[&BatterSeason], context: &ContextTables, model: &ModelConfig) -> LeagueBaselines {
    let woba = mean(qualified.iter().map(|b| b.woba)).unwrap_or(0.0);
    let heart_pct = mean(
        qualified
            .iter()
            .filter_map(|b| context.locations.get(&b.player_id))
            .map(|p| p.heart_pct),
    )
    .unwrap_or(model.zone.fallback_heart_pct);
    let protection_behind = mean(
        qualified
            .iter()
            .filter_map(|b| context.protection.get(&b.player_id))
            .filter_map(|s| s.behind),
    );
    LeagueBaselines {
        woba,
        heart_pct,
        fip_minus: context.league_fip_minus,
        protection_behind,
    }
}

/// Loaded constants win; otherwise both model.toml values must be set.
pub fn linear_weights(constants: Option<&WobaConstants>, talent: &TalentConfig) -> Option<LinearWeights> {
    if let Some(c) = constants {
        return Some(LinearWeights {
            woba_scale: c.woba_scale,
            runs_per_pa: c.runs_per_pa,
        });
    }
    match (talent.woba_scale, talent.runs_per_pa) {
        (Some(woba_scale), Some(runs_per_pa)) => Some(LinearWeights {
            woba_scale,
            runs_per_pa,
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Talent summary
// ---------------------------------------------------------------------------

/// Shrink an adjusted wOBA toward the league mean by `regression`.
pub fn true_talent(adjusted_woba: f64, league_woba: f64, regression: f64) -> f64 {
    adjusted_woba * (1.0 - regression) + league_woba * regression
}

/// wRC+-style index: 100 is league average.
pub fn wrc_plus(woba: f64, league_woba: f64, weights: &LinearWeights) -> f64 {
    ((woba - league_woba) / weights.woba_scale + weights.runs_per_pa) / weights.runs_per_pa * 100.0
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// All four boosts for one batter, whether or not their layer is enabled.
pub fn adjustments_for(
    batter: &BatterSeason,
    park_factor: Option<f64>,
    context: &ContextTables,
    baselines: &LeagueBaselines,
    model: &ModelConfig,
) -> LayerAdjustments {
    let c = &model.coefficients;
    LayerAdjustments {
        protection: protection_boost(context.protection.get(&batter.player_id), baselines.woba, c),
        park: park_boost(batter.woba, park_factor),
        pitcher: pitcher_boost(
            context.opponents.get(&batter.player_id).and_then(|o| o.rated_fip_minus()),
            c,
        ),
        location: location_boost(
            context.locations.get(&batter.player_id).map(|l| l.heart_pct),
            baselines.heart_pct,
            c,
        ),
    }
}

/// Compose the result table for one enabled-layer set. Pure: the same
/// inputs always produce the same table, bit for bit.
pub fn project(
    tables: &SourceTables,
    context: &ContextTables,
    model: &ModelConfig,
    qualification: &QualificationConfig,
    layers: LayerSet,
) -> ProjectionTable {
    let qualified = qualified_batters(&tables.batters, qualification);
    let baselines = league_baselines(&qualified, context, model);
    let weights = linear_weights(tables.woba_constants.as_ref(), &model.talent);
    let parks = tables.park_lookup();

    let rows: Vec<ProjectionRow> = qualified
        .iter()
        .map(|batter| {
            let park_factor = parks.get(batter.team.as_str()).copied();
            let adj = adjustments_for(batter, park_factor, context, &baselines, model);
            let total_adj = adj.total(layers);
            let adjusted_woba = batter.woba - total_adj;
            let true_talent_woba = true_talent(adjusted_woba, baselines.woba, model.talent.regression);
            let protection = context.protection.get(&batter.player_id);
            let opponents = context.opponents.get(&batter.player_id);
            let location = context.locations.get(&batter.player_id);

            ProjectionRow {
                player_id: batter.player_id,
                name: batter.name.clone(),
                team: batter.team.clone(),
                pa: batter.pa,
                observed_woba: batter.woba,
                protection_behind: protection.and_then(|s| s.behind),
                protection_in_front: protection.and_then(|s| s.in_front),
                park_factor,
                opp_fip_minus: opponents.and_then(|o| o.rated_fip_minus()),
                unique_pitchers: opponents.map(|o| o.unique_pitchers),
                heart_pct: location.map(|l| l.heart_pct),
                zone_pct: location.map(|l| l.zone_pct),
                chase_pct: location.map(|l| l.chase_pct),
                waste_pct: location.map(|l| l.waste_pct),
                tracked_pa: protection.map_or(0, |s| s.plate_appearances),
                games: protection.map_or(0, |s| s.games),
                protection_adj: adj.protection.unwrap_or(0.0),
                park_adj: adj.park.unwrap_or(0.0),
                pitcher_adj: adj.pitcher.unwrap_or(0.0),
                location_adj: adj.location.unwrap_or(0.0),
                total_adj,
                adjusted_woba,
                true_talent_woba,
                wrc_plus: weights.as_ref().map(|w| wrc_plus(true_talent_woba, baselines.woba, w)),
                insufficient_protection: adj.protection.is_none(),
                missing_park: adj.park.is_none(),
                missing_opponents: adj.pitcher.is_none(),
                missing_location: adj.location.is_none(),
            }
        })
        .collect();

    info!(
        "Composed {} qualified batters with {} layer(s); league wOBA {:.3}",
        rows.len(),
        layers.len(),
        baselines.woba
    );
    let flagged = rows
        .iter()
        .filter(|r| r.insufficient_protection || r.missing_park || r.missing_opponents || r.missing_location)
        .count();
    if flagged > 0 {
        info!("{} batters have at least one missing context score", flagged);
    }

    ProjectionTable {
        layers,
        baselines,
        linear_weights: weights,
        rows,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{ParkFactor, PitcherSeason};
    use crate::engine::layers::Layer;
    use crate::engine::location::LocationProfile;
    use crate::engine::opponents::OpponentProfile;
    use crate::engine::protection::ProtectionScore;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn batter(id: u32, team: &str, pa: u32, woba: f64) -> BatterSeason {
        BatterSeason {
            player_id: id,
            name: format!("Batter {id}"),
            team: team.into(),
            pa,
            woba,
        }
    }

    fn behind(score: f64) -> ProtectionScore {
        ProtectionScore {
            behind: Some(score),
            in_front: None,
            behind_samples: 10,
            in_front_samples: 0,
            plate_appearances: 10,
            games: 3,
        }
    }

    fn opponents(fip_minus: f64) -> OpponentProfile {
        OpponentProfile {
            mean_fip_minus: fip_minus,
            matchups: 5,
            unique_pitchers: 5,
            unrated_matchups: 0,
        }
    }

    fn heart(pct: f64) -> LocationProfile {
        LocationProfile {
            located_pitches: 100,
            heart_pct: pct,
            zone_pct: 0.5,
            chase_pct: 0.3,
            waste_pct: 0.2,
        }
    }

    /// Three batters whose wOBAs average to .331.
    fn league() -> (SourceTables, ContextTables) {
        let tables = SourceTables {
            batters: vec![
                batter(1, "NYY", 600, 0.421),
                batter(2, "COL", 550, 0.315),
                batter(3, "SEA", 500, 0.257),
                batter(4, "NYY", 40, 0.500),
            ],
            pitchers: vec![PitcherSeason {
                player_id: 900,
                name: "P".into(),
                team: "BOS".into(),
                fip_minus: 100.0,
                ip: 100.0,
                tbf: 400,
            }],
            parks: vec![
                ParkFactor {
                    team: "NYY".into(),
                    park_factor: 100.0,
                },
                ParkFactor {
                    team: "COL".into(),
                    park_factor: 113.0,
                },
            ],
            ..Default::default()
        };
        let mut context = ContextTables::default();
        context.league_fip_minus = 100.0;
        context.protection.insert(1, behind(0.471));
        context.protection.insert(2, behind(0.331));
        context.opponents.insert(1, opponents(110.0));
        context.opponents.insert(2, opponents(90.0));
        context.locations.insert(1, heart(0.20));
        context.locations.insert(2, heart(0.10));
        (tables, context)
    }

    fn run(layers: LayerSet) -> ProjectionTable {
        let (tables, context) = league();
        project(&tables, &context, &ModelConfig::default(), &QualificationConfig::default(), layers)
    }

    #[test]
    fn only_qualified_batters_in_id_order() {
        let table = run(LayerSet::all());
        let ids: Vec<u32> = table.rows.iter().map(|r| r.player_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(approx_eq(table.baselines.woba, 0.331, 1e-12));
    }

    #[test]
    fn empty_layer_set_is_identity() {
        let table = run(LayerSet::none());
        for row in &table.rows {
            assert_eq!(row.adjusted_woba, row.observed_woba);
            assert_eq!(row.total_adj, 0.0);
        }
    }

    #[test]
    fn protection_only_worked_example() {
        let table = run(LayerSet::only(Layer::Protection));
        let judge = table.get(1).unwrap();
        assert!(approx_eq(judge.protection_adj, 0.021, 1e-12));
        assert!(approx_eq(judge.adjusted_woba, 0.400, 1e-12));
    }

    #[test]
    fn park_only_worked_example() {
        let table = run(LayerSet::only(Layer::Park));
        let rockie = table.get(2).unwrap();
        assert!(approx_eq(rockie.adjusted_woba, 0.279, 5e-4));
        // Neutral park leaves the line untouched.
        assert_eq!(table.get(1).unwrap().adjusted_woba, 0.421);
    }

    #[test]
    fn pitcher_sign() {
        let table = run(LayerSet::only(Layer::Pitcher));
        let weak_schedule = table.get(1).unwrap();
        assert!(approx_eq(weak_schedule.pitcher_adj, 0.010, 1e-12));
        assert!(weak_schedule.adjusted_woba < weak_schedule.observed_woba);
        let tough_schedule = table.get(2).unwrap();
        assert!(tough_schedule.adjusted_woba > tough_schedule.observed_woba);
    }

    #[test]
    fn location_against_qualified_heart_mean() {
        let table = run(LayerSet::only(Layer::Location));
        assert!(approx_eq(table.baselines.heart_pct, 0.15, 1e-12));
        assert!(approx_eq(table.get(1).unwrap().location_adj, 0.05 * 0.15, 1e-12));
        assert!(approx_eq(table.get(2).unwrap().location_adj, -0.05 * 0.15, 1e-12));
    }

    #[test]
    fn disabled_layers_are_reported_but_not_summed() {
        let table = run(LayerSet::only(Layer::Park));
        let judge = table.get(1).unwrap();
        assert!(judge.protection_adj > 0.0);
        assert_eq!(judge.total_adj, judge.park_adj);
    }

    #[test]
    fn batter_without_context_keeps_row_with_flags() {
        let table = run(LayerSet::all());
        let row = table.get(3).unwrap();
        assert!(row.insufficient_protection);
        assert!(row.missing_park);
        assert!(row.missing_opponents);
        assert!(row.missing_location);
        assert_eq!(row.total_adj, 0.0);
        assert_eq!(row.adjusted_woba, row.observed_woba);
    }

    #[test]
    fn true_talent_regresses_toward_league() {
        let table = run(LayerSet::none());
        let judge = table.get(1).unwrap();
        assert!(approx_eq(judge.true_talent_woba, 0.421 * 0.9 + 0.331 * 0.1, 1e-12));
        let weak = table.get(3).unwrap();
        assert!(weak.true_talent_woba > weak.adjusted_woba);
    }

    #[test]
    fn wrc_plus_is_100_at_league_average() {
        let weights = LinearWeights {
            woba_scale: 1.242,
            runs_per_pa: 0.117,
        };
        assert!(approx_eq(wrc_plus(0.331, 0.331, &weights), 100.0, 1e-9));
        assert!(wrc_plus(0.400, 0.331, &weights) > 100.0);
    }

    #[test]
    fn loaded_constants_override_model_weights() {
        let talent = ModelConfig::default().talent;
        let loaded = WobaConstants {
            season: 2023,
            woba_scale: 1.204,
            runs_per_pa: 0.122,
        };
        let w = linear_weights(Some(&loaded), &talent).unwrap();
        assert_eq!(w.woba_scale, 1.204);
        let fallback = linear_weights(None, &talent).unwrap();
        assert_eq!(fallback.runs_per_pa, 0.117);

        let mut bare = talent;
        bare.woba_scale = None;
        assert_eq!(linear_weights(None, &bare), None);
    }

    #[test]
    fn duplicate_batter_rows_keep_latest() {
        let batters = vec![batter(1, "NYY", 600, 0.300), batter(1, "NYY", 610, 0.310)];
        let q = qualified_batters(&batters, &QualificationConfig::default());
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].pa, 610);
    }

    #[test]
    fn duplicate_rows_resolve_before_qualification() {
        // The latest row is below the PA minimum, so the batter is out even
        // though an earlier row qualified.
        let batters = vec![batter(1, "NYY", 600, 0.300), batter(1, "NYY", 100, 0.400)];
        assert!(qualified_batters(&batters, &QualificationConfig::default()).is_empty());

        let tables = SourceTables {
            batters,
            ..Default::default()
        };
        assert_eq!(tables.woba_lookup()[&1], 0.400);
    }

    #[test]
    fn unrated_only_schedule_is_neutral_when_league_mean_is_not_100() {
        let (tables, mut context) = league();
        // Rated pool is a single ace; batter 3 saw only unrated relievers.
        context.league_fip_minus = 80.0;
        context.opponents.insert(
            3,
            OpponentProfile {
                mean_fip_minus: 100.0,
                matchups: 2,
                unique_pitchers: 2,
                unrated_matchups: 2,
            },
        );
        let table = project(
            &tables,
            &context,
            &ModelConfig::default(),
            &QualificationConfig::default(),
            LayerSet::only(Layer::Pitcher),
        );
        let row = table.get(3).unwrap();
        assert_eq!(row.pitcher_adj, 0.0);
        assert!(row.missing_opponents);
        assert_eq!(row.opp_fip_minus, None);
        assert_eq!(row.unique_pitchers, Some(2));
        assert_eq!(row.adjusted_woba, row.observed_woba);
        assert_eq!(table.baselines.fip_minus, 80.0);
        // Rated schedules still compare against 100, not the league mean.
        assert!(approx_eq(table.get(1).unwrap().pitcher_adj, 0.010, 1e-12));
    }

    #[test]
    fn rows_carry_zone_mix_and_sample_counts() {
        let table = run(LayerSet::all());
        let judge = table.get(1).unwrap();
        assert_eq!(judge.zone_pct, Some(0.5));
        assert_eq!(judge.chase_pct, Some(0.3));
        assert_eq!(judge.waste_pct, Some(0.2));
        assert_eq!(judge.unique_pitchers, Some(5));
        assert_eq!(judge.tracked_pa, 10);
        assert_eq!(judge.games, 3);
        let bare = table.get(3).unwrap();
        assert_eq!((bare.zone_pct, bare.unique_pitchers), (None, None));
        assert_eq!((bare.tracked_pa, bare.games), (0, 0));
    }
}
