// Context engine: pitches -> plate appearances -> context tables -> projections.

pub mod aggregate;
pub mod compose;
pub mod layers;
pub mod location;
pub mod opponents;
pub mod protection;
pub mod rankings;

use std::collections::BTreeMap;

use tracing::info;

use crate::config::{Config, ModelConfig, PipelineConfig};
use crate::data::types::{PlayerId, SourceTables};

use aggregate::{aggregate, AggregationSummary, PlateAppearance};
use compose::ProjectionTable;
use layers::LayerSet;
use location::{profile_locations, LocationProfile};
use opponents::{league_fip_minus, profile_opponents, rated_pitchers, OpponentProfile};
use protection::{score_protection, ProtectionScore};

/// Everything derived from the pitch data. Built once per load and only
/// borrowed afterwards; toggling layers never rebuilds it.
#[derive(Debug, Clone, Default)]
pub struct ContextTables {
    pub summary: AggregationSummary,
    pub plate_appearances: Vec<PlateAppearance>,
    pub protection: BTreeMap<PlayerId, ProtectionScore>,
    pub locations: BTreeMap<PlayerId, LocationProfile>,
    pub opponents: BTreeMap<PlayerId, OpponentProfile>,
    pub league_fip_minus: f64,
}

impl ContextTables {
    pub fn build(tables: &SourceTables, model: &ModelConfig, pipeline: &PipelineConfig) -> Self {
        let agg = aggregate(&tables.pitches, &model.zone, pipeline.boundary);
        info!(
            "Aggregated {} pitches into {} PAs over {} half-innings ({} unlocated, {} mismatched)",
            agg.summary.pitches,
            agg.summary.plate_appearances,
            agg.summary.half_innings,
            agg.summary.unlocated_pitches,
            agg.summary.mismatched_batter_pitches
        );

        let protection = score_protection(&agg.plate_appearances, &tables.woba_lookup());
        let locations = profile_locations(&agg.plate_appearances);

        let rated = rated_pitchers(&tables.pitchers, &pipeline.qualification);
        let league_fip_minus = league_fip_minus(&rated);
        let opponents = profile_opponents(&agg.plate_appearances, &rated);
        info!(
            "Context tables: {} protection scores, {} location profiles, {} opponent profiles ({} rated pitchers, league FIP- {:.1})",
            protection.len(),
            locations.len(),
            opponents.len(),
            rated.len(),
            league_fip_minus
        );

        ContextTables {
            summary: agg.summary,
            plate_appearances: agg.plate_appearances,
            protection,
            locations,
            opponents,
            league_fip_minus,
        }
    }
}

/// Source tables plus their context, ready to compose any layer subset.
pub struct Projector<'a> {
    tables: &'a SourceTables,
    config: &'a Config,
    context: ContextTables,
}

impl<'a> Projector<'a> {
    pub fn new(tables: &'a SourceTables, config: &'a Config) -> Self {
        let context = ContextTables::build(tables, &config.model, &config.pipeline);
        Projector {
            tables,
            config,
            context,
        }
    }

    pub fn context(&self) -> &ContextTables {
        &self.context
    }

    /// Compose with an explicit layer set.
    pub fn project(&self, layers: LayerSet) -> ProjectionTable {
        compose::project(
            self.tables,
            &self.context,
            &self.config.model,
            &self.config.pipeline.qualification,
            layers,
        )
    }

    /// Compose with the layers enabled in pipeline.toml.
    pub fn project_configured(&self) -> ProjectionTable {
        self.project(self.config.pipeline.layers)
    }
}
