// Layer adjusters: per-player context scores -> wOBA context boosts.
//
// Every adjuster returns the amount by which context inflated the observed
// wOBA (a "boost"). Positive means the context helped the hitter, so the
// composer subtracts it. `None` means the context score was missing; the
// composer treats it as zero and the output row carries a flag.

use serde::{Deserialize, Serialize};

use crate::config::Coefficients;
use crate::engine::opponents::NEUTRAL_FIP_MINUS;
use crate::engine::protection::ProtectionScore;

/// Park factor of a perfectly neutral park.
pub const NEUTRAL_PARK_FACTOR: f64 = 100.0;

// ---------------------------------------------------------------------------
// Layers and layer sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Protection,
    Park,
    Pitcher,
    Location,
}

impl Layer {
    /// Composition order. Fixed so sums are reproducible to the bit.
    pub const ALL: [Layer; 4] = [Layer::Protection, Layer::Park, Layer::Pitcher, Layer::Location];

    pub fn label(&self) -> &'static str {
        match self {
            Layer::Protection => "Lineup Protection",
            Layer::Park => "Park Factors",
            Layer::Pitcher => "Pitcher Quality",
            Layer::Location => "Pitch Location",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Layer::Protection => 1,
            Layer::Park => 1 << 1,
            Layer::Pitcher => 1 << 2,
            Layer::Location => 1 << 3,
        }
    }
}

/// Subset of the four layers enabled for a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerSet(u8);

impl LayerSet {
    pub const fn none() -> Self {
        LayerSet(0)
    }

    pub const fn all() -> Self {
        LayerSet(0b1111)
    }

    pub fn only(layer: Layer) -> Self {
        LayerSet(layer.bit())
    }

    pub fn with(self, layer: Layer) -> Self {
        LayerSet(self.0 | layer.bit())
    }

    pub fn without(self, layer: Layer) -> Self {
        LayerSet(self.0 & !layer.bit())
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Enabled layers in composition order.
    pub fn iter(&self) -> impl Iterator<Item = Layer> + '_ {
        Layer::ALL.into_iter().filter(move |l| self.contains(*l))
    }
}

impl FromIterator<Layer> for LayerSet {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        iter.into_iter().fold(LayerSet::none(), LayerSet::with)
    }
}

impl Serialize for LayerSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

/// League reference points every adjuster compares against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeagueBaselines {
    /// Mean observed wOBA over qualified batters.
    pub woba: f64,
    /// Mean heart-zone rate over qualified batters with a location profile.
    pub heart_pct: f64,
    /// Mean FIP- over rated pitchers; fills unrated matchups.
    pub fip_minus: f64,
    /// Mean behind-protection score over qualified batters that have one.
    /// Reported only: the protection adjuster compares against `woba`.
    pub protection_behind: Option<f64>,
}

// ---------------------------------------------------------------------------
// Adjusters
// ---------------------------------------------------------------------------

/// Protection boost: `(behind - league wOBA) * behind coefficient` plus the
/// same term for the in-front score. A term only counts when its coefficient
/// is non-zero; `None` if no counted term has a score.
pub fn protection_boost(score: Option<&ProtectionScore>, league_woba: f64, coefficients: &Coefficients) -> Option<f64> {
    let score = score?;
    let terms = [
        (score.behind, coefficients.protection_behind),
        (score.in_front, coefficients.protection_in_front),
    ];
    terms
        .into_iter()
        .filter(|(_, coef)| *coef != 0.0)
        .filter_map(|(value, coef)| value.map(|v| (v - league_woba) * coef))
        .fold(None, |acc, term| Some(acc.unwrap_or(0.0) + term))
}

/// Park boost. The park-neutral wOBA is `observed * 100 / park factor`; the
/// boost is what the park added on top of it. Multiplicative, so the same
/// park moves a .400 hitter further than a .300 hitter.
pub fn park_boost(observed_woba: f64, park_factor: Option<f64>) -> Option<f64> {
    let pf = park_factor.filter(|pf| pf.is_finite() && *pf > 0.0)?;
    let neutral = observed_woba * (NEUTRAL_PARK_FACTOR / pf);
    Some(observed_woba - neutral)
}

/// Pitcher-quality boost: `(mean opponent FIP- - 100) * coefficient`.
///
/// Facing weak pitching (FIP- above 100) inflated the hitter's line, so the
/// boost is positive and comes off the observed wOBA; facing aces gives a
/// negative boost that adds back.
pub fn pitcher_boost(mean_fip_minus: Option<f64>, coefficients: &Coefficients) -> Option<f64> {
    let fip_minus = mean_fip_minus.filter(|v| v.is_finite())?;
    Some((fip_minus - NEUTRAL_FIP_MINUS) * coefficients.pitcher)
}

/// Location boost: `(heart% - league heart%) * coefficient`.
pub fn location_boost(heart_pct: Option<f64>, league_heart_pct: f64, coefficients: &Coefficients) -> Option<f64> {
    let heart = heart_pct.filter(|v| v.is_finite())?;
    Some((heart - league_heart_pct) * coefficients.location)
}

/// One player's four boosts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerAdjustments {
    pub protection: Option<f64>,
    pub park: Option<f64>,
    pub pitcher: Option<f64>,
    pub location: Option<f64>,
}

impl LayerAdjustments {
    pub fn get(&self, layer: Layer) -> Option<f64> {
        match layer {
            Layer::Protection => self.protection,
            Layer::Park => self.park,
            Layer::Pitcher => self.pitcher,
            Layer::Location => self.location,
        }
    }

    /// Boost with a missing score read as league average.
    pub fn boost(&self, layer: Layer) -> f64 {
        self.get(layer).unwrap_or(0.0)
    }

    /// Sum of the enabled boosts, in `Layer::ALL` order.
    pub fn total(&self, layers: LayerSet) -> f64 {
        layers.iter().fold(0.0, |acc, layer| acc + self.boost(layer))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn coefficients() -> Coefficients {
        ModelConfig::default().coefficients
    }

    fn score(behind: Option<f64>, in_front: Option<f64>) -> ProtectionScore {
        ProtectionScore {
            behind,
            in_front,
            behind_samples: behind.map_or(0, |_| 1),
            in_front_samples: in_front.map_or(0, |_| 1),
            plate_appearances: 1,
            games: 1,
        }
    }

    // -- Layer sets --

    #[test]
    fn layer_set_membership() {
        let set = LayerSet::none().with(Layer::Park).with(Layer::Location);
        assert!(set.contains(Layer::Park));
        assert!(!set.contains(Layer::Pitcher));
        assert_eq!(set.len(), 2);
        assert_eq!(set.without(Layer::Park), LayerSet::only(Layer::Location));
        assert_eq!(LayerSet::all().len(), 4);
        assert!(LayerSet::none().is_empty());
    }

    #[test]
    fn layer_set_iterates_in_composition_order() {
        let set: LayerSet = [Layer::Location, Layer::Protection, Layer::Park].into_iter().collect();
        let order: Vec<Layer> = set.iter().collect();
        assert_eq!(order, vec![Layer::Protection, Layer::Park, Layer::Location]);
    }

    #[test]
    fn layer_labels() {
        assert_eq!(Layer::Pitcher.label(), "Pitcher Quality");
    }

    // -- Protection --

    #[test]
    fn protection_worked_example() {
        // On-deck .471 against a .331 league: +.140 * .15 = +.021.
        let boost = protection_boost(Some(&score(Some(0.471), None)), 0.331, &coefficients()).unwrap();
        assert!(approx_eq(boost, 0.021, 1e-12));
    }

    #[test]
    fn protection_sign_follows_score() {
        let c = coefficients();
        let above = protection_boost(Some(&score(Some(0.360), None)), 0.331, &c).unwrap();
        let below = protection_boost(Some(&score(Some(0.298), None)), 0.331, &c).unwrap();
        assert!(above > 0.0);
        assert!(below < 0.0);
        assert!(approx_eq(below, -0.033 * 0.15, 1e-12));
    }

    #[test]
    fn protection_in_front_unmodeled_by_default() {
        let c = coefficients();
        let only_front = protection_boost(Some(&score(None, Some(0.400))), 0.331, &c);
        assert_eq!(only_front, None);
        let both = protection_boost(Some(&score(Some(0.331), Some(0.400))), 0.331, &c).unwrap();
        assert!(approx_eq(both, 0.0, 1e-15));
    }

    #[test]
    fn protection_in_front_adds_when_modeled() {
        let mut c = coefficients();
        c.protection_in_front = 0.05;
        let boost = protection_boost(Some(&score(Some(0.431), Some(0.231))), 0.331, &c).unwrap();
        assert!(approx_eq(boost, 0.100 * 0.15 - 0.100 * 0.05, 1e-12));
    }

    #[test]
    fn protection_missing_score_is_absent() {
        assert_eq!(protection_boost(None, 0.331, &coefficients()), None);
        assert_eq!(protection_boost(Some(&score(None, None)), 0.331, &coefficients()), None);
    }

    // -- Park --

    #[test]
    fn park_coors_worked_example() {
        let boost = park_boost(0.315, Some(113.0)).unwrap();
        let adjusted = 0.315 - boost;
        assert!(approx_eq(adjusted, 0.315 * 100.0 / 113.0, 1e-12));
        assert!(approx_eq(adjusted, 0.279, 5e-4));
    }

    #[test]
    fn neutral_park_is_exactly_zero() {
        for woba in [0.250, 0.315, 0.421, 0.476] {
            assert_eq!(park_boost(woba, Some(100.0)), Some(0.0));
        }
    }

    #[test]
    fn pitcher_park_gives_negative_boost() {
        assert!(park_boost(0.320, Some(94.0)).unwrap() < 0.0);
    }

    #[test]
    fn park_is_multiplicative() {
        let low = park_boost(0.300, Some(110.0)).unwrap();
        let high = park_boost(0.400, Some(110.0)).unwrap();
        assert!(high > low);
        assert!(approx_eq(high / low, 0.400 / 0.300, 1e-9));
    }

    #[test]
    fn missing_or_invalid_park_is_absent() {
        assert_eq!(park_boost(0.315, None), None);
        assert_eq!(park_boost(0.315, Some(0.0)), None);
        assert_eq!(park_boost(0.315, Some(f64::NAN)), None);
    }

    // -- Pitcher --

    #[test]
    fn weak_schedule_is_a_positive_boost() {
        let boost = pitcher_boost(Some(110.0), &coefficients()).unwrap();
        assert!(approx_eq(boost, 0.010, 1e-12));
    }

    #[test]
    fn tough_schedule_is_a_negative_boost() {
        // Facing 90 FIP- pitchers: raw (100 - 90) * .001 = +.010 added back.
        let boost = pitcher_boost(Some(90.0), &coefficients()).unwrap();
        assert!(approx_eq(boost, -0.010, 1e-12));
    }

    #[test]
    fn average_schedule_is_zero() {
        assert_eq!(pitcher_boost(Some(100.0), &coefficients()), Some(0.0));
        assert_eq!(pitcher_boost(None, &coefficients()), None);
    }

    // -- Location --

    #[test]
    fn location_boost_against_league() {
        let c = coefficients();
        let boost = location_boost(Some(0.25), 0.15, &c).unwrap();
        assert!(approx_eq(boost, 0.015, 1e-12));
        assert!(location_boost(Some(0.10), 0.15, &c).unwrap() < 0.0);
        assert_eq!(location_boost(None, 0.15, &c), None);
    }

    // -- Totals --

    #[test]
    fn total_sums_enabled_layers_only() {
        let adj = LayerAdjustments {
            protection: Some(0.021),
            park: Some(0.036),
            pitcher: None,
            location: Some(-0.004),
        };
        assert_eq!(adj.total(LayerSet::none()), 0.0);
        assert!(approx_eq(adj.total(LayerSet::only(Layer::Park)), 0.036, 1e-15));
        assert!(approx_eq(adj.total(LayerSet::all()), 0.021 + 0.036 - 0.004, 1e-15));
        assert_eq!(adj.boost(Layer::Pitcher), 0.0);
    }
}
