// Source table row types shared by the loader and the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// MLBAM player identifier (batters and pitchers share one id space).
pub type PlayerId = u32;

/// Statcast `game_pk`.
pub type GameId = u32;

/// Which side of an inning a pitch belongs to. The away team bats in the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HalfInning {
    Top,
    Bottom,
}

impl HalfInning {
    /// Parse Statcast's `inning_topbot` value ("Top" / "Bot").
    pub fn from_str_side(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "t" => Some(HalfInning::Top),
            "bot" | "bottom" | "b" => Some(HalfInning::Bottom),
            _ => None,
        }
    }
}

/// One pitch. Location and zone bounds are optional because Statcast leaves
/// them blank for a small share of pitches; the engine decides what to do.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchEvent {
    pub game_id: GameId,
    pub inning: u8,
    pub half: HalfInning,
    pub at_bat_number: u32,
    pub batter: PlayerId,
    pub pitcher: PlayerId,
    pub plate_x: Option<f64>,
    pub plate_z: Option<f64>,
    pub sz_top: Option<f64>,
    pub sz_bot: Option<f64>,
}

/// Season batting line for one hitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BatterSeason {
    pub player_id: PlayerId,
    pub name: String,
    pub team: String,
    pub pa: u32,
    pub woba: f64,
}

/// Season pitching line for one pitcher. FIP- is indexed so 100 is league
/// average and lower is better.
#[derive(Debug, Clone, PartialEq)]
pub struct PitcherSeason {
    pub player_id: PlayerId,
    pub name: String,
    pub team: String,
    pub fip_minus: f64,
    pub ip: f64,
    pub tbf: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParkFactor {
    pub team: String,
    pub park_factor: f64,
}

/// Season wOBA scale and run environment, only needed for the wRC+ index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WobaConstants {
    pub season: u16,
    pub woba_scale: f64,
    pub runs_per_pa: f64,
}

/// All source tables, loaded once and then only borrowed.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub pitches: Vec<PitchEvent>,
    pub batters: Vec<BatterSeason>,
    pub pitchers: Vec<PitcherSeason>,
    pub parks: Vec<ParkFactor>,
    pub woba_constants: Option<WobaConstants>,
}

impl SourceTables {
    /// Season wOBA by player, over every batting row regardless of
    /// qualification. Later rows win on duplicate ids.
    pub fn woba_lookup(&self) -> HashMap<PlayerId, f64> {
        self.batters.iter().map(|b| (b.player_id, b.woba)).collect()
    }

    /// Park factor by team abbreviation.
    pub fn park_lookup(&self) -> HashMap<&str, f64> {
        self.parks
            .iter()
            .map(|p| (p.team.as_str(), p.park_factor))
            .collect()
    }
}
