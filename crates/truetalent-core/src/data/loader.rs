// Source table loading and normalization.
//
// Reads Statcast pitch-level CSVs (possibly split into several part files)
// and FanGraphs batting, pitching, park factor and wOBA constants exports.
// Extra columns are ignored; malformed rows are skipped with a warning.

use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::teams::normalize_team;
use crate::data::types::{
    BatterSeason, HalfInning, ParkFactor, PitchEvent, PitcherSeason, SourceTables, WobaConstants,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("no pitch CSV files found under {path}")]
    NoPitchFiles { path: String },

    #[error("required table `{table}` produced zero valid rows")]
    MissingTable { table: &'static str },
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Statcast pitch row. Only the columns the engine needs are named; the
/// other ~90 Statcast columns are ignored by serde.
#[derive(Debug, Deserialize)]
struct RawPitch {
    game_pk: u32,
    inning: u8,
    inning_topbot: String,
    at_bat_number: u32,
    batter: u32,
    pitcher: u32,
    #[serde(default, deserialize_with = "lenient_float")]
    plate_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    plate_z: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    sz_top: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    sz_bot: Option<f64>,
}

/// FanGraphs batting leaderboard row.
#[derive(Debug, Deserialize)]
struct RawBatter {
    #[serde(rename = "MLBAMID", alias = "playerid", alias = "player_id")]
    player_id: u32,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Team", default)]
    team: String,
    #[serde(rename = "PA")]
    pa: f64,
    #[serde(rename = "wOBA", alias = "woba")]
    woba: f64,
}

/// FanGraphs pitching leaderboard row. Either FIP- or raw FIP must be present.
#[derive(Debug, Deserialize)]
struct RawPitcher {
    #[serde(rename = "MLBAMID", alias = "playerid", alias = "player_id")]
    player_id: u32,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Team", default)]
    team: String,
    #[serde(rename = "FIP-", alias = "FIP_minus", alias = "fip_minus", default, deserialize_with = "lenient_float")]
    fip_minus: Option<f64>,
    #[serde(rename = "FIP", default, deserialize_with = "lenient_float")]
    fip: Option<f64>,
    #[serde(rename = "IP")]
    ip: f64,
    #[serde(rename = "TBF", default, deserialize_with = "lenient_float")]
    tbf: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawParkFactor {
    #[serde(rename = "Team")]
    team: String,
    #[serde(rename = "Basic (5yr)", alias = "park_factor", alias = "PF")]
    park_factor: f64,
}

#[derive(Debug, Deserialize)]
struct RawWobaConstants {
    #[serde(rename = "Season")]
    season: u16,
    #[serde(rename = "wOBAScale")]
    woba_scale: f64,
    #[serde(rename = "R/PA")]
    runs_per_pa: f64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Blank, unparsable ("NA", "null") and non-finite values all become `None`.
fn lenient_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

fn io_err(path: &Path, source: std::io::Error) -> DataError {
    DataError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn open(path: &Path) -> Result<std::fs::File, DataError> {
    std::fs::File::open(path).map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_pitches_from_reader<R: Read>(rdr: R) -> Result<Vec<PitchEvent>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut pitches = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize::<RawPitch>() {
        match result {
            Ok(raw) => {
                let Some(half) = HalfInning::from_str_side(&raw.inning_topbot) else {
                    debug!("skipping pitch with unknown inning_topbot '{}'", raw.inning_topbot);
                    skipped += 1;
                    continue;
                };
                pitches.push(PitchEvent {
                    game_id: raw.game_pk,
                    inning: raw.inning,
                    half,
                    at_bat_number: raw.at_bat_number,
                    batter: raw.batter,
                    pitcher: raw.pitcher,
                    plate_x: raw.plate_x,
                    plate_z: raw.plate_z,
                    sz_top: raw.sz_top,
                    sz_bot: raw.sz_bot,
                });
            }
            Err(e) => {
                debug!("skipping malformed pitch row: {}", e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("skipped {} malformed pitch rows", skipped);
    }
    Ok(pitches)
}

fn load_batters_from_reader<R: Read>(rdr: R) -> Result<Vec<BatterSeason>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut batters = Vec::new();
    for result in reader.deserialize::<RawBatter>() {
        match result {
            Ok(raw) => {
                if !raw.woba.is_finite() || !raw.pa.is_finite() {
                    warn!("skipping batter '{}': non-finite PA/wOBA value", raw.name.trim());
                    continue;
                }
                batters.push(BatterSeason {
                    player_id: raw.player_id,
                    name: raw.name.trim().to_string(),
                    team: normalize_team(&raw.team),
                    pa: raw.pa.max(0.0).round() as u32,
                    woba: raw.woba,
                });
            }
            Err(e) => {
                warn!("skipping malformed batter row: {}", e);
            }
        }
    }
    Ok(batters)
}

fn load_pitchers_from_reader<R: Read>(rdr: R) -> Result<Vec<PitcherSeason>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut raws = Vec::new();
    for result in reader.deserialize::<RawPitcher>() {
        match result {
            Ok(raw) if raw.ip.is_finite() => raws.push(raw),
            Ok(raw) => warn!("skipping pitcher '{}': non-finite IP value", raw.name.trim()),
            Err(e) => warn!("skipping malformed pitcher row: {}", e),
        }
    }

    // Rows without FIP- are indexed against the table's own mean FIP.
    let fips: Vec<f64> = raws.iter().filter_map(|r| r.fip).collect();
    let league_fip = if fips.is_empty() {
        None
    } else {
        Some(fips.iter().sum::<f64>() / fips.len() as f64).filter(|v| *v > 0.0)
    };

    let mut pitchers = Vec::with_capacity(raws.len());
    for raw in raws {
        let fip_minus = raw
            .fip_minus
            .or_else(|| Some(raw.fip? / league_fip? * 100.0));
        let Some(fip_minus) = fip_minus else {
            warn!("skipping pitcher '{}': neither FIP- nor FIP present", raw.name.trim());
            continue;
        };
        pitchers.push(PitcherSeason {
            player_id: raw.player_id,
            name: raw.name.trim().to_string(),
            team: normalize_team(&raw.team),
            fip_minus,
            ip: raw.ip,
            tbf: raw.tbf.map(|v| v.max(0.0).round() as u32).unwrap_or(0),
        });
    }
    Ok(pitchers)
}

fn load_parks_from_reader<R: Read>(rdr: R) -> Result<Vec<ParkFactor>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut parks: Vec<ParkFactor> = Vec::new();
    for result in reader.deserialize::<RawParkFactor>() {
        match result {
            Ok(raw) => {
                if !raw.park_factor.is_finite() || raw.park_factor <= 0.0 {
                    warn!("skipping park factor for '{}': must be positive", raw.team.trim());
                    continue;
                }
                let team = normalize_team(&raw.team);
                if let Some(existing) = parks.iter_mut().find(|p| p.team == team) {
                    warn!("duplicate park factor for '{}', using latest value", team);
                    existing.park_factor = raw.park_factor;
                } else {
                    parks.push(ParkFactor {
                        team,
                        park_factor: raw.park_factor,
                    });
                }
            }
            Err(e) => {
                warn!("skipping malformed park factor row: {}", e);
            }
        }
    }
    Ok(parks)
}

/// Pick the requested season, or the latest one when `season` is `None` or
/// not present in the table.
fn load_woba_constants_from_reader<R: Read>(
    rdr: R,
    season: Option<u16>,
) -> Result<Option<WobaConstants>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawWobaConstants>() {
        match result {
            Ok(raw) if raw.woba_scale > 0.0 && raw.runs_per_pa > 0.0 => rows.push(WobaConstants {
                season: raw.season,
                woba_scale: raw.woba_scale,
                runs_per_pa: raw.runs_per_pa,
            }),
            Ok(raw) => warn!("skipping wOBA constants for {}: non-positive scale", raw.season),
            Err(e) => warn!("skipping malformed wOBA constants row: {}", e),
        }
    }

    let wanted = season.and_then(|s| rows.iter().find(|r| r.season == s).copied());
    if wanted.is_none() {
        if let Some(s) = season {
            warn!("no wOBA constants for season {}, falling back to latest", s);
        }
    }
    Ok(wanted.or_else(|| rows.iter().max_by_key(|r| r.season).copied()))
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

/// Expand configured pitch entries into CSV files. Directories contribute
/// every `*.csv` file directly inside them, sorted by name so part files
/// load in order.
pub fn resolve_pitch_files(entries: &[PathBuf]) -> Result<Vec<PathBuf>, DataError> {
    let mut files = Vec::new();
    for entry in entries {
        if entry.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(entry)
                .map_err(|e| io_err(entry, e))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
                .collect();
            if found.is_empty() {
                return Err(DataError::NoPitchFiles {
                    path: entry.display().to_string(),
                });
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(entry.clone());
        }
    }
    Ok(files)
}

/// Load and concatenate pitch events from every file, in order.
pub fn load_pitches(files: &[PathBuf]) -> Result<Vec<PitchEvent>, DataError> {
    let mut pitches = Vec::new();
    for path in files {
        let part = load_pitches_from_reader(open(path)?).map_err(|e| DataError::Csv {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!("loaded {} pitches from {}", part.len(), path.display());
        pitches.extend(part);
    }
    Ok(pitches)
}

pub fn load_batters(path: &Path) -> Result<Vec<BatterSeason>, DataError> {
    load_batters_from_reader(open(path)?).map_err(|e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_pitchers(path: &Path) -> Result<Vec<PitcherSeason>, DataError> {
    load_pitchers_from_reader(open(path)?).map_err(|e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_park_factors(path: &Path) -> Result<Vec<ParkFactor>, DataError> {
    load_parks_from_reader(open(path)?).map_err(|e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_woba_constants(path: &Path, season: Option<u16>) -> Result<Option<WobaConstants>, DataError> {
    load_woba_constants_from_reader(open(path)?, season).map_err(|e| DataError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load every source table named in the config, resolving relative paths
/// against `base_dir`. Fails fast when a file is missing or a required
/// table is empty, before any computation starts.
pub fn load_all(config: &Config, base_dir: &Path) -> Result<SourceTables, DataError> {
    let paths = &config.pipeline.data_paths;
    let entries: Vec<PathBuf> = paths.pitches.iter().map(|p| base_dir.join(p)).collect();

    let pitch_files = resolve_pitch_files(&entries)?;
    let pitches = load_pitches(&pitch_files)?;
    info!("Pitches: {} rows from {} file(s)", pitches.len(), pitch_files.len());

    let batters = load_batters(&base_dir.join(&paths.batting))?;
    info!("Batting: {} players", batters.len());

    let pitchers = load_pitchers(&base_dir.join(&paths.pitching))?;
    info!("Pitching: {} pitchers", pitchers.len());

    let parks = load_park_factors(&base_dir.join(&paths.park_factors))?;
    info!("Park factors: {} teams", parks.len());

    let woba_constants = match &paths.woba_constants {
        Some(p) => load_woba_constants(&base_dir.join(p), config.model.talent.season)?,
        None => None,
    };

    let tables = SourceTables {
        pitches,
        batters,
        pitchers,
        parks,
        woba_constants,
    };
    ensure_required_tables(&tables)?;
    Ok(tables)
}

/// The four required tables must each have at least one row.
pub fn ensure_required_tables(tables: &SourceTables) -> Result<(), DataError> {
    if tables.pitches.is_empty() {
        return Err(DataError::MissingTable { table: "pitches" });
    }
    if tables.batters.is_empty() {
        return Err(DataError::MissingTable { table: "batting" });
    }
    if tables.pitchers.is_empty() {
        return Err(DataError::MissingTable { table: "pitching" });
    }
    if tables.parks.is_empty() {
        return Err(DataError::MissingTable { table: "park_factors" });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
