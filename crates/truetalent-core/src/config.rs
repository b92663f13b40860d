// Configuration loading and parsing (model.toml, pipeline.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::output::OutputFormat;
use crate::engine::aggregate::BoundaryPolicy;
use crate::engine::layers::{Layer, LayerSet};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
}

// ---------------------------------------------------------------------------
// model.toml structs
// ---------------------------------------------------------------------------

/// Everything the layer adjusters and the zone classifier need. Passed by
/// reference into every stage so synthetic leagues can be tested without
/// touching files.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub coefficients: Coefficients,
    pub zone: ZoneGeometry,
    pub talent: TalentConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Coefficients {
    pub protection_behind: f64,
    #[serde(default)]
    pub protection_in_front: f64,
    pub pitcher: f64,
    pub location: f64,
}

/// Strike-zone geometry in feet. `default_top`/`default_bottom` stand in for
/// missing per-batter zone bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ZoneGeometry {
    pub plate_half_width: f64,
    pub heart_half_width: f64,
    pub heart_margin: f64,
    pub chase_buffer: f64,
    pub default_top: f64,
    pub default_bottom: f64,
    /// League heart rate used when no qualified batter has a location profile.
    pub fallback_heart_pct: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TalentConfig {
    /// Share of the adjusted wOBA pulled toward the league mean.
    pub regression: f64,
    #[serde(default)]
    pub season: Option<u16>,
    #[serde(default)]
    pub woba_scale: Option<f64>,
    #[serde(default)]
    pub runs_per_pa: Option<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            coefficients: Coefficients {
                protection_behind: 0.15,
                protection_in_front: 0.0,
                pitcher: 0.001,
                location: 0.15,
            },
            zone: ZoneGeometry {
                plate_half_width: 0.83,
                heart_half_width: 0.33,
                heart_margin: 0.5,
                chase_buffer: 0.5,
                default_top: 3.5,
                default_bottom: 1.5,
                fallback_heart_pct: 0.15,
            },
            talent: TalentConfig {
                regression: 0.10,
                season: Some(2024),
                woba_scale: Some(1.242),
                runs_per_pa: Some(0.117),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    layers: LayersSection,
    context: ContextSection,
    qualification: QualificationConfig,
    data_paths: DataPaths,
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct LayersSection {
    enabled: Vec<Layer>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContextSection {
    #[serde(default)]
    half_inning_boundary: BoundaryPolicy,
}

/// The public pipeline config assembled from the pipeline.toml sections.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layers: LayerSet,
    pub boundary: BoundaryPolicy,
    pub qualification: QualificationConfig,
    pub data_paths: DataPaths,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QualificationConfig {
    pub min_batter_pa: u32,
    pub min_pitcher_ip: f64,
    #[serde(default)]
    pub min_pitcher_tbf: u32,
}

impl Default for QualificationConfig {
    fn default() -> Self {
        QualificationConfig {
            min_batter_pa: 300,
            min_pitcher_ip: 20.0,
            min_pitcher_tbf: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub pitches: Vec<String>,
    pub batting: String,
    pub pitching: String,
    pub park_factors: String,
    #[serde(default)]
    pub woba_constants: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    #[serde(default)]
    pub format: OutputFormat,
    pub leaderboard_size: usize,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/model.toml` and
/// `config/pipeline.toml` under `base_dir`. Does not copy defaults.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let model_path = config_dir.join("model.toml");
    let model: ModelConfig = parse_file(&model_path)?;

    let pipeline_path = config_dir.join("pipeline.toml");
    let pipeline_file: PipelineFile = parse_file(&pipeline_path)?;

    let pipeline = PipelineConfig {
        layers: pipeline_file.layers.enabled.into_iter().collect(),
        boundary: pipeline_file.context.half_inning_boundary,
        qualification: pipeline_file.qualification,
        data_paths: pipeline_file.data_paths,
        output: pipeline_file.output,
    };

    let config = Config { model, pipeline };
    validate(&config)?;
    Ok(config)
}

/// Copy any `defaults/*.toml` file missing from `config/`. Returns the files
/// that were copied; existing config files are never overwritten.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    let copy_err = |message: String| ConfigError::DefaultsCopyError { message };

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_err(format!("failed to create config directory: {e}")))?;

    let mut sources: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_err(format!("failed to read defaults directory: {e}")))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    sources.sort();

    let mut copied = Vec::new();
    for source in sources {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&source)
                    .map_err(|e| copy_err(format!("failed to read {}: {e}", source.display())))?;
                std::io::Write::write_all(&mut dest, &content)
                    .map_err(|e| copy_err(format!("failed to write {}: {e}", target.display())))?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(copy_err(format!("failed to create {}: {e}", target.display())));
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying defaults
/// into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the model section on its own. Exposed so callers building a
/// `ModelConfig` in code get the same checks as the file loader.
pub fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    let c = &model.coefficients;
    let coefficient_fields: &[(&str, f64)] = &[
        ("coefficients.protection_behind", c.protection_behind),
        ("coefficients.protection_in_front", c.protection_in_front),
        ("coefficients.pitcher", c.pitcher),
        ("coefficients.location", c.location),
    ];
    for (name, val) in coefficient_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be finite and >= 0, got {val}")));
        }
    }

    let z = &model.zone;
    let distance_fields: &[(&str, f64)] = &[
        ("zone.plate_half_width", z.plate_half_width),
        ("zone.heart_half_width", z.heart_half_width),
        ("zone.heart_margin", z.heart_margin),
        ("zone.chase_buffer", z.chase_buffer),
        ("zone.default_top", z.default_top),
        ("zone.default_bottom", z.default_bottom),
    ];
    for (name, val) in distance_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be finite and >= 0, got {val}")));
        }
    }
    if z.heart_half_width > z.plate_half_width {
        return Err(invalid(
            "zone.heart_half_width",
            format!(
                "must not exceed plate_half_width ({}), got {}",
                z.plate_half_width, z.heart_half_width
            ),
        ));
    }
    if z.default_top <= z.default_bottom {
        return Err(invalid(
            "zone.default_top",
            format!("must be above default_bottom ({}), got {}", z.default_bottom, z.default_top),
        ));
    }
    if !(0.0..=1.0).contains(&z.fallback_heart_pct) {
        return Err(invalid(
            "zone.fallback_heart_pct",
            format!("must be between 0.0 and 1.0 inclusive, got {}", z.fallback_heart_pct),
        ));
    }

    let t = &model.talent;
    if !(0.0..=1.0).contains(&t.regression) {
        return Err(invalid(
            "talent.regression",
            format!("must be between 0.0 and 1.0 inclusive, got {}", t.regression),
        ));
    }
    for (name, val) in [("talent.woba_scale", t.woba_scale), ("talent.runs_per_pa", t.runs_per_pa)] {
        if let Some(v) = val {
            if !v.is_finite() || v <= 0.0 {
                return Err(invalid(name, format!("must be > 0, got {v}")));
            }
        }
    }

    Ok(())
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_model(&config.model)?;

    let q = &config.pipeline.qualification;
    if !q.min_pitcher_ip.is_finite() || q.min_pitcher_ip < 0.0 {
        return Err(invalid(
            "qualification.min_pitcher_ip",
            format!("must be finite and >= 0, got {}", q.min_pitcher_ip),
        ));
    }

    let paths = &config.pipeline.data_paths;
    if paths.pitches.is_empty() {
        return Err(invalid("data_paths.pitches", "must list at least one file or directory"));
    }

    if config.pipeline.output.leaderboard_size == 0 {
        return Err(invalid("output.leaderboard_size", "must be > 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
