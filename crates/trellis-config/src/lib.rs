use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trellis_core::similarity::SimilarityPolicy;

pub const CONFIG_FILE_NAME: &str = "trellis.toml";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DAMPING: f64 = 0.9;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrellisConfig {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub rank: RankConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub policy: SimilarityPolicy,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            policy: SimilarityPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn config_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(CONFIG_FILE_NAME)
}

pub fn load_config(data_dir: impl AsRef<Path>) -> Result<TrellisConfig, ConfigError> {
    let path = config_path(data_dir);
    if !path.exists() {
        return Ok(TrellisConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: TrellisConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_config(data_dir: impl AsRef<Path>) -> Result<TrellisConfig, ConfigError> {
    let data_dir = data_dir.as_ref();
    fs::create_dir_all(data_dir)?;

    let path = config_path(data_dir);
    if path.exists() {
        return load_config(data_dir);
    }

    let config = TrellisConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_damping() -> f64 {
    DEFAULT_DAMPING
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn normalize_config(mut config: TrellisConfig) -> TrellisConfig {
    if config.build.batch_size == 0 {
        config.build.batch_size = DEFAULT_BATCH_SIZE;
    }
    if !(0.0..1.0).contains(&config.rank.damping) {
        config.rank.damping = DEFAULT_DAMPING;
    }
    if config.rank.max_iterations == 0 {
        config.rank.max_iterations = DEFAULT_MAX_ITERATIONS;
    }
    if !config.rank.tolerance.is_finite() || config.rank.tolerance <= 0.0 {
        config.rank.tolerance = DEFAULT_TOLERANCE;
    }

    config
}
