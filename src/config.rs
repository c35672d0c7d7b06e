use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::LoggingConfig;

/// Vertical distance (layout units) within which fragments share a line
pub const DEFAULT_LINE_TOLERANCE: f64 = 5.0;
/// Hard cap on chunk length before a forced split
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 200;
/// Approximate length of the sub-chunks produced by the sentence post-split
pub const DEFAULT_SUB_CHUNK_TARGET_CHARS: usize = 100;
/// A vertical gap larger than this many line heights starts a new paragraph
pub const DEFAULT_PARAGRAPH_GAP_FACTOR: f64 = 2.0;
/// Images whose centers are closer than this on both axes are duplicates
pub const DEFAULT_IMAGE_DEDUP_TOLERANCE: f64 = 15.0;
pub const DEFAULT_HOT_ZONE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_CLUSTER_RADIUS: f64 = 40.0;
pub const DEFAULT_DENSITY_EXPONENT: f64 = 0.7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkheatConfig {
    pub chunking: ChunkingConfig,
    pub heatmap: HeatmapConfig,
    pub clustering: ClusteringConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub line_tolerance: f64,

    pub max_chunk_chars: usize,

    /// Target size for pieces of an oversized chunk
    pub sub_chunk_target_chars: usize,

    pub paragraph_gap_factor: f64,

    pub image_dedup_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Heat score at or above which a chunk is a hot zone
    pub hot_zone_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Maximum distance from a cluster seed for a click to join it
    pub radius: f64,

    /// Perceptual curve applied to count / max_count
    pub density_exponent: f64,

    pub min_size: f64,
    pub max_size: f64,

    pub base_opacity: f64,
    pub opacity_range: f64,

    /// Color at density 0
    pub cold_color: [u8; 3],

    /// Color at density 1
    pub hot_color: [u8; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path
    pub path: PathBuf,

    pub max_connections: u32,

    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            line_tolerance: DEFAULT_LINE_TOLERANCE,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            sub_chunk_target_chars: DEFAULT_SUB_CHUNK_TARGET_CHARS,
            paragraph_gap_factor: DEFAULT_PARAGRAPH_GAP_FACTOR,
            image_dedup_tolerance: DEFAULT_IMAGE_DEDUP_TOLERANCE,
        }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            hot_zone_threshold: DEFAULT_HOT_ZONE_THRESHOLD,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_CLUSTER_RADIUS,
            density_exponent: DEFAULT_DENSITY_EXPONENT,
            min_size: 25.0,
            max_size: 80.0,
            base_opacity: 0.4,
            opacity_range: 0.4,
            cold_color: [34, 197, 94],
            hot_color: [239, 68, 68],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chunkheat.db"),
            max_connections: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl ChunkheatConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: ChunkheatConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Override fields with `CHUNKHEAT_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(value) = env_parse::<usize>("CHUNKHEAT_MAX_CHUNK_CHARS") {
            self.chunking.max_chunk_chars = value;
        }

        if let Some(value) = env_parse::<f64>("CHUNKHEAT_LINE_TOLERANCE") {
            self.chunking.line_tolerance = value;
        }

        if let Some(value) = env_parse::<f64>("CHUNKHEAT_HOT_ZONE_THRESHOLD") {
            self.heatmap.hot_zone_threshold = value;
        }

        if let Some(value) = env_parse::<f64>("CHUNKHEAT_CLUSTER_RADIUS") {
            self.clustering.radius = value;
        }

        if let Ok(path) = std::env::var("CHUNKHEAT_DATABASE") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("CHUNKHEAT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chunk_chars == 0 {
            return Err(anyhow!("chunking.max_chunk_chars must be positive"));
        }
        if self.chunking.sub_chunk_target_chars == 0 {
            return Err(anyhow!("chunking.sub_chunk_target_chars must be positive"));
        }
        if !(0.0..=1.0).contains(&self.heatmap.hot_zone_threshold) {
            return Err(anyhow!("heatmap.hot_zone_threshold must be within [0, 1]"));
        }
        if self.clustering.radius < 0.0 {
            return Err(anyhow!("clustering.radius must not be negative"));
        }
        if self.clustering.min_size > self.clustering.max_size {
            return Err(anyhow!("clustering.min_size exceeds clustering.max_size"));
        }
        let exponent = self.clustering.density_exponent;
        if !(exponent.is_finite() && exponent > 0.0) {
            return Err(anyhow!("clustering.density_exponent must be positive"));
        }
        // opacity = base_opacity + opacity_range * density, density in [0, 1]
        let (base, range) = (self.clustering.base_opacity, self.clustering.opacity_range);
        if !(0.0..=1.0).contains(&base) || !(0.0..=1.0 - base).contains(&range) {
            return Err(anyhow!(
                "clustering opacity must stay within [0, 1] (base_opacity + opacity_range <= 1)"
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ChunkheatConfig::default();
        assert_eq!(config.chunking.max_chunk_chars, 200);
        assert_eq!(config.chunking.line_tolerance, 5.0);
        assert_eq!(config.heatmap.hot_zone_threshold, 0.8);
        assert_eq!(config.clustering.radius, 40.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ChunkheatConfig::default();
        config.heatmap.hot_zone_threshold = 0.65;
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("chunkheat.toml");

        config.save_to_file(&config_path).unwrap();

        let loaded = ChunkheatConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.heatmap.hot_zone_threshold, 0.65);
        assert_eq!(loaded.clustering.cold_color, [34, 197, 94]);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "[clustering]\nradius = 25.0\n").unwrap();

        let loaded = ChunkheatConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.clustering.radius, 25.0);
        assert_eq!(loaded.clustering.density_exponent, 0.7);
        assert_eq!(loaded.chunking.max_chunk_chars, 200);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = ChunkheatConfig::default();
        config.heatmap.hot_zone_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_density_exponent() {
        for exponent in [0.0, -0.7, f64::NAN] {
            let mut config = ChunkheatConfig::default();
            config.clustering.density_exponent = exponent;
            assert!(config.validate().is_err(), "{}", exponent);
        }
    }

    #[test]
    fn test_rejects_opacity_outside_unit_range() {
        let mut config = ChunkheatConfig::default();
        config.clustering.base_opacity = 0.7;
        config.clustering.opacity_range = 0.4;
        assert!(config.validate().is_err());

        config.clustering.base_opacity = 0.5;
        config.clustering.opacity_range = -0.1;
        assert!(config.validate().is_err());

        config.clustering.opacity_range = f64::NAN;
        assert!(config.validate().is_err());

        config.clustering.opacity_range = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_clustering_file_is_rejected_on_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[clustering]\ndensity_exponent = -1.0\n").unwrap();

        assert!(ChunkheatConfig::load_from_file(&config_path).is_err());
    }
}
