//! Terrain settings bundle, loaded from JSON.
//!
//! Every section has defaults, so a config file only needs the fields it
//! changes.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::erosion::ErosionParams;
use crate::error::ConfigError;
use crate::heightmap::HeightMapSettings;
use crate::mesh::{MeshSettings, SUPPORTED_CHUNK_SIZES};
use crate::streaming::lod::LodThresholds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    pub detail_levels: LodThresholds,
    /// Detail level whose mesh becomes the collider.
    pub collider_lod_index: usize,
    /// How far the viewer must move before the visible set is recomputed.
    pub viewer_move_threshold: f32,
    /// Colliders are assigned to tiles closer than this.
    pub collider_distance_threshold: f32,
    /// Generation workers; 0 picks one per core.
    pub worker_threads: usize,
    /// Upper bound on tiles kept in memory. `None` keeps every tile ever made.
    pub max_retained_tiles: Option<usize>,
    /// Give up on a tile after this many failed generation tasks.
    pub max_generation_attempts: u32,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            detail_levels: LodThresholds::default(),
            collider_lod_index: 0,
            viewer_move_threshold: 25.0,
            collider_distance_threshold: 5.0,
            worker_threads: 0,
            max_retained_tiles: None,
            max_generation_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub height_map: HeightMapSettings,
    pub erosion: ErosionParams,
    pub mesh: MeshSettings,
    pub streaming: StreamingSettings,
}

impl TerrainConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks only; numeric ranges are clamped where used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mesh.chunk_size_index >= SUPPORTED_CHUNK_SIZES.len() {
            return Err(ConfigError::ChunkSizeIndexOutOfRange {
                index: self.mesh.chunk_size_index,
                supported: SUPPORTED_CHUNK_SIZES.len(),
            });
        }
        let levels = &self.streaming.detail_levels;
        levels.validate()?;
        if self.streaming.collider_lod_index >= levels.len() {
            return Err(ConfigError::ColliderIndexOutOfRange {
                index: self.streaming.collider_lod_index,
                levels: levels.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::params::NormalizeMode;

    #[test]
    fn defaults_are_valid() {
        assert!(TerrainConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "height_map": { "height_scale": 12.0, "noise": { "seed": 9, "normalize_mode": "Global" } },
            "streaming": { "max_retained_tiles": 64 }
        }"#;
        let config = TerrainConfig::from_json_str(json).unwrap();
        assert_eq!(config.height_map.height_scale, 12.0);
        assert_eq!(config.height_map.noise.seed, 9);
        assert_eq!(config.height_map.noise.normalize_mode, NormalizeMode::Global);
        assert_eq!(config.height_map.noise.octaves, 6);
        assert_eq!(config.streaming.max_retained_tiles, Some(64));
        assert_eq!(config.erosion, ErosionParams::default());
    }

    #[test]
    fn round_trips_through_json() {
        let config = TerrainConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(TerrainConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn rejects_bad_structure() {
        let bad_index = r#"{ "mesh": { "chunk_size_index": 11 } }"#;
        assert!(matches!(
            TerrainConfig::from_json_str(bad_index),
            Err(ConfigError::ChunkSizeIndexOutOfRange { index: 11, .. })
        ));
        let bad_collider = r#"{ "streaming": { "collider_lod_index": 3 } }"#;
        assert!(matches!(
            TerrainConfig::from_json_str(bad_collider),
            Err(ConfigError::ColliderIndexOutOfRange { index: 3, levels: 3 })
        ));
        assert!(matches!(TerrainConfig::from_json_str("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TerrainConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
