//! Distance → detail level selection.
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mesh::NUM_SUPPORTED_LODS;

/// One detail level: mesh `lod` is used up to `visible_distance` from the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    pub lod: usize,
    pub visible_distance: f32,
}

impl LodInfo {
    pub fn new(lod: usize, visible_distance: f32) -> Self {
        Self { lod, visible_distance }
    }
}

/// Detail levels ordered by increasing distance. The last distance is the
/// view cutoff: tiles farther away are hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LodThresholds {
    levels: Vec<LodInfo>,
}

impl LodThresholds {
    /// Unchecked; see [`validate`](Self::validate).
    pub fn new(levels: Vec<LodInfo>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[LodInfo] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<LodInfo> {
        self.levels.get(index).copied()
    }

    /// Distance beyond which nothing is shown.
    pub fn max_view_distance(&self) -> f32 {
        self.levels.last().map_or(0.0, |l| l.visible_distance)
    }

    /// Index of the level to use at `distance`, `None` if out of view.
    pub fn select(&self, distance: f32) -> Option<usize> {
        if self.levels.is_empty() || distance > self.max_view_distance() {
            return None;
        }
        let last = self.levels.len() - 1;
        Some(self.levels[..last].iter().position(|l| distance <= l.visible_distance).unwrap_or(last))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::NoDetailLevels);
        }
        let mut previous = 0.0f32;
        for (index, level) in self.levels.iter().enumerate() {
            if level.lod >= NUM_SUPPORTED_LODS {
                return Err(ConfigError::UnsupportedLod { index, lod: level.lod, supported: NUM_SUPPORTED_LODS });
            }
            if !(level.visible_distance > previous) {
                return Err(ConfigError::NonIncreasingThreshold { index, distance: level.visible_distance });
            }
            previous = level.visible_distance;
        }
        Ok(())
    }
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self::new(vec![LodInfo::new(0, 120.0), LodInfo::new(1, 250.0), LodInfo::new(2, 400.0)])
    }
}
