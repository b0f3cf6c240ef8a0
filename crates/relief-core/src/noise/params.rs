use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// How raw fractal sums are mapped into the returned grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Rescale into [0, 1] with this grid's own min/max. Neighbouring tiles
    /// are not guaranteed to agree at their shared edge.
    #[default]
    Local,
    /// Divide `value + 1` by the theoretical amplitude sum. Approximate, but
    /// identical for every tile, so neighbouring tiles line up.
    Global,
}

/// Fractal noise parameters for one height-map layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub seed: i32,
    /// Number of noise layers, at least 1.
    pub octaves: u32,
    /// Amplitude multiplier per octave, 0-1.
    pub persistence: f32,
    /// Frequency multiplier per octave, at least 1.
    pub lacunarity: f32,
    /// Feature size in grid cells. Non-positive values are floored.
    pub scale: f32,
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl NoiseParams {
    /// Smallest usable scale; anything at or below zero is replaced by this.
    pub const MIN_SCALE: f32 = 0.0001;

    /// Copy with every field forced into its legal range.
    pub fn validated(&self) -> Self {
        Self {
            seed: self.seed,
            octaves: self.octaves.max(1),
            persistence: if self.persistence.is_nan() { 0.0 } else { self.persistence.clamp(0.0, 1.0) },
            lacunarity: if self.lacunarity.is_nan() { 1.0 } else { self.lacunarity.max(1.0) },
            scale: if self.scale > 0.0 { self.scale } else { Self::MIN_SCALE },
            offset: self.offset,
            normalize_mode: self.normalize_mode,
        }
    }
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            scale: 50.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validated_clamps_every_field() {
        let p = NoiseParams {
            octaves: 0,
            persistence: 1.7,
            lacunarity: 0.2,
            scale: -3.0,
            ..NoiseParams::default()
        }
        .validated();
        assert_eq!(p.octaves, 1);
        assert_eq!(p.persistence, 1.0);
        assert_eq!(p.lacunarity, 1.0);
        assert_eq!(p.scale, NoiseParams::MIN_SCALE);
    }

    #[test]
    fn validated_keeps_legal_values() {
        let p = NoiseParams::default();
        assert_eq!(p.validated(), p);
    }
}
