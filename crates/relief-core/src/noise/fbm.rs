//! Fractional Brownian motion over seeded per-octave offsets.
//!
//! Octave `i` has amplitude `persistence^i` and frequency `lacunarity^i`.
//! The permutation table is fixed; the seed only moves the sampling window
//! through noise space, so every tile generated with the same seed reads
//! from one continuous field.
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::params::NoiseParams;
use crate::math::Vec2;

/// Bound on the random per-octave offset drawn from the seed.
const OFFSET_RANGE: i32 = 100_000;

pub struct Fbm {
    octave_offsets: Vec<Vec2>,
    persistence: f32,
    lacunarity: f32,
    scale: f32,
    max_possible_height: f32,
    noise: Perlin,
}

impl Fbm {
    /// `params` must already be validated.
    pub fn new(params: &NoiseParams, sample_center: Vec2) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed as u64);
        let mut octave_offsets = Vec::with_capacity(params.octaves as usize);
        let mut max_possible_height = 0.0f32;
        let mut amplitude = 1.0f32;

        for _ in 0..params.octaves {
            let rx = rng.gen_range(-OFFSET_RANGE..OFFSET_RANGE) as f32;
            let ry = rng.gen_range(-OFFSET_RANGE..OFFSET_RANGE) as f32;
            // y runs against world y so that tiles laid out north-up join.
            octave_offsets.push(Vec2::new(
                rx + params.offset.x + sample_center.x,
                ry - params.offset.y - sample_center.y,
            ));
            max_possible_height += amplitude;
            amplitude *= params.persistence;
        }

        Self {
            octave_offsets,
            persistence: params.persistence,
            lacunarity: params.lacunarity,
            scale: params.scale,
            max_possible_height,
            noise: Perlin::new(0),
        }
    }

    /// Sum of octave amplitudes; the largest value `sample` could reach.
    pub fn max_possible_height(&self) -> f32 {
        self.max_possible_height
    }

    /// Perlin noise remapped into [0, 1].
    #[inline]
    fn noise01(&self, x: f64, y: f64) -> f32 {
        ((self.noise.get([x, y]) + 1.0) * 0.5).clamp(0.0, 1.0) as f32
    }

    /// Evaluate at a cell position relative to the grid centre.
    ///
    /// Returns an unnormalized value in roughly
    /// `[-max_possible_height, max_possible_height]`.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let mut amplitude = 1.0f32;
        let mut frequency = 1.0f32;
        let mut value = 0.0f32;
        for offset in &self.octave_offsets {
            let sx = (x + offset.x) / self.scale * frequency;
            let sy = (y + offset.y) / self.scale * frequency;
            let n = self.noise01(sx as f64, sy as f64);
            value += (n * 2.0 - 1.0) * amplitude;
            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_possible_height_is_geometric_sum() {
        let params = NoiseParams { octaves: 3, persistence: 0.5, ..NoiseParams::default() };
        let fbm = Fbm::new(&params, Vec2::ZERO);
        assert!((fbm.max_possible_height() - 1.75).abs() < 1e-6);
    }

    #[test]
    fn samples_stay_within_amplitude_bound() {
        let params = NoiseParams { octaves: 4, seed: 9, ..NoiseParams::default() };
        let fbm = Fbm::new(&params, Vec2::ZERO);
        let bound = fbm.max_possible_height();
        for i in 0..200 {
            let v = fbm.sample(i as f32 * 1.7, i as f32 * -0.9);
            assert!(v.abs() <= bound + 1e-5, "sample {v} exceeds {bound}");
        }
    }

    #[test]
    fn fbm_produces_non_constant_output() {
        let params = NoiseParams { seed: 42, ..NoiseParams::default() };
        let fbm = Fbm::new(&params, Vec2::ZERO);
        let a = fbm.sample(0.3, 0.7);
        let b = fbm.sample(31.3, 12.9);
        assert!((a - b).abs() > 1e-4);
    }
}
