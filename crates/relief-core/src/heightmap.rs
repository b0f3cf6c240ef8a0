//! Height-field pipeline: noise → falloff → curve/scale → erosion.

use serde::{Deserialize, Serialize};

use crate::curve::HeightCurve;
use crate::erosion::{ErosionJob, ErosionParams, ErosionSimulator};
use crate::heightfield::HeightGrid;
use crate::math::Vec2;
use crate::noise::falloff::generate_falloff_map;
use crate::noise::{generate_noise_map, params::NoiseParams};

/// Settings for one terrain height map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightMapSettings {
    pub noise: NoiseParams,
    /// World height of a curve output of 1.
    pub height_scale: f32,
    pub height_curve: HeightCurve,
    /// Fade every tile towards zero at its edges (island tiles).
    pub use_falloff: bool,
    /// Run droplet erosion on each tile. Every tile erodes its own copy of
    /// the rows it shares with its neighbours, so eroded tiles can disagree
    /// slightly along their seams.
    pub erode: bool,
}

impl HeightMapSettings {
    /// Lowest height the curve can produce for normalized input.
    pub fn min_height(&self) -> f32 {
        self.height_scale * self.height_curve.evaluate(0.0)
    }

    /// Highest height the curve can produce for normalized input.
    pub fn max_height(&self) -> f32 {
        self.height_scale * self.height_curve.evaluate(1.0)
    }
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseParams::default(),
            height_scale: 40.0,
            height_curve: HeightCurve::default(),
            use_falloff: false,
            erode: false,
        }
    }
}

/// Build a finished `size × size` height grid.
///
/// The returned `min_value`/`max_value` describe the curve-mapped heights
/// before erosion. Erosion runs only when `settings.erode` is set and a
/// simulator is supplied.
pub fn build_height_map(
    size: usize,
    settings: &HeightMapSettings,
    erosion: Option<&mut ErosionSimulator>,
    sample_center: Vec2,
) -> HeightGrid {
    let job = match erosion {
        Some(sim) if settings.erode => Some(sim.prepare(size)),
        _ => None,
    };
    build_height_map_with(size, settings, job.as_ref(), sample_center)
}

/// Same as [`build_height_map`], taking a prepared erosion snapshot so it can
/// run on any thread.
pub fn build_height_map_with(
    size: usize,
    settings: &HeightMapSettings,
    erosion: Option<&ErosionJob>,
    sample_center: Vec2,
) -> HeightGrid {
    let mut grid = generate_noise_map(size, size, &settings.noise, sample_center);

    if settings.use_falloff {
        let falloff = generate_falloff_map(size);
        for (v, f) in grid.data.iter_mut().zip(&falloff.data) {
            *v = (*v - f).clamp(0.0, 1.0);
        }
    }

    // Private copy: the caller's curve may be edited while this runs elsewhere.
    let curve = settings.height_curve.clone();
    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;
    for v in &mut grid.data {
        *v = curve.evaluate(*v) * settings.height_scale;
        min_value = min_value.min(*v);
        max_value = max_value.max(*v);
    }
    if grid.data.is_empty() {
        min_value = 0.0;
        max_value = 0.0;
    }
    grid.min_value = min_value;
    grid.max_value = max_value;

    if settings.erode {
        if let Some(job) = erosion {
            if size == job.grid_size() {
                job.erode(&mut grid, settings.noise.seed);
            } else {
                tracing::warn!(size, prepared = job.grid_size(), "erosion job size mismatch, skipping erosion");
            }
        }
    }

    grid
}

/// Generate one terrain tile: the offline entry point.
///
/// Erosion runs when `height_settings.erode` is set; with
/// `erosion_settings.iteration_count == 0` it is a no-op.
pub fn build_terrain_tile(
    tile_size: usize,
    height_settings: &HeightMapSettings,
    erosion_settings: &ErosionParams,
    sample_center: Vec2,
) -> HeightGrid {
    let mut simulator = ErosionSimulator::new(erosion_settings.clone());
    build_height_map(tile_size, height_settings, Some(&mut simulator), sample_center)
}
