pub mod falloff;
pub mod fbm;
pub mod params;

use crate::heightfield::HeightGrid;
use crate::math::Vec2;
use fbm::Fbm;
use params::{NoiseParams, NormalizeMode};

/// Generate a fractal noise grid.
///
/// `sample_center` shifts the sampling window through noise space; tiles
/// generated with the same parameters and adjacent centres join up (exactly
/// in `Global` mode, see [`NormalizeMode`]).
///
/// Parameters are clamped into legal ranges first; this never fails. The
/// returned grid's min/max are those of the normalized values.
pub fn generate_noise_map(
    width: usize,
    height: usize,
    params: &NoiseParams,
    sample_center: Vec2,
) -> HeightGrid {
    let params = params.validated();
    let n = width * height;
    if n == 0 {
        return HeightGrid::new(width, height, 0.0);
    }

    let fbm = Fbm::new(&params, sample_center);
    let half_width = width as f32 / 2.0;
    let half_height = height as f32 / 2.0;

    let mut data = vec![0.0f32; n];
    let mut min_raw = f32::MAX;
    let mut max_raw = f32::MIN;
    for r in 0..height {
        for c in 0..width {
            let v = fbm.sample(c as f32 - half_width, r as f32 - half_height);
            min_raw = min_raw.min(v);
            max_raw = max_raw.max(v);
            data[r * width + c] = v;
        }
    }

    match params.normalize_mode {
        NormalizeMode::Local => {
            let range = max_raw - min_raw;
            for v in &mut data {
                *v = if range > 0.0 { ((*v - min_raw) / range).clamp(0.0, 1.0) } else { 0.0 };
            }
        }
        NormalizeMode::Global => {
            let max_possible = fbm.max_possible_height();
            for v in &mut data {
                *v = (*v + 1.0) / max_possible;
            }
        }
    }

    HeightGrid::from_data(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario_params() -> NoiseParams {
        NoiseParams {
            seed: 42,
            octaves: 1,
            persistence: 0.5,
            lacunarity: 2.0,
            scale: 50.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Local,
        }
    }

    #[test]
    fn local_mode_spans_exactly_zero_to_one() {
        let params = NoiseParams { seed: 7, ..NoiseParams::default() };
        let g = generate_noise_map(64, 64, &params, Vec2::new(120.0, -40.0));
        assert!(g.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(g.data.iter().any(|&v| v == 0.0), "no cell at exactly 0");
        assert!(g.data.iter().any(|&v| v == 1.0), "no cell at exactly 1");
        assert_eq!(g.min_value, 0.0);
        assert_eq!(g.max_value, 1.0);
    }

    #[test]
    fn scenario_grid_is_reproducible() {
        let a = generate_noise_map(10, 10, &scenario_params(), Vec2::ZERO);
        let b = generate_noise_map(10, 10, &scenario_params(), Vec2::ZERO);
        assert_eq!(a.data.len(), 100);
        assert!(a.data.iter().zip(&b.data).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn different_seeds_give_different_grids() {
        let a = generate_noise_map(32, 32, &scenario_params(), Vec2::ZERO);
        let other = NoiseParams { seed: 43, ..scenario_params() };
        let b = generate_noise_map(32, 32, &other, Vec2::ZERO);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn non_positive_scale_is_floored_not_rejected() {
        let params = NoiseParams { scale: 0.0, octaves: 0, ..scenario_params() };
        let g = generate_noise_map(8, 8, &params, Vec2::ZERO);
        assert!(g.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn global_mode_neighbouring_centres_line_up() {
        // Moving the centre one cell east shifts the grid one cell west.
        let params = NoiseParams { normalize_mode: NormalizeMode::Global, seed: 3, ..NoiseParams::default() };
        let a = generate_noise_map(16, 16, &params, Vec2::ZERO);
        let b = generate_noise_map(16, 16, &params, Vec2::new(1.0, 0.0));
        for r in 0..16 {
            for c in 0..15 {
                assert_relative_eq!(b.get(r, c), a.get(r, c + 1), epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn global_mode_does_not_force_full_range() {
        let params = NoiseParams { normalize_mode: NormalizeMode::Global, ..scenario_params() };
        let g = generate_noise_map(10, 10, &params, Vec2::ZERO);
        // One octave: raw values lie in [-1, 1], so (v + 1) / 1 lies in [0, 2].
        assert!(g.data.iter().all(|&v| (0.0..=2.0).contains(&v)));
    }

    #[test]
    fn empty_grid_is_returned_for_zero_size() {
        let g = generate_noise_map(0, 0, &scenario_params(), Vec2::ZERO);
        assert!(g.data.is_empty());
    }
}
