//! Single-droplet hydraulic erosion.
//!
//! Each droplet walks downhill one cell-length per step, picking up sediment
//! while it has spare capacity and dropping it when it slows, turns uphill or
//! is over capacity.
use rand::Rng;

use super::brush::ErosionBrush;
use super::{ErosionParams, ErosionStats};
use crate::heightfield::HeightGrid;

/// Run `count` droplets over `grid`, spawning them from `rng`.
///
/// `params` must be validated and `brush.size()` must equal the grid side.
pub(crate) fn run_droplets<R: Rng>(
    grid: &mut HeightGrid,
    brush: &ErosionBrush,
    params: &ErosionParams,
    count: u32,
    rng: &mut R,
) -> ErosionStats {
    let size = grid.size();
    let mut stats = ErosionStats::default();
    if size < 2 {
        return stats;
    }
    let limit = (size - 1) as f32;

    for _ in 0..count {
        let x = rng.gen_range(0.0..limit);
        let y = rng.gen_range(0.0..limit);
        stats.droplets += 1;
        if x >= limit || y >= limit {
            continue;
        }
        simulate_droplet(grid, brush, params, x, y, &mut stats);
    }
    stats
}

fn simulate_droplet(
    grid: &mut HeightGrid,
    brush: &ErosionBrush,
    params: &ErosionParams,
    mut pos_x: f32,
    mut pos_y: f32,
    stats: &mut ErosionStats,
) {
    let size = grid.size();
    let limit = (size - 1) as f32;
    let mut dir_x = 0.0f32;
    let mut dir_y = 0.0f32;
    let mut speed = params.initial_speed;
    let mut water = params.initial_water_volume;
    let mut sediment = 0.0f32;

    for _ in 0..params.max_droplet_lifetime {
        let node_x = pos_x as usize;
        let node_y = pos_y as usize;
        let offset_x = pos_x - node_x as f32;
        let offset_y = pos_y - node_y as f32;

        let here = grid.height_and_gradient(pos_x, pos_y);

        dir_x = dir_x * params.inertia - here.gradient_x * (1.0 - params.inertia);
        dir_y = dir_y * params.inertia - here.gradient_y * (1.0 - params.inertia);
        let len = (dir_x * dir_x + dir_y * dir_y).sqrt();
        if len == 0.0 || !len.is_finite() {
            break;
        }
        dir_x /= len;
        dir_y /= len;
        pos_x += dir_x;
        pos_y += dir_y;

        if pos_x < 0.0 || pos_x >= limit || pos_y < 0.0 || pos_y >= limit {
            break;
        }

        let new_height = grid.height_and_gradient(pos_x, pos_y).height;
        let delta_height = new_height - here.height;

        let capacity = (-delta_height * speed * water * params.sediment_capacity_factor)
            .max(params.min_sediment_capacity);

        if sediment > capacity || delta_height > 0.0 {
            // Uphill: try to fill the pit behind us; otherwise shed a fraction of the excess.
            let amount = if delta_height > 0.0 {
                delta_height.min(sediment)
            } else {
                (sediment - capacity) * params.deposit_speed
            };
            sediment -= amount;
            stats.deposited += amount as f64;

            let i = node_y * size + node_x;
            grid.data[i] += amount * (1.0 - offset_x) * (1.0 - offset_y);
            grid.data[i + 1] += amount * offset_x * (1.0 - offset_y);
            grid.data[i + size] += amount * (1.0 - offset_x) * offset_y;
            grid.data[i + size + 1] += amount * offset_x * offset_y;
        } else {
            // Never take more than the drop itself, or the droplet digs a hole behind it.
            let amount = ((capacity - sediment) * params.erode_speed).min(-delta_height);
            let data = &mut grid.data;
            brush.visit(node_x, node_y, |i, weight| {
                let available = data[i].max(0.0);
                let removed = (amount * weight).min(available);
                data[i] -= removed;
                sediment += removed;
                stats.eroded += removed as f64;
            });
        }

        speed = (speed * speed + delta_height * params.gravity).max(0.0).sqrt();
        water *= 1.0 - params.evaporate_speed;
    }
}
