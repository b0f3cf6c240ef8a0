//! Square island falloff mask: 0 in the middle, rising to 1 at the edges.
use crate::heightfield::HeightGrid;

const STEEPNESS: f32 = 3.0;
const SHIFT: f32 = 2.2;

/// Falloff mask for a square grid of side `size`.
pub fn generate_falloff_map(size: usize) -> HeightGrid {
    let mut map = HeightGrid::square(size);
    for r in 0..size {
        for c in 0..size {
            let x = c as f32 / size as f32 * 2.0 - 1.0;
            let y = r as f32 / size as f32 * 2.0 - 1.0;
            map.set(r, c, evaluate(x.abs().max(y.abs())));
        }
    }
    map.refresh_range();
    map
}

fn evaluate(t: f32) -> f32 {
    let a = t.powf(STEEPNESS);
    let b = (SHIFT - SHIFT * t).powf(STEEPNESS);
    a / (a + b)
}
