//! Precomputed erosion brush.
//!
//! For every cell of a `size × size` grid, the set of cells strictly within
//! `radius` of it together with weights `1 - dist / radius`, normalized to sum
//! to 1. Cells far enough from the border all see the same unclipped disc,
//! so they share one offset list; only the clipped cells near the border get
//! their own entries.
use serde::{Deserialize, Serialize};

const SHARED_DISC: u32 = u32::MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErosionBrush {
    size: usize,
    radius: usize,
    /// Offsets `(dx, dy)` and weights of the unclipped disc.
    disc: Vec<(i32, i32, f32)>,
    /// Per cell: `SHARED_DISC` or a slot into `starts`.
    slots: Vec<u32>,
    /// Slot `s` owns `entries[starts[s]..starts[s + 1]]`.
    starts: Vec<u32>,
    /// Flat cell index and normalized weight.
    entries: Vec<(u32, f32)>,
}

impl ErosionBrush {
    pub fn new(size: usize, radius: usize) -> Self {
        let r = radius as i32;
        let mut disc = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let sqr = dx * dx + dy * dy;
                if sqr < r * r {
                    disc.push((dx, dy, 1.0 - (sqr as f32).sqrt() / radius as f32));
                }
            }
        }
        let disc_sum: f32 = disc.iter().map(|&(_, _, w)| w).sum();
        if disc_sum > 0.0 {
            for entry in &mut disc {
                entry.2 /= disc_sum;
            }
        }

        let mut slots = vec![SHARED_DISC; size * size];
        let mut starts = vec![0u32];
        let mut entries = Vec::new();
        for cy in 0..size {
            for cx in 0..size {
                let interior = cx >= radius && cy >= radius && cx + radius < size && cy + radius < size;
                if interior {
                    continue;
                }
                let first = entries.len();
                let mut sum = 0.0f32;
                for &(dx, dy, _) in &disc {
                    let x = cx as i32 + dx;
                    let y = cy as i32 + dy;
                    if x < 0 || y < 0 || x >= size as i32 || y >= size as i32 {
                        continue;
                    }
                    let sqr = (dx * dx + dy * dy) as f32;
                    let w = 1.0 - sqr.sqrt() / radius as f32;
                    sum += w;
                    entries.push(((y as usize * size + x as usize) as u32, w));
                }
                if sum > 0.0 {
                    for entry in &mut entries[first..] {
                        entry.1 /= sum;
                    }
                }
                slots[cy * size + cx] = (starts.len() - 1) as u32;
                starts.push(entries.len() as u32);
            }
        }

        Self { size, radius, disc, slots, starts, entries }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Call `f(flat_index, weight)` for every brush cell around `(cx, cy)`.
    #[inline]
    pub fn visit(&self, cx: usize, cy: usize, mut f: impl FnMut(usize, f32)) {
        let slot = self.slots[cy * self.size + cx];
        if slot == SHARED_DISC {
            for &(dx, dy, w) in &self.disc {
                let x = (cx as i32 + dx) as usize;
                let y = (cy as i32 + dy) as usize;
                f(y * self.size + x, w);
            }
        } else {
            let s = slot as usize;
            let range = self.starts[s] as usize..self.starts[s + 1] as usize;
            for &(i, w) in &self.entries[range] {
                f(i as usize, w);
            }
        }
    }
}
