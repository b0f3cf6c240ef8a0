//! Level-of-detail terrain meshes.
//!
//! A height grid of side `n = chunk_size + 5` covers one tile plus a
//! one-cell border on every side. The border ring (ring 0) never becomes
//! geometry; it only contributes to normals so that lighting is continuous
//! across tile seams. Ring 1 is the visible mesh edge and is always emitted at
//! full resolution, and ring 2 carries the edge-connection vertices that bend
//! coarse interiors down to that full-resolution edge. Neighbouring tiles at
//! different LODs therefore share identical edges.

pub mod builder;
pub mod data;

use serde::{Deserialize, Serialize};

pub use builder::build_mesh;
pub use data::MeshData;

/// Number of detail levels a mesh can be built at (0 is the finest).
pub const NUM_SUPPORTED_LODS: usize = 5;

/// Supported tile sizes, in cells. All are multiples of 24 so every LOD
/// step (2, 4, 6, 8) divides them.
pub const SUPPORTED_CHUNK_SIZES: [usize; 11] = [48, 72, 96, 120, 144, 168, 192, 216, 240, 480, 960];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// World units per grid cell.
    pub mesh_scale: f32,
    /// Index into [`SUPPORTED_CHUNK_SIZES`].
    pub chunk_size_index: usize,
}

impl MeshSettings {
    /// Tile size in cells. An out-of-range index falls back to the largest size.
    pub fn chunk_size(&self) -> usize {
        let i = self.chunk_size_index.min(SUPPORTED_CHUNK_SIZES.len() - 1);
        SUPPORTED_CHUNK_SIZES[i]
    }

    /// Side of the height grid a mesh needs at LOD 0, border included.
    pub fn num_vertices_per_line(&self) -> usize {
        self.chunk_size() + 5
    }

    /// Side of one tile in world units.
    pub fn mesh_world_size(&self) -> f32 {
        (self.num_vertices_per_line() - 3) as f32 * self.mesh_scale
    }
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self { mesh_scale: 2.5, chunk_size_index: 0 }
    }
}

/// Grid step between main vertices at `lod`.
pub fn skip_increment(lod: usize) -> usize {
    if lod == 0 { 1 } else { lod * 2 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_sizes() {
        let s = MeshSettings::default();
        assert_eq!(s.chunk_size(), 48);
        assert_eq!(s.num_vertices_per_line(), 53);
        assert_eq!(s.mesh_world_size(), 125.0);
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let s = MeshSettings { chunk_size_index: 99, ..MeshSettings::default() };
        assert_eq!(s.chunk_size(), 960);
    }

    #[test]
    fn every_lod_step_divides_every_chunk_size() {
        for size in SUPPORTED_CHUNK_SIZES {
            for lod in 0..NUM_SUPPORTED_LODS {
                assert_eq!(size % skip_increment(lod), 0, "size {size} lod {lod}");
            }
        }
    }
}
