//! Procedural heightfield terrain, streamed in tiles around a viewer.
//!
//! Generation runs noise → erosion → LOD mesh. [`build_terrain_tile`] and
//! [`build_mesh`] are the offline entry points; [`StreamingController`]
//! drives the same pipeline on a worker pool and reports what the host
//! should show through [`TileEvent`]s.

pub mod config;
pub mod coords;
pub mod curve;
pub mod erosion;
pub mod error;
pub mod heightfield;
pub mod heightmap;
pub mod math;
pub mod mesh;
pub mod noise;
pub mod streaming;
pub mod work_queue;

pub use config::{StreamingSettings, TerrainConfig};
pub use coords::TileCoord;
pub use heightfield::HeightGrid;
pub use heightmap::{build_height_map, build_terrain_tile, HeightMapSettings};
pub use math::{Vec2, Vec3};
pub use mesh::{build_mesh, MeshData, MeshSettings};
pub use streaming::{StreamingController, TileEvent};
