//! Tile streaming around a moving viewer.
pub mod controller;
pub mod lod;
pub mod store;
pub mod tile;

use std::sync::Arc;

use crate::coords::TileCoord;
use crate::mesh::MeshData;

pub use controller::{StreamingController, TickReport};
pub use lod::{LodInfo, LodThresholds};
pub use store::{ChunkStore, PipelineGenerator, TileGenerator};
pub use tile::{HeightState, MeshSlot, Tile};

/// Which generation step a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    HeightMap,
    Mesh { lod: usize },
}

/// Changes the host needs to mirror, drained once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TileEvent {
    VisibilityChanged { coord: TileCoord, visible: bool },
    /// `mesh` is now the tile's rendered mesh.
    MeshDisplayed { coord: TileCoord, lod: usize, mesh: Arc<MeshData> },
    ColliderAssigned { coord: TileCoord, mesh: Arc<MeshData> },
    /// The slot was reset; the tile retries on later updates until it runs
    /// out of attempts.
    GenerationFailed { coord: TileCoord, stage: GenerationStage, reason: String },
    Evicted { coord: TileCoord },
}
