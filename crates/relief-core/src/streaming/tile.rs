//! Per-tile generation state.
use std::sync::Arc;

use crate::coords::{Bounds2, TileCoord};
use crate::heightfield::HeightGrid;
use crate::math::Vec2;
use crate::mesh::MeshData;
use crate::work_queue::CancellationToken;

#[derive(Debug, Clone, Default)]
pub enum HeightState {
    #[default]
    Unrequested,
    Pending(CancellationToken),
    Ready(Arc<HeightGrid>),
}

#[derive(Debug, Clone, Default)]
pub enum MeshSlot {
    #[default]
    Empty,
    Pending(CancellationToken),
    Ready(Arc<MeshData>),
}

impl MeshSlot {
    pub fn mesh(&self) -> Option<&Arc<MeshData>> {
        match self {
            MeshSlot::Ready(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MeshSlot::Pending(_))
    }
}

/// One square tile of terrain.
#[derive(Debug)]
pub struct Tile {
    pub(crate) coord: TileCoord,
    pub(crate) bounds: Bounds2,
    /// Noise-space centre handed to the height-map builder.
    pub(crate) sample_center: Vec2,
    pub(crate) height: HeightState,
    /// One slot per configured detail level.
    pub(crate) meshes: Vec<MeshSlot>,
    pub(crate) visible: bool,
    /// Index into the detail levels of the mesh on display.
    pub(crate) displayed_lod: Option<usize>,
    pub(crate) collider_set: bool,
    pub(crate) failures: u32,
    pub(crate) last_seen_tick: u64,
}

impl Tile {
    /// A fresh tile for a grid of tiles `world_size` wide, sampled at
    /// `mesh_scale` world units per cell.
    pub fn new(coord: TileCoord, world_size: f32, mesh_scale: f32, detail_levels: usize) -> Self {
        Self {
            coord,
            bounds: coord.bounds(world_size),
            sample_center: coord.center(world_size) * (1.0 / mesh_scale),
            height: HeightState::Unrequested,
            meshes: vec![MeshSlot::Empty; detail_levels],
            visible: false,
            displayed_lod: None,
            collider_set: false,
            failures: 0,
            last_seen_tick: 0,
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn bounds(&self) -> Bounds2 {
        self.bounds
    }

    pub fn sample_center(&self) -> Vec2 {
        self.sample_center
    }

    pub fn height_state(&self) -> &HeightState {
        &self.height
    }

    pub fn height_map(&self) -> Option<&Arc<HeightGrid>> {
        match &self.height {
            HeightState::Ready(g) => Some(g),
            _ => None,
        }
    }

    pub fn mesh_slot(&self, level: usize) -> Option<&MeshSlot> {
        self.meshes.get(level)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn displayed_lod(&self) -> Option<usize> {
        self.displayed_lod
    }

    pub fn displayed_mesh(&self) -> Option<&Arc<MeshData>> {
        self.displayed_lod.and_then(|i| self.meshes.get(i)).and_then(MeshSlot::mesh)
    }

    pub fn has_collider(&self) -> bool {
        self.collider_set
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn last_seen_tick(&self) -> u64 {
        self.last_seen_tick
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.height, HeightState::Pending(_)) || self.meshes.iter().any(MeshSlot::is_pending)
    }

    /// Cancel outstanding requests and reset their slots so they are asked
    /// for again next time. Returns how many requests were cancelled.
    pub(crate) fn cancel_pending(&mut self) -> usize {
        let mut cancelled = 0;
        if let HeightState::Pending(token) = &self.height {
            token.cancel();
            self.height = HeightState::Unrequested;
            cancelled += 1;
        }
        for slot in &mut self.meshes {
            if let MeshSlot::Pending(token) = slot {
                token.cancel();
                *slot = MeshSlot::Empty;
                cancelled += 1;
            }
        }
        cancelled
    }
}
