//! Tile storage and per-tile update rules.
//!
//! All tile state lives in a [`TileSet`] owned by the tick thread. Generation
//! runs on the [`WorkQueue`]; its completion callbacks get `&mut TileSet`
//! during the drain, record the result and mark the tile as touched. Touched
//! tiles are updated again straight after the drain, which is where follow-up
//! requests (a mesh after its height map) are issued.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::lod::LodThresholds;
use super::tile::{HeightState, MeshSlot, Tile};
use super::{GenerationStage, TileEvent};
use crate::config::TerrainConfig;
use crate::coords::TileCoord;
use crate::erosion::{ErosionJob, ErosionSimulator};
use crate::error::{TaskError, WorkQueueError};
use crate::heightfield::HeightGrid;
use crate::heightmap::{build_height_map_with, HeightMapSettings};
use crate::math::Vec2;
use crate::mesh::{build_mesh, MeshData, MeshSettings};
use crate::work_queue::{DrainReport, WorkQueue};

// ── Generation seam ───────────────────────────────────────────────────────────

/// The work a tile needs done off the tick thread.
pub trait TileGenerator: Send + Sync {
    /// Height grid for one tile, bordered for meshing.
    fn height_map(&self, coord: TileCoord, sample_center: Vec2) -> HeightGrid;

    fn mesh(&self, height_map: &HeightGrid, lod: usize) -> MeshData;
}

/// Noise → erosion → mesh, with settings frozen at construction.
#[derive(Debug, Clone)]
pub struct PipelineGenerator {
    height_settings: HeightMapSettings,
    mesh_settings: MeshSettings,
    erosion: Option<ErosionJob>,
}

impl PipelineGenerator {
    /// Snapshot `config`; the erosion brush is built here, once, for the
    /// grid size every tile uses.
    pub fn new(config: &TerrainConfig) -> Self {
        let size = config.mesh.num_vertices_per_line();
        let erosion = config.height_map.erode.then(|| ErosionSimulator::new(config.erosion.clone()).prepare(size));
        Self {
            height_settings: config.height_map.clone(),
            mesh_settings: config.mesh.clone(),
            erosion,
        }
    }
}

impl TileGenerator for PipelineGenerator {
    fn height_map(&self, _coord: TileCoord, sample_center: Vec2) -> HeightGrid {
        let size = self.mesh_settings.num_vertices_per_line();
        build_height_map_with(size, &self.height_settings, self.erosion.as_ref(), sample_center)
    }

    fn mesh(&self, height_map: &HeightGrid, lod: usize) -> MeshData {
        build_mesh(height_map, &self.mesh_settings, lod)
    }
}

// ── Tile set ──────────────────────────────────────────────────────────────────

/// Tile state plus what completions produced since the last update pass.
#[derive(Debug, Default)]
pub struct TileSet {
    tiles: HashMap<TileCoord, Tile>,
    /// Visible tiles, in the order they became visible.
    visible: Vec<TileCoord>,
    events: Vec<TileEvent>,
    touched: Vec<TileCoord>,
}

impl TileSet {
    fn receive_height(&mut self, coord: TileCoord, result: Result<HeightGrid, TaskError>) {
        let Some(tile) = self.tiles.get_mut(&coord) else { return };
        if !matches!(tile.height, HeightState::Pending(_)) {
            return;
        }
        match result {
            Ok(grid) => {
                debug!(x = coord.x, y = coord.y, "height map received");
                tile.height = HeightState::Ready(Arc::new(grid));
            }
            Err(err) => {
                tile.height = HeightState::Unrequested;
                tile.failures += 1;
                warn!(x = coord.x, y = coord.y, attempt = tile.failures, %err, "height map generation failed");
                self.events.push(TileEvent::GenerationFailed {
                    coord,
                    stage: GenerationStage::HeightMap,
                    reason: err.to_string(),
                });
            }
        }
        self.touched.push(coord);
    }

    fn receive_mesh(&mut self, coord: TileCoord, level: usize, lod: usize, result: Result<MeshData, TaskError>) {
        let Some(tile) = self.tiles.get_mut(&coord) else { return };
        let Some(slot) = tile.meshes.get_mut(level) else { return };
        if !slot.is_pending() {
            return;
        }
        match result {
            Ok(mesh) => {
                debug!(x = coord.x, y = coord.y, lod, "mesh received");
                *slot = MeshSlot::Ready(Arc::new(mesh));
            }
            Err(err) => {
                *slot = MeshSlot::Empty;
                tile.failures += 1;
                warn!(x = coord.x, y = coord.y, lod, attempt = tile.failures, %err, "mesh generation failed");
                self.events.push(TileEvent::GenerationFailed {
                    coord,
                    stage: GenerationStage::Mesh { lod },
                    reason: err.to_string(),
                });
            }
        }
        self.touched.push(coord);
    }

    fn set_visible(&mut self, coord: TileCoord, visible: bool) {
        if visible {
            self.visible.push(coord);
        } else {
            self.visible.retain(|c| *c != coord);
        }
        self.events.push(TileEvent::VisibilityChanged { coord, visible });
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Settings the store applies to every tile.
#[derive(Debug, Clone)]
struct StorePolicy {
    thresholds: LodThresholds,
    world_size: f32,
    mesh_scale: f32,
    collider_level: usize,
    collider_distance: f32,
    max_attempts: u32,
    max_retained: Option<usize>,
}

pub struct ChunkStore {
    set: TileSet,
    queue: WorkQueue<TileSet>,
    generator: Arc<dyn TileGenerator>,
    policy: StorePolicy,
}

impl ChunkStore {
    /// Store generating tiles with the normal pipeline. `config` should be
    /// validated already.
    pub fn new(config: &TerrainConfig) -> Result<Self, WorkQueueError> {
        Self::with_generator(config, Arc::new(PipelineGenerator::new(config)))
    }

    pub fn with_generator(config: &TerrainConfig, generator: Arc<dyn TileGenerator>) -> Result<Self, WorkQueueError> {
        let streaming = &config.streaming;
        let policy = StorePolicy {
            thresholds: streaming.detail_levels.clone(),
            world_size: config.mesh.mesh_world_size(),
            mesh_scale: config.mesh.mesh_scale,
            collider_level: streaming.collider_lod_index,
            collider_distance: streaming.collider_distance_threshold,
            max_attempts: streaming.max_generation_attempts,
            max_retained: streaming.max_retained_tiles,
        };
        Ok(Self {
            set: TileSet::default(),
            queue: WorkQueue::new(streaming.worker_threads)?,
            generator,
            policy,
        })
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.set.tiles.get(&coord)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.set.tiles.values()
    }

    pub fn len(&self) -> usize {
        self.set.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.tiles.is_empty()
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.set.tiles.contains_key(&coord)
    }

    /// Visible tiles, in the order they became visible.
    pub fn visible(&self) -> &[TileCoord] {
        &self.set.visible
    }

    pub fn thresholds(&self) -> &LodThresholds {
        &self.policy.thresholds
    }

    pub fn world_size(&self) -> f32 {
        self.policy.world_size
    }

    /// Generation tasks whose results have not been drained.
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    pub fn take_events(&mut self) -> Vec<TileEvent> {
        std::mem::take(&mut self.set.events)
    }

    /// Create the tile at `coord` if it is new and request its height map.
    /// Returns whether a tile was created.
    pub fn ensure_tile(&mut self, coord: TileCoord, tick: u64) -> bool {
        if self.set.tiles.contains_key(&coord) {
            return false;
        }
        let mut tile = Tile::new(coord, self.policy.world_size, self.policy.mesh_scale, self.policy.thresholds.len());
        tile.last_seen_tick = tick;
        self.set.tiles.insert(coord, tile);
        self.request_height(coord);
        true
    }

    fn request_height(&mut self, coord: TileCoord) {
        let Some(tile) = self.set.tiles.get_mut(&coord) else { return };
        let generator = Arc::clone(&self.generator);
        let center = tile.sample_center;
        let token = self.queue.submit(
            move || generator.height_map(coord, center),
            move |result, set: &mut TileSet| set.receive_height(coord, result),
        );
        tile.height = HeightState::Pending(token);
        debug!(x = coord.x, y = coord.y, "height map requested");
    }

    fn request_mesh(&mut self, coord: TileCoord, level: usize) {
        let Some(tile) = self.set.tiles.get_mut(&coord) else { return };
        let (Some(grid), Some(info)) = (tile.height_map().cloned(), self.policy.thresholds.get(level)) else { return };
        let generator = Arc::clone(&self.generator);
        let lod = info.lod;
        let token = self.queue.submit(
            move || generator.mesh(&grid, lod),
            move |result, set: &mut TileSet| set.receive_mesh(coord, level, lod, result),
        );
        tile.meshes[level] = MeshSlot::Pending(token);
        debug!(x = coord.x, y = coord.y, lod, "mesh requested");
    }

    /// Bring one tile up to date for a viewer at `viewer`.
    ///
    /// Does nothing but (re)request the height map until it has arrived.
    /// After that: pick the detail level for the viewer distance, show its
    /// mesh if ready or request it, and flip visibility.
    pub fn update_tile(&mut self, coord: TileCoord, viewer: Vec2, tick: u64) {
        let max_attempts = self.policy.max_attempts;
        let Some(tile) = self.set.tiles.get_mut(&coord) else { return };
        tile.last_seen_tick = tick;
        if !matches!(tile.height, HeightState::Ready(_)) {
            let retry = matches!(tile.height, HeightState::Unrequested) && tile.failures < max_attempts;
            if retry {
                self.request_height(coord);
            }
            return;
        }

        let level = self.policy.thresholds.select(tile.bounds.distance(viewer));
        let was_visible = tile.visible;
        let mut wants_mesh = None;

        if let Some(level) = level {
            if tile.displayed_lod != Some(level) {
                match &tile.meshes[level] {
                    MeshSlot::Ready(mesh) => {
                        tile.displayed_lod = Some(level);
                        let lod = self.policy.thresholds.get(level).map_or(0, |l| l.lod);
                        self.set.events.push(TileEvent::MeshDisplayed { coord, lod, mesh: Arc::clone(mesh) });
                    }
                    MeshSlot::Empty if tile.failures < max_attempts => wants_mesh = Some(level),
                    MeshSlot::Empty | MeshSlot::Pending(_) => {}
                }
            }
        }

        let visible = level.is_some();
        if visible != was_visible {
            tile.visible = visible;
            self.set.set_visible(coord, visible);
        }
        if let Some(level) = wants_mesh {
            self.request_mesh(coord, level);
        }
    }

    /// Collider upkeep for a visible tile: request the collider-level mesh
    /// once the viewer is within that level's distance, and assign it once
    /// the viewer is within the collider distance. Assigned at most once.
    pub fn update_collision(&mut self, coord: TileCoord, viewer: Vec2) {
        let level = self.policy.collider_level;
        let Some(info) = self.policy.thresholds.get(level) else { return };
        let Some(tile) = self.set.tiles.get_mut(&coord) else { return };
        if tile.collider_set || tile.height_map().is_none() {
            return;
        }
        let sqr_distance = tile.bounds.sqr_distance(viewer);

        if sqr_distance < self.policy.collider_distance * self.policy.collider_distance {
            if let MeshSlot::Ready(mesh) = &tile.meshes[level] {
                tile.collider_set = true;
                debug!(x = coord.x, y = coord.y, "collider assigned");
                self.set.events.push(TileEvent::ColliderAssigned { coord, mesh: Arc::clone(mesh) });
                return;
            }
        }
        let needs_request = matches!(tile.meshes[level], MeshSlot::Empty)
            && tile.failures < self.policy.max_attempts
            && sqr_distance < info.visible_distance * info.visible_distance;
        if needs_request {
            self.request_mesh(coord, level);
        }
    }

    /// Apply finished generation work, then update every tile it touched.
    pub fn apply_completions(&mut self, viewer: Vec2, tick: u64) -> DrainReport {
        let report = self.queue.drain(&mut self.set);
        self.update_touched(viewer, tick);
        report
    }

    /// Keep applying completions until no work is left or `timeout` passes.
    pub fn wait_idle(&mut self, viewer: Vec2, tick: u64, timeout: Duration) -> DrainReport {
        let deadline = Instant::now() + timeout;
        let mut total = DrainReport::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let report = self.queue.drain_blocking(&mut self.set, remaining);
            total.applied += report.applied;
            total.discarded += report.discarded;
            self.update_touched(viewer, tick);
            if self.queue.in_flight() == 0 || remaining.is_zero() {
                return total;
            }
        }
    }

    fn update_touched(&mut self, viewer: Vec2, tick: u64) {
        let mut touched = std::mem::take(&mut self.set.touched);
        touched.sort_unstable();
        touched.dedup();
        for coord in touched {
            self.update_tile(coord, viewer, tick);
            if self.tile(coord).is_some_and(Tile::is_visible) {
                self.update_collision(coord, viewer);
            }
        }
    }

    /// Cancel work for hidden tiles outside `in_range`, then evict if the
    /// store is over its tile budget. Returns the number of evicted tiles.
    pub fn retire_out_of_range(&mut self, in_range: &HashSet<TileCoord>, viewer: Vec2) -> usize {
        let mut candidates = Vec::new();
        for (coord, tile) in &mut self.set.tiles {
            if tile.visible || in_range.contains(coord) {
                continue;
            }
            let cancelled = tile.cancel_pending();
            if cancelled > 0 {
                debug!(x = coord.x, y = coord.y, cancelled, "cancelled out-of-range requests");
            }
            candidates.push((tile.bounds.sqr_distance(viewer), tile.last_seen_tick, *coord));
        }

        let Some(limit) = self.policy.max_retained else { return 0 };
        let excess = self.set.tiles.len().saturating_sub(limit);
        if excess == 0 {
            return 0;
        }
        // Farthest first; among equals, the one seen longest ago.
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        let mut evicted = 0;
        for (_, _, coord) in candidates.into_iter().take(excess) {
            self.set.tiles.remove(&coord);
            self.set.events.push(TileEvent::Evicted { coord });
            evicted += 1;
        }
        debug!(evicted, remaining = self.set.tiles.len(), "evicted tiles");
        evicted
    }
}
