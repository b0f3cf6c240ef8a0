//! Per-tick streaming driver.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::store::{ChunkStore, TileGenerator};
use super::TileEvent;
use crate::config::TerrainConfig;
use crate::coords::TileCoord;
use crate::error::Error;
use crate::math::Vec2;
use crate::work_queue::DrainReport;

/// What one [`StreamingController::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub drained: DrainReport,
    /// The visible set was recomputed this tick.
    pub refreshed: bool,
    pub created: usize,
    pub evicted: usize,
    pub tiles: usize,
    pub visible: usize,
    pub in_flight: usize,
}

pub struct StreamingController {
    store: ChunkStore,
    viewer_move_threshold: f32,
    /// Tiles checked in each direction around the viewer's tile.
    tiles_in_view: i32,
    viewer: Option<Vec2>,
    /// Viewer position at the last visible-set recompute.
    refresh_anchor: Option<Vec2>,
    tick: u64,
}

impl StreamingController {
    pub fn new(config: &TerrainConfig) -> Result<Self, Error> {
        config.validate()?;
        let store = ChunkStore::new(config)?;
        Ok(Self::from_store(config, store))
    }

    pub fn with_generator(config: &TerrainConfig, generator: Arc<dyn TileGenerator>) -> Result<Self, Error> {
        config.validate()?;
        let store = ChunkStore::with_generator(config, generator)?;
        Ok(Self::from_store(config, store))
    }

    fn from_store(config: &TerrainConfig, store: ChunkStore) -> Self {
        let cutoff = store.thresholds().max_view_distance();
        let tiles_in_view = (cutoff / store.world_size()).round() as i32;
        Self {
            store,
            viewer_move_threshold: config.streaming.viewer_move_threshold,
            tiles_in_view,
            viewer: None,
            refresh_anchor: None,
            tick: 0,
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn tiles_in_view(&self) -> i32 {
        self.tiles_in_view
    }

    pub fn viewer(&self) -> Option<Vec2> {
        self.viewer
    }

    /// Events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<TileEvent> {
        self.store.take_events()
    }

    /// Advance one tick with the viewer at `viewer` (ground-plane x, z).
    pub fn tick(&mut self, viewer: Vec2) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let moved = self.viewer != Some(viewer);
        self.viewer = Some(viewer);

        let drained = self.store.apply_completions(viewer, tick);

        if moved {
            for coord in self.store.visible().to_vec() {
                self.store.update_collision(coord, viewer);
            }
        }

        let threshold = self.viewer_move_threshold;
        let needs_refresh = match self.refresh_anchor {
            None => true,
            Some(anchor) => (viewer - anchor).length_squared() > threshold * threshold,
        };
        let (mut created, mut evicted) = (0, 0);
        if needs_refresh {
            self.refresh_anchor = Some(viewer);
            (created, evicted) = self.refresh_visible(viewer, tick);
        }

        TickReport {
            tick,
            drained,
            refreshed: needs_refresh,
            created,
            evicted,
            tiles: self.store.len(),
            visible: self.store.visible().len(),
            in_flight: self.store.in_flight(),
        }
    }

    /// Block until outstanding generation work has been applied, for
    /// offline use and tests.
    pub fn wait_idle(&mut self, timeout: Duration) -> DrainReport {
        let viewer = self.viewer.unwrap_or(Vec2::ZERO);
        self.store.wait_idle(viewer, self.tick, timeout)
    }

    fn refresh_visible(&mut self, viewer: Vec2, tick: u64) -> (usize, usize) {
        let mut updated = HashSet::new();
        for coord in self.store.visible().iter().rev().copied().collect::<Vec<_>>() {
            updated.insert(coord);
            self.store.update_tile(coord, viewer, tick);
        }

        let center = TileCoord::containing(viewer, self.store.world_size());
        let r = self.tiles_in_view;
        let mut in_range = HashSet::new();
        let mut created = 0;
        for dy in -r..=r {
            for dx in -r..=r {
                let coord = TileCoord::new(center.x + dx, center.y + dy);
                in_range.insert(coord);
                if updated.contains(&coord) {
                    continue;
                }
                if self.store.contains(coord) {
                    self.store.update_tile(coord, viewer, tick);
                } else if self.store.ensure_tile(coord, tick) {
                    created += 1;
                }
            }
        }

        let evicted = self.store.retire_out_of_range(&in_range, viewer);
        info!(
            x = center.x,
            y = center.y,
            created,
            evicted,
            visible = self.store.visible().len(),
            tiles = self.store.len(),
            "visible set recomputed"
        );
        (created, evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::lod::{LodInfo, LodThresholds};

    const WAIT: Duration = Duration::from_secs(60);

    fn config() -> TerrainConfig {
        let mut config = TerrainConfig::default();
        config.height_map.erode = false;
        // Tiles are 125 units wide, so the view reaches two tiles out.
        config.streaming.detail_levels = LodThresholds::new(vec![LodInfo::new(0, 100.0), LodInfo::new(1, 200.0)]);
        config.streaming.worker_threads = 2;
        config
    }

    #[test]
    fn first_tick_creates_the_view_square() {
        let mut c = StreamingController::new(&config()).unwrap();
        assert_eq!(c.tiles_in_view(), 2);
        let report = c.tick(Vec2::ZERO);
        assert!(report.refreshed);
        assert_eq!(report.created, 25);
        assert_eq!(report.tiles, 25);
        assert_eq!(report.visible, 0);
        assert!(c.drain_events().is_empty());

        // Standing still does not recompute.
        assert!(!c.tick(Vec2::ZERO).refreshed);
        assert!(!c.tick(Vec2::new(10.0, 10.0)).refreshed);
        c.wait_idle(WAIT);
    }

    #[test]
    fn nearby_tiles_become_visible_at_full_detail() {
        let mut c = StreamingController::new(&config()).unwrap();
        c.tick(Vec2::ZERO);
        c.wait_idle(WAIT);
        c.tick(Vec2::ZERO);

        let origin = c.store().tile(TileCoord::new(0, 0)).unwrap();
        assert!(origin.is_visible());
        assert_eq!(origin.displayed_lod(), Some(0));
        assert!(origin.has_collider());

        // 187.5 units from the viewer: second level.
        let second = c.store().tile(TileCoord::new(2, 0)).unwrap();
        assert!(second.is_visible());
        assert_eq!(second.displayed_lod(), Some(1));

        // Corner tile is ~265 units away: out of view.
        assert!(!c.store().tile(TileCoord::new(2, 2)).unwrap().is_visible());

        let events = c.drain_events();
        let shown = events.iter().filter(|e| matches!(e, TileEvent::VisibilityChanged { visible: true, .. })).count();
        assert_eq!(shown, c.store().visible().len());
        assert_eq!(events.iter().filter(|e| matches!(e, TileEvent::ColliderAssigned { .. })).count(), 1);
    }

    #[test]
    fn moving_away_hides_but_keeps_tiles() {
        let mut c = StreamingController::new(&config()).unwrap();
        c.tick(Vec2::ZERO);
        c.wait_idle(WAIT);
        c.tick(Vec2::ZERO);
        let was_visible = c.store().visible().len();
        assert!(was_visible > 0);
        c.drain_events();

        let report = c.tick(Vec2::new(5_000.0, 0.0));
        assert!(report.refreshed);
        assert_eq!(report.created, 25);
        assert_eq!(report.tiles, 50);
        assert_eq!(report.visible, 0);
        let hidden = c
            .drain_events()
            .iter()
            .filter(|e| matches!(e, TileEvent::VisibilityChanged { visible: false, .. }))
            .count();
        assert_eq!(hidden, was_visible);
        assert!(c.store().contains(TileCoord::new(0, 0)));
        c.wait_idle(WAIT);
    }

    #[test]
    fn eviction_bounds_the_tile_count() {
        let mut config = config();
        config.streaming.max_retained_tiles = Some(25);
        let mut c = StreamingController::new(&config).unwrap();
        c.tick(Vec2::ZERO);
        c.wait_idle(WAIT);
        c.tick(Vec2::ZERO);
        c.drain_events();

        let report = c.tick(Vec2::new(5_000.0, 0.0));
        assert_eq!(report.evicted, 25);
        assert_eq!(c.store().len(), 25);
        assert!(!c.store().contains(TileCoord::new(0, 0)));
        let evicted = c.drain_events().iter().filter(|e| matches!(e, TileEvent::Evicted { .. })).count();
        assert_eq!(evicted, 25);
        c.wait_idle(WAIT);
    }

    #[test]
    fn leaving_before_generation_finishes_cancels_requests() {
        let mut c = StreamingController::new(&config()).unwrap();
        c.tick(Vec2::ZERO);
        c.tick(Vec2::new(5_000.0, 0.0));
        c.wait_idle(WAIT);

        for dy in -2..=2 {
            for dx in -2..=2 {
                let tile = c.store().tile(TileCoord::new(dx, dy)).unwrap();
                assert!(!tile.is_visible());
                assert!(!tile.is_pending());
            }
        }
        assert_eq!(c.store().in_flight(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.streaming.collider_lod_index = 5;
        assert!(matches!(StreamingController::new(&config), Err(Error::Config(_))));
    }
}
