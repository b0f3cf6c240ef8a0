//! Tile addressing and ground-plane bounds.
//! Tiles live on an unbounded integer grid; tile `(0, 0)` is centred on the
//! world origin.
use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// A tile in the infinite terrain grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile whose centre is nearest to `position`, for tiles of side
    /// `tile_world_size`.
    pub fn containing(position: Vec2, tile_world_size: f32) -> Self {
        Self {
            x: (position.x / tile_world_size).round() as i32,
            y: (position.y / tile_world_size).round() as i32,
        }
    }

    /// World-space centre of this tile.
    pub fn center(self, tile_world_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * tile_world_size, self.y as f32 * tile_world_size)
    }

    /// Ground-plane bounds of this tile.
    pub fn bounds(self, tile_world_size: f32) -> Bounds2 {
        Bounds2::from_center_size(self.center(tile_world_size), tile_world_size)
    }

    /// Chebyshev distance in tiles.
    pub fn tile_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Axis-aligned square on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds2 {
    pub fn from_center_size(center: Vec2, size: f32) -> Self {
        let half = size / 2.0;
        Self {
            min: Vec2::new(center.x - half, center.y - half),
            max: Vec2::new(center.x + half, center.y + half),
        }
    }

    /// Squared distance from `p` to the nearest point of the bounds; zero
    /// when `p` is inside.
    pub fn sqr_distance(&self, p: Vec2) -> f32 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        dx * dx + dy * dy
    }

    pub fn distance(&self, p: Vec2) -> f32 {
        self.sqr_distance(p).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_rounds_to_nearest_tile_centre() {
        let size = 100.0;
        assert_eq!(TileCoord::containing(Vec2::new(49.0, -49.0), size), TileCoord::new(0, 0));
        assert_eq!(TileCoord::containing(Vec2::new(51.0, -151.0), size), TileCoord::new(1, -2));
    }

    #[test]
    fn distance_is_zero_inside_and_edge_distance_outside() {
        let b = TileCoord::new(0, 0).bounds(10.0);
        assert_eq!(b.sqr_distance(Vec2::new(1.0, 2.0)), 0.0);
        assert!((b.distance(Vec2::new(8.0, 0.0)) - 3.0).abs() < 1e-6);
        // Corner region: diagonal distance to (5, 5).
        assert!((b.distance(Vec2::new(8.0, 9.0)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn tile_distance_is_chebyshev() {
        assert_eq!(TileCoord::new(0, 0).tile_distance(TileCoord::new(-3, 2)), 3);
    }
}
