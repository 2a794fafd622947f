//! Terrain query interface the simulation consumes.
//!
//! Map authoring and terrain generation are out of scope for the core
//! this module only defines the passability/buildability oracle and
//! a minimal tile grid implementation sufficient to back it for a match.

use crate::geometry::{Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Grass,
    Water,
    Metal,
}

/// The query surface the simulation needs from terrain. Kept as a trait so
/// map generation can supply any backing representation.
pub trait TerrainQuery: Send + Sync {
    /// True if a unit/building footprint can stand fully on passable tiles.
    fn is_passable(&self, bounds: &Rect) -> bool;
    /// True if a building footprint may be placed here.
    fn is_buildable(&self, bounds: &Rect) -> bool;
    /// True if any tile under the footprint currently has metal.
    fn has_metal_deposit(&self, bounds: &Rect) -> bool;
    /// World-space size of the playable map.
    fn world_size(&self) -> Vec2;
}

/// A single terrain tile.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub kind: TileKind,
    pub metal_amount: u32,
}

impl Tile {
    pub fn passable(&self) -> bool {
        !matches!(self.kind, TileKind::Water)
    }

    pub fn buildable(&self) -> bool {
        matches!(self.kind, TileKind::Grass | TileKind::Metal)
    }

    pub fn has_metal(&self) -> bool {
        matches!(self.kind, TileKind::Metal) && self.metal_amount > 0
    }
}

/// A coarse, width x height grid of tiles. Quasi-static during a match: only
/// `metal_amount` ever decrements (extractor draining is out of scope here
/// and left for the external map/economy tooling to wire in later).
pub struct TileGrid {
    pub width: usize,
    pub height: usize,
    pub tile_size: f64,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: usize, height: usize, tile_size: f64, default_kind: TileKind) -> Self {
        let metal_amount = if matches!(default_kind, TileKind::Metal) { 1000 } else { 0 };
        TileGrid {
            width,
            height,
            tile_size,
            tiles: vec![Tile { kind: default_kind, metal_amount }; width * height],
        }
    }

    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(self.width as f64 * self.tile_size, self.height as f64 * self.tile_size)
    }

    pub fn set_tile(&mut self, x: usize, y: usize, tile: Tile) {
        if x < self.width && y < self.height {
            self.tiles[y * self.width + x] = tile;
        }
    }

    pub fn tile_at(&self, x: usize, y: usize) -> Option<&Tile> {
        if x < self.width && y < self.height {
            Some(&self.tiles[y * self.width + x])
        } else {
            None
        }
    }

    fn tiles_under(&self, bounds: &Rect) -> Vec<(usize, usize)> {
        let min = bounds.min();
        let max = bounds.max();
        let x0 = (min.x / self.tile_size).floor().max(0.0) as usize;
        let y0 = (min.y / self.tile_size).floor().max(0.0) as usize;
        let x1 = ((max.x / self.tile_size).ceil() as isize - 1).max(0) as usize;
        let y1 = ((max.y / self.tile_size).ceil() as isize - 1).max(0) as usize;
        let mut out = Vec::new();
        for y in y0..=y1.min(self.height.saturating_sub(1)) {
            for x in x0..=x1.min(self.width.saturating_sub(1)) {
                out.push((x, y));
            }
        }
        out
    }
}

impl TerrainQuery for TileGrid {
    fn is_passable(&self, bounds: &Rect) -> bool {
        let size = self.pixel_size();
        let min = bounds.min();
        let max = bounds.max();
        if min.x < 0.0 || min.y < 0.0 || max.x > size.x || max.y > size.y {
            return false;
        }
        self.tiles_under(bounds)
            .iter()
            .all(|&(x, y)| self.tile_at(x, y).map(Tile::passable).unwrap_or(false))
    }

    fn is_buildable(&self, bounds: &Rect) -> bool {
        let size = self.pixel_size();
        let min = bounds.min();
        let max = bounds.max();
        if min.x < 0.0 || min.y < 0.0 || max.x > size.x || max.y > size.y {
            return false;
        }
        self.tiles_under(bounds)
            .iter()
            .all(|&(x, y)| self.tile_at(x, y).map(Tile::buildable).unwrap_or(false))
    }

    fn has_metal_deposit(&self, bounds: &Rect) -> bool {
        self.tiles_under(bounds)
            .iter()
            .any(|&(x, y)| self.tile_at(x, y).map(Tile::has_metal).unwrap_or(false))
    }

    fn world_size(&self) -> Vec2 {
        self.pixel_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grass_grid_is_fully_passable_and_buildable() {
        let grid = TileGrid::new(10, 10, 32.0, TileKind::Grass);
        let bounds = Rect::new(Vec2::new(50.0, 50.0), Vec2::new(20.0, 20.0));
        assert!(grid.is_passable(&bounds));
        assert!(grid.is_buildable(&bounds));
        assert!(!grid.has_metal_deposit(&bounds));
    }

    #[test]
    fn water_tile_blocks_passability() {
        let mut grid = TileGrid::new(10, 10, 32.0, TileKind::Grass);
        grid.set_tile(1, 1, Tile { kind: TileKind::Water, metal_amount: 0 });
        let bounds = Rect::new(Vec2::new(48.0, 48.0), Vec2::new(10.0, 10.0));
        assert!(!grid.is_passable(&bounds));
    }

    #[test]
    fn out_of_bounds_rect_is_never_passable() {
        let grid = TileGrid::new(4, 4, 32.0, TileKind::Grass);
        let bounds = Rect::new(Vec2::new(-10.0, 0.0), Vec2::new(4.0, 4.0));
        assert!(!grid.is_passable(&bounds));
    }

    #[test]
    fn metal_tile_is_detected_under_footprint() {
        let mut grid = TileGrid::new(10, 10, 32.0, TileKind::Grass);
        grid.set_tile(2, 2, Tile { kind: TileKind::Metal, metal_amount: 500 });
        let bounds = Rect::new(Vec2::new(80.0, 80.0), Vec2::new(16.0, 16.0));
        assert!(grid.has_metal_deposit(&bounds));
    }
}
