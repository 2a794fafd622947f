//! World-bounds clamping and axis-separated obstacle resolution.

use crate::geometry::{Rect, Vec2};
use crate::terrain::TerrainQuery;

/// Clamps a desired center position so `mover` (sized as given) stays fully
/// inside the world bounds.
fn clamp_to_world(mover_size: Vec2, desired: Vec2, world_size: Vec2) -> Vec2 {
    let half = mover_size / 2.0;
    Vec2::new(
        desired.x.clamp(half.x, (world_size.x - half.x).max(half.x)),
        desired.y.clamp(half.y, (world_size.y - half.y).max(half.y)),
    )
}

/// Resolves a mover's desired position against world bounds, terrain and a
/// list of obstacle rectangles. Returns the position the mover should end
/// the tick at.
///
/// Algorithm:
/// 1. Clamp to world bounds.
/// 2. If terrain rejects the full footprint, try X-only then Y-only axis
///    separation; if neither is passable, give up and return `current`.
/// 3. For each obstacle the candidate bounds intersect: if the mover
///    already overlapped it and the candidate reduces the overlap, accept
///    anyway (escape hatch). Otherwise try X-only then Y-only sliding;
///    accept the first variant clear of both terrain and obstacles.
pub fn resolve_movement(
    mover_size: Vec2,
    current: Vec2,
    desired: Vec2,
    terrain: &dyn TerrainQuery,
    obstacles: &[Rect],
) -> Vec2 {
    let world_size = terrain.world_size();
    let clamped = clamp_to_world(mover_size, desired, world_size);

    let full_bounds = Rect::new(clamped, mover_size);
    let terrain_ok_position = if terrain.is_passable(&full_bounds) {
        Some(clamped)
    } else {
        let x_only = Vec2::new(clamped.x, current.y);
        let y_only = Vec2::new(current.x, clamped.y);
        if terrain.is_passable(&Rect::new(x_only, mover_size)) {
            Some(x_only)
        } else if terrain.is_passable(&Rect::new(y_only, mover_size)) {
            Some(y_only)
        } else {
            None
        }
    };

    let Some(candidate) = terrain_ok_position else {
        return current;
    };

    resolve_against_obstacles(mover_size, current, candidate, terrain, obstacles)
}

fn resolve_against_obstacles(
    mover_size: Vec2,
    current: Vec2,
    candidate: Vec2,
    terrain: &dyn TerrainQuery,
    obstacles: &[Rect],
) -> Vec2 {
    let current_bounds = Rect::new(current, mover_size);
    let candidate_bounds = Rect::new(candidate, mover_size);

    let blocking = obstacles.iter().find(|o| candidate_bounds.intersects(o));
    let Some(obstacle) = blocking else {
        return candidate;
    };

    if current_bounds.intersects(obstacle) {
        let before = current_bounds.overlap_area(obstacle);
        let after = candidate_bounds.overlap_area(obstacle);
        if after < before {
            return candidate;
        }
    }

    let x_only = Vec2::new(candidate.x, current.y);
    let y_only = Vec2::new(current.x, candidate.y);

    for try_pos in [x_only, y_only] {
        let bounds = Rect::new(try_pos, mover_size);
        if terrain.is_passable(&bounds) && !obstacles.iter().any(|o| bounds.intersects(o)) {
            return try_pos;
        }
    }

    current
}

/// Probes alternative headings around `direct_angle` in +/-30 degree steps
/// up to 180 degrees, returning the first passable, non-overlapping
/// position found, or `current` as a fallback.
pub fn find_avoidance_position(
    mover_size: Vec2,
    current: Vec2,
    direct_angle: f64,
    step_distance: f64,
    terrain: &dyn TerrainQuery,
    obstacles: &[Rect],
) -> Vec2 {
    const STEP: f64 = std::f64::consts::PI / 6.0; // 30 degrees

    let mut offset = STEP;
    while offset <= std::f64::consts::PI {
        for sign in [1.0, -1.0] {
            let angle = direct_angle + sign * offset;
            let probe = current + Vec2::from_angle(angle) * step_distance;
            let bounds = Rect::new(probe, mover_size);
            if terrain.is_passable(&bounds) && !obstacles.iter().any(|o| bounds.intersects(o)) {
                return probe;
            }
        }
        offset += STEP;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{TileGrid, TileKind};

    #[test]
    fn resolve_movement_stays_within_world_bounds() {
        let grid = TileGrid::new(10, 10, 32.0, TileKind::Grass);
        let size = Vec2::new(16.0, 16.0);
        let result = resolve_movement(size, Vec2::new(10.0, 10.0), Vec2::new(-50.0, -50.0), &grid, &[]);
        let bounds = Rect::new(result, size);
        let world = grid.world_size();
        assert!(bounds.min().x >= 0.0 && bounds.min().y >= 0.0);
        assert!(bounds.max().x <= world.x && bounds.max().y <= world.y);
    }

    #[test]
    fn resolve_movement_slides_along_obstacle() {
        let grid = TileGrid::new(20, 20, 32.0, TileKind::Grass);
        let size = Vec2::new(16.0, 16.0);
        let obstacle = Rect::new(Vec2::new(100.0, 80.0), Vec2::new(16.0, 16.0));
        // Mover approaches from directly left, trying to move straight through.
        let current = Vec2::new(80.0, 80.0);
        let desired = Vec2::new(105.0, 80.0);
        let result = resolve_movement(size, current, desired, &grid, &[obstacle]);
        let result_bounds = Rect::new(result, size);
        assert!(!result_bounds.intersects(&obstacle));
    }

    #[test]
    fn resolve_movement_escape_hatch_allows_reducing_overlap() {
        let grid = TileGrid::new(20, 20, 32.0, TileKind::Grass);
        let size = Vec2::new(16.0, 16.0);
        // Mover already overlaps the obstacle slightly; moving further in
        // reduces the overlap relative to the obstacle's other side.
        let obstacle = Rect::new(Vec2::new(100.0, 80.0), Vec2::new(16.0, 16.0));
        let current = Vec2::new(94.0, 80.0); // already overlapping by 2px
        let desired = Vec2::new(90.0, 80.0); // moving away, overlap shrinks
        let result = resolve_movement(size, current, desired, &grid, &[obstacle]);
        assert_eq!(result, desired);
    }

    #[test]
    fn find_avoidance_position_falls_back_to_current_when_boxed_in() {
        let grid = TileGrid::new(10, 10, 32.0, TileKind::Grass);
        let size = Vec2::new(4.0, 4.0);
        let current = Vec2::new(50.0, 50.0);
        // Surround on all probed headings with a single huge obstacle.
        let obstacle = Rect::new(current, Vec2::new(400.0, 400.0));
        let result = find_avoidance_position(size, current, 0.0, 20.0, &grid, &[obstacle]);
        assert_eq!(result, current);
    }
}
