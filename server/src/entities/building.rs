use crate::entities::defs::{BuildingDef, BuildingKind, UnitKind};
use crate::entities::AttackTarget;
use crate::geometry::{Rect, Vec2};

/// One queued production order: which unit to build, and at what cost (the
/// cost is snapshotted at enqueue time so a later balance change can't
/// retroactively alter an in-flight order).
#[derive(Debug, Clone, Copy)]
pub struct ProductionOrder {
    pub unit_kind: UnitKind,
    pub metal_cost: f32,
    pub energy_cost: f32,
    pub build_time: f32,
}

/// Hard cap on queued production orders.
pub const MAX_PRODUCTION_QUEUE: usize = 5;

pub struct Building {
    pub id: u64,
    pub kind: BuildingKind,
    pub faction: i32,
    pub center: Vec2,
    pub size: f64,
    pub health: f32,
    pub max_health: f32,
    pub completed: bool,
    pub build_progress: f32,
    pub queue: Vec<ProductionOrder>,
    pub production_progress: f32,
    pub producing: bool,
    pub rally_point: Option<Vec2>,
    pub attack_target: Option<AttackTarget>,
    pub cooldown: f32,
    pub range: f64,
    pub damage: f32,
    pub fire_rate: f32,
    pub energy_per_shot: f32,
    pub offensive: bool,
    pub active: bool,
}

impl Building {
    pub fn place(id: u64, faction: i32, center: Vec2, def: &BuildingDef) -> Self {
        Building {
            id,
            kind: def.kind,
            faction,
            center,
            size: def.size,
            health: def.max_health,
            max_health: def.max_health,
            completed: false,
            build_progress: 0.0,
            queue: Vec::new(),
            production_progress: 0.0,
            producing: false,
            rally_point: None,
            attack_target: None,
            cooldown: 0.0,
            range: def.range,
            damage: def.damage,
            fire_rate: def.fire_rate,
            energy_per_shot: def.energy_per_shot,
            offensive: def.offensive,
            active: true,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.center, Vec2::new(self.size, self.size))
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    /// Spawn point for a newly produced unit: just outside the footprint,
    /// biased toward the rally point if one is set.
    pub fn spawn_point(&self) -> Vec2 {
        let half = self.size / 2.0;
        let direction = match self.rally_point {
            Some(rally) => (rally - self.center).normalized(),
            None => Vec2::new(1.0, 0.0),
        };
        let direction = if direction.length_squared() < 1e-9 { Vec2::new(1.0, 0.0) } else { direction };
        self.center + direction * (half + 24.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::defs::building_def;

    #[test]
    fn placed_building_starts_incomplete() {
        let def = building_def(BuildingKind::Factory);
        let b = Building::place(1, 0, Vec2::ZERO, &def);
        assert!(!b.completed);
        assert_eq!(b.build_progress, 0.0);
    }

    #[test]
    fn spawn_point_is_outside_the_footprint_toward_rally() {
        let def = building_def(BuildingKind::Factory);
        let mut b = Building::place(1, 0, Vec2::new(100.0, 100.0), &def);
        b.rally_point = Some(Vec2::new(300.0, 100.0));
        let spawn = b.spawn_point();
        assert!(spawn.x > b.center.x);
    }
}
