use crate::entities::defs::{UnitDef, UnitKind};
use crate::entities::AttackTarget;
use crate::geometry::{Rect, Vec2};

pub struct Unit {
    pub id: u64,
    pub kind: UnitKind,
    pub faction: i32,
    pub center: Vec2,
    pub size: f64,
    pub health: f32,
    pub max_health: f32,
    pub facing: f64,
    pub turret_angle: f64,
    pub move_target: Option<Vec2>,
    pub attack_target: Option<AttackTarget>,
    pub cooldown: f32,
    pub range: f64,
    pub damage: f32,
    pub fire_rate: f32,
    pub speed: f64,
    pub active: bool,
}

impl Unit {
    pub fn spawn(id: u64, faction: i32, center: Vec2, def: &UnitDef) -> Self {
        Unit {
            id,
            kind: def.kind,
            faction,
            center,
            size: def.size,
            health: def.max_health,
            max_health: def.max_health,
            facing: 0.0,
            turret_angle: 0.0,
            move_target: None,
            attack_target: None,
            cooldown: 0.0,
            range: def.range,
            damage: def.damage,
            fire_rate: def.fire_rate,
            speed: def.speed,
            active: true,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.center, Vec2::new(self.size, self.size))
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Clears both movement and attack intent (the `stop` command).
    pub fn clear_all_targets(&mut self) {
        self.move_target = None;
        self.attack_target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::defs::unit_def;

    #[test]
    fn spawned_unit_starts_at_full_health_and_active() {
        let def = unit_def(UnitKind::Tank);
        let unit = Unit::spawn(1, 0, Vec2::ZERO, &def);
        assert_eq!(unit.health, unit.max_health);
        assert!(unit.active);
        assert!(!unit.is_dead());
    }

    #[test]
    fn stop_clears_both_move_and_attack_targets() {
        let def = unit_def(UnitKind::Tank);
        let mut unit = Unit::spawn(1, 0, Vec2::ZERO, &def);
        unit.move_target = Some(Vec2::new(5.0, 5.0));
        unit.attack_target = Some(AttackTarget::Unit(42));
        unit.clear_all_targets();
        assert!(unit.move_target.is_none());
        assert!(unit.attack_target.is_none());
    }
}
