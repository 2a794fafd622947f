use crate::entities::AttackTarget;
use crate::geometry::Vec2;

pub struct Projectile {
    pub id: u64,
    pub faction: i32,
    pub origin: Vec2,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    pub target: AttackTarget,
    pub active: bool,
}

impl Projectile {
    pub fn fired_at(
        id: u64,
        faction: i32,
        origin: Vec2,
        target_position: Vec2,
        speed: f64,
        damage: f32,
        target: AttackTarget,
    ) -> Self {
        let direction = (target_position - origin).normalized();
        Projectile {
            id,
            faction,
            origin,
            position: origin,
            velocity: direction * speed,
            damage,
            target,
            active: true,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.position = self.position + self.velocity * dt as f64;
    }

    /// True once the projectile has reached (or passed) `target_position`.
    pub fn has_arrived(&self, target_position: Vec2, step_distance: f64) -> bool {
        self.position.distance(target_position) <= step_distance.max(4.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projectile_travels_toward_target() {
        let mut p = Projectile::fired_at(1, 0, Vec2::ZERO, Vec2::new(100.0, 0.0), 50.0, 10.0, AttackTarget::Unit(2));
        p.advance(1.0);
        assert!(p.position.x > 0.0);
        assert_eq!(p.position.y, 0.0);
    }

    #[test]
    fn has_arrived_true_once_close_enough() {
        let p = Projectile::fired_at(1, 0, Vec2::new(95.0, 0.0), Vec2::new(100.0, 0.0), 50.0, 10.0, AttackTarget::Unit(2));
        assert!(p.has_arrived(Vec2::new(100.0, 0.0), 10.0));
    }
}
