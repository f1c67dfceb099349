//! Thrown knives and standing hazards.

use glam::Vec3;
use shiv_replication::ParticipantId;
use shiv_rpc::ProjectileId;

/// What kind of projectile this is; decides lethality and destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileKind {
    /// A thrown, kinetic knife: lethal on contact, destroyed by its first
    /// valid hit and by clashes with other owners' projectiles.
    Thrown,
    /// A permanent fixture (the held melee knife, standing hazards): never
    /// destroyed, contact is non-lethal.
    Permanent,
}

/// An ephemeral projectile tracked by the authority.
///
/// The owner is held by id only: a weak reference resolved through the
/// participant table at use time. The owner disconnecting mid-flight is a
/// handled case, never a crash.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    /// Authority-allocated identifier.
    pub id: ProjectileId,
    /// The participant who produced it.
    pub owner: ParticipantId,
    /// Kind (decides lethality and destruction rules).
    pub kind: ProjectileKind,
    /// Current position.
    pub position: Vec3,
    /// Normalized flight direction.
    pub direction: Vec3,
    /// Seconds since spawn.
    pub age: f32,
    /// Set once the projectile has produced a hit; spent projectiles are
    /// ignored by further contact reports until the destroy broadcast
    /// settles.
    pub spent: bool,
}

impl Projectile {
    /// Creates a thrown knife.
    pub fn thrown(id: ProjectileId, owner: ParticipantId, origin: Vec3, direction: Vec3) -> Self {
        Self {
            id,
            owner,
            kind: ProjectileKind::Thrown,
            position: origin,
            direction: direction.normalize_or_zero(),
            age: 0.0,
            spent: false,
        }
    }

    /// Advances the straight-line flight by `dt` seconds at `speed`.
    pub fn advance(&mut self, dt: f32, speed: f32) {
        self.position += self.direction * (speed * dt);
        self.age += dt;
    }

    /// Whether the lifetime budget is used up.
    pub fn expired(&self, lifetime: f32) -> bool {
        self.age >= lifetime
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_along_direction() {
        let mut knife = Projectile::thrown(
            ProjectileId(1),
            ParticipantId(2),
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 2.0),
        );
        knife.advance(0.5, 5.0);
        // Direction is normalized before flight.
        assert!((knife.position.z - 2.5).abs() < 1e-5);
        assert_eq!(knife.position.x, 0.0);
        assert!((knife.age - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_lifetime_budget() {
        let mut knife =
            Projectile::thrown(ProjectileId(1), ParticipantId(2), Vec3::ZERO, Vec3::Z);
        assert!(!knife.expired(60.0));
        knife.advance(60.0, 5.0);
        assert!(knife.expired(60.0));
    }
}
