//! Contracts for the external collaborators: viewpoint, collision queries,
//! sound playback, and randomness.
//!
//! The simulation never reaches into rendering, physics, or audio directly;
//! it consumes these narrow traits and ships default implementations for
//! headless hosts and tests.

use glam::Vec3;
use rand::Rng;
use shiv_replication::ParticipantId;
use shiv_rpc::SoundCategory;

// ---------------------------------------------------------------------------
// Viewpoint
// ---------------------------------------------------------------------------

/// The local participant's viewpoint (camera) pose.
pub trait ViewpointQuery {
    /// Viewpoint position.
    fn origin(&self) -> Vec3;
    /// Viewpoint aim direction (unit vector, not plane-projected).
    fn forward(&self) -> Vec3;
}

/// Projects a direction onto the horizontal plane and normalizes it, the
/// facing used to orient dashes and attacks.
pub fn horizontal(direction: Vec3) -> Vec3 {
    Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero()
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// First-obstruction result of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// World-space hit point.
    pub point: Vec3,
    /// Surface normal at the hit.
    pub normal: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
}

/// Physics queries the simulation consumes. Implementations exclude the
/// asking participant's own body from ray results.
pub trait CollisionQuery {
    /// First obstruction along a ray, if any within `max_distance`.
    fn resolve_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;
    /// Whether a participant standing at `position` is on the ground.
    fn is_grounded(&self, position: Vec3) -> bool;
}

/// A featureless flat arena: everything is grounded, rays hit nothing.
/// Serves headless hosts and tests.
pub struct FlatArena;

impl CollisionQuery for FlatArena {
    fn resolve_ray(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32) -> Option<RayHit> {
        None
    }

    fn is_grounded(&self, _position: Vec3) -> bool {
        true
    }
}

/// Resolves an aim point: the first obstruction along the viewpoint ray, or
/// the max-range point if nothing is hit.
pub fn aim_point(
    view: &dyn ViewpointQuery,
    collision: &dyn CollisionQuery,
    max_distance: f32,
) -> Vec3 {
    let origin = view.origin();
    let direction = view.forward();
    match collision.resolve_ray(origin, direction, max_distance) {
        Some(hit) => hit.point,
        None => origin + direction.normalize_or_zero() * max_distance,
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Local sound playback. Fire-and-forget: never fails the caller.
pub trait SfxSink {
    /// Play the given clip variant positioned at a participant.
    fn play(&mut self, category: SoundCategory, variant: u8, at: ParticipantId);
}

/// Discards every sound. Serves headless hosts and tests.
pub struct NullSfx;

impl SfxSink for NullSfx {
    fn play(&mut self, _category: SoundCategory, _variant: u8, _at: ParticipantId) {}
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Pluggable randomness source.
pub trait ArenaRng {
    /// A vector inside the unit sphere scaled by `magnitude` (knife spread).
    fn unit_perturbation(&mut self, magnitude: f32) -> Vec3;
    /// A uniform index in `0..count` (`0` when `count` is zero).
    fn index(&mut self, count: usize) -> usize;
    /// A uniform hue in `[0, 1)` for body colors.
    fn hue(&mut self) -> f32;
}

/// [`ArenaRng`] over any [`rand::Rng`]. Seed a `StdRng` for deterministic
/// tests, or use [`thread_source`] for hosts.
pub struct RandomSource<R>(pub R);

impl<R: Rng> ArenaRng for RandomSource<R> {
    fn unit_perturbation(&mut self, magnitude: f32) -> Vec3 {
        // Rejection-sample the unit ball.
        loop {
            let v = Vec3::new(
                self.0.random_range(-1.0..1.0),
                self.0.random_range(-1.0..1.0),
                self.0.random_range(-1.0..1.0),
            );
            if v.length_squared() <= 1.0 {
                return v * magnitude;
            }
        }
    }

    fn index(&mut self, count: usize) -> usize {
        if count == 0 {
            0
        } else {
            self.0.random_range(0..count)
        }
    }

    fn hue(&mut self) -> f32 {
        self.0.random_range(0.0..1.0)
    }
}

/// A thread-local randomness source for hosts.
pub fn thread_source() -> RandomSource<rand::rngs::ThreadRng> {
    RandomSource(rand::rng())
}

/// Converts an HSV color (all components in `[0, 1]`) to RGB. Body colors
/// use full saturation and value with a random hue.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h = (h.rem_euclid(1.0)) * 6.0;
    let sector = h.floor() as u32 % 6;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct FixedView {
        origin: Vec3,
        forward: Vec3,
    }

    impl ViewpointQuery for FixedView {
        fn origin(&self) -> Vec3 {
            self.origin
        }
        fn forward(&self) -> Vec3 {
            self.forward
        }
    }

    struct WallAt {
        distance: f32,
    }

    impl CollisionQuery for WallAt {
        fn resolve_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
            (self.distance <= max_distance).then(|| RayHit {
                point: origin + direction * self.distance,
                normal: -direction,
                distance: self.distance,
            })
        }
        fn is_grounded(&self, _position: Vec3) -> bool {
            true
        }
    }

    #[test]
    fn test_aim_point_resolves_first_obstruction() {
        let view = FixedView {
            origin: Vec3::new(0.0, 1.0, 0.0),
            forward: Vec3::Z,
        };
        let point = aim_point(&view, &WallAt { distance: 12.0 }, 100.0);
        assert!((point - Vec3::new(0.0, 1.0, 12.0)).length() < 1e-5);
    }

    #[test]
    fn test_aim_point_falls_back_to_max_range() {
        let view = FixedView {
            origin: Vec3::ZERO,
            forward: Vec3::X,
        };
        let point = aim_point(&view, &FlatArena, 100.0);
        assert!((point - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_horizontal_projection_is_normalized() {
        let dir = horizontal(Vec3::new(3.0, 5.0, 4.0));
        assert!((dir.length() - 1.0).abs() < 1e-5);
        assert_eq!(dir.y, 0.0);
    }

    #[test]
    fn test_perturbation_stays_within_magnitude() {
        let mut rng = RandomSource(StdRng::seed_from_u64(7));
        for _ in 0..100 {
            let v = rng.unit_perturbation(0.05);
            assert!(v.length() <= 0.05 + 1e-6);
        }
    }

    #[test]
    fn test_index_bounds() {
        let mut rng = RandomSource(StdRng::seed_from_u64(7));
        assert_eq!(rng.index(0), 0);
        for _ in 0..50 {
            assert!(rng.index(4) < 4);
        }
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(green[1] > 0.99 && green[0] < 0.01);
        let blue = hsv_to_rgb(2.0 / 3.0, 1.0, 1.0);
        assert!(blue[2] > 0.99 && blue[0] < 0.01);
    }
}
