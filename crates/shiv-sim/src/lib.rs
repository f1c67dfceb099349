//! Per-participant action simulation: movement/combat flags, the melee
//! combo, dash validation, projectiles, and the pure combat decisions the
//! authority applies.
//!
//! Everything here is deliberately free of session wiring: these are the
//! building blocks `shiv-session` composes with replicated variables and
//! scheduled transitions.

pub mod combat;
pub mod dash;
pub mod flags;
pub mod hooks;
pub mod melee;
pub mod projectile;

pub use combat::{ContactDecision, HitOutcome, clash_destroys_other, projectile_contact, resolve_hit};
pub use dash::{DashRejection, validate_dash};
pub use flags::ActionFlags;
pub use hooks::{
    ArenaRng, CollisionQuery, FlatArena, NullSfx, RandomSource, RayHit, SfxSink, ViewpointQuery,
    aim_point, horizontal, hsv_to_rgb, thread_source,
};
pub use melee::{MeleeDriver, MeleeWaypoint, StepPlan};
pub use projectile::{Projectile, ProjectileKind};
