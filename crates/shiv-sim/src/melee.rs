//! The three-stage melee combo.
//!
//! Each stage is an ordered list of knife waypoints. A combo walks one
//! stage's waypoints step by step (each step one scheduled transition,
//! interpolating position/yaw linearly); at a stage's last waypoint the
//! combo chains into the next stage only if another attack input landed
//! within the grace window, otherwise it ends. Damage is live only during
//! steps that target a damage-flagged waypoint. Completing the contact step
//! of the final stage triggers the lunge.

use glam::Vec3;

// ---------------------------------------------------------------------------
// Waypoint tables
// ---------------------------------------------------------------------------

/// One pose on the knife's path, relative to the attacker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeleeWaypoint {
    /// Knife offset from the attacker.
    pub offset: Vec3,
    /// Knife yaw in degrees.
    pub yaw: f32,
    /// Seconds to travel here from the previous waypoint.
    pub duration: f32,
    /// Play a swing sound when the step toward this waypoint starts.
    pub strike: bool,
    /// Contact during the step toward this waypoint registers as damage.
    pub damage: bool,
}

const fn wp(x: f32, y: f32, z: f32, yaw: f32, duration: f32, strike: bool, damage: bool) -> MeleeWaypoint {
    MeleeWaypoint {
        offset: Vec3::new(x, y, z),
        yaw,
        duration,
        strike,
        damage,
    }
}

/// Stage 1: wind-up and a wide right-to-left slash.
pub const STAGE_ONE: &[MeleeWaypoint] = &[
    wp(0.0, 0.0, 0.0, 20.0, 0.0, false, false),
    wp(0.34, 0.0, 0.94, 20.0, 0.3, false, false),
    wp(0.7, 0.0, 0.7, 45.0, 0.02, true, true),
    wp(0.94, 0.0, 0.34, 70.0, 0.02, false, true),
    wp(1.0, 0.0, 0.0, 90.0, 0.02, true, true),
    wp(0.94, 0.0, -0.34, 110.0, 0.02, false, true),
    wp(0.7, 0.0, -0.7, 135.0, 0.02, true, true),
    wp(0.0, 0.0, 0.0, 135.0, 0.2, false, false),
];

/// Stage 2: the return slash, sweeping all the way across.
pub const STAGE_TWO: &[MeleeWaypoint] = &[
    wp(0.0, 0.0, 0.0, 135.0, 0.2, false, false),
    wp(0.7, 0.0, -0.7, 135.0, 0.1, true, false),
    wp(0.94, 0.0, -0.34, 110.0, 0.02, false, true),
    wp(1.0, 0.0, 0.0, 90.0, 0.02, false, true),
    wp(0.94, 0.0, 0.34, 70.0, 0.02, true, true),
    wp(0.7, 0.0, 0.7, 45.0, 0.02, false, true),
    wp(0.34, 0.0, 0.94, 20.0, 0.02, false, true),
    wp(0.0, 0.0, 1.0, 20.0, 0.02, true, true),
    wp(-0.34, 0.0, 0.94, -20.0, 0.02, false, true),
    wp(-0.7, 0.0, 0.7, -45.0, 0.02, false, true),
    wp(-0.94, 0.0, 0.34, -70.0, 0.02, false, true),
    wp(0.0, 0.0, 0.0, -70.0, 0.2, false, false),
];

/// Stage 3: the forward thrust that ends in the lunge.
pub const STAGE_THREE: &[MeleeWaypoint] = &[
    wp(0.0, 0.0, 0.0, -70.0, 0.2, false, false),
    wp(0.0, 0.0, 0.0, 0.0, 0.0, false, false),
    wp(0.0, 0.0, 1.0, 0.0, 0.1, true, true),
    wp(0.0, 0.0, 1.0, 0.0, 0.0, true, true),
    wp(0.0, 0.0, 1.0, 0.0, 0.0, true, true),
    wp(0.0, 0.0, 1.0, 0.0, 0.5, false, false),
];

/// Number of combo stages.
pub const STAGE_COUNT: usize = 3;

/// The stage whose contact step triggers the lunge.
pub const LUNGE_STAGE: usize = 2;
/// The step within [`LUNGE_STAGE`] whose completion triggers the lunge.
pub const LUNGE_STEP: usize = 2;

/// Returns a stage's waypoint table.
pub fn stage_table(stage: usize) -> &'static [MeleeWaypoint] {
    match stage {
        0 => STAGE_ONE,
        1 => STAGE_TWO,
        _ => STAGE_THREE,
    }
}

// ---------------------------------------------------------------------------
// StepPlan
// ---------------------------------------------------------------------------

/// One scheduled step of the combo: interpolate the knife from the previous
/// waypoint to the next over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPlan {
    /// Stage index.
    pub stage: usize,
    /// Target waypoint index within the stage.
    pub step: usize,
    /// Pose at the start of the step.
    pub from: MeleeWaypoint,
    /// Pose at the end of the step.
    pub to: MeleeWaypoint,
    /// Seconds the step takes.
    pub duration: f32,
    /// Whether contact during this step deals damage.
    pub damage: bool,
    /// Whether a swing sound plays as the step starts.
    pub strike: bool,
    /// Whether completing this step triggers the lunge.
    pub lunge: bool,
}

impl StepPlan {
    /// Interpolated knife pose `(offset, yaw)` at progress `t` in `[0, 1]`.
    pub fn pose_at(&self, t: f32) -> (Vec3, f32) {
        let t = t.clamp(0.0, 1.0);
        (
            self.from.offset.lerp(self.to.offset, t),
            self.from.yaw + (self.to.yaw - self.from.yaw) * t,
        )
    }
}

// ---------------------------------------------------------------------------
// MeleeDriver
// ---------------------------------------------------------------------------

/// Walks one participant's combo through its stages.
///
/// The driver only sequences; timing comes from the scheduled transitions
/// the session starts for each [`StepPlan`].
#[derive(Debug, Default)]
pub struct MeleeDriver {
    stage: usize,
    step: usize,
    active: bool,
    /// Live damage window flag, gating melee hit requests.
    pub can_deal_damage: bool,
}

impl MeleeDriver {
    /// Creates an idle driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a combo is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts the combo at stage 1. Index 0 is the stage's rest pose,
    /// already reached, so the walk starts toward index 1.
    pub fn begin(&mut self) -> StepPlan {
        self.active = true;
        self.stage = 0;
        self.step = 1;
        self.plan()
    }

    /// Advances past a completed step. `chain` is whether an attack input
    /// landed within the grace window (sampled at the stage boundary only).
    /// Returns the next step, or `None` when the combo ends.
    pub fn advance(&mut self, chain: bool) -> Option<StepPlan> {
        if !self.active {
            return None;
        }
        let table = stage_table(self.stage);
        if self.step + 1 < table.len() {
            self.step += 1;
            return Some(self.plan());
        }
        // Last waypoint of the stage: chain or stop.
        if self.stage + 1 < STAGE_COUNT && chain {
            self.stage += 1;
            self.step = 1;
            return Some(self.plan());
        }
        self.cancel();
        None
    }

    /// Stops the combo (death, stun, disconnect). The damage window closes.
    pub fn cancel(&mut self) {
        self.active = false;
        self.can_deal_damage = false;
    }

    fn plan(&mut self) -> StepPlan {
        let table = stage_table(self.stage);
        let from = table[self.step - 1];
        let to = table[self.step];
        self.can_deal_damage = to.damage;
        StepPlan {
            stage: self.stage,
            step: self.step,
            from,
            to,
            duration: to.duration,
            damage: to.damage,
            strike: to.strike,
            lunge: self.stage == LUNGE_STAGE && self.step == LUNGE_STEP,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_stage(driver: &mut MeleeDriver, chain_at_boundary: bool) -> Vec<StepPlan> {
        let mut plans = Vec::new();
        let mut current = Some(driver.begin());
        while let Some(plan) = current {
            plans.push(plan);
            let at_boundary = plan.step + 1 == stage_table(plan.stage).len();
            current = driver.advance(at_boundary && chain_at_boundary);
            if at_boundary {
                break;
            }
        }
        plans
    }

    #[test]
    fn test_stage_one_walks_seven_steps_then_stops_without_chain() {
        let mut driver = MeleeDriver::new();
        let plans = walk_stage(&mut driver, false);

        // 8 waypoints, walk starts at index 1 → 7 steps.
        assert_eq!(plans.len(), 7);
        assert_eq!(plans[0].step, 1);
        assert!(!driver.is_active());
        assert!(!driver.can_deal_damage);
    }

    #[test]
    fn test_chain_advances_to_next_stage_from_index_one() {
        let mut driver = MeleeDriver::new();
        let mut plan = driver.begin();
        // Run stage 1 to its boundary.
        while plan.step + 1 < STAGE_ONE.len() {
            plan = driver.advance(false).unwrap();
        }
        let next = driver.advance(true).unwrap();
        assert_eq!(next.stage, 1);
        assert_eq!(next.step, 1);
        assert!(driver.is_active());
    }

    #[test]
    fn test_damage_window_follows_waypoint_flags() {
        let mut driver = MeleeDriver::new();
        // Step toward index 1 is the wind-up: no damage.
        driver.begin();
        assert!(!driver.can_deal_damage);
        // Step toward index 2 opens the slash window.
        let plan = driver.advance(false).unwrap();
        assert_eq!(plan.step, 2);
        assert!(driver.can_deal_damage);
        assert!(plan.damage);
    }

    #[test]
    fn test_lunge_marked_on_stage_three_contact_step() {
        let mut driver = MeleeDriver::new();
        let mut lunges = Vec::new();
        let mut current = Some(driver.begin());
        while let Some(plan) = current {
            if plan.lunge {
                lunges.push((plan.stage, plan.step));
            }
            let at_boundary = plan.step + 1 == stage_table(plan.stage).len();
            current = driver.advance(at_boundary);
        }
        assert_eq!(lunges, vec![(LUNGE_STAGE, LUNGE_STEP)]);
    }

    #[test]
    fn test_final_stage_never_chains() {
        let mut driver = MeleeDriver::new();
        let mut current = Some(driver.begin());
        let mut steps = 0;
        while let Some(plan) = current {
            steps += 1;
            let at_boundary = plan.step + 1 == stage_table(plan.stage).len();
            // Always request a chain; the combo must still end after stage 3.
            current = driver.advance(at_boundary);
            assert!(steps < 100, "combo must terminate");
        }
        assert!(!driver.is_active());
        // 7 + 11 + 5 steps across the three stages.
        assert_eq!(steps, 23);
    }

    #[test]
    fn test_pose_interpolation_is_linear() {
        let plan = StepPlan {
            stage: 0,
            step: 2,
            from: STAGE_ONE[1],
            to: STAGE_ONE[2],
            duration: STAGE_ONE[2].duration,
            damage: true,
            strike: true,
            lunge: false,
        };
        let (offset, yaw) = plan.pose_at(0.5);
        assert!((offset.x - (0.34 + 0.7) / 2.0).abs() < 1e-5);
        assert!((yaw - (20.0 + 45.0) / 2.0).abs() < 1e-4);
        let (end, end_yaw) = plan.pose_at(1.0);
        assert_eq!(end, STAGE_ONE[2].offset);
        assert_eq!(end_yaw, 45.0);
    }
}
