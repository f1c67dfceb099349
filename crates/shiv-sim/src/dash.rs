//! Dash request validation.
//!
//! The authority runs every gate even though the request originated
//! client-side; a client UI may pre-emptively start its cooldown icon, but
//! this check is the source of truth. A rejected dash is simply dropped;
//! there is no NACK.

use crate::flags::ActionFlags;

/// Reasons a dash request is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DashRejection {
    /// Participant is dead; respawn has not completed.
    #[error("dead")]
    Dead,
    /// Stun suppresses dash initiation.
    #[error("stunned")]
    Stunned,
    /// A melee combo is in progress.
    #[error("melee active")]
    MeleeActive,
    /// The previous dash window is still open.
    #[error("already dashing")]
    AlreadyDashing,
    /// Participant is airborne.
    #[error("not grounded")]
    NotGrounded,
    /// The dash cooldown gate is closed.
    #[error("cooling down")]
    CoolingDown,
}

/// Validates a normal dash request against the participant's current state.
///
/// The melee lunge bypasses this entirely; it is granted by the combo
/// itself, cooldown gate included.
pub fn validate_dash(
    flags: &ActionFlags,
    dead: bool,
    using_melee: bool,
    grounded: bool,
    can_dash: bool,
) -> Result<(), DashRejection> {
    if dead {
        return Err(DashRejection::Dead);
    }
    if flags.stunned {
        return Err(DashRejection::Stunned);
    }
    if using_melee {
        return Err(DashRejection::MeleeActive);
    }
    if flags.dashing {
        return Err(DashRejection::AlreadyDashing);
    }
    if !grounded {
        return Err(DashRejection::NotGrounded);
    }
    if !can_dash {
        return Err(DashRejection::CoolingDown);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_state_passes() {
        let flags = ActionFlags::default();
        assert!(validate_dash(&flags, false, false, true, true).is_ok());
    }

    #[test]
    fn test_each_gate_rejects() {
        let idle = ActionFlags::default();
        assert_eq!(
            validate_dash(&idle, true, false, true, true),
            Err(DashRejection::Dead)
        );
        assert_eq!(
            validate_dash(
                &ActionFlags {
                    stunned: true,
                    ..Default::default()
                },
                false,
                false,
                true,
                true
            ),
            Err(DashRejection::Stunned)
        );
        assert_eq!(
            validate_dash(&idle, false, true, true, true),
            Err(DashRejection::MeleeActive)
        );
        assert_eq!(
            validate_dash(
                &ActionFlags {
                    dashing: true,
                    ..Default::default()
                },
                false,
                false,
                true,
                true
            ),
            Err(DashRejection::AlreadyDashing)
        );
        assert_eq!(
            validate_dash(&idle, false, false, false, true),
            Err(DashRejection::NotGrounded)
        );
        assert_eq!(
            validate_dash(&idle, false, false, true, false),
            Err(DashRejection::CoolingDown)
        );
    }
}
