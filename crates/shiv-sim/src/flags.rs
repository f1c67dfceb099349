//! Authority-side action flags and their precedence rules.

/// Transient movement/combat state the authority tracks per participant,
/// alongside the replicated variables.
///
/// The axes are independent flags, not one exclusive state. Precedence:
/// death suppresses every input-driven transition until respawn completes;
/// stun suppresses movement, melee initiation and dash initiation but not a
/// dash already in flight; dashing overrides velocity computation only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    /// Movement input currently applied.
    pub moving: bool,
    /// Dash window currently open.
    pub dashing: bool,
    /// Stun debuff currently active.
    pub stunned: bool,
}

impl ActionFlags {
    /// Whether movement input may apply.
    pub fn may_move(&self, dead: bool) -> bool {
        !dead && !self.stunned
    }

    /// Whether an attack input may start or chain the melee combo.
    pub fn may_start_melee(&self, dead: bool) -> bool {
        !dead && !self.stunned && !self.dashing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_death_suppresses_everything() {
        let flags = ActionFlags::default();
        assert!(!flags.may_move(true));
        assert!(!flags.may_start_melee(true));
    }

    #[test]
    fn test_stun_blocks_movement_and_melee() {
        let flags = ActionFlags {
            stunned: true,
            ..Default::default()
        };
        assert!(!flags.may_move(false));
        assert!(!flags.may_start_melee(false));
    }

    #[test]
    fn test_dashing_blocks_melee_but_not_movement_request() {
        let flags = ActionFlags {
            dashing: true,
            ..Default::default()
        };
        assert!(flags.may_move(false));
        assert!(!flags.may_start_melee(false));
    }
}
