//! Pure combat decisions.
//!
//! Contact events come from the external physics layer on whichever node
//! holds local authority over the projectile (its owner). These functions
//! make every decision the session then applies; they are deliberately free
//! of state so the rules stay independently testable.

use shiv_replication::ParticipantId;

use crate::projectile::ProjectileKind;

// ---------------------------------------------------------------------------
// Contact (observer side)
// ---------------------------------------------------------------------------

/// What the owner's node does with a projectile-vs-participant contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactDecision {
    /// Self-contact, or not the reporting node's projectile: nothing.
    Ignore,
    /// Forward a hit request to the authority naming the projectile.
    Forward,
}

/// Decides whether a contact becomes a hit request. No self-damage; only
/// the projectile's local-authority holder reports.
pub fn projectile_contact(
    owner: ParticipantId,
    contacted: ParticipantId,
    reporter: ParticipantId,
) -> ContactDecision {
    if owner == contacted || owner != reporter {
        ContactDecision::Ignore
    } else {
        ContactDecision::Forward
    }
}

// ---------------------------------------------------------------------------
// Hit resolution (authority side)
// ---------------------------------------------------------------------------

/// The authoritative consequence of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Thrown knife on a live, unprotected victim: schedule the respawn.
    Lethal,
    /// Non-lethal contact on a live, unprotected victim: accumulate stun.
    Stun,
    /// Victim invulnerable or already dead: attribution only.
    Shrugged,
}

/// Resolves a hit's consequence from the projectile kind and the victim's
/// protection flags. Attribution is recorded by the caller regardless of
/// the outcome (last contact wins).
pub fn resolve_hit(kind: ProjectileKind, invulnerable: bool, dead: bool) -> HitOutcome {
    if invulnerable || dead {
        HitOutcome::Shrugged
    } else if kind == ProjectileKind::Thrown {
        HitOutcome::Lethal
    } else {
        HitOutcome::Stun
    }
}

// ---------------------------------------------------------------------------
// Projectile-vs-projectile
// ---------------------------------------------------------------------------

/// Whether a projectile clash destroys the other projectile: different
/// owners, and the other is not permanent.
pub fn clash_destroys_other(
    owner: ParticipantId,
    other_owner: ParticipantId,
    other_kind: ProjectileKind,
) -> bool {
    owner != other_owner && other_kind != ProjectileKind::Permanent
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);
    const C: ParticipantId = ParticipantId(3);

    #[test]
    fn test_own_projectile_never_produces_a_hit_request() {
        assert_eq!(projectile_contact(A, A, A), ContactDecision::Ignore);
    }

    #[test]
    fn test_only_the_owner_reports() {
        assert_eq!(projectile_contact(A, B, A), ContactDecision::Forward);
        // Another node seeing the same contact stays silent.
        assert_eq!(projectile_contact(A, B, C), ContactDecision::Ignore);
    }

    #[test]
    fn test_thrown_is_lethal_only_against_live_unprotected_victims() {
        assert_eq!(
            resolve_hit(ProjectileKind::Thrown, false, false),
            HitOutcome::Lethal
        );
        assert_eq!(
            resolve_hit(ProjectileKind::Thrown, true, false),
            HitOutcome::Shrugged
        );
        assert_eq!(
            resolve_hit(ProjectileKind::Thrown, false, true),
            HitOutcome::Shrugged
        );
    }

    #[test]
    fn test_permanent_contact_stuns() {
        assert_eq!(
            resolve_hit(ProjectileKind::Permanent, false, false),
            HitOutcome::Stun
        );
        assert_eq!(
            resolve_hit(ProjectileKind::Permanent, true, false),
            HitOutcome::Shrugged
        );
    }

    #[test]
    fn test_clash_spares_same_owner_and_permanents() {
        assert!(clash_destroys_other(A, B, ProjectileKind::Thrown));
        assert!(!clash_destroys_other(A, A, ProjectileKind::Thrown));
        assert!(!clash_destroys_other(A, B, ProjectileKind::Permanent));
    }
}
