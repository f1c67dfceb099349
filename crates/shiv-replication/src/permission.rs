//! Write-permission policies for replicated state.
//!
//! Only two policies exist in this system: the authority writes and everyone
//! reads, or the owning participant writes and everyone reads. Reads are
//! never restricted.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParticipantId
// ---------------------------------------------------------------------------

/// Opaque stable identifier for a connected participant. Unique for the
/// lifetime of the participant's connection; a reconnect under the same id
/// restores archived state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub u64);

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The identity attempting a write: the authoritative node, or one
/// participant (as bound by the RPC channel, never self-declared).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// The single authoritative node.
    Authority,
    /// A connected participant.
    Participant(ParticipantId),
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// Who may originate a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScope {
    /// Only the authority mutates.
    AuthorityOnly,
    /// Only the named owning participant mutates.
    OwnerOnly(ParticipantId),
}

/// Who may observe the value. Always everyone in this system; kept as an
/// enum so the policy stays explicit at construction sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Every connected participant observes the value.
    Everyone,
}

// ---------------------------------------------------------------------------
// VarPermission
// ---------------------------------------------------------------------------

/// A write/read permission pair attached to every replicated container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarPermission {
    /// Write policy.
    pub write: WriteScope,
    /// Read policy.
    pub read: ReadScope,
}

impl VarPermission {
    /// Authority writes, everyone reads.
    pub fn authority_to_everyone() -> Self {
        Self {
            write: WriteScope::AuthorityOnly,
            read: ReadScope::Everyone,
        }
    }

    /// The owning participant writes, everyone reads.
    pub fn owner_to_everyone(owner: ParticipantId) -> Self {
        Self {
            write: WriteScope::OwnerOnly(owner),
            read: ReadScope::Everyone,
        }
    }

    /// Returns `true` if `principal` satisfies the write scope.
    pub fn allows_write(&self, principal: Principal) -> bool {
        match (self.write, principal) {
            (WriteScope::AuthorityOnly, Principal::Authority) => true,
            (WriteScope::OwnerOnly(owner), Principal::Participant(id)) => owner == id,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_scope_rejects_participants() {
        let perm = VarPermission::authority_to_everyone();
        assert!(perm.allows_write(Principal::Authority));
        assert!(!perm.allows_write(Principal::Participant(ParticipantId(1))));
    }

    #[test]
    fn test_owner_scope_rejects_authority_and_others() {
        let perm = VarPermission::owner_to_everyone(ParticipantId(7));
        assert!(perm.allows_write(Principal::Participant(ParticipantId(7))));
        assert!(!perm.allows_write(Principal::Participant(ParticipantId(8))));
        assert!(!perm.allows_write(Principal::Authority));
    }

    #[test]
    fn test_participant_id_display() {
        assert_eq!(ParticipantId(42).to_string(), "#42");
    }
}
