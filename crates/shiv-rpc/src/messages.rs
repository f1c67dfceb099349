//! Wire message kinds and serialization.
//!
//! Every remote call is one variant of a closed enum with strongly-typed
//! payload fields. Sender identity is metadata attached by the channel,
//! never a payload field a client could forge. Messages are serialized with
//! [`postcard`] behind a protocol version byte.

use serde::{Deserialize, Serialize};
use shiv_replication::{EntryChange, ParticipantId};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a projectile, allocated by the authority. Carried
/// on the wire instead of any owning reference; the owner is resolved
/// through the authority's participant table at use time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectileId(pub u64);

/// A participant flag replicated from the authority (or owner) to everyone.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerFlag {
    /// Life-cycle: dead until the respawn transition completes.
    Dead,
    /// Damage immunity window.
    Invulnerable,
    /// Dash cooldown gate.
    CanDash,
    /// Knife-throw cooldown gate.
    CanThrow,
    /// Melee combo in progress.
    UsingMelee,
}

/// Named sound-effect category, resolved to a concrete variant by the
/// authority so every observer hears the same clip.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCategory {
    /// Death scream. Variant 1 is the rare one.
    Death,
    /// Dash whoosh.
    Dash,
    /// Respawn-warp chime.
    Teleport,
    /// Melee swing.
    Attack,
    /// Stun impact.
    Stun,
}

impl SoundCategory {
    /// Number of clip variants available for this category.
    pub const fn variant_count(self) -> u8 {
        match self {
            SoundCategory::Death => 2,
            _ => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientRequest (participant → authority)
// ---------------------------------------------------------------------------

/// A participant's request to the authority. All gate validation happens
/// authority-side; a rejected request is simply dropped and the client
/// infers rejection from the absence of the expected state change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// Attack input: starts or chains the melee combo.
    Attack,
    /// Dash input, gated by the dash cooldown and movement state.
    Dash,
    /// Throw a knife burst toward an aim point the client resolved from its
    /// viewpoint ray.
    ThrowKnife {
        /// World-space aim point.
        aim: [f32; 3],
    },
    /// The sender's projectile contacted another participant.
    ProjectileHit {
        /// The contacting projectile. Must be owned by the sender.
        projectile: ProjectileId,
        /// The contacted participant.
        target: ParticipantId,
    },
    /// The sender's projectile contacted another owner's projectile.
    ProjectileClash {
        /// The contacting projectile. Must be owned by the sender.
        projectile: ProjectileId,
        /// The other projectile, destroyed unless permanent.
        other: ProjectileId,
    },
    /// The sender's melee knife contacted a participant. Only honored while
    /// the sender's combo is inside a damage-bearing waypoint.
    MeleeHit {
        /// The contacted participant.
        target: ParticipantId,
    },
    /// Chat submission. The first message from an unnamed participant
    /// registers their display name instead of appending a line.
    Chat {
        /// Raw text as typed.
        text: String,
    },
    /// Ask the authority to play a sound on the sender for everyone.
    Sound {
        /// Effect category.
        category: SoundCategory,
        /// Pinned variant; `None` lets the authority pick one at random.
        variant: Option<u8>,
    },
    /// Owner-reported position, used for spawn origins, grounded checks and
    /// out-of-bounds handling.
    PositionSync {
        /// World-space position.
        position: [f32; 3],
    },
    /// Debug self-kill.
    Suicide,
}

/// A sequenced request as sent by a participant. The channel tracks `seq`
/// per sender to restore order and drop retransmitted duplicates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// Monotonic per-sender sequence number, starting at 1.
    pub seq: u64,
    /// The call itself.
    pub request: ClientRequest,
}

// ---------------------------------------------------------------------------
// ServerBroadcast (authority → everyone)
// ---------------------------------------------------------------------------

/// Scoreboard entry as replicated to observers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntryWire {
    /// Display name ("User{id}" until registered).
    pub name: String,
    /// Kill counter.
    pub kills: u32,
    /// Death counter.
    pub deaths: u32,
    /// Whether the display name has been registered.
    pub name_set: bool,
}

/// Snapshot of one participant for freshly-joined observers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    /// The participant.
    pub id: ParticipantId,
    /// Body color (RGB, 0..1).
    pub color: [f32; 3],
    /// Last reported position.
    pub position: [f32; 3],
    /// Current life-cycle flag.
    pub dead: bool,
    /// Current immunity flag.
    pub invulnerable: bool,
    /// Current melee flag.
    pub using_melee: bool,
}

/// State change fanned out by the authority to every connected participant,
/// including the authority's own local view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerBroadcast {
    /// A participant joined the session.
    ParticipantJoined {
        /// The new participant.
        id: ParticipantId,
        /// Their assigned body color.
        color: [f32; 3],
    },
    /// A participant left the session.
    ParticipantLeft {
        /// The departed participant.
        id: ParticipantId,
    },
    /// A replicated boolean flag changed.
    PlayerFlagChanged {
        /// The affected participant.
        id: ParticipantId,
        /// Which flag.
        flag: PlayerFlag,
        /// New value.
        value: bool,
    },
    /// A participant's body color changed (rerolled on death).
    PlayerColorChanged {
        /// The affected participant.
        id: ParticipantId,
        /// New color.
        color: [f32; 3],
    },
    /// The authority moved a participant (respawn warp, bounds recovery).
    Teleported {
        /// The affected participant.
        id: ParticipantId,
        /// Destination.
        position: [f32; 3],
    },
    /// A dash was granted; observers run the velocity transition locally.
    DashGranted {
        /// The dashing participant.
        id: ParticipantId,
        /// `true` for the melee lunge, which bypassed the cooldown gate.
        lunge: bool,
    },
    /// A stun landed. `duration` is the accumulated total for icon fills.
    StunApplied {
        /// The stunned participant.
        id: ParticipantId,
        /// Accumulated stun seconds from now.
        duration: f32,
    },
    /// The melee combo advanced to a waypoint step.
    MeleeStep {
        /// The attacking participant.
        id: ParticipantId,
        /// Stage index (0..3).
        stage: u8,
        /// Waypoint index within the stage.
        step: u8,
    },
    /// A knife was spawned.
    ProjectileSpawned {
        /// The new projectile.
        id: ProjectileId,
        /// The throwing participant.
        owner: ParticipantId,
        /// Spawn position.
        origin: [f32; 3],
        /// Normalized flight direction.
        direction: [f32; 3],
    },
    /// A knife was destroyed (hit something or expired).
    ProjectileDestroyed {
        /// The removed projectile.
        id: ProjectileId,
    },
    /// A scoreboard entry changed; observers recompute their ranking from
    /// their full mirrored state.
    ScoreChanged {
        /// The affected participant.
        id: ParticipantId,
        /// What happened to the entry.
        change: EntryChange,
        /// Entry snapshot (`None` for removals).
        entry: Option<ScoreEntryWire>,
    },
    /// The leader designation changed.
    LeaderChanged {
        /// New leader, or `None` when nobody has a kill.
        leader: Option<ParticipantId>,
    },
    /// A chat line was appended to the message log.
    ChatLine {
        /// The rendered line, name prefix included.
        line: String,
    },
    /// Play a sound effect positioned at a participant.
    Sound {
        /// The participant the sound follows.
        at: ParticipantId,
        /// Effect category.
        category: SoundCategory,
        /// Resolved clip variant.
        variant: u8,
    },
}

// ---------------------------------------------------------------------------
// TargetedCall (authority → one participant)
// ---------------------------------------------------------------------------

/// Call delivered to exactly one participant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum TargetedCall {
    /// You were hit. Drives the local cosmetic reaction; the authoritative
    /// consequences (death, stun) arrive through the normal broadcasts.
    HitNotify {
        /// Who hit you.
        attacker: ParticipantId,
        /// Whether the hit was lethal.
        lethal: bool,
    },
    /// Full session snapshot for a freshly-joined participant.
    Welcome {
        /// The recipient's own id.
        your_id: ParticipantId,
        /// Every connected participant.
        players: Vec<PlayerSnapshot>,
        /// Current scoreboard entries.
        scoreboard: Vec<(ParticipantId, ScoreEntryWire)>,
        /// Current leader designation.
        leader: Option<ParticipantId>,
        /// Chat backlog in log order.
        chat: Vec<String>,
    },
}

/// Anything the authority sends down to a participant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerPayload {
    /// Fan-out to everyone.
    Broadcast(ServerBroadcast),
    /// Directed at the receiving participant alone.
    Targeted(TargetedCall),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload — no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

fn to_versioned<T: Serialize>(value: &T) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(value)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn from_versioned<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T, MessageError> {
    if data.is_empty() {
        return Err(MessageError::EmptyPayload);
    }
    let version = data[0];
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(&data[1..])?)
}

/// Serialize a [`RequestEnvelope`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded envelope]`
pub fn serialize_request(envelope: &RequestEnvelope) -> Result<Vec<u8>, postcard::Error> {
    to_versioned(envelope)
}

/// Deserialize a versioned payload into a [`RequestEnvelope`].
pub fn deserialize_request(data: &[u8]) -> Result<RequestEnvelope, MessageError> {
    from_versioned(data)
}

/// Serialize a [`ServerPayload`] into a versioned binary payload.
pub fn serialize_payload(payload: &ServerPayload) -> Result<Vec<u8>, postcard::Error> {
    to_versioned(payload)
}

/// Deserialize a versioned payload into a [`ServerPayload`].
pub fn deserialize_payload(data: &[u8]) -> Result<ServerPayload, MessageError> {
    from_versioned(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_roundtrip() {
        let envelope = RequestEnvelope {
            seq: 17,
            request: ClientRequest::ThrowKnife {
                aim: [1.5, 0.0, -42.25],
            },
        };
        let bytes = serialize_request(&envelope).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(deserialize_request(&bytes).unwrap(), envelope);

        // Generic serde works too, not just postcard.
        let json = serde_json::to_string(&envelope).unwrap();
        let back: RequestEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_targeted_welcome_roundtrip() {
        let payload = ServerPayload::Targeted(TargetedCall::Welcome {
            your_id: ParticipantId(3),
            players: vec![PlayerSnapshot {
                id: ParticipantId(1),
                color: [0.2, 0.4, 0.6],
                position: [0.0, 0.5, 0.0],
                dead: false,
                invulnerable: true,
                using_melee: false,
            }],
            scoreboard: vec![(
                ParticipantId(1),
                ScoreEntryWire {
                    name: "Alice".into(),
                    kills: 2,
                    deaths: 1,
                    name_set: true,
                },
            )],
            leader: Some(ParticipantId(1)),
            chat: vec!["Alice: hello".into()],
        });
        let bytes = serialize_payload(&payload).unwrap();
        assert_eq!(deserialize_payload(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let envelope = RequestEnvelope {
            seq: 1,
            request: ClientRequest::Attack,
        };
        let mut bytes = serialize_request(&envelope).unwrap();
        bytes[0] = 255;
        assert!(matches!(
            deserialize_request(&bytes),
            Err(MessageError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_empty_and_corrupt_payloads_rejected() {
        assert!(matches!(
            deserialize_request(&[]),
            Err(MessageError::EmptyPayload)
        ));
        assert!(deserialize_request(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_sound_variant_counts() {
        assert_eq!(SoundCategory::Death.variant_count(), 2);
        assert_eq!(SoundCategory::Dash.variant_count(), 3);
        assert_eq!(SoundCategory::Attack.variant_count(), 3);
    }
}
