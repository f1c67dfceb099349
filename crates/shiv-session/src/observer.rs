//! The participant-local view of the session.
//!
//! An observer never decides anything: it mirrors replicated state from the
//! authority's broadcasts, renders derived views (scoreboard text, chat,
//! cooldown icon fills), plays sounds through the [`SfxSink`] hook, and
//! turns local input and contact events into sequenced request envelopes.
//! Pre-emptive cooldown icons are a UI convenience only; the authoritative
//! gates live on the other side, and a rejected request simply never echoes
//! back as a state change.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;

use shiv_config::CombatConfig;
use shiv_replication::{EntryChange, ParticipantId};
use shiv_rpc::{
    ClientRequest, MessageError, PlayerFlag, ProjectileId, RequestEnvelope, ServerBroadcast,
    ServerPayload, SoundCategory, TargetedCall, deserialize_payload,
};
use shiv_score::{ScoreEntry, ranking_text, sorted_ranking};
use shiv_sim::{
    CollisionQuery, ContactDecision, SfxSink, ViewpointQuery, aim_point, projectile_contact,
};
use shiv_timing::{Transition, TransitionScheduler};

// ---------------------------------------------------------------------------
// Mirrored state
// ---------------------------------------------------------------------------

/// One participant as this observer sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPlayer {
    /// Body color.
    pub color: [f32; 3],
    /// Last known position.
    pub position: Vec3,
    /// Replicated life-cycle flag.
    pub dead: bool,
    /// Replicated immunity flag.
    pub invulnerable: bool,
    /// Replicated dash gate.
    pub can_dash: bool,
    /// Replicated throw gate.
    pub can_throw: bool,
    /// Replicated melee flag.
    pub using_melee: bool,
    /// Latest combo step, for knife animation.
    pub melee_step: Option<(u8, u8)>,
    /// Who hit this participant last (local cosmetic state).
    pub last_hit_by: Option<ParticipantId>,
}

impl Default for ObservedPlayer {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            position: Vec3::ZERO,
            dead: false,
            invulnerable: false,
            can_dash: true,
            can_throw: true,
            using_melee: false,
            melee_step: None,
            last_hit_by: None,
        }
    }
}

/// Cooldown/status icons the presentation layer reads fill values for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSlot {
    /// Dash cooldown (fills 0 → 1).
    Dash,
    /// Knife-throw cooldown (fills 0 → 1).
    Throw,
    /// Respawn wait (drains 1 → 0).
    Respawn,
    /// Stun remainder (drains 1 → 0).
    Stun,
}

// ---------------------------------------------------------------------------
// ObserverSession
// ---------------------------------------------------------------------------

/// The local session a connected participant runs.
pub struct ObserverSession {
    local_id: ParticipantId,
    combat: CombatConfig,
    next_seq: u64,
    players: HashMap<ParticipantId, ObservedPlayer>,
    projectile_owners: HashMap<ProjectileId, ParticipantId>,
    scoreboard: HashMap<ParticipantId, ScoreEntry>,
    leader: Option<ParticipantId>,
    chat: Vec<String>,
    outbox: Vec<RequestEnvelope>,
    icons: TransitionScheduler<IconSlot>,
    icon_fill: Rc<RefCell<HashMap<IconSlot, f32>>>,
    sfx: Box<dyn SfxSink>,
}

impl ObserverSession {
    /// Creates the local view for `local_id`.
    pub fn new(local_id: ParticipantId, combat: CombatConfig, sfx: Box<dyn SfxSink>) -> Self {
        Self {
            local_id,
            combat,
            next_seq: 0,
            players: HashMap::new(),
            projectile_owners: HashMap::new(),
            scoreboard: HashMap::new(),
            leader: None,
            chat: Vec::new(),
            outbox: Vec::new(),
            icons: TransitionScheduler::new(),
            icon_fill: Rc::new(RefCell::new(HashMap::new())),
            sfx,
        }
    }

    /// Advances local icon transitions.
    pub fn tick(&mut self, dt: Duration) {
        self.icons.tick(dt);
    }

    /// Takes the queued request envelopes for the transport, in order.
    pub fn drain_outbox(&mut self) -> Vec<RequestEnvelope> {
        std::mem::take(&mut self.outbox)
    }

    // -- input intents ------------------------------------------------------

    /// Attack input: starts or chains the melee combo authority-side.
    pub fn request_attack(&mut self) {
        self.enqueue(ClientRequest::Attack);
    }

    /// Dash input. Starts the cooldown icon pre-emptively; the authority
    /// remains the source of truth.
    pub fn request_dash(&mut self) {
        self.start_icon(
            IconSlot::Dash,
            Duration::from_secs_f32(self.combat.dash_cooldown.max(0.0)),
            false,
        );
        self.enqueue(ClientRequest::Dash);
    }

    /// Knife-throw input: resolves the aim point from the viewpoint ray
    /// (first obstruction, or max range) and sends it along.
    pub fn request_throw(&mut self, view: &dyn ViewpointQuery, collision: &dyn CollisionQuery) {
        let aim = aim_point(view, collision, self.combat.aim_max_distance);
        self.start_icon(
            IconSlot::Throw,
            Duration::from_secs_f32(self.combat.knife_cooldown.max(0.0)),
            false,
        );
        self.enqueue(ClientRequest::ThrowKnife {
            aim: aim.to_array(),
        });
    }

    /// Chat submission (or name registration, server-decided).
    pub fn send_chat(&mut self, text: &str) {
        self.enqueue(ClientRequest::Chat {
            text: text.to_string(),
        });
    }

    /// Reports the local participant's position.
    pub fn sync_position(&mut self, position: Vec3) {
        if let Some(me) = self.players.get_mut(&self.local_id) {
            me.position = position;
        }
        self.enqueue(ClientRequest::PositionSync {
            position: position.to_array(),
        });
    }

    // -- contact reports ----------------------------------------------------

    /// The local physics layer saw a projectile touch a participant. Only
    /// the projectile's owner forwards, and never against themselves.
    pub fn report_projectile_contact(&mut self, projectile: ProjectileId, target: ParticipantId) {
        let Some(&owner) = self.projectile_owners.get(&projectile) else {
            return;
        };
        if projectile_contact(owner, target, self.local_id) == ContactDecision::Forward {
            self.enqueue(ClientRequest::ProjectileHit { projectile, target });
        }
    }

    /// The local physics layer saw two projectiles touch.
    pub fn report_projectile_clash(&mut self, projectile: ProjectileId, other: ProjectileId) {
        let owner = self.projectile_owners.get(&projectile).copied();
        let other_owner = self.projectile_owners.get(&other).copied();
        if owner == Some(self.local_id) && other_owner.is_some() && other_owner != owner {
            self.enqueue(ClientRequest::ProjectileClash { projectile, other });
        }
    }

    /// The local physics layer saw our melee knife touch a participant.
    /// The authority applies the damage-window gate.
    pub fn report_melee_contact(&mut self, target: ParticipantId) {
        let melee_active = self
            .players
            .get(&self.local_id)
            .is_some_and(|me| me.using_melee);
        if melee_active && target != self.local_id {
            self.enqueue(ClientRequest::MeleeHit { target });
        }
    }

    // -- state application --------------------------------------------------

    /// Decodes and applies one payload from the wire.
    pub fn apply_wire(&mut self, data: &[u8]) -> Result<(), MessageError> {
        let payload = deserialize_payload(data)?;
        self.apply(payload);
        Ok(())
    }

    /// Applies one payload from the authority.
    pub fn apply(&mut self, payload: ServerPayload) {
        match payload {
            ServerPayload::Broadcast(broadcast) => self.apply_broadcast(broadcast),
            ServerPayload::Targeted(call) => self.apply_targeted(call),
        }
    }

    fn apply_broadcast(&mut self, broadcast: ServerBroadcast) {
        match broadcast {
            ServerBroadcast::ParticipantJoined { id, color } => {
                self.players.insert(
                    id,
                    ObservedPlayer {
                        color,
                        ..Default::default()
                    },
                );
            }
            ServerBroadcast::ParticipantLeft { id } => {
                self.players.remove(&id);
            }
            ServerBroadcast::PlayerFlagChanged { id, flag, value } => {
                self.apply_flag(id, flag, value);
            }
            ServerBroadcast::PlayerColorChanged { id, color } => {
                if let Some(p) = self.players.get_mut(&id) {
                    p.color = color;
                }
            }
            ServerBroadcast::Teleported { id, position } => {
                if let Some(p) = self.players.get_mut(&id) {
                    p.position = Vec3::from(position);
                }
            }
            ServerBroadcast::DashGranted { .. } => {
                // Velocity override is the presentation layer's business;
                // the icon was already started pre-emptively on request.
            }
            ServerBroadcast::StunApplied { id, duration } => {
                if id == self.local_id {
                    self.start_icon(
                        IconSlot::Stun,
                        Duration::from_secs_f32(duration.max(0.0)),
                        true,
                    );
                }
            }
            ServerBroadcast::MeleeStep { id, stage, step } => {
                if let Some(p) = self.players.get_mut(&id) {
                    p.melee_step = Some((stage, step));
                }
            }
            ServerBroadcast::ProjectileSpawned { id, owner, .. } => {
                self.projectile_owners.insert(id, owner);
            }
            ServerBroadcast::ProjectileDestroyed { id } => {
                self.projectile_owners.remove(&id);
            }
            ServerBroadcast::ScoreChanged { id, change, entry } => match change {
                EntryChange::Removed => {
                    self.scoreboard.remove(&id);
                }
                EntryChange::Added | EntryChange::Updated => {
                    if let Some(entry) = entry {
                        self.scoreboard.insert(id, entry.into());
                    }
                }
            },
            ServerBroadcast::LeaderChanged { leader } => {
                self.leader = leader;
            }
            ServerBroadcast::ChatLine { line } => {
                self.chat.push(line);
            }
            ServerBroadcast::Sound {
                at,
                category,
                variant,
            } => {
                self.sfx.play(category, variant, at);
            }
        }
    }

    fn apply_flag(&mut self, id: ParticipantId, flag: PlayerFlag, value: bool) {
        if let Some(p) = self.players.get_mut(&id) {
            match flag {
                PlayerFlag::Dead => p.dead = value,
                PlayerFlag::Invulnerable => p.invulnerable = value,
                PlayerFlag::CanDash => p.can_dash = value,
                PlayerFlag::CanThrow => p.can_throw = value,
                PlayerFlag::UsingMelee => {
                    p.using_melee = value;
                    if !value {
                        p.melee_step = None;
                    }
                }
            }
        }
        // Our own death: start the respawn drain and ask for the scream.
        if id == self.local_id && flag == PlayerFlag::Dead && value {
            self.start_icon(
                IconSlot::Respawn,
                Duration::from_secs_f32(self.combat.respawn_duration.max(0.0)),
                true,
            );
            self.enqueue(ClientRequest::Sound {
                category: SoundCategory::Death,
                variant: None,
            });
        }
    }

    fn apply_targeted(&mut self, call: TargetedCall) {
        match call {
            TargetedCall::HitNotify { attacker, lethal } => {
                if let Some(me) = self.players.get_mut(&self.local_id) {
                    me.last_hit_by = Some(attacker);
                }
                if !lethal {
                    self.enqueue(ClientRequest::Sound {
                        category: SoundCategory::Stun,
                        variant: None,
                    });
                }
            }
            TargetedCall::Welcome {
                your_id,
                players,
                scoreboard,
                leader,
                chat,
            } => {
                if your_id != self.local_id {
                    tracing::warn!(%your_id, local = %self.local_id, "welcome for someone else");
                }
                for snapshot in players {
                    self.players.insert(
                        snapshot.id,
                        ObservedPlayer {
                            color: snapshot.color,
                            position: Vec3::from(snapshot.position),
                            dead: snapshot.dead,
                            invulnerable: snapshot.invulnerable,
                            using_melee: snapshot.using_melee,
                            ..Default::default()
                        },
                    );
                }
                self.scoreboard = scoreboard
                    .into_iter()
                    .map(|(id, entry)| (id, entry.into()))
                    .collect();
                self.leader = leader;
                self.chat = chat;
            }
        }
    }

    // -- presentation reads -------------------------------------------------

    /// This observer's participant id.
    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    /// A mirrored participant.
    pub fn player(&self, id: ParticipantId) -> Option<&ObservedPlayer> {
        self.players.get(&id)
    }

    /// Number of mirrored participants.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Current normalized fill of a cooldown/status icon.
    pub fn icon_progress(&self, slot: IconSlot) -> Option<f32> {
        self.icon_fill.borrow().get(&slot).copied()
    }

    /// The scoreboard surface: ranked `"Name | K n | D m"` lines.
    pub fn scoreboard_text(&self) -> String {
        ranking_text(&sorted_ranking(self.scoreboard.iter()))
    }

    /// The current leader designation.
    pub fn leader(&self) -> Option<ParticipantId> {
        self.leader
    }

    /// Chat lines in log order.
    pub fn chat_lines(&self) -> &[String] {
        &self.chat
    }

    // -- internals ----------------------------------------------------------

    fn enqueue(&mut self, request: ClientRequest) {
        self.next_seq += 1;
        self.outbox.push(RequestEnvelope {
            seq: self.next_seq,
            request,
        });
    }

    fn start_icon(&mut self, slot: IconSlot, duration: Duration, draining: bool) {
        let fill = Rc::clone(&self.icon_fill);
        let transition = Transition::new(duration);
        let transition = if draining {
            transition.inverted()
        } else {
            transition
        };
        let transition = transition.on_progress(move |t| {
            fill.borrow_mut().insert(slot, t);
        });
        if let Err(err) = self.icons.start(slot, transition) {
            tracing::error!(?slot, %err, "icon transition rejected");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
