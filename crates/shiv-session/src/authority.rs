//! The authoritative session.
//!
//! One process owns every state-mutating decision: it validates each
//! participant request against the current replicated state, mutates
//! variables and collections as the single authority writer, and lets the
//! resulting change notifications drive replication broadcasts. Replicated
//! variable subscribers enqueue domain events into an internal queue the
//! session drains each tick, so notification stays synchronous and ordered
//! while follow-up mutation runs outside any active borrow.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;

use shiv_config::{ArenaConfig, CombatConfig, Config};
use shiv_replication::{MapEvent, ParticipantId, Principal, ReplicatedVar, VarPermission};
use shiv_rpc::{
    ClientRequest, PlayerFlag, PlayerSnapshot, ProjectileId, RequestEnvelope, RpcChannel,
    ServerBroadcast, SoundCategory, TargetedCall,
};
use shiv_score::{MessageLog, Scoreboard, submit_chat};
use shiv_sim::{
    ActionFlags, ArenaRng, CollisionQuery, HitOutcome, MeleeDriver, Projectile, ProjectileKind,
    StepPlan, clash_destroys_other, hsv_to_rgb, resolve_hit, validate_dash,
};
use shiv_timing::{Transition, TransitionScheduler};

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Logical transition slots. Starting a slot that is already active cancels
/// the running instance (a dash cannot be granted twice into the same
/// window, a fresh stun replaces and extends the old one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// Death-to-respawn window.
    Respawn(ParticipantId),
    /// Accumulating stun debuff.
    Stun(ParticipantId),
    /// Damage-immunity window (dash or post-respawn).
    Invulnerable(ParticipantId),
    /// Dash cooldown gate.
    DashCooldown(ParticipantId),
    /// The dash velocity-override window.
    DashWindow(ParticipantId),
    /// Knife-throw cooldown gate.
    ThrowCooldown(ParticipantId),
    /// Delay between knives of one burst.
    KnifeBurst(ParticipantId),
    /// One step of the melee combo.
    MeleeStep(ParticipantId),
}

// ---------------------------------------------------------------------------
// Internal events
// ---------------------------------------------------------------------------

/// Work enqueued by replicated-state subscribers and transition edges,
/// applied when the session drains its queue.
#[derive(Debug, Clone)]
enum SessionEvent {
    Flag {
        id: ParticipantId,
        flag: PlayerFlag,
        value: bool,
    },
    Color {
        id: ParticipantId,
        color: [f32; 3],
    },
    DashWindow {
        id: ParticipantId,
        active: bool,
    },
    StunWindow {
        id: ParticipantId,
        active: bool,
    },
    MeleeStepEnded {
        id: ParticipantId,
    },
    KnifeBurstTick {
        id: ParticipantId,
    },
    Score(MapEvent<ParticipantId>),
    ChatLine {
        index: usize,
    },
}

type EventQueue = Rc<RefCell<VecDeque<SessionEvent>>>;
type SharedFlag = Rc<RefCell<ReplicatedVar<bool>>>;
type SharedColor = Rc<RefCell<ReplicatedVar<[f32; 3]>>>;

fn flag_subscriber(
    events: EventQueue,
    id: ParticipantId,
    flag: PlayerFlag,
) -> impl FnMut(&bool, &bool) {
    move |old, new| {
        if old != new {
            events
                .borrow_mut()
                .push_back(SessionEvent::Flag { id, flag, value: *new });
        }
    }
}

/// A transition that writes a boolean variable on both edges: the initial
/// value immediately, its negation on completion.
fn flag_transition(var: SharedFlag, duration: Duration, initial: bool) -> Transition {
    let start_var = Rc::clone(&var);
    Transition::new(duration)
        .starting_at(initial)
        .on_start(move |value| {
            let _ = start_var.borrow_mut().write(value, Principal::Authority);
        })
        .on_end(move |value| {
            let _ = var.borrow_mut().write(value, Principal::Authority);
        })
}

// ---------------------------------------------------------------------------
// Participant state
// ---------------------------------------------------------------------------

/// The replicated variables of one participant.
struct PlayerVars {
    dead: SharedFlag,
    invulnerable: SharedFlag,
    can_dash: SharedFlag,
    can_throw: SharedFlag,
    using_melee: SharedFlag,
    body_color: SharedColor,
}

/// A pending knife burst.
struct BurstState {
    remaining: u32,
    origin: Vec3,
    target: Vec3,
}

/// Everything the authority tracks for one connected participant.
struct ParticipantState {
    vars: PlayerVars,
    flags: ActionFlags,
    melee: MeleeDriver,
    melee_plan: Option<StepPlan>,
    burst: Option<BurstState>,
    last_attacker: Option<ParticipantId>,
    last_attack_time: f64,
    position: Vec3,
}

impl ParticipantState {
    fn dead(&self) -> bool {
        *self.vars.dead.borrow().value()
    }

    fn invulnerable(&self) -> bool {
        *self.vars.invulnerable.borrow().value()
    }

    fn using_melee(&self) -> bool {
        *self.vars.using_melee.borrow().value()
    }

    fn snapshot(&self, id: ParticipantId) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            color: *self.vars.body_color.borrow().value(),
            position: self.position.to_array(),
            dead: self.dead(),
            invulnerable: self.invulnerable(),
            using_melee: self.using_melee(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthoritySession
// ---------------------------------------------------------------------------

/// The single authoritative node of a session.
///
/// The participant table is mutated only here; observers never write. All
/// request validation happens in this type even though requests originate
/// client-side, and every rejection is silent: no error crosses the
/// network, nothing here is fatal to the process.
pub struct AuthoritySession {
    combat: CombatConfig,
    arena: ArenaConfig,
    allow_suicide: bool,
    clock: f64,
    participants: HashMap<ParticipantId, ParticipantState>,
    projectiles: HashMap<ProjectileId, Projectile>,
    next_projectile: u64,
    scheduler: TransitionScheduler<SlotKey>,
    events: EventQueue,
    scoreboard: Scoreboard,
    log: MessageLog,
    channel: RpcChannel,
    collision: Box<dyn CollisionQuery>,
    rng: Box<dyn ArenaRng>,
}

impl AuthoritySession {
    /// Creates a session from config plus the external collaborators.
    pub fn new(config: &Config, collision: Box<dyn CollisionQuery>, rng: Box<dyn ArenaRng>) -> Self {
        let events: EventQueue = Rc::new(RefCell::new(VecDeque::new()));

        let mut scoreboard = Scoreboard::new();
        let score_events = Rc::clone(&events);
        scoreboard.subscribe_changes(move |event| {
            score_events
                .borrow_mut()
                .push_back(SessionEvent::Score(event.clone()));
        });

        let mut log = MessageLog::new();
        let log_events = Rc::clone(&events);
        log.subscribe(move |event| {
            log_events
                .borrow_mut()
                .push_back(SessionEvent::ChatLine { index: event.index });
        });

        Self {
            combat: config.combat.clone(),
            arena: config.arena.clone(),
            allow_suicide: config.debug.allow_suicide,
            clock: 0.0,
            participants: HashMap::new(),
            projectiles: HashMap::new(),
            next_projectile: 1,
            scheduler: TransitionScheduler::new(),
            events,
            scoreboard,
            log,
            channel: RpcChannel::new(),
            collision,
            rng,
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Seats a freshly connected participant: replicated variables, a fresh
    /// body color, a spawn position, the scoreboard entry (restored from the
    /// archive on reconnect), and the Welcome snapshot.
    pub fn connect(&mut self, id: ParticipantId) {
        if self.participants.contains_key(&id) {
            tracing::warn!(%id, "connect ignored: already seated");
            return;
        }

        let color = hsv_to_rgb(self.rng.hue(), 1.0, 1.0);
        let vars = self.build_vars(id, color);
        let position = self.pick_spawn_point();
        self.participants.insert(
            id,
            ParticipantState {
                vars,
                flags: ActionFlags::default(),
                melee: MeleeDriver::new(),
                melee_plan: None,
                burst: None,
                last_attacker: None,
                last_attack_time: f64::NEG_INFINITY,
                position,
            },
        );

        self.scoreboard.on_connect(id);
        self.channel
            .broadcast(ServerBroadcast::ParticipantJoined { id, color });
        self.channel.broadcast(ServerBroadcast::Teleported {
            id,
            position: position.to_array(),
        });
        self.channel.send_to(id, self.welcome_snapshot(id));
        tracing::info!(%id, "participant joined");
    }

    /// Unseats a participant. Their statistics move to the scoreboard
    /// archive; their projectiles keep flying with a dangling owner id,
    /// which every lookup treats as a handled case.
    pub fn disconnect(&mut self, id: ParticipantId) {
        if self.participants.remove(&id).is_none() {
            tracing::warn!(%id, "disconnect ignored: not seated");
            return;
        }
        for slot in [
            SlotKey::Respawn(id),
            SlotKey::Stun(id),
            SlotKey::Invulnerable(id),
            SlotKey::DashCooldown(id),
            SlotKey::DashWindow(id),
            SlotKey::ThrowCooldown(id),
            SlotKey::KnifeBurst(id),
            SlotKey::MeleeStep(id),
        ] {
            self.scheduler.cancel(&slot);
        }
        self.scoreboard.on_disconnect(id);
        self.channel.forget_sender(id);
        self.channel
            .broadcast(ServerBroadcast::ParticipantLeft { id });
        tracing::info!(%id, "participant left");
    }

    // -- inbound ------------------------------------------------------------

    /// Accepts a sequenced request envelope from a participant. Processed
    /// in per-sender order on the next [`tick`](Self::tick).
    pub fn submit(&mut self, sender: ParticipantId, envelope: RequestEnvelope) {
        self.channel.submit(sender, envelope);
    }

    /// Accepts raw request bytes from the transport.
    pub fn submit_wire(
        &mut self,
        sender: ParticipantId,
        data: &[u8],
    ) -> Result<(), shiv_rpc::MessageError> {
        self.channel.submit_wire(sender, data)
    }

    // -- tick ---------------------------------------------------------------

    /// One simulation step: drain requests in order, advance transitions
    /// and projectiles, then apply the queued follow-up events.
    pub fn tick(&mut self, dt: Duration) {
        self.clock += dt.as_secs_f64();

        while let Some(inbound) = self.channel.next_request() {
            self.dispatch(inbound.sender, inbound.request);
        }

        self.scheduler.tick(dt);
        self.advance_projectiles(dt.as_secs_f32());
        self.drain_events();
    }

    /// Takes everything queued for the transport.
    pub fn drain_outbound(&mut self) -> Vec<shiv_rpc::OutboundMessage> {
        self.channel.drain_outbound()
    }

    // -- reads (presentation / tests) ---------------------------------------

    /// Elapsed session time in seconds.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Number of seated participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Number of live projectiles.
    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// A participant's transient action flags.
    pub fn action_flags(&self, id: ParticipantId) -> Option<ActionFlags> {
        self.participants.get(&id).map(|p| p.flags)
    }

    /// A participant's replicated flag value.
    pub fn flag(&self, id: ParticipantId, flag: PlayerFlag) -> Option<bool> {
        let p = self.participants.get(&id)?;
        let value = match flag {
            PlayerFlag::Dead => *p.vars.dead.borrow().value(),
            PlayerFlag::Invulnerable => *p.vars.invulnerable.borrow().value(),
            PlayerFlag::CanDash => *p.vars.can_dash.borrow().value(),
            PlayerFlag::CanThrow => *p.vars.can_throw.borrow().value(),
            PlayerFlag::UsingMelee => *p.vars.using_melee.borrow().value(),
        };
        Some(value)
    }

    /// A participant's last reported position.
    pub fn position(&self, id: ParticipantId) -> Option<Vec3> {
        self.participants.get(&id).map(|p| p.position)
    }

    /// The authoritative scoreboard.
    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// The authoritative chat log.
    pub fn message_log(&self) -> &MessageLog {
        &self.log
    }

    /// Normalized remaining-cooldown progress for a slot, for UI fills.
    pub fn cooldown_progress(&self, slot: SlotKey) -> Option<f32> {
        self.scheduler.progress(&slot)
    }

    /// Whether a participant's combo is currently inside a damage-bearing
    /// waypoint (the gate melee hit reports must pass).
    pub fn melee_damage_live(&self, id: ParticipantId) -> Option<bool> {
        self.participants.get(&id).map(|p| p.melee.can_deal_damage)
    }

    // -- dispatch -----------------------------------------------------------

    fn dispatch(&mut self, sender: ParticipantId, request: ClientRequest) {
        if !self.participants.contains_key(&sender) {
            tracing::debug!(%sender, "request from unseated sender dropped");
            return;
        }
        match request {
            ClientRequest::Attack => self.on_attack(sender),
            ClientRequest::Dash => self.on_dash_request(sender),
            ClientRequest::ThrowKnife { aim } => self.on_throw(sender, Vec3::from(aim)),
            ClientRequest::ProjectileHit { projectile, target } => {
                self.on_projectile_hit(sender, projectile, target)
            }
            ClientRequest::ProjectileClash { projectile, other } => {
                self.on_projectile_clash(sender, projectile, other)
            }
            ClientRequest::MeleeHit { target } => self.on_melee_hit(sender, target),
            ClientRequest::Chat { text } => self.on_chat(sender, &text),
            ClientRequest::Sound { category, variant } => self.on_sound(sender, category, variant),
            ClientRequest::PositionSync { position } => {
                self.on_position(sender, Vec3::from(position))
            }
            ClientRequest::Suicide => self.on_suicide(sender),
        }
    }

    fn on_attack(&mut self, sender: ParticipantId) {
        let clock = self.clock;
        let Some(p) = self.participants.get_mut(&sender) else {
            return;
        };
        let dead = *p.vars.dead.borrow().value();
        if !p.flags.may_start_melee(dead) {
            tracing::debug!(%sender, "attack dropped by precedence gates");
            return;
        }
        p.last_attack_time = clock;
        if !*p.vars.using_melee.borrow().value() {
            // Owner-permission variable, applied on the owner's behalf. The
            // resulting change event starts the combo.
            let _ = p
                .vars
                .using_melee
                .borrow_mut()
                .write(true, Principal::Participant(sender));
        }
    }

    fn on_dash_request(&mut self, sender: ParticipantId) {
        let Some(p) = self.participants.get(&sender) else {
            return;
        };
        let grounded = self.collision.is_grounded(p.position);
        let verdict = validate_dash(
            &p.flags,
            p.dead(),
            p.using_melee(),
            grounded,
            *p.vars.can_dash.borrow().value(),
        );
        if let Err(reason) = verdict {
            tracing::debug!(%sender, %reason, "dash rejected");
            return;
        }
        self.grant_dash(sender, false);
    }

    fn grant_dash(&mut self, id: ParticipantId, lunge: bool) {
        let Some(p) = self.participants.get(&id) else {
            return;
        };
        let can_dash = Rc::clone(&p.vars.can_dash);
        let invulnerable = Rc::clone(&p.vars.invulnerable);

        if !lunge {
            self.start_slot(
                SlotKey::DashCooldown(id),
                flag_transition(
                    can_dash,
                    Duration::from_secs_f32(self.combat.dash_cooldown.max(0.0)),
                    false,
                ),
            );
        }
        self.start_slot(
            SlotKey::Invulnerable(id),
            flag_transition(
                invulnerable,
                Duration::from_secs_f32(self.combat.dash_invulnerable_time.max(0.0)),
                true,
            ),
        );

        let events = Rc::clone(&self.events);
        let end_events = Rc::clone(&self.events);
        self.start_slot(
            SlotKey::DashWindow(id),
            Transition::new(Duration::from_secs_f32(self.combat.dash_length.max(0.0)))
                .starting_at(true)
                .on_start(move |active| {
                    events
                        .borrow_mut()
                        .push_back(SessionEvent::DashWindow { id, active });
                })
                .on_end(move |active| {
                    end_events
                        .borrow_mut()
                        .push_back(SessionEvent::DashWindow { id, active });
                }),
        );

        self.channel
            .broadcast(ServerBroadcast::DashGranted { id, lunge });
        self.broadcast_sound(id, SoundCategory::Dash, None);
    }

    fn on_throw(&mut self, sender: ParticipantId, aim: Vec3) {
        let Some(p) = self.participants.get_mut(&sender) else {
            return;
        };
        let dead = *p.vars.dead.borrow().value();
        if dead || p.flags.stunned || *p.vars.using_melee.borrow().value() {
            tracing::debug!(%sender, "throw dropped by precedence gates");
            return;
        }
        if !*p.vars.can_throw.borrow().value() {
            tracing::debug!(%sender, "throw rejected: cooling down");
            return;
        }

        p.burst = Some(BurstState {
            remaining: self.combat.knife_count,
            origin: p.position,
            target: aim,
        });
        let can_throw = Rc::clone(&p.vars.can_throw);

        // The next cooldown window starts immediately.
        self.start_slot(
            SlotKey::ThrowCooldown(sender),
            flag_transition(
                can_throw,
                Duration::from_secs_f32(self.combat.knife_cooldown.max(0.0)),
                false,
            ),
        );
        self.spawn_burst_knife(sender);
    }

    fn spawn_burst_knife(&mut self, id: ParticipantId) {
        let spread = self.combat.knife_spread;
        let perturbation = self.rng.unit_perturbation(spread);
        let Some(p) = self.participants.get_mut(&id) else {
            return;
        };
        let Some(burst) = p.burst.as_mut() else {
            return;
        };

        let direction = ((burst.target - burst.origin).normalize_or_zero() + perturbation)
            .normalize_or_zero();
        let origin = burst.origin;
        burst.remaining = burst.remaining.saturating_sub(1);
        let more = burst.remaining > 0;
        if !more {
            p.burst = None;
        }

        let projectile_id = ProjectileId(self.next_projectile);
        self.next_projectile += 1;
        self.projectiles
            .insert(projectile_id, Projectile::thrown(projectile_id, id, origin, direction));
        self.channel.broadcast(ServerBroadcast::ProjectileSpawned {
            id: projectile_id,
            owner: id,
            origin: origin.to_array(),
            direction: direction.to_array(),
        });

        if more {
            let events = Rc::clone(&self.events);
            self.start_slot(
                SlotKey::KnifeBurst(id),
                Transition::new(Duration::from_secs_f32(self.combat.knife_burst_time.max(0.0)))
                    .on_end(move |_| {
                        events
                            .borrow_mut()
                            .push_back(SessionEvent::KnifeBurstTick { id });
                    }),
            );
        }
    }

    fn on_projectile_hit(
        &mut self,
        sender: ParticipantId,
        projectile: ProjectileId,
        target: ParticipantId,
    ) {
        let Some(proj) = self.projectiles.get(&projectile) else {
            tracing::debug!(%sender, ?projectile, "hit for unknown projectile dropped");
            return;
        };
        if proj.spent {
            return;
        }
        let (owner, kind) = (proj.owner, proj.kind);
        if owner != sender {
            // Security boundary: only the projectile's owner may report its
            // hits. Fail closed.
            tracing::warn!(%sender, %owner, ?projectile, "hit report from non-owner dropped");
            return;
        }
        if owner == target {
            return;
        }
        let Some(victim) = self.participants.get_mut(&target) else {
            tracing::debug!(%target, "hit for departed participant dropped");
            return;
        };

        // Last contact wins, lethal or not.
        victim.last_attacker = Some(owner);
        let outcome = resolve_hit(kind, victim.invulnerable(), victim.dead());

        self.channel.send_to(
            target,
            TargetedCall::HitNotify {
                attacker: owner,
                lethal: outcome == HitOutcome::Lethal,
            },
        );
        match outcome {
            HitOutcome::Lethal => self.kill(target),
            HitOutcome::Stun => self.apply_stun(target),
            HitOutcome::Shrugged => {}
        }
        if kind == ProjectileKind::Thrown {
            self.destroy_projectile(projectile);
        }
    }

    fn on_projectile_clash(
        &mut self,
        sender: ParticipantId,
        projectile: ProjectileId,
        other: ProjectileId,
    ) {
        let Some(proj) = self.projectiles.get(&projectile) else {
            return;
        };
        if proj.owner != sender {
            tracing::warn!(%sender, ?projectile, "clash report from non-owner dropped");
            return;
        }
        let owner = proj.owner;
        let Some(other_proj) = self.projectiles.get(&other) else {
            return;
        };
        if clash_destroys_other(owner, other_proj.owner, other_proj.kind) {
            self.destroy_projectile(other);
        }
    }

    fn on_melee_hit(&mut self, sender: ParticipantId, target: ParticipantId) {
        let Some(attacker) = self.participants.get(&sender) else {
            return;
        };
        if !attacker.using_melee() || !attacker.melee.can_deal_damage {
            tracing::debug!(%sender, "melee hit outside damage window dropped");
            return;
        }
        if sender == target {
            return;
        }
        let Some(victim) = self.participants.get_mut(&target) else {
            tracing::debug!(%target, "melee hit for departed participant dropped");
            return;
        };

        victim.last_attacker = Some(sender);
        let outcome = resolve_hit(
            ProjectileKind::Permanent,
            victim.invulnerable(),
            victim.dead(),
        );
        self.channel.send_to(
            target,
            TargetedCall::HitNotify {
                attacker: sender,
                lethal: false,
            },
        );
        if outcome == HitOutcome::Stun {
            self.apply_stun(target);
        }
    }

    fn on_chat(&mut self, sender: ParticipantId, text: &str) {
        // Appends and name registrations replicate through the collection
        // change events; nothing to do with the outcome here.
        let _ = submit_chat(&mut self.log, &mut self.scoreboard, sender, text);
    }

    fn on_sound(&mut self, sender: ParticipantId, category: SoundCategory, variant: Option<u8>) {
        self.broadcast_sound(sender, category, variant);
    }

    fn on_position(&mut self, sender: ParticipantId, position: Vec3) {
        let out_of_bounds = position.length() > self.arena.out_of_bounds_radius;
        if let Some(p) = self.participants.get_mut(&sender) {
            p.position = position;
        }
        if out_of_bounds {
            self.teleport_to_spawn(sender);
        }
    }

    fn on_suicide(&mut self, sender: ParticipantId) {
        if !self.allow_suicide {
            tracing::debug!(%sender, "suicide request dropped: disabled");
            return;
        }
        let Some(p) = self.participants.get(&sender) else {
            return;
        };
        if p.dead() {
            return;
        }
        self.kill(sender);
    }

    // -- combat helpers -----------------------------------------------------

    /// Starts the respawn transition: `dead` flips true instantly and back
    /// to false once the window elapses.
    fn kill(&mut self, id: ParticipantId) {
        let Some(p) = self.participants.get(&id) else {
            return;
        };
        let dead = Rc::clone(&p.vars.dead);
        self.start_slot(
            SlotKey::Respawn(id),
            flag_transition(
                dead,
                Duration::from_secs_f32(self.combat.respawn_duration.max(0.0)),
                true,
            ),
        );
    }

    /// Applies the accumulating stun: remaining time plus one fresh stun
    /// duration, rescheduled into the same slot.
    fn apply_stun(&mut self, id: ParticipantId) {
        let remaining = self
            .scheduler
            .remaining(&SlotKey::Stun(id))
            .unwrap_or(Duration::ZERO);
        let total = remaining + Duration::from_secs_f32(self.combat.stun_duration.max(0.0));

        if let Some(p) = self.participants.get_mut(&id) {
            p.flags.moving = false;
            if *p.vars.using_melee.borrow().value() {
                let _ = p
                    .vars
                    .using_melee
                    .borrow_mut()
                    .write(false, Principal::Participant(id));
            }
        }

        let events = Rc::clone(&self.events);
        let end_events = Rc::clone(&self.events);
        self.start_slot(
            SlotKey::Stun(id),
            Transition::new(total)
                .starting_at(true)
                .on_start(move |active| {
                    events
                        .borrow_mut()
                        .push_back(SessionEvent::StunWindow { id, active });
                })
                .on_end(move |active| {
                    end_events
                        .borrow_mut()
                        .push_back(SessionEvent::StunWindow { id, active });
                }),
        );
        self.channel.broadcast(ServerBroadcast::StunApplied {
            id,
            duration: total.as_secs_f32(),
        });
    }

    /// Marks a projectile used up and announces its destruction. The entry
    /// itself is swept at the next projectile advance, so duplicate hit
    /// reports landing in the same batch find the spent flag and drop.
    fn destroy_projectile(&mut self, id: ProjectileId) {
        let newly_spent = match self.projectiles.get_mut(&id) {
            Some(proj) if !proj.spent => {
                proj.spent = true;
                true
            }
            _ => false,
        };
        if newly_spent {
            self.channel
                .broadcast(ServerBroadcast::ProjectileDestroyed { id });
        }
    }

    fn advance_projectiles(&mut self, dt: f32) {
        let speed = self.combat.knife_speed;
        let lifetime = self.combat.knife_lifetime;
        let mut swept = Vec::new();
        let mut expired = Vec::new();
        for (id, proj) in self.projectiles.iter_mut() {
            if proj.spent {
                swept.push(*id);
                continue;
            }
            proj.advance(dt, speed);
            if proj.expired(lifetime) {
                proj.spent = true;
                swept.push(*id);
                expired.push(*id);
            }
        }
        for id in expired {
            self.channel
                .broadcast(ServerBroadcast::ProjectileDestroyed { id });
        }
        for id in swept {
            self.projectiles.remove(&id);
        }
    }

    // -- event drain --------------------------------------------------------

    fn drain_events(&mut self) {
        loop {
            let event = self.events.borrow_mut().pop_front();
            let Some(event) = event else { break };
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Flag { id, flag, value } => {
                self.channel
                    .broadcast(ServerBroadcast::PlayerFlagChanged { id, flag, value });
                match (flag, value) {
                    (PlayerFlag::Dead, true) => self.on_death(id),
                    (PlayerFlag::Dead, false) => self.on_respawn(id),
                    (PlayerFlag::UsingMelee, true) => self.begin_melee(id),
                    (PlayerFlag::UsingMelee, false) => self.end_melee(id),
                    _ => {}
                }
            }
            SessionEvent::Color { id, color } => {
                self.channel
                    .broadcast(ServerBroadcast::PlayerColorChanged { id, color });
            }
            SessionEvent::DashWindow { id, active } => {
                if let Some(p) = self.participants.get_mut(&id) {
                    p.flags.dashing = active;
                }
            }
            SessionEvent::StunWindow { id, active } => {
                if let Some(p) = self.participants.get_mut(&id) {
                    p.flags.stunned = active;
                }
            }
            SessionEvent::MeleeStepEnded { id } => self.on_melee_step_ended(id),
            SessionEvent::KnifeBurstTick { id } => self.spawn_burst_knife(id),
            SessionEvent::Score(event) => {
                let entry = self.scoreboard.entry(event.key).map(Into::into);
                self.channel.broadcast(ServerBroadcast::ScoreChanged {
                    id: event.key,
                    change: event.change,
                    entry,
                });
                if let Some(leader) = self.scoreboard.recompute_leader() {
                    self.channel
                        .broadcast(ServerBroadcast::LeaderChanged { leader });
                }
            }
            SessionEvent::ChatLine { index } => {
                if let Some(line) = self.log.get(index) {
                    self.channel.broadcast(ServerBroadcast::ChatLine {
                        line: line.to_string(),
                    });
                }
            }
        }
    }

    fn on_death(&mut self, id: ParticipantId) {
        self.scoreboard.add_death(id);
        let attacker = self
            .participants
            .get_mut(&id)
            .and_then(|p| p.last_attacker.take());
        if let Some(attacker) = attacker {
            // Attribution consumed: a later unrelated death must not credit
            // this attacker again.
            self.scoreboard.add_kill(attacker);
        }

        let color = hsv_to_rgb(self.rng.hue(), 1.0, 1.0);
        if let Some(p) = self.participants.get_mut(&id) {
            p.flags.moving = false;
            p.melee.cancel();
            let _ = p.vars.body_color.borrow_mut().write(color, Principal::Authority);
            if *p.vars.using_melee.borrow().value() {
                let _ = p
                    .vars
                    .using_melee
                    .borrow_mut()
                    .write(false, Principal::Participant(id));
            }
        }
    }

    fn on_respawn(&mut self, id: ParticipantId) {
        let Some(p) = self.participants.get(&id) else {
            return;
        };
        let invulnerable = Rc::clone(&p.vars.invulnerable);
        self.start_slot(
            SlotKey::Invulnerable(id),
            flag_transition(
                invulnerable,
                Duration::from_secs_f32(self.combat.invulnerable_time.max(0.0)),
                true,
            ),
        );
        self.teleport_to_spawn(id);
        self.broadcast_sound(id, SoundCategory::Teleport, None);
    }

    fn begin_melee(&mut self, id: ParticipantId) {
        let Some(p) = self.participants.get_mut(&id) else {
            return;
        };
        let plan = p.melee.begin();
        self.start_melee_step(id, plan);
    }

    fn end_melee(&mut self, id: ParticipantId) {
        if let Some(p) = self.participants.get_mut(&id) {
            p.melee.cancel();
            p.melee_plan = None;
        }
        self.scheduler.cancel(&SlotKey::MeleeStep(id));
    }

    fn start_melee_step(&mut self, id: ParticipantId, plan: StepPlan) {
        if plan.strike {
            self.broadcast_sound(id, SoundCategory::Attack, None);
        }
        self.channel.broadcast(ServerBroadcast::MeleeStep {
            id,
            stage: plan.stage as u8,
            step: plan.step as u8,
        });
        if let Some(p) = self.participants.get_mut(&id) {
            p.melee_plan = Some(plan);
        }
        let events = Rc::clone(&self.events);
        self.start_slot(
            SlotKey::MeleeStep(id),
            Transition::new(Duration::from_secs_f32(plan.duration.max(0.0))).on_end(move |_| {
                events
                    .borrow_mut()
                    .push_back(SessionEvent::MeleeStepEnded { id });
            }),
        );
    }

    fn on_melee_step_ended(&mut self, id: ParticipantId) {
        let clock = self.clock;
        let grace = self.combat.melee_grace as f64;
        let Some(p) = self.participants.get_mut(&id) else {
            return;
        };
        let finished_plan = p.melee_plan.take();
        let chain = clock - p.last_attack_time < grace;
        let next = p.melee.advance(chain);

        if let Some(plan) = finished_plan
            && plan.lunge
        {
            // The combo's contact step ends in a short forward dash with its
            // own invulnerability; the normal dash cooldown is untouched.
            self.grant_dash(id, true);
        }

        match next {
            Some(plan) => self.start_melee_step(id, plan),
            None => {
                if let Some(p) = self.participants.get_mut(&id) {
                    let active = *p.vars.using_melee.borrow().value();
                    if active {
                        let _ = p
                            .vars
                            .using_melee
                            .borrow_mut()
                            .write(false, Principal::Participant(id));
                    }
                }
            }
        }
    }

    // -- misc helpers -------------------------------------------------------

    fn build_vars(&self, id: ParticipantId, color: [f32; 3]) -> PlayerVars {
        let authority = VarPermission::authority_to_everyone();
        let owner = VarPermission::owner_to_everyone(id);

        let make_flag = |initial: bool, perm: VarPermission, flag: PlayerFlag| {
            let var = Rc::new(RefCell::new(ReplicatedVar::new(initial, perm)));
            var.borrow_mut()
                .subscribe(flag_subscriber(Rc::clone(&self.events), id, flag));
            var
        };

        let body_color = Rc::new(RefCell::new(ReplicatedVar::new(color, authority)));
        let color_events = Rc::clone(&self.events);
        body_color.borrow_mut().subscribe(move |_, new: &[f32; 3]| {
            color_events
                .borrow_mut()
                .push_back(SessionEvent::Color { id, color: *new });
        });

        PlayerVars {
            dead: make_flag(false, authority, PlayerFlag::Dead),
            invulnerable: make_flag(false, authority, PlayerFlag::Invulnerable),
            can_dash: make_flag(true, authority, PlayerFlag::CanDash),
            can_throw: make_flag(true, authority, PlayerFlag::CanThrow),
            using_melee: make_flag(false, owner, PlayerFlag::UsingMelee),
            body_color,
        }
    }

    fn welcome_snapshot(&self, id: ParticipantId) -> TargetedCall {
        TargetedCall::Welcome {
            your_id: id,
            players: self
                .participants
                .iter()
                .map(|(pid, p)| p.snapshot(*pid))
                .collect(),
            scoreboard: self
                .scoreboard
                .entries()
                .map(|(pid, entry)| (*pid, entry.into()))
                .collect(),
            leader: self.scoreboard.leader(),
            chat: self.log.backlog(),
        }
    }

    fn pick_spawn_point(&mut self) -> Vec3 {
        if self.arena.spawn_points.is_empty() {
            return Vec3::ZERO;
        }
        let index = self.rng.index(self.arena.spawn_points.len());
        Vec3::from(self.arena.spawn_points[index])
    }

    fn teleport_to_spawn(&mut self, id: ParticipantId) {
        let position = self.pick_spawn_point();
        if let Some(p) = self.participants.get_mut(&id) {
            p.position = position;
        }
        self.channel.broadcast(ServerBroadcast::Teleported {
            id,
            position: position.to_array(),
        });
    }

    fn broadcast_sound(&mut self, at: ParticipantId, category: SoundCategory, variant: Option<u8>) {
        let count = category.variant_count();
        let variant = match variant {
            Some(v) if v < count => v,
            _ => self.rng.index(count as usize) as u8,
        };
        self.channel.broadcast(ServerBroadcast::Sound {
            at,
            category,
            variant,
        });
    }

    fn start_slot(&mut self, slot: SlotKey, transition: Transition) {
        if let Err(err) = self.scheduler.start(slot, transition) {
            tracing::error!(?slot, %err, "transition rejected");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "authority_tests.rs"]
mod tests;
