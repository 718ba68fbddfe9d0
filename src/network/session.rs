//! Session Protocol Engine
//!
//! The heart of the session layer. Consumes inbound relay events, mutates
//! the player registry, mirrors local actions out to the other peers and
//! drives the two timed end-of-session transitions.
//!
//! There is no authoritative simulation behind this protocol: each peer
//! applies its own player's actions first (zero-latency local echo), then
//! broadcasts them, and accepts what the other peers broadcast on trust.
//! Every handler is idempotent so duplicated traffic degrades to a no-op.
//!
//! The engine runs as a single-owner actor: one mailbox, drained one command
//! at a time, so no two handlers ever interleave and the registry needs no
//! locking. Timers are fire-and-forget tasks that post a command back into
//! the mailbox and fall harmlessly into nothing if the session is gone.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::core::vec3::Vec3;
use crate::game::player::PlayerId;
use crate::game::registry::PlayerRegistry;
use crate::network::protocol::{Attack, Damage, Event, Movement, PlayerRef};
use crate::presentation::PresentationSink;

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Players are still registering; everyone is gated off.
    Registration,
    /// Play is running.
    Active,
    /// Terminal. A winner was announced; waiting out the redirect delay.
    Over,
}

/// An action performed by the local player, fed in by the input layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalAction {
    /// Drive towards a world position.
    Move(Vec3),
    /// Aim the turret. Expected once per simulation tick; publishing is
    /// rate-limited internally.
    AimTurret(Vec3),
    /// Fire a shell with the given force along the given direction.
    Attack {
        /// Launch force.
        force: f32,
        /// Aim direction.
        dir: Vec3,
    },
    /// A locally resolved hit: this peer computed the outcome and reports
    /// the victim's resulting health.
    ReportDamage {
        /// Player whose shell landed.
        attacker: PlayerId,
        /// Player that was hit.
        victim: PlayerId,
        /// Resulting health of the victim, already damage-adjusted.
        new_health: i32,
    },
}

/// Everything the engine's mailbox can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// A decoded event from the relay.
    Inbound(Event),
    /// A local player action.
    Act(LocalAction),
    /// The game-over announcement delay elapsed.
    AnnounceGameOver,
    /// The post-game redirect delay elapsed.
    Redirect,
}

/// Handle for driving a spawned engine actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl SessionHandle {
    /// Feed a decoded relay event into the engine.
    pub fn inbound(&self, event: Event) {
        self.send(EngineCommand::Inbound(event));
    }

    /// Feed a local player action into the engine.
    pub fn act(&self, action: LocalAction) {
        self.send(EngineCommand::Act(action));
    }

    /// Post a raw command. Sending into a torn-down engine is a no-op.
    pub fn send(&self, command: EngineCommand) {
        if self.commands.send(command).is_err() {
            debug!("session engine gone, dropping command");
        }
    }
}

/// The session protocol engine. See the module docs for the big picture.
pub struct SessionEngine {
    config: SessionConfig,
    registry: PlayerRegistry,
    phase: SessionPhase,
    /// Events destined for the relay (the transport adapter drains this).
    outbound: mpsc::UnboundedSender<Event>,
    /// Weak sender half of our own mailbox; timers post back through it. A
    /// pending timer holds a strong clone, so it always fires, while an
    /// idle engine does not keep its own mailbox alive.
    mailbox: mpsc::WeakUnboundedSender<EngineCommand>,
    sink: Box<dyn PresentationSink>,
    /// Ticks since the last turret publish.
    rotation_ticks: u32,
    /// Last aim direction that actually went out, for duplicate suppression.
    last_published_aim: Option<Vec3>,
    /// The announcement timer fires at most once per session.
    announce_scheduled: bool,
    /// Winner derived at evaluation time, consumed when the timer fires.
    pending_winner: Option<PlayerId>,
    /// The redirect timer fires at most once per session.
    redirect_scheduled: bool,
}

impl SessionEngine {
    /// Create an engine.
    ///
    /// `outbound` is the channel the transport adapter publishes from;
    /// `mailbox` must be the sender half of the channel whose receiver is
    /// passed to [`run`](Self::run), so timers can reach the actor. The
    /// caller keeps ownership; the engine only holds a weak reference.
    pub fn new(
        config: SessionConfig,
        sink: Box<dyn PresentationSink>,
        outbound: mpsc::UnboundedSender<Event>,
        mailbox: &mpsc::UnboundedSender<EngineCommand>,
    ) -> Self {
        let registry = PlayerRegistry::new(&config);
        Self {
            config,
            registry,
            phase: SessionPhase::Registration,
            outbound,
            mailbox: mailbox.downgrade(),
            sink,
            rotation_ticks: 0,
            last_published_aim: None,
            announce_scheduled: false,
            pending_winner: None,
            redirect_scheduled: false,
        }
    }

    /// Spawn the engine as an actor task and return a handle to drive it.
    pub fn spawn(
        config: SessionConfig,
        sink: Box<dyn PresentationSink>,
        outbound: mpsc::UnboundedSender<Event>,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self::new(config, sink, outbound, &tx);
        tokio::spawn(engine.run(rx));
        SessionHandle { commands: tx }
    }

    /// Drain the mailbox until every sender is gone.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        debug!("session engine mailbox closed");
    }

    /// Apply one command completely before the next is accepted.
    pub fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Inbound(event) => self.on_event(event),
            EngineCommand::Act(action) => self.on_action(action),
            EngineCommand::AnnounceGameOver => self.announce_game_over(),
            EngineCommand::Redirect => self.redirect(),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Read access to the registry, mainly for embedders and tests.
    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// Whether the game-over announcement timer has been armed.
    pub fn is_announce_scheduled(&self) -> bool {
        self.announce_scheduled
    }

    // =========================================================================
    // REMOTE APPLICATION
    // =========================================================================

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Identity(info) => self.on_identity(info.id, &info.handle, info.spawn_point),
            Event::GameInfo(info) => {
                for player in info.players {
                    self.registry
                        .register_or_update(player.id, &player.handle, player.spawn_point, false);
                }
            }
            Event::AllPlayersReady => self.on_all_players_ready(),
            Event::PlayerMove(m) => self.apply_move(&m.id, m.vec()),
            Event::TurretRotate(m) => self.apply_turret(&m.id, m.vec()),
            Event::Attack(a) => self.apply_attack(&a.id, a.force, a.dir()),
            Event::Damage(d) => self.apply_damage(&d.attacker_id, &d.damaged_player_id, d.damage),
            Event::PlayerDefeated(r) => self.apply_defeat(&r.id),
            Event::GameOver(r) => self.apply_game_over(&r.id),
            Event::PlayerLeft(r) => self.on_player_left(&r.id),
            // Relay-bound only; a peer echoing it back is harmless.
            Event::PlayerReady(r) => debug!(id = %r.id, "ignoring playerready echo"),
        }
    }

    /// The relay told us who we are: create the local player and signal
    /// readiness.
    fn on_identity(&mut self, id: PlayerId, handle: &str, spawn_point: i32) {
        info!(%id, handle, "local player identity received");
        self.registry.register_or_update(id.clone(), handle, spawn_point, true);
        self.publish(Event::PlayerReady(PlayerRef { id }));
    }

    /// Everyone is in: drop the title screen and let the tanks move.
    fn on_all_players_ready(&mut self) {
        info!(players = self.registry.player_count(), "all players ready");
        self.sink.hide_title();
        self.registry.activate_all();
        self.sink.set_all_players_enabled(true);
        self.phase = SessionPhase::Active;
    }

    fn apply_move(&mut self, id: &PlayerId, target: Vec3) {
        let Some(player) = self.registry.get_mut(id) else {
            debug!(%id, "move for unregistered player");
            return;
        };
        player.set_move_target(target);
    }

    fn apply_turret(&mut self, id: &PlayerId, dir: Vec3) {
        let Some(player) = self.registry.get_mut(id) else {
            debug!(%id, "turret update for unregistered player");
            return;
        };
        player.set_turret_dir(dir);
    }

    fn apply_attack(&mut self, id: &PlayerId, force: f32, dir: Vec3) {
        let Some(player) = self.registry.get_mut(id) else {
            debug!(%id, "attack for unregistered player");
            return;
        };
        player.record_attack(force, dir);
    }

    /// Clamp the victim to the reported health. A lethal result feeds the
    /// defeat path, which in turn broadcasts `playerDefeated` from every
    /// peer that observed it; the defeat transition is idempotent precisely
    /// so that duplicate traffic collapses to one effect.
    fn apply_damage(&mut self, attacker: &PlayerId, victim: &PlayerId, new_health: i32) {
        let Some(player) = self.registry.get_mut(victim) else {
            debug!(%victim, "damage for unregistered player");
            return;
        };

        match player.apply_damage(new_health) {
            Some(0) => {
                debug!(%attacker, %victim, "lethal hit");
                self.notify_defeated(victim.clone());
            }
            Some(health) => debug!(%attacker, %victim, health, "hit applied"),
            None => {}
        }
    }

    fn apply_defeat(&mut self, id: &PlayerId) {
        let transitioned = self.registry.mark_defeated(id);
        self.after_defeat(id, transitioned);
    }

    /// Disconnects route through the defeat path; the entry stays in the
    /// registry so the game-over count is unaffected by how a player left.
    fn on_player_left(&mut self, id: &PlayerId) {
        let transitioned = self.registry.unregister(id);
        self.after_defeat(id, transitioned);
    }

    /// Only the local peer's own defeat triggers the game-over evaluation;
    /// remote peers wait for the authoritative broadcast instead of racing
    /// to declare a winner themselves.
    fn after_defeat(&mut self, id: &PlayerId, transitioned: bool) {
        if transitioned && self.registry.is_local(id) {
            self.check_for_game_over();
        }
    }

    // =========================================================================
    // LOCAL-AUTHORITY EMISSION
    // =========================================================================

    /// Apply a local action to our own state first, then broadcast it.
    /// Actions with no registered (or an already gated-off) subject are
    /// dropped without a broadcast.
    fn on_action(&mut self, action: LocalAction) {
        // Damage names the victim rather than the local player, so it
        // carries its own gate below.
        if let LocalAction::ReportDamage { attacker, victim, new_health } = action {
            if self.registry.get(&victim).map_or(true, |p| p.is_disabled()) {
                debug!(%victim, "dropping damage report for inactive player");
                return;
            }
            self.apply_damage(&attacker, &victim, new_health);
            self.publish(Event::Damage(Damage {
                attacker_id: attacker,
                damaged_player_id: victim,
                damage: new_health,
            }));
            return;
        }

        let Some(id) = self.registry.local_id().cloned() else {
            debug!("local action before identity, dropping");
            return;
        };
        if self.registry.get(&id).map_or(true, |p| p.is_disabled()) {
            debug!(%id, "local player gated off, dropping action");
            return;
        }

        match action {
            LocalAction::Move(target) => {
                self.apply_move(&id, target);
                self.publish(Event::PlayerMove(Movement::new(id, target)));
            }
            LocalAction::AimTurret(dir) => {
                self.apply_turret(&id, dir);
                self.publish_aim(id, dir);
            }
            LocalAction::Attack { force, dir } => {
                self.apply_attack(&id, force, dir);
                self.publish(Event::Attack(Attack::new(id, dir, force)));
            }
            LocalAction::ReportDamage { .. } => unreachable!("handled above"),
        }
    }

    /// Rate-limited turret publishing: at most once every
    /// `turret_notify_interval` aim ticks, and only when the direction
    /// actually changed since the last publish. Local state already updated
    /// every tick, so responsiveness is unaffected.
    fn publish_aim(&mut self, id: PlayerId, dir: Vec3) {
        self.rotation_ticks += 1;
        if self.rotation_ticks < self.config.turret_notify_interval {
            return;
        }
        self.rotation_ticks = 0;

        if self.last_published_aim == Some(dir) {
            return;
        }
        self.last_published_aim = Some(dir);
        self.publish(Event::TurretRotate(Movement::new(id, dir)));
    }

    /// Defeat a player locally and tell the other peers. Invoked whenever
    /// this peer observes a health bar hit zero.
    fn notify_defeated(&mut self, id: PlayerId) {
        self.apply_defeat(&id);
        self.publish(Event::PlayerDefeated(PlayerRef { id }));
    }

    // =========================================================================
    // GAME-OVER CONSENSUS
    // =========================================================================

    /// With only one player (at most) still standing, derive the winner and
    /// arm the announcement timer. Runs automatically on the local defeat
    /// transition; safe to call any number of times.
    pub fn check_for_game_over(&mut self) {
        if !self.registry.is_game_over() {
            return;
        }
        if self.announce_scheduled {
            debug!("game-over announcement already scheduled");
            return;
        }
        let Some(winner) = self.registry.winner() else {
            warn!("game over with no local player, nothing to announce");
            return;
        };

        info!(%winner, "session decided, scheduling announcement");
        self.announce_scheduled = true;
        self.pending_winner = Some(winner);
        self.schedule(self.config.game_over_delay, EngineCommand::AnnounceGameOver);
    }

    /// The announcement delay elapsed: broadcast the winner and apply the
    /// terminal state to ourselves without waiting for the relay echo.
    fn announce_game_over(&mut self) {
        let Some(winner) = self.pending_winner.take() else {
            return;
        };
        self.publish(Event::GameOver(PlayerRef { id: winner.clone() }));
        self.apply_game_over(&winner);
    }

    /// Enter the terminal state. Re-applying on a duplicate broadcast is
    /// harmless, but the redirect timer is armed only once.
    fn apply_game_over(&mut self, winner: &PlayerId) {
        info!(%winner, "game over");
        self.phase = SessionPhase::Over;
        self.registry.suspend_all();
        self.sink.set_all_players_enabled(false);

        if self.registry.is_local(winner) {
            self.sink.show_victory();
        } else {
            self.sink.show_defeat();
        }

        if !self.redirect_scheduled {
            self.redirect_scheduled = true;
            self.schedule(self.config.redirect_delay, EngineCommand::Redirect);
        }
    }

    /// The redirect delay elapsed: hand control back to the lobby.
    fn redirect(&mut self) {
        self.sink.leave_session();
    }

    // =========================================================================
    // PLUMBING
    // =========================================================================

    fn publish(&self, event: Event) {
        if self.outbound.send(event).is_err() {
            debug!("transport closed, dropping outbound event");
        }
    }

    /// Fire-and-forget timer. Once started it always fires; a fire into a
    /// torn-down session is swallowed by the closed mailbox.
    fn schedule(&self, delay: Duration, command: EngineCommand) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            debug!("session torn down, timer not scheduled");
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = mailbox.send(command);
        });
    }
}
