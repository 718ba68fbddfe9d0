//! Player State
//!
//! Identity plus replicated combat state for one tank. A `Player` is pure
//! data driven by the session engine; rendering, pathfinding execution and
//! collision live outside the session layer and only observe these fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SpawnPoint;
use crate::core::vec3::Vec3;

/// Unique player identifier, assigned by the relay server.
///
/// Implements `Ord` so registry iteration order is stable, which the
/// winner scan depends on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Create from any string-like id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Combat lifecycle of a player.
///
/// `Pending` until the all-players-ready broadcast, `Active` during play,
/// `Defeated` is terminal. There is no transition out of `Defeated`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatState {
    /// Registered but the session has not started yet.
    #[default]
    Pending,
    /// Taking part in the session.
    Active,
    /// Out of the session for good.
    Defeated,
}

/// One tank in the session: identity, visual slot, combat state and the
/// replicated action bookkeeping (movement target, turret aim, shot count).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Relay-assigned identifier, immutable once set.
    pub id: PlayerId,

    /// Display name shown above the tank. May be corrected by a
    /// re-registration.
    pub display_name: String,

    /// Current health, always within `[0, max_health]`.
    health: i32,

    /// Health ceiling, constant for the session.
    pub max_health: i32,

    /// Index into the spawn table this player was bound to.
    pub spawn_slot: usize,

    /// World position of the assigned spawn pad.
    pub position: Vec3,

    /// Hull material from the spawn slot.
    pub material: String,

    /// Gamer tag color from the spawn slot.
    pub tag_color: [u8; 3],

    /// Exactly one player per session has this set.
    pub is_local: bool,

    /// Combat lifecycle state.
    state: CombatState,

    /// Gates all action intake. True before the session starts, after
    /// defeat, and after the session ends.
    disabled: bool,

    /// Where the tank was last told to drive to.
    pub move_target: Option<Vec3>,

    /// Direction the turret is aiming at.
    pub turret_dir: Vec3,

    /// Number of shells fired by this player, as observed by this peer.
    pub shots_fired: u32,
}

impl Player {
    /// Create a freshly registered player bound to a spawn slot.
    pub fn new(
        id: PlayerId,
        display_name: impl Into<String>,
        spawn_slot: usize,
        spawn: &SpawnPoint,
        max_health: i32,
        is_local: bool,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            health: max_health,
            max_health,
            spawn_slot,
            position: spawn.position,
            material: spawn.material.clone(),
            tag_color: spawn.tag_color,
            is_local,
            state: CombatState::Pending,
            disabled: true,
            move_target: None,
            turret_dir: Vec3::ZERO,
            shots_fired: 0,
        }
    }

    /// Current health.
    pub fn health(&self) -> i32 {
        self.health
    }

    /// Combat lifecycle state.
    pub fn state(&self) -> CombatState {
        self.state
    }

    /// Whether action intake is currently gated off.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Pending -> Active. Any other state is left untouched.
    pub fn activate(&mut self) {
        if self.state == CombatState::Pending {
            self.state = CombatState::Active;
            self.disabled = false;
        }
    }

    /// Gate off action intake without changing the lifecycle state.
    /// Used at session end.
    pub fn suspend(&mut self) {
        self.disabled = true;
    }

    /// Transition into `Defeated`.
    ///
    /// Health is forced to zero unconditionally so the player looks dead
    /// even on a duplicate signal. Returns true only when the transition
    /// actually happened this call.
    pub fn defeat(&mut self) -> bool {
        self.health = 0;

        if self.state == CombatState::Defeated {
            return false;
        }

        self.state = CombatState::Defeated;
        self.disabled = true;
        true
    }

    /// Apply a damage update carrying the resulting health value.
    ///
    /// The incoming number is an absolute clamp target, not a delta, so a
    /// replayed message cannot double-apply. Returns the clamped health, or
    /// `None` when intake is gated off.
    pub fn apply_damage(&mut self, new_health: i32) -> Option<i32> {
        if self.disabled {
            return None;
        }

        self.health = new_health.clamp(0, self.max_health);
        Some(self.health)
    }

    /// Point the tank at a new movement target.
    pub fn set_move_target(&mut self, target: Vec3) {
        if self.disabled {
            return;
        }
        self.move_target = Some(target);
    }

    /// Update the turret aim direction.
    pub fn set_turret_dir(&mut self, dir: Vec3) {
        if self.disabled {
            return;
        }
        self.turret_dir = dir;
    }

    /// Record an attack. The aim direction is synced alongside, the same
    /// way a fired shell implies where the turret was pointing.
    pub fn record_attack(&mut self, _force: f32, dir: Vec3) {
        if self.disabled {
            return;
        }
        self.turret_dir = dir;
        self.shots_fired += 1;
    }

    /// Correct name and visual identity in place from a re-registration.
    pub fn update_identity(&mut self, display_name: &str, spawn: &SpawnPoint) {
        self.display_name = display_name.to_string();
        self.position = spawn.position;
        self.material = spawn.material.clone();
        self.tag_color = spawn.tag_color;
    }
}
