//! Protocol Messages
//!
//! Wire format for the relay channel. Every message is a named topic with a
//! JSON payload; the topic rides in the `event` field so the whole protocol
//! round-trips through one tagged enum. Field names match the relay's wire
//! format exactly (`spawnPoint`, `attackerId`, ...), so renames are pinned
//! here and nowhere else.

use serde::{Deserialize, Serialize};

use crate::core::vec3::Vec3;
use crate::game::player::PlayerId;

// =============================================================================
// PAYLOADS
// =============================================================================

/// Identity of one player as the relay announces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Relay-assigned player id.
    pub id: PlayerId,
    /// Display name chosen in the lobby.
    pub handle: String,
    /// Spawn slot the relay picked. May be out of range; the registry
    /// substitutes a valid one.
    #[serde(rename = "spawnPoint")]
    pub spawn_point: i32,
}

/// Roster snapshot broadcast by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Every player the relay currently knows about.
    pub players: Vec<PlayerInfo>,
}

/// A position or direction attributed to a player. Shared by movement and
/// turret rotation, which differ only by topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Player performing the action.
    pub id: PlayerId,
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Movement {
    /// Build from a player id and vector.
    pub fn new(id: PlayerId, v: Vec3) -> Self {
        Self { id, x: v.x, y: v.y, z: v.z }
    }

    /// The payload vector.
    pub fn vec(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// A fired shell: aim direction plus launch force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    /// Player firing.
    pub id: PlayerId,
    /// Aim direction X.
    pub x: f32,
    /// Aim direction Y.
    pub y: f32,
    /// Aim direction Z.
    pub z: f32,
    /// Launch force of the shell.
    pub force: f32,
}

impl Attack {
    /// Build from a player id, aim direction and force.
    pub fn new(id: PlayerId, dir: Vec3, force: f32) -> Self {
        Self { id, x: dir.x, y: dir.y, z: dir.z, force }
    }

    /// The aim direction.
    pub fn dir(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Result of a hit, as resolved by the attacker's peer.
///
/// `damage` carries the victim's **resulting health value**, not a delta, so
/// receivers clamp to it instead of subtracting. A replayed message cannot
/// double-apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Damage {
    /// Peer whose shell landed.
    #[serde(rename = "attackerId")]
    pub attacker_id: PlayerId,
    /// Player that was hit.
    #[serde(rename = "damagedPlayerId")]
    pub damaged_player_id: PlayerId,
    /// Resulting health of the damaged player.
    pub damage: i32,
}

/// Payload naming a single player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// The player in question.
    pub id: PlayerId,
}

// =============================================================================
// EVENTS
// =============================================================================

/// All messages crossing the relay channel, tagged by topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// The relay tells this client who it is. Triggers local player
    /// creation.
    #[serde(rename = "identity")]
    Identity(PlayerInfo),

    /// Roster snapshot; bulk-registers remote players.
    #[serde(rename = "gameinfo")]
    GameInfo(GameInfo),

    /// Everyone is in; flips all pending players to active.
    #[serde(rename = "allplayersready")]
    AllPlayersReady,

    /// A player picked a new movement target.
    #[serde(rename = "playerMove")]
    PlayerMove(Movement),

    /// A player's turret aim changed.
    #[serde(rename = "turretRotate")]
    TurretRotate(Movement),

    /// A player fired a shell.
    #[serde(rename = "attack")]
    Attack(Attack),

    /// A shell landed; carries the victim's resulting health.
    #[serde(rename = "damage")]
    Damage(Damage),

    /// A player is out.
    #[serde(rename = "playerDefeated")]
    PlayerDefeated(PlayerRef),

    /// The session is over; `id` is the winner.
    #[serde(rename = "gameOver")]
    GameOver(PlayerRef),

    /// A player's connection dropped. Routed to the defeat path.
    #[serde(rename = "playerLeft")]
    PlayerLeft(PlayerRef),

    /// The local player signals readiness to the relay.
    #[serde(rename = "playerready")]
    PlayerReady(PlayerRef),
}

impl Event {
    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the JSON wire form.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// The topic string this event rides under.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::Identity(_) => "identity",
            Event::GameInfo(_) => "gameinfo",
            Event::AllPlayersReady => "allplayersready",
            Event::PlayerMove(_) => "playerMove",
            Event::TurretRotate(_) => "turretRotate",
            Event::Attack(_) => "attack",
            Event::Damage(_) => "damage",
            Event::PlayerDefeated(_) => "playerDefeated",
            Event::GameOver(_) => "gameOver",
            Event::PlayerLeft(_) => "playerLeft",
            Event::PlayerReady(_) => "playerready",
        }
    }
}
