//! Session Configuration
//!
//! All tunables for a play session: timer delays, the turret replication
//! interval, per-player health, and the static spawn table. Supplied once at
//! construction; read-only for the lifetime of a session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::vec3::Vec3;

/// A single spawn slot: where a newly registered player appears and which
/// visual identity it receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World position of the spawn pad.
    pub position: Vec3,
    /// Name of the hull material applied to the tank.
    pub material: String,
    /// RGB color of the floating gamer tag.
    pub tag_color: [u8; 3],
}

/// Configuration for a play session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum (and starting) health per player.
    pub max_health: i32,
    /// How long to wait after the deciding defeat before broadcasting the
    /// game-over announcement (lets death effects play out).
    pub game_over_delay: Duration,
    /// How long to wait after game over before leaving the session.
    pub redirect_delay: Duration,
    /// Publish a turret rotation update at most once every this many
    /// simulation ticks.
    pub turret_notify_interval: u32,
    /// Spawn table, indexed by the `spawnPoint` field of registration
    /// messages.
    pub spawn_points: Vec<SpawnPoint>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            game_over_delay: Duration::from_secs(3),
            redirect_delay: Duration::from_secs(3),
            turret_notify_interval: 10,
            spawn_points: default_spawn_points(),
        }
    }
}

/// Four spawn pads at the arena corners, each facing the center.
fn default_spawn_points() -> Vec<SpawnPoint> {
    let colors: [(&str, [u8; 3]); 4] = [
        ("hull-red", [214, 48, 49]),
        ("hull-blue", [9, 132, 227]),
        ("hull-green", [0, 184, 148]),
        ("hull-yellow", [253, 203, 110]),
    ];
    let corners = [
        Vec3::new(-18.0, 0.0, -18.0),
        Vec3::new(18.0, 0.0, -18.0),
        Vec3::new(-18.0, 0.0, 18.0),
        Vec3::new(18.0, 0.0, 18.0),
    ];

    corners
        .iter()
        .zip(colors.iter())
        .map(|(pos, (material, color))| SpawnPoint {
            position: *pos,
            material: (*material).to_string(),
            tag_color: *color,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.max_health, 100);
        assert_eq!(config.spawn_points.len(), 4);
        assert_eq!(config.turret_notify_interval, 10);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = SessionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.spawn_points.len(), config.spawn_points.len());
        assert_eq!(parsed.game_over_delay, config.game_over_delay);
    }
}
