//! # Tank Arena Session Layer
//!
//! Peer-replicated session layer for a real-time multiplayer tank arena.
//! There is no authoritative server simulation: a relay forwards named JSON
//! messages between peers, each peer applies its own player's actions first
//! and broadcasts them, and every peer derives the end of the session from
//! the same defeat count.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TANK ARENA SESSION                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Shared primitives                        │
//! │  └── vec3.rs      - Float 3-vector for positions and aim     │
//! │                                                              │
//! │  game/            - Domain state                             │
//! │  ├── player.rs    - Player identity + combat state machine   │
//! │  └── registry.rs  - Registry and defeat accounting           │
//! │                                                              │
//! │  network/         - Protocol and transport                   │
//! │  ├── protocol.rs  - Topic-tagged wire messages               │
//! │  ├── relay.rs     - In-process hub + WebSocket relay client  │
//! │  └── session.rs   - Session protocol engine (the actor)      │
//! │                                                              │
//! │  config.rs        - Delays, spawn table, health, intervals   │
//! │  presentation.rs  - Outward notification sink                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trust model
//!
//! Peers are assumed well-behaved. Every handler is idempotent and every
//! protocol failure degrades to "log and continue": an unknown player id is
//! discarded, a bad spawn index is substituted, a duplicated defeat or
//! game-over message collapses into the state already reached. Nothing in
//! this crate has a fatal path.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod presentation;

// Re-export commonly used types
pub use config::{SessionConfig, SpawnPoint};
pub use core::vec3::Vec3;
pub use game::player::{CombatState, Player, PlayerId};
pub use game::registry::PlayerRegistry;
pub use network::protocol::Event;
pub use network::session::{
    EngineCommand, LocalAction, SessionEngine, SessionHandle, SessionPhase,
};
pub use presentation::PresentationSink;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
