//! Relay Transport
//!
//! Adapters between the session engine and the relay channel. Two live here:
//!
//! - [`LocalRelay`], an in-process hub with the same contract as the hosted
//!   relay (identity assignment, roster broadcast, readiness barrier, no
//!   echo back to the sender). Backs the demo binary and the integration
//!   tests.
//! - [`connect`], a WebSocket client for a hosted relay, split into reader
//!   and writer tasks. Undecodable frames are discarded with a warning;
//!   they never reach the engine.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::game::player::PlayerId;
use crate::network::protocol::{Event, GameInfo, PlayerInfo, PlayerRef};
use crate::network::session::{SessionEngine, SessionHandle};
use crate::presentation::PresentationSink;

// =============================================================================
// IN-PROCESS RELAY
// =============================================================================

/// One connected peer's seat at the relay.
struct PeerSeat {
    handle: String,
    spawn_point: i32,
    ready: bool,
    tx: mpsc::UnboundedSender<Event>,
}

struct RelayInner {
    peers: BTreeMap<PlayerId, PeerSeat>,
    next_slot: i32,
    started: bool,
}

/// In-process relay hub.
///
/// Assigns identities, replays the roster on every join, releases the
/// session once every expected peer reported ready, and fans published
/// events out to everyone except their sender.
#[derive(Clone)]
pub struct LocalRelay {
    inner: Arc<Mutex<RelayInner>>,
    capacity: usize,
}

impl LocalRelay {
    /// Create a hub that waits for `capacity` ready peers before starting
    /// the session.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RelayInner {
                peers: BTreeMap::new(),
                next_slot: 0,
                started: false,
            })),
            capacity,
        }
    }

    /// Connect a peer. Assigns a fresh identity and spawn slot, delivers
    /// the `identity` event to the new peer and a roster snapshot to
    /// everyone.
    pub fn join(&self, handle: &str) -> (PlayerId, mpsc::UnboundedReceiver<Event>) {
        let id = PlayerId::new(uuid::Uuid::new_v4().to_string());
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock().expect("relay lock poisoned");
        let spawn_point = inner.next_slot;
        inner.next_slot += 1;

        let _ = tx.send(Event::Identity(PlayerInfo {
            id: id.clone(),
            handle: handle.to_string(),
            spawn_point,
        }));

        inner.peers.insert(
            id.clone(),
            PeerSeat { handle: handle.to_string(), spawn_point, ready: false, tx },
        );

        let roster = Self::roster(&inner);
        Self::broadcast(&inner, None, Event::GameInfo(roster));

        info!(%id, handle, spawn_point, "peer joined relay");
        (id, rx)
    }

    /// Accept an event published by a peer and route it.
    pub fn publish(&self, from: &PlayerId, event: Event) {
        let mut inner = self.inner.lock().expect("relay lock poisoned");

        match event {
            Event::PlayerReady(PlayerRef { id }) => {
                if let Some(seat) = inner.peers.get_mut(&id) {
                    seat.ready = true;
                }
                let ready = inner.peers.values().filter(|s| s.ready).count();
                debug!(ready, capacity = self.capacity, "readiness update");
                if !inner.started && ready >= self.capacity {
                    inner.started = true;
                    Self::broadcast(&inner, None, Event::AllPlayersReady);
                }
            }
            other => Self::broadcast(&inner, Some(from), other),
        }
    }

    /// Drop a peer and tell everyone else it left.
    pub fn leave(&self, id: &PlayerId) {
        let mut inner = self.inner.lock().expect("relay lock poisoned");
        if inner.peers.remove(id).is_none() {
            return;
        }
        info!(%id, "peer left relay");
        Self::broadcast(&inner, None, Event::PlayerLeft(PlayerRef { id: id.clone() }));
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.inner.lock().expect("relay lock poisoned").peers.len()
    }

    /// Join a peer and wire a freshly spawned session engine to its seat.
    pub fn spawn_peer(
        &self,
        handle: &str,
        config: SessionConfig,
        sink: Box<dyn PresentationSink>,
    ) -> (PlayerId, SessionHandle) {
        let (id, mut relay_rx) = self.join(handle);

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let session = SessionEngine::spawn(config, sink, out_tx);

        let inbound_session = session.clone();
        tokio::spawn(async move {
            while let Some(event) = relay_rx.recv().await {
                inbound_session.inbound(event);
            }
        });

        let relay = self.clone();
        let peer_id = id.clone();
        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
                relay.publish(&peer_id, event);
            }
        });

        (id, session)
    }

    fn roster(inner: &RelayInner) -> GameInfo {
        GameInfo {
            players: inner
                .peers
                .iter()
                .map(|(id, seat)| PlayerInfo {
                    id: id.clone(),
                    handle: seat.handle.clone(),
                    spawn_point: seat.spawn_point,
                })
                .collect(),
        }
    }

    fn broadcast(inner: &RelayInner, except: Option<&PlayerId>, event: Event) {
        for (id, seat) in &inner.peers {
            if except == Some(id) {
                continue;
            }
            if seat.tx.send(event.clone()).is_err() {
                debug!(%id, "peer receiver gone, skipping");
            }
        }
    }
}

// =============================================================================
// WEBSOCKET RELAY CLIENT
// =============================================================================

/// Transport errors surfaced to the embedder.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The WebSocket connection could not be established.
    #[error("failed to connect to relay: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Both halves of a live relay connection.
pub struct RelayConnection {
    /// Events to publish to the relay.
    pub outbound: mpsc::UnboundedSender<Event>,
    /// Decoded events arriving from the relay.
    pub inbound: mpsc::UnboundedReceiver<Event>,
}

/// Connect to a hosted relay over WebSocket.
///
/// Spawns a reader and a writer task; both end quietly when the socket or
/// the channels close.
pub async fn connect(url: &str) -> Result<RelayConnection, RelayError> {
    info!(url, "connecting to relay");
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match Event::from_json(&text) {
                    Ok(event) => {
                        if in_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "undecodable relay message, discarding"),
                },
                Ok(Message::Close(_)) => {
                    info!("relay closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "relay read error");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match event.to_json() {
                Ok(json) => {
                    if let Err(e) = write.send(Message::Text(json)).await {
                        error!(error = %e, "relay write error");
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "unencodable event, dropping"),
            }
        }
    });

    Ok(RelayConnection { outbound: out_tx, inbound: in_rx })
}

/// Connect to a hosted relay and wire a session engine to it.
pub async fn connect_peer(
    url: &str,
    config: SessionConfig,
    sink: Box<dyn PresentationSink>,
) -> Result<SessionHandle, RelayError> {
    let connection = connect(url).await?;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let session = SessionEngine::spawn(config, sink, out_tx);

    let inbound_session = session.clone();
    let mut inbound = connection.inbound;
    tokio::spawn(async move {
        while let Some(event) = inbound.recv().await {
            inbound_session.inbound(event);
        }
    });

    let relay_out = connection.outbound;
    tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            if relay_out.send(event).is_err() {
                break;
            }
        }
    });

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::core::vec3::Vec3;
    use crate::network::protocol::Movement;
    use crate::network::session::LocalAction;
    use crate::presentation::{RecordingSink, SinkCall};

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_join_assigns_identity_and_slots() {
        let relay = LocalRelay::new(2);
        let (id_a, mut rx_a) = relay.join("Alice");
        let (id_b, _rx_b) = relay.join("Bob");

        assert_ne!(id_a, id_b);

        let events = drain(&mut rx_a);
        // Identity first, then a roster per join.
        match &events[0] {
            Event::Identity(info) => {
                assert_eq!(info.id, id_a);
                assert_eq!(info.spawn_point, 0);
            }
            other => panic!("expected identity, got {other:?}"),
        }
        match events.last().unwrap() {
            Event::GameInfo(info) => {
                assert_eq!(info.players.len(), 2);
                assert!(info.players.iter().any(|p| p.spawn_point == 1));
            }
            other => panic!("expected roster, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_does_not_echo_to_sender() {
        let relay = LocalRelay::new(2);
        let (id_a, mut rx_a) = relay.join("Alice");
        let (_id_b, mut rx_b) = relay.join("Bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let event = Event::PlayerMove(Movement::new(id_a.clone(), Vec3::new(1.0, 0.0, 0.0)));
        relay.publish(&id_a, event.clone());

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![event]);
    }

    #[tokio::test]
    async fn test_readiness_barrier_broadcasts_once() {
        let relay = LocalRelay::new(2);
        let (id_a, mut rx_a) = relay.join("Alice");
        let (id_b, mut rx_b) = relay.join("Bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        relay.publish(&id_a, Event::PlayerReady(PlayerRef { id: id_a.clone() }));
        assert!(drain(&mut rx_a).is_empty());

        relay.publish(&id_b, Event::PlayerReady(PlayerRef { id: id_b.clone() }));
        assert_eq!(drain(&mut rx_a), vec![Event::AllPlayersReady]);
        assert_eq!(drain(&mut rx_b), vec![Event::AllPlayersReady]);

        // A stray duplicate ready does not restart the session.
        relay.publish(&id_a, Event::PlayerReady(PlayerRef { id: id_a.clone() }));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_leave_broadcasts_player_left() {
        let relay = LocalRelay::new(2);
        let (id_a, _rx_a) = relay.join("Alice");
        let (_id_b, mut rx_b) = relay.join("Bob");
        drain(&mut rx_b);

        relay.leave(&id_a);
        assert_eq!(relay.peer_count(), 1);
        assert_eq!(drain(&mut rx_b), vec![Event::PlayerLeft(PlayerRef { id: id_a })]);
    }

    /// Full two-peer session over the in-process relay: registration,
    /// readiness, a lethal hit, and the distributed game-over handshake.
    #[tokio::test]
    async fn test_two_peer_session_end_to_end() {
        let config = SessionConfig {
            game_over_delay: Duration::from_millis(10),
            redirect_delay: Duration::from_millis(10),
            turret_notify_interval: 1,
            ..SessionConfig::default()
        };

        let relay = LocalRelay::new(2);
        let sink_a = RecordingSink::new();
        let sink_b = RecordingSink::new();
        let (id_a, session_a) = relay.spawn_peer("Alice", config.clone(), Box::new(sink_a.clone()));
        let (id_b, _session_b) = relay.spawn_peer("Bob", config, Box::new(sink_b.clone()));

        // Let registration and the readiness barrier settle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink_a.count(&SinkCall::SetAllPlayersEnabled(true)), 1);
        assert_eq!(sink_b.count(&SinkCall::SetAllPlayersEnabled(true)), 1);

        // Alice's shell takes Bob out; her peer resolves the hit locally.
        session_a.act(LocalAction::ReportDamage {
            attacker: id_a.clone(),
            victim: id_b.clone(),
            new_health: 0,
        });

        // Bob's peer sees its own defeat, announces the winner after the
        // delay, and both peers run the redirect.
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(sink_a.count(&SinkCall::ShowVictory), 1);
        assert_eq!(sink_b.count(&SinkCall::ShowDefeat), 1);
        assert_eq!(sink_a.count(&SinkCall::LeaveSession), 1);
        assert_eq!(sink_b.count(&SinkCall::LeaveSession), 1);
    }

    /// A peer dropping mid-session defeats its player on every other peer.
    #[tokio::test]
    async fn test_disconnect_counts_as_defeat_across_peers() {
        let config = SessionConfig {
            game_over_delay: Duration::from_millis(10),
            redirect_delay: Duration::from_millis(10),
            ..SessionConfig::default()
        };

        let relay = LocalRelay::new(3);
        let sink_a = RecordingSink::new();
        let (id_a, session_a) = relay.spawn_peer("Alice", config.clone(), Box::new(sink_a.clone()));
        let (id_b, _session_b) = relay.spawn_peer("Bob", config.clone(), Box::new(RecordingSink::new()));
        let (id_c, _session_c) = relay.spawn_peer("Cleo", config, Box::new(RecordingSink::new()));

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Cleo drops out, then Bob lands the hit that defeats Alice. Her
        // peer evaluates: two of three down, Bob is the winner.
        relay.leave(&id_c);
        tokio::time::sleep(Duration::from_millis(50)).await;
        session_a.act(LocalAction::ReportDamage {
            attacker: id_b.clone(),
            victim: id_a.clone(),
            new_health: 0,
        });

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(sink_a.count(&SinkCall::ShowDefeat), 1);
        assert_eq!(sink_a.count(&SinkCall::LeaveSession), 1);
    }
}
