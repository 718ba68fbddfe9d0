//! Tank Arena demo driver.
//!
//! With no arguments, runs a scripted four-player session over the
//! in-process relay so the whole protocol can be watched in the logs.
//! Pass a WebSocket URL to join a hosted relay as a single peer instead.

use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tank_arena::network::relay::{self, LocalRelay};
use tank_arena::network::session::LocalAction;
use tank_arena::presentation::TracingSink;
use tank_arena::{SessionConfig, Vec3, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Tank Arena session layer v{}", VERSION);

    match std::env::args().nth(1) {
        Some(url) => join_hosted_relay(&url).await,
        None => demo_session().await,
    }
}

/// Join a hosted relay and run until interrupted. The relay drives the
/// whole session; this process only mirrors it.
async fn join_hosted_relay(url: &str) -> Result<()> {
    let _session =
        relay::connect_peer(url, SessionConfig::default(), Box::new(TracingSink)).await?;
    info!("connected to {url}, ctrl-c to quit");
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Scripted four-player battle over the in-process relay.
async fn demo_session() -> Result<()> {
    info!("=== Starting Demo Session ===");

    // Short timers so the demo wraps up quickly.
    let config = SessionConfig {
        game_over_delay: Duration::from_secs(1),
        redirect_delay: Duration::from_secs(1),
        ..SessionConfig::default()
    };

    let arena = LocalRelay::new(4);
    let (alice, peer_a) = arena.spawn_peer("Alice", config.clone(), Box::new(TracingSink));
    let (bob, _peer_b) = arena.spawn_peer("Bob", config.clone(), Box::new(TracingSink));
    let (cleo, _peer_c) = arena.spawn_peer("Cleo", config.clone(), Box::new(TracingSink));
    let (dan, peer_d) = arena.spawn_peer("Dan", config, Box::new(TracingSink));

    // Registration and the readiness barrier settle.
    sleep(Duration::from_millis(100)).await;

    // Some movement and aiming for flavor.
    peer_a.act(LocalAction::Move(Vec3::new(4.0, 0.0, -6.0)));
    for tick in 0..20 {
        let angle = tick as f32 * 0.1;
        peer_a.act(LocalAction::AimTurret(Vec3::new(angle.cos(), 0.0, angle.sin())));
    }
    peer_a.act(LocalAction::Attack { force: 22.5, dir: Vec3::new(1.0, 0.0, 0.2) });
    sleep(Duration::from_millis(50)).await;

    // Alice wears Bob down, then finishes him and Cleo.
    for health in [60, 20, 0] {
        peer_a.act(LocalAction::ReportDamage {
            attacker: alice.clone(),
            victim: bob.clone(),
            new_health: health,
        });
        sleep(Duration::from_millis(30)).await;
    }
    peer_a.act(LocalAction::ReportDamage {
        attacker: alice.clone(),
        victim: cleo.clone(),
        new_health: 0,
    });
    sleep(Duration::from_millis(50)).await;

    // Dan lands the deciding shot on Alice. Her peer observes its own
    // defeat, derives Dan as the winner and announces the game over.
    peer_d.act(LocalAction::ReportDamage {
        attacker: dan.clone(),
        victim: alice.clone(),
        new_health: 0,
    });

    // Announcement delay, redirect delay, and a little slack.
    sleep(Duration::from_millis(2500)).await;

    info!("=== Demo Session Complete ===");
    Ok(())
}
