//! Tank Arena Simulation - authoritative arena host
//!
//! This is the main entry point for the simulation host. It handles:
//! - Running the authoritative arena tick loop
//! - Feeding scripted demo players into the arena over input channels
//! - Logging the broadcast snapshot stream

mod config;
mod game;
mod util;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;
use crate::game::obstacle::ArenaMap;
use crate::game::protocol::{ArenaMsg, PlayerMsg};
use crate::game::{Arena, ArenaHandle, ArenaRegistry, InputState, PlayerInput};
use crate::util::time::{init_server_time, unix_millis, uptime_secs, SIMULATION_TPS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Tank Arena Simulation");

    let registry = Arc::new(ArenaRegistry::new());

    // Create and register the arena
    let arena_id = Uuid::new_v4();
    let seed = config.arena_seed.unwrap_or_else(rand::random);
    let (arena, handle) = Arena::new(arena_id, seed, ArenaMap::default(), config.max_players);
    registry.insert(handle.clone());

    // Observe the broadcast stream before the loop starts
    tokio::spawn(log_arena_msgs(arena_id, handle.snapshot_tx.subscribe()));

    let arena_registry = registry.clone();
    let arena_task = tokio::spawn(async move {
        arena.run().await;
        arena_registry.remove(&arena_id);
        info!(arena_id = %arena_id, "Arena deregistered");
    });

    info!(
        arena_id = %arena_id,
        seed,
        arenas = registry.active_arenas(),
        "Arena registered"
    );

    // Scripted demo players, wired up through the registry
    let demo_handle = registry.get(&arena_id).expect("arena just registered");
    let demo_ids: Vec<Uuid> = (0..config.demo_players).map(|_| Uuid::new_v4()).collect();
    for (slot, player_id) in demo_ids.iter().enumerate() {
        tokio::spawn(drive_demo_player(demo_handle.clone(), *player_id, slot));
    }

    shutdown_signal().await;
    info!(players = registry.total_players(), "Shutting down arenas");

    // Pull the demo players out so the arena closes on its own
    for player_id in demo_ids {
        let _ = handle
            .input_tx
            .send(PlayerInput {
                player_id,
                msg: PlayerMsg::Leave,
                received_at: unix_millis(),
            })
            .await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(2), arena_task).await;

    info!(uptime_secs = uptime_secs(), "Server shutdown complete");
    Ok(())
}

/// Drive one scripted player: join, then cycle through movement, aiming,
/// boosting and firing patterns at the client input cadence.
async fn drive_demo_player(handle: ArenaHandle, player_id: Uuid, slot: usize) {
    let join = PlayerInput {
        player_id,
        msg: PlayerMsg::Join,
        received_at: unix_millis(),
    };
    if handle.input_tx.send(join).await.is_err() {
        return;
    }

    // 30 Hz input cadence; the arena samples the held state every tick
    let mut input_interval = tokio::time::interval(Duration::from_millis(1000 / 30));
    let mut frame: u64 = 0;

    loop {
        input_interval.tick().await;
        frame += 1;

        // Switch behavior every 3 seconds, offset per slot
        let phase = (frame / 90 + slot as u64) % 4;
        let sweep = frame as f32 * 0.02 + slot as f32;
        let state = InputState {
            forward: phase != 2,
            backward: phase == 2,
            turn_left: phase == 1,
            turn_right: phase == 3,
            boost: frame % 240 < 2,
            fire: frame % 45 == 0,
            cursor_x: sweep.cos() * 5.0,
            cursor_y: sweep.sin() * 5.0,
        };

        let msg = PlayerInput {
            player_id,
            msg: PlayerMsg::Input { state },
            received_at: unix_millis(),
        };
        if handle.input_tx.send(msg).await.is_err() {
            break;
        }
    }
}

/// Log broadcast traffic from an arena, sampling snapshots once a second
async fn log_arena_msgs(arena_id: Uuid, mut rx: broadcast::Receiver<ArenaMsg>) {
    loop {
        match rx.recv().await {
            Ok(ArenaMsg::Snapshot {
                tick,
                units,
                events,
            }) => {
                for event in &events {
                    info!(arena_id = %arena_id, event = ?event, "Arena event");
                }
                if tick % SIMULATION_TPS as u64 == 0 {
                    match serde_json::to_string(&units) {
                        Ok(json) => debug!(arena_id = %arena_id, tick, units = %json, "Snapshot"),
                        Err(e) => warn!(error = %e, "Failed to encode snapshot"),
                    }
                }
            }
            Ok(msg) => {
                info!(arena_id = %arena_id, msg = ?msg, "Arena message");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(arena_id = %arena_id, skipped, "Log stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
