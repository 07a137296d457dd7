//! Arena state and authoritative tick loop

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{unix_millis, SIMULATION_TPS, SNAPSHOT_TPS, TICK_DURATION_MICROS};

use super::command::UnitCommand;
use super::obstacle::{ArenaMap, ObstacleQuery};
use super::protocol::{ArenaEvent, ArenaMsg, PlayerMsg};
use super::snapshot::SnapshotBuilder;
use super::tank::Tank;
use super::unit::Unit;
use super::{InputState, PlayerInput};

/// Input envelopes older than this are logged as stale
const STALE_INPUT_MS: u64 = 250;
/// Rejection-sampling attempts for spawn placement
const SPAWN_ATTEMPTS: u32 = 32;

/// A player bound to a unit in the arena
#[derive(Debug, Clone)]
pub struct PlayerSeat {
    pub player_id: Uuid,
    pub display_name: String,
    pub unit_id: Uuid,
    /// Latest input state, sampled by the unit each tick
    pub input: InputState,
    pub joined_at: u64,
}

/// Arena state (owned by the arena task)
pub struct ArenaState {
    pub id: Uuid,
    pub seed: u64,
    pub tick: u64,
    pub map: ArenaMap,
    pub players: HashMap<Uuid, PlayerSeat>,
    pub units: HashMap<Uuid, Box<dyn Unit>>,
    pub rng: ChaCha8Rng,
    pub max_players: usize,
    /// Set once the first player joins; the arena closes when it empties again
    pub had_players: bool,
}

impl ArenaState {
    pub fn new(id: Uuid, seed: u64, map: ArenaMap, max_players: usize) -> Self {
        Self {
            id,
            seed,
            tick: 0,
            map,
            players: HashMap::new(),
            units: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_players,
            had_players: false,
        }
    }

    /// Pick a spawn position on open ground, clear of other units
    pub fn generate_spawn_position(&mut self) -> (f32, f32, f32) {
        let range = self.map.half_extent * 0.8;
        let mut x = 0.0;
        let mut y = 0.0;
        let mut clear = false;

        for _ in 0..SPAWN_ATTEMPTS {
            x = self.rng.gen_range(-range..range);
            y = self.rng.gen_range(-range..range);
            clear = !self.map.is_blocked(x, y)
                && !self.units.values().any(|unit| unit.is_hit(x, y));
            if clear {
                break;
            }
        }
        if !clear {
            warn!(arena_id = %self.id, "No clear spawn found, using last candidate");
        }

        let rotation = self.rng.gen_range(0.0..std::f32::consts::TAU);
        (x, y, rotation)
    }
}

/// Handle to a running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ArenaMsg>,
    pub player_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl ArenaHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Registry of all active arenas
pub struct ArenaRegistry {
    arenas: DashMap<Uuid, ArenaHandle>,
}

impl ArenaRegistry {
    pub fn new() -> Self {
        Self {
            arenas: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.get(id).map(|a| a.value().clone())
    }

    pub fn insert(&self, handle: ArenaHandle) {
        self.arenas.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.remove(id).map(|(_, h)| h)
    }

    pub fn active_arenas(&self) -> usize {
        self.arenas.len()
    }

    pub fn total_players(&self) -> usize {
        self.arenas.iter().map(|a| a.value().player_count()).sum()
    }
}

impl Default for ArenaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative arena simulation
pub struct Arena {
    state: ArenaState,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ArenaMsg>,
    snapshot_builder: SnapshotBuilder,
    /// Events held back until the next snapshot goes out
    pending_events: Vec<ArenaEvent>,
    player_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl Arena {
    /// Create a new arena
    pub fn new(id: Uuid, seed: u64, map: ArenaMap, max_players: usize) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handle = ArenaHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let arena = Self {
            state: ArenaState::new(id, seed, map, max_players),
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            pending_events: Vec::new(),
            player_count,
        };

        (arena, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(arena_id = %self.state.id, seed = self.state.seed, "Arena started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            let inputs_open = self.process_inputs();

            // Run simulation tick
            let events = self.run_tick();
            self.pending_events.extend(events);

            // Build and broadcast snapshot if needed
            if self.snapshot_builder.should_send() {
                let events = std::mem::take(&mut self.pending_events);
                let snapshot = self
                    .snapshot_builder
                    .build(self.state.tick, &self.state.units, events);
                let _ = self.snapshot_tx.send(snapshot);
            }

            // Check if all players left
            if self.state.had_players && self.state.players.is_empty() {
                info!(arena_id = %self.state.id, "All players left, closing arena");
                break;
            }

            // Nothing can ever join once the input channel is gone
            if !inputs_open && self.state.players.is_empty() {
                info!(arena_id = %self.state.id, "Input channel closed, closing arena");
                break;
            }
        }
    }

    /// Process all pending inputs; returns false once the channel is closed
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => {
                    let age_ms = unix_millis().saturating_sub(input.received_at);
                    if age_ms > STALE_INPUT_MS {
                        warn!(
                            player_id = %input.player_id,
                            age_ms,
                            "Stale player input"
                        );
                    }
                    match input.msg {
                        PlayerMsg::Join => self.handle_join(input.player_id),
                        PlayerMsg::Input { state } => self.handle_input(input.player_id, state),
                        PlayerMsg::Leave => self.handle_leave(input.player_id),
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Handle player join request
    fn handle_join(&mut self, player_id: Uuid) {
        if self.state.players.contains_key(&player_id) {
            warn!(player_id = %player_id, "Player already in arena");
            return;
        }

        if self.state.players.len() >= self.state.max_players {
            let _ = self.snapshot_tx.send(ArenaMsg::Error {
                code: "arena_full".to_string(),
                message: "Arena is full".to_string(),
            });
            return;
        }

        let (spawn_x, spawn_y, spawn_rotation) = self.state.generate_spawn_position();
        let unit_id = Uuid::new_v4();
        let tank = Tank::new(unit_id, player_id, spawn_x, spawn_y, spawn_rotation);
        let unit_name = tank.unit_name().to_string();
        let author = tank.author().to_string();

        let seat = PlayerSeat {
            player_id,
            display_name: format!("Player_{}", &player_id.to_string()[..8]),
            unit_id,
            input: InputState::default(),
            joined_at: unix_millis(),
        };
        let display_name = seat.display_name.clone();

        self.state.players.insert(player_id, seat);
        self.state.units.insert(unit_id, Box::new(tank));
        self.state.had_players = true;
        self.player_count
            .store(self.state.players.len(), std::sync::atomic::Ordering::Relaxed);

        let _ = self.snapshot_tx.send(ArenaMsg::PlayerJoined {
            player_id,
            unit_id,
            display_name,
            unit_name,
            author,
        });

        info!(
            arena_id = %self.state.id,
            player_id = %player_id,
            player_count = self.state.players.len(),
            "Player joined arena"
        );

        self.snapshot_builder.force_next();
    }

    /// Handle player input
    fn handle_input(&mut self, player_id: Uuid, state: InputState) {
        if let Some(seat) = self.state.players.get_mut(&player_id) {
            seat.input = state;
        }
    }

    /// Handle player leave
    fn handle_leave(&mut self, player_id: Uuid) {
        if let Some(seat) = self.state.players.remove(&player_id) {
            self.state.units.remove(&seat.unit_id);
            self.player_count
                .store(self.state.players.len(), std::sync::atomic::Ordering::Relaxed);

            let _ = self.snapshot_tx.send(ArenaMsg::PlayerLeft {
                player_id: seat.player_id,
                reason: "left".to_string(),
            });

            info!(
                arena_id = %self.state.id,
                player = %seat.display_name,
                session_secs = unix_millis().saturating_sub(seat.joined_at) / 1000,
                "Player left arena"
            );

            self.snapshot_builder.force_next();
        }
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) -> Vec<ArenaEvent> {
        self.state.tick += 1;

        let mut commands = Vec::new();
        for unit in self.state.units.values_mut() {
            let input = self
                .state
                .players
                .get(&unit.body().player_id)
                .map(|seat| &seat.input);
            unit.update(input, &self.state.map, &mut commands);
        }

        self.apply_commands(commands)
    }

    /// Apply unit commands to authoritative state, collecting presentation events
    fn apply_commands(&mut self, commands: Vec<UnitCommand>) -> Vec<ArenaEvent> {
        let mut events = Vec::new();

        for command in commands {
            match command {
                UnitCommand::Move { unit_id, x, y } => {
                    if let Some(unit) = self.state.units.get_mut(&unit_id) {
                        let body = unit.body_mut();
                        body.x = x;
                        body.y = y;
                    }
                }
                UnitCommand::Rotate { unit_id, rotation } => {
                    if let Some(unit) = self.state.units.get_mut(&unit_id) {
                        unit.body_mut().rotation = rotation;
                    }
                }
                UnitCommand::SpawnShell {
                    shooter_id,
                    x,
                    y,
                    rotation,
                    damage_scale,
                    vel_x,
                    vel_y,
                } => {
                    let shell_id = Uuid::new_v4();
                    let speed = (vel_x * vel_x + vel_y * vel_y).sqrt();
                    debug!(
                        arena_id = %self.state.id,
                        shooter_id = %shooter_id,
                        shell_id = %shell_id,
                        damage_scale,
                        "Shell spawned"
                    );
                    events.push(ArenaEvent::Shot {
                        shooter_id,
                        shell_id,
                        x,
                        y,
                        rotation,
                        speed,
                    });
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::unit::rotate_vec;

    const EPS: f32 = 1e-4;

    fn open_map() -> ArenaMap {
        ArenaMap {
            half_extent: 50.0,
            blocks: Vec::new(),
        }
    }

    #[test]
    fn join_spawns_a_unit_on_open_ground() {
        let (mut arena, handle) = Arena::new(Uuid::new_v4(), 42, ArenaMap::default(), 8);
        let player_id = Uuid::new_v4();

        arena.handle_join(player_id);

        assert_eq!(arena.state.players.len(), 1);
        assert_eq!(arena.state.units.len(), 1);
        assert_eq!(handle.player_count(), 1);

        let seat = &arena.state.players[&player_id];
        let unit = &arena.state.units[&seat.unit_id];
        let body = unit.body();
        assert!(!arena.state.map.is_blocked(body.x, body.y));
        assert_eq!(body.player_id, player_id);
    }

    #[test]
    fn join_rejects_when_full() {
        let (mut arena, handle) = Arena::new(Uuid::new_v4(), 7, open_map(), 1);
        arena.handle_join(Uuid::new_v4());

        let mut rx = handle.snapshot_tx.subscribe();
        arena.handle_join(Uuid::new_v4());

        assert_eq!(arena.state.players.len(), 1);
        match rx.try_recv() {
            Ok(ArenaMsg::Error { code, .. }) => assert_eq!(code, "arena_full"),
            other => panic!("expected an error broadcast, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_join_is_ignored() {
        let (mut arena, _handle) = Arena::new(Uuid::new_v4(), 7, open_map(), 8);
        let player_id = Uuid::new_v4();
        arena.handle_join(player_id);
        arena.handle_join(player_id);
        assert_eq!(arena.state.players.len(), 1);
        assert_eq!(arena.state.units.len(), 1);
    }

    #[test]
    fn input_drives_unit_through_commands() {
        let (mut arena, _handle) = Arena::new(Uuid::new_v4(), 3, open_map(), 8);
        let player_id = Uuid::new_v4();
        arena.handle_join(player_id);

        let unit_id = arena.state.players[&player_id].unit_id;
        let (x0, y0, rotation) = {
            let body = arena.state.units[&unit_id].body();
            (body.x, body.y, body.rotation)
        };

        arena.handle_input(
            player_id,
            InputState {
                forward: true,
                ..Default::default()
            },
        );
        let events = arena.run_tick();
        assert!(events.is_empty());

        let (dx, dy) = rotate_vec(0.0, 0.05, rotation);
        let body = arena.state.units[&unit_id].body();
        assert!((body.x - (x0 + dx)).abs() < EPS);
        assert!((body.y - (y0 + dy)).abs() < EPS);
    }

    #[test]
    fn fire_input_produces_shot_event() {
        let (mut arena, _handle) = Arena::new(Uuid::new_v4(), 3, open_map(), 8);
        let player_id = Uuid::new_v4();
        arena.handle_join(player_id);
        let unit_id = arena.state.players[&player_id].unit_id;

        arena.handle_input(
            player_id,
            InputState {
                fire: true,
                cursor_x: 20.0,
                cursor_y: 20.0,
                ..Default::default()
            },
        );
        let events = arena.run_tick();

        assert_eq!(events.len(), 1);
        match &events[0] {
            ArenaEvent::Shot {
                shooter_id, speed, ..
            } => {
                assert_eq!(*shooter_id, unit_id);
                assert!((speed - 20.0).abs() < EPS);
            }
        }

        // Cooling down: the next tick must not spawn another shell
        let events = arena.run_tick();
        assert!(events.is_empty());
    }

    #[test]
    fn leave_removes_seat_and_unit() {
        let (mut arena, handle) = Arena::new(Uuid::new_v4(), 9, open_map(), 8);
        let player_id = Uuid::new_v4();
        arena.handle_join(player_id);
        arena.handle_leave(player_id);

        assert!(arena.state.players.is_empty());
        assert!(arena.state.units.is_empty());
        assert_eq!(handle.player_count(), 0);
    }

    #[test]
    fn unbound_units_do_not_move() {
        let (mut arena, _handle) = Arena::new(Uuid::new_v4(), 5, open_map(), 8);
        let player_id = Uuid::new_v4();
        arena.handle_join(player_id);
        let unit_id = arena.state.players[&player_id].unit_id;

        // Drop the seat but keep the unit on the field
        arena.state.players.remove(&player_id);

        let (x0, y0) = {
            let body = arena.state.units[&unit_id].body();
            (body.x, body.y)
        };
        let events = arena.run_tick();

        assert!(events.is_empty());
        let body = arena.state.units[&unit_id].body();
        assert!((body.x - x0).abs() < EPS);
        assert!((body.y - y0).abs() < EPS);
    }

    #[test]
    fn spawns_avoid_existing_units() {
        let map = ArenaMap {
            half_extent: 2.0,
            blocks: Vec::new(),
        };
        let (mut arena, _handle) = Arena::new(Uuid::new_v4(), 11, map, 8);
        let blocker_id = Uuid::new_v4();
        arena.handle_join(blocker_id);

        // Pin the first unit to the center so it shadows a big share of
        // the small map
        let blocker_unit = arena.state.players[&blocker_id].unit_id;
        {
            let body = arena.state.units.get_mut(&blocker_unit).unwrap().body_mut();
            body.x = 0.0;
            body.y = 0.0;
        }

        for _ in 0..20 {
            let (x, y, _) = arena.state.generate_spawn_position();
            assert!(!arena.state.map.is_blocked(x, y));
            assert!(!arena.state.units[&blocker_unit].is_hit(x, y));
        }
    }

    #[test]
    fn registry_tracks_active_arenas() {
        let registry = ArenaRegistry::new();
        let (_arena, handle) = Arena::new(Uuid::new_v4(), 1, open_map(), 4);
        let id = handle.id;

        registry.insert(handle.clone());
        assert_eq!(registry.active_arenas(), 1);
        assert_eq!(registry.total_players(), 0);
        assert!(registry.get(&id).is_some());

        registry.remove(&id);
        assert_eq!(registry.active_arenas(), 0);
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn arena_loop_broadcasts_and_closes_when_empty() {
        tokio_test::block_on(async {
            let (arena, handle) = Arena::new(Uuid::new_v4(), 21, open_map(), 4);
            let mut rx = handle.snapshot_tx.subscribe();
            let player_id = Uuid::new_v4();

            let task = tokio::spawn(arena.run());

            let run = async {
                handle
                    .input_tx
                    .send(PlayerInput {
                        player_id,
                        msg: PlayerMsg::Join,
                        received_at: unix_millis(),
                    })
                    .await
                    .expect("join send");

                loop {
                    match rx.recv().await.expect("broadcast") {
                        ArenaMsg::PlayerJoined { player_id: p, .. } => {
                            assert_eq!(p, player_id);
                            break;
                        }
                        _ => continue,
                    }
                }

                loop {
                    if let ArenaMsg::Snapshot { units, .. } = rx.recv().await.expect("broadcast") {
                        if units.len() == 1 {
                            assert_eq!(units[0].player_id, player_id);
                            break;
                        }
                    }
                }

                handle
                    .input_tx
                    .send(PlayerInput {
                        player_id,
                        msg: PlayerMsg::Leave,
                        received_at: unix_millis(),
                    })
                    .await
                    .expect("leave send");

                loop {
                    if let ArenaMsg::PlayerLeft { player_id: p, .. } =
                        rx.recv().await.expect("broadcast")
                    {
                        assert_eq!(p, player_id);
                        break;
                    }
                }

                task.await.expect("arena task");
            };

            tokio::time::timeout(Duration::from_secs(10), run)
                .await
                .expect("arena loop test timed out");
        });
    }

    #[test]
    fn snapshots_carry_shots_fired_between_them() {
        tokio_test::block_on(async {
            let (mut arena, handle) = Arena::new(Uuid::new_v4(), 13, open_map(), 4);
            // Stretch the cadence so held-fire shots (one per 60 ticks)
            // land between snapshots instead of on them
            arena.snapshot_builder = SnapshotBuilder::new(61);

            let mut rx = handle.snapshot_tx.subscribe();
            let player_id = Uuid::new_v4();
            let task = tokio::spawn(arena.run());

            let run = async {
                handle
                    .input_tx
                    .send(PlayerInput {
                        player_id,
                        msg: PlayerMsg::Join,
                        received_at: unix_millis(),
                    })
                    .await
                    .expect("join send");

                loop {
                    if let ArenaMsg::PlayerJoined { .. } = rx.recv().await.expect("broadcast") {
                        break;
                    }
                }

                handle
                    .input_tx
                    .send(PlayerInput {
                        player_id,
                        msg: PlayerMsg::Input {
                            state: InputState {
                                fire: true,
                                cursor_y: 5.0,
                                ..Default::default()
                            },
                        },
                        received_at: unix_millis(),
                    })
                    .await
                    .expect("input send");

                // The first counted snapshot may predate the fire input;
                // every later one covers a full 61-tick window and so must
                // carry at least one shot
                let mut with_shots = 0;
                for _ in 0..3 {
                    loop {
                        if let ArenaMsg::Snapshot { events, .. } =
                            rx.recv().await.expect("broadcast")
                        {
                            if events.iter().any(|e| matches!(e, ArenaEvent::Shot { .. })) {
                                with_shots += 1;
                            }
                            break;
                        }
                    }
                }
                assert!(
                    with_shots >= 2,
                    "expected shots in at least 2 of 3 snapshots, got {}",
                    with_shots
                );

                handle
                    .input_tx
                    .send(PlayerInput {
                        player_id,
                        msg: PlayerMsg::Leave,
                        received_at: unix_millis(),
                    })
                    .await
                    .expect("leave send");
                task.await.expect("arena task");
            };

            tokio::time::timeout(Duration::from_secs(10), run)
                .await
                .expect("snapshot event test timed out");
        });
    }
}
