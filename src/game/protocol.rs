//! Arena message definitions
//! Inbound player messages and the outbound presentation contract

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InputState;

/// Messages a player (or driver) sends into the arena loop
#[derive(Debug, Clone)]
pub enum PlayerMsg {
    /// Field a unit for this player
    Join,

    /// Latest held-key state for the player's unit
    Input { state: InputState },

    /// Remove the player's unit from the arena
    Leave,
}

/// Messages broadcast by the arena to all observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaMsg {
    /// A player joined and a unit was fielded for them
    PlayerJoined {
        player_id: Uuid,
        unit_id: Uuid,
        display_name: String,
        /// Archetype display name
        unit_name: String,
        /// Archetype designer credit
        author: String,
    },

    /// A player left and their unit was removed
    PlayerLeft { player_id: Uuid, reason: String },

    /// Arena state snapshot (sent at regular intervals)
    Snapshot {
        /// Simulation tick number
        tick: u64,
        /// All unit states
        units: Vec<UnitSnapshot>,
        /// Events that occurred since the last snapshot
        events: Vec<ArenaEvent>,
    },

    /// Error message
    Error { code: String, message: String },
}

/// Unit state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub unit_id: Uuid,
    pub player_id: Uuid,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Hull facing in radians
    pub rotation: f32,
    /// Turret aim in radians
    pub aim_rotation: f32,
}

/// Discrete simulation events surfaced alongside snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ArenaEvent {
    /// A shell left a unit's barrel
    Shot {
        shooter_id: Uuid,
        shell_id: Uuid,
        x: f32,
        y: f32,
        /// Shell facing in radians
        rotation: f32,
        /// Muzzle speed
        speed: f32,
    },
}
