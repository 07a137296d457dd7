//! Game simulation modules

pub mod arena;
pub mod command;
pub mod obstacle;
pub mod protocol;
pub mod snapshot;
pub mod tank;
pub mod unit;

pub use arena::{Arena, ArenaHandle, ArenaRegistry};

use crate::game::protocol::PlayerMsg;
use uuid::Uuid;

/// Player input envelope received on the arena's input channel
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: PlayerMsg,
    pub received_at: u64,
}

/// Held-key input state for a single player, sampled by the unit once per tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputState {
    /// Move key along the unit's forward axis
    pub forward: bool,
    /// Move key along the unit's backward axis
    pub backward: bool,
    /// Rotate counter-clockwise
    pub turn_left: bool,
    /// Rotate clockwise
    pub turn_right: bool,
    /// Speed boost key
    pub boost: bool,
    /// Fire button
    pub fire: bool,
    /// Cursor position in world space (aim target)
    pub cursor_x: f32,
    pub cursor_y: f32,
}
