//! Commands emitted by unit controllers and applied by the arena

use uuid::Uuid;

/// A state change requested by a unit during its tick.
///
/// Controllers describe what should happen as plain values; the arena is
/// the only authority that applies them, after the whole tick has run.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitCommand {
    /// Move the unit to a new position (feasibility already checked by the emitter)
    Move { unit_id: Uuid, x: f32, y: f32 },

    /// Set the unit's hull facing
    Rotate { unit_id: Uuid, rotation: f32 },

    /// Spawn a shell leaving the unit's barrel
    SpawnShell {
        shooter_id: Uuid,
        /// Muzzle position (world space)
        x: f32,
        y: f32,
        /// Shell facing in radians
        rotation: f32,
        /// Shooter's damage multiplier
        damage_scale: f32,
        /// Muzzle velocity (world space)
        vel_x: f32,
        vel_y: f32,
    },
}
