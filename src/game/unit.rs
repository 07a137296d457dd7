//! Unit abstraction: shared body state plus the per-archetype controller trait

use uuid::Uuid;

use super::command::UnitCommand;
use super::obstacle::ObstacleQuery;
use super::InputState;

/// Rotate a vector counter-clockwise by `angle` radians
pub fn rotate_vec(x: f32, y: f32, angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// State shared by every unit archetype.
///
/// Position and facing are authoritative: the arena writes them when it
/// applies move/rotate commands, controllers never assign them directly.
#[derive(Debug, Clone)]
pub struct UnitBody {
    pub id: Uuid,
    pub player_id: Uuid,
    /// Position X (world space)
    pub x: f32,
    /// Position Y (world space)
    pub y: f32,
    /// Hull facing in radians (0 = world +Y)
    pub rotation: f32,
    /// Multiplier carried by every shell this unit fires
    pub damage_scale: f32,
}

impl UnitBody {
    pub fn new(id: Uuid, player_id: Uuid, x: f32, y: f32, rotation: f32) -> Self {
        Self {
            id,
            player_id,
            x,
            y,
            rotation,
            damage_scale: 1.0,
        }
    }

    /// Transform a world-space point into this unit's local frame
    pub fn world_to_local(&self, x: f32, y: f32) -> (f32, f32) {
        rotate_vec(x - self.x, y - self.y, -self.rotation)
    }
}

/// A controllable unit on the field.
///
/// The arena calls `update` exactly once per tick on its own task. State
/// changes to the shared body are requested through the command sink and
/// applied by the arena after every unit has updated; archetype-private
/// state (aim, cooldowns) is mutated in place.
pub trait Unit: Send {
    fn body(&self) -> &UnitBody;

    fn body_mut(&mut self) -> &mut UnitBody;

    /// Run one simulation tick. `input` is `None` when no player is bound,
    /// which skips every input-driven step but still advances timers.
    fn update(
        &mut self,
        input: Option<&InputState>,
        obstacles: &dyn ObstacleQuery,
        commands: &mut Vec<UnitCommand>,
    );

    /// Whether a world-space point lies inside the unit's silhouette
    fn is_hit(&self, x: f32, y: f32) -> bool;

    /// Direction the unit is aiming, for presentation. Defaults to the hull facing.
    fn aim_rotation(&self) -> f32 {
        self.body().rotation
    }

    /// Display name of the archetype
    fn unit_name(&self) -> &'static str;

    /// Credited designer of the archetype
    fn author(&self) -> &'static str;
}
