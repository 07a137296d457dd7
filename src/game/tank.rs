//! Tank archetype: movement, turret aim, cannon fire, speed boost

use std::f32::consts::{FRAC_PI_2, PI};

use uuid::Uuid;

use crate::util::time::{tick_delta, SIMULATION_TPS};

use super::command::UnitCommand;
use super::obstacle::ObstacleQuery;
use super::unit::{rotate_vec, Unit, UnitBody};
use super::InputState;

/// Hull silhouette half-width (local X)
const HULL_HALF_WIDTH: f32 = 0.8;
/// Hull silhouette forward extent (local +Y)
const HULL_FRONT: f32 = 0.8;
/// Hull silhouette backward extent (local -Y)
const HULL_REAR: f32 = 1.0;
/// Cursor distances below this snap the turret to the hull facing
const AIM_EPSILON: f32 = 1e-4;

/// Tank tuning constants
#[derive(Debug, Clone, Copy)]
pub struct TankStats {
    /// Forward/reverse speed in units per second
    pub move_speed: f32,
    /// Hull turn rate in radians per second
    pub turn_rate: f32,
    /// Movement speed multiplier while the boost is active
    pub boost_multiplier: f32,
    /// Boost duration in ticks
    pub boost_duration: u32,
    /// Ticks from one boost activation until the next is allowed.
    /// Must stay >= boost_duration: the activation gate only checks the
    /// cooldown, so a shorter value would re-arm a still-active boost.
    pub boost_cooldown: u32,
    /// Ticks between shots
    pub fire_interval: u32,
    /// Shell spawn distance from the hull center, along the turret
    pub muzzle_offset: f32,
    /// Shell muzzle speed in units per second
    pub shell_speed: f32,
}

impl Default for TankStats {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            turn_rate: PI, // half a turn per second
            boost_multiplier: 2.0,
            boost_duration: 3 * SIMULATION_TPS,
            boost_cooldown: 5 * SIMULATION_TPS,
            fire_interval: SIMULATION_TPS,
            muzzle_offset: 1.2,
            shell_speed: 20.0,
        }
    }
}

/// A player-controlled tank.
///
/// Owns the turret angle and the fire/boost timers; position and hull
/// facing live in the shared body and change only through commands.
pub struct Tank {
    body: UnitBody,
    stats: TankStats,
    /// Turret aim in radians, cosmetic/targeting only
    turret_rotation: f32,
    /// Ticks until the cannon can fire again (0 = ready)
    fire_cooldown: u32,
    boost_active: bool,
    /// Remaining boost duration in ticks
    boost_timer: u32,
    /// Ticks until the boost can be activated again
    boost_cooldown: u32,
}

impl Tank {
    pub fn new(id: Uuid, player_id: Uuid, x: f32, y: f32, rotation: f32) -> Self {
        Self {
            body: UnitBody::new(id, player_id, x, y, rotation),
            stats: TankStats::default(),
            turret_rotation: rotation,
            fire_cooldown: 0,
            boost_active: false,
            boost_timer: 0,
            boost_cooldown: 0,
        }
    }

    /// Activation gate for the speed boost. Runs before movement so an
    /// activation affects the same tick's displacement. The gate only
    /// checks the cooldown; see `TankStats::boost_cooldown`.
    fn try_activate_boost(&mut self, input: Option<&InputState>) {
        let held = input.map(|i| i.boost).unwrap_or(false);
        if held && self.boost_cooldown == 0 {
            self.boost_timer = self.stats.boost_duration;
            self.boost_cooldown = self.stats.boost_cooldown;
            self.boost_active = true;
        }
    }

    /// Integrate held movement keys into move/rotate commands.
    ///
    /// Opposing keys cancel. A blocked candidate position drops the move
    /// entirely (no sliding); the rotate command is emitted regardless,
    /// and so is the move command when unblocked, even at zero
    /// displacement.
    fn drive(
        &mut self,
        input: &InputState,
        obstacles: &dyn ObstacleQuery,
        commands: &mut Vec<UnitCommand>,
    ) {
        let dt = tick_delta();

        let mut offset = 0.0_f32;
        if input.forward {
            offset += 1.0;
        }
        if input.backward {
            offset -= 1.0;
        }

        let mut speed = self.stats.move_speed;
        if self.boost_active {
            speed *= self.stats.boost_multiplier;
        }

        let (dx, dy) = rotate_vec(0.0, offset * speed * dt, self.body.rotation);
        let x = self.body.x + dx;
        let y = self.body.y + dy;
        if !obstacles.is_blocked(x, y) {
            commands.push(UnitCommand::Move {
                unit_id: self.body.id,
                x,
                y,
            });
        }

        let mut turn = 0.0_f32;
        if input.turn_left {
            turn += 1.0;
        }
        if input.turn_right {
            turn -= 1.0;
        }
        commands.push(UnitCommand::Rotate {
            unit_id: self.body.id,
            rotation: self.body.rotation + turn * self.stats.turn_rate * dt,
        });
    }

    /// Point the turret at the cursor. A cursor on top of the unit snaps
    /// the turret to the hull facing.
    fn track_cursor(&mut self, input: &InputState) {
        let dx = input.cursor_x - self.body.x;
        let dy = input.cursor_y - self.body.y;
        if dx.hypot(dy) < AIM_EPSILON {
            self.turret_rotation = self.body.rotation;
        } else {
            // atan2 measures from +X; turret angles measure from +Y
            self.turret_rotation = dy.atan2(dx) - FRAC_PI_2;
        }
    }

    /// Fire check followed by the unconditional cooldown tick. The shell
    /// leaves the muzzle along the turret, inheriting the unit's damage
    /// multiplier; only a successful shot resets the cooldown.
    fn update_fire(&mut self, input: Option<&InputState>, commands: &mut Vec<UnitCommand>) {
        if self.fire_cooldown == 0 {
            if let Some(input) = input {
                if input.fire {
                    let (mx, my) = rotate_vec(0.0, self.stats.muzzle_offset, self.turret_rotation);
                    let (vel_x, vel_y) =
                        rotate_vec(0.0, self.stats.shell_speed, self.turret_rotation);
                    commands.push(UnitCommand::SpawnShell {
                        shooter_id: self.body.id,
                        x: self.body.x + mx,
                        y: self.body.y + my,
                        rotation: self.turret_rotation,
                        damage_scale: self.body.damage_scale,
                        vel_x,
                        vel_y,
                    });
                    self.fire_cooldown = self.stats.fire_interval;
                }
            }
        }
        if self.fire_cooldown > 0 {
            self.fire_cooldown -= 1;
        }
    }

    /// Advance the boost timers at the end of the tick. The active timer
    /// expiring flips the boost off; the cooldown runs regardless of
    /// activity.
    fn advance_boost_timers(&mut self) {
        if self.boost_active {
            self.boost_timer = self.boost_timer.saturating_sub(1);
            if self.boost_timer == 0 {
                self.boost_active = false;
            }
        }
        if self.boost_cooldown > 0 {
            self.boost_cooldown -= 1;
        }
    }
}

impl Unit for Tank {
    fn body(&self) -> &UnitBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut UnitBody {
        &mut self.body
    }

    fn update(
        &mut self,
        input: Option<&InputState>,
        obstacles: &dyn ObstacleQuery,
        commands: &mut Vec<UnitCommand>,
    ) {
        self.try_activate_boost(input);
        if let Some(input) = input {
            self.drive(input, obstacles, commands);
            self.track_cursor(input);
        }
        self.update_fire(input, commands);
        self.advance_boost_timers();
    }

    fn is_hit(&self, x: f32, y: f32) -> bool {
        let (lx, ly) = self.body.world_to_local(x, y);
        lx > -HULL_HALF_WIDTH && lx < HULL_HALF_WIDTH && ly > -HULL_REAR && ly < HULL_FRONT
    }

    fn aim_rotation(&self) -> f32 {
        self.turret_rotation
    }

    fn unit_name(&self) -> &'static str {
        "Vanguard"
    }

    fn author(&self) -> &'static str {
        "Tank Arena Team"
    }
}
