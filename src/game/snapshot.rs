//! Snapshot building for arena observers

use std::collections::HashMap;
use uuid::Uuid;

use super::protocol::{ArenaEvent, ArenaMsg, UnitSnapshot};
use super::unit::Unit;

/// Builds presentation snapshots at a fixed tick cadence
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (used for membership changes)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message from the current unit states
    pub fn build(
        &self,
        tick: u64,
        units: &HashMap<Uuid, Box<dyn Unit>>,
        events: Vec<ArenaEvent>,
    ) -> ArenaMsg {
        let units = units
            .values()
            .map(|unit| {
                let body = unit.body();
                UnitSnapshot {
                    unit_id: body.id,
                    player_id: body.player_id,
                    x: body.x,
                    y: body.y,
                    rotation: body.rotation,
                    aim_rotation: unit.aim_rotation(),
                }
            })
            .collect();

        ArenaMsg::Snapshot {
            tick,
            units,
            events,
        }
    }
}
