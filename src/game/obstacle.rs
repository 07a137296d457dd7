//! Obstacle map and position-feasibility queries

/// Collision-feasibility check for a candidate unit position.
///
/// Pure and synchronous; called from inside the tick, so implementations
/// must not block or mutate state.
pub trait ObstacleQuery {
    /// Whether a unit may NOT occupy the given world-space position
    fn is_blocked(&self, x: f32, y: f32) -> bool;
}

/// Axis-aligned rectangular obstacle
#[derive(Debug, Clone, Copy)]
pub struct Block {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Block {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// The battlefield: a square play area with fixed block obstacles.
/// Anything outside the square counts as blocked.
#[derive(Debug, Clone)]
pub struct ArenaMap {
    /// Half the side length of the play area
    pub half_extent: f32,
    pub blocks: Vec<Block>,
}

impl Default for ArenaMap {
    fn default() -> Self {
        Self {
            half_extent: 10.0,
            blocks: vec![
                Block {
                    min_x: -1.0,
                    min_y: -0.5,
                    max_x: 1.0,
                    max_y: 0.5,
                },
                Block {
                    min_x: -4.5,
                    min_y: 3.0,
                    max_x: -2.5,
                    max_y: 4.0,
                },
                Block {
                    min_x: 2.5,
                    min_y: -4.0,
                    max_x: 4.5,
                    max_y: -3.0,
                },
            ],
        }
    }
}

impl ObstacleQuery for ArenaMap {
    fn is_blocked(&self, x: f32, y: f32) -> bool {
        if x < -self.half_extent
            || x > self.half_extent
            || y < -self.half_extent
            || y > self.half_extent
        {
            return true;
        }
        self.blocks.iter().any(|b| b.contains(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ground_is_not_blocked() {
        let map = ArenaMap::default();
        assert!(!map.is_blocked(-7.0, -7.0));
        assert!(!map.is_blocked(5.0, 5.0));
    }

    #[test]
    fn outside_play_area_is_blocked() {
        let map = ArenaMap::default();
        assert!(map.is_blocked(10.5, 0.0));
        assert!(map.is_blocked(0.0, -10.5));
        assert!(map.is_blocked(-11.0, 11.0));
    }

    #[test]
    fn block_interior_and_edges_are_blocked() {
        let map = ArenaMap::default();
        assert!(map.is_blocked(0.0, 0.0));
        assert!(map.is_blocked(1.0, 0.5));
        assert!(map.is_blocked(-3.0, 3.5));
    }

    #[test]
    fn empty_map_blocks_only_the_boundary() {
        let map = ArenaMap {
            half_extent: 2.0,
            blocks: Vec::new(),
        };
        assert!(!map.is_blocked(0.0, 0.0));
        assert!(!map.is_blocked(1.9, -1.9));
        assert!(map.is_blocked(2.1, 0.0));
    }
}
