//! Random placement of tanks and powerups.

use crate::physics::collides_with_walls;
use rand::Rng;
use shared::{Vector2D, Wall};

/// Draws integer points uniformly from `[-half, half)` on both axes until
/// one clears every wall by `clearance`.
///
/// There is no attempt limit; maps are expected to leave most of the world
/// open.
pub fn open_location<R: Rng + ?Sized>(
    rng: &mut R,
    world_size: u32,
    walls: &[Wall],
    wall_size: f64,
    clearance: f64,
) -> Vector2D {
    let half = (world_size / 2).max(1) as i64;

    loop {
        let candidate = Vector2D::new(
            rng.gen_range(-half..half) as f64,
            rng.gen_range(-half..half) as f64,
        );
        if !collides_with_walls(candidate, walls, wall_size, clearance) {
            return candidate;
        }
    }
}
