//! Collision geometry for the simulation.
//!
//! Walls are thick axis-aligned rectangles, tanks/projectiles/powerups are
//! compared with square bounding boxes, and beams are rays tested against
//! circles.

use shared::{Vector2D, Wall};

/// Half-width of the square used for tank-vs-projectile and
/// tank-vs-powerup overlap. Independent of the configured tank size.
pub const PROXIMITY_HALF_WIDTH: f64 = 30.0;

/// Returns true if `point` lies inside `wall` grown by `margin` on every
/// side. `margin` is half the wall width plus the caller's clearance.
///
/// Endpoints may come in either order for both horizontal and vertical
/// walls; the rectangle spans the smaller to the larger coordinate.
pub fn point_in_wall(point: Vector2D, wall: &Wall, margin: f64) -> bool {
    let (left, right) = min_max(wall.p1.x, wall.p2.x);
    let (top, bottom) = if wall.is_horizontal() {
        (wall.p1.y, wall.p1.y)
    } else {
        min_max(wall.p1.y, wall.p2.y)
    };

    left - margin <= point.x
        && point.x <= right + margin
        && top - margin <= point.y
        && point.y <= bottom + margin
}

/// Returns true if `point` collides with any wall, given the wall thickness
/// and an entity-specific clearance.
pub fn collides_with_walls(
    point: Vector2D,
    walls: &[Wall],
    wall_size: f64,
    clearance: f64,
) -> bool {
    let margin = wall_size / 2.0 + clearance;
    walls.iter().any(|wall| point_in_wall(point, wall, margin))
}

/// Axis-aligned square overlap with [`PROXIMITY_HALF_WIDTH`], inclusive.
pub fn within_proximity(a: Vector2D, b: Vector2D) -> bool {
    (a.x - b.x).abs() <= PROXIMITY_HALF_WIDTH && (a.y - b.y).abs() <= PROXIMITY_HALF_WIDTH
}

/// Returns true if either coordinate lies beyond half the world size.
pub fn out_of_bounds(point: Vector2D, half_world: f64) -> bool {
    point.x.abs() > half_world || point.y.abs() > half_world
}

/// Teleports an out-of-bounds position to one unit inside the opposite
/// edge, per axis. In-bounds positions are returned unchanged.
pub fn wrap_position(point: Vector2D, half_world: f64) -> Vector2D {
    let wrap = |v: f64| {
        if v > half_world {
            -half_world + 1.0
        } else if v < -half_world {
            half_world - 1.0
        } else {
            v
        }
    };

    Vector2D::new(wrap(point.x), wrap(point.y))
}

/// Ray/circle intersection.
///
/// Solves |O + tV - C|^2 = r^2 for t. A hit requires a non-negative
/// discriminant and both roots strictly positive, i.e. the whole circle lies
/// ahead of the origin. A ray starting inside the circle does not hit.
pub fn ray_hits_circle(
    origin: Vector2D,
    direction: Vector2D,
    center: Vector2D,
    radius: f64,
) -> bool {
    let to_origin = origin - center;
    let a = direction.dot(&direction);
    let b = (to_origin * 2.0).dot(&direction);
    let c = to_origin.dot(&to_origin) - radius * radius;

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return false;
    }

    // Only the signs matter, so the division by 2a is skipped.
    let root1 = -b + disc.sqrt();
    let root2 = -b - disc.sqrt();
    root1 > 0.0 && root2 > 0.0
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal(reversed: bool) -> Wall {
        let (a, b) = (Vector2D::new(-100.0, 0.0), Vector2D::new(100.0, 0.0));
        if reversed {
            Wall::new(0, b, a)
        } else {
            Wall::new(0, a, b)
        }
    }

    fn vertical(reversed: bool) -> Wall {
        let (a, b) = (Vector2D::new(0.0, -100.0), Vector2D::new(0.0, 100.0));
        if reversed {
            Wall::new(1, b, a)
        } else {
            Wall::new(1, a, b)
        }
    }

    #[test]
    fn test_horizontal_wall_both_endpoint_orders() {
        for reversed in [false, true] {
            let wall = horizontal(reversed);
            assert!(point_in_wall(Vector2D::new(0.0, 0.0), &wall, 25.0));
            assert!(point_in_wall(Vector2D::new(125.0, 25.0), &wall, 25.0));
            assert!(!point_in_wall(Vector2D::new(126.0, 0.0), &wall, 25.0));
            assert!(!point_in_wall(Vector2D::new(0.0, -26.0), &wall, 25.0));
        }
    }

    #[test]
    fn test_vertical_wall_both_endpoint_orders() {
        for reversed in [false, true] {
            let wall = vertical(reversed);
            assert!(point_in_wall(Vector2D::new(0.0, 0.0), &wall, 25.0));
            assert!(point_in_wall(Vector2D::new(-25.0, -125.0), &wall, 25.0));
            assert!(!point_in_wall(Vector2D::new(0.0, 126.0), &wall, 25.0));
            assert!(!point_in_wall(Vector2D::new(26.0, 0.0), &wall, 25.0));
        }
    }

    #[test]
    fn test_single_point_wall() {
        let wall = Wall::new(2, Vector2D::new(10.0, 10.0), Vector2D::new(10.0, 10.0));
        assert!(point_in_wall(Vector2D::new(30.0, -10.0), &wall, 20.0));
        assert!(!point_in_wall(Vector2D::new(31.0, 10.0), &wall, 20.0));
    }

    #[test]
    fn test_collides_with_walls_adds_half_wall_size() {
        let walls = vec![horizontal(false)];
        // margin = 50 / 2 + 30 = 55
        assert!(collides_with_walls(Vector2D::new(0.0, 55.0), &walls, 50.0, 30.0));
        assert!(!collides_with_walls(Vector2D::new(0.0, 55.5), &walls, 50.0, 30.0));
        assert!(!collides_with_walls(Vector2D::new(0.0, 0.0), &[], 50.0, 30.0));
    }

    #[test]
    fn test_wall_check_is_deterministic() {
        let walls = vec![horizontal(false), vertical(true)];
        let samples = [
            Vector2D::new(54.0, 54.0),
            Vector2D::new(-130.0, 0.0),
            Vector2D::new(0.0, 160.0),
        ];
        for p in samples {
            let first = collides_with_walls(p, &walls, 50.0, 30.0);
            let second = collides_with_walls(p, &walls, 50.0, 30.0);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_proximity_is_square_not_circle() {
        let origin = Vector2D::ZERO;
        // Corner of the square lies outside a radius-30 circle but still counts.
        assert!(within_proximity(origin, Vector2D::new(30.0, 30.0)));
        assert!(within_proximity(origin, Vector2D::new(-30.0, 0.0)));
        assert!(!within_proximity(origin, Vector2D::new(30.1, 0.0)));
    }

    #[test]
    fn test_out_of_bounds() {
        assert!(!out_of_bounds(Vector2D::new(1000.0, -1000.0), 1000.0));
        assert!(out_of_bounds(Vector2D::new(1000.5, 0.0), 1000.0));
        assert!(out_of_bounds(Vector2D::new(0.0, -1001.0), 1000.0));
    }

    #[test]
    fn test_wrap_position() {
        assert_eq!(
            wrap_position(Vector2D::new(1002.0, 5.0), 1000.0),
            Vector2D::new(-999.0, 5.0)
        );
        assert_eq!(
            wrap_position(Vector2D::new(-5.0, -1003.0), 1000.0),
            Vector2D::new(-5.0, 999.0)
        );
        assert_eq!(
            wrap_position(Vector2D::new(12.0, 34.0), 1000.0),
            Vector2D::new(12.0, 34.0)
        );
    }

    #[test]
    fn test_ray_hits_circle_ahead() {
        let origin = Vector2D::ZERO;
        let dir = Vector2D::new(1.0, 0.0);
        assert!(ray_hits_circle(origin, dir, Vector2D::new(200.0, 10.0), 30.0));
    }

    #[test]
    fn test_ray_misses_circle_behind_or_aside() {
        let origin = Vector2D::ZERO;
        let dir = Vector2D::new(1.0, 0.0);
        assert!(!ray_hits_circle(origin, dir, Vector2D::new(-200.0, 0.0), 30.0));
        assert!(!ray_hits_circle(origin, dir, Vector2D::new(200.0, 31.0), 30.0));
    }

    #[test]
    fn test_ray_from_inside_circle_does_not_hit() {
        let origin = Vector2D::ZERO;
        let dir = Vector2D::new(0.0, -1.0);
        assert!(!ray_hits_circle(origin, dir, Vector2D::new(5.0, 5.0), 30.0));
    }
}
