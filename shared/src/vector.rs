use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

///Represents a vector in 2D space.
///
/// World coordinates are centred on the origin; positive y points down,
/// matching the direction clients render "down" movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2D {
    ///Value along the x-axis.
    pub x: f64,
    ///Value along the y-axis.
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    /// The zero vector normalizes to itself.
    pub fn normalize(&self) -> Vector2D {
        let mag = self.length();
        if mag == 0.0 {
            Vector2D::ZERO
        } else {
            Vector2D {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the dot product of two vectors.
    pub fn dot(&self, other: &Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f64) -> Vector2D {
        Vector2D {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, other: Vector2D) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Vector2D {
        self.scale(scalar)
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D {
            x: -self.x,
            y: -self.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_length_and_normalize() {
        let v = Vector2D::new(3.0, 4.0);
        assert_approx_eq!(v.length(), 5.0);

        let n = v.normalize();
        assert_approx_eq!(n.x, 0.6);
        assert_approx_eq!(n.y, 0.8);
        assert_approx_eq!(n.length(), 1.0);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vector2D::ZERO.normalize(), Vector2D::ZERO);
    }

    #[test]
    fn test_dot_product() {
        let a = Vector2D::new(1.0, 2.0);
        let b = Vector2D::new(-3.0, 0.5);
        assert_approx_eq!(a.dot(&b), -2.0);
        assert_approx_eq!(a.dot(&Vector2D::new(-2.0, 1.0)), 0.0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Vector2D::new(1.0, -2.0);
        let b = Vector2D::new(0.5, 4.0);

        assert_eq!(a + b, Vector2D::new(1.5, 2.0));
        assert_eq!(a - b, Vector2D::new(0.5, -6.0));
        assert_eq!(a * 3.0, Vector2D::new(3.0, -6.0));
        assert_eq!(-a, Vector2D::new(-1.0, 2.0));

        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }

    #[test]
    fn test_serializes_as_xy_object() {
        let json = serde_json::to_string(&Vector2D::new(1.5, -2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.5,"y":-2.0}"#);
    }
}
