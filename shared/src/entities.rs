//! Entity records exchanged between the server and its clients.
//!
//! Field names on the wire are short tags (`loc`, `bdir`, `hp`, ...) that
//! existing clients depend on; the `serde` renames below are the protocol.

use crate::vector::Vector2D;
use serde::{Deserialize, Serialize};

/// A player's tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    /// Equal to the owning connection's player ID
    #[serde(rename = "tank")]
    pub id: u32,
    #[serde(rename = "loc")]
    pub location: Vector2D,
    /// Body orientation, set by the last movement command
    #[serde(rename = "bdir")]
    pub orientation: Vector2D,
    /// Turret aiming direction
    #[serde(rename = "tdir")]
    pub aiming: Vector2D,
    pub name: String,
    #[serde(rename = "hp")]
    pub hit_points: u32,
    pub score: u32,
    /// True only on the frame the tank is destroyed
    pub died: bool,
    #[serde(rename = "dc")]
    pub disconnected: bool,
    #[serde(rename = "join")]
    pub joined: bool,
}

impl Tank {
    pub fn new(id: u32, name: impl Into<String>, location: Vector2D, hit_points: u32) -> Self {
        Self {
            id,
            location,
            orientation: Vector2D::ZERO,
            aiming: Vector2D::new(0.0, -1.0),
            name: name.into(),
            hit_points,
            score: 0,
            died: false,
            disconnected: false,
            joined: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hit_points > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    #[serde(rename = "proj")]
    pub id: u32,
    #[serde(rename = "loc")]
    pub location: Vector2D,
    #[serde(rename = "dir")]
    pub direction: Vector2D,
    pub died: bool,
    /// ID of the tank that fired it
    pub owner: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Powerup {
    #[serde(rename = "power")]
    pub id: u32,
    #[serde(rename = "loc")]
    pub location: Vector2D,
    pub died: bool,
}

/// An instantaneous ray fired with a powerup charge. Only ever seen on the
/// frame it is fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    #[serde(rename = "beam")]
    pub id: u32,
    #[serde(rename = "org")]
    pub origin: Vector2D,
    #[serde(rename = "dir")]
    pub direction: Vector2D,
    pub owner: u32,
}

/// An axis-aligned wall segment between two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    #[serde(rename = "wall")]
    pub id: u32,
    pub p1: Vector2D,
    pub p2: Vector2D,
}

impl Wall {
    pub fn new(id: u32, p1: Vector2D, p2: Vector2D) -> Self {
        Self { id, p1, p2 }
    }

    pub fn is_horizontal(&self) -> bool {
        self.p1.y == self.p2.y
    }

    pub fn is_vertical(&self) -> bool {
        self.p1.x == self.p2.x
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Movement {
    /// Unit step for this movement; `None` yields the zero vector.
    pub fn velocity(&self) -> Vector2D {
        match self {
            Movement::None => Vector2D::ZERO,
            Movement::Up => Vector2D::new(0.0, -1.0),
            Movement::Down => Vector2D::new(0.0, 1.0),
            Movement::Left => Vector2D::new(-1.0, 0.0),
            Movement::Right => Vector2D::new(1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Firing {
    #[default]
    None,
    Main,
    Alt,
}

/// Client input for one frame. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    #[serde(rename = "moving")]
    pub movement: Movement,
    #[serde(rename = "fire")]
    pub firing: Firing,
    #[serde(rename = "tdir")]
    pub turret_direction: Vector2D,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            movement: Movement::None,
            firing: Firing::None,
            turret_direction: Vector2D::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn keys(json: &str) -> Vec<String> {
        let value: Value = serde_json::from_str(json).unwrap();
        let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_tank_wire_tags() {
        let tank = Tank::new(3, "alice", Vector2D::new(10.0, -20.0), 3);
        let json = serde_json::to_string(&tank).unwrap();
        assert_eq!(
            keys(&json),
            vec!["bdir", "dc", "died", "hp", "join", "loc", "name", "score", "tank", "tdir"]
        );
    }

    #[test]
    fn test_other_wire_tags() {
        let proj = Projectile {
            id: 1,
            location: Vector2D::ZERO,
            direction: Vector2D::new(1.0, 0.0),
            died: false,
            owner: 2,
        };
        assert_eq!(
            keys(&serde_json::to_string(&proj).unwrap()),
            vec!["died", "dir", "loc", "owner", "proj"]
        );

        let power = Powerup {
            id: 1,
            location: Vector2D::ZERO,
            died: false,
        };
        assert_eq!(
            keys(&serde_json::to_string(&power).unwrap()),
            vec!["died", "loc", "power"]
        );

        let beam = Beam {
            id: 1,
            origin: Vector2D::ZERO,
            direction: Vector2D::new(0.0, 1.0),
            owner: 4,
        };
        assert_eq!(
            keys(&serde_json::to_string(&beam).unwrap()),
            vec!["beam", "dir", "org", "owner"]
        );

        let wall = Wall::new(0, Vector2D::new(0.0, 0.0), Vector2D::new(0.0, 100.0));
        assert_eq!(
            keys(&serde_json::to_string(&wall).unwrap()),
            vec!["p1", "p2", "wall"]
        );
    }

    #[test]
    fn test_tank_roundtrip_preserves_fields() {
        let mut tank = Tank::new(7, "bob", Vector2D::new(-5.5, 12.25), 2);
        tank.orientation = Vector2D::new(1.0, 0.0);
        tank.aiming = Vector2D::new(0.6, 0.8);
        tank.score = 4;
        tank.died = true;
        tank.disconnected = true;

        let json = serde_json::to_string(&tank).unwrap();
        let decoded: Tank = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, tank);
    }

    #[test]
    fn test_command_parses_client_strings() {
        let cmd: Command =
            serde_json::from_str(r#"{"moving":"left","fire":"alt","tdir":{"x":0.0,"y":-1.0}}"#)
                .unwrap();
        assert_eq!(cmd.movement, Movement::Left);
        assert_eq!(cmd.firing, Firing::Alt);
        assert_eq!(cmd.turret_direction, Vector2D::new(0.0, -1.0));
    }

    #[test]
    fn test_command_missing_fields_default() {
        let cmd: Command = serde_json::from_str(r#"{"fire":"main"}"#).unwrap();
        assert_eq!(cmd.movement, Movement::None);
        assert_eq!(cmd.firing, Firing::Main);
        assert_eq!(cmd.turret_direction, Vector2D::ZERO);
    }

    #[test]
    fn test_command_rejects_unknown_movement() {
        let result = serde_json::from_str::<Command>(r#"{"moving":"sideways"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_movement_velocity() {
        assert_eq!(Movement::Up.velocity(), Vector2D::new(0.0, -1.0));
        assert_eq!(Movement::Down.velocity(), Vector2D::new(0.0, 1.0));
        assert_eq!(Movement::Left.velocity(), Vector2D::new(-1.0, 0.0));
        assert_eq!(Movement::Right.velocity(), Vector2D::new(1.0, 0.0));
        assert_eq!(Movement::None.velocity(), Vector2D::ZERO);
    }

    #[test]
    fn test_wall_orientation() {
        let h = Wall::new(0, Vector2D::new(-50.0, 0.0), Vector2D::new(50.0, 0.0));
        let v = Wall::new(1, Vector2D::new(0.0, 50.0), Vector2D::new(0.0, -50.0));
        assert!(h.is_horizontal() && !h.is_vertical());
        assert!(v.is_vertical() && !v.is_horizontal());
    }
}
