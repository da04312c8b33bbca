//! Static game configuration.
//!
//! Settings are read once at startup from a JSON document. The four timing
//! fields are mandatory; everything else falls back to the stock game rules.

use serde::{Deserialize, Serialize};
use shared::{Vector2D, Wall};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Extra margin around walls for projectiles, beyond half the wall width.
pub const PROJECTILE_CLEARANCE: f64 = 10.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("setting '{0}' must be greater than zero")]
    Zero(&'static str),

    #[error("wall {index} is neither horizontal nor vertical")]
    DiagonalWall { index: usize },
}

/// A wall as written in the settings file, before it is assigned an ID.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub p1: Vector2D,
    pub p2: Vector2D,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Side length of the square world, centred on the origin
    pub universe_size: u32,
    pub ms_per_frame: u64,
    pub frames_per_shot: u32,
    /// Frames a destroyed tank waits before respawning
    pub respawn_rate: u32,
    #[serde(default = "default_max_hit_points")]
    pub max_hit_points: u32,
    #[serde(default = "default_projectile_speed")]
    pub projectile_speed: f64,
    /// Tank speed in units per frame
    #[serde(default = "default_engine_strength")]
    pub engine_strength: f64,
    #[serde(default = "default_tank_size")]
    pub tank_size: u32,
    #[serde(default = "default_wall_size")]
    pub wall_size: u32,
    #[serde(default = "default_max_powerups")]
    pub max_powerups: usize,
    /// Exclusive upper bound of the random powerup spawn delay, in frames
    #[serde(default = "default_max_powerup_delay")]
    pub max_powerup_delay: u32,
    #[serde(default)]
    pub walls: Vec<WallSegment>,
}

fn default_max_hit_points() -> u32 {
    3
}

fn default_projectile_speed() -> f64 {
    25.0
}

fn default_engine_strength() -> f64 {
    3.0
}

fn default_tank_size() -> u32 {
    60
}

fn default_wall_size() -> u32 {
    50
}

fn default_max_powerups() -> usize {
    2
}

fn default_max_powerup_delay() -> u32 {
    1650
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            universe_size: 2000,
            ms_per_frame: 17,
            frames_per_shot: 80,
            respawn_rate: 300,
            max_hit_points: default_max_hit_points(),
            projectile_speed: default_projectile_speed(),
            engine_strength: default_engine_strength(),
            tank_size: default_tank_size(),
            wall_size: default_wall_size(),
            max_powerups: default_max_powerups(),
            max_powerup_delay: default_max_powerup_delay(),
            walls: Vec::new(),
        }
    }
}

impl Settings {
    /// Reads and validates a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses and validates settings from JSON.
    pub fn from_json_str(s: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.universe_size == 0 {
            return Err(SettingsError::Zero("universe_size"));
        }
        if self.ms_per_frame == 0 {
            return Err(SettingsError::Zero("ms_per_frame"));
        }
        if self.max_powerup_delay == 0 {
            return Err(SettingsError::Zero("max_powerup_delay"));
        }

        for (index, segment) in self.walls.iter().enumerate() {
            if segment.p1.x != segment.p2.x && segment.p1.y != segment.p2.y {
                return Err(SettingsError::DiagonalWall { index });
            }
        }

        Ok(())
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.ms_per_frame)
    }

    /// Half the side length of the world.
    pub fn half_world(&self) -> f64 {
        self.universe_size as f64 / 2.0
    }

    /// Margin a tank keeps from a wall's edge.
    pub fn tank_clearance(&self) -> f64 {
        self.tank_size as f64 / 2.0
    }

    /// Radius used when testing beams against tanks.
    pub fn tank_radius(&self) -> f64 {
        self.tank_size as f64 / 2.0
    }

    /// Walls with IDs assigned in file order.
    pub fn build_walls(&self) -> Vec<Wall> {
        self.walls
            .iter()
            .enumerate()
            .map(|(id, segment)| Wall::new(id as u32, segment.p1, segment.p2))
            .collect()
    }
}
