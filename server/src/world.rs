//! In-memory entity store.
//!
//! Entities are keyed by ID in ordered maps so iteration (and therefore the
//! order of every broadcast frame) is stable. The world does no locking of
//! its own; the owning session serialises access.

use shared::{Powerup, Projectile, Tank, Wall};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct World {
    size: u32,
    tanks: BTreeMap<u32, Tank>,
    projectiles: BTreeMap<u32, Projectile>,
    powerups: BTreeMap<u32, Powerup>,
    walls: Vec<Wall>,
}

impl World {
    pub fn new(size: u32, walls: Vec<Wall>) -> Self {
        Self {
            size,
            tanks: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            powerups: BTreeMap::new(),
            walls,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn add_tank(&mut self, tank: Tank) {
        debug_assert!(
            !self.tanks.contains_key(&tank.id),
            "tank {} already in world",
            tank.id
        );
        self.tanks.insert(tank.id, tank);
    }

    pub fn remove_tank(&mut self, id: u32) -> Option<Tank> {
        self.tanks.remove(&id)
    }

    pub fn tank(&self, id: u32) -> Option<&Tank> {
        self.tanks.get(&id)
    }

    pub fn tank_mut(&mut self, id: u32) -> Option<&mut Tank> {
        self.tanks.get_mut(&id)
    }

    pub fn tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.values()
    }

    pub fn tanks_mut(&mut self) -> impl Iterator<Item = &mut Tank> {
        self.tanks.values_mut()
    }

    pub fn tank_ids(&self) -> Vec<u32> {
        self.tanks.keys().copied().collect()
    }

    pub fn add_projectile(&mut self, projectile: Projectile) {
        self.projectiles.insert(projectile.id, projectile);
    }

    pub fn projectile(&self, id: u32) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn projectile_mut(&mut self, id: u32) -> Option<&mut Projectile> {
        self.projectiles.get_mut(&id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn projectile_ids(&self) -> Vec<u32> {
        self.projectiles.keys().copied().collect()
    }

    pub fn add_powerup(&mut self, powerup: Powerup) {
        self.powerups.insert(powerup.id, powerup);
    }

    pub fn powerups(&self) -> impl Iterator<Item = &Powerup> {
        self.powerups.values()
    }

    pub fn powerups_mut(&mut self) -> impl Iterator<Item = &mut Powerup> {
        self.powerups.values_mut()
    }

    /// Powerups not yet collected.
    pub fn live_powerup_count(&self) -> usize {
        self.powerups.values().filter(|p| !p.died).count()
    }

    /// Drops projectiles and powerups flagged dead. Returns how many of each
    /// were removed.
    pub fn purge_dead(&mut self) -> (usize, usize) {
        let projectiles_before = self.projectiles.len();
        let powerups_before = self.powerups.len();

        self.projectiles.retain(|_, p| !p.died);
        self.powerups.retain(|_, p| !p.died);

        (
            projectiles_before - self.projectiles.len(),
            powerups_before - self.powerups.len(),
        )
    }
}
