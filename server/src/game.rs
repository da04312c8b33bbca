//! Authoritative simulation.
//!
//! [`GameState`] owns the world plus the per-player bookkeeping the world
//! itself does not carry (latest command, cooldowns, powerup charges,
//! respawn timers). One call to [`GameState::tick`] advances everything by
//! one frame; the caller then serialises the frame with
//! [`GameState::frame_lines`] and finishes it with [`GameState::end_frame`].

use crate::physics;
use crate::settings::{Settings, PROJECTILE_CLEARANCE};
use crate::spawn;
use crate::world::World;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    push_line, Beam, Command, Firing, Movement, Powerup, Projectile, ProtocolError, Tank,
    Vector2D,
};
use std::collections::BTreeMap;

/// Frames a tank must wait between beams.
pub const BEAM_COOLDOWN_FRAMES: u32 = 25;

/// Server-side state for one player that is never sent over the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerState {
    /// Most recent command; replaced whenever a new one arrives
    pub command: Option<Command>,
    /// Frames since the last projectile
    pub projectile_cooldown: u32,
    /// Frames since the last beam
    pub beam_cooldown: u32,
    /// Collected powerups, each good for one beam
    pub charges: u32,
    /// Frames spent dead, once the death frame has been broadcast
    pub death_timer: Option<u32>,
}

pub struct GameState {
    pub tick: u64,
    settings: Settings,
    world: World,
    players: BTreeMap<u32, PlayerState>,
    /// Beams fired this frame; cleared by `end_frame`
    beams: Vec<Beam>,
    next_projectile_id: u32,
    next_beam_id: u32,
    next_powerup_id: u32,
    /// Frames elapsed since the last powerup spawn
    powerup_frames: u32,
    rng: StdRng,
}

impl GameState {
    pub fn new(settings: Settings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Builds a game with a caller-supplied RNG, for reproducible runs.
    pub fn with_rng(settings: Settings, rng: StdRng) -> Self {
        let world = World::new(settings.universe_size, settings.build_walls());
        Self {
            tick: 0,
            settings,
            world,
            players: BTreeMap::new(),
            beams: Vec::new(),
            next_projectile_id: 0,
            next_beam_id: 0,
            next_powerup_id: 0,
            powerup_frames: 0,
            rng,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn player(&self, id: u32) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// Creates a full-health tank at a random open spot and starts tracking
    /// the player. The first shot is available immediately.
    pub fn add_player(&mut self, id: u32, name: &str) -> Tank {
        let location = self.open_location();
        let tank = Tank::new(id, name, location, self.settings.max_hit_points);

        info!(
            "Added player {} ({:?}) at ({}, {})",
            id, name, location.x, location.y
        );
        self.world.add_tank(tank.clone());
        self.players.insert(
            id,
            PlayerState {
                projectile_cooldown: self.settings.frames_per_shot,
                ..PlayerState::default()
            },
        );

        tank
    }

    pub fn remove_player(&mut self, id: u32) {
        self.players.remove(&id);
        if self.world.remove_tank(id).is_some() {
            info!("Removed player {}", id);
        }
    }

    /// Stores `command` as the player's latest input. Returns false if the
    /// player is unknown or already disconnected.
    pub fn set_command(&mut self, id: u32, command: Command) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.command = Some(command);
                true
            }
            None => false,
        }
    }

    pub fn mark_disconnected(&mut self, id: u32) {
        match self.world.tank_mut(id) {
            Some(tank) => tank.disconnected = true,
            None => debug_assert!(false, "disconnect for unknown tank {}", id),
        }
    }

    /// Advances the simulation by one frame.
    pub fn tick(&mut self) {
        self.update_lifecycles();
        self.apply_commands();
        self.update_projectiles();
        self.spawn_powerups();
        self.advance_cooldowns();
        self.tick += 1;
    }

    /// Serialises the frame: beams, then projectiles, then tanks, then
    /// powerups, one JSON object per line.
    pub fn frame_lines(&self) -> Result<String, ProtocolError> {
        let mut frame = String::new();
        for beam in &self.beams {
            push_line(&mut frame, beam)?;
        }
        for projectile in self.world.projectiles() {
            push_line(&mut frame, projectile)?;
        }
        for tank in self.world.tanks() {
            push_line(&mut frame, tank)?;
        }
        for powerup in self.world.powerups() {
            push_line(&mut frame, powerup)?;
        }
        Ok(frame)
    }

    /// Runs once the frame has been broadcast: beams expire, entities
    /// reported dead are dropped and join flags are cleared.
    pub fn end_frame(&mut self) {
        self.beams.clear();
        let (projectiles, powerups) = self.world.purge_dead();
        if projectiles + powerups > 0 {
            debug!(
                "Purged {} projectiles and {} powerups",
                projectiles, powerups
            );
        }
        for tank in self.world.tanks_mut() {
            tank.joined = false;
        }
    }

    fn open_location(&mut self) -> Vector2D {
        spawn::open_location(
            &mut self.rng,
            self.settings.universe_size,
            self.world.walls(),
            self.settings.wall_size as f64,
            self.settings.tank_clearance(),
        )
    }

    /// Disconnect handling and respawn timers.
    fn update_lifecycles(&mut self) {
        let mut respawns = Vec::new();

        for id in self.world.tank_ids() {
            let Some(tank) = self.world.tank_mut(id) else {
                continue;
            };

            if tank.disconnected {
                tank.hit_points = 0;
                tank.died = true;
                self.players.remove(&id);
                continue;
            }

            if tank.is_alive() {
                continue;
            }

            let Some(player) = self.players.get_mut(&id) else {
                debug_assert!(false, "tank {} has no player state", id);
                continue;
            };

            // The death frame has gone out; start counting.
            let timer = match player.death_timer {
                None => {
                    tank.died = false;
                    0
                }
                Some(t) => t + 1,
            };

            if timer >= self.settings.respawn_rate {
                player.death_timer = None;
                respawns.push(id);
            } else {
                player.death_timer = Some(timer);
            }
        }

        for id in respawns {
            let location = self.open_location();
            if let Some(tank) = self.world.tank_mut(id) {
                tank.location = location;
                tank.hit_points = self.settings.max_hit_points;
                debug!("Tank {} respawned at ({}, {})", id, location.x, location.y);
            }
        }
    }

    fn apply_commands(&mut self) {
        let ids: Vec<u32> = self
            .players
            .iter()
            .filter(|(_, player)| player.command.is_some())
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            self.apply_command(id);
        }
    }

    fn apply_command(&mut self, id: u32) {
        let Some(command) = self.players.get(&id).and_then(|p| p.command.clone()) else {
            return;
        };
        let Some(tank) = self.world.tank(id) else {
            debug_assert!(false, "player {} has no tank", id);
            return;
        };
        if !tank.is_alive() {
            return;
        }
        let (location, aiming) = (tank.location, tank.aiming);

        match command.firing {
            Firing::Alt => self.fire_beam(id, location, aiming),
            Firing::Main => self.fire_projectile(id, location, command.turret_direction),
            Firing::None => {}
        }

        self.move_tank(id, &command);
        self.collect_powerups(id);
    }

    fn fire_beam(&mut self, id: u32, origin: Vector2D, direction: Vector2D) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.charges == 0 || player.beam_cooldown < BEAM_COOLDOWN_FRAMES {
            return;
        }
        player.charges -= 1;
        player.beam_cooldown = 0;

        let beam = Beam {
            id: self.next_beam_id,
            origin,
            direction,
            owner: id,
        };
        self.next_beam_id = self.next_beam_id.wrapping_add(1);

        self.resolve_beam(&beam);
        self.beams.push(beam);
    }

    /// Destroys every living tank the beam's ray passes through, crediting
    /// the shooter once per kill.
    fn resolve_beam(&mut self, beam: &Beam) {
        let radius = self.settings.tank_radius();
        let victims: Vec<u32> = self
            .world
            .tanks()
            .filter(|t| t.id != beam.owner && t.is_alive())
            .filter(|t| physics::ray_hits_circle(beam.origin, beam.direction, t.location, radius))
            .map(|t| t.id)
            .collect();

        for victim in &victims {
            if let Some(tank) = self.world.tank_mut(*victim) {
                tank.hit_points = 0;
                tank.died = true;
                debug!("Beam from tank {} destroyed tank {}", beam.owner, victim);
            }
        }

        if let Some(shooter) = self.world.tank_mut(beam.owner) {
            shooter.score += victims.len() as u32;
        }
    }

    fn fire_projectile(&mut self, id: u32, location: Vector2D, direction: Vector2D) {
        let frames_per_shot = self.settings.frames_per_shot;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.projectile_cooldown < frames_per_shot {
            return;
        }
        player.projectile_cooldown = 0;

        let projectile = Projectile {
            id: self.next_projectile_id,
            location,
            direction: direction.normalize(),
            died: false,
            owner: id,
        };
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        self.world.add_projectile(projectile);
    }

    fn move_tank(&mut self, id: u32, command: &Command) {
        let velocity = command.movement.velocity();
        let Some(current) = self.world.tank(id).map(|t| t.location) else {
            return;
        };

        let destination = current + velocity * self.settings.engine_strength;
        let blocked = physics::collides_with_walls(
            destination,
            self.world.walls(),
            self.settings.wall_size as f64,
            self.settings.tank_clearance(),
        );
        let half_world = self.settings.half_world();

        let Some(tank) = self.world.tank_mut(id) else {
            return;
        };
        if command.movement != Movement::None {
            tank.orientation = velocity;
        }
        tank.aiming = command.turret_direction.normalize();
        if !blocked {
            tank.location = destination;
        }
        tank.location = physics::wrap_position(tank.location, half_world);
    }

    fn collect_powerups(&mut self, id: u32) {
        let Some(location) = self.world.tank(id).map(|t| t.location) else {
            return;
        };

        let mut collected = 0;
        for powerup in self.world.powerups_mut() {
            if !powerup.died && physics::within_proximity(powerup.location, location) {
                powerup.died = true;
                collected += 1;
            }
        }

        if collected > 0 {
            if let Some(player) = self.players.get_mut(&id) {
                player.charges += collected;
                debug!("Tank {} now holds {} charges", id, player.charges);
            }
        }
    }

    fn update_projectiles(&mut self) {
        let half_world = self.settings.half_world();
        let wall_size = self.settings.wall_size as f64;
        let speed = self.settings.projectile_speed;

        for id in self.world.projectile_ids() {
            let Some((location, owner)) = self
                .world
                .projectile(id)
                .filter(|p| !p.died)
                .map(|p| (p.location, p.owner))
            else {
                continue;
            };

            let dead = physics::out_of_bounds(location, half_world)
                || self.projectile_hits_tank(location, owner)
                || physics::collides_with_walls(
                    location,
                    self.world.walls(),
                    wall_size,
                    PROJECTILE_CLEARANCE,
                );

            if let Some(projectile) = self.world.projectile_mut(id) {
                if dead {
                    projectile.died = true;
                } else {
                    projectile.location += projectile.direction * speed;
                }
            }
        }
    }

    /// Damages the first living non-owner tank overlapping `location`.
    fn projectile_hits_tank(&mut self, location: Vector2D, owner: u32) -> bool {
        let target = self
            .world
            .tanks()
            .find(|t| {
                t.id != owner && t.is_alive() && physics::within_proximity(location, t.location)
            })
            .map(|t| t.id);
        let Some(target) = target else {
            return false;
        };

        let mut destroyed = false;
        if let Some(tank) = self.world.tank_mut(target) {
            tank.hit_points = tank.hit_points.saturating_sub(1);
            if tank.hit_points == 0 {
                tank.died = true;
                destroyed = true;
            }
        }

        if destroyed {
            debug!("Projectile from tank {} destroyed tank {}", owner, target);
            if let Some(shooter) = self.world.tank_mut(owner) {
                shooter.score += 1;
            }
        }

        true
    }

    fn spawn_powerups(&mut self) {
        if self.world.live_powerup_count() >= self.settings.max_powerups {
            return;
        }

        let delay = self.rng.gen_range(0..self.settings.max_powerup_delay);
        if self.powerup_frames >= delay {
            let location = self.open_location();
            let powerup = Powerup {
                id: self.next_powerup_id,
                location,
                died: false,
            };
            self.next_powerup_id = self.next_powerup_id.wrapping_add(1);

            debug!(
                "Spawned powerup {} at ({}, {})",
                powerup.id, location.x, location.y
            );
            self.world.add_powerup(powerup);
            self.powerup_frames = 0;
        }
        self.powerup_frames += 1;
    }

    fn advance_cooldowns(&mut self) {
        for player in self.players.values_mut() {
            player.projectile_cooldown = player.projectile_cooldown.saturating_add(1);
            player.beam_cooldown = player.beam_cooldown.saturating_add(1);
        }
    }
}
