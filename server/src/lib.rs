//! # TankWars Server Library
//!
//! Authoritative server for the TankWars arena. The server owns the only
//! true copy of the world: clients send commands, the server simulates at a
//! fixed frame rate and streams every frame back as newline-delimited JSON.
//!
//! ## Module Organization
//!
//! ### Settings (`settings`)
//! Startup configuration loaded from a JSON file: world size, frame timing,
//! game rules and the wall layout.
//!
//! ### World and Physics (`world`, `physics`, `spawn`)
//! The entity store keyed by ID, the collision geometry (thick walls, square
//! proximity boxes, beam rays) and random placement of new entities.
//!
//! ### Game (`game`)
//! One frame of simulation: respawns, command application, projectile
//! flight, powerup spawning and cooldowns.
//!
//! ### Client Manager (`client_manager`)
//! Registry of connected clients, their outbound channels and the
//! three-step disconnect sequence.
//!
//! ### Network (`network`)
//! The TCP accept loop, per-connection handshake and reader/writer tasks,
//! and the fixed-rate tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::settings::Settings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("settings.json")?;
//!     let server = Server::bind("0.0.0.0:11000", settings).await?;
//!
//!     // Runs the tick loop and accepts clients until the process exits.
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
pub mod physics;
pub mod settings;
pub mod spawn;
pub mod world;
