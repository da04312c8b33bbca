//! Wire-level types shared by the TankWars server and its clients.
//!
//! - [`vector`]: the 2D vector used for every position and direction
//! - [`entities`]: tanks, projectiles, powerups, beams, walls and commands
//! - [`protocol`]: the newline-delimited JSON codec and handshake helpers

pub mod entities;
pub mod protocol;
pub mod vector;

pub use entities::{Beam, Command, Firing, Movement, Powerup, Projectile, Tank, Wall};
pub use protocol::{
    decode_command, encode_handshake, encode_line, parse_handshake_value, push_line,
    select_command, LineBuffer, ProtocolError, ServerObject, MAX_LINE_LEN,
};
pub use vector::Vector2D;
