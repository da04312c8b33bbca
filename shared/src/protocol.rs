//! Newline-delimited JSON codec.
//!
//! Every message is one UTF-8 line terminated by `\n`. The handshake starts
//! with two bare integers (player ID, world size); everything after that is
//! one JSON object per line whose kind is identified by which tag key it
//! carries (`tank`, `proj`, `power`, `beam`, `wall`).

use crate::entities::{Beam, Command, Firing, Powerup, Projectile, Tank, Wall};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("object has no recognised type tag")]
    UnknownObject,

    #[error("invalid handshake value: {0:?}")]
    InvalidHandshake(String),
}

/// Any object the server streams to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerObject {
    Tank(Tank),
    Projectile(Projectile),
    Powerup(Powerup),
    Beam(Beam),
    Wall(Wall),
}

impl ServerObject {
    /// Decodes one line, dispatching on the tag key present in the object.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim_end())?;
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        let decoded = if object.contains_key("tank") {
            ServerObject::Tank(serde_json::from_value(value)?)
        } else if object.contains_key("proj") {
            ServerObject::Projectile(serde_json::from_value(value)?)
        } else if object.contains_key("power") {
            ServerObject::Powerup(serde_json::from_value(value)?)
        } else if object.contains_key("beam") {
            ServerObject::Beam(serde_json::from_value(value)?)
        } else if object.contains_key("wall") {
            ServerObject::Wall(serde_json::from_value(value)?)
        } else {
            return Err(ProtocolError::UnknownObject);
        };

        Ok(decoded)
    }

    pub fn id(&self) -> u32 {
        match self {
            ServerObject::Tank(t) => t.id,
            ServerObject::Projectile(p) => p.id,
            ServerObject::Powerup(p) => p.id,
            ServerObject::Beam(b) => b.id,
            ServerObject::Wall(w) => w.id,
        }
    }
}

/// Serializes a value as a single newline-terminated JSON line.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

/// Appends `value` as a JSON line to `out`.
pub fn push_line<T: Serialize>(out: &mut String, value: &T) -> Result<(), ProtocolError> {
    out.push_str(&serde_json::to_string(value)?);
    out.push('\n');
    Ok(())
}

/// Builds the server half of the handshake that precedes the player's own
/// tank: player ID, world size, then every wall.
pub fn encode_handshake(
    player_id: u32,
    world_size: u32,
    walls: &[Wall],
) -> Result<String, ProtocolError> {
    let mut out = format!("{}\n{}\n", player_id, world_size);
    for wall in walls {
        push_line(&mut out, wall)?;
    }
    Ok(out)
}

/// Parses one of the bare integer lines of the handshake.
pub fn parse_handshake_value(line: &str) -> Result<u32, ProtocolError> {
    let trimmed = line.trim();
    trimmed
        .parse()
        .map_err(|_| ProtocolError::InvalidHandshake(trimmed.to_string()))
}

pub fn decode_command(line: &str) -> Result<Command, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Reduces one read's worth of command lines to the single command to keep.
///
/// The first valid command wins unless a later one requests alt fire, in
/// which case the last such alt-fire command wins. Malformed lines are
/// skipped.
pub fn select_command<I, S>(lines: I) -> Option<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected: Option<Command> = None;

    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }

        let command = match decode_command(line) {
            Ok(command) => command,
            Err(e) => {
                debug!("Skipping malformed command line: {}", e);
                continue;
            }
        };

        if selected.is_none() || command.firing == Firing::Alt {
            selected = Some(command);
        }
    }

    selected
}

/// Longest unterminated line a [`LineBuffer`] will hold, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accumulates raw socket bytes and yields complete lines.
///
/// A trailing partial line is held back until its newline arrives. A partial
/// line that grows past [`MAX_LINE_LEN`] is discarded along with the rest of
/// it, up to and including its newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and drains every complete line, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let lines = match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
                let mut segments = complete.split(|&b| b == b'\n');
                if self.discarding {
                    // Tail of an over-long line.
                    segments.next();
                    self.discarding = false;
                }
                segments
                    .filter(|line| !line.is_empty())
                    .map(|line| {
                        let line = line.strip_suffix(b"\r").unwrap_or(line);
                        String::from_utf8_lossy(line).into_owned()
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        if self.pending.len() > MAX_LINE_LEN {
            debug!(
                "Discarding {} bytes of an over-long line",
                self.pending.len()
            );
            self.pending.clear();
            self.discarding = true;
        }

        lines
    }

    /// Bytes received after the last newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
