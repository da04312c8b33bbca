use clap::Parser;
use shared::{
    encode_line, parse_handshake_value, Command, Firing, Movement, ServerObject, Vector2D,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connects to a running server, drives a tank in a square and prints a
/// summary of every frame it receives.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:11000")]
    server: String,

    /// Player name sent in the handshake
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Number of frames to read before disconnecting
    #[arg(short = 'f', long, default_value = "120")]
    frames: u32,
}

#[derive(Debug, Default)]
struct FrameSummary {
    tanks: usize,
    projectiles: usize,
    powerups: usize,
    beams: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    writer.write_all(format!("{}\n", args.name).as_bytes()).await?;

    let id_line = lines.next_line().await?.ok_or("closed during handshake")?;
    let id = parse_handshake_value(&id_line)?;
    let size_line = lines.next_line().await?.ok_or("closed during handshake")?;
    let size = parse_handshake_value(&size_line)?;
    println!("Assigned player ID {} in a world of size {}", id, size);

    // Walls come first, then our own tank.
    let mut walls = 0;
    loop {
        let line = lines.next_line().await?.ok_or("closed during handshake")?;
        match ServerObject::decode(&line)? {
            ServerObject::Wall(_) => walls += 1,
            ServerObject::Tank(tank) => {
                println!(
                    "Received {} walls, spawned {:?} at ({}, {})",
                    walls, tank.name, tank.location.x, tank.location.y
                );
                break;
            }
            other => println!("Unexpected object during handshake: {:?}", other),
        }
    }

    let moves = [Movement::Up, Movement::Right, Movement::Down, Movement::Left];
    let mut summary = FrameSummary::default();
    let mut frames = 0;

    while frames < args.frames {
        let line = match timeout(Duration::from_secs(2), lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                println!("Server closed the connection");
                break;
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                println!("No data for 2 seconds, giving up");
                break;
            }
        };

        let object = match ServerObject::decode(&line) {
            Ok(object) => object,
            Err(e) => {
                println!("Failed to decode {:?}: {}", line, e);
                continue;
            }
        };

        match object {
            ServerObject::Beam(_) => summary.beams += 1,
            ServerObject::Projectile(_) => summary.projectiles += 1,
            ServerObject::Powerup(_) => summary.powerups += 1,
            ServerObject::Wall(_) => {}
            ServerObject::Tank(tank) => {
                summary.tanks += 1;
                // Our own tank is a convenient once-per-frame marker.
                if tank.id != id {
                    continue;
                }
                frames += 1;
                if frames % 30 == 0 {
                    println!(
                        "Frame {}: hp={} score={} pos=({:.0}, {:.0}) seen={:?}",
                        frames,
                        tank.hit_points,
                        tank.score,
                        tank.location.x,
                        tank.location.y,
                        summary
                    );
                    summary = FrameSummary::default();
                }

                let command = Command {
                    movement: moves[(frames / 60) as usize % moves.len()],
                    firing: if frames % 20 == 0 { Firing::Main } else { Firing::None },
                    turret_direction: Vector2D::new(1.0, 0.0),
                };
                writer.write_all(encode_line(&command)?.as_bytes()).await?;
            }
        }
    }

    println!("Test client finished after {} frames", frames);
    Ok(())
}
