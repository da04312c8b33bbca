use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::settings::Settings;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative TankWars game server")]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value = "11000")]
    port: u16,
    /// Path to the JSON settings file
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let settings = match Settings::load(&args.settings) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid settings: {}", e);
            eprintln!("Invalid settings: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded settings from {}: world {}, {} ms per frame, {} walls",
        args.settings.display(),
        settings.universe_size,
        settings.ms_per_frame,
        settings.walls.len()
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = match Server::bind(&address, settings).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            eprintln!("Failed to bind {}: {}", address, e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }
}
