use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::sync::mpsc;

use server::network::{DevTokenResolver, NetworkServer};
use server::persistence::InMemoryRepository;
use server::session::{SessionConfig, SessionManager, SessionMessage};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative Pong game server")]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Simulation tick rate (frames per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// State snapshot rate (broadcasts per second)
    #[clap(short, long, default_value = "30")]
    broadcast_rate: u32,
    /// Disconnect grace period in seconds
    #[clap(short, long, default_value = "30")]
    grace_secs: u64,
    /// Open a registration tournament of this size at startup
    #[clap(long)]
    tournament_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = SessionConfig {
        broadcast_divisor: (args.tick_rate / args.broadcast_rate.max(1)).max(1) as u64,
        grace_ms: args.grace_secs * 1_000,
    };
    let repository = Arc::new(InMemoryRepository::new());
    let mut session = SessionManager::new(repository, config);

    if let Some(size) = args.tournament_size {
        match session.create_tournament("open", size) {
            Ok(id) => info!("startup tournament {} accepting players", id),
            Err(err) => error!("could not open startup tournament: {}", err),
        }
    }

    let (session_tx, session_rx) = mpsc::unbounded_channel::<SessionMessage>();
    let session_handle = tokio::spawn(session.run(session_rx, args.tick_rate));

    let address = format!("{}:{}", args.host, args.port);
    let network = NetworkServer::bind(&address, session_tx, Arc::new(DevTokenResolver)).await?;
    let network_handle = tokio::spawn(async move {
        if let Err(err) = network.run().await {
            error!("network server stopped: {}", err);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = session_handle => {
            error!("session manager exited unexpectedly");
        }
    }

    network_handle.abort();
    Ok(())
}
