use clap::Parser;
use server::network::Server;
use server::registry::Registry;
use server::tick;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Main-method of the application.
/// Parses command-line arguments, then spawns the listener and the tick
/// loop and waits for either to finish or for Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = shared::SERVER_HOST)]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = shared::SERVER_PORT)]
        port: u16,
        /// Tick rate (updates per second)
        #[clap(short, long, default_value_t = shared::TICK_RATE)]
        tick_rate: u32,
        /// Maximum concurrent players
        #[clap(short, long, default_value_t = shared::MAX_PLAYERS)]
        max_players: usize,
    }

    env_logger::init();
    let args = Args::parse();

    // The registry is the single mutual-exclusion domain for all game state.
    let registry = Arc::new(Mutex::new(Registry::new(args.max_players)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, Arc::clone(&registry)).await?;

    // Spawn listener task
    let listener_handle = tokio::spawn(server.run(shutdown_rx.clone()));

    // Spawn tick-loop task
    let tick_handle = {
        let registry = Arc::clone(&registry);
        tokio::spawn(tick::run(registry, args.tick_rate, shutdown_rx))
    };

    // Handle shutdown gracefully
    tokio::select! {
        result = listener_handle => {
            if let Err(e) = result {
                eprintln!("Listener task panicked: {}", e);
            }
        }
        result = tick_handle => {
            if let Err(e) = result {
                eprintln!("Tick task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}
