use clap::Parser;
use log::{error, info};
use server::game::World;
use server::network::Server;
use shared::{GameConfig, DEFAULT_TICK_RATE};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum simultaneous connections
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Game rules as JSON; omitted fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for a reproducible world
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.tick_rate == 0 {
        return Err("tick rate must be at least 1".into());
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading game rules from {}", path.display());
            GameConfig::load(path)?
        }
        None => GameConfig::default(),
    };
    config.validate()?;

    let world = match args.seed {
        Some(seed) => {
            info!("Using world seed {}", seed);
            World::with_seed(config, seed)
        }
        None => World::new(config),
    };

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate as f64);

    info!("Starting server on {}", address);
    info!(
        "Tick rate: {}Hz ({:.2}ms per tick)",
        args.tick_rate,
        tick_duration.as_secs_f64() * 1000.0
    );
    info!("Max connections: {}", args.max_clients);

    let mut server = Server::bind(&address, world, tick_duration, args.max_clients).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
