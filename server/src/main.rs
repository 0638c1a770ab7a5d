use clap::Parser;
use log::{error, info};
use server::{discovery, Server, ServerConfig, TagRules};
use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE, INVINCIBLE_TICKS};
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Ticks a player stays invincible after tagging someone
    #[arg(long, default_value_t = INVINCIBLE_TICKS)]
    invincible_ticks: u32,

    /// Most events applied in a single tick
    #[arg(long, default_value_t = 4096)]
    max_events_per_tick: usize,

    /// Discovery endpoint to announce this server's address to
    #[arg(short = 'd', long)]
    discovery_url: Option<String>,

    /// Announce this address instead of the auto-detected one
    #[arg(long)]
    advertise_addr: Option<IpAddr>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: SocketAddr::new(args.host, args.port),
            tick_rate: args.tick_rate,
            max_events_per_tick: args.max_events_per_tick,
            rules: TagRules {
                invincible_ticks: args.invincible_ticks,
                ..TagRules::default()
            },
            discovery_url: args.discovery_url,
            advertise_addr: args.advertise_addr,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());

    info!("Starting server...");
    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = discovery::advertise(server.config()).await {
        error!("{}", e);
        return Err(e.into());
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
