//! ffbridge - GDL-90 flight telemetry bridge
//!
//! Simulates a single aircraft and streams it to ForeFlight (or any GDL-90
//! receiver) over UDP, discovering the peer from its broadcast announcement.

mod airports;
mod config;
mod discovery;
mod protocol;
mod sim;
mod stream;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use airports::AirportTable;
use config::Config;
use discovery::{Endpoint, Resolution, Resolver};
use sim::FlightState;
use stream::{StreamConfig, StreamEvent, Streamer};

/// ffbridge - stream a simulated aircraft to ForeFlight
#[derive(Parser)]
#[command(name = "ffbridge")]
#[command(author = "ffbridge Contributors")]
#[command(version = "0.1.0")]
#[command(about = "GDL-90 flight telemetry bridge", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the receiver and start streaming telemetry
    Run {
        /// Skip discovery and stream to this address (ip or ip:port)
        #[arg(short, long)]
        target: Option<String>,

        /// Start on the ground at this airport (ICAO code)
        #[arg(short, long)]
        airport: Option<String>,
    },

    /// Listen for the ForeFlight broadcast and print the result
    Discover {
        /// How long to listen (seconds)
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search the airport reference table
    Airports {
        /// Search string (ICAO, IATA or name)
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Run { target, airport } => {
            run_stream(config, target, airport).await?;
        }
        Commands::Discover { timeout } => {
            run_discovery(config, timeout).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Airports { query } => {
            run_airport_search(&config, &query)?;
        }
    }

    Ok(())
}

/// Discover (or parse) the peer endpoint, then stream until ctrl-c.
async fn run_stream(
    config: Config,
    target: Option<String>,
    airport: Option<String>,
) -> anyhow::Result<()> {
    let endpoint = match target {
        Some(addr) => parse_target(&addr, config.network.telemetry_port)?,
        None => {
            println!(
                "Searching for ForeFlight on port {}...",
                config.network.discovery_port
            );
            let resolver = Resolver::bind(config.network.discovery_port).await?;
            let timeout = Duration::from_secs(config.network.discovery_timeout_secs);
            match resolver.resolve(timeout).await? {
                Resolution::Found(endpoint) => endpoint,
                Resolution::TimedOut => {
                    anyhow::bail!(
                        "ForeFlight not found within {}s. Is it running on this network? \
                         Use --target to stream to a fixed address.",
                        config.network.discovery_timeout_secs
                    );
                }
            }
        }
    };

    let mut initial = FlightState::new(
        config.simulation.initial_lat_deg,
        config.simulation.initial_lon_deg,
        config.simulation.initial_altitude_ft,
        config.simulation.initial_speed_kt,
        config.simulation.initial_track_deg,
    );

    if let Some(icao) = airport {
        let table = load_airport_table(&config)?;
        let airport = table
            .find(&icao)
            .ok_or_else(|| anyhow::anyhow!("Unknown airport: {}", icao))?;
        println!("Starting at {} ({})", airport.name, airport.icao);
        initial.lat_deg = airport.lat_deg;
        initial.lon_deg = airport.lon_deg;
    }

    let mut streamer = Streamer::new(
        StreamConfig::default(),
        config.aircraft.clone(),
        config.simulation.limits.clone(),
    );
    let mut event_rx = streamer.take_event_receiver().unwrap();

    println!("\n========================================");
    println!("  ffbridge streaming");
    println!("========================================");
    println!("  Peer: {}:{}", endpoint.ip, endpoint.port);
    println!("  Call sign: {}", config.aircraft.call_sign);
    println!(
        "  Position: {:.4}, {:.4} at {} ft",
        initial.lat_deg, initial.lon_deg, initial.altitude_ft
    );
    println!("========================================");
    println!("\nPress Ctrl+C to stop.\n");

    streamer.start(endpoint, initial).await?;

    // Snapshots arrive at 5 Hz; echo one per second.
    let mut ticks = 0u32;
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                let StreamEvent::StateUpdate(state) = event;
                ticks += 1;
                if ticks % 5 == 0 {
                    println!(
                        "  {:>8.4}, {:>9.4}  alt {:>6.0} ft  gs {:>3.0} kt  hdg {:>3.0}  vs {:>+5.0} fpm",
                        state.lat_deg,
                        state.lon_deg,
                        state.altitude_ft,
                        state.ground_speed_kt,
                        state.heading_deg,
                        state.vertical_speed_fpm,
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
        }
    }

    streamer.stop().await?;
    tracing::info!("Bridge stopped");

    Ok(())
}

/// One-shot discovery, printing the outcome.
async fn run_discovery(config: Config, timeout_secs: u64) -> anyhow::Result<()> {
    println!(
        "Listening for ForeFlight on port {} ({} seconds)...",
        config.network.discovery_port, timeout_secs
    );

    let resolver = Resolver::bind(config.network.discovery_port).await?;
    match resolver.resolve(Duration::from_secs(timeout_secs)).await? {
        Resolution::Found(endpoint) => {
            println!("Found ForeFlight at {}:{}", endpoint.ip, endpoint.port);
        }
        Resolution::TimedOut => {
            println!("No broadcast received.");
        }
    }

    Ok(())
}

fn run_airport_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let table = load_airport_table(config)?;
    let matches = table.search(query);

    if matches.is_empty() {
        println!("No airports matching '{}'", query);
        return Ok(());
    }

    for airport in matches {
        println!(
            "{:<4} {:<3} {:<45} {:>9.4}, {:>9.4}  {:>5} ft",
            airport.icao,
            airport.iata,
            airport.name,
            airport.lat_deg,
            airport.lon_deg,
            airport.elevation_ft,
        );
    }

    Ok(())
}

fn load_airport_table(config: &Config) -> anyhow::Result<AirportTable> {
    match &config.airports.file {
        Some(path) => Ok(AirportTable::load(path)?),
        None => Ok(AirportTable::builtin()),
    }
}

/// Parse `ip` or `ip:port` (IPv6 with a port needs brackets), defaulting
/// the port when only an address is given.
fn parse_target(addr: &str, default_port: u16) -> anyhow::Result<Endpoint> {
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return Ok(Endpoint {
            ip,
            port: default_port,
        });
    }
    let socket_addr: std::net::SocketAddr = addr.parse()?;
    Ok(Endpoint {
        ip: socket_addr.ip(),
        port: socket_addr.port(),
    })
}
