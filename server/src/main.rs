use clap::Parser;
use log::info;
use server::config::{Cadence, ServerConfig};
use server::console::run_console;
use server::network::{BoxError, Server};
use shared::lines::spawn_stdin_reader;
use shared::DEFAULT_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Round length in seconds
    #[arg(short, long, default_value = "60")]
    duration: u64,

    /// Overtime length in seconds
    #[arg(long, default_value = "10")]
    overtime_duration: u64,

    /// Shortest delay between moles during a round (ms)
    #[arg(long, default_value = "1000")]
    spawn_min_ms: u64,

    /// Longest delay between moles during a round (ms)
    #[arg(long, default_value = "3000")]
    spawn_max_ms: u64,

    /// Shortest delay between moles during overtime (ms)
    #[arg(long, default_value = "500")]
    overtime_spawn_min_ms: u64,

    /// Longest delay between moles during overtime (ms)
    #[arg(long, default_value = "800")]
    overtime_spawn_max_ms: u64,

    /// Accepted distance between a hit's timestamp and the mole's spawn (ms)
    #[arg(long, default_value = "3000")]
    hit_window_ms: u64,

    /// End tied rounds immediately instead of playing overtime
    #[arg(long)]
    no_overtime: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            round_duration: Duration::from_secs(args.duration),
            overtime_duration: Duration::from_secs(args.overtime_duration),
            round_cadence: Cadence::from_millis(args.spawn_min_ms, args.spawn_max_ms),
            overtime_cadence: Cadence::from_millis(
                args.overtime_spawn_min_ms,
                args.overtime_spawn_max_ms,
            ),
            hit_window: Duration::from_millis(args.hit_window_ms),
            overtime_enabled: !args.no_overtime,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    info!(
        "Rounds last {}s, hits count within {}ms of a spawn",
        config.round_duration.as_secs(),
        config.hit_window.as_millis()
    );

    let mut server = Server::new(config).await?;
    let console = tokio::spawn(run_console(server.handle(), spawn_stdin_reader()));

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    console.abort();
    Ok(())
}
