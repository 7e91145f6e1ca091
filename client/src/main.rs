use clap::Parser;
use client::network::Client;
use log::info;
use shared::lines::spawn_stdin_reader;
use shared::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Player name, unique among connected players
    #[arg(short = 'n', long)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    let client = Client::connect(&args.server, &args.name).await?;

    tokio::select! {
        result = client.run(spawn_stdin_reader()) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, leaving the game");
        }
    }

    Ok(())
}
