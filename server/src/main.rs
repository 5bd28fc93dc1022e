use clap::Parser;
use log::info;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind both channels on
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Control (request/reply) port
    #[arg(long, default_value_t = shared::DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Broadcast (publish/subscribe) port
    #[arg(long, default_value_t = shared::DEFAULT_BROADCAST_PORT)]
    broadcast_port: u16,

    /// Maximum number of players in the session
    #[arg(short, long, default_value_t = shared::DEFAULT_MAX_PLAYERS)]
    max_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut server = Server::new(
        &args.host,
        args.control_port,
        args.broadcast_port,
        args.max_players,
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}
