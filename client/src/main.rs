use clap::Parser;
use client::canvas::StrokeCapture;
use client::network::{Client, ClientHandle};
use client::presentation::LogSurface;
use log::{info, warn};
use shared::protocol::PathEvent;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Server control (request/reply) port
    #[arg(long, default_value_t = shared::DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Server broadcast (publish/subscribe) port
    #[arg(long, default_value_t = shared::DEFAULT_BROADCAST_PORT)]
    broadcast_port: u16,

    /// Player name, part of the session identity
    #[arg(short, long)]
    name: String,

    /// Identity ip override (defaults to the local socket address)
    #[arg(long)]
    ip: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    if args.name.contains('@') || args.name.contains('%') {
        return Err("player name must not contain '@' or '%'".into());
    }

    let mut client = Client::new(
        &args.server,
        args.control_port,
        args.broadcast_port,
        &args.name,
        args.ip.as_deref(),
        Arc::new(LogSurface),
    )
    .await?;

    let handle = client.handle();
    let point_tx = client.point_sender();

    info!("Connecting to {}", args.server);
    info!("Commands: ready | unready | draw x,y x,y ... | guess <word> | players | quit");

    let driver = tokio::spawn(drive_terminal(handle, point_tx));

    tokio::select! {
        result = client.run() => result?,
        _ = driver => {
            info!("terminal driver finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, leaving session");
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Stands in for the window: turns terminal commands into pointer events and
/// session intents.
async fn drive_terminal(handle: ClientHandle, point_tx: mpsc::UnboundedSender<PathEvent>) {
    let mut capture = StrokeCapture::new(point_tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("ready") => {
                if let Err(e) = handle.set_ready(true).await {
                    warn!("ready request failed: {}", e);
                }
            }

            Some("unready") => {
                if let Err(e) = handle.set_ready(false).await {
                    warn!("unready request failed: {}", e);
                }
            }

            Some("draw") => {
                if !handle.is_drawer().await {
                    warn!("you are not the drawer this round");
                    continue;
                }
                capture.pointer_down();
                for coord in parts {
                    match parse_coordinate_pair(coord) {
                        Some((x, y)) => capture.pointer_move(x, y),
                        None => warn!("skipping malformed coordinate '{}'", coord),
                    }
                }
                capture.pointer_up();
            }

            Some("guess") => {
                let guess = parts.collect::<Vec<_>>().join(" ");
                if guess.is_empty() {
                    warn!("usage: guess <word>");
                    continue;
                }
                let word = { handle.state().read().await.word().map(str::to_string) };
                match word {
                    Some(word) if word.eq_ignore_ascii_case(&guess) => {
                        info!("correct!");
                        if let Err(e) = handle.report_winner(handle.local_id().clone()).await {
                            warn!("winner report failed: {}", e);
                        }
                    }
                    Some(_) => info!("'{}' is not the word", guess),
                    None => warn!("no round in progress"),
                }
            }

            Some("players") => {
                let state = handle.state();
                let state = state.read().await;
                for player in state.players_by_position() {
                    info!(
                        "{}. {} {}{}",
                        player.position,
                        player.name,
                        if player.ready { "[ready]" } else { "" },
                        if Some(&player.id) == state.drawer_id() {
                            " [drawer]"
                        } else {
                            ""
                        },
                    );
                }
            }

            Some("quit") | Some("exit") => break,
            Some(other) => warn!("unknown command '{}'", other),
            None => {}
        }
    }
}

fn parse_coordinate_pair(raw: &str) -> Option<(f32, f32)> {
    let (x, y) = raw.split_once(',')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}
