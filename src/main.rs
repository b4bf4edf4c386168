//! Broadcasts for LIFX bulbs and prints what they answer.
//!
//! Run with: cargo run --bin lifx-discover -- --help

use std::net::SocketAddr;

use clap::Parser;
use lifx_lan_core::discovery::DiscoveryConfig;
use lifx_lan_core::{Body, Message};
use log::{info, warn};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "lifx-discover")]
#[command(about = "Find LIFX bulbs on the local network", long_about = None)]
struct Cli {
    /// Where GetService broadcasts are sent
    #[arg(long, default_value = "255.255.255.255:56700")]
    broadcast: SocketAddr,

    /// Local address to listen on
    #[arg(long, default_value = "0.0.0.0:56700")]
    bind: SocketAddr,

    /// Source identifier put into every outbound message
    #[arg(long, default_value_t = 0)]
    source: u32,

    /// Print every message, not only light and power state
    #[arg(short, long)]
    verbose: bool,
}

fn print_message(msg: &Message, verbose: bool) {
    let (header, body) = match msg.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("undecodable message from {:?}: {}", msg.peer(), e);
            return;
        }
    };
    let peer = msg
        .peer()
        .map_or_else(|| "?".to_owned(), |p| p.to_string());

    match &body {
        Body::StateLight(state) => {
            let label = state.label().unwrap_or("<unreadable label>");
            println!(
                "{:016X} {:21} {:24} {}",
                header.target,
                peer,
                label,
                state.color.describe(false)
            );
        }
        Body::StatePower(power) => {
            println!(
                "{:016X} {:21} power {}",
                header.target,
                peer,
                if power.is_on() { "on" } else { "off" }
            );
        }
        _ if verbose => println!("{:016X} {:21} {}", header.target, peer, body),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = DiscoveryConfig {
        broadcast: cli.broadcast,
        bind: cli.bind,
        source: cli.source,
    };

    let (tx, mut rx) = mpsc::channel(64);
    let driver = tokio::spawn(lifx_lan_core::udp::run(config, tx));

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(msg) => print_message(&msg, cli.verbose),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    drop(rx);
    driver.await??;
    Ok(())
}
