//! Emberchain node daemon: p2p gossip listener plus wallet API.

use clap::Parser;
use emberchain::config::{self, Config};
use emberchain::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ember-node", about = "Run an emberchain node")]
struct Args {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the p2p listen port
    #[arg(long)]
    p2p_port: Option<u16>,

    /// Override the wallet API port
    #[arg(long)]
    api_port: Option<u16>,

    /// Additional peer to connect to at startup (host:port, repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config: Config = config::load_config(&args.config)?;
    if let Some(port) = args.p2p_port {
        config.network.p2p_port = port;
    }
    if let Some(port) = args.api_port {
        config.network.api_port = port;
    }
    config.network.bootstrap_peers.extend(args.peers);

    info!(
        p2p_port = config.network.p2p_port,
        api_port = config.network.api_port,
        "emberchain starting"
    );

    let node = Arc::new(Node::new(config));
    node.start().await?;
    Ok(())
}
