//! Node orchestrator: wires the ledger, the p2p layer, the wallet API and
//! the optional background miner together, and owns the shutdown signal.

use crate::api::{self, ApiContext};
use crate::config::Config;
use crate::error::ChainError;
use crate::ledger::{Ledger, DEFAULT_DIFFICULTY};
use crate::network::{Message, NetworkNode};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct Node {
    pub config: Config,
    pub ledger: Arc<RwLock<Ledger>>,
    pub network: Arc<NetworkNode>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Node {
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ledger = Arc::new(RwLock::new(Ledger::new(DEFAULT_DIFFICULTY)));
        let network = Arc::new(NetworkNode::new(
            ledger.clone(),
            config.network.p2p_port,
            &config.network.advertised_host,
            shutdown_rx.clone(),
        ));
        Node {
            config,
            ledger,
            network,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Runs the node until Ctrl-C. A p2p or api bind failure is logged and
    /// leaves the rest of the node running; it does not abort the process.
    pub async fn start(self: Arc<Self>) -> Result<(), ChainError> {
        info!(
            node_id = %self.network.node_id(),
            network_id = %self.config.network.network_id,
            "starting emberchain node"
        );

        let network = self.network.clone();
        tokio::spawn(async move {
            if let Err(e) = network.run().await {
                error!(error = %e, "p2p listener unavailable");
            }
        });

        for peer in &self.config.network.bootstrap_peers {
            match peer.rsplit_once(':').and_then(|(host, port)| {
                port.parse::<u16>().ok().map(|p| (host.to_string(), p))
            }) {
                Some((host, port)) => {
                    let network = self.network.clone();
                    tokio::spawn(async move {
                        if let Err(e) = network.connect_peer(&host, port).await {
                            warn!(error = %e, "bootstrap connect failed");
                        }
                    });
                }
                None => warn!(%peer, "skipping malformed bootstrap peer"),
            }
        }

        if self.config.miner.enabled {
            self.clone().spawn_miner();
        }

        let api_ctx = ApiContext {
            ledger: self.ledger.clone(),
        };
        let api_port = self.config.network.api_port;
        tokio::spawn(async move {
            if let Err(e) = api::run_api_server(api_ctx, api_port).await {
                error!(error = %e, "wallet api unavailable");
            }
        });

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    let _ = self.shutdown_tx.send(true);
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(10)) => {
                    info!(
                        height = self.ledger.read().chain().len(),
                        peers = self.network.peer_count(),
                        pending = self.ledger.read().pending().len(),
                        "node running"
                    );
                }
            }
        }
        Ok(())
    }

    /// Background miner: whenever the pending pool is non-empty, runs the
    /// full mining flow on the blocking pool and gossips the result.
    fn spawn_miner(self: Arc<Self>) {
        let interval_secs = self.config.miner.interval_secs;
        let beneficiary = self.config.miner.beneficiary_address.clone();
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => {
                        if self.ledger.read().pending().is_empty() {
                            continue;
                        }
                        let ledger = self.ledger.clone();
                        let address = beneficiary.clone();
                        match tokio::task::spawn_blocking(move || ledger.write().mine_next(&address)).await {
                            Ok(block) => {
                                info!(index = block.index, "mined block, gossiping");
                                self.network.broadcast(Message::NewBlock { block });
                            }
                            Err(e) => warn!(error = %e, "mining task failed"),
                        }
                    }
                }
            }
        });
    }
}
