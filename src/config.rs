//! Configuration management for emberchain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    pub p2p_port: u16,
    pub api_port: u16,
    #[serde(default = "default_network_id")]
    pub network_id: String,
    #[serde(default = "default_advertised_host")]
    pub advertised_host: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MinerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub beneficiary_address: String,
    #[serde(default = "default_mining_interval")]
    pub interval_secs: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            beneficiary_address: String::new(),
            interval_secs: default_mining_interval(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: NetworkConfig {
                p2p_port: 9100,
                api_port: 5000,
                network_id: default_network_id(),
                advertised_host: default_advertised_host(),
                bootstrap_peers: Vec::new(),
            },
            miner: MinerConfig::default(),
        }
    }
}

/// Loads `config.toml` from the given path, falling back to defaults when the
/// file is absent. Validates the values a background miner depends on.
pub fn load_config(path: &Path) -> Result<Config, ChainError> {
    let config: Config = match fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents)
            .map_err(|e| ChainError::ConfigError(format!("invalid {}: {}", path.display(), e)))?,
        Err(_) => Config::default(),
    };

    if config.miner.enabled && config.miner.beneficiary_address.is_empty() {
        return Err(ChainError::ConfigError(
            "miner.beneficiary_address must be set when the miner is enabled".to_string(),
        ));
    }
    if config.network.p2p_port == config.network.api_port {
        return Err(ChainError::ConfigError(
            "network.p2p_port and network.api_port must differ".to_string(),
        ));
    }

    Ok(config)
}

fn default_network_id() -> String {
    "devnet".to_string()
}

fn default_advertised_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mining_interval() -> u64 {
    10
}
