//! Static network and token reference data.
//!
//! One entry per supported chain: display name, token symbol, decimal
//! exponent, explorer URL base, and the ordered menu of request amounts.
//! Only Solana has a live backend; the other networks are simulated.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of supported chain keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKey {
    Solana,
    Ethereum,
    Polygon,
    Bnb,
    Avalanche,
}

/// Operational state of a network, as a health check would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Online,
    Maintenance,
    Offline,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub key: NetworkKey,
    pub name: &'static str,
    pub symbol: &'static str,
    /// Base-unit exponent: one token is 10^decimals base units.
    pub decimals: u32,
    pub explorer_base: &'static str,
    /// Query-string suffix appended after the hash in explorer links.
    pub explorer_suffix: &'static str,
    /// Selectable request amounts in display units, smallest first.
    pub amounts: &'static [f64],
}

pub const ALL_NETWORKS: [NetworkKey; 5] = [
    NetworkKey::Solana,
    NetworkKey::Ethereum,
    NetworkKey::Polygon,
    NetworkKey::Bnb,
    NetworkKey::Avalanche,
];

pub static NETWORKS: [NetworkConfig; 5] = [
    NetworkConfig {
        key: NetworkKey::Solana,
        name: "Solana Devnet",
        symbol: "SOL",
        decimals: 9,
        explorer_base: "https://explorer.solana.com/tx/",
        explorer_suffix: "?cluster=devnet",
        amounts: &[0.5, 1.0, 2.5],
    },
    NetworkConfig {
        key: NetworkKey::Ethereum,
        name: "Ethereum Sepolia",
        symbol: "ETH",
        decimals: 18,
        explorer_base: "https://sepolia.etherscan.io/tx/",
        explorer_suffix: "",
        amounts: &[0.05, 0.1, 0.5],
    },
    NetworkConfig {
        key: NetworkKey::Polygon,
        name: "Polygon Amoy",
        symbol: "POL",
        decimals: 18,
        explorer_base: "https://amoy.polygonscan.com/tx/",
        explorer_suffix: "",
        amounts: &[0.5, 1.0, 5.0],
    },
    NetworkConfig {
        key: NetworkKey::Bnb,
        name: "BNB Smart Chain Testnet",
        symbol: "BNB",
        decimals: 18,
        explorer_base: "https://testnet.bscscan.com/tx/",
        explorer_suffix: "",
        amounts: &[0.1, 0.3, 0.5],
    },
    NetworkConfig {
        key: NetworkKey::Avalanche,
        name: "Avalanche Fuji",
        symbol: "AVAX",
        decimals: 18,
        explorer_base: "https://testnet.snowtrace.io/tx/",
        explorer_suffix: "",
        amounts: &[0.5, 1.0, 2.0],
    },
];

/// Initial faucet pool balance per network, in display units.
pub const INITIAL_POOL_BALANCES: [(NetworkKey, f64); 5] = [
    (NetworkKey::Solana, 500.0),
    (NetworkKey::Ethereum, 50.0),
    (NetworkKey::Polygon, 1_000.0),
    (NetworkKey::Bnb, 100.0),
    (NetworkKey::Avalanche, 250.0),
];

impl NetworkKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKey::Solana => "solana",
            NetworkKey::Ethereum => "ethereum",
            NetworkKey::Polygon => "polygon",
            NetworkKey::Bnb => "bnb",
            NetworkKey::Avalanche => "avalanche",
        }
    }

    /// Parse a lowercase chain key as it appears in URLs and payloads.
    pub fn parse(value: &str) -> Option<Self> {
        ALL_NETWORKS.into_iter().find(|key| key.as_str() == value)
    }
}

impl fmt::Display for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn network_config(key: NetworkKey) -> &'static NetworkConfig {
    let config = NETWORKS
        .iter()
        .find(|entry| entry.key == key)
        .expect("every NetworkKey has a NETWORKS entry");
    assert!(!config.amounts.is_empty(), "Amount menu cannot be empty");
    config
}

/// The default request amount for a network: the smallest menu entry.
pub fn default_amount(key: NetworkKey) -> f64 {
    let amounts = network_config(key).amounts;
    assert!(
        amounts.windows(2).all(|pair| pair[0] < pair[1]),
        "Amount menu must be strictly ascending"
    );
    amounts[0]
}

pub fn is_menu_amount(key: NetworkKey, amount: f64) -> bool {
    network_config(key).amounts.contains(&amount)
}

/// Format a display-unit amount with its token symbol, e.g. "2.5 SOL".
pub fn format_amount(key: NetworkKey, amount: f64) -> String {
    format!("{} {}", amount, network_config(key).symbol)
}

pub fn explorer_tx_url(key: NetworkKey, hash: &str) -> String {
    assert!(!hash.is_empty(), "Transaction hash cannot be empty");
    let config = network_config(key);
    format!("{}{}{}", config.explorer_base, hash, config.explorer_suffix)
}
