//! Per-network `{request_funds, check_balance}` capabilities.
//!
//! Exactly one network (Solana devnet) is backed by a live chain client;
//! every other key shares the simulated backend, which fabricates an opaque
//! transaction hash after a fixed delay and never touches a chain. The two
//! paths are mutually exclusive arms of [`ChainBackend`].

use std::collections::HashMap;
use std::time::Duration;

use rand::RngCore;
use thiserror::Error;
use tracing::{info, warn};

use crate::networks::{ALL_NETWORKS, NetworkKey, network_config};
use crate::rpc::SolanaRpcClient;

/// Solana public keys are 32 bytes under the base58 encoding.
pub const SOLANA_PUBKEY_BYTES: usize = 32;

/// Placeholder wallet balance reported for simulated networks. A real
/// implementation must replace this with genuine per-chain lookups.
pub const SIMULATED_WALLET_BALANCE: f64 = 1_000.0;

const FABRICATED_HASH_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid address for {network}: {reason}")]
    InvalidAddress { network: NetworkKey, reason: String },
    #[error("transfer on {network} failed: {reason}")]
    Transfer { network: NetworkKey, reason: String },
    #[error("balance lookup on {network} failed: {reason}")]
    Balance { network: NetworkKey, reason: String },
    #[error("transaction {signature} was not confirmed in time")]
    Unconfirmed { signature: String },
}

/// Live Solana devnet backend: airdrop, confirmation poll, balance read.
pub struct SolanaChain {
    rpc: SolanaRpcClient,
    confirm_poll_interval: Duration,
    confirm_poll_attempts: u32,
}

impl SolanaChain {
    pub fn new(
        rpc: SolanaRpcClient,
        confirm_poll_interval: Duration,
        confirm_poll_attempts: u32,
    ) -> Self {
        assert!(
            confirm_poll_interval >= Duration::from_millis(100),
            "Confirmation poll interval below 100ms would hammer the RPC"
        );
        assert!(
            confirm_poll_attempts > 0,
            "At least one confirmation poll attempt is required"
        );
        assert!(
            confirm_poll_attempts <= 120,
            "Confirmation poll attempts exceed defensive bound"
        );
        Self {
            rpc,
            confirm_poll_interval,
            confirm_poll_attempts,
        }
    }

    /// Validate a base58 Solana public key, failing fast on malformed input.
    pub fn parse_pubkey(address: &str) -> Result<(), ChainError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ChainError::InvalidAddress {
                network: NetworkKey::Solana,
                reason: "address cannot be empty".to_string(),
            });
        }
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|err| ChainError::InvalidAddress {
                network: NetworkKey::Solana,
                reason: format!("not valid base58: {err}"),
            })?;
        if bytes.len() != SOLANA_PUBKEY_BYTES {
            return Err(ChainError::InvalidAddress {
                network: NetworkKey::Solana,
                reason: format!(
                    "decoded to {} bytes, expected {SOLANA_PUBKEY_BYTES}",
                    bytes.len()
                ),
            });
        }
        Ok(())
    }

    pub async fn request_funds(&self, address: &str, amount: f64) -> Result<String, ChainError> {
        Self::parse_pubkey(address)?;
        let lamports = to_base_units(NetworkKey::Solana, amount);

        let signature = self
            .rpc
            .request_airdrop(address, lamports)
            .await
            .map_err(|err| ChainError::Transfer {
                network: NetworkKey::Solana,
                reason: format!("{err:#}"),
            })?;
        info!("Airdrop of {lamports} lamports to {address} submitted as {signature}");

        self.wait_for_confirmation(&signature).await?;
        Ok(signature)
    }

    pub async fn check_balance(&self, address: &str) -> Result<f64, ChainError> {
        Self::parse_pubkey(address)?;
        let lamports = self
            .rpc
            .get_balance(address)
            .await
            .map_err(|err| ChainError::Balance {
                network: NetworkKey::Solana,
                reason: format!("{err:#}"),
            })?;
        Ok(from_base_units(NetworkKey::Solana, lamports))
    }

    async fn wait_for_confirmation(&self, signature: &str) -> Result<(), ChainError> {
        for attempt in 0..self.confirm_poll_attempts {
            tokio::time::sleep(self.confirm_poll_interval).await;
            match self.rpc.get_signature_status(signature).await {
                Ok(Some(status)) if status.is_confirmed() => {
                    info!(
                        "Airdrop {signature} confirmed at slot {} (confirmations: {:?})",
                        status.slot, status.confirmations
                    );
                    return Ok(());
                }
                Ok(Some(status)) if status.err.is_some() => {
                    return Err(ChainError::Transfer {
                        network: NetworkKey::Solana,
                        reason: format!("transaction failed on chain: {:?}", status.err),
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    // Transient status-poll failures are retried until the
                    // attempt limit runs out.
                    warn!("Confirmation poll {attempt} for {signature} failed: {err:#}");
                }
            }
        }
        Err(ChainError::Unconfirmed {
            signature: signature.to_string(),
        })
    }
}

/// Stub backend for networks without a live client: a fixed delay to
/// emulate latency, then a fabricated `0x` hash. No funds move anywhere.
pub struct SimulatedChain {
    network: NetworkKey,
    delay: Duration,
}

impl SimulatedChain {
    pub fn new(network: NetworkKey, delay: Duration) -> Self {
        assert!(
            delay <= Duration::from_secs(30),
            "Simulated latency exceeds defensive bound"
        );
        Self { network, delay }
    }

    pub async fn request_funds(&self, address: &str, amount: f64) -> Result<String, ChainError> {
        if address.trim().is_empty() {
            return Err(ChainError::InvalidAddress {
                network: self.network,
                reason: "address cannot be empty".to_string(),
            });
        }
        tokio::time::sleep(self.delay).await;
        let hash = fabricate_tx_hash();
        info!(
            "Simulated {} transfer of {} to {address} as {hash}",
            self.network, amount
        );
        Ok(hash)
    }

    pub async fn check_balance(&self, address: &str) -> Result<f64, ChainError> {
        if address.trim().is_empty() {
            return Err(ChainError::InvalidAddress {
                network: self.network,
                reason: "address cannot be empty".to_string(),
            });
        }
        Ok(SIMULATED_WALLET_BALANCE)
    }
}

/// The capability a network key dispatches to. Simulated networks all use
/// the in-memory arm; only Solana reaches a chain.
pub enum ChainBackend {
    Solana(SolanaChain),
    Simulated(SimulatedChain),
}

impl ChainBackend {
    pub async fn request_funds(&self, address: &str, amount: f64) -> Result<String, ChainError> {
        match self {
            ChainBackend::Solana(chain) => chain.request_funds(address, amount).await,
            ChainBackend::Simulated(chain) => chain.request_funds(address, amount).await,
        }
    }

    pub async fn check_balance(&self, address: &str) -> Result<f64, ChainError> {
        match self {
            ChainBackend::Solana(chain) => chain.check_balance(address).await,
            ChainBackend::Simulated(chain) => chain.check_balance(address).await,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ChainBackend::Solana(_))
    }
}

/// Network key to capability mapping, built once at startup.
pub struct ChainRegistry {
    backends: HashMap<NetworkKey, ChainBackend>,
}

impl ChainRegistry {
    /// Production wiring: Solana live, every other network simulated.
    pub fn new(solana: SolanaChain, simulated_delay: Duration) -> Self {
        let mut backends = HashMap::new();
        backends.insert(NetworkKey::Solana, ChainBackend::Solana(solana));
        for key in ALL_NETWORKS {
            if key != NetworkKey::Solana {
                backends.insert(
                    key,
                    ChainBackend::Simulated(SimulatedChain::new(key, simulated_delay)),
                );
            }
        }
        let registry = Self { backends };
        registry.assert_complete();
        registry
    }

    /// Every network simulated. Used where no chain should be reachable.
    pub fn simulated_only(simulated_delay: Duration) -> Self {
        let backends = ALL_NETWORKS
            .into_iter()
            .map(|key| {
                (
                    key,
                    ChainBackend::Simulated(SimulatedChain::new(key, simulated_delay)),
                )
            })
            .collect();
        let registry = Self { backends };
        registry.assert_complete();
        registry
    }

    pub fn get(&self, key: NetworkKey) -> &ChainBackend {
        self.backends
            .get(&key)
            .expect("registry covers every NetworkKey")
    }

    fn assert_complete(&self) {
        assert_eq!(
            self.backends.len(),
            ALL_NETWORKS.len(),
            "Chain registry must cover every network key",
        );
    }
}

/// Convert a display-unit amount to integer base units for a network.
pub fn to_base_units(key: NetworkKey, amount: f64) -> u64 {
    assert!(amount.is_finite(), "Amount must be finite");
    assert!(amount > 0.0, "Amount must be positive");
    let scale = 10f64.powi(network_config(key).decimals as i32);
    let base = (amount * scale).round();
    assert!(base <= u64::MAX as f64, "Amount overflows base units");
    base as u64
}

/// Convert integer base units back to display units.
pub fn from_base_units(key: NetworkKey, base: u64) -> f64 {
    let scale = 10f64.powi(network_config(key).decimals as i32);
    base as f64 / scale
}

fn fabricate_tx_hash() -> String {
    let mut bytes = [0u8; FABRICATED_HASH_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // System program id: base58 for 32 zero bytes.
    const VALID_PUBKEY: &str = "11111111111111111111111111111111";

    #[test]
    fn test_parse_pubkey_accepts_32_byte_key() {
        assert!(SolanaChain::parse_pubkey(VALID_PUBKEY).is_ok());
        assert!(SolanaChain::parse_pubkey(&format!("  {VALID_PUBKEY}  ")).is_ok());
    }

    #[test]
    fn test_parse_pubkey_rejects_malformed_input() {
        assert!(SolanaChain::parse_pubkey("").is_err());
        assert!(SolanaChain::parse_pubkey("   ").is_err());
        // 0, O, I and l are outside the base58 alphabet.
        assert!(SolanaChain::parse_pubkey("0OIl").is_err());
        // Valid base58 but the wrong decoded length.
        assert!(SolanaChain::parse_pubkey("abc").is_err());
    }

    #[test]
    fn test_base_unit_conversion() {
        assert_eq!(to_base_units(NetworkKey::Solana, 0.5), 500_000_000);
        assert_eq!(to_base_units(NetworkKey::Solana, 2.5), 2_500_000_000);
        assert_eq!(from_base_units(NetworkKey::Solana, 1_000_000_000), 1.0);
        assert_eq!(from_base_units(NetworkKey::Solana, 0), 0.0);
    }

    #[test]
    fn test_fabricated_hashes_are_opaque_and_distinct() {
        let first = fabricate_tx_hash();
        let second = fabricate_tx_hash();
        assert!(first.starts_with("0x"));
        assert_eq!(first.len(), 2 + FABRICATED_HASH_BYTES * 2);
        assert!(hex::decode(&first[2..]).is_ok());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_simulated_request_fabricates_hash() {
        let chain = SimulatedChain::new(NetworkKey::Ethereum, Duration::ZERO);
        let hash = chain.request_funds("0xabc", 0.1).await.unwrap();
        assert!(hash.starts_with("0x"));
    }

    #[tokio::test]
    async fn test_simulated_request_rejects_empty_address() {
        let chain = SimulatedChain::new(NetworkKey::Ethereum, Duration::ZERO);
        assert!(matches!(
            chain.request_funds("  ", 0.1).await,
            Err(ChainError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_simulated_balance_is_placeholder() {
        let chain = SimulatedChain::new(NetworkKey::Polygon, Duration::ZERO);
        let balance = chain.check_balance("0xabc").await.unwrap();
        assert_eq!(balance, SIMULATED_WALLET_BALANCE);
    }

    #[test]
    fn test_registry_routes_only_solana_to_live_backend() {
        let registry = ChainRegistry::simulated_only(Duration::ZERO);
        for key in ALL_NETWORKS {
            assert!(!registry.get(key).is_live());
        }
    }
}
