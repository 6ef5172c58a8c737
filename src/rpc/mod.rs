use std::time::Duration;

use anyhow::{Context, Result};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::Deserialize;
use serde_json::json;

/// Public Solana devnet JSON-RPC endpoint.
pub const DEFAULT_DEVNET_ENDPOINT: &str = "https://api.devnet.solana.com";

/// Largest airdrop the devnet faucet will entertain (5 SOL in lamports).
pub const MAX_AIRDROP_LAMPORTS: u64 = 5_000_000_000;

#[derive(Clone)]
pub struct SolanaRpcClient {
    inner: HttpClient,
    timeout: Duration,
}

impl SolanaRpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        assert!(
            self.timeout >= Duration::from_millis(100),
            "Timeout invariant broken"
        );
        assert!(
            self.timeout <= Duration::from_secs(60),
            "Timeout exceeds maximum bound"
        );
        self.timeout
    }

    /// Request a devnet airdrop of `lamports` to `pubkey`. Returns the
    /// transaction signature to poll for confirmation.
    pub async fn request_airdrop(&self, pubkey: &str, lamports: u64) -> Result<String> {
        assert!(!pubkey.is_empty(), "Recipient pubkey must be provided");
        assert!(lamports > 0, "Airdrop amount must be positive");
        assert!(
            lamports <= MAX_AIRDROP_LAMPORTS,
            "Airdrop amount exceeds devnet faucet bound"
        );

        let signature: String = self
            .inner
            .request("requestAirdrop", rpc_params![pubkey, lamports])
            .await
            .context("RPC call requestAirdrop failed")?;
        assert!(
            !signature.is_empty(),
            "RPC returned empty airdrop signature"
        );
        Ok(signature)
    }

    /// Fetch the lamport balance of an account.
    pub async fn get_balance(&self, pubkey: &str) -> Result<u64> {
        assert!(!pubkey.is_empty(), "Account pubkey must be provided");

        let response: RpcEnvelope<u64> = self
            .inner
            .request("getBalance", rpc_params![pubkey])
            .await
            .context("RPC call getBalance failed")?;
        assert!(
            response.value <= i64::MAX as u64,
            "Lamport balance exceeds storage bounds"
        );
        Ok(response.value)
    }

    /// Look up the cluster-reported status of a single signature. `None`
    /// means the cluster has not observed the transaction yet.
    pub async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>> {
        assert!(!signature.is_empty(), "Signature must be provided");

        let response: RpcEnvelope<Vec<Option<SignatureStatus>>> = self
            .inner
            .request(
                "getSignatureStatuses",
                rpc_params![vec![signature], json!({"searchTransactionHistory": false})],
            )
            .await
            .context("RPC call getSignatureStatuses failed")?;
        assert_eq!(
            response.value.len(),
            1,
            "getSignatureStatuses must return one entry per queried signature",
        );
        Ok(response.value.into_iter().next().flatten())
    }
}

/// Solana wraps most responses in a `{context, value}` envelope.
#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    #[allow(dead_code)]
    context: RpcContext,
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcContext {
    #[allow(dead_code)]
    slot: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<serde_json::Value>,
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    /// A transaction counts as confirmed once the cluster reports the
    /// `confirmed` or `finalized` commitment level without an error.
    pub fn is_confirmed(&self) -> bool {
        self.err.is_none()
            && matches!(
                self.confirmation_status.as_deref(),
                Some("confirmed") | Some("finalized")
            )
    }
}
