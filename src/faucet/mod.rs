//! The faucet engine: one state container owning every piece of mutable
//! state (session, selection, pools, ledger, status banner), with the
//! request/balance operations dispatching through the chain registry.
//!
//! All operations serialize behind one async mutex. The mutex is never held
//! across a chain call: the request flow checks preconditions and flips the
//! in-flight flag under the lock, releases it for the (real or simulated)
//! transfer, then re-acquires it to record the outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{info, warn};

use crate::chains::{ChainError, ChainRegistry};
use crate::networks::{
    ALL_NETWORKS, INITIAL_POOL_BALANCES, NetworkKey, NetworkStatus, default_amount,
    format_amount, is_menu_amount,
};
use crate::session::{AuthError, Credentials, Session};

/// User-facing banner text for any failed faucet request. Deliberately
/// undifferentiated; the typed [`FaucetError`] carries the real kind.
pub const STATUS_REQUEST_FAILED: &str = "Request failed. Please try again.";

/// User-facing banner text for a failed login.
pub const STATUS_LOGIN_FAILED: &str = "Login failed. Please check your credentials.";

/// User-facing banner text for a successful login.
pub const STATUS_LOGIN_OK: &str = "Login successful.";

#[derive(Debug, Error)]
pub enum FaucetError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("request quota exhausted")]
    QuotaExhausted,
    #[error("captcha answer mismatch")]
    CaptchaMismatch,
    #[error("amount {amount} is not on the {network} menu")]
    AmountNotOnMenu { network: NetworkKey, amount: f64 },
    #[error("another request is already in flight")]
    RequestInFlight,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl FaucetError {
    /// Stable machine-readable tag for error bodies and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            FaucetError::NotLoggedIn => "not_logged_in",
            FaucetError::QuotaExhausted => "quota_exhausted",
            FaucetError::CaptchaMismatch => "captcha_mismatch",
            FaucetError::AmountNotOnMenu { .. } => "amount_not_on_menu",
            FaucetError::RequestInFlight => "request_in_flight",
            FaucetError::Chain(_) => "chain_failure",
        }
    }
}

/// A completed faucet grant, immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub hash: String,
    pub network: NetworkKey,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBanner {
    pub kind: StatusKind,
    pub message: String,
}

/// Wallet balance as last observed. `Unknown` is distinct from zero so the
/// view can tell "no data" apart from an empty account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BalanceState {
    Unknown,
    Known { amount: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolView {
    pub network: NetworkKey,
    pub balance: f64,
    pub status: NetworkStatus,
}

/// Full view of the container state, consumed whole by the view layer.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub session: Option<Session>,
    pub selected_network: NetworkKey,
    pub selected_amount: f64,
    pub pools: Vec<PoolView>,
    pub wallet_balance: BalanceState,
    pub status: Option<StatusBanner>,
    pub in_flight: bool,
    pub ledger: Vec<Transaction>,
}

#[derive(Debug)]
struct EngineState {
    session: Option<Session>,
    selected_network: NetworkKey,
    selected_amount: f64,
    pools: HashMap<NetworkKey, f64>,
    network_status: HashMap<NetworkKey, NetworkStatus>,
    ledger: Vec<Transaction>,
    wallet_balance: BalanceState,
    status: Option<StatusBanner>,
    status_timer: Option<AbortHandle>,
    in_flight: bool,
}

pub struct FaucetEngine {
    credentials: Credentials,
    quota_per_login: u32,
    captcha_answer: String,
    status_clear: Duration,
    chains: ChainRegistry,
    state: Arc<Mutex<EngineState>>,
}

impl FaucetEngine {
    pub fn new(
        credentials: Credentials,
        quota_per_login: u32,
        captcha_answer: String,
        status_clear: Duration,
        chains: ChainRegistry,
    ) -> Self {
        assert!(quota_per_login > 0, "Quota per login must be positive");
        assert!(!captcha_answer.is_empty(), "Captcha answer cannot be empty");
        assert!(
            status_clear <= Duration::from_secs(60),
            "Status banner lifetime exceeds defensive bound"
        );

        let selected_network = ALL_NETWORKS[0];
        let state = EngineState {
            session: None,
            selected_network,
            selected_amount: default_amount(selected_network),
            pools: INITIAL_POOL_BALANCES.into_iter().collect(),
            network_status: ALL_NETWORKS
                .into_iter()
                .map(|key| (key, NetworkStatus::Online))
                .collect(),
            ledger: Vec::new(),
            wallet_balance: BalanceState::Unknown,
            status: None,
            status_timer: None,
            in_flight: false,
        };

        Self {
            credentials,
            quota_per_login,
            captcha_answer,
            status_clear,
            chains,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Exact-literal login. Success replaces any existing session and
    /// resets the quota; failure leaves state untouched apart from the
    /// transient error banner.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if let Err(err) = self.credentials.verify(username, password) {
            warn!("Login rejected for username {username:?}");
            self.set_status(StatusKind::Error, STATUS_LOGIN_FAILED.to_string())
                .await;
            return Err(err);
        }

        let session = Session::new(username, self.quota_per_login);
        {
            let mut state = self.state.lock().await;
            state.session = Some(session.clone());
        }
        info!("Session opened for {username}");
        self.set_status(StatusKind::Success, STATUS_LOGIN_OK.to_string())
            .await;
        Ok(session)
    }

    /// Drop the session. Ledger and pool balances are process-wide and
    /// survive; only the login state goes away.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.session.take() {
            info!("Session closed for {}", session.username);
        }
    }

    /// Switch the active network. Always resets the selected amount to the
    /// new network's smallest menu entry.
    pub async fn select_network(&self, network: NetworkKey) -> (NetworkKey, f64) {
        let mut state = self.state.lock().await;
        state.selected_network = network;
        state.selected_amount = default_amount(network);
        (state.selected_network, state.selected_amount)
    }

    /// Pick a request amount from the active network's menu.
    pub async fn select_amount(&self, amount: f64) -> Result<(), FaucetError> {
        let mut state = self.state.lock().await;
        let network = state.selected_network;
        if !is_menu_amount(network, amount) {
            return Err(FaucetError::AmountNotOnMenu { network, amount });
        }
        state.selected_amount = amount;
        Ok(())
    }

    /// The faucet request flow. Preconditions run synchronously under the
    /// lock; exactly one of the two chain paths then executes; the outcome
    /// is recorded under the lock again.
    pub async fn request_tokens(
        &self,
        network: NetworkKey,
        address: &str,
        amount: f64,
        captcha: &str,
    ) -> Result<Transaction, FaucetError> {
        {
            let mut state = self.state.lock().await;
            if let Err(err) = check_preconditions(&state, network, amount, captcha, &self.captcha_answer) {
                drop(state);
                warn!("Faucet request rejected before dispatch: {err}");
                self.set_status(StatusKind::Error, STATUS_REQUEST_FAILED.to_string())
                    .await;
                return Err(err);
            }
            state.in_flight = true;
        }

        let outcome = self.chains.get(network).request_funds(address, amount).await;

        match outcome {
            Ok(hash) => {
                let tx = Transaction {
                    hash,
                    network,
                    amount,
                    timestamp: Utc::now(),
                };
                {
                    let mut state = self.state.lock().await;
                    state.ledger.insert(0, tx.clone());
                    if let Some(session) = state.session.as_mut() {
                        session.consume_request();
                    }
                    if let Some(pool) = state.pools.get_mut(&network) {
                        // No floor: the demo pool is allowed to go negative.
                        *pool -= amount;
                    }
                    state.in_flight = false;
                }
                info!(
                    "Faucet sent {} to {address} on {network} ({})",
                    format_amount(network, amount),
                    tx.hash
                );
                self.set_status(
                    StatusKind::Success,
                    format!("Sent {} to {address}", format_amount(network, amount)),
                )
                .await;
                self.refresh_balance(network, address).await;
                Ok(tx)
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    state.in_flight = false;
                }
                warn!("Faucet request on {network} failed: {err}");
                self.set_status(StatusKind::Error, STATUS_REQUEST_FAILED.to_string())
                    .await;
                Err(FaucetError::Chain(err))
            }
        }
    }

    /// Look up a wallet balance and record it on the container. Failures
    /// leave the balance `Unknown`, never zero.
    pub async fn check_balance(
        &self,
        network: NetworkKey,
        address: &str,
    ) -> Result<f64, ChainError> {
        let result = self.chains.get(network).check_balance(address).await;
        let mut state = self.state.lock().await;
        match &result {
            Ok(balance) => {
                state.wallet_balance = BalanceState::Known { amount: *balance };
            }
            Err(err) => {
                warn!("Balance lookup on {network} failed: {err}");
                state.wallet_balance = BalanceState::Unknown;
            }
        }
        result
    }

    /// Whether a network dispatches to a live chain client rather than the
    /// simulated backend.
    pub fn network_is_live(&self, network: NetworkKey) -> bool {
        self.chains.get(network).is_live()
    }

    pub async fn ledger(&self) -> Vec<Transaction> {
        let state = self.state.lock().await;
        state.ledger.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        let pools = ALL_NETWORKS
            .into_iter()
            .map(|key| PoolView {
                network: key,
                balance: state.pools.get(&key).copied().unwrap_or(0.0),
                status: state
                    .network_status
                    .get(&key)
                    .copied()
                    .unwrap_or(NetworkStatus::Offline),
            })
            .collect();
        Snapshot {
            session: state.session.clone(),
            selected_network: state.selected_network,
            selected_amount: state.selected_amount,
            pools,
            wallet_balance: state.wallet_balance,
            status: state.status.clone(),
            in_flight: state.in_flight,
            ledger: state.ledger.clone(),
        }
    }

    async fn refresh_balance(&self, network: NetworkKey, address: &str) {
        // Post-success refresh; failures already downgrade the balance to
        // Unknown inside check_balance.
        let _ = self.check_balance(network, address).await;
    }

    /// Publish a banner and arm its clear-timer. A newer banner aborts the
    /// previous timer so a stale one can never wipe it early.
    async fn set_status(&self, kind: StatusKind, message: String) {
        let mut state = self.state.lock().await;
        if let Some(timer) = state.status_timer.take() {
            timer.abort();
        }
        state.status = Some(StatusBanner { kind, message });

        let clear_after = self.status_clear;
        let shared = Arc::clone(&self.state);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(clear_after).await;
            let mut state = shared.lock().await;
            state.status = None;
            state.status_timer = None;
        });
        state.status_timer = Some(timer.abort_handle());
    }
}

fn check_preconditions(
    state: &EngineState,
    network: NetworkKey,
    amount: f64,
    captcha: &str,
    captcha_answer: &str,
) -> Result<(), FaucetError> {
    if state.in_flight {
        return Err(FaucetError::RequestInFlight);
    }
    let Some(session) = state.session.as_ref() else {
        return Err(FaucetError::NotLoggedIn);
    };
    if session.requests_left == 0 {
        return Err(FaucetError::QuotaExhausted);
    }
    if captcha != captcha_answer {
        return Err(FaucetError::CaptchaMismatch);
    }
    if !is_menu_amount(network, amount) {
        return Err(FaucetError::AmountNotOnMenu { network, amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::SIMULATED_WALLET_BALANCE;

    const CAPTCHA: &str = "12345";

    fn test_engine() -> Arc<FaucetEngine> {
        // A generous banner lifetime so assertions never race the timer.
        engine_with(Duration::ZERO, Duration::from_secs(30))
    }

    fn engine_with(simulated_delay: Duration, status_clear: Duration) -> Arc<FaucetEngine> {
        Arc::new(FaucetEngine::new(
            Credentials::default(),
            5,
            CAPTCHA.to_string(),
            status_clear,
            ChainRegistry::simulated_only(simulated_delay),
        ))
    }

    async fn login(engine: &FaucetEngine) {
        engine
            .login("demo", "password")
            .await
            .expect("demo login must succeed");
    }

    #[tokio::test]
    async fn test_login_resets_quota_to_five() {
        let engine = test_engine();
        let session = engine.login("demo", "password").await.unwrap();
        assert_eq!(session.requests_left, 5);

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.session, Some(session));
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_credentials() {
        let engine = engine_with(Duration::ZERO, Duration::from_secs(3));
        let result = engine.login("x", "y").await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));

        let snapshot = engine.snapshot().await;
        assert!(snapshot.session.is_none());
        let banner = snapshot.status.expect("failed login must raise a banner");
        assert_eq!(banner.kind, StatusKind::Error);
        assert_eq!(banner.message, STATUS_LOGIN_FAILED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_banner_clears_after_delay() {
        let engine = engine_with(Duration::ZERO, Duration::from_secs(3));
        let _ = engine.login("x", "y").await;
        assert!(engine.snapshot().await.status.is_some());

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert!(engine.snapshot().await.status.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_banner_supersedes_older_timer() {
        let engine = engine_with(Duration::ZERO, Duration::from_secs(3));
        let _ = engine.login("x", "y").await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        login(&engine).await;

        // Past the first banner's deadline: the superseding banner must
        // still be up because its own timer started later.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let banner = engine.snapshot().await.status.expect("banner still live");
        assert_eq!(banner.kind, StatusKind::Success);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(engine.snapshot().await.status.is_none());
    }

    #[tokio::test]
    async fn test_successful_request_updates_ledger_quota_and_pool() {
        let engine = test_engine();
        login(&engine).await;

        let before = engine.snapshot().await;
        let pool_before = before
            .pools
            .iter()
            .find(|p| p.network == NetworkKey::Ethereum)
            .unwrap()
            .balance;

        let tx = engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
            .await
            .unwrap();
        assert_eq!(tx.network, NetworkKey::Ethereum);
        assert_eq!(tx.amount, 0.05);
        assert!(tx.hash.starts_with("0x"));

        let after = engine.snapshot().await;
        assert_eq!(after.ledger.len(), 1);
        assert_eq!(after.ledger[0], tx);
        assert_eq!(after.session.as_ref().unwrap().requests_left, 4);
        let pool_after = after
            .pools
            .iter()
            .find(|p| p.network == NetworkKey::Ethereum)
            .unwrap()
            .balance;
        assert_eq!(pool_after, pool_before - 0.05);
        // Post-success refresh lands on the simulated placeholder.
        assert_eq!(
            after.wallet_balance,
            BalanceState::Known {
                amount: SIMULATED_WALLET_BALANCE
            }
        );
        assert_eq!(after.status.unwrap().kind, StatusKind::Success);
    }

    #[tokio::test]
    async fn test_ledger_is_newest_first() {
        let engine = test_engine();
        login(&engine).await;

        let first = engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
            .await
            .unwrap();
        let second = engine
            .request_tokens(NetworkKey::Polygon, "0xdef", 0.5, CAPTCHA)
            .await
            .unwrap();

        let ledger = engine.ledger().await;
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0], second);
        assert_eq!(ledger[1], first);
    }

    #[tokio::test]
    async fn test_captcha_mismatch_fails_without_mutation() {
        let engine = test_engine();
        login(&engine).await;

        let result = engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, "00000")
            .await;
        assert!(matches!(result, Err(FaucetError::CaptchaMismatch)));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.session.unwrap().requests_left, 5);
        assert!(snapshot.ledger.is_empty());
        assert_eq!(snapshot.status.unwrap().message, STATUS_REQUEST_FAILED);
    }

    #[tokio::test]
    async fn test_request_requires_login() {
        let engine = test_engine();
        let result = engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
            .await;
        assert!(matches!(result, Err(FaucetError::NotLoggedIn)));
        assert!(engine.ledger().await.is_empty());
    }

    #[tokio::test]
    async fn test_off_menu_amount_is_rejected() {
        let engine = test_engine();
        login(&engine).await;

        let result = engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.07, CAPTCHA)
            .await;
        assert!(matches!(result, Err(FaucetError::AmountNotOnMenu { .. })));
        assert_eq!(engine.snapshot().await.session.unwrap().requests_left, 5);
    }

    #[tokio::test]
    async fn test_sixth_request_fails_on_exhausted_quota() {
        let engine = test_engine();
        login(&engine).await;

        for _ in 0..5 {
            engine
                .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
                .await
                .unwrap();
        }
        let sixth = engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
            .await;
        assert!(matches!(sixth, Err(FaucetError::QuotaExhausted)));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.ledger.len(), 5);
        assert_eq!(snapshot.session.unwrap().requests_left, 0);
    }

    #[tokio::test]
    async fn test_chain_failure_leaves_quota_and_ledger_untouched() {
        let engine = test_engine();
        login(&engine).await;

        // The simulated backend rejects blank addresses.
        let result = engine
            .request_tokens(NetworkKey::Ethereum, "   ", 0.05, CAPTCHA)
            .await;
        assert!(matches!(result, Err(FaucetError::Chain(_))));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.session.unwrap().requests_left, 5);
        assert!(snapshot.ledger.is_empty());
        assert!(!snapshot.in_flight);
        assert_eq!(snapshot.status.unwrap().kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn test_logout_preserves_ledger_and_pools() {
        let engine = test_engine();
        login(&engine).await;
        engine
            .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
            .await
            .unwrap();

        engine.logout().await;

        let snapshot = engine.snapshot().await;
        assert!(snapshot.session.is_none());
        assert_eq!(snapshot.ledger.len(), 1);
        let pool = snapshot
            .pools
            .iter()
            .find(|p| p.network == NetworkKey::Ethereum)
            .unwrap();
        assert_eq!(pool.balance, 50.0 - 0.05);
    }

    #[tokio::test]
    async fn test_pool_is_not_clamped_at_zero() {
        let engine = test_engine();

        // The ethereum pool starts at 50.0; 101 grants of 0.5 drive it to
        // -0.5, re-logging in whenever the quota runs out.
        for round in 0..101u32 {
            if round % 5 == 0 {
                login(&engine).await;
            }
            engine
                .request_tokens(NetworkKey::Ethereum, "0xabc", 0.5, CAPTCHA)
                .await
                .unwrap();
        }

        let snapshot = engine.snapshot().await;
        let pool = snapshot
            .pools
            .iter()
            .find(|p| p.network == NetworkKey::Ethereum)
            .unwrap();
        assert_eq!(pool.balance, -0.5);
        assert_eq!(snapshot.ledger.len(), 101);
    }

    #[tokio::test]
    async fn test_network_switch_resets_amount_to_smallest() {
        let engine = test_engine();
        engine.select_amount(2.5).await.unwrap();
        assert_eq!(engine.snapshot().await.selected_amount, 2.5);

        let (network, amount) = engine.select_network(NetworkKey::Ethereum).await;
        assert_eq!(network, NetworkKey::Ethereum);
        assert_eq!(amount, 0.05);
        assert_eq!(engine.snapshot().await.selected_amount, 0.05);
    }

    #[tokio::test]
    async fn test_select_amount_rejects_off_menu_value() {
        let engine = test_engine();
        let result = engine.select_amount(99.0).await;
        assert!(matches!(result, Err(FaucetError::AmountNotOnMenu { .. })));
        assert_eq!(engine.snapshot().await.selected_amount, 0.5);
    }

    #[tokio::test]
    async fn test_balance_lookup_failure_yields_unknown_not_zero() {
        let engine = test_engine();

        engine.check_balance(NetworkKey::Ethereum, "0xabc").await.unwrap();
        assert_eq!(
            engine.snapshot().await.wallet_balance,
            BalanceState::Known {
                amount: SIMULATED_WALLET_BALANCE
            }
        );

        let result = engine.check_balance(NetworkKey::Ethereum, "  ").await;
        assert!(result.is_err());
        assert_eq!(engine.snapshot().await.wallet_balance, BalanceState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_rejected_while_in_flight() {
        let engine = engine_with(Duration::from_secs(2), Duration::from_secs(3));
        login(&engine).await;

        let background = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .request_tokens(NetworkKey::Ethereum, "0xabc", 0.05, CAPTCHA)
                    .await
            })
        };
        // Let the background request reach its simulated-latency sleep.
        tokio::task::yield_now().await;
        assert!(engine.snapshot().await.in_flight);

        let second = engine
            .request_tokens(NetworkKey::Ethereum, "0xdef", 0.05, CAPTCHA)
            .await;
        assert!(matches!(second, Err(FaucetError::RequestInFlight)));

        let first = background.await.expect("request task must not panic");
        assert!(first.is_ok());
        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.ledger.len(), 1);
        assert_eq!(snapshot.session.unwrap().requests_left, 4);
    }

    #[tokio::test]
    async fn test_error_kinds_are_stable() {
        assert_eq!(FaucetError::NotLoggedIn.kind(), "not_logged_in");
        assert_eq!(FaucetError::QuotaExhausted.kind(), "quota_exhausted");
        assert_eq!(FaucetError::CaptchaMismatch.kind(), "captcha_mismatch");
        assert_eq!(FaucetError::RequestInFlight.kind(), "request_in_flight");
    }
}
