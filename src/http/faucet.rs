//! Faucet HTTP handlers for testnet token distribution.
//!
//! This module provides the faucet endpoints:
//! - Token requests, real on Solana devnet and simulated elsewhere
//! - Balance lookups with short-TTL memoization
//! - Request history windowing
//! - Network configuration tables and active-network selection

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::networks::{
    NETWORKS, NetworkKey, default_amount, explorer_tx_url, format_amount,
};
use crate::state::AppState;

use super::{HttpError, map_faucet_error};

/// Maximum entries to return from the history endpoint.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Defensive cap on recipient address length.
pub const MAX_ADDRESS_LEN: usize = 128;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(request_tokens))
        .route("/balance/{network}/{address}", get(get_balance))
        .route("/history", get(get_history))
        .route("/networks", get(get_networks))
        .route("/network", post(select_network))
        .route("/amount", post(select_amount))
}

/// Request body for a faucet grant.
#[derive(Debug, Deserialize)]
pub struct FaucetRequestBody {
    /// Chain key, e.g. "solana"
    pub network: String,
    /// Recipient wallet address
    pub address: String,
    /// Optional amount; defaults to the network's smallest menu entry
    pub amount: Option<f64>,
    /// Captcha answer
    pub captcha: String,
}

/// Response for a successful faucet grant.
#[derive(Debug, Serialize)]
pub struct FaucetRequestResponse {
    pub success: bool,
    pub tx_hash: String,
    pub network: NetworkKey,
    pub amount: f64,
    pub amount_formatted: String,
    pub recipient: String,
    pub explorer_url: String,
    pub requests_left: u32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub network: NetworkKey,
    pub address: String,
    /// "known" or "unknown" — unknown is distinct from a zero balance.
    pub state: &'static str,
    pub balance: Option<f64>,
    pub balance_formatted: Option<String>,
    pub cached: bool,
}

/// Faucet history entry.
#[derive(Debug, Serialize)]
pub struct FaucetHistoryEntry {
    pub tx_hash: String,
    pub network: NetworkKey,
    pub amount: f64,
    pub amount_formatted: String,
    pub explorer_url: String,
    pub timestamp: DateTime<Utc>,
}

/// History query parameters.
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub network: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NetworkInfo {
    pub key: NetworkKey,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
    pub explorer_base: &'static str,
    pub amounts: &'static [f64],
    pub default_amount: f64,
    /// False for networks served by the simulated backend.
    pub live: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectNetworkBody {
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub network: NetworkKey,
    pub selected_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct SelectAmountBody {
    pub amount: f64,
}

/// Request tokens from the faucet.
async fn request_tokens(
    State(state): State<AppState>,
    Json(request): Json<FaucetRequestBody>,
) -> Result<Json<FaucetRequestResponse>, HttpError> {
    let network = parse_network(&request.network)?;
    validate_address(&request.address)?;

    let amount = request.amount.unwrap_or_else(|| default_amount(network));

    let tx = state
        .engine
        .request_tokens(network, &request.address, amount, &request.captcha)
        .await
        .map_err(map_faucet_error)?;

    let requests_left = state
        .engine
        .snapshot()
        .await
        .session
        .map(|session| session.requests_left)
        .unwrap_or(0);

    info!(
        "Faucet sent {} to {} on {} (tx: {})",
        format_amount(network, amount),
        request.address,
        network,
        tx.hash
    );

    Ok(Json(FaucetRequestResponse {
        success: true,
        explorer_url: explorer_tx_url(network, &tx.hash),
        tx_hash: tx.hash,
        network,
        amount,
        amount_formatted: format_amount(network, amount),
        recipient: request.address,
        requests_left,
        message: "Tokens sent! They should arrive within a few seconds.".to_string(),
    }))
}

/// Look up a wallet balance, memoized for a short TTL.
async fn get_balance(
    State(state): State<AppState>,
    Path((network, address)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, HttpError> {
    let key = parse_network(&network)?;
    validate_address(&address)?;

    let cache_key = (key, address.clone());
    if let Some(balance) = state.cache.balances.get(&cache_key).await {
        return Ok(Json(balance_known(key, address, balance, true)));
    }

    match state.engine.check_balance(key, &address).await {
        Ok(balance) => {
            state.cache.balances.insert(cache_key, balance).await;
            Ok(Json(balance_known(key, address, balance, false)))
        }
        Err(err) => {
            warn!("Balance lookup for {address} on {key} failed: {err}");
            Ok(Json(BalanceResponse {
                network: key,
                address,
                state: "unknown",
                balance: None,
                balance_formatted: None,
                cached: false,
            }))
        }
    }
}

/// Get faucet request history, newest first.
async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<FaucetHistoryEntry>>, HttpError> {
    let limit = query.limit.unwrap_or(20).min(MAX_HISTORY_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let network_filter = match query.network.as_deref() {
        Some(raw) => Some(parse_network(raw)?),
        None => None,
    };

    let ledger = state.engine.ledger().await;
    let entries: Vec<FaucetHistoryEntry> = ledger
        .into_iter()
        .filter(|tx| network_filter.is_none_or(|key| tx.network == key))
        .skip(offset)
        .take(limit)
        .map(|tx| FaucetHistoryEntry {
            explorer_url: explorer_tx_url(tx.network, &tx.hash),
            amount_formatted: format_amount(tx.network, tx.amount),
            tx_hash: tx.hash,
            network: tx.network,
            amount: tx.amount,
            timestamp: tx.timestamp,
        })
        .collect();

    assert!(
        entries.len() <= limit,
        "Returned more history entries than requested"
    );

    Ok(Json(entries))
}

/// The static network configuration tables.
async fn get_networks(State(state): State<AppState>) -> Json<Vec<NetworkInfo>> {
    let networks = NETWORKS
        .iter()
        .map(|config| NetworkInfo {
            key: config.key,
            name: config.name,
            symbol: config.symbol,
            decimals: config.decimals,
            explorer_base: config.explorer_base,
            amounts: config.amounts,
            default_amount: config.amounts[0],
            live: state.engine.network_is_live(config.key),
        })
        .collect();
    Json(networks)
}

/// Switch the active network; the selected amount resets to the new
/// network's smallest menu entry.
async fn select_network(
    State(state): State<AppState>,
    Json(request): Json<SelectNetworkBody>,
) -> Result<Json<SelectionResponse>, HttpError> {
    let key = parse_network(&request.network)?;
    let (network, selected_amount) = state.engine.select_network(key).await;
    Ok(Json(SelectionResponse {
        network,
        selected_amount,
    }))
}

/// Pick a request amount from the active network's menu.
async fn select_amount(
    State(state): State<AppState>,
    Json(request): Json<SelectAmountBody>,
) -> Result<Json<SelectionResponse>, HttpError> {
    state
        .engine
        .select_amount(request.amount)
        .await
        .map_err(map_faucet_error)?;
    let snapshot = state.engine.snapshot().await;
    Ok(Json(SelectionResponse {
        network: snapshot.selected_network,
        selected_amount: snapshot.selected_amount,
    }))
}

fn parse_network(raw: &str) -> Result<NetworkKey, HttpError> {
    NetworkKey::parse(raw).ok_or_else(|| {
        HttpError::with_kind(
            StatusCode::BAD_REQUEST,
            format!("Unknown network '{raw}'"),
            "unknown_network",
        )
    })
}

fn validate_address(address: &str) -> Result<(), HttpError> {
    if address.trim().is_empty() || address.len() > MAX_ADDRESS_LEN {
        return Err(HttpError::with_kind(
            StatusCode::BAD_REQUEST,
            "Invalid wallet address format".to_string(),
            "invalid_address",
        ));
    }
    Ok(())
}

fn balance_known(
    network: NetworkKey,
    address: String,
    balance: f64,
    cached: bool,
) -> BalanceResponse {
    BalanceResponse {
        network,
        address,
        state: "known",
        balance: Some(balance),
        balance_formatted: Some(format_amount(network, balance)),
        cached,
    }
}
