mod chains;
mod config;
mod faucet;
mod http;
mod networks;
mod rpc;
mod session;
mod state;

use std::sync::Arc;

use crate::chains::{ChainRegistry, SolanaChain};
use crate::config::ApiConfig;
use crate::faucet::FaucetEngine;
use crate::rpc::SolanaRpcClient;
use crate::state::{ApiCache, AppState};
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;

    let rpc_client = SolanaRpcClient::new(&config.chain.rpc_url, config.chain.request_timeout())
        .context("Failed to initialize Solana RPC client")?;
    info!(
        "Solana RPC client ready for {} ({}ms timeout)",
        config.chain.rpc_url,
        rpc_client.timeout().as_millis()
    );
    let solana = SolanaChain::new(
        rpc_client,
        config.chain.confirm_poll_interval(),
        config.chain.confirm_poll_attempts,
    );
    let chains = ChainRegistry::new(solana, config.faucet.simulated_delay());

    let engine = Arc::new(FaucetEngine::new(
        config.session.credentials(),
        config.faucet.quota_per_login,
        config.faucet.captcha_answer.clone(),
        config.faucet.status_clear(),
        chains,
    ));
    let cache = Arc::new(ApiCache::new(&config.cache));
    let app_state = AppState::new(engine, cache);

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Spigot faucet API listening on {local_addr}");

    let router: Router = http::router(app_state);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server exited with error")?;

    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}
