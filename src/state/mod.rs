use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;

use crate::config::CacheConfig;
use crate::faucet::FaucetEngine;
use crate::networks::NetworkKey;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FaucetEngine>,
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<FaucetEngine>, cache: Arc<ApiCache>) -> Self {
        assert!(
            cache.balance_capacity >= 16,
            "Balance cache capacity must be configured"
        );
        Self {
            engine,
            cache,
            start_time: Instant::now(),
        }
    }
}

pub struct ApiCache {
    /// Recent balance lookups keyed by network and address.
    pub balances: Cache<(NetworkKey, String), f64>,
    pub balance_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.balances_max_capacity >= 16,
            "Balance cache capacity threshold"
        );
        assert!(
            config.balances_ttl_seconds >= 1,
            "Balance cache TTL threshold"
        );

        let balances = Cache::builder()
            .max_capacity(config.balances_max_capacity)
            .time_to_live(Duration::from_secs(config.balances_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.balances_ttl_seconds / 2 + 1))
            .build();

        Self {
            balances,
            balance_capacity: config.balances_max_capacity,
        }
    }
}
