use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::rpc::DEFAULT_DEVNET_ENDPOINT;
use crate::session::{Credentials, DEFAULT_QUOTA, DEMO_PASSWORD, DEMO_USERNAME};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub faucet: FaucetConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    /// Load configuration. The TOML file is optional: every field has a
    /// default, so the service runs with no environment at all. A file
    /// named via `SPIGOT_API_CONFIG` must exist; the fallback path
    /// `config/api.toml` is read only when present.
    pub fn load() -> Result<Self> {
        let configured_path = std::env::var("SPIGOT_API_CONFIG").ok();
        let path = configured_path
            .clone()
            .unwrap_or_else(|| "config/api.toml".to_string());
        assert!(!path.is_empty(), "Configuration path must be non-empty");
        assert!(
            path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(configured_path.is_some()));

        if let Ok(env_override) = std::env::var("SPIGOT_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        assert!(
            !self.chain.rpc_url.is_empty(),
            "Chain RPC endpoint must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        assert!(
            self.faucet.quota_per_login > 0,
            "Login quota must be positive"
        );
        assert!(
            !self.faucet.captcha_answer.is_empty(),
            "Captcha answer must be specified"
        );
        assert!(
            !self.session.username.is_empty() && !self.session.password.is_empty(),
            "Demo credentials must be specified"
        );
        self.chain.ensure_bounds()?;
        self.faucet.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 9123,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub request_timeout_ms: Option<u64>,
    pub confirm_poll_interval_ms: u64,
    pub confirm_poll_attempts: u32,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        assert!(
            self.confirm_poll_interval_ms >= 100,
            "Confirmation poll interval must be >= 100ms"
        );
        assert!(
            self.confirm_poll_interval_ms <= 10_000,
            "Confirmation poll interval must be <= 10 seconds"
        );
        Duration::from_millis(self.confirm_poll_interval_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.confirm_poll_attempts > 0,
            "Confirmation poll attempts must be positive"
        );
        assert!(
            self.confirm_poll_attempts <= 120,
            "Confirmation poll attempts exceed defensive limit"
        );
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_DEVNET_ENDPOINT.to_string(),
            request_timeout_ms: None,
            confirm_poll_interval_ms: 500,
            confirm_poll_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    pub quota_per_login: u32,
    pub captcha_answer: String,
    pub status_clear_secs: u64,
    pub simulated_delay_ms: u64,
}

impl FaucetConfig {
    pub fn status_clear(&self) -> Duration {
        Duration::from_secs(self.status_clear_secs)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.status_clear_secs >= 1,
            "Status banner lifetime must be at least one second"
        );
        assert!(
            self.status_clear_secs <= 60,
            "Status banner lifetime exceeds defensive limit"
        );
        assert!(
            self.simulated_delay_ms <= 30_000,
            "Simulated latency exceeds defensive limit"
        );
        Ok(())
    }
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            quota_per_login: DEFAULT_QUOTA,
            captcha_answer: "12345".to_string(),
            status_clear_secs: 3,
            simulated_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub username: String,
    pub password: String,
}

impl SessionConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: DEMO_USERNAME.to_string(),
            password: DEMO_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub balances_max_capacity: u64,
    pub balances_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.balances_max_capacity >= 16,
            "Balance cache capacity must be at least 16"
        );
        assert!(
            self.balances_ttl_seconds >= 1,
            "Balance cache TTL must be at least one second"
        );
        assert!(
            self.balances_ttl_seconds <= 3_600,
            "Balance cache TTL cannot exceed one hour"
        );
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            balances_max_capacity: 1_024,
            balances_ttl_seconds: 15,
        }
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
