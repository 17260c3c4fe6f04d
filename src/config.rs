use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub smtp: SmtpConfig,
    pub dispatcher: DispatcherConfig,
    pub marketplace: MarketplaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/pricewatch.db".to_string(),
            max_connections: 10,
            acquire_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Per-attempt request timeout in seconds.
    pub timeout_seconds: u64,
    /// Total attempts before giving up on a URL.
    pub max_attempts: u32,
    /// Optional proxy URIs; one is picked at random per attempt.
    pub proxy_pool: Vec<String>,
    /// Base of the exponential backoff between attempts. 1000 ms gives the
    /// 1s/2s/4s ladder; tests dial it down.
    pub backoff_base_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 15,
            max_attempts: 3,
            proxy_pool: Vec::new(),
            backoff_base_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: "noreply@pricewatch.local".to_string(),
            from_name: "Pricewatch".to_string(),
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Listings loaded per database round-trip.
    pub chunk_size: u32,
    /// Concurrent check tasks within one cycle.
    pub max_concurrent_checks: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_concurrent_checks: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    /// Marketplace domains accepted when registering a listing URL.
    pub domains: Vec<String>,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            domains: vec![
                "olx.pl".to_string(),
                "olx.ua".to_string(),
                "olx.ro".to_string(),
                "olx.bg".to_string(),
                "olx.pt".to_string(),
            ],
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.fetcher.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Fetcher timeout_seconds must be greater than 0".into(),
            ));
        }

        if self.fetcher.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Fetcher max_attempts must be greater than 0".into(),
            ));
        }

        if self.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if self.dispatcher.chunk_size == 0 {
            return Err(ConfigError::Message(
                "Dispatcher chunk_size must be greater than 0".into(),
            ));
        }

        if self.dispatcher.max_concurrent_checks == 0 {
            return Err(ConfigError::Message(
                "Dispatcher max_concurrent_checks must be greater than 0".into(),
            ));
        }

        if self.marketplace.domains.is_empty() {
            return Err(ConfigError::Message(
                "Marketplace domains must not be empty".into(),
            ));
        }

        Ok(())
    }
}
