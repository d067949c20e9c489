use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::market_data::FetcherConfig;
use crate::models::Locale;

/// Process configuration, read from the environment (and `.env` when present)
#[derive(Clone)]
pub struct AppConfig {
    /// Control API listen address
    pub bind_addr: SocketAddr,

    /// JSON file holding subscriptions and languages
    pub state_file: PathBuf,

    /// Telegram bot token; messages are only logged when unset
    pub bot_token: Option<String>,

    pub telegram_api_url: String,

    pub coingecko_api_url: String,

    /// Optional CoinGecko demo API key
    pub coingecko_api_key: Option<String>,

    /// Locale for users who never picked one
    pub default_locale: Locale,

    /// Bound for every upstream call (fetch and send)
    pub request_timeout: Duration,

    pub snapshot_cache_ttl: Duration,

    pub directory_cache_ttl: Duration,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid DEFAULT_LOCALE: {0} (expected ru, en or de)")]
    InvalidLocale(String),
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_state_file() -> PathBuf {
    PathBuf::from("user_data.json")
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_coingecko_api_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_snapshot_ttl_secs() -> u64 {
    120
}

fn default_directory_ttl_secs() -> u64 {
    3600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            state_file: default_state_file(),
            bot_token: None,
            telegram_api_url: default_telegram_api_url(),
            coingecko_api_url: default_coingecko_api_url(),
            coingecko_api_key: None,
            default_locale: Locale::default(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            snapshot_cache_ttl: Duration::from_secs(default_snapshot_ttl_secs()),
            directory_cache_ttl: Duration::from_secs(default_directory_ttl_secs()),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from an arbitrary variable lookup
    ///
    /// Unset or blank variables take their defaults; set but unparsable ones
    /// are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secs = |var: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match get(var) {
                Some(value) => value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::InvalidValue { var, value }),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let bind_addr = match get("BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: "BIND_ADDR",
                value,
            })?,
            None => default_bind_addr(),
        };

        let default_locale = match get("DEFAULT_LOCALE") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidLocale(value))?,
            None => Locale::default(),
        };

        Ok(Self {
            bind_addr,
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_state_file),
            bot_token: get("BOT_TOKEN"),
            telegram_api_url: get("TELEGRAM_API_URL").unwrap_or_else(default_telegram_api_url),
            coingecko_api_url: get("COINGECKO_API_URL").unwrap_or_else(default_coingecko_api_url),
            coingecko_api_key: get("COINGECKO_API_KEY"),
            default_locale,
            request_timeout: secs("REQUEST_TIMEOUT_SECS", default_request_timeout_secs())?,
            snapshot_cache_ttl: secs("SNAPSHOT_CACHE_TTL_SECS", default_snapshot_ttl_secs())?,
            directory_cache_ttl: secs("DIRECTORY_CACHE_TTL_SECS", default_directory_ttl_secs())?,
        })
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            snapshot_ttl: self.snapshot_cache_ttl,
            directory_ttl: self.directory_cache_ttl,
            request_timeout: self.request_timeout,
        }
    }
}

// Keeps the bot token out of logs
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("state_file", &self.state_file)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("telegram_api_url", &self.telegram_api_url)
            .field("coingecko_api_url", &self.coingecko_api_url)
            .field("coingecko_api_key", &self.coingecko_api_key.as_ref().map(|_| "<redacted>"))
            .field("default_locale", &self.default_locale)
            .field("request_timeout", &self.request_timeout)
            .field("snapshot_cache_ttl", &self.snapshot_cache_ttl)
            .field("directory_cache_ttl", &self.directory_cache_ttl)
            .finish()
    }
}
