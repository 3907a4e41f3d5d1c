//! Engine Configuration
//!
//! Endpoints, scheduling and aggregation settings for the engine.
//! Supports loading from environment variables with the TW_ prefix.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use tw_core::types::amount_string;
use tw_core::{
    TierTable, DEFAULT_INCOME_WINDOW, DEFAULT_POLL_INTERVAL,
    DEFAULT_REGISTRATION_APPROVE_AMOUNT, REGISTRATION_COOLDOWN_DAILY,
    REGISTRATION_COOLDOWN_SHORT,
};

use crate::retry::RetryStrategy;

/// Minimum time between two registration attempts for the same tier
///
/// Two values have been observed in deployed clients, 24 hours and 2 minutes.
/// Neither is authoritative, so both are named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// 24 hours
    Daily,
    /// 2 minutes
    Short,
    /// Explicit number of seconds
    Custom { secs: u64 },
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::Daily
    }
}

impl CooldownPolicy {
    /// Parse from string (`daily`, `short` or a number of seconds)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "24h" => Some(Self::Daily),
            "short" | "2m" => Some(Self::Short),
            other => other.parse().ok().map(|secs| Self::Custom { secs }),
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            CooldownPolicy::Daily => REGISTRATION_COOLDOWN_DAILY,
            CooldownPolicy::Short => REGISTRATION_COOLDOWN_SHORT,
            CooldownPolicy::Custom { secs } => Duration::from_secs(*secs),
        }
    }
}

/// How income pages are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeStrategy {
    /// Ask the ledger for exactly one page and trust its order
    ServerPaginated,
    /// Fetch a bounded window, sort and slice locally
    ClientAggregated { window: u64 },
}

impl Default for IncomeStrategy {
    fn default() -> Self {
        Self::ClientAggregated {
            window: DEFAULT_INCOME_WINDOW,
        }
    }
}

impl IncomeStrategy {
    /// Parse from string (`server` or `client`)
    pub fn parse(s: &str, window: u64) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "server" | "server-paginated" => Some(Self::ServerPaginated),
            "client" | "client-aggregated" => Some(Self::ClientAggregated { window }),
            _ => None,
        }
    }
}

/// Ledger gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRpcConfig {
    /// JSON-RPC endpoint URL
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
    /// Delay between receipt polls in milliseconds
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Give up waiting for a receipt after this many seconds
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,
    /// Whether the ledger accepts an income type filter argument
    #[serde(default = "default_true")]
    pub supports_income_filter: bool,
}

fn default_ledger_timeout() -> u64 {
    30
}

fn default_receipt_poll_ms() -> u64 {
    2_000
}

fn default_receipt_timeout() -> u64 {
    180
}

fn default_true() -> bool {
    true
}

impl Default for LedgerRpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            timeout_secs: 30,
            receipt_poll_interval_ms: 2_000,
            receipt_timeout_secs: 180,
            supports_income_filter: true,
        }
    }
}

impl LedgerRpcConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - TW_LEDGER_RPC_URL: gateway endpoint URL
    /// - TW_LEDGER_TIMEOUT_SECS: request timeout in seconds
    /// - TW_LEDGER_FILTERS: whether income filters are pushed to the ledger
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("TW_LEDGER_RPC_URL").unwrap_or(defaults.url),
            timeout_secs: env_parse("TW_LEDGER_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            supports_income_filter: env_bool("TW_LEDGER_FILTERS")
                .unwrap_or(defaults.supports_income_filter),
            ..defaults
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

/// Server-side signing service configuration
///
/// Both fields are optional here; a privileged call without them fails with
/// a configuration error rather than at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    pub url: Option<String>,
    /// Bearer token
    #[serde(skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: default_ledger_timeout(),
        }
    }
}

impl SignerConfig {
    /// Environment variables: TW_SIGNER_URL, TW_SIGNER_TOKEN
    pub fn from_env() -> Self {
        Self {
            url: env::var("TW_SIGNER_URL").ok().filter(|s| !s.is_empty()),
            token: env::var("TW_SIGNER_TOKEN").ok().filter(|s| !s.is_empty()),
            timeout_secs: default_ledger_timeout(),
        }
    }
}

/// Backend profile service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
    /// Retries for the profile fetch that follows a registration
    #[serde(default = "default_profile_attempts")]
    pub profile_max_attempts: u32,
    #[serde(default)]
    pub profile_retry: RetryStrategy,
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_profile_attempts() -> u32 {
    5
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3001".to_string(),
            timeout_secs: 10,
            profile_max_attempts: 5,
            profile_retry: RetryStrategy::default(),
        }
    }
}

impl BackendConfig {
    /// Environment variables: TW_BACKEND_URL, TW_BACKEND_TIMEOUT_SECS
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("TW_BACKEND_URL").unwrap_or(defaults.url),
            timeout_secs: env_parse("TW_BACKEND_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            ..defaults
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub ledger: LedgerRpcConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub income_strategy: IncomeStrategy,
    #[serde(default)]
    pub registration_cooldown: CooldownPolicy,
    /// Scheduler poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Sled directory for cooldown timestamps; in-memory when absent
    #[serde(default)]
    pub cooldown_db: Option<PathBuf>,
    /// Allowance requested before registering
    #[serde(with = "amount_string", default = "default_approve_amount")]
    pub registration_approve_amount: u128,
    #[serde(default)]
    pub tiers: TierTable,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_approve_amount() -> u128 {
    DEFAULT_REGISTRATION_APPROVE_AMOUNT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerRpcConfig::default(),
            signer: SignerConfig::default(),
            backend: BackendConfig::default(),
            income_strategy: IncomeStrategy::default(),
            registration_cooldown: CooldownPolicy::Daily,
            poll_interval_secs: default_poll_interval(),
            cooldown_db: None,
            registration_approve_amount: DEFAULT_REGISTRATION_APPROVE_AMOUNT,
            tiers: TierTable::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - TW_REGISTRATION_COOLDOWN: `daily`, `short` or seconds
    /// - TW_POLL_INTERVAL_SECS: scheduler poll interval
    /// - TW_INCOME_STRATEGY: `server` or `client`
    /// - TW_INCOME_WINDOW: window size for the client strategy
    /// - TW_COOLDOWN_DB: sled directory for cooldown timestamps
    ///
    /// Also reads the ledger, signer and backend variables.
    pub fn from_env() -> Self {
        let registration_cooldown = match env::var("TW_REGISTRATION_COOLDOWN") {
            Ok(raw) => CooldownPolicy::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Unrecognised TW_REGISTRATION_COOLDOWN, using daily");
                CooldownPolicy::Daily
            }),
            Err(_) => {
                warn!(
                    daily_secs = REGISTRATION_COOLDOWN_DAILY.as_secs(),
                    short_secs = REGISTRATION_COOLDOWN_SHORT.as_secs(),
                    "No registration cooldown configured; deployed clients used both 24h and 2min, defaulting to 24h"
                );
                CooldownPolicy::Daily
            }
        };

        let window = env_parse("TW_INCOME_WINDOW").unwrap_or(DEFAULT_INCOME_WINDOW);
        let income_strategy = env::var("TW_INCOME_STRATEGY")
            .ok()
            .and_then(|s| IncomeStrategy::parse(&s, window))
            .unwrap_or(IncomeStrategy::ClientAggregated { window });

        Self {
            ledger: LedgerRpcConfig::from_env(),
            signer: SignerConfig::from_env(),
            backend: BackendConfig::from_env(),
            income_strategy,
            registration_cooldown,
            poll_interval_secs: env_parse("TW_POLL_INTERVAL_SECS")
                .unwrap_or_else(default_poll_interval),
            cooldown_db: env::var("TW_COOLDOWN_DB").ok().map(PathBuf::from),
            registration_approve_amount: DEFAULT_REGISTRATION_APPROVE_AMOUNT,
            tiers: TierTable::default(),
        }
    }

    /// Create a development configuration (local node, short cooldown)
    pub fn development() -> Self {
        Self {
            ledger: LedgerRpcConfig {
                receipt_poll_interval_ms: 500,
                receipt_timeout_secs: 30,
                ..LedgerRpcConfig::default()
            },
            signer: SignerConfig {
                url: Some("http://127.0.0.1:8700".to_string()),
                token: None,
                timeout_secs: 10,
            },
            backend: BackendConfig {
                profile_retry: RetryStrategy::Fixed { delay_secs: 1 },
                ..BackendConfig::default()
            },
            registration_cooldown: CooldownPolicy::Short,
            poll_interval_secs: 15,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().map(|s| {
        let s = s.trim().to_lowercase();
        s == "true" || s == "1" || s == "yes"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_policy_parse() {
        assert_eq!(CooldownPolicy::parse("daily"), Some(CooldownPolicy::Daily));
        assert_eq!(CooldownPolicy::parse(" SHORT "), Some(CooldownPolicy::Short));
        assert_eq!(
            CooldownPolicy::parse("600"),
            Some(CooldownPolicy::Custom { secs: 600 })
        );
        assert_eq!(CooldownPolicy::parse("weekly"), None);
    }

    #[test]
    fn test_cooldown_durations() {
        assert_eq!(CooldownPolicy::Daily.duration(), Duration::from_secs(86_400));
        assert_eq!(CooldownPolicy::Short.duration(), Duration::from_secs(120));
        assert_eq!(
            CooldownPolicy::Custom { secs: 5 }.duration(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_income_strategy_parse() {
        assert_eq!(
            IncomeStrategy::parse("server", 10),
            Some(IncomeStrategy::ServerPaginated)
        );
        assert_eq!(
            IncomeStrategy::parse("client", 250),
            Some(IncomeStrategy::ClientAggregated { window: 250 })
        );
        assert_eq!(IncomeStrategy::parse("other", 1), None);
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.registration_cooldown, CooldownPolicy::Daily);
        assert_eq!(config.poll_interval(), Duration::from_secs(120));
        assert_eq!(config.backend.url, "http://localhost:3001");
        assert_eq!(config.backend.timeout_secs, 10);
        assert_eq!(config.tiers.len(), 4);
        assert!(config.signer.token.is_none());

        let dev = EngineConfig::development();
        assert_eq!(dev.registration_cooldown, CooldownPolicy::Short);
    }

    #[test]
    fn test_config_serde_defaults() {
        let json = r#"{"ledger":{"url":"http://node:8545"}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ledger.url, "http://node:8545");
        assert_eq!(config.ledger.timeout_secs, 30);
        assert!(config.ledger.supports_income_filter);
        assert_eq!(
            config.registration_approve_amount,
            DEFAULT_REGISTRATION_APPROVE_AMOUNT
        );
    }
}
