//! Backend Profile Client
//!
//! The backend maps wallet addresses to short display ids and resolves
//! referral codes. It is eventually consistent with the ledger: right after
//! a registration confirms, the profile may not exist yet.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use tw_core::Address;

use crate::config::BackendConfig;
use crate::error::{EngineError, EngineResult};
use crate::retry::{retry_until_some, RetryStrategy};

/// Profile record kept by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub userid: String,
    pub created_at: String,
    #[serde(default)]
    pub total_referrals: u64,
}

/// Owner of a referral code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralInfo {
    pub referring_wallet: Address,
}

/// Off-chain profile and referral lookups
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn register(&self, wallet: &Address) -> EngineResult<()>;

    async fn register_with_referral(&self, wallet: &Address, referred_by: &str)
        -> EngineResult<()>;

    /// `None` when the backend does not know the address yet
    async fn user_profile(&self, wallet: &Address) -> EngineResult<Option<UserProfile>>;

    /// Display ids for every known address; unknown addresses are absent
    async fn bulk_lookup(&self, wallets: &[Address]) -> EngineResult<HashMap<Address, String>>;

    async fn referral_info(&self, code: &str) -> EngineResult<ReferralInfo>;
}

/// Fetch a profile, retrying while the backend catches up with the ledger
pub async fn fetch_profile_with_retry(
    service: &dyn ProfileService,
    wallet: &Address,
    strategy: &RetryStrategy,
    max_attempts: u32,
) -> EngineResult<Option<UserProfile>> {
    let profile = retry_until_some(strategy, max_attempts, || service.user_profile(wallet)).await?;
    if profile.is_none() {
        warn!(address = %wallet, max_attempts, "Profile still missing after retries");
    }
    Ok(profile)
}

#[derive(Debug, Serialize)]
struct RegisterBody<'a> {
    wallet_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    referred_by: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BulkLookupBody {
    wallet_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the backend
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("backend http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn error_from(response: Response) -> EngineError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        EngineError::Backend { status, message }
    }

    async fn post_register(&self, path: &str, body: RegisterBody<'_>) -> EngineResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(&body).send().await?;

        if response.status().is_success() {
            debug!(url = %url, "Backend registration accepted");
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

#[async_trait]
impl ProfileService for BackendClient {
    async fn register(&self, wallet: &Address) -> EngineResult<()> {
        self.post_register(
            "/register",
            RegisterBody {
                wallet_address: wallet.to_hex(),
                referred_by: None,
            },
        )
        .await
    }

    async fn register_with_referral(
        &self,
        wallet: &Address,
        referred_by: &str,
    ) -> EngineResult<()> {
        self.post_register(
            "/register-referred",
            RegisterBody {
                wallet_address: wallet.to_hex(),
                referred_by: Some(referred_by),
            },
        )
        .await
    }

    async fn user_profile(&self, wallet: &Address) -> EngineResult<Option<UserProfile>> {
        let url = format!("{}/user/{}", self.base_url, wallet.to_hex());
        let response = self.client.get(&url).send().await?;

        match response.status() {
            s if s.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn bulk_lookup(&self, wallets: &[Address]) -> EngineResult<HashMap<Address, String>> {
        if wallets.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!("{}/bulk-lookup", self.base_url);
        let body = BulkLookupBody {
            wallet_addresses: wallets.iter().map(|a| a.to_hex()).collect(),
        };
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        // keyed by lowercase address
        let raw: HashMap<String, String> = response.json().await?;
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| match Address::from_hex(&k) {
                Ok(addr) => Some((addr, v)),
                Err(e) => {
                    debug!(key = %k, error = %e, "Skipping malformed bulk lookup key");
                    None
                }
            })
            .collect())
    }

    async fn referral_info(&self, code: &str) -> EngineResult<ReferralInfo> {
        let url = format!("{}/referral/{}", self.base_url, code);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

/// In-memory profile service
///
/// A registered profile becomes visible only after `visible_after` lookups,
/// which reproduces the backend lagging behind the ledger.
#[derive(Default)]
pub struct MemoryProfileService {
    inner: Mutex<MemoryProfiles>,
}

#[derive(Default)]
struct MemoryProfiles {
    profiles: HashMap<Address, UserProfile>,
    referral_codes: HashMap<String, Address>,
    registrations: Vec<(Address, Option<String>)>,
    lookups: HashMap<Address, u32>,
    visible_after: u32,
    next_id: u64,
}

impl MemoryProfileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide new profiles for the first `n` lookups
    pub fn with_lag(n: u32) -> Self {
        let service = Self::default();
        service.lock().visible_after = n;
        service
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryProfiles> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_referral_code(&self, code: impl Into<String>, wallet: Address) {
        self.lock().referral_codes.insert(code.into(), wallet);
    }

    /// Registrations received, with the referral id when one was given
    pub fn registrations(&self) -> Vec<(Address, Option<String>)> {
        self.lock().registrations.clone()
    }

    fn insert(&self, wallet: &Address, referred_by: Option<&str>) {
        let mut inner = self.lock();
        inner.next_id += 1;
        let userid = format!("TW{:05}", inner.next_id);
        inner.profiles.entry(*wallet).or_insert(UserProfile {
            userid,
            created_at: chrono::Utc::now().to_rfc3339(),
            total_referrals: 0,
        });
        inner
            .registrations
            .push((*wallet, referred_by.map(str::to_string)));
    }
}

#[async_trait]
impl ProfileService for MemoryProfileService {
    async fn register(&self, wallet: &Address) -> EngineResult<()> {
        self.insert(wallet, None);
        Ok(())
    }

    async fn register_with_referral(
        &self,
        wallet: &Address,
        referred_by: &str,
    ) -> EngineResult<()> {
        self.insert(wallet, Some(referred_by));
        Ok(())
    }

    async fn user_profile(&self, wallet: &Address) -> EngineResult<Option<UserProfile>> {
        let mut inner = self.lock();
        let seen = {
            let n = inner.lookups.entry(*wallet).or_insert(0);
            *n += 1;
            *n
        };
        if seen <= inner.visible_after {
            return Ok(None);
        }
        Ok(inner.profiles.get(wallet).cloned())
    }

    async fn bulk_lookup(&self, wallets: &[Address]) -> EngineResult<HashMap<Address, String>> {
        let inner = self.lock();
        Ok(wallets
            .iter()
            .filter_map(|w| inner.profiles.get(w).map(|p| (*w, p.userid.clone())))
            .collect())
    }

    async fn referral_info(&self, code: &str) -> EngineResult<ReferralInfo> {
        self.lock()
            .referral_codes
            .get(code)
            .map(|w| ReferralInfo {
                referring_wallet: *w,
            })
            .ok_or_else(|| EngineError::Backend {
                status: 404,
                message: format!("Referral code {} not found", code),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_retry_waits_for_backend() {
        let service = MemoryProfileService::with_lag(2);
        service.register_with_referral(&addr(1), "TW00042").await.unwrap();

        let profile = fetch_profile_with_retry(
            &service,
            &addr(1),
            &RetryStrategy::Fixed { delay_secs: 1 },
            5,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(profile.userid, "TW00001");
        assert_eq!(
            service.registrations(),
            vec![(addr(1), Some("TW00042".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_retry_gives_up_with_none() {
        let service = MemoryProfileService::with_lag(10);
        service.register(&addr(1)).await.unwrap();

        let profile = fetch_profile_with_retry(
            &service,
            &addr(1),
            &RetryStrategy::Fixed { delay_secs: 1 },
            3,
        )
        .await
        .unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_bulk_lookup_and_referral() {
        let service = MemoryProfileService::new();
        service.register(&addr(1)).await.unwrap();
        service.add_referral_code("TW00001", addr(1));

        let ids = service.bulk_lookup(&[addr(1), addr(2)]).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[&addr(1)], "TW00001");

        let info = service.referral_info("TW00001").await.unwrap();
        assert_eq!(info.referring_wallet, addr(1));
        assert!(matches!(
            service.referral_info("nope").await,
            Err(EngineError::Backend { status: 404, .. })
        ));
    }

    #[test]
    fn test_register_body_shape() {
        let body = serde_json::to_value(RegisterBody {
            wallet_address: addr(1).to_hex(),
            referred_by: None,
        })
        .unwrap();
        assert!(body.get("referred_by").is_none());
        assert!(body["wallet_address"].as_str().unwrap().starts_with("0x"));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = BackendClient::new(&BackendConfig {
            url: "http://localhost:3001/".into(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001");
    }
}
