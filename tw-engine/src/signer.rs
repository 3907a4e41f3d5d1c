//! Privileged write gateway
//!
//! `registerQualifiedTiers` and `distributeTierRoyalties` must be signed by
//! the operator key. That key never lives in this process: calls go to a
//! signing service over HTTPS with a bearer token, and the service submits
//! the transaction and returns its hash. Confirmation is then awaited through
//! the regular [`Ledger`](crate::ledger::Ledger).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use tw_core::Address;

use crate::config::SignerConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::TxHash;

/// Operator-signed writes
#[async_trait]
pub trait PrivilegedGateway: Send + Sync {
    /// Register every tier the participant currently qualifies for
    async fn register_qualified_tiers(&self, user: &Address) -> EngineResult<TxHash>;

    /// Pay out today's royalty for one tier
    async fn distribute_tier_royalties(&self, tier: usize) -> EngineResult<TxHash>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum SignRequest {
    RegisterQualifiedTiers { user: String },
    DistributeTierRoyalties { tier: usize },
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct SignErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

/// HTTP client for the signing service
pub struct SigningServiceClient {
    client: Client,
    config: SignerConfig,
}

impl SigningServiceClient {
    pub fn new(config: SignerConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("signer http client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// URL and token, or a configuration error naming what is missing
    fn credentials(&self) -> EngineResult<(&str, &str)> {
        let url = self.config.url.as_deref().ok_or_else(|| {
            EngineError::Configuration("signing service URL (TW_SIGNER_URL) is not set".into())
        })?;
        let token = self.config.token.as_deref().ok_or_else(|| {
            EngineError::Configuration("signing service token (TW_SIGNER_TOKEN) is not set".into())
        })?;
        Ok((url, token))
    }

    async fn submit(&self, request: SignRequest) -> EngineResult<TxHash> {
        let (url, token) = self.credentials()?;
        let endpoint = format!("{}/v1/sign", url.trim_end_matches('/'));

        debug!(?request, "Submitting privileged write");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(EngineError::Configuration(format!(
                "signing service rejected credentials (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SignErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            // revert text from the chain comes back here
            return Err(EngineError::write(message));
        }

        let body: SignResponse = response.json().await?;
        let tx = TxHash::from_hex(&body.tx_hash)?;
        info!(tx = %tx, "Privileged write submitted");
        Ok(tx)
    }
}

#[async_trait]
impl PrivilegedGateway for SigningServiceClient {
    async fn register_qualified_tiers(&self, user: &Address) -> EngineResult<TxHash> {
        self.submit(SignRequest::RegisterQualifiedTiers {
            user: user.to_hex(),
        })
        .await
    }

    async fn distribute_tier_royalties(&self, tier: usize) -> EngineResult<TxHash> {
        self.submit(SignRequest::DistributeTierRoyalties { tier }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let client = SigningServiceClient::new(SignerConfig {
            url: Some("http://127.0.0.1:1".into()),
            token: None,
            timeout_secs: 1,
        })
        .unwrap();

        let err = client.distribute_tier_royalties(0).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("TW_SIGNER_TOKEN"));
    }

    #[tokio::test]
    async fn test_missing_url_is_configuration_error() {
        let client = SigningServiceClient::new(SignerConfig::default()).unwrap();
        let err = client
            .register_qualified_tiers(&Address::ZERO)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(SignRequest::DistributeTierRoyalties { tier: 2 }).unwrap();
        assert_eq!(body["action"], "distribute_tier_royalties");
        assert_eq!(body["tier"], 2);
    }
}
