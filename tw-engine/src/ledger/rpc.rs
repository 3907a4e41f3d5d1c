//! Ledger JSON-RPC Client
//!
//! Talks to a ledger gateway that exposes each contract function as a
//! JSON-RPC method of the same name. Parameters are positional; addresses
//! travel as `0x` hex and integers as decimal strings. Writes carry the
//! sender as the first parameter and return a transaction hash.
//!
//! Receipts are polled through `getTransactionReceipt` until the transaction
//! is mined or the configured timeout elapses.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tw_core::{
    Address, DownlinePage, IncomePage, IncomeSummary, IncomeType, LevelIncome, ReferralPage,
    RoyaltyInfo, Sponsors, MATRIX_WIDTH,
};

use super::tuple;
use super::{Ledger, ReceiptStatus, TxHash, TxReceipt};
use crate::config::LedgerRpcConfig;
use crate::error::{EngineError, EngineResult};

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
    #[allow(dead_code)]
    id: Option<u64>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcError {
    /// Message plus revert data, so selectors embedded in `data` are visible
    fn full_text(&self) -> String {
        match &self.data {
            Some(Value::String(s)) => format!("{} {}", self.message, s),
            Some(other) => format!("{} {}", self.message, other),
            None => self.message.clone(),
        }
    }
}

/// Receipt as returned by the gateway
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    status: Value,
    #[serde(default)]
    block_number: Option<Value>,
}

/// Ledger client over the JSON-RPC gateway
pub struct RpcLedger {
    client: Client,
    config: LedgerRpcConfig,
    request_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(config: LedgerRpcConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("ledger http client: {}", e)))?;

        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &LedgerRpcConfig {
        &self.config
    }

    /// Make an RPC call and return the raw result
    async fn call(&self, method: &str, params: Value) -> EngineResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!(method, id, "Ledger RPC call");

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Network(format!("HTTP {} - {}", status, body)));
        }

        let rpc_response: RpcResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(EngineError::Rpc {
                code: error.code,
                message: error.full_text(),
            });
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    /// Read call; any failure is a read failure
    async fn read(&self, method: &str, params: Value) -> EngineResult<Value> {
        self.call(method, params).await.map_err(|e| match e {
            EngineError::Decode(_) => e,
            other => EngineError::Read(format!("{}: {}", method, other)),
        })
    }

    /// Write call; RPC errors carry the revert reason and are classified
    async fn write(&self, method: &str, params: Value) -> EngineResult<TxHash> {
        let result = self.call(method, params).await.map_err(|e| match e {
            EngineError::Rpc { message, .. } => EngineError::write(message),
            other => other,
        })?;

        let hash = result
            .as_str()
            .ok_or_else(|| EngineError::Decode(format!("{}: expected transaction hash", method)))?;
        let tx = TxHash::from_hex(hash)?;
        info!(method, tx = %tx, "Ledger write submitted");
        Ok(tx)
    }

    async fn fetch_receipt(&self, tx: &TxHash) -> EngineResult<Option<TxReceipt>> {
        let value = self
            .call("getTransactionReceipt", json!([tx.to_hex()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }

        let raw: RawReceipt = serde_json::from_value(value)?;
        Ok(Some(TxReceipt {
            tx_hash: *tx,
            status: parse_receipt_status(&raw.status)?,
            block_number: raw
                .block_number
                .as_ref()
                .and_then(|v| tuple::decode_uint("blockNumber", v).ok())
                .and_then(|n| u64::try_from(n).ok()),
        }))
    }
}

fn parse_receipt_status(v: &Value) -> EngineResult<ReceiptStatus> {
    let success = match v {
        Value::String(s) => matches!(s.to_lowercase().as_str(), "success" | "0x1" | "1"),
        Value::Number(n) => n.as_u64() == Some(1),
        Value::Bool(b) => *b,
        other => {
            return Err(EngineError::Decode(format!("unexpected receipt status {}", other)));
        }
    };
    Ok(if success {
        ReceiptStatus::Success
    } else {
        ReceiptStatus::Reverted
    })
}

fn filter_codes(filter: &[IncomeType]) -> Vec<u8> {
    filter.iter().map(|t| t.code()).collect()
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn current_level(&self, user: &Address) -> EngineResult<u8> {
        let v = self.read("getUserStats", json!([user.to_hex()])).await?;
        tuple::decode_current_level(&v)
    }

    async fn matrix_position(&self, user: &Address) -> EngineResult<Sponsors> {
        let v = self.read("getMatrixPosition", json!([user.to_hex()])).await?;
        tuple::decode_sponsors(&v)
    }

    async fn complete_stats(&self, user: &Address) -> EngineResult<IncomeSummary> {
        let v = self.read("getUserCompleteStats", json!([user.to_hex()])).await?;
        tuple::decode_complete_stats(&v)
    }

    async fn downline_by_depth(
        &self,
        user: &Address,
        depth: u32,
        start: u64,
        limit: u64,
    ) -> EngineResult<DownlinePage> {
        let v = self
            .read(
                "getDownlineByDepthPaginated",
                json!([user.to_hex(), depth, start.to_string(), limit.to_string()]),
            )
            .await?;
        tuple::decode_downline(&v)
    }

    async fn direct_referrals(
        &self,
        user: &Address,
        start: u64,
        limit: u64,
    ) -> EngineResult<ReferralPage> {
        let v = self
            .read(
                "getDirectReferralDataPaginated",
                json!([user.to_hex(), start.to_string(), limit.to_string()]),
            )
            .await?;
        tuple::decode_direct_referrals(&v)
    }

    async fn team_level_incomes(&self, user: &Address) -> EngineResult<Vec<LevelIncome>> {
        let v = self.read("getUserTeamStats", json!([user.to_hex()])).await?;
        tuple::decode_team_stats(&v)
    }

    async fn direct_commission(&self, user: &Address) -> EngineResult<u128> {
        let v = self.read("getUserStats", json!([user.to_hex()])).await?;
        tuple::decode_direct_commission(&v)
    }

    async fn referral_code(&self, user: &Address) -> EngineResult<String> {
        let v = self.read("getReferralCode", json!([user.to_hex()])).await?;
        tuple::decode_string("getReferralCode", &v)
    }

    async fn recent_income_events(
        &self,
        user: &Address,
        start: u64,
        limit: u64,
        filter: &[IncomeType],
    ) -> EngineResult<IncomePage> {
        let v = self
            .read(
                "getRecentIncomeEventsPaginated",
                json!([
                    user.to_hex(),
                    start.to_string(),
                    limit.to_string(),
                    filter_codes(filter)
                ]),
            )
            .await?;
        tuple::decode_income_events(&v)
    }

    async fn check_qualification(&self, user: &Address) -> EngineResult<Vec<bool>> {
        let v = self.read("checkQualification", json!([user.to_hex()])).await?;
        tuple::decode_bool_list("checkQualification", &v)
    }

    async fn user_royalty_info(&self, user: &Address) -> EngineResult<RoyaltyInfo> {
        let v = self.read("getUserRoyaltyInfo", json!([user.to_hex()])).await?;
        tuple::decode_royalty_info(&v)
    }

    async fn tier_achievers_count(&self) -> EngineResult<Vec<u64>> {
        let v = self.read("getTierAchieversCount", json!([])).await?;
        tuple::decode_u64_list("getTierAchieversCount", &v)
    }

    async fn level_activated_count(
        &self,
        user: &Address,
        depth: u32,
    ) -> EngineResult<[u64; MATRIX_WIDTH]> {
        let v = self
            .read("getLevelActivatedCount", json!([user.to_hex(), depth]))
            .await?;
        tuple::decode_level_activated_count(&v)
    }

    async fn next_distribution_time(&self, tier: usize) -> EngineResult<u64> {
        let v = self.read("getNextDistributionTime", json!([tier])).await?;
        let t = tuple::decode_uint("getNextDistributionTime", &v)?;
        u64::try_from(t)
            .map_err(|_| EngineError::Decode(format!("next distribution time {} out of range", t)))
    }

    async fn token_balance(&self, owner: &Address) -> EngineResult<u128> {
        let v = self.read("balanceOf", json!([owner.to_hex()])).await?;
        tuple::decode_uint("balanceOf", &v)
    }

    async fn token_allowance(&self, owner: &Address) -> EngineResult<u128> {
        let v = self.read("allowance", json!([owner.to_hex()])).await?;
        tuple::decode_uint("allowance", &v)
    }

    async fn approve(&self, owner: &Address, amount: u128) -> EngineResult<TxHash> {
        self.write("approve", json!([owner.to_hex(), amount.to_string()]))
            .await
    }

    async fn register(&self, user: &Address, referrer: &Address) -> EngineResult<TxHash> {
        self.write("register", json!([user.to_hex(), referrer.to_hex()]))
            .await
    }

    async fn upgrade(&self, user: &Address, level: u8) -> EngineResult<TxHash> {
        self.write("upgrade", json!([user.to_hex(), level])).await
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> EngineResult<TxReceipt> {
        let deadline = Instant::now() + self.config.receipt_timeout();
        let poll = self.config.receipt_poll_interval();

        loop {
            match self.fetch_receipt(tx).await {
                Ok(Some(receipt)) => {
                    debug!(tx = %tx, status = ?receipt.status, "Receipt received");
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) => warn!(tx = %tx, error = %e, "Receipt poll failed"),
            }

            if Instant::now() >= deadline {
                return Err(EngineError::Network(format!(
                    "timed out waiting for receipt of {}",
                    tx
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_status_forms() {
        assert_eq!(parse_receipt_status(&json!("success")).unwrap(), ReceiptStatus::Success);
        assert_eq!(parse_receipt_status(&json!("0x1")).unwrap(), ReceiptStatus::Success);
        assert_eq!(parse_receipt_status(&json!("reverted")).unwrap(), ReceiptStatus::Reverted);
        assert_eq!(parse_receipt_status(&json!(0)).unwrap(), ReceiptStatus::Reverted);
        assert!(parse_receipt_status(&json!(null)).is_err());
    }

    #[test]
    fn test_rpc_error_text_includes_data() {
        let err = RpcError {
            code: 3,
            message: "execution reverted".into(),
            data: Some(json!("0xe450d38c0000")),
        };
        let classified = EngineError::write(err.full_text());
        assert_eq!(
            classified.failure_cause(),
            Some(tw_core::FailureCause::InsufficientBalance)
        );
    }

    #[test]
    fn test_filter_codes() {
        assert_eq!(
            filter_codes(&[IncomeType::LevelIncome, IncomeType::DirectReferral]),
            vec![2, 0]
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_read_error() {
        let ledger = RpcLedger::new(LedgerRpcConfig {
            url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
            ..LedgerRpcConfig::default()
        })
        .unwrap();

        let err = ledger.current_level(&Address::ZERO).await.unwrap_err();
        assert!(matches!(err, EngineError::Read(_)));
    }
}
