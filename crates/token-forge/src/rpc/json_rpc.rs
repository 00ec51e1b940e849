use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chain_sol::{address_to_bytes, Pubkey, Signature};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::rpc::errors::RpcError;
use crate::rpc::ledger_rpc::{Commitment, LedgerRpc, SendOptions, SignatureStatus};
use crate::types::FreshnessToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Solana JSON-RPC 2.0 over HTTP.
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusValue {
    slot: u64,
    confirmations: Option<usize>,
    err: Option<Value>,
    confirmation_status: Option<Commitment>,
}

impl From<StatusValue> for SignatureStatus {
    fn from(value: StatusValue) -> Self {
        SignatureStatus {
            slot: value.slot,
            confirmations: value.confirmations,
            err: value.err.map(|e| e.to_string()),
            confirmation_status: value.confirmation_status,
        }
    }
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, commitment: Commitment) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            commitment,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        debug!(method, id, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = response.json().await?;
        parse_response(payload)
    }

    fn commitment_config(&self) -> Value {
        json!({ "commitment": self.commitment.as_str() })
    }
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn parse_response<T: DeserializeOwned>(payload: Value) -> Result<T, RpcError> {
    let response: RpcResponse<T> = serde_json::from_value(payload)?;
    if let Some(error) = response.error {
        return Err(RpcError::Node {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| RpcError::InvalidResponse("response has neither result nor error".into()))
}

fn send_config(options: &SendOptions) -> Value {
    let mut config = json!({
        "encoding": "base64",
        "skipPreflight": options.skip_preflight,
        "preflightCommitment": options.preflight_commitment.as_str(),
    });
    if let Some(max_retries) = options.max_retries {
        config["maxRetries"] = json!(max_retries);
    }
    config
}

#[async_trait]
impl LedgerRpc for JsonRpcClient {
    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64) -> Result<u64, RpcError> {
        self.call(
            "getMinimumBalanceForRentExemption",
            json!([data_len, self.commitment_config()]),
        )
        .await
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, RpcError> {
        let balance: WithContext<u64> = self
            .call(
                "getBalance",
                json!([pubkey.to_string(), self.commitment_config()]),
            )
            .await?;
        Ok(balance.value)
    }

    async fn get_latest_blockhash(&self) -> Result<FreshnessToken, RpcError> {
        let latest: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([self.commitment_config()]))
            .await?;
        let blockhash = address_to_bytes(&latest.value.blockhash)
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {e}")))?;
        Ok(FreshnessToken {
            blockhash,
            last_valid_block_height: latest.value.last_valid_block_height,
        })
    }

    async fn send_transaction(
        &self,
        wire_transaction: &[u8],
        options: &SendOptions,
    ) -> Result<Signature, RpcError> {
        let encoded = STANDARD.encode(wire_transaction);
        let signature: String = self
            .call("sendTransaction", json!([encoded, send_config(options)]))
            .await?;
        signature
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("signature: {e}")))
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        let encoded: Vec<String> = signatures.iter().map(Signature::to_string).collect();
        let statuses: WithContext<Vec<Option<StatusValue>>> = self
            .call(
                "getSignatureStatuses",
                json!([encoded, { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(statuses
            .value
            .into_iter()
            .map(|status| status.map(SignatureStatus::from))
            .collect())
    }

    async fn get_block_height(&self) -> Result<u64, RpcError> {
        self.call("getBlockHeight", json!([self.commitment_config()]))
            .await
    }
}
