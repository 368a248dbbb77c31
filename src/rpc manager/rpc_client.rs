//! Typed JSON-RPC client
//!
//! Maps each ledger method onto a typed request and response. There is no
//! retry logic here: a failed call surfaces as an [`RpcError`] and the
//! caller decides what to do with it.

use std::str::FromStr;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};
use tracing::debug;

use super::http_sender::HttpSender;
use super::rpc_config::RpcEndpointConfig;
use super::rpc_errors::RpcError;
use super::rpc_request::RpcRequest;
use super::rpc_response::{
    Account, FeeCalculator, Response, RpcBlockhash, RpcFeeCalculator,
    RpcSimulateTransactionResult, SignatureStatus, UiAccount,
};
use super::rpc_sender::{RpcSender, RpcTransportStats};
use crate::metrics::metrics;
use crate::tx_builder::shortvec;

/// Options attached to `sendTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTransactionConfig {
    pub skip_preflight: bool,
    pub preflight_commitment: Option<String>,
}

impl Default for SendTransactionConfig {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Some("confirmed".to_string()),
        }
    }
}

/// Client handle; share it between controllers behind an `Arc`
pub struct RpcClient {
    sender: Box<dyn RpcSender>,
    send_config: SendTransactionConfig,
    search_transaction_history: bool,
}

impl RpcClient {
    /// HTTP client for `url` with default options
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Ok(Self::new_sender(HttpSender::new(url)?))
    }

    pub fn from_config(config: &RpcEndpointConfig) -> Result<Self, RpcError> {
        Ok(Self {
            sender: Box::new(HttpSender::from_config(config)?),
            send_config: SendTransactionConfig {
                skip_preflight: config.skip_preflight,
                preflight_commitment: Some(config.preflight_commitment.clone()),
            },
            search_transaction_history: config.search_transaction_history,
        })
    }

    /// Client over any transport
    pub fn new_sender<S: RpcSender + 'static>(sender: S) -> Self {
        Self {
            sender: Box::new(sender),
            send_config: SendTransactionConfig::default(),
            search_transaction_history: true,
        }
    }

    pub fn with_send_config(mut self, send_config: SendTransactionConfig) -> Self {
        self.send_config = send_config;
        self
    }

    pub fn url(&self) -> String {
        self.sender.url()
    }

    pub fn transport_stats(&self) -> RpcTransportStats {
        self.sender.get_transport_stats()
    }

    async fn send<T: DeserializeOwned>(&self, request: RpcRequest, params: Value) -> Result<T, RpcError> {
        let started = Instant::now();
        let result = self.sender.send(request, params).await;
        let m = metrics();
        m.rpc_latency
            .with_label_values(&[request.method()])
            .observe(started.elapsed().as_secs_f64());

        let value = result.inspect_err(|e| {
            m.rpc_errors
                .with_label_values(&[request.method(), e.category()])
                .inc();
        })?;

        serde_json::from_value(value)
            .map_err(|e| RpcError::invalid_response(self.sender.url(), request, e.to_string()))
    }

    fn parse<T: FromStr>(&self, request: RpcRequest, what: &str, s: &str) -> Result<T, RpcError> {
        s.parse()
            .map_err(|_| RpcError::invalid_response(self.sender.url(), request, format!("invalid {}: {}", what, s)))
    }

    /// Latest blockhash and the last block height at which it is accepted
    pub async fn get_latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        let request = RpcRequest::GetLatestBlockhash;
        let response: Response<RpcBlockhash> = self
            .send(request, json!([{ "commitment": "confirmed" }]))
            .await?;
        let blockhash = self.parse(request, "blockhash", &response.value.blockhash)?;
        Ok((blockhash, response.value.last_valid_block_height))
    }

    pub async fn get_block_height(&self) -> Result<u64, RpcError> {
        self.send(RpcRequest::GetBlockHeight, json!([{ "commitment": "confirmed" }]))
            .await
    }

    pub async fn get_slot(&self) -> Result<u64, RpcError> {
        self.send(RpcRequest::GetSlot, json!([{ "commitment": "confirmed" }]))
            .await
    }

    /// Submit wire bytes; returns the signature the node acknowledged
    ///
    /// Fails with `SignatureMismatch` if the node reports a signature other
    /// than the transaction's first.
    pub async fn send_transaction(&self, wire: &[u8]) -> Result<Signature, RpcError> {
        let request = RpcRequest::SendTransaction;
        let mut options = json!({
            "encoding": "base64",
            "skipPreflight": self.send_config.skip_preflight,
            "maxRetries": 0,
        });
        if let Some(commitment) = &self.send_config.preflight_commitment {
            options["preflightCommitment"] = json!(commitment);
        }

        let returned: String = self
            .send(request, json!([BASE64_STANDARD.encode(wire), options]))
            .await?;

        let expected = leading_signature(wire);
        match (returned.parse::<Signature>(), expected) {
            (Ok(sig), Some(expected)) if sig == expected => Ok(sig),
            (Ok(sig), None) => Ok(sig),
            (_, Some(expected)) => Err(RpcError::SignatureMismatch { expected, returned }),
            (Err(_), None) => Err(RpcError::invalid_response(
                self.sender.url(),
                request,
                format!("invalid signature: {}", returned),
            )),
        }
    }

    pub async fn simulate_transaction(&self, wire: &[u8]) -> Result<RpcSimulateTransactionResult, RpcError> {
        let response: Response<RpcSimulateTransactionResult> = self
            .send(
                RpcRequest::SimulateTransaction,
                json!([
                    BASE64_STANDARD.encode(wire),
                    { "encoding": "base64", "sigVerify": false, "commitment": "confirmed" }
                ]),
            )
            .await?;
        Ok(response.value)
    }

    pub async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        let request = RpcRequest::GetSignatureStatuses;
        let ids: Vec<String> = signatures.iter().map(|s| s.to_string()).collect();
        let response: Response<Vec<Option<SignatureStatus>>> = self
            .send(
                request,
                json!([ids, { "searchTransactionHistory": self.search_transaction_history }]),
            )
            .await?;

        if response.value.len() != signatures.len() {
            return Err(RpcError::invalid_response(
                self.sender.url(),
                request,
                format!(
                    "expected {} statuses, got {}",
                    signatures.len(),
                    response.value.len()
                ),
            ));
        }
        Ok(response.value)
    }

    /// Status of one signature; `None` while the ledger has not seen it
    pub async fn get_signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, RpcError> {
        let mut statuses = self.get_signature_statuses(std::slice::from_ref(signature)).await?;
        let status = statuses.pop().flatten();
        debug!(%signature, found = status.is_some(), "signature status");
        Ok(status)
    }

    pub async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, RpcError> {
        self.send(RpcRequest::GetMinimumBalanceForRentExemption, json!([data_len]))
            .await
    }

    /// Fee schedule for a blockhash; `None` once the blockhash has expired
    pub async fn get_fee_calculator_for_blockhash(&self, blockhash: &Hash) -> Result<Option<FeeCalculator>, RpcError> {
        let response: Response<Option<RpcFeeCalculator>> = self
            .send(
                RpcRequest::GetFeeCalculatorForBlockhash,
                json!([blockhash.to_string()]),
            )
            .await?;
        Ok(response.value.map(|v| v.fee_calculator))
    }

    /// Fee in lamports the ledger would charge for `message_bytes`
    pub async fn get_fee_for_message(&self, message_bytes: &[u8]) -> Result<Option<u64>, RpcError> {
        let response: Response<Option<u64>> = self
            .send(
                RpcRequest::GetFeeForMessage,
                json!([BASE64_STANDARD.encode(message_bytes), { "commitment": "confirmed" }]),
            )
            .await?;
        Ok(response.value)
    }

    pub async fn get_account_info(&self, pubkey: &Pubkey) -> Result<Option<Account>, RpcError> {
        let request = RpcRequest::GetAccountInfo;
        let response: Response<Option<UiAccount>> = self
            .send(
                request,
                json!([pubkey.to_string(), { "encoding": "base64", "commitment": "confirmed" }]),
            )
            .await?;

        let Some(ui) = response.value else {
            return Ok(None);
        };
        let account = ui.decode::<Account>().ok_or_else(|| {
            RpcError::invalid_response(
                self.sender.url(),
                request,
                format!("undecodable account data or owner {}", ui.owner),
            )
        })?;
        Ok(Some(account))
    }
}

/// First signature carried in transaction wire bytes
fn leading_signature(wire: &[u8]) -> Option<Signature> {
    let (count, used) = shortvec::decode_len(wire).ok()?;
    if count == 0 {
        return None;
    }
    let bytes = wire.get(used..used + 64)?;
    Signature::try_from(bytes).ok()
}
