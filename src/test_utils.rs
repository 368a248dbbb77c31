//! Test Utilities Module
//!
//! A scripted in-memory ledger that speaks the JSON-RPC subset the client
//! uses. Tests queue behaviours per method and inspect what the pipeline
//! sent afterwards.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use parking_lot::Mutex;
use serde_json::{json, Value};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};

use crate::nonce_manager::NonceData;
use crate::rpc_manager::rpc_response::{ConfirmationStatus, SignatureStatus};
use crate::rpc_manager::{Account, RpcClient, RpcError, RpcRequest, RpcSender, RpcTransportStats};
use crate::tx_builder::instructions::SYSTEM_PROGRAM_ID;
use crate::tx_builder::DecodedTransaction;

const MOCK_URL: &str = "mock://ledger";

/// What the next `sendTransaction` does
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Ledger accepts the bytes and echoes the signature
    Accept,
    /// Node answers with this error; the bytes are not recorded as received
    Reject(RpcError),
    /// Ledger receives the bytes but the reply never arrives
    Hang,
}

/// What the next `getSignatureStatuses` returns
#[derive(Debug, Clone)]
pub enum StatusBehavior {
    Unseen,
    Landed(SignatureStatus),
    Error(RpcError),
    Hang,
}

#[derive(Debug)]
struct LedgerState {
    send_script: VecDeque<SendBehavior>,
    status_script: VecDeque<StatusBehavior>,
    status_fallback: StatusBehavior,
    land_on_accept: Option<SignatureStatus>,
    landed: HashMap<Signature, SignatureStatus>,
    errors: HashMap<&'static str, VecDeque<RpcError>>,
    block_height: u64,
    height_step: u64,
    slot: u64,
    latest_blockhash: Hash,
    last_valid_block_height: u64,
    lamports_per_signature: u64,
    accounts: HashMap<Pubkey, Account>,
    received: Vec<Vec<u8>>,
    calls: HashMap<&'static str, usize>,
}

/// Scripted ledger implementing [`RpcSender`]
///
/// Clones share state, so a test keeps one handle while the client owns
/// another.
#[derive(Debug, Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Status of a transaction included at `slot` without error
pub fn landed(slot: u64, level: ConfirmationStatus) -> SignatureStatus {
    let confirmations = match level {
        ConfirmationStatus::Processed => Some(0),
        ConfirmationStatus::Confirmed => Some(1),
        ConfirmationStatus::Finalized => None,
    };
    SignatureStatus {
        slot,
        confirmations,
        err: None,
        confirmation_status: Some(level),
    }
}

/// Status of a transaction included at `slot` whose execution failed
pub fn failed(slot: u64, err: Value) -> SignatureStatus {
    SignatureStatus {
        slot,
        confirmations: Some(1),
        err: Some(err),
        confirmation_status: Some(ConfirmationStatus::Confirmed),
    }
}

impl MockLedger {
    /// Block height 1000, a fresh blockhash valid through height 1150, slot 100
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                send_script: VecDeque::new(),
                status_script: VecDeque::new(),
                status_fallback: StatusBehavior::Unseen,
                land_on_accept: None,
                landed: HashMap::new(),
                errors: HashMap::new(),
                block_height: 1000,
                height_step: 0,
                slot: 100,
                latest_blockhash: Hash::new_unique(),
                last_valid_block_height: 1150,
                lamports_per_signature: 5000,
                accounts: HashMap::new(),
                received: Vec::new(),
                calls: HashMap::new(),
            })),
        }
    }

    /// Typed client over this ledger
    pub fn client(&self) -> Arc<RpcClient> {
        Arc::new(RpcClient::new_sender(self.clone()))
    }

    pub fn push_send(&self, behavior: SendBehavior) -> &Self {
        self.state.lock().send_script.push_back(behavior);
        self
    }

    pub fn push_status(&self, behavior: StatusBehavior) -> &Self {
        self.state.lock().status_script.push_back(behavior);
        self
    }

    /// Status returned once the script is exhausted
    pub fn set_status_fallback(&self, behavior: StatusBehavior) -> &Self {
        self.state.lock().status_fallback = behavior;
        self
    }

    /// Every accepted signature reports `status` from then on
    pub fn land_on_accept(&self, status: SignatureStatus) -> &Self {
        self.state.lock().land_on_accept = Some(status);
        self
    }

    /// Fail the next call to `method` with `error`
    pub fn fail_next(&self, method: RpcRequest, error: RpcError) -> &Self {
        self.state
            .lock()
            .errors
            .entry(method.method())
            .or_default()
            .push_back(error);
        self
    }

    pub fn set_block_height(&self, height: u64) -> &Self {
        self.state.lock().block_height = height;
        self
    }

    /// Height added after every `getBlockHeight` answer
    pub fn set_height_step(&self, step: u64) -> &Self {
        self.state.lock().height_step = step;
        self
    }

    pub fn set_latest_blockhash(&self, blockhash: Hash, last_valid_block_height: u64) -> &Self {
        let mut state = self.state.lock();
        state.latest_blockhash = blockhash;
        state.last_valid_block_height = last_valid_block_height;
        self
    }

    pub fn latest_blockhash(&self) -> (Hash, u64) {
        let state = self.state.lock();
        (state.latest_blockhash, state.last_valid_block_height)
    }

    pub fn set_account(&self, pubkey: Pubkey, account: Account) -> &Self {
        self.state.lock().accounts.insert(pubkey, account);
        self
    }

    pub fn remove_account(&self, pubkey: &Pubkey) -> &Self {
        self.state.lock().accounts.remove(pubkey);
        self
    }

    /// Store an initialized nonce account
    pub fn set_nonce(&self, nonce_account: Pubkey, data: NonceData) -> &Self {
        // NonceData encoding is infallible for well-formed values
        let bytes = data.to_account_data().unwrap_or_default();
        self.set_account(
            nonce_account,
            Account {
                lamports: 1_447_680,
                data: bytes,
                owner: SYSTEM_PROGRAM_ID,
                executable: false,
                rent_epoch: u64::MAX,
            },
        )
    }

    /// Number of calls made to `method`
    pub fn calls(&self, method: RpcRequest) -> usize {
        self.state
            .lock()
            .calls
            .get(method.method())
            .copied()
            .unwrap_or(0)
    }

    /// Wire bytes the ledger has received, in order
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.state.lock().received.clone()
    }

    fn context(slot: u64, value: Value) -> Value {
        json!({ "context": { "slot": slot }, "value": value })
    }

    fn invalid_params(message: impl Into<String>) -> RpcError {
        RpcError::RpcResponse {
            endpoint: MOCK_URL.to_string(),
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    fn decode_param(params: &Value) -> Result<Vec<u8>, RpcError> {
        let encoded = params[0]
            .as_str()
            .ok_or_else(|| Self::invalid_params("expected base64 string"))?;
        BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| Self::invalid_params(e.to_string()))
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value, RpcError> {
        let wire = Self::decode_param(params)?;
        let decoded =
            DecodedTransaction::from_wire(&wire).map_err(|e| Self::invalid_params(e.to_string()))?;
        let signature = *decoded
            .signature()
            .ok_or_else(|| Self::invalid_params("transaction has no signatures"))?;

        let behavior = {
            let mut state = self.state.lock();
            let behavior = state.send_script.pop_front().unwrap_or(SendBehavior::Accept);
            if !matches!(behavior, SendBehavior::Reject(_)) {
                state.received.push(wire);
                if let Some(status) = state.land_on_accept.clone() {
                    state.landed.insert(signature, status);
                }
            }
            behavior
        };

        match behavior {
            SendBehavior::Accept => Ok(json!(signature.to_string())),
            SendBehavior::Reject(e) => Err(e),
            SendBehavior::Hang => std::future::pending().await,
        }
    }

    async fn signature_statuses(&self, params: &Value) -> Result<Value, RpcError> {
        let requested = params[0]
            .as_array()
            .ok_or_else(|| Self::invalid_params("expected signature list"))?
            .iter()
            .map(|s| {
                s.as_str()
                    .and_then(|s| s.parse::<Signature>().ok())
                    .ok_or_else(|| Self::invalid_params("invalid signature"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (slot, behavior, landed) = {
            let mut state = self.state.lock();
            let behavior = match state.status_script.pop_front() {
                Some(behavior) => behavior,
                None => state.status_fallback.clone(),
            };
            let landed: Vec<Option<SignatureStatus>> =
                requested.iter().map(|sig| state.landed.get(sig).cloned()).collect();
            (state.slot, behavior, landed)
        };

        let statuses: Vec<Option<SignatureStatus>> = match behavior {
            StatusBehavior::Error(e) => return Err(e),
            StatusBehavior::Hang => return std::future::pending().await,
            StatusBehavior::Unseen => landed,
            StatusBehavior::Landed(status) => landed
                .into_iter()
                .map(|known| known.or_else(|| Some(status.clone())))
                .collect(),
        };
        Ok(Self::context(slot, json!(statuses)))
    }

    fn account_info(&self, params: &Value) -> Result<Value, RpcError> {
        let pubkey: Pubkey = params[0]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Self::invalid_params("invalid pubkey"))?;
        let state = self.state.lock();
        let value = match state.accounts.get(&pubkey) {
            Some(account) => json!({
                "lamports": account.lamports,
                "data": [BASE64_STANDARD.encode(&account.data), "base64"],
                "owner": account.owner.to_string(),
                "executable": account.executable,
                "rentEpoch": account.rent_epoch,
            }),
            None => Value::Null,
        };
        Ok(Self::context(state.slot, value))
    }
}

#[async_trait]
impl RpcSender for MockLedger {
    async fn send(&self, request: RpcRequest, params: Value) -> Result<Value, RpcError> {
        {
            let mut state = self.state.lock();
            *state.calls.entry(request.method()).or_insert(0) += 1;
            if let Some(error) = state
                .errors
                .get_mut(request.method())
                .and_then(|queue| queue.pop_front())
            {
                return Err(error);
            }
        }

        match request {
            RpcRequest::SendTransaction => self.send_transaction(&params).await,
            RpcRequest::GetSignatureStatuses => self.signature_statuses(&params).await,
            RpcRequest::GetAccountInfo => self.account_info(&params),
            RpcRequest::GetBlockHeight => {
                let mut state = self.state.lock();
                let height = state.block_height;
                state.block_height += state.height_step;
                Ok(json!(height))
            }
            RpcRequest::GetSlot => Ok(json!(self.state.lock().slot)),
            RpcRequest::GetLatestBlockhash => {
                let state = self.state.lock();
                Ok(Self::context(
                    state.slot,
                    json!({
                        "blockhash": state.latest_blockhash.to_string(),
                        "lastValidBlockHeight": state.last_valid_block_height,
                    }),
                ))
            }
            RpcRequest::GetMinimumBalanceForRentExemption => {
                let len = params[0]
                    .as_u64()
                    .ok_or_else(|| Self::invalid_params("expected data length"))?;
                Ok(json!((128 + len) * 3480 * 2))
            }
            RpcRequest::GetFeeCalculatorForBlockhash => {
                let state = self.state.lock();
                let value = if params[0].as_str() == Some(state.latest_blockhash.to_string().as_str()) {
                    json!({ "feeCalculator": { "lamportsPerSignature": state.lamports_per_signature } })
                } else {
                    Value::Null
                };
                Ok(Self::context(state.slot, value))
            }
            RpcRequest::GetFeeForMessage => {
                let message = Self::decode_param(&params)?;
                let signers = message.first().copied().unwrap_or(0) as u64;
                let state = self.state.lock();
                Ok(Self::context(
                    state.slot,
                    json!(signers * state.lamports_per_signature),
                ))
            }
            RpcRequest::SimulateTransaction => {
                let state = self.state.lock();
                Ok(Self::context(
                    state.slot,
                    json!({ "err": null, "logs": [], "unitsConsumed": 150 }),
                ))
            }
        }
    }

    fn get_transport_stats(&self) -> RpcTransportStats {
        RpcTransportStats {
            request_count: self.state.lock().calls.values().sum(),
            ..RpcTransportStats::default()
        }
    }

    fn url(&self) -> String {
        MOCK_URL.to_string()
    }
}
