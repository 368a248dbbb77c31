use std::fmt;

use serde_json::{json, Value};

/// JSON-RPC methods the pipeline calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcRequest {
    GetAccountInfo,
    GetBlockHeight,
    GetFeeCalculatorForBlockhash,
    GetFeeForMessage,
    GetLatestBlockhash,
    GetMinimumBalanceForRentExemption,
    GetSignatureStatuses,
    GetSlot,
    SendTransaction,
    SimulateTransaction,
}

impl RpcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            RpcRequest::GetAccountInfo => "getAccountInfo",
            RpcRequest::GetBlockHeight => "getBlockHeight",
            RpcRequest::GetFeeCalculatorForBlockhash => "getFeeCalculatorForBlockhash",
            RpcRequest::GetFeeForMessage => "getFeeForMessage",
            RpcRequest::GetLatestBlockhash => "getLatestBlockhash",
            RpcRequest::GetMinimumBalanceForRentExemption => "getMinimumBalanceForRentExemption",
            RpcRequest::GetSignatureStatuses => "getSignatureStatuses",
            RpcRequest::GetSlot => "getSlot",
            RpcRequest::SendTransaction => "sendTransaction",
            RpcRequest::SimulateTransaction => "simulateTransaction",
        }
    }

    pub fn build_request_json(self, id: u64, params: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": self.method(),
            "params": params,
        })
    }
}

impl fmt::Display for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}
