//! Devchain error types.
use thiserror::Error;

use ecf_core::error::{AbiError, ClientError};
use ecf_core::types::{Address, Wei};

/// JSON-RPC error code geth uses for rejected transactions.
pub const TX_REJECTED_CODE: i32 = -32000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DevchainError {
    #[error("unknown account {0}")] UnknownAccount(Address),
    #[error("insufficient funds: need {need}, have {have}")] InsufficientFunds { need: Wei, have: Wei },
    #[error("intrinsic gas too low: have {gas}, need {need}")] IntrinsicGas { gas: u64, need: u64 },
    #[error("exceeds block gas limit: {gas} > {limit}")] GasLimit { gas: u64, limit: u64 },
    #[error("execution reverted: {0}")] Reverted(String),
    #[error("abi: {0}")] Abi(#[from] AbiError),
    #[error("rpc server: {0}")] Server(String),
}

impl From<DevchainError> for ClientError {
    fn from(e: DevchainError) -> Self {
        ClientError::Rejected { code: TX_REJECTED_CODE, message: e.to_string() }
    }
}
