//! Error types shared across the ECF crates.
use thiserror::Error;

use crate::types::TxHash;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: expected {expected} bytes, got {got}")] InvalidLength { expected: usize, got: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("calldata too short: need {need} bytes, have {have}")] Truncated { need: usize, have: usize },
    #[error("word does not fit in 128 bits")] Overflow,
    #[error("address word has non-zero upper bytes")] DirtyAddress,
    #[error("missing selector")] MissingSelector,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport: {0}")] Transport(String),
    #[error("invalid response: {0}")] InvalidResponse(String),
    #[error("node rejected request ({code}): {message}")] Rejected { code: i32, message: String },
    #[error("transaction {0} did not create a contract")] ContractNotDeployed(TxHash),
    #[error("transaction {tx} not mined after {blocks} blocks")] ReceiptTimeout { tx: TxHash, blocks: u64 },
    #[error("no account at index {0}")] MissingAccount(usize),
    #[error("timed out: {0}")] Timeout(String),
}
