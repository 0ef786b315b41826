//! Gas schedule (Byzantium values) and call-gas rules.

use ecf_core::types::{TransactionRequest, Word};

pub const G_TRANSACTION: u64 = 21_000;
pub const G_TX_CREATE: u64 = 32_000;
pub const G_TX_DATA_ZERO: u64 = 4;
pub const G_TX_DATA_NONZERO: u64 = 68;
pub const G_CODE_DEPOSIT: u64 = 200;
/// Flat charge for running a contract's code, covering non-storage opcodes.
pub const G_RUN: u64 = 40;
pub const G_SLOAD: u64 = 200;
pub const G_SSTORE_SET: u64 = 20_000;
pub const G_SSTORE_RESET: u64 = 5_000;
pub const R_SSTORE_CLEAR: u64 = 15_000;
pub const G_CALL: u64 = 700;
pub const G_CALL_VALUE: u64 = 9_000;
pub const G_CALL_STIPEND: u64 = 2_300;

/// Gas a transaction pays before any code runs.
pub fn intrinsic_gas(tx: &TransactionRequest) -> u64 {
    let data: u64 = tx
        .data
        .iter()
        .map(|b| if *b == 0 { G_TX_DATA_ZERO } else { G_TX_DATA_NONZERO })
        .sum();
    let base = if tx.is_create() { G_TRANSACTION + G_TX_CREATE } else { G_TRANSACTION };
    base + data
}

pub fn all_but_one_64th(gas: u64) -> u64 {
    gas - gas / 64
}

/// Gas handed to a callee: the requested amount, capped at all but one
/// 64th of what the caller has left.
pub fn call_gas(available: u64, requested: u64) -> u64 {
    requested.min(all_but_one_64th(available))
}

/// Cost and refund of overwriting `current` with `new`.
pub fn sstore_cost(current: &Word, new: &Word) -> (u64, u64) {
    let cost = if current.is_zero() && !new.is_zero() { G_SSTORE_SET } else { G_SSTORE_RESET };
    let refund = if !current.is_zero() && new.is_zero() { R_SSTORE_CLEAR } else { 0 };
    (cost, refund)
}
