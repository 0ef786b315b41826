//! Integration tests for the SimpleDAO reentrancy scenario.
//!
//! The tests run the full deploy, donate and trigger sequence on the
//! devchain, directly and over JSON-RPC, and check balances, ledger
//! properties, the order of storage updates and value transfers, and the
//! ECF checker's verdicts.

pub mod helpers;
