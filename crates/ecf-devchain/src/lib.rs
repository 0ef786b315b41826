//! # ecf-devchain — In-memory development chain.
//!
//! Executes the SimpleDAO and Mallory artifacts with EVM gas and call
//! semantics so the scenario can run without an external node:
//! - [`chain::Devchain`] — accounts, pending pool, mining, receipts
//! - [`executor`] — message calls, gas, snapshots and tracer hooks
//! - [`contracts`] — native implementations of the known artifacts
//! - [`rpc`] — `eth_*` JSON-RPC server over a devchain
//! - [`config::DevchainConfig`] — genesis and block settings

pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod executor;
pub mod gas;
pub mod rpc;
pub mod state;

pub use chain::Devchain;
pub use config::DevchainConfig;
pub use error::DevchainError;
pub use rpc::start_rpc_server;
