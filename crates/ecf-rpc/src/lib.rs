//! # ecf-rpc — Ethereum JSON-RPC access to a node.
//!
//! - [`client::RpcNodeClient`] — [`ecf_core::traits::NodeClient`] over HTTP
//! - [`wire`] — hex-quantity JSON shapes shared with the devchain server
//! - [`config::RpcConfig`] — endpoint and block production mode

pub mod client;
pub mod config;
pub mod wire;

pub use client::RpcNodeClient;
pub use config::{MiningMode, RpcConfig};
