//! Devchain configuration.
//!
//! [`DevchainConfig`] sets the genesis accounts, fees and block production.
//! All fields have defaults, so partial TOML or env overrides work.

use serde::{Deserialize, Serialize};

use ecf_core::constants::DEFAULT_DEVCHAIN_PORT;
use ecf_core::types::{Address, Wei, wei_amount};

/// One ether in wei.
pub const ETHER: Wei = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevchainConfig {
    /// Number of unlocked genesis accounts.
    pub accounts: usize,
    /// Genesis balance of every account.
    #[serde(with = "wei_amount")]
    pub initial_balance: Wei,
    #[serde(with = "wei_amount")]
    pub gas_price: Wei,
    /// Paid to the coinbase for each mined block.
    #[serde(with = "wei_amount")]
    pub block_reward: Wei,
    pub block_gas_limit: u64,
    /// Fee and reward recipient; the first account when unset.
    pub coinbase: Option<Address>,
    /// Mine a block as soon as a transaction is submitted.
    pub automine: bool,
    /// Timestamp of block 0; the current time when unset.
    pub genesis_timestamp: Option<u64>,
    /// Seconds between consecutive block timestamps.
    pub block_interval_secs: u64,
    /// Wall-clock interval of the background miner started by `miner_start`.
    pub miner_interval_ms: u64,
    /// Bind address of the JSON-RPC server.
    pub rpc_addr: String,
}

impl Default for DevchainConfig {
    fn default() -> Self {
        Self {
            accounts: 3,
            initial_balance: 1_000 * ETHER,
            gas_price: 1,
            block_reward: 5 * ETHER,
            block_gas_limit: 8_000_000,
            coinbase: None,
            automine: false,
            genesis_timestamp: None,
            block_interval_secs: 1,
            miner_interval_ms: 1_000,
            rpc_addr: format!("127.0.0.1:{DEFAULT_DEVCHAIN_PORT}"),
        }
    }
}
