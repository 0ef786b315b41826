//! Connection settings for [`crate::RpcNodeClient`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ecf_core::constants::DEFAULT_RPC_ENDPOINT;

/// How the client forces block production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningMode {
    /// One `evm_mine` call per block (development nodes).
    #[default]
    Instant,
    /// `miner_start(1)` once, then wait until the height has advanced.
    Miner,
}

impl fmt::Display for MiningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant => write!(f, "instant"),
            Self::Miner => write!(f, "miner"),
        }
    }
}

impl FromStr for MiningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instant" => Ok(Self::Instant),
            "miner" => Ok(Self::Miner),
            other => Err(format!("unknown mining mode '{other}', expected 'instant' or 'miner'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// HTTP JSON-RPC endpoint of the node.
    pub endpoint: String,
    pub mining: MiningMode,
    /// Interval between height polls in miner mode.
    pub poll_interval_ms: u64,
    /// Give up waiting for blocks after this long in miner mode.
    pub block_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RPC_ENDPOINT.to_string(),
            mining: MiningMode::Instant,
            poll_interval_ms: 500,
            block_timeout_secs: 120,
            request_timeout_secs: 30,
        }
    }
}

impl RpcConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_secs(self.block_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_dev_node() {
        let cfg = RpcConfig::default();
        assert_eq!(cfg.endpoint, "http://127.0.0.1:8545");
        assert_eq!(cfg.mining, MiningMode::Instant);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn mining_mode_parses() {
        assert_eq!("miner".parse::<MiningMode>().unwrap(), MiningMode::Miner);
        assert_eq!("INSTANT".parse::<MiningMode>().unwrap(), MiningMode::Instant);
        assert!("pow".parse::<MiningMode>().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: RpcConfig = serde_json::from_str(r#"{"mining":"miner"}"#).unwrap();
        assert_eq!(cfg.mining, MiningMode::Miner);
        assert_eq!(cfg.request_timeout_secs, 30);
    }
}
