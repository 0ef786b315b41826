//! Checker configuration.
//!
//! The checker is on by default. Two environment variables control it:
//! `EVM_DISABLE_ECF_CHECK=1` turns it off, and `EVM_MONITOR_DEBUG_LEVEL`
//! selects how much of the analysis is logged.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DISABLE_ENV: &str = "EVM_DISABLE_ECF_CHECK";
pub const DEBUG_LEVEL_ENV: &str = "EVM_MONITOR_DEBUG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Whether transactions are checked at all.
    pub enabled: bool,
    /// 0 and 1 log findings only, 2 logs per-contract analysis, 3 and above
    /// log every reordering step.
    pub debug_level: u8,
    /// Where non-ECF reports are appended; in-memory only when unset.
    pub report_path: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_level: 0,
            report_path: None,
        }
    }
}

impl CheckerConfig {
    /// Read the switches from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the switches through `lookup`, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        cfg.apply_lookup(lookup);
        cfg
    }

    /// Override fields from `lookup` where the variables are set.
    pub fn apply_lookup(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(DISABLE_ENV) {
            self.enabled = v.trim() != "1";
        }
        if let Some(v) = lookup(DEBUG_LEVEL_ENV) {
            match v.trim().parse() {
                Ok(level) => self.debug_level = level,
                Err(_) => warn!("ignoring {DEBUG_LEVEL_ENV}={v}: not a number"),
            }
        }
    }

    /// `tracing` filter directive for the checker crate.
    pub fn log_directive(&self) -> String {
        let level = match self.debug_level {
            0 | 1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!("ecf_checker={level}")
    }
}
