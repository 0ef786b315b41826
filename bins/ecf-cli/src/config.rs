//! Settings for the `ecf` binary.
//!
//! Layered as: built-in defaults, then the settings file (the `--config`
//! path, or `ecf.toml` under the platform config dir when present), then
//! `ECF_`-prefixed environment variables with `__` between section and
//! field, e.g. `ECF_SCENARIO__VICTIM_DONATION=5000`. The checker also
//! honours `EVM_DISABLE_ECF_CHECK` and `EVM_MONITOR_DEBUG_LEVEL`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use ecf_checker::CheckerConfig;
use ecf_devchain::DevchainConfig;
use ecf_rpc::RpcConfig;
use ecf_scenario::ScenarioConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scenario: ScenarioConfig,
    pub rpc: RpcConfig,
    pub devchain: DevchainConfig,
    pub checker: CheckerConfig,
}

/// `ecf.toml` under the platform config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ecf").join("ecf.toml"))
}

impl Settings {
    /// Load from `path` (required when given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with(path, env)
    }

    /// Load from `path` and the variables in `env`.
    pub fn load_with(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(default) = default_settings_path() {
                    builder = builder.add_source(File::from(default).required(false));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("ECF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(env.clone().into_iter().collect())),
        );

        let mut settings: Settings = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        settings.checker.apply_lookup(|key| env.get(key).cloned());
        Ok(settings)
    }
}
