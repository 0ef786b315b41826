//! # ecf-scenario — The SimpleDAO reentrancy demonstration.
//!
//! Deploys SimpleDAO and the Mallory attacker through any
//! [`NodeClient`](ecf_core::traits::NodeClient), funds both credits, fires
//! Mallory's fallback and records the balances around it. [`verify`] turns
//! the observation into an [`Outcome`] for the chosen SimpleDAO build.

pub mod config;
pub mod error;
pub mod operator;
pub mod scenario;
pub mod verify;

pub use config::ScenarioConfig;
pub use error::ScenarioError;
pub use operator::Operator;
pub use scenario::{Balances, ScenarioReport, run};
pub use verify::{Outcome, verify};
