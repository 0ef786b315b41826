use thiserror::Error;

use ecf_core::artifacts::DaoVariant;
use ecf_core::error::{AbiError, ClientError, HexError};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)] Client(#[from] ClientError),
    #[error(transparent)] Abi(#[from] AbiError),
    #[error("contract artifact: {0}")] Artifact(#[from] HexError),
    #[error("unexpected {variant} outcome: {reason}")] UnexpectedOutcome { variant: DaoVariant, reason: String },
}
