//! # ecf-core
//! Foundation types and traits shared by the ECF crates.

pub mod abi;
pub mod artifacts;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;
