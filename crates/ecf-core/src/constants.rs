//! Scenario constants. All amounts in wei.

use crate::types::Wei;

/// Credit donated by the operator to the attacker contract.
pub const ATTACKER_DONATION: Wei = 1000;

/// Credit donated by the operator to the victim donator account.
pub const VICTIM_DONATION: Wei = 3000;

/// Payment sent directly to the attacker contract to run its fallback.
pub const TRIGGER_VALUE: Wei = 1;

/// Gas limit for contract deployments.
pub const DEPLOY_GAS: u64 = 4_700_000;

/// Gas limit for the fallback trigger payment.
pub const TRIGGER_GAS: u64 = 500_000;

/// Gas limit for `donate` calls.
pub const DONATE_GAS: u64 = 300_000;

/// Blocks forced between scenario steps.
pub const BLOCKS_BETWEEN_STEPS: u64 = 3;

/// Blocks to wait for a deployment receipt before giving up.
pub const MAX_RECEIPT_WAIT_BLOCKS: u64 = 50;

/// Default JSON-RPC endpoint of a local development node.
pub const DEFAULT_RPC_ENDPOINT: &str = "http://127.0.0.1:8545";

/// Default port used when serving the devchain over JSON-RPC.
pub const DEFAULT_DEVCHAIN_PORT: u16 = 8545;

/// Maximum nesting of message calls.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Function selectors of the contracts in `contracts/`.
pub mod selectors {
    /// `donate(address)`
    pub const DONATE: [u8; 4] = [0x00, 0x36, 0x2a, 0x95];
    /// `withdraw(uint256)`
    pub const WITHDRAW: [u8; 4] = [0x2e, 0x1a, 0x7d, 0x4d];
    /// `queryCredit(address)`
    pub const QUERY_CREDIT: [u8; 4] = [0x59, 0xf1, 0x28, 0x6d];
    /// `credit(address)`
    pub const CREDIT: [u8; 4] = [0xd5, 0xd4, 0x4d, 0x80];
    /// `dao()`
    pub const DAO: [u8; 4] = [0x41, 0x62, 0x16, 0x9f];
    /// `getJackpot()`
    pub const GET_JACKPOT: [u8; 4] = [0x93, 0x29, 0x06, 0x6c];
}
