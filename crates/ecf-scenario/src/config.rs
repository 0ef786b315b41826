//! Amounts, gas limits and pacing of the scenario.

use serde::{Deserialize, Serialize};

use ecf_core::constants::{
    ATTACKER_DONATION, BLOCKS_BETWEEN_STEPS, DEPLOY_GAS, DONATE_GAS, MAX_RECEIPT_WAIT_BLOCKS, TRIGGER_GAS,
    TRIGGER_VALUE, VICTIM_DONATION,
};
use ecf_core::types::{Wei, wei_amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Index into the node's accounts of the account that deploys and pays.
    pub operator_index: usize,
    /// Index of the victim donator whose credit Mallory drains.
    pub donator_index: usize,
    #[serde(with = "wei_amount")]
    pub attacker_donation: Wei,
    #[serde(with = "wei_amount")]
    pub victim_donation: Wei,
    #[serde(with = "wei_amount")]
    pub trigger_value: Wei,
    pub deploy_gas: u64,
    pub donate_gas: u64,
    pub trigger_gas: u64,
    /// Blocks forced after every donation and after the trigger.
    pub blocks_between_steps: u64,
    /// Blocks to mine while waiting for a deployment receipt.
    pub max_receipt_wait_blocks: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            operator_index: 0,
            donator_index: 1,
            attacker_donation: ATTACKER_DONATION,
            victim_donation: VICTIM_DONATION,
            trigger_value: TRIGGER_VALUE,
            deploy_gas: DEPLOY_GAS,
            donate_gas: DONATE_GAS,
            trigger_gas: TRIGGER_GAS,
            blocks_between_steps: BLOCKS_BETWEEN_STEPS,
            max_receipt_wait_blocks: MAX_RECEIPT_WAIT_BLOCKS,
        }
    }
}

impl ScenarioConfig {
    /// Mallory's balance increase when only its own credit comes back.
    pub fn honest_gain(&self) -> Wei {
        self.attacker_donation + self.trigger_value
    }

    /// Wei the DAO holds once both donations are in.
    pub fn funded_dao_balance(&self) -> Wei {
        self.attacker_donation + self.victim_donation
    }
}
