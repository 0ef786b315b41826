//! The deploy, donate, trigger sequence.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ecf_core::abi::Token;
use ecf_core::artifacts::{DaoVariant, MALLORY, simple_dao};
use ecf_core::error::ClientError;
use ecf_core::traits::NodeClient;
use ecf_core::types::{Address, TxStatus, Wei, Word};

use crate::config::ScenarioConfig;
use crate::error::ScenarioError;
use crate::operator::Operator;

/// Balances of the two contracts at one point of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub dao: Wei,
    pub mallory: Wei,
}

/// Everything observed during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub variant: DaoVariant,
    pub operator: Address,
    pub donator: Address,
    pub dao: Address,
    pub mallory: Address,
    pub before: Balances,
    pub after: Balances,
    /// `credit[mallory]` after the trigger.
    pub mallory_credit: Word,
    /// `credit[donator]` after the trigger.
    pub donator_credit: Word,
    /// Status of the trigger payment, `None` if it was not mined in time.
    pub trigger_status: Option<TxStatus>,
}

impl ScenarioReport {
    /// How much Mallory's balance grew across the trigger.
    pub fn mallory_gain(&self) -> Wei {
        self.after.mallory.saturating_sub(self.before.mallory)
    }

    /// How much the DAO's balance shrank across the trigger.
    pub fn dao_loss(&self) -> Wei {
        self.before.dao.saturating_sub(self.after.dao)
    }
}

async fn balances<C: NodeClient + ?Sized>(
    op: &Operator<'_, C>,
    dao: Address,
    mallory: Address,
) -> Result<Balances, ScenarioError> {
    Ok(Balances { dao: op.balance(dao).await?, mallory: op.balance(mallory).await? })
}

/// Run the demonstration against `client` with the `variant` SimpleDAO build.
///
/// Failed transactions are not errors here; only a missing deployment or a
/// node failure aborts the run.
pub async fn run<C: NodeClient + ?Sized>(
    client: &C,
    variant: DaoVariant,
    cfg: &ScenarioConfig,
) -> Result<ScenarioReport, ScenarioError> {
    let accounts = client.accounts().await?;
    let operator = *accounts.get(cfg.operator_index).ok_or(ClientError::MissingAccount(cfg.operator_index))?;
    let donator = *accounts.get(cfg.donator_index).ok_or(ClientError::MissingAccount(cfg.donator_index))?;
    info!(%variant, %operator, %donator, "starting reentrancy scenario");

    let op = Operator::new(client, operator, cfg);
    let dao = op.deploy(simple_dao(variant), &[]).await?;
    let mallory = op.deploy(&MALLORY, &[Token::Address(dao)]).await?;

    op.donate(dao, mallory, cfg.attacker_donation).await?;
    op.mine(cfg.blocks_between_steps).await?;
    op.donate(dao, donator, cfg.victim_donation).await?;
    op.mine(cfg.blocks_between_steps).await?;

    let before = balances(&op, dao, mallory).await?;
    info!("Before: SimpleDAO has {} and Mallory has {}", before.dao, before.mallory);
    if before.dao < cfg.funded_dao_balance() {
        warn!(expected = cfg.funded_dao_balance(), actual = before.dao, "donations not fully credited");
    }

    let trigger = op.transfer(mallory, cfg.trigger_value, cfg.trigger_gas).await?;
    op.mine(cfg.blocks_between_steps).await?;
    let trigger_status = client.receipt(trigger).await?.map(|r| r.status);
    if trigger_status != Some(TxStatus::Success) {
        warn!(hash = %trigger, ?trigger_status, "trigger payment did not succeed");
    }

    let after = balances(&op, dao, mallory).await?;
    let mallory_credit = op.credit(dao, mallory).await?;
    let donator_credit = op.credit(dao, donator).await?;
    info!("After: SimpleDAO has {} and Mallory has {}", after.dao, after.mallory);
    info!("Mallory's credit is now {mallory_credit}");

    Ok(ScenarioReport {
        variant,
        operator,
        donator,
        dao,
        mallory,
        before,
        after,
        mallory_credit,
        donator_credit,
        trigger_status,
    })
}
