//! End-to-end runs of the reentrancy scenario on the devchain.

use ecf_core::artifacts::DaoVariant;
use ecf_core::types::{TxStatus, Word};
use ecf_scenario::{Outcome, ScenarioConfig, ScenarioError, run, verify};
use ecf_tests::helpers::*;

#[tokio::test]
async fn vulnerable_dao_loses_the_other_donation() {
    let chain = devchain();
    let cfg = ScenarioConfig::default();
    let report = run(&chain, DaoVariant::Vulnerable, &cfg).await.unwrap();

    assert_eq!(report.before.dao, 4000);
    assert!(report.mallory_gain() > 1000);
    assert_eq!(report.mallory_gain(), 4001);
    assert_eq!(report.after.dao, 0);
    assert_eq!(verify(&report, &cfg).unwrap(), Outcome::DrainDetected { stolen: 3000 });
}

#[tokio::test]
async fn patched_dao_pays_exactly_the_credit() {
    let chain = devchain();
    let cfg = ScenarioConfig::default();
    let report = run(&chain, DaoVariant::Patched, &cfg).await.unwrap();

    assert_eq!(report.mallory_gain(), 1000 + 1);
    assert_eq!(report.after.dao, 3000);
    assert_eq!(report.donator_credit, Word::from_u128(3000));
    assert_eq!(verify(&report, &cfg).unwrap(), Outcome::DrainPrevented);
}

#[tokio::test]
async fn drain_is_bounded_by_the_dao_balance() {
    let chain = devchain();
    let cfg = ScenarioConfig { victim_donation: 2000, ..ScenarioConfig::default() };
    let report = run(&chain, DaoVariant::Vulnerable, &cfg).await.unwrap();

    assert_eq!(report.before.dao, 3000);
    assert_eq!(report.mallory_gain(), 3001);
    assert_eq!(verify(&report, &cfg).unwrap(), Outcome::DrainDetected { stolen: 2000 });
}

#[tokio::test]
async fn starved_trigger_fails_without_draining() {
    let chain = devchain();
    let cfg = ScenarioConfig { trigger_gas: 25_000, ..ScenarioConfig::default() };
    let report = run(&chain, DaoVariant::Vulnerable, &cfg).await.unwrap();

    assert_eq!(report.trigger_status, Some(TxStatus::Failed));
    assert_eq!(report.after, report.before);
    let err = verify(&report, &cfg).unwrap_err();
    assert!(matches!(err, ScenarioError::UnexpectedOutcome { variant: DaoVariant::Vulnerable, .. }));
}

#[tokio::test]
async fn variants_share_a_chain() {
    let chain = devchain();
    let cfg = ScenarioConfig::default();
    let first = run(&chain, DaoVariant::Patched, &cfg).await.unwrap();
    let second = run(&chain, DaoVariant::Vulnerable, &cfg).await.unwrap();

    assert_ne!(first.dao, second.dao);
    assert_eq!(verify(&first, &cfg).unwrap(), Outcome::DrainPrevented);
    assert!(matches!(verify(&second, &cfg).unwrap(), Outcome::DrainDetected { .. }));
    // The patched DAO is untouched by the second run.
    assert_eq!(chain.balance(&first.dao), 3000);
}
