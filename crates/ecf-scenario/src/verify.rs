//! Assertions on a finished run.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use ecf_core::artifacts::DaoVariant;
use ecf_core::types::{TxStatus, Wei, Word};

use crate::config::ScenarioConfig;
use crate::error::ScenarioError;
use crate::scenario::ScenarioReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Mallory withdrew more than its own credit; `stolen` is the excess.
    DrainDetected { stolen: Wei },
    /// Mallory got back exactly its credit plus the trigger payment.
    DrainPrevented,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DrainDetected { stolen } => write!(f, "drain detected: {stolen} wei taken from other donors"),
            Self::DrainPrevented => write!(f, "drain prevented"),
        }
    }
}

fn unexpected(variant: DaoVariant, reason: String) -> ScenarioError {
    ScenarioError::UnexpectedOutcome { variant, reason }
}

/// Check `report` against what its SimpleDAO build must do.
///
/// The vulnerable build must pay Mallory more than its credit. The patched
/// build must pay exactly the credit, leave `credit[mallory]` at zero and
/// keep the other donor's funds.
pub fn verify(report: &ScenarioReport, cfg: &ScenarioConfig) -> Result<Outcome, ScenarioError> {
    let variant = report.variant;
    if report.trigger_status != Some(TxStatus::Success) {
        return Err(unexpected(variant, format!("trigger payment status {:?}", report.trigger_status)));
    }

    let gain = report.mallory_gain();
    let honest = cfg.honest_gain();
    let outcome = match variant {
        DaoVariant::Vulnerable => {
            if gain <= honest {
                return Err(unexpected(variant, format!("Mallory gained {gain}, expected more than {honest}")));
            }
            Outcome::DrainDetected { stolen: gain - honest }
        }
        DaoVariant::Patched => {
            if gain != honest {
                return Err(unexpected(variant, format!("Mallory gained {gain}, expected exactly {honest}")));
            }
            if report.mallory_credit != Word::ZERO {
                return Err(unexpected(variant, format!("Mallory's credit is {}", report.mallory_credit)));
            }
            let kept = report.after.dao;
            if kept < cfg.victim_donation {
                return Err(unexpected(variant, format!("SimpleDAO kept {kept}, less than the other donation")));
            }
            Outcome::DrainPrevented
        }
    };
    info!(%variant, %outcome, "scenario verified");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Balances;
    use ecf_core::types::Address;

    fn report(variant: DaoVariant, mallory_after: Wei, dao_after: Wei, credit: Word) -> ScenarioReport {
        ScenarioReport {
            variant,
            operator: Address([1; 20]),
            donator: Address([2; 20]),
            dao: Address([3; 20]),
            mallory: Address([4; 20]),
            before: Balances { dao: 4000, mallory: 0 },
            after: Balances { dao: dao_after, mallory: mallory_after },
            mallory_credit: credit,
            donator_credit: Word::from_u128(3000),
            trigger_status: Some(TxStatus::Success),
        }
    }

    #[test]
    fn vulnerable_drain_is_detected() {
        let cfg = ScenarioConfig::default();
        let r = report(DaoVariant::Vulnerable, 4001, 0, Word::ZERO.wrapping_sub(&Word::from_u128(3000)));
        assert_eq!(verify(&r, &cfg).unwrap(), Outcome::DrainDetected { stolen: 3000 });
    }

    #[test]
    fn vulnerable_without_drain_is_unexpected() {
        let cfg = ScenarioConfig::default();
        let r = report(DaoVariant::Vulnerable, 1001, 3000, Word::ZERO);
        let err = verify(&r, &cfg).unwrap_err();
        assert!(matches!(err, ScenarioError::UnexpectedOutcome { variant: DaoVariant::Vulnerable, .. }));
    }

    #[test]
    fn patched_exact_refund_is_prevented() {
        let cfg = ScenarioConfig::default();
        let r = report(DaoVariant::Patched, 1001, 3000, Word::ZERO);
        assert_eq!(verify(&r, &cfg).unwrap(), Outcome::DrainPrevented);
    }

    #[test]
    fn patched_overpayment_is_unexpected() {
        let cfg = ScenarioConfig::default();
        let r = report(DaoVariant::Patched, 2001, 2000, Word::ZERO);
        assert!(verify(&r, &cfg).is_err());
    }

    #[test]
    fn patched_leftover_credit_is_unexpected() {
        let cfg = ScenarioConfig::default();
        let r = report(DaoVariant::Patched, 1001, 3000, Word::from_u128(1000));
        let err = verify(&r, &cfg).unwrap_err();
        assert!(err.to_string().contains("credit"));
    }

    #[test]
    fn failed_trigger_is_unexpected() {
        let cfg = ScenarioConfig::default();
        let mut r = report(DaoVariant::Patched, 1001, 3000, Word::ZERO);
        r.trigger_status = Some(TxStatus::Failed);
        assert!(verify(&r, &cfg).is_err());
    }

    #[test]
    fn outcome_display() {
        assert_eq!(Outcome::DrainPrevented.to_string(), "drain prevented");
        assert!(Outcome::DrainDetected { stolen: 3000 }.to_string().contains("3000"));
    }
}
