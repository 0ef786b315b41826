//! Property tests for the SimpleDAO ledger.

use proptest::prelude::*;

use ecf_core::artifacts::DaoVariant;
use ecf_core::types::{Address, Wei, Word};
use ecf_devchain::Devchain;
use ecf_tests::helpers::*;

#[derive(Clone, Debug)]
enum Op {
    Donate { from: usize, to: usize, value: Wei },
    Withdraw { by: usize, amount: Wei },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..3usize, 0..5_000u128).prop_map(|(from, to, value)| Op::Donate { from, to, value }),
        (0..3usize, 0..6_000u128).prop_map(|(by, amount)| Op::Withdraw { by, amount }),
    ]
}

fn credits(chain: &Devchain, dao: Address, holders: &[Address]) -> Vec<Wei> {
    holders
        .iter()
        .map(|h| credit(chain, dao, *h).to_u128().expect("credit wrapped below zero"))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn donations_are_additive(a in 0..1_000_000u128, b in 0..1_000_000u128, patched in any::<bool>()) {
        let chain = devchain();
        let accounts = chain.accounts();
        let variant = if patched { DaoVariant::Patched } else { DaoVariant::Vulnerable };
        let dao = deploy_dao(&chain, accounts[0], variant);

        chain.submit(donate_tx(accounts[0], dao, accounts[2], a)).unwrap();
        chain.submit(donate_tx(accounts[1], dao, accounts[2], b)).unwrap();
        chain.mine(1);

        prop_assert_eq!(credit(&chain, dao, accounts[2]), Word::from_u128(a + b));
        prop_assert_eq!(chain.balance(&dao), a + b);
    }

    #[test]
    fn patched_ledger_stays_backed(ops in prop::collection::vec(op(), 1..12)) {
        let chain = devchain();
        let accounts = chain.accounts();
        let dao = deploy_dao(&chain, accounts[0], DaoVariant::Patched);
        let mut donated = [0u128; 3];

        for op in ops {
            match op {
                Op::Donate { from, to, value } => {
                    mined(&chain, donate_tx(accounts[from], dao, accounts[to], value));
                    donated[to] += value;
                }
                Op::Withdraw { by, amount } => {
                    mined(&chain, withdraw_tx(accounts[by], dao, amount));
                }
            }

            let now = credits(&chain, dao, &accounts);
            for (credit, donated) in now.iter().zip(donated.iter()) {
                prop_assert!(credit <= donated);
            }
            prop_assert!(now.iter().sum::<Wei>() <= chain.balance(&dao));
        }
    }

    #[test]
    fn direct_withdrawals_never_go_negative(
        ops in prop::collection::vec(op(), 1..12),
        patched in any::<bool>(),
    ) {
        // Externally owned accounts cannot reenter, so both builds keep
        // every credit within what was donated.
        let chain = devchain();
        let accounts = chain.accounts();
        let variant = if patched { DaoVariant::Patched } else { DaoVariant::Vulnerable };
        let dao = deploy_dao(&chain, accounts[0], variant);

        for op in ops {
            match op {
                Op::Donate { from, to, value } => {
                    mined(&chain, donate_tx(accounts[from], dao, accounts[to], value));
                }
                Op::Withdraw { by, amount } => {
                    mined(&chain, withdraw_tx(accounts[by], dao, amount));
                }
            }
            let total: Wei = credits(&chain, dao, &accounts).iter().sum();
            prop_assert_eq!(total, chain.balance(&dao));
        }
    }
}
