//! Account balances, nonces, code and storage.

use std::collections::BTreeMap;

use ecf_core::artifacts::ContractKind;
use ecf_core::types::{Address, StorageSlot, Wei, Word};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: Wei,
    pub nonce: u64,
    /// Behaviour of the deployed contract; `None` for externally owned accounts.
    pub code: Option<ContractKind>,
    /// Non-zero storage words.
    pub storage: BTreeMap<StorageSlot, Word>,
}

impl Account {
    pub fn is_contract(&self) -> bool {
        self.code.is_some()
    }
}

/// The full account set. Cloned to snapshot before each message call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: BTreeMap<Address, Account>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn balance(&self, address: &Address) -> Wei {
        self.accounts.get(address).map_or(0, |a| a.balance)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.nonce)
    }

    pub fn code(&self, address: &Address) -> Option<ContractKind> {
        self.accounts.get(address).and_then(|a| a.code)
    }

    pub fn storage(&self, address: &Address, slot: &StorageSlot) -> Word {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(slot).copied())
            .unwrap_or_default()
    }

    pub fn set_storage(&mut self, address: Address, slot: StorageSlot, value: Word) {
        let storage = &mut self.accounts.entry(address).or_default().storage;
        if value.is_zero() {
            storage.remove(&slot);
        } else {
            storage.insert(slot, value);
        }
    }

    pub fn add_balance(&mut self, address: Address, amount: Wei) {
        if amount == 0 {
            return;
        }
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(amount);
    }

    /// Take `amount` from `address`; `false` (and no change) if it cannot pay.
    pub fn sub_balance(&mut self, address: &Address, amount: Wei) -> bool {
        if amount == 0 {
            return true;
        }
        match self.accounts.get_mut(address) {
            Some(account) if account.balance >= amount => {
                account.balance -= amount;
                true
            }
            _ => false,
        }
    }

    pub fn transfer(&mut self, from: &Address, to: Address, amount: Wei) -> bool {
        if !self.sub_balance(from, amount) {
            return false;
        }
        self.add_balance(to, amount);
        true
    }

    pub fn increment_nonce(&mut self, address: Address) {
        self.accounts.entry(address).or_default().nonce += 1;
    }

    pub fn install(&mut self, address: Address, kind: ContractKind) {
        let account = self.accounts.entry(address).or_default();
        account.code = Some(kind);
        account.nonce = account.nonce.max(1);
    }

    /// Total wei held by all accounts.
    pub fn total_supply(&self) -> Wei {
        self.accounts.values().map(|a| a.balance).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecf_core::artifacts::DaoVariant;

    const ALICE: Address = Address([1; 20]);
    const BOB: Address = Address([2; 20]);

    #[test]
    fn transfer_moves_funds() {
        let mut world = WorldState::new();
        world.add_balance(ALICE, 100);
        assert!(world.transfer(&ALICE, BOB, 40));
        assert_eq!(world.balance(&ALICE), 60);
        assert_eq!(world.balance(&BOB), 40);
    }

    #[test]
    fn overdraft_changes_nothing() {
        let mut world = WorldState::new();
        world.add_balance(ALICE, 10);
        assert!(!world.transfer(&ALICE, BOB, 11));
        assert_eq!(world.balance(&ALICE), 10);
        assert!(!world.exists(&BOB));
    }

    #[test]
    fn zero_transfer_from_unknown_account() {
        let mut world = WorldState::new();
        assert!(world.transfer(&ALICE, BOB, 0));
    }

    #[test]
    fn zero_storage_is_pruned() {
        let mut world = WorldState::new();
        let slot = Word::from_u64(3);
        world.set_storage(ALICE, slot, Word::from_u64(9));
        assert_eq!(world.storage(&ALICE, &slot), Word::from_u64(9));
        world.set_storage(ALICE, slot, Word::ZERO);
        assert!(world.account(&ALICE).unwrap().storage.is_empty());
        assert_eq!(world.storage(&ALICE, &slot), Word::ZERO);
    }

    #[test]
    fn installed_contract_has_code_and_nonce() {
        let mut world = WorldState::new();
        world.install(BOB, ContractKind::SimpleDao(DaoVariant::Patched));
        assert!(world.account(&BOB).unwrap().is_contract());
        assert_eq!(world.nonce(&BOB), 1);
        assert_eq!(world.code(&ALICE), None);
    }

    #[test]
    fn snapshot_restores_state() {
        let mut world = WorldState::new();
        world.add_balance(ALICE, 5);
        let snapshot = world.clone();
        world.add_balance(BOB, 7);
        world = snapshot;
        assert_eq!(world.total_supply(), 5);
    }

    proptest::proptest! {
        #[test]
        fn transfers_conserve_supply(
            moves in proptest::collection::vec((0..3usize, 0..3usize, 0..200u128), 0..32),
        ) {
            let parties = [ALICE, BOB, Address([3; 20])];
            let mut world = WorldState::new();
            world.add_balance(ALICE, 500);
            for (from, to, amount) in moves {
                let before = world.balance(&parties[from]);
                let moved = world.transfer(&parties[from], parties[to], amount);
                proptest::prop_assert_eq!(moved, before >= amount);
                proptest::prop_assert_eq!(world.total_supply(), 500);
            }
        }
    }
}
