//! Shared helpers for the integration tests.

use std::sync::Arc;

use parking_lot::Mutex;

use ecf_checker::{Checker, CheckerConfig, MemorySink};
use ecf_core::abi::{Token, encode_call, encode_constructor};
use ecf_core::artifacts::{DaoVariant, MALLORY, simple_dao};
use ecf_core::constants::{DEPLOY_GAS, DONATE_GAS, selectors};
use ecf_core::traits::ExecutionTracer;
use ecf_core::types::{Address, CallKind, StorageSlot, TransactionRequest, TxContext, TxHash, Wei, Word};
use ecf_devchain::chain::SharedTracer;
use ecf_devchain::{Devchain, DevchainConfig};

/// Devchain with deterministic timestamps.
pub fn devchain() -> Devchain {
    Devchain::new(DevchainConfig { genesis_timestamp: Some(1_700_000_000), ..DevchainConfig::default() })
}

/// Devchain with an enabled checker reporting into memory.
pub fn checked_devchain() -> (Devchain, Arc<Mutex<Checker>>, MemorySink) {
    let sink = MemorySink::new();
    let checker = Arc::new(Mutex::new(Checker::new(CheckerConfig::default(), Box::new(sink.clone()))));
    let tracer: SharedTracer = checker.clone();
    (devchain().with_tracer(tracer), checker, sink)
}

/// Devchain with a [`RecordingTracer`] attached.
pub fn recorded_devchain() -> (Devchain, Arc<Mutex<RecordingTracer>>) {
    let recorder = Arc::new(Mutex::new(RecordingTracer::default()));
    let tracer: SharedTracer = recorder.clone();
    (devchain().with_tracer(tracer), recorder)
}

/// Submit `tx` and mine it, returning its hash.
pub fn mined(chain: &Devchain, tx: TransactionRequest) -> TxHash {
    let hash = chain.submit(tx).unwrap();
    chain.mine(1);
    hash
}

/// Deploy SimpleDAO from `from` and return its address.
pub fn deploy_dao(chain: &Devchain, from: Address, variant: DaoVariant) -> Address {
    let code = simple_dao(variant).bytecode().unwrap();
    let hash = mined(chain, TransactionRequest::create(from, code, DEPLOY_GAS));
    chain.receipt(&hash).unwrap().contract_address.unwrap()
}

/// Deploy Mallory pointed at `dao` and return its address.
pub fn deploy_mallory(chain: &Devchain, from: Address, dao: Address) -> Address {
    let code = encode_constructor(&MALLORY.bytecode().unwrap(), &[Token::Address(dao)]);
    let hash = mined(chain, TransactionRequest::create(from, code, DEPLOY_GAS));
    chain.receipt(&hash).unwrap().contract_address.unwrap()
}

pub fn donate_tx(from: Address, dao: Address, to: Address, value: Wei) -> TransactionRequest {
    TransactionRequest::invoke(from, dao, encode_call(selectors::DONATE, &[Token::Address(to)]), value, DONATE_GAS)
}

pub fn withdraw_tx(from: Address, dao: Address, amount: Wei) -> TransactionRequest {
    TransactionRequest::invoke(from, dao, encode_call(selectors::WITHDRAW, &[Token::uint(amount)]), 0, DONATE_GAS)
}

/// `dao.credit(holder)` as a full word.
pub fn credit(chain: &Devchain, dao: Address, holder: Address) -> Word {
    let data = encode_call(selectors::CREDIT, &[Token::Address(holder)]);
    let output = chain.call(&TransactionRequest::invoke(holder, dao, data, 0, 0)).unwrap();
    Word(output[..32].try_into().unwrap())
}

/// One execution hook as seen by a tracer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Enter(Address),
    Exit(Address),
    Sload { contract: Address, slot: StorageSlot, value: Word },
    Sstore { contract: Address, slot: StorageSlot, value: Word },
    Call { caller: Address, callee: Address, value: Wei, kind: CallKind },
}

/// Tracer that keeps every hook in order.
#[derive(Default, Debug)]
pub struct RecordingTracer {
    pub events: Vec<Event>,
}

impl RecordingTracer {
    /// Index of the first value transfer from `caller` to `callee`.
    pub fn first_call(&self, caller: Address, callee: Address) -> Option<usize> {
        self.events
            .iter()
            .position(|e| matches!(e, Event::Call { caller: c, callee: d, value, .. } if *c == caller && *d == callee && *value > 0))
    }

    /// Last value written to `slot` of `contract` before event `index`.
    pub fn last_store_before(&self, contract: Address, slot: &StorageSlot, index: usize) -> Option<Word> {
        self.events[..index].iter().rev().find_map(|e| match e {
            Event::Sstore { contract: c, slot: s, value } if *c == contract && s == slot => Some(*value),
            _ => None,
        })
    }
}

impl ExecutionTracer for RecordingTracer {
    fn on_enter(&mut self, _ctx: &TxContext, contract: Address) {
        self.events.push(Event::Enter(contract));
    }

    fn on_exit(&mut self, _ctx: &TxContext, contract: Address) {
        self.events.push(Event::Exit(contract));
    }

    fn on_sload(&mut self, contract: Address, slot: &StorageSlot, value: &Word) {
        self.events.push(Event::Sload { contract, slot: *slot, value: *value });
    }

    fn on_sstore(&mut self, contract: Address, slot: &StorageSlot, value: &Word) {
        self.events.push(Event::Sstore { contract, slot: *slot, value: *value });
    }

    fn on_call(&mut self, caller: Address, callee: Address, value: Wei, kind: CallKind) {
        self.events.push(Event::Call { caller, callee, value, kind });
    }
}
