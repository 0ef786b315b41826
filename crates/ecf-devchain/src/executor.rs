//! Message-call execution.
//!
//! Each message call runs in a [`Frame`] with its own gas. The world state is
//! snapshotted on entry and restored if the frame halts, so a failed callee
//! leaves no trace except the gas it burned. Tracer hooks fire as execution
//! happens, including inside frames that later fail.

use tracing::{debug, trace};

use ecf_core::abi::split_selector;
use ecf_core::artifacts::identify;
use ecf_core::constants::MAX_CALL_DEPTH;
use ecf_core::crypto::contract_address;
use ecf_core::error::AbiError;
use ecf_core::traits::ExecutionTracer;
use ecf_core::types::{Address, CallKind, StorageSlot, TransactionRequest, TxContext, TxStatus, Wei, Word};

use crate::contracts;
use crate::error::DevchainError;
use crate::gas;
use crate::state::WorldState;

/// Why a frame stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// All of the frame's gas is consumed.
    OutOfGas,
    /// Remaining gas is returned to the caller.
    Revert(String),
}

impl From<AbiError> for Halt {
    fn from(e: AbiError) -> Self {
        Halt::Revert(e.to_string())
    }
}

/// One running message call.
#[derive(Debug, Clone)]
pub struct Frame {
    pub address: Address,
    pub caller: Address,
    pub value: Wei,
    pub data: Vec<u8>,
    pub gas: u64,
    /// 1 for the transaction's own call.
    pub depth: usize,
}

impl Frame {
    pub fn charge(&mut self, cost: u64) -> Result<(), Halt> {
        if self.gas < cost {
            self.gas = 0;
            return Err(Halt::OutOfGas);
        }
        self.gas -= cost;
        Ok(())
    }

    pub fn selector(&self) -> Option<[u8; 4]> {
        split_selector(&self.data).ok().map(|(s, _)| s)
    }

    pub fn args(&self) -> &[u8] {
        self.data.get(4..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub output: Vec<u8>,
}

#[derive(Debug)]
struct FrameResult {
    success: bool,
    gas_left: u64,
    output: Vec<u8>,
}

impl FrameResult {
    fn failed(gas_left: u64) -> Self {
        Self { success: false, gas_left, output: Vec::new() }
    }
}

/// Result of executing one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub status: TxStatus,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub output: Vec<u8>,
}

/// Tracer that ignores every hook.
pub struct NoopTracer;

impl ExecutionTracer for NoopTracer {}

pub struct Executor<'a> {
    world: &'a mut WorldState,
    tracer: &'a mut dyn ExecutionTracer,
    ctx: TxContext,
    refund: u64,
}

impl<'a> Executor<'a> {
    pub fn new(world: &'a mut WorldState, tracer: &'a mut dyn ExecutionTracer, ctx: TxContext) -> Self {
        Self { world, tracer, ctx, refund: 0 }
    }

    /// Execute `tx` against the world state, buying its gas from the sender
    /// at `gas_price` and refunding what is left. The fee for the used gas is
    /// credited to `coinbase`.
    pub fn execute_transaction(
        &mut self,
        tx: &TransactionRequest,
        gas_price: Wei,
        coinbase: Address,
    ) -> Result<TxOutcome, DevchainError> {
        let intrinsic = gas::intrinsic_gas(tx);
        if tx.gas < intrinsic {
            return Err(DevchainError::IntrinsicGas { gas: tx.gas, need: intrinsic });
        }
        let upfront = u128::from(tx.gas).saturating_mul(gas_price);
        let need = upfront.saturating_add(tx.value);
        let have = self.world.balance(&tx.from);
        if have < need || !self.world.sub_balance(&tx.from, upfront) {
            return Err(DevchainError::InsufficientFunds { need, have });
        }

        let nonce = self.world.nonce(&tx.from);
        self.world.increment_nonce(tx.from);
        self.refund = 0;
        let gas = tx.gas - intrinsic;

        let (result, contract) = match tx.to {
            Some(to) => {
                let frame = Frame { address: to, caller: tx.from, value: tx.value, data: tx.data.clone(), gas, depth: 1 };
                (self.run_message(frame), None)
            }
            None => {
                let address = contract_address(&tx.from, nonce);
                let frame = Frame { address, caller: tx.from, value: tx.value, data: tx.data.clone(), gas, depth: 1 };
                let result = self.run_create(frame);
                let created = result.success.then_some(address);
                (result, created)
            }
        };

        let mut gas_used = tx.gas - result.gas_left;
        let refund = self.refund.min(gas_used / 2);
        gas_used -= refund;
        self.world.add_balance(tx.from, u128::from(tx.gas - gas_used) * gas_price);
        self.world.add_balance(coinbase, u128::from(gas_used) * gas_price);

        let status = if result.success { TxStatus::Success } else { TxStatus::Failed };
        debug!(from = %tx.from, ?status, gas_used, refund, "transaction executed");
        Ok(TxOutcome { status, gas_used, contract_address: contract, output: result.output })
    }

    /// Run a message call without buying gas or bumping nonces.
    pub fn call_readonly(&mut self, tx: &TransactionRequest) -> Result<Vec<u8>, DevchainError> {
        let to = tx.to.ok_or_else(|| DevchainError::Reverted("call without recipient".into()))?;
        let frame = Frame { address: to, caller: tx.from, value: tx.value, data: tx.data.clone(), gas: tx.gas, depth: 1 };
        if self.world.balance(&tx.from) < tx.value {
            return Err(DevchainError::InsufficientFunds { need: tx.value, have: self.world.balance(&tx.from) });
        }
        let result = self.run_message(frame);
        if result.success {
            Ok(result.output)
        } else {
            Err(DevchainError::Reverted(format!("call to {to} failed")))
        }
    }

    pub fn balance(&self, address: &Address) -> Wei {
        self.world.balance(address)
    }

    pub fn sload(&mut self, frame: &mut Frame, slot: StorageSlot) -> Result<Word, Halt> {
        frame.charge(gas::G_SLOAD)?;
        let value = self.world.storage(&frame.address, &slot);
        self.tracer.on_sload(frame.address, &slot, &value);
        Ok(value)
    }

    pub fn sstore(&mut self, frame: &mut Frame, slot: StorageSlot, value: Word) -> Result<(), Halt> {
        let current = self.world.storage(&frame.address, &slot);
        let (cost, refund) = gas::sstore_cost(&current, &value);
        frame.charge(cost)?;
        self.refund += refund;
        self.tracer.on_sstore(frame.address, &slot, &value);
        self.world.set_storage(frame.address, slot, value);
        Ok(())
    }

    /// `CALL` from `frame` to `to`. `requested` is the gas operand; the
    /// callee receives at most all but one 64th of what remains after the
    /// call's own cost, plus the stipend when value is sent.
    ///
    /// A callee failure is reported in the outcome; only the caller running
    /// out of gas for the call itself is a [`Halt`].
    pub fn call(
        &mut self,
        frame: &mut Frame,
        to: Address,
        value: Wei,
        data: Vec<u8>,
        requested: u64,
    ) -> Result<CallOutcome, Halt> {
        let cost = if value > 0 { gas::G_CALL + gas::G_CALL_VALUE } else { gas::G_CALL };
        frame.charge(cost)?;
        let forwarded = gas::call_gas(frame.gas, requested);
        frame.gas -= forwarded;
        let stipend = if value > 0 { gas::G_CALL_STIPEND } else { 0 };
        let child_gas = forwarded + stipend;

        if frame.depth >= MAX_CALL_DEPTH {
            debug!(depth = frame.depth, "call depth limit reached");
            frame.gas += child_gas;
            return Ok(CallOutcome { success: false, output: Vec::new() });
        }
        if self.world.balance(&frame.address) < value {
            trace!(from = %frame.address, %to, value, "insufficient balance for call");
            frame.gas += child_gas;
            return Ok(CallOutcome { success: false, output: Vec::new() });
        }

        if self.world.code(&to).is_some() {
            self.tracer.on_call(frame.address, to, value, CallKind::Call);
        }
        let child = Frame { address: to, caller: frame.address, value, data, gas: child_gas, depth: frame.depth + 1 };
        let result = self.run_message(child);
        frame.gas += result.gas_left;
        Ok(CallOutcome { success: result.success, output: result.output })
    }

    fn run_message(&mut self, mut frame: Frame) -> FrameResult {
        let snapshot = self.world.clone();
        let refund = self.refund;

        if !self.world.transfer(&frame.caller, frame.address, frame.value) {
            return FrameResult::failed(frame.gas);
        }
        let Some(kind) = self.world.code(&frame.address) else {
            return FrameResult { success: true, gas_left: frame.gas, output: Vec::new() };
        };

        self.tracer.on_enter(&self.ctx, frame.address);
        let result = frame.charge(gas::G_RUN).and_then(|_| contracts::run(self, &mut frame, kind));
        self.tracer.on_exit(&self.ctx, frame.address);

        match result {
            Ok(output) => FrameResult { success: true, gas_left: frame.gas, output },
            Err(halt) => {
                trace!(contract = %frame.address, depth = frame.depth, ?halt, "frame halted");
                *self.world = snapshot;
                self.refund = refund;
                let gas_left = match halt {
                    Halt::OutOfGas => 0,
                    Halt::Revert(_) => frame.gas,
                };
                FrameResult::failed(gas_left)
            }
        }
    }

    fn run_create(&mut self, mut frame: Frame) -> FrameResult {
        let Some((artifact, args)) = identify(&frame.data) else {
            debug!(len = frame.data.len(), "unknown init code");
            return FrameResult::failed(0);
        };
        let args = args.to_vec();
        let snapshot = self.world.clone();
        let refund = self.refund;

        if !self.world.transfer(&frame.caller, frame.address, frame.value) {
            return FrameResult::failed(frame.gas);
        }
        self.world.install(frame.address, artifact.kind);

        self.tracer.on_enter(&self.ctx, frame.address);
        let result = frame
            .charge(gas::G_RUN)
            .and_then(|_| contracts::construct(self, &mut frame, artifact.kind, &args))
            .and_then(|_| frame.charge(gas::G_CODE_DEPOSIT * artifact.len() as u64));
        self.tracer.on_exit(&self.ctx, frame.address);

        match result {
            Ok(()) => {
                debug!(name = artifact.name, address = %frame.address, "contract created");
                FrameResult { success: true, gas_left: frame.gas, output: Vec::new() }
            }
            Err(halt) => {
                debug!(name = artifact.name, ?halt, "contract creation failed");
                *self.world = snapshot;
                self.refund = refund;
                FrameResult::failed(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecf_core::abi::{Token, encode_call, encode_constructor};
    use ecf_core::artifacts::{ContractKind, DaoVariant, MALLORY, simple_dao};
    use ecf_core::constants::selectors;

    const OPERATOR: Address = Address([0x0a; 20]);
    const COINBASE: Address = Address([0xcb; 20]);

    fn funded() -> WorldState {
        let mut world = WorldState::new();
        world.add_balance(OPERATOR, 10u128.pow(24));
        world
    }

    fn execute(world: &mut WorldState, tx: &TransactionRequest) -> TxOutcome {
        let mut tracer = NoopTracer;
        Executor::new(world, &mut tracer, TxContext::default())
            .execute_transaction(tx, 1, COINBASE)
            .unwrap()
    }

    fn deploy_dao(world: &mut WorldState, variant: DaoVariant) -> Address {
        let code = simple_dao(variant).bytecode().unwrap();
        let out = execute(world, &TransactionRequest::create(OPERATOR, code, 4_700_000));
        out.contract_address.unwrap()
    }

    #[test]
    fn create_installs_code_at_derived_address() {
        let mut world = funded();
        let dao = deploy_dao(&mut world, DaoVariant::Vulnerable);
        assert_eq!(dao, contract_address(&OPERATOR, 0));
        assert_eq!(world.code(&dao), Some(ContractKind::SimpleDao(DaoVariant::Vulnerable)));
        assert_eq!(world.nonce(&OPERATOR), 1);
    }

    #[test]
    fn unknown_init_code_fails_and_burns_gas() {
        let mut world = funded();
        let out = execute(&mut world, &TransactionRequest::create(OPERATOR, vec![0x60, 0x00], 100_000));
        assert_eq!(out.status, TxStatus::Failed);
        assert_eq!(out.gas_used, 100_000);
        assert_eq!(world.nonce(&OPERATOR), 1);
    }

    #[test]
    fn mallory_constructor_stores_dao_and_owner() {
        let mut world = funded();
        let dao = deploy_dao(&mut world, DaoVariant::Vulnerable);
        let code = encode_constructor(&MALLORY.bytecode().unwrap(), &[Token::Address(dao)]);
        let out = execute(&mut world, &TransactionRequest::create(OPERATOR, code, 4_700_000));
        let mallory = out.contract_address.unwrap();
        assert_eq!(world.storage(&mallory, &Word::from_u64(0)), dao.to_word());
        assert_eq!(world.storage(&mallory, &Word::from_u64(1)), OPERATOR.to_word());
    }

    #[test]
    fn fees_go_to_coinbase() {
        let mut world = funded();
        let before = world.total_supply();
        let out = execute(&mut world, &TransactionRequest::transfer(OPERATOR, Address([7; 20]), 5, 50_000));
        assert_eq!(out.gas_used, 21_000);
        assert_eq!(world.balance(&COINBASE), 21_000);
        assert_eq!(world.balance(&Address([7; 20])), 5);
        assert_eq!(world.total_supply(), before);
    }

    #[test]
    fn failed_call_rolls_back_value() {
        let mut world = funded();
        let dao = deploy_dao(&mut world, DaoVariant::Vulnerable);
        // SimpleDAO has no payable fallback.
        let out = execute(&mut world, &TransactionRequest::transfer(OPERATOR, dao, 10, 100_000));
        assert_eq!(out.status, TxStatus::Failed);
        assert_eq!(world.balance(&dao), 0);
    }

    #[test]
    fn intrinsic_gas_is_enforced() {
        let mut world = funded();
        let mut tracer = NoopTracer;
        let tx = TransactionRequest::transfer(OPERATOR, Address([7; 20]), 1, 20_000);
        let err = Executor::new(&mut world, &mut tracer, TxContext::default())
            .execute_transaction(&tx, 1, COINBASE)
            .unwrap_err();
        assert_eq!(err, DevchainError::IntrinsicGas { gas: 20_000, need: 21_000 });
    }

    #[test]
    fn underfunded_sender_is_rejected_untouched() {
        let poor = Address([0x0b; 20]);
        let mut world = funded();
        world.add_balance(poor, 21_000);
        let snapshot = world.clone();

        let mut tracer = NoopTracer;
        let tx = TransactionRequest::transfer(poor, Address([7; 20]), 1, 21_000);
        let err = Executor::new(&mut world, &mut tracer, TxContext::default())
            .execute_transaction(&tx, 1, COINBASE)
            .unwrap_err();
        assert_eq!(err, DevchainError::InsufficientFunds { need: 21_001, have: 21_000 });
        assert_eq!(world, snapshot);
    }

    #[test]
    fn readonly_call_leaves_state_untouched() {
        let mut world = funded();
        let dao = deploy_dao(&mut world, DaoVariant::Patched);
        let donate = encode_call(selectors::DONATE, &[Token::Address(OPERATOR)]);
        execute(&mut world, &TransactionRequest::invoke(OPERATOR, dao, donate, 42, 100_000));

        let snapshot = world.clone();
        let query = encode_call(selectors::CREDIT, &[Token::Address(OPERATOR)]);
        let mut tracer = NoopTracer;
        let out = Executor::new(&mut world, &mut tracer, TxContext::default())
            .call_readonly(&TransactionRequest::invoke(OPERATOR, dao, query, 0, 1_000_000))
            .unwrap();
        assert_eq!(Word(out.try_into().unwrap()), Word::from_u64(42));
        assert_eq!(world, snapshot);
    }

    #[test]
    fn frame_charge_exhausts_gas() {
        let mut frame = Frame { address: OPERATOR, caller: OPERATOR, value: 0, data: vec![], gas: 10, depth: 1 };
        assert_eq!(frame.charge(11), Err(Halt::OutOfGas));
        assert_eq!(frame.gas, 0);
        assert_eq!(frame.selector(), None);
        assert!(frame.args().is_empty());
    }
}
