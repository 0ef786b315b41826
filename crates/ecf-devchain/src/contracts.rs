//! Native implementations of the known contract artifacts.
//!
//! Each function follows the compiled contract's storage layout, call gas
//! operands and failure behaviour, so storage accesses and calls reach the
//! tracer in the same order the bytecode would produce them.

use tracing::{debug, trace};

use ecf_core::abi::{Token, decode_address, decode_word, encode_call};
use ecf_core::artifacts::{ContractKind, DaoVariant};
use ecf_core::constants::selectors;
use ecf_core::crypto::mapping_slot;
use ecf_core::types::{Address, StorageSlot, Word};

use crate::executor::{Executor, Frame, Halt};

/// SimpleDAO keeps `credit` at slot 0.
pub const CREDIT_MAPPING_SLOT: u64 = 0;
/// Mallory's `dao` field.
pub const MALLORY_DAO_SLOT: u64 = 0;
/// Mallory's `owner` field.
pub const MALLORY_OWNER_SLOT: u64 = 1;

/// SimpleDAO's raw value call passes `gas - 34710`.
pub const DAO_CALL_RESERVE: u64 = 34_710;
/// Mallory's high-level calls pass `gas - 710`.
pub const MALLORY_CALL_RESERVE: u64 = 710;

/// Storage slot of `credit[holder]` in SimpleDAO.
pub fn credit_slot(holder: &Address) -> StorageSlot {
    mapping_slot(&holder.to_word(), CREDIT_MAPPING_SLOT)
}

fn non_payable(frame: &Frame) -> Result<(), Halt> {
    if frame.value > 0 {
        return Err(Halt::Revert("non-payable function received value".into()));
    }
    Ok(())
}

/// Run the code of `kind` for `frame`, returning the call output.
pub(crate) fn run(exec: &mut Executor<'_>, frame: &mut Frame, kind: ContractKind) -> Result<Vec<u8>, Halt> {
    match kind {
        ContractKind::SimpleDao(variant) => simple_dao(exec, frame, variant),
        ContractKind::Mallory => mallory(exec, frame),
    }
}

/// Run the constructor of `kind` with ABI-encoded `args`.
pub(crate) fn construct(exec: &mut Executor<'_>, frame: &mut Frame, kind: ContractKind, args: &[u8]) -> Result<(), Halt> {
    match kind {
        ContractKind::SimpleDao(_) => non_payable(frame),
        ContractKind::Mallory => {
            let dao = decode_address(args, 0)?;
            exec.sstore(frame, Word::from_u64(MALLORY_DAO_SLOT), dao.to_word())?;
            let owner = frame.caller;
            exec.sstore(frame, Word::from_u64(MALLORY_OWNER_SLOT), owner.to_word())
        }
    }
}

fn simple_dao(exec: &mut Executor<'_>, frame: &mut Frame, variant: DaoVariant) -> Result<Vec<u8>, Halt> {
    match frame.selector() {
        Some(selectors::DONATE) => {
            let to = decode_address(frame.args(), 0)?;
            let slot = credit_slot(&to);
            let credit = exec.sload(frame, slot)?;
            exec.sstore(frame, slot, credit.wrapping_add(&Word::from_u128(frame.value)))?;
            Ok(Vec::new())
        }
        Some(selectors::WITHDRAW) => {
            non_payable(frame)?;
            let amount = decode_word(frame.args(), 0)?;
            withdraw(exec, frame, variant, amount)?;
            Ok(Vec::new())
        }
        Some(selectors::QUERY_CREDIT) | Some(selectors::CREDIT) => {
            non_payable(frame)?;
            let holder = decode_address(frame.args(), 0)?;
            Ok(exec.sload(frame, credit_slot(&holder))?.0.to_vec())
        }
        _ => Err(Halt::Revert("SimpleDAO has no fallback".into())),
    }
}

fn withdraw(exec: &mut Executor<'_>, frame: &mut Frame, variant: DaoVariant, amount: Word) -> Result<(), Halt> {
    let slot = credit_slot(&frame.caller);
    let credit = exec.sload(frame, slot)?;
    if credit < amount {
        trace!(caller = %frame.caller, %credit, %amount, "withdraw above credit ignored");
        return Ok(());
    }

    match variant {
        DaoVariant::Vulnerable => {
            send_raw(exec, frame, amount)?;
            let credit = exec.sload(frame, slot)?;
            exec.sstore(frame, slot, credit.wrapping_sub(&amount))
        }
        DaoVariant::Patched => {
            let credit = exec.sload(frame, slot)?;
            exec.sstore(frame, slot, credit.wrapping_sub(&amount))?;
            send_raw(exec, frame, amount)
        }
    }
}

/// `msg.sender.call.value(amount)()`; the result is ignored.
fn send_raw(exec: &mut Executor<'_>, frame: &mut Frame, amount: Word) -> Result<(), Halt> {
    let Some(value) = amount.to_u128() else {
        debug!(%amount, "withdraw amount exceeds any balance");
        return Ok(());
    };
    let requested = frame.gas.wrapping_sub(DAO_CALL_RESERVE);
    let to = frame.caller;
    let outcome = exec.call(frame, to, value, Vec::new(), requested)?;
    trace!(%to, value, success = outcome.success, "SimpleDAO raw call");
    Ok(())
}

fn mallory(exec: &mut Executor<'_>, frame: &mut Frame) -> Result<Vec<u8>, Halt> {
    match frame.selector() {
        Some(selectors::DAO) => {
            non_payable(frame)?;
            Ok(exec.sload(frame, Word::from_u64(MALLORY_DAO_SLOT))?.0.to_vec())
        }
        Some(selectors::GET_JACKPOT) => {
            non_payable(frame)?;
            let owner = Address::from_word(&exec.sload(frame, Word::from_u64(MALLORY_OWNER_SLOT))?);
            let jackpot = exec.balance(&frame.address);
            // owner.send(this.balance): stipend only, result ignored.
            exec.call(frame, owner, jackpot, Vec::new(), 0)?;
            Ok(Vec::new())
        }
        _ => mallory_fallback(exec, frame),
    }
}

/// `dao.withdraw(dao.queryCredit(this))`, reverting if either call fails.
fn mallory_fallback(exec: &mut Executor<'_>, frame: &mut Frame) -> Result<Vec<u8>, Halt> {
    let dao = Address::from_word(&exec.sload(frame, Word::from_u64(MALLORY_DAO_SLOT))?);
    let query = encode_call(selectors::QUERY_CREDIT, &[Token::Address(frame.address)]);
    let requested = frame.gas.wrapping_sub(MALLORY_CALL_RESERVE);
    let outcome = exec.call(frame, dao, 0, query, requested)?;
    if !outcome.success {
        return Err(Halt::Revert("queryCredit failed".into()));
    }
    let amount = decode_word(&outcome.output, 0)?;

    let dao = Address::from_word(&exec.sload(frame, Word::from_u64(MALLORY_DAO_SLOT))?);
    let withdraw = encode_call(selectors::WITHDRAW, &[Token::Uint(amount)]);
    let requested = frame.gas.wrapping_sub(MALLORY_CALL_RESERVE);
    let outcome = exec.call(frame, dao, 0, withdraw, requested)?;
    if !outcome.success {
        return Err(Halt::Revert("withdraw failed".into()));
    }
    trace!(mallory = %frame.address, %amount, depth = frame.depth, "fallback withdrew");
    Ok(Vec::new())
}
