//! Minimal ABI encoding for the static argument types used by the contracts:
//! `address` and `uint256`, each one 32-byte word.

use crate::error::AbiError;
use crate::types::{Address, Word};

/// A static ABI value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(Word),
}

impl Token {
    pub fn uint(value: u128) -> Self {
        Self::Uint(Word::from_u128(value))
    }

    fn encode(&self) -> Word {
        match self {
            Self::Address(a) => a.to_word(),
            Self::Uint(w) => *w,
        }
    }
}

/// Calldata for a method call: selector followed by the encoded arguments.
pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 * args.len());
    out.extend_from_slice(&selector);
    for arg in args {
        out.extend_from_slice(&arg.encode().0);
    }
    out
}

/// Init code followed by encoded constructor arguments.
pub fn encode_constructor(bytecode: &[u8], args: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytecode.len() + 32 * args.len());
    out.extend_from_slice(bytecode);
    for arg in args {
        out.extend_from_slice(&arg.encode().0);
    }
    out
}

/// Split calldata into selector and argument bytes.
pub fn split_selector(data: &[u8]) -> Result<([u8; 4], &[u8]), AbiError> {
    if data.len() < 4 {
        return Err(AbiError::MissingSelector);
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    Ok((selector, &data[4..]))
}

/// Read the `index`-th 32-byte word of `data`.
pub fn decode_word(data: &[u8], index: usize) -> Result<Word, AbiError> {
    let start = index * 32;
    let end = start + 32;
    if data.len() < end {
        return Err(AbiError::Truncated { need: end, have: data.len() });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&data[start..end]);
    Ok(Word(out))
}

pub fn decode_address(data: &[u8], index: usize) -> Result<Address, AbiError> {
    let word = decode_word(data, index)?;
    if word.0[..12].iter().any(|b| *b != 0) {
        return Err(AbiError::DirtyAddress);
    }
    Ok(Address::from_word(&word))
}

pub fn decode_u128(data: &[u8], index: usize) -> Result<u128, AbiError> {
    decode_word(data, index)?.to_u128().ok_or(AbiError::Overflow)
}
