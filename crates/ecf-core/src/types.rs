//! Core chain types: addresses, 256-bit words, transactions and receipts.
//!
//! Native-currency amounts are in wei and carried as `u128`. Contract storage
//! and ABI values are 256-bit big-endian [`Word`]s with wrapping arithmetic,
//! matching the unchecked integer semantics of the contracts in this repo.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HexError;

/// Amount of native currency in its smallest unit.
pub type Wei = u128;

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| HexError::InvalidHex(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexError::InvalidLength { expected: N, got })
}

/// A 20-byte account or contract address.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(into = "String", try_from = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad into a 32-byte word, as stored in contract storage and ABI data.
    pub fn to_word(&self) -> Word {
        let mut out = [0u8; 32];
        out[12..].copy_from_slice(&self.0);
        Word(out)
    }

    /// Take the low 20 bytes of a word.
    pub fn from_word(word: &Word) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&word.0[12..]);
        Self(out)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = HexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A 256-bit big-endian word.
///
/// Ordering is numeric because the bytes are big-endian.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(into = "String", try_from = "String")]
pub struct Word(pub [u8; 32]);

impl Word {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_u128(value: u128) -> Self {
        let mut out = [0u8; 32];
        out[16..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_u128(u128::from(value))
    }

    /// Narrow to `u128`, or `None` when the upper 128 bits are set.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn wrapping_add(&self, other: &Word) -> Word {
        let mut out = [0u8; 32];
        let mut carry = 0u16;
        for i in (0..32).rev() {
            let sum = u16::from(self.0[i]) + u16::from(other.0[i]) + carry;
            out[i] = (sum & 0xff) as u8;
            carry = sum >> 8;
        }
        Word(out)
    }

    pub fn wrapping_sub(&self, other: &Word) -> Word {
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = i16::from(self.0[i]) - i16::from(other.0[i]) - borrow;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = diff as u8;
        }
        Word(out)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u128() {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

impl From<u128> for Word {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

impl From<Address> for Word {
    fn from(address: Address) -> Self {
        address.to_word()
    }
}

impl From<Word> for String {
    fn from(word: Word) -> Self {
        format!("0x{}", hex::encode(word.0))
    }
}

impl TryFrom<String> for Word {
    type Error = HexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_fixed::<32>(&value).map(Self)
    }
}

/// Storage slot identifier inside a contract.
pub type StorageSlot = Word;

/// Serde bridge for [`Wei`] fields in settings.
///
/// Layered config sources only carry 64-bit integers, so amounts are read
/// from an integer, a decimal string or a `0x` hex string, and written as a
/// plain integer when they fit in `u64`, else as a decimal string.
pub mod wei_amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::Wei;

    /// Largest integer an `f64` holds exactly.
    const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

    pub fn serialize<S: Serializer>(value: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(*value) {
            Ok(small) => serializer.serialize_u64(small),
            Err(_) => serializer.collect_str(value),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Wei, D::Error> {
        deserializer.deserialize_any(WeiVisitor)
    }

    /// Parse a decimal or `0x`-prefixed hex amount.
    pub fn parse(s: &str) -> Option<Wei> {
        let s = s.trim().replace('_', "");
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => Wei::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        }
    }

    struct WeiVisitor;

    impl Visitor<'_> for WeiVisitor {
        type Value = Wei;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative amount in wei, as an integer or a decimal or 0x hex string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Wei, E> {
            Ok(v.into())
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Wei, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Wei, E> {
            u64::try_from(v)
                .map(Wei::from)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Wei, E> {
            if v >= 0.0 && v.fract() == 0.0 && v <= MAX_EXACT_F64 {
                Ok(v as Wei)
            } else {
                Err(E::invalid_value(de::Unexpected::Float(v), &self))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Wei, E> {
            parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}

/// A 32-byte transaction hash.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(into = "String", try_from = "String")]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for TxHash {
    type Error = HexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A transaction as submitted by an unlocked node account.
///
/// `to == None` deploys `data` as init code. Empty `data` with a recipient
/// is a plain value transfer (which runs a contract's fallback).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub value: Wei,
    pub data: Vec<u8>,
    pub gas: u64,
}

impl TransactionRequest {
    pub fn create(from: Address, init_code: Vec<u8>, gas: u64) -> Self {
        Self { from, to: None, value: 0, data: init_code, gas }
    }

    pub fn invoke(from: Address, to: Address, data: Vec<u8>, value: Wei, gas: u64) -> Self {
        Self { from, to: Some(to), value, data, gas }
    }

    pub fn transfer(from: Address, to: Address, value: Wei, gas: u64) -> Self {
        Self { from, to: Some(to), value, data: Vec::new(), gas }
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

/// Result of a mined transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub status: TxStatus,
    pub block_number: u64,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// Environment of the transaction currently executing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TxContext {
    /// Externally owned account that signed the transaction.
    pub origin: Address,
    pub block_number: u64,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
}

/// How control was transferred into a callee.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Call,
    StaticCall,
    CallCode,
    DelegateCall,
}

impl CallKind {
    /// Whether the callee runs with its own storage context.
    pub fn switches_context(&self) -> bool {
        matches!(self, Self::Call | Self::StaticCall)
    }
}
