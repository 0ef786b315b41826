//! Keccak-256 based derivations: selectors, contract addresses, mapping slots.

use sha3::{Digest, Keccak256};

use crate::types::{Address, Word};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of the hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// RLP encoding of an unsigned integer as a byte string.
fn rlp_uint(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0x80];
    }
    if value < 0x80 {
        return vec![value as u8];
    }
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    let mut out = vec![0x80 + (8 - first) as u8];
    out.extend_from_slice(&bytes[first..]);
    out
}

/// Address of a contract created by `sender` at account nonce `nonce`:
/// the low 20 bytes of `keccak(rlp([sender, nonce]))`.
pub fn contract_address(sender: &Address, nonce: u64) -> Address {
    let nonce_rlp = rlp_uint(nonce);
    let payload_len = 21 + nonce_rlp.len();
    let mut encoded = Vec::with_capacity(1 + payload_len);
    encoded.push(0xc0 + payload_len as u8);
    encoded.push(0x80 + 20);
    encoded.extend_from_slice(sender.as_bytes());
    encoded.extend_from_slice(&nonce_rlp);
    let hash = keccak256(&encoded);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

/// Storage slot of `mapping[key]` for a mapping declared at `slot`.
pub fn mapping_slot(key: &Word, slot: u64) -> Word {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&key.0);
    preimage[32..].copy_from_slice(&Word::from_u64(slot).0);
    Word(keccak256(&preimage))
}
