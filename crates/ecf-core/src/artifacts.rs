//! Compiled init code of the SimpleDAO and Mallory contracts.
//!
//! The two SimpleDAO builds differ only in `withdraw`: the vulnerable one
//! sends the amount before decrementing `credit[msg.sender]`, the patched one
//! decrements first. Mallory's constructor takes the DAO address.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HexError;

/// Which SimpleDAO build is deployed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DaoVariant {
    /// External call before the ledger update.
    #[default]
    Vulnerable,
    /// Ledger update before the external call.
    Patched,
}

impl fmt::Display for DaoVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vulnerable => write!(f, "vulnerable"),
            Self::Patched => write!(f, "patched"),
        }
    }
}

impl FromStr for DaoVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vulnerable" => Ok(Self::Vulnerable),
            "patched" => Ok(Self::Patched),
            other => Err(format!("unknown variant '{other}', expected 'vulnerable' or 'patched'")),
        }
    }
}

/// Behaviour a deployed artifact implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractKind {
    SimpleDao(DaoVariant),
    Mallory,
}

/// A compiled contract: name plus hex init code.
#[derive(Debug)]
pub struct ContractArtifact {
    pub name: &'static str,
    pub kind: ContractKind,
    bytecode_hex: &'static str,
}

impl ContractArtifact {
    /// Decoded init code.
    pub fn bytecode(&self) -> Result<Vec<u8>, HexError> {
        hex::decode(self.bytecode_hex.trim()).map_err(|e| HexError::InvalidHex(e.to_string()))
    }

    /// Length of the init code in bytes.
    pub fn len(&self) -> usize {
        self.bytecode_hex.trim().len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `init_code` starts with this artifact's code.
    pub fn matches(&self, init_code: &[u8]) -> bool {
        let n = self.len();
        init_code.len() >= n && hex::encode(&init_code[..n]) == self.bytecode_hex.trim()
    }
}

pub static SIMPLE_DAO_VULNERABLE: ContractArtifact = ContractArtifact {
    name: "SimpleDAO",
    kind: ContractKind::SimpleDao(DaoVariant::Vulnerable),
    bytecode_hex: include_str!("../contracts/simple_dao_vulnerable.hex"),
};

pub static SIMPLE_DAO_PATCHED: ContractArtifact = ContractArtifact {
    name: "SimpleDAO",
    kind: ContractKind::SimpleDao(DaoVariant::Patched),
    bytecode_hex: include_str!("../contracts/simple_dao_patched.hex"),
};

pub static MALLORY: ContractArtifact = ContractArtifact {
    name: "Mallory",
    kind: ContractKind::Mallory,
    bytecode_hex: include_str!("../contracts/mallory.hex"),
};

pub fn simple_dao(variant: DaoVariant) -> &'static ContractArtifact {
    match variant {
        DaoVariant::Vulnerable => &SIMPLE_DAO_VULNERABLE,
        DaoVariant::Patched => &SIMPLE_DAO_PATCHED,
    }
}

/// Find the artifact `init_code` was built from, returning it with the
/// trailing constructor arguments.
pub fn identify(init_code: &[u8]) -> Option<(&'static ContractArtifact, &[u8])> {
    [&SIMPLE_DAO_VULNERABLE, &SIMPLE_DAO_PATCHED, &MALLORY]
        .into_iter()
        .find(|a| a.matches(init_code))
        .map(|a| (a, &init_code[a.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Token, encode_constructor};
    use crate::constants::selectors;
    use crate::types::Address;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn artifacts_decode() {
        for artifact in [&SIMPLE_DAO_VULNERABLE, &SIMPLE_DAO_PATCHED, &MALLORY] {
            let code = artifact.bytecode().unwrap();
            assert_eq!(code.len(), artifact.len());
            assert_eq!(&code[..2], &[0x60, 0x60]);
        }
    }

    #[test]
    fn dao_builds_differ() {
        assert_ne!(
            SIMPLE_DAO_VULNERABLE.bytecode().unwrap(),
            SIMPLE_DAO_PATCHED.bytecode().unwrap()
        );
        assert_eq!(SIMPLE_DAO_VULNERABLE.len(), SIMPLE_DAO_PATCHED.len());
    }

    #[test]
    fn dao_dispatch_contains_selectors() {
        let code = SIMPLE_DAO_VULNERABLE.bytecode().unwrap();
        assert!(contains(&code, &selectors::WITHDRAW));
        assert!(contains(&code, &selectors::QUERY_CREDIT));
        assert!(contains(&code, &selectors::CREDIT));
        assert!(contains(&code, &selectors::DONATE[1..]));
    }

    #[test]
    fn mallory_dispatch_contains_selectors() {
        let code = MALLORY.bytecode().unwrap();
        assert!(contains(&code, &selectors::DAO));
        assert!(contains(&code, &selectors::GET_JACKPOT));
        assert!(contains(&code, &selectors::WITHDRAW));
    }

    #[test]
    fn identify_splits_constructor_args() {
        let dao = Address([7; 20]);
        let init = encode_constructor(&MALLORY.bytecode().unwrap(), &[Token::Address(dao)]);
        let (artifact, args) = identify(&init).unwrap();
        assert_eq!(artifact.kind, ContractKind::Mallory);
        assert_eq!(args.len(), 32);
    }

    #[test]
    fn identify_each_dao_variant() {
        for variant in [DaoVariant::Vulnerable, DaoVariant::Patched] {
            let init = simple_dao(variant).bytecode().unwrap();
            let (artifact, args) = identify(&init).unwrap();
            assert_eq!(artifact.kind, ContractKind::SimpleDao(variant));
            assert!(args.is_empty());
        }
    }

    #[test]
    fn identify_unknown_code() {
        assert!(identify(&[0x60, 0x80, 0x60, 0x40]).is_none());
    }

    #[test]
    fn variant_parsing() {
        assert_eq!("patched".parse::<DaoVariant>().unwrap(), DaoVariant::Patched);
        assert_eq!("Vulnerable".parse::<DaoVariant>().unwrap(), DaoVariant::Vulnerable);
        assert!("other".parse::<DaoVariant>().is_err());
        assert!("fixed".parse::<DaoVariant>().is_err());
    }
}
