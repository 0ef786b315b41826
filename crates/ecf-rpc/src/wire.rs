//! JSON shapes of the `eth_*` methods.
//!
//! Quantities are `0x`-prefixed hex without leading zeros, byte strings are
//! `0x`-prefixed hex.

use serde::{Deserialize, Serialize};

use ecf_core::error::ClientError;
use ecf_core::types::{Address, Receipt, TransactionRequest, TxHash, TxStatus, Wei};

/// Block tag passed to state queries.
pub const LATEST: &str = "latest";

pub fn encode_quantity(value: u128) -> String {
    format!("{value:#x}")
}

pub fn decode_quantity(s: &str) -> Result<u128, ClientError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ClientError::InvalidResponse(format!("quantity without 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(ClientError::InvalidResponse("empty quantity".into()));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ClientError::InvalidResponse(format!("bad quantity {s}: {e}")))
}

pub fn decode_u64(s: &str) -> Result<u64, ClientError> {
    let value = decode_quantity(s)?;
    u64::try_from(value).map_err(|_| ClientError::InvalidResponse(format!("quantity {s} exceeds u64")))
}

pub fn encode_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn decode_data(s: &str) -> Result<Vec<u8>, ClientError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ClientError::InvalidResponse(format!("bad data: {e}")))
}

/// Transaction object of `eth_sendTransaction` and `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, alias = "input")]
    pub data: String,
}

/// A zero gas limit leaves `gas` out, so the node applies its own cap.
impl From<&TransactionRequest> for RpcTransaction {
    fn from(tx: &TransactionRequest) -> Self {
        Self {
            from: tx.from,
            to: tx.to,
            gas: (tx.gas > 0).then(|| encode_quantity(u128::from(tx.gas))),
            value: Some(encode_quantity(tx.value)),
            data: encode_data(&tx.data),
        }
    }
}

impl RpcTransaction {
    /// Convert, filling a missing gas limit with `default_gas`.
    pub fn into_request(self, default_gas: u64) -> Result<TransactionRequest, ClientError> {
        let gas = match self.gas.as_deref() {
            Some(g) => decode_u64(g)?,
            None => default_gas,
        };
        let value: Wei = match self.value.as_deref() {
            Some(v) => decode_quantity(v)?,
            None => 0,
        };
        Ok(TransactionRequest {
            from: self.from,
            to: self.to,
            value,
            data: decode_data(&self.data)?,
            gas,
        })
    }
}

/// Result of `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: TxHash,
    pub block_number: String,
    pub gas_used: String,
    /// `0x1` on success, `0x0` on failure. Absent on pre-Byzantium nodes.
    #[serde(default)]
    pub status: Option<String>,
    pub contract_address: Option<Address>,
}

impl From<&Receipt> for RpcReceipt {
    fn from(r: &Receipt) -> Self {
        let status = match r.status {
            TxStatus::Success => "0x1",
            TxStatus::Failed => "0x0",
        };
        Self {
            transaction_hash: r.tx_hash,
            block_number: encode_quantity(u128::from(r.block_number)),
            gas_used: encode_quantity(u128::from(r.gas_used)),
            status: Some(status.to_string()),
            contract_address: r.contract_address,
        }
    }
}

impl TryFrom<RpcReceipt> for Receipt {
    type Error = ClientError;

    fn try_from(r: RpcReceipt) -> Result<Self, Self::Error> {
        let status = match r.status.as_deref() {
            Some(s) if decode_quantity(s)? == 0 => TxStatus::Failed,
            _ => TxStatus::Success,
        };
        Ok(Receipt {
            tx_hash: r.transaction_hash,
            status,
            block_number: decode_u64(&r.block_number)?,
            gas_used: decode_u64(&r.gas_used)?,
            contract_address: r.contract_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_has_no_leading_zeros() {
        assert_eq!(encode_quantity(0), "0x0");
        assert_eq!(encode_quantity(1000), "0x3e8");
        assert_eq!(decode_quantity("0x3e8").unwrap(), 1000);
    }

    #[test]
    fn quantity_requires_prefix() {
        assert!(decode_quantity("3e8").is_err());
        assert!(decode_quantity("0x").is_err());
        assert!(decode_quantity("0xzz").is_err());
    }

    #[test]
    fn u64_quantity_overflow() {
        let too_big = encode_quantity(u128::from(u64::MAX) + 1);
        assert!(matches!(decode_u64(&too_big), Err(ClientError::InvalidResponse(_))));
    }

    #[test]
    fn data_accepts_missing_prefix() {
        assert_eq!(decode_data("0x00362a95").unwrap(), vec![0x00, 0x36, 0x2a, 0x95]);
        assert_eq!(decode_data("ff").unwrap(), vec![0xff]);
        assert_eq!(encode_data(&[]), "0x");
    }

    #[test]
    fn deployment_omits_recipient() {
        let tx = TransactionRequest::create(Address([1; 20]), vec![0x60, 0x60], 4_700_000);
        let json = serde_json::to_value(RpcTransaction::from(&tx)).unwrap();
        assert!(json.get("to").is_none());
        assert_eq!(json["gas"], "0x47b760");
        assert_eq!(json["data"], "0x6060");
    }

    #[test]
    fn zero_gas_call_omits_gas() {
        let (from, dao) = (Address([1; 20]), Address([3; 20]));
        let query = ecf_core::abi::encode_call(
            ecf_core::constants::selectors::CREDIT,
            &[ecf_core::abi::Token::Address(from)],
        );
        let json = serde_json::to_value(RpcTransaction::from(&TransactionRequest::invoke(from, dao, query, 0, 0))).unwrap();
        assert!(json.get("gas").is_none(), "{json}");
        assert_eq!(json["value"], "0x0");

        let back: RpcTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.into_request(0).unwrap().gas, 0);
    }

    #[test]
    fn transaction_accepts_input_alias() {
        let json = format!(r#"{{"from":"0x{}","input":"0x01","value":"0x1"}}"#, "02".repeat(20));
        let rpc: RpcTransaction = serde_json::from_str(&json).unwrap();
        let tx = rpc.into_request(90_000).unwrap();
        assert_eq!(tx.data, vec![1]);
        assert_eq!(tx.value, 1);
        assert_eq!(tx.gas, 90_000);
    }

    #[test]
    fn receipt_status_decoding() {
        let receipt = Receipt {
            tx_hash: TxHash([3; 32]),
            status: TxStatus::Failed,
            block_number: 12,
            gas_used: 21_000,
            contract_address: None,
        };
        let wire = RpcReceipt::from(&receipt);
        assert_eq!(wire.status.as_deref(), Some("0x0"));
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("\"transactionHash\""));
        let back: RpcReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(Receipt::try_from(back).unwrap(), receipt);
    }

    #[test]
    fn receipt_without_status_is_success() {
        let wire = RpcReceipt {
            transaction_hash: TxHash([4; 32]),
            block_number: "0x5".into(),
            gas_used: "0x5208".into(),
            status: None,
            contract_address: Some(Address([9; 20])),
        };
        let receipt = Receipt::try_from(wire).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.gas_used, 21_000);
    }

    proptest::proptest! {
        #[test]
        fn quantity_decoding_inverts_encoding(v: u128) {
            proptest::prop_assert_eq!(decode_quantity(&encode_quantity(v)).unwrap(), v);
        }
    }
}
