use std::collections::BTreeMap;

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

/// Token standard a [`TokenRecord`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenType {
    /// Fungible token; `value` is a balance.
    Erc20 = 0,
    /// Non-fungible token; `value` is the token id.
    Erc721 = 1,
    /// Non-fungible token with 32 bytes of writable data; `value` is the token id.
    Erc1948 = 2,
}

/// One entry of the custom-environment ledger snapshot.
///
/// Records are keyed by `(address, owner)` for fungible tokens and by `(address, value)`
/// (i.e. the token id) for non-fungible ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Address of the token contract the interpreter intercepts calls to.
    pub address: H160,
    /// Current owner (balance holder for fungible tokens).
    pub owner: H160,
    /// Balance or token id, depending on [`Self::token_type`].
    pub value: U256,
    /// Arbitrary data attached to an ERC1948 token.
    #[serde(default)]
    pub data: H256,
    /// Token standard.
    pub token_type: TokenType,
    /// Approved operator of a non-fungible token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<H160>,
    /// Allowances granted by the owner of a fungible balance.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allowances: BTreeMap<H160, U256>,
}

impl TokenRecord {
    /// Creates a fungible balance record.
    pub fn erc20(address: H160, owner: H160, balance: U256) -> Self {
        Self {
            address,
            owner,
            value: balance,
            data: H256::zero(),
            token_type: TokenType::Erc20,
            approved: None,
            allowances: BTreeMap::new(),
        }
    }

    /// Creates a non-fungible token record.
    pub fn erc721(address: H160, owner: H160, token_id: U256) -> Self {
        Self {
            token_type: TokenType::Erc721,
            ..Self::erc20(address, owner, token_id)
        }
    }

    /// Creates a non-fungible token record carrying 32 bytes of data.
    pub fn erc1948(address: H160, owner: H160, token_id: U256, data: H256) -> Self {
        Self {
            data,
            token_type: TokenType::Erc1948,
            ..Self::erc20(address, owner, token_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialization() {
        let record = TokenRecord::erc1948(
            H160::repeat_byte(0x11),
            H160::repeat_byte(0x22),
            U256::from(7),
            H256::repeat_byte(0x33),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["tokenType"], "Erc1948");
        assert!(json.get("approved").is_none());

        let parsed: TokenRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
