//! Keccak-based commitments shared by the interpreter, the trees and the verifier.

use primitive_types::{H256, U256};
use sha3::{Digest, Keccak256};

/// Canonical zero node / "not provided" sentinel.
pub const ZERO: H256 = H256::zero();

/// `keccak256(bytes)`.
pub fn keccak256(bytes: &[u8]) -> H256 {
    H256(Keccak256::digest(bytes).into())
}

/// `keccak256(left ‖ right)`.
pub fn hash_pair(left: &H256, right: &H256) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    H256(hasher.finalize().into())
}

pub(crate) fn u256_to_h256(value: U256) -> H256 {
    let mut buffer = [0; 32];
    value.to_big_endian(&mut buffer);
    H256(buffer)
}

pub(crate) fn h256_to_u256(value: &H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Folds stack elements (bottom first) onto `sibling`: `res = keccak256(res ‖ element)`.
///
/// Folding is associative over concatenation, so the hash of a full stack equals the hash of
/// its top part folded onto the hash of the bottom part.
pub fn stack_hash(stack: &[U256], sibling: H256) -> H256 {
    stack
        .iter()
        .fold(sibling, |acc, element| hash_pair(&acc, &u256_to_h256(*element)))
}

/// Hash of a word-aligned memory image.
pub fn mem_hash(bytes: &[u8]) -> H256 {
    keccak256(bytes)
}

/// Hash of call data or return data.
pub fn data_hash(data: &[u8]) -> H256 {
    keccak256(data)
}

/// Components bound by a state hash. Every field is packed as a 32-byte word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCommitment {
    /// Hash of the full stack.
    pub stack_hash: H256,
    /// Hash of the memory image.
    pub mem_hash: H256,
    /// Hash of the call data.
    pub data_hash: H256,
    /// Hash of the current return data.
    pub return_data_hash: H256,
    /// Running log hash.
    pub log_hash: H256,
    /// Hash of the custom-environment ledger.
    pub custom_environment_hash: H256,
    /// Program counter.
    pub pc: u64,
    /// Remaining gas.
    pub gas_remaining: u64,
    /// Number of stack elements.
    pub stack_size: u64,
    /// Memory size in words.
    pub mem_size: u64,
}

impl StateCommitment {
    /// `keccak256` over all the components, in declaration order.
    pub fn hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        for component in [
            &self.stack_hash,
            &self.mem_hash,
            &self.data_hash,
            &self.return_data_hash,
            &self.log_hash,
            &self.custom_environment_hash,
        ] {
            hasher.update(component.as_bytes());
        }
        for scalar in [self.pc, self.gas_remaining, self.stack_size, self.mem_size] {
            hasher.update(u256_to_h256(scalar.into()).as_bytes());
        }
        H256(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keccak() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn stack_hash_splits_at_any_point() {
        let stack: Vec<_> = (1_u64..=6).map(U256::from).collect();
        let full = stack_hash(&stack, ZERO);
        for split in 0..=stack.len() {
            let (bottom, top) = stack.split_at(split);
            assert_eq!(stack_hash(top, stack_hash(bottom, ZERO)), full);
        }
        assert_eq!(stack_hash(&[], ZERO), ZERO);
    }

    #[test]
    fn commitment_binds_scalars() {
        let commitment = StateCommitment {
            stack_hash: ZERO,
            mem_hash: ZERO,
            data_hash: ZERO,
            return_data_hash: ZERO,
            log_hash: ZERO,
            custom_environment_hash: ZERO,
            pc: 0,
            gas_remaining: 100,
            stack_size: 0,
            mem_size: 0,
        };
        let moved = StateCommitment { pc: 1, ..commitment };
        let resized = StateCommitment {
            mem_size: 1,
            ..commitment
        };
        assert_ne!(commitment.hash(), moved.hash());
        assert_ne!(commitment.hash(), resized.hash());
    }
}
