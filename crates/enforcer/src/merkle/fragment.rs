use enforcer_interface::CodeFragment;
use primitive_types::{H256, U256};
use sha3::{Digest, Keccak256};

use crate::{
    errors::TreeError,
    hash::{hash_pair, u256_to_h256, ZERO},
    Program,
};

/// Merkle tree over the 32-byte words of a program, used to authenticate code read by a
/// one-step proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentTree {
    byte_length: usize,
    words: Vec<H256>,
    /// `levels[0]` holds the leaf hashes; the last level holds the root.
    levels: Vec<Vec<H256>>,
}

impl FragmentTree {
    /// Splits `code` into zero-padded words and folds them into a tree.
    pub fn new(code: &[u8]) -> Self {
        let words: Vec<_> = code
            .chunks(32)
            .map(|chunk| {
                let mut word = H256::zero();
                word.0[..chunk.len()].copy_from_slice(chunk);
                word
            })
            .collect();
        let leaves: Vec<_> = words
            .iter()
            .enumerate()
            .map(|(slot, word)| Self::leaf_hash(word, slot, code.len()))
            .collect();

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let parents = levels[levels.len() - 1]
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&ZERO)))
                .collect();
            levels.push(parents);
        }
        Self {
            byte_length: code.len(),
            words,
            levels,
        }
    }

    /// Tree over the code of `program`.
    pub fn from_program(program: &Program) -> Self {
        Self::new(program.code())
    }

    /// `keccak256(value ‖ slot ‖ byteLength)`, with `slot` and `byteLength` as 32-byte words.
    pub fn leaf_hash(value: &H256, slot: usize, byte_length: usize) -> H256 {
        let mut hasher = Keccak256::new();
        hasher.update(value.as_bytes());
        hasher.update(u256_to_h256(U256::from(slot)).as_bytes());
        hasher.update(u256_to_h256(U256::from(byte_length)).as_bytes());
        H256(hasher.finalize().into())
    }

    /// Root of the tree; [`ZERO`] for empty code.
    pub fn root(&self) -> H256 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(ZERO)
    }

    /// Length of the code in bytes.
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Word `slot` together with its authentication path.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownLeaf`] if `slot` is past the end of the code.
    pub fn calculate_proof(&self, slot: usize) -> Result<CodeFragment, TreeError> {
        let value = *self.words.get(slot).ok_or(TreeError::UnknownLeaf(slot))?;
        let slot_index = u32::try_from(slot).map_err(|_| TreeError::UnknownLeaf(slot))?;
        let mut index = slot;
        let mut proof = Vec::with_capacity(self.levels.len() - 1);
        for level in &self.levels[..self.levels.len() - 1] {
            proof.push(level.get(index ^ 1).copied().unwrap_or(ZERO));
            index >>= 1;
        }
        Ok(CodeFragment {
            slot: slot_index,
            value,
            proof,
        })
    }

    /// Checks `fragment` against the root of a tree over `byte_length` bytes of code.
    pub fn verify_proof(fragment: &CodeFragment, byte_length: usize, root: H256) -> bool {
        let mut index = fragment.slot;
        let mut hash = Self::leaf_hash(&fragment.value, index as usize, byte_length);
        for sibling in &fragment.proof {
            hash = if index % 2 == 0 {
                hash_pair(&hash, sibling)
            } else {
                hash_pair(sibling, &hash)
            };
            index >>= 1;
        }
        hash == root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_single_word_code() {
        assert_eq!(FragmentTree::new(&[]).root(), ZERO);
        assert!(FragmentTree::new(&[]).calculate_proof(0).is_err());

        let tree = FragmentTree::new(&[0x60, 0x01]);
        let mut word = H256::zero();
        word.0[..2].copy_from_slice(&[0x60, 0x01]);
        assert_eq!(tree.root(), FragmentTree::leaf_hash(&word, 0, 2));
        let fragment = tree.calculate_proof(0).unwrap();
        assert!(fragment.proof.is_empty());
        assert!(FragmentTree::verify_proof(&fragment, 2, tree.root()));
    }

    #[test]
    fn tampered_fragments_are_rejected() {
        let code: Vec<u8> = (0..=200).collect();
        let tree = FragmentTree::new(&code);
        let fragment = tree.calculate_proof(5).unwrap();
        assert_eq!(fragment.proof.len(), 3);
        assert!(FragmentTree::verify_proof(&fragment, code.len(), tree.root()));

        let mut wrong_value = fragment.clone();
        wrong_value.value.0[0] ^= 1;
        assert!(!FragmentTree::verify_proof(&wrong_value, code.len(), tree.root()));
        let mut wrong_slot = fragment.clone();
        wrong_slot.slot = 4;
        assert!(!FragmentTree::verify_proof(&wrong_slot, code.len(), tree.root()));
        assert!(!FragmentTree::verify_proof(&fragment, code.len() + 1, tree.root()));
    }
}
