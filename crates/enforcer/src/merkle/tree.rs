use enforcer_interface::NodePair;
use primitive_types::H256;

use crate::{
    errors::TreeError,
    hash::{hash_pair, ZERO},
};

/// Node of a [`MerkleTree`]. `hash == keccak256(left ‖ right)` except for [`Node::ZERO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    /// Commitment of this node.
    pub hash: H256,
    /// Hash of the left child, or the pre-state hash for a leaf.
    pub left: H256,
    /// Hash of the right child, or the post-state hash for a leaf.
    pub right: H256,
    /// Set for nodes bracketing one execution step.
    pub is_leaf: bool,
}

impl Node {
    /// Canonical padding node; every field is zero.
    pub const ZERO: Self = Self {
        hash: ZERO,
        left: ZERO,
        right: ZERO,
        is_leaf: false,
    };

    /// Leaf bracketing one step.
    pub fn leaf(left: H256, right: H256) -> Self {
        Self {
            hash: hash_pair(&left, &right),
            left,
            right,
            is_leaf: true,
        }
    }

    fn parent(left: &Self, right: &Self) -> Self {
        Self {
            hash: hash_pair(&left.hash, &right.hash),
            left: left.hash,
            right: right.hash,
            is_leaf: false,
        }
    }

    /// Children as revealed during bisection.
    pub fn pair(&self) -> NodePair {
        NodePair {
            left: self.left,
            right: self.right,
        }
    }

    /// Checks whether this is the padding node.
    pub fn is_zero(&self) -> bool {
        self.hash.is_zero()
    }
}

/// Binary hash tree stored as an arena of levels; level 0 holds the leaves.
///
/// Odd levels are padded on the right with [`Node::ZERO`]. The only way to change the tree
/// is to edit a level and call [`Self::recal()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Node>>,
    min_depth: usize,
}

impl MerkleTree {
    /// Builds a tree over `leaves`. Even a single leaf gets a parent, so the depth is at least 2.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyTrace`] if there are no leaves.
    pub fn new(leaves: Vec<Node>) -> Result<Self, TreeError> {
        if leaves.is_empty() {
            return Err(TreeError::EmptyTrace);
        }
        let mut tree = Self {
            levels: vec![leaves],
            min_depth: 2,
        };
        tree.recal(0);
        Ok(tree)
    }

    /// Number of levels, leaves included.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Topmost node.
    pub fn root(&self) -> Node {
        self.node(self.depth() - 1, 0)
    }

    /// Leaves, left to right.
    pub fn leaves(&self) -> &[Node] {
        &self.levels[0]
    }

    /// Node at `(level, index)`; positions outside of the tree hold [`Node::ZERO`].
    pub fn node(&self, level: usize, index: usize) -> Node {
        self.levels
            .get(level)
            .and_then(|nodes| nodes.get(index))
            .copied()
            .unwrap_or(Node::ZERO)
    }

    /// Position of the node with the given hash, searching from the root downwards.
    pub fn position(&self, hash: &H256) -> Option<(usize, usize)> {
        self.levels.iter().enumerate().rev().find_map(|(level, nodes)| {
            nodes
                .iter()
                .position(|node| node.hash == *hash)
                .map(|index| (level, index))
        })
    }

    /// Node with the given hash, searching from the root downwards.
    pub fn get_node(&self, hash: &H256) -> Option<Node> {
        let (level, index) = self.position(hash)?;
        Some(self.node(level, index))
    }

    /// Node whose children are `left` and `right`, searching from the root downwards.
    ///
    /// The bisection engine does not need this lookup: both trees are padded to the same depth
    /// before the game starts, so every path it has to open is found by [`Self::position()`].
    /// It is kept for inspecting trees against an opponent's revealed pairs.
    pub fn get_pair(&self, left: &H256, right: &H256) -> Option<Node> {
        self.levels
            .iter()
            .rev()
            .flatten()
            .find(|node| node.left == *left && node.right == *right)
            .copied()
    }

    /// Discards every level above `base_level` and rebuilds them.
    pub fn recal(&mut self, base_level: usize) {
        self.levels.truncate(base_level + 1);
        loop {
            let top = &self.levels[self.levels.len() - 1];
            if top.len() == 1 && self.levels.len() >= self.min_depth {
                break;
            }
            let parents = top
                .chunks(2)
                .map(|pair| Node::parent(&pair[0], pair.get(1).unwrap_or(&Node::ZERO)))
                .collect();
            self.levels.push(parents);
        }
    }

    /// Raises the tree to `depth` levels by pairing the root with [`Node::ZERO`] once per
    /// missing level. The padding survives later calls to [`Self::recal()`].
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DepthTooSmall`] if the tree is already deeper than `depth`.
    pub fn pad_to_depth(&mut self, depth: usize) -> Result<(), TreeError> {
        if depth < self.depth() {
            return Err(TreeError::DepthTooSmall {
                current: self.depth(),
                requested: depth,
            });
        }
        self.min_depth = depth;
        self.recal(self.depth() - 1);
        Ok(())
    }

    /// Overwrites leaf `target` with leaf `source` and rebuilds the tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownLeaf`] if either index is out of range.
    pub fn replace_leaf(&mut self, target: usize, source: usize) -> Result<(), TreeError> {
        let leaves = &mut self.levels[0];
        let node = *leaves.get(source).ok_or(TreeError::UnknownLeaf(source))?;
        *leaves.get_mut(target).ok_or(TreeError::UnknownLeaf(target))? = node;
        self.recal(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(count: u8) -> Vec<Node> {
        (0..count)
            .map(|i| Node::leaf(H256::repeat_byte(i), H256::repeat_byte(i + 1)))
            .collect()
    }

    #[test]
    fn single_leaf_gets_a_parent() {
        let tree = MerkleTree::new(leaves(1)).unwrap();
        assert_eq!(tree.depth(), 2);
        let leaf = tree.leaves()[0];
        assert_eq!(tree.root().hash, hash_pair(&leaf.hash, &ZERO));
        assert_eq!(tree.root().right, ZERO);
    }

    #[test]
    fn odd_levels_are_zero_padded() {
        let tree = MerkleTree::new(leaves(3)).unwrap();
        assert_eq!(tree.depth(), 3);
        let right = tree.node(1, 1);
        assert_eq!(right.left, tree.leaves()[2].hash);
        assert_eq!(right.right, ZERO);
        assert_eq!(tree.node(0, 3), Node::ZERO);
        assert_eq!(tree.node(7, 0), Node::ZERO);
    }

    #[test]
    fn lookups() {
        let tree = MerkleTree::new(leaves(5)).unwrap();
        let node = tree.node(1, 1);
        assert_eq!(tree.position(&node.hash), Some((1, 1)));
        assert_eq!(tree.get_node(&node.hash), Some(node));
        assert_eq!(tree.get_pair(&node.left, &node.right), Some(node));
        assert_eq!(tree.get_node(&H256::repeat_byte(0xee)), None);
    }

    #[test]
    fn replacing_a_leaf_changes_the_root() {
        let mut tree = MerkleTree::new(leaves(4)).unwrap();
        let root = tree.root();
        tree.replace_leaf(3, 0).unwrap();
        assert_ne!(tree.root(), root);
        assert_eq!(tree.leaves()[3], tree.leaves()[0]);
        assert_eq!(tree.replace_leaf(4, 0), Err(TreeError::UnknownLeaf(4)));
    }

    #[test]
    fn padding_pairs_root_with_zero() {
        let mut tree = MerkleTree::new(leaves(2)).unwrap();
        let root = tree.root().hash;
        tree.pad_to_depth(4).unwrap();
        assert_eq!(tree.depth(), 4);
        let once = hash_pair(&root, &ZERO);
        assert_eq!(tree.root().hash, hash_pair(&once, &ZERO));

        tree.recal(0);
        assert_eq!(tree.depth(), 4);
        assert!(matches!(
            tree.pad_to_depth(3),
            Err(TreeError::DepthTooSmall { current: 4, requested: 3 })
        ));
    }
}
