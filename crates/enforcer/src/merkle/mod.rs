//! Merkle commitments over execution traces and over bytecode.

pub use self::{
    fragment::FragmentTree,
    merkelizer::Merkelizer,
    tree::{MerkleTree, Node},
};

mod fragment;
mod merkelizer;
mod tree;
