use enforcer_interface::ResultClaim;
use primitive_types::H256;

use super::{MerkleTree, Node};
use crate::{
    errors::TreeError,
    state::{CallData, ExecutionState},
    step::ExecutionStep,
    VirtualMachine, World,
};

/// Commits to an execution trace.
///
/// Leaf `i` pairs the state hash before step `i` with the state hash after it, so adjacent
/// leaves share a hash and a dispute over one leaf is a dispute over exactly one instruction.
#[derive(Debug, Clone)]
pub struct Merkelizer<W = ()> {
    initial: ExecutionState<W>,
    call_data: CallData,
    steps: Vec<ExecutionStep<W>>,
    /// `state_hashes[0]` is the initial state; `state_hashes[i + 1]` follows step `i`.
    state_hashes: Vec<H256>,
    tree: MerkleTree,
}

impl<W: World> Merkelizer<W> {
    /// Runs `vm` until it halts and commits to the resulting trace.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyTrace`] if the machine had already halted.
    pub fn run(mut vm: VirtualMachine<W>) -> Result<Self, TreeError> {
        let initial = vm.state().clone();
        let call_data = vm.call_data().clone();
        let steps = vm.run(0);
        Self::from_steps(initial, call_data, steps)
    }

    /// Commits to `steps` executed from `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyTrace`] if `steps` is empty.
    pub fn from_steps(
        initial: ExecutionState<W>,
        call_data: CallData,
        steps: Vec<ExecutionStep<W>>,
    ) -> Result<Self, TreeError> {
        let data_hash = call_data.hash();
        let state_hashes: Vec<_> = std::iter::once(initial.hash(data_hash))
            .chain(steps.iter().map(|step| step.state.hash(data_hash)))
            .collect();
        let leaves = state_hashes
            .windows(2)
            .map(|pair| Node::leaf(pair[0], pair[1]))
            .collect();
        let tree = MerkleTree::new(leaves)?;
        Ok(Self {
            initial,
            call_data,
            steps,
            state_hashes,
            tree,
        })
    }

    /// Trace tree.
    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Root of the trace tree.
    pub fn root(&self) -> H256 {
        self.tree.root().hash
    }

    /// Depth of the trace tree.
    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// Executed steps.
    pub fn steps(&self) -> &[ExecutionStep<W>] {
        &self.steps
    }

    /// Call data of the execution.
    pub fn call_data(&self) -> &CallData {
        &self.call_data
    }

    /// State before step `index`, if the step exists.
    pub fn state_before(&self, index: usize) -> Option<&ExecutionState<W>> {
        match index {
            0 => Some(&self.initial),
            _ if index <= self.steps.len() => Some(&self.steps[index - 1].state),
            _ => None,
        }
    }

    /// Hash of the state after the last step.
    pub fn final_state(&self) -> H256 {
        self.state_hashes[self.state_hashes.len() - 1]
    }

    /// Result claim to register with, or dispute at, a verifier.
    pub fn claim(&self) -> ResultClaim {
        ResultClaim {
            root: self.root(),
            depth: self.depth(),
            final_state: self.final_state(),
        }
    }

    /// Overwrites leaf `target` with leaf `source`, leaving the steps as they are.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownLeaf`] if either index is out of range.
    pub fn replace_leaf(&mut self, target: usize, source: usize) -> Result<(), TreeError> {
        self.tree.replace_leaf(target, source)
    }
}
