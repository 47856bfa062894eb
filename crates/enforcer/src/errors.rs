//! Structural errors of the trees, the one-step verifier and the dispute state machine.
//!
//! Interpreter faults are not errors: they are recorded as [`ErrNo`](enforcer_interface::ErrNo)
//! in the execution step.

use enforcer_interface::VerifierError;
use primitive_types::H256;
use thiserror::Error;

/// Errors raised by the Merkle trees.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TreeError {
    /// A trace tree needs at least one step.
    #[error("cannot build a tree over an empty trace")]
    EmptyTrace,
    /// `pad_to_depth` cannot make a tree shallower.
    #[error("tree has depth {current}, cannot pad it to {requested}")]
    DepthTooSmall {
        /// Current depth.
        current: usize,
        /// Requested depth.
        requested: usize,
    },
    /// No node with this hash.
    #[error("no node with hash {0:?}")]
    UnknownNode(H256),
    /// No leaf or code slot at this index.
    #[error("no leaf at index {0}")]
    UnknownLeaf(usize),
}

/// Errors raised while building or checking a one-step proof.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ProofError {
    /// A code fragment does not authenticate against the registered code root.
    #[error("code fragment at slot {slot} does not match the code root")]
    CodeHashMismatch {
        /// Offending slot.
        slot: u32,
    },
    /// The instruction needs a component that was only committed by hash.
    #[error("instruction requires the full {0}")]
    MissingWitness(&'static str),
    /// A size claimed by the proof exceeds what the machine can hold.
    #[error("{component} of {size} exceeds the limit of {limit}")]
    WitnessOutOfRange {
        /// Component whose size is out of range.
        component: &'static str,
        /// Claimed size.
        size: u64,
        /// Largest admissible size.
        limit: u64,
    },
    /// The compact stack does not have the length the instruction needs.
    #[error("compact stack has {actual} elements, expected {expected}")]
    CompactStackMismatch {
        /// Required number of elements.
        expected: usize,
        /// Supplied number of elements.
        actual: usize,
    },
    /// The leaf index does not correspond to an execution step.
    #[error("leaf {0} is not an execution step")]
    NotALeaf(usize),
    /// The recomputed pre-state differs from the leaf being proven.
    #[error("pre-state {computed:?} does not match the leaf {expected:?}")]
    PreStateMismatch {
        /// Hash the leaf commits to.
        expected: H256,
        /// Hash recomputed from the proof.
        computed: H256,
    },
}

/// Errors raised by the dispute state machine.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DisputeError {
    /// The revealed pair does not hash to the party's current node.
    #[error("revealed pair does not hash to the current path {path:?}")]
    InvalidPath {
        /// Node the pair should open.
        path: H256,
    },
    /// The party already revealed in this round.
    #[error("already responded in this round")]
    AlreadyResponded,
    /// The sender is neither solver nor challenger.
    #[error("sender is not a party to the dispute")]
    NotAParty,
    /// The operation does not fit the current stage.
    #[error("operation not allowed in the current stage")]
    WrongPhase,
    /// The local trace tree is deeper than the depth agreed for the dispute.
    #[error("local tree has depth {local}, dispute uses {agreed}")]
    DepthMismatch {
        /// Depth of the local tree.
        local: usize,
        /// Depth recorded by the verifier.
        agreed: usize,
    },
    /// The party's leaf is padding, so there is no step to prove.
    #[error("no execution step to prove at this leaf")]
    NoLeafToProve,
    /// The party that claims the timeout is itself overdue.
    #[error("timeout cannot be claimed now")]
    TimeoutNotApplicable,
}

/// Errors raised while the dispute engine acts on a notification. None of them is fatal; the
/// engine logs them and retries on the next notification.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EngineError {
    /// The verifier refused or did not receive a submission.
    #[error(transparent)]
    Verifier(#[from] VerifierError),
    /// The local dispute state is inconsistent with the verifier's.
    #[error(transparent)]
    Dispute(#[from] DisputeError),
    /// No proof could be built for the disputed leaf.
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// The local trace could not be committed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}
