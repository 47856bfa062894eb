use std::{fmt, future::Future};

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TokenRecord;

/// Identifier of an execution request filed with the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "execution#{}", self.0)
    }
}

/// Identifier of a bisection dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisputeId(pub u64);

impl fmt::Display for DisputeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "dispute#{}", self.0)
    }
}

/// Side of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    /// The party that registered the execution result.
    Solver,
    /// The party disputing it.
    Challenger,
}

impl Party {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Solver => Self::Challenger,
            Self::Challenger => Self::Solver,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Solver => "solver",
            Self::Challenger => "challenger",
        })
    }
}

/// Sender identity and sequence number attached to every state-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Submission {
    /// Address of the submitting wallet.
    pub from: H160,
    /// Per-wallet sequence number; never reused.
    pub nonce: u64,
}

/// Children of a Merkle node, revealed during one bisection round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePair {
    /// Hash of the left child.
    pub left: H256,
    /// Hash of the right child.
    pub right: H256,
}

impl NodePair {
    /// Children of the canonical zero node.
    pub const ZERO: Self = Self {
        left: H256::zero(),
        right: H256::zero(),
    };

    /// Checks whether both children are zero.
    pub fn is_zero(&self) -> bool {
        self.left.is_zero() && self.right.is_zero()
    }
}

/// Block-level values returned by environment opcodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockContext {
    /// `COINBASE`.
    pub coinbase: H160,
    /// `TIMESTAMP`.
    pub timestamp: U256,
    /// `NUMBER`.
    pub number: U256,
    /// `DIFFICULTY`.
    pub difficulty: U256,
    /// `GASLIMIT`.
    pub gas_limit: U256,
}

/// Call-level values returned by environment opcodes. Fixed for the whole execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallContext {
    /// `ADDRESS`; also the sender seen by intercepted token calls.
    pub address: H160,
    /// `ORIGIN`.
    pub origin: H160,
    /// `CALLER`.
    pub caller: H160,
    /// `CALLVALUE`.
    pub call_value: U256,
    /// `GASPRICE`.
    pub gas_price: U256,
    /// Block values.
    pub block: BlockContext,
}

/// Everything needed to run a program from its initial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Program bytecode.
    #[serde(with = "hex_bytes")]
    pub code: Vec<u8>,
    /// Call data.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Gas available to the execution.
    pub gas_limit: u64,
    /// Values for environment opcodes.
    #[serde(default)]
    pub context: CallContext,
    /// Initial custom-environment ledger.
    #[serde(default)]
    pub custom_environment: Vec<TokenRecord>,
}

/// Result claimed for an execution: the trace commitment and its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultClaim {
    /// Root of the Merkle tree over the execution trace.
    pub root: H256,
    /// Number of tree levels, leaves included.
    pub depth: usize,
    /// State hash after the last executed step.
    pub final_state: H256,
}

/// A 32-byte word of bytecode together with its authentication path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFragment {
    /// Index of the word within the bytecode.
    pub slot: u32,
    /// Word contents; the last word is zero-padded on the right.
    pub value: H256,
    /// Siblings from the leaf up to the root of the fragment tree.
    pub proof: Vec<H256>,
}

/// Hash witnesses of the pre-state. A zero value means "recompute from [`ExecutionInput`]".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proofs {
    /// Hash of the stack elements below the compact stack.
    pub stack_hash: H256,
    /// Memory hash, or zero when the memory is supplied.
    pub mem_hash: H256,
    /// Call data hash, or zero when the call data is supplied.
    pub data_hash: H256,
    /// Ledger hash, or zero when the ledger snapshot is supplied.
    pub custom_environment_hash: H256,
}

/// Minimal pre-state needed to re-execute one instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInput {
    /// Program counter of the instruction.
    pub pc: u64,
    /// Gas before the instruction.
    pub gas_remaining: u64,
    /// Top of the stack consumed by the instruction, bottom first.
    pub stack: Vec<U256>,
    /// Full stack size, including the elements committed by [`Proofs::stack_hash`].
    pub stack_size: u64,
    /// Memory words; empty unless the instruction touches memory.
    pub mem: Vec<H256>,
    /// Memory size in words.
    pub mem_size: u64,
    /// Call data; empty unless the instruction reads it.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Return data of the previous call.
    #[serde(with = "hex_bytes")]
    pub return_data: Vec<u8>,
    /// Running hash of emitted logs.
    pub log_hash: H256,
    /// Ledger snapshot; present only for intercepted calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_environment: Option<Vec<TokenRecord>>,
    /// Bytecode words read by the instruction.
    pub code_fragments: Vec<CodeFragment>,
}

/// Stage of a dispute as recorded by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeState {
    /// Both parties reveal the children of their current node at `level` (0 = leaves).
    Bisecting {
        /// Tree level of the nodes being revealed.
        level: usize,
    },
    /// Both paths reached a leaf; one-step proofs are accepted.
    LeafReached,
    /// Dispute is over.
    Ended {
        /// Winning side.
        winner: Party,
    },
}

/// Read-only snapshot of a dispute as recorded by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeView {
    /// Dispute identifier.
    pub id: DisputeId,
    /// Disputed execution.
    pub execution_id: ExecutionId,
    /// Solver address.
    pub solver: H160,
    /// Challenger address.
    pub challenger: H160,
    /// Common tree depth used for this dispute.
    pub depth: usize,
    /// Current stage.
    pub state: DisputeState,
    /// Hash of the node the solver must reveal (or has revealed) this round.
    pub solver_path: H256,
    /// Hash of the node the challenger must reveal (or has revealed) this round.
    pub challenger_path: H256,
    /// Pair revealed by the solver this round.
    pub solver_revealed: Option<NodePair>,
    /// Pair revealed by the challenger this round.
    pub challenger_revealed: Option<NodePair>,
}

impl DisputeView {
    /// Returns the side `address` plays in this dispute.
    pub fn party_of(&self, address: H160) -> Option<Party> {
        if address == self.solver {
            Some(Party::Solver)
        } else if address == self.challenger {
            Some(Party::Challenger)
        } else {
            None
        }
    }

    /// Path the given party is expected to reveal.
    pub fn path(&self, party: Party) -> H256 {
        match party {
            Party::Solver => self.solver_path,
            Party::Challenger => self.challenger_path,
        }
    }

    /// Pair revealed by the given party in the current round.
    pub fn revealed(&self, party: Party) -> Option<NodePair> {
        match party {
            Party::Solver => self.solver_revealed,
            Party::Challenger => self.challenger_revealed,
        }
    }

    /// Winner, if the dispute is over.
    pub fn winner(&self) -> Option<Party> {
        match self.state {
            DisputeState::Ended { winner } => Some(winner),
            _ => None,
        }
    }
}

/// Asynchronous notifications emitted by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// Somebody asked for an execution result.
    ExecutionRequested {
        /// New execution.
        execution_id: ExecutionId,
        /// The request.
        request: ExecutionRequest,
    },
    /// A solver registered a result.
    ExecutionRegistered {
        /// Registered execution.
        execution_id: ExecutionId,
        /// Solver address.
        solver: H160,
        /// Claimed result.
        claim: ResultClaim,
    },
    /// A challenger opened a dispute.
    DisputeOpened {
        /// New dispute.
        dispute_id: DisputeId,
        /// Disputed execution.
        execution_id: ExecutionId,
        /// Solver address.
        solver: H160,
        /// Challenger address.
        challenger: H160,
    },
    /// Both parties completed a round; new paths (or the leaf stage) are recorded.
    NewRound {
        /// Affected dispute.
        dispute_id: DisputeId,
        /// Recorded stage after the round.
        state: DisputeState,
    },
    /// A party lost the dispute.
    Slashed {
        /// Affected dispute.
        dispute_id: DisputeId,
        /// Losing side.
        party: Party,
        /// Losing address.
        address: H160,
    },
}

impl Notification {
    /// Dispute the notification refers to, if any.
    pub fn dispute_id(&self) -> Option<DisputeId> {
        match self {
            Self::DisputeOpened { dispute_id, .. }
            | Self::NewRound { dispute_id, .. }
            | Self::Slashed { dispute_id, .. } => Some(*dispute_id),
            Self::ExecutionRequested { .. } | Self::ExecutionRegistered { .. } => None,
        }
    }
}

/// Errors returned by a [`Verifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    /// No execution with this identifier.
    #[error("unknown {0}")]
    UnknownExecution(ExecutionId),
    /// No dispute with this identifier.
    #[error("unknown {0}")]
    UnknownDispute(DisputeId),
    /// The submission reused a sequence number.
    #[error("nonce {nonce} already used by {address:?}")]
    NonceReused {
        /// Submitting address.
        address: H160,
        /// Reused nonce.
        nonce: u64,
    },
    /// The verifier refused the call.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The call did not reach the verifier.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Request/response surface of the external verifier (enforcer) that adjudicates disputes.
///
/// Calls that change verifier state carry a [`Submission`]; its nonce must be reserved
/// before the call and is never reused, even if the call fails.
pub trait Verifier: Send + Sync {
    /// Files a new execution request.
    fn request_execution(
        &self,
        from: Submission,
        request: ExecutionRequest,
    ) -> impl Future<Output = Result<ExecutionId, VerifierError>> + Send;

    /// Registers a solver's result for an execution.
    fn register(
        &self,
        from: Submission,
        execution_id: ExecutionId,
        claim: ResultClaim,
    ) -> impl Future<Output = Result<(), VerifierError>> + Send;

    /// Disputes a registered result with a conflicting claim.
    fn dispute(
        &self,
        from: Submission,
        execution_id: ExecutionId,
        claim: ResultClaim,
    ) -> impl Future<Output = Result<DisputeId, VerifierError>> + Send;

    /// Reveals the children of the sender's current node.
    fn respond(
        &self,
        from: Submission,
        dispute_id: DisputeId,
        pair: NodePair,
    ) -> impl Future<Output = Result<(), VerifierError>> + Send;

    /// Submits a one-step proof for the sender's leaf.
    fn submit_proof(
        &self,
        from: Submission,
        dispute_id: DisputeId,
        proofs: Proofs,
        input: ExecutionInput,
    ) -> impl Future<Output = Result<(), VerifierError>> + Send;

    /// Resolves a dispute against the party whose move is overdue.
    fn claim_timeout(
        &self,
        from: Submission,
        dispute_id: DisputeId,
    ) -> impl Future<Output = Result<(), VerifierError>> + Send;

    /// Reads the currently recorded state of a dispute.
    fn dispute_view(
        &self,
        dispute_id: DisputeId,
    ) -> impl Future<Output = Result<DisputeView, VerifierError>> + Send;
}

/// `0x`-prefixed hex encoding for byte vectors.
mod hex_bytes {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let digits = encoded.strip_prefix("0x").unwrap_or(&encoded);
        hex::decode(digits).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_hex_encoding() {
        let request = ExecutionRequest {
            code: vec![0x60, 0x03],
            data: vec![],
            gas_limit: 100,
            context: CallContext::default(),
            custom_environment: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["code"], "0x6003");
        assert_eq!(json["data"], "0x");

        let parsed: ExecutionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn view_accessors() {
        let view = DisputeView {
            id: DisputeId(1),
            execution_id: ExecutionId(0),
            solver: H160::repeat_byte(1),
            challenger: H160::repeat_byte(2),
            depth: 3,
            state: DisputeState::Ended {
                winner: Party::Challenger,
            },
            solver_path: H256::repeat_byte(3),
            challenger_path: H256::repeat_byte(4),
            solver_revealed: None,
            challenger_revealed: Some(NodePair::ZERO),
        };
        assert_eq!(view.party_of(H160::repeat_byte(2)), Some(Party::Challenger));
        assert_eq!(view.party_of(H160::zero()), None);
        assert_eq!(view.path(Party::Challenger), H256::repeat_byte(4));
        assert!(view.revealed(Party::Challenger).unwrap().is_zero());
        assert_eq!(view.winner(), Some(Party::Challenger));
        assert_eq!(Party::Solver.opponent(), Party::Challenger);
    }
}
