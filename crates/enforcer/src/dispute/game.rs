use enforcer_interface::{DisputeState, NodePair, Opcode, Party, ResultClaim};
use primitive_types::H256;
use tracing::debug;

use crate::{
    errors::DisputeError,
    hash::{hash_pair, ZERO},
    proof::StepOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Side {
    final_state: H256,
    path: H256,
    revealed: Option<NodePair>,
}

impl Side {
    fn new(claim: &ResultClaim, depth: usize) -> Self {
        let path = (claim.depth..depth).fold(claim.root, |root, _| hash_pair(&root, &ZERO));
        Self {
            final_state: claim.final_state,
            path,
            revealed: None,
        }
    }
}

/// Bisection game between a solver and a challenger, as adjudicated by a verifier.
///
/// Both parties start at their (depth-aligned) roots and reveal the children of their current
/// node once per round. When the lefts agree, both descend right, otherwise left. After the
/// leaf level is revealed, a one-step proof decides the winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispute {
    depth: usize,
    state: DisputeState,
    solver: Side,
    challenger: Side,
}

impl Dispute {
    /// Opens a dispute. A shallower claim is raised to the common depth by pairing its root
    /// with [`ZERO`] once per missing level. Equal roots end the dispute for the solver.
    pub fn new(solver: &ResultClaim, challenger: &ResultClaim) -> Self {
        let depth = solver.depth.max(challenger.depth);
        let solver = Side::new(solver, depth);
        let challenger = Side::new(challenger, depth);
        let state = if solver.path == challenger.path {
            DisputeState::Ended {
                winner: Party::Solver,
            }
        } else {
            DisputeState::Bisecting {
                level: depth.saturating_sub(1),
            }
        };
        Self {
            depth,
            state,
            solver,
            challenger,
        }
    }

    /// Common depth of both trees.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current stage.
    pub fn state(&self) -> DisputeState {
        self.state
    }

    /// Node `party` has to open in this round.
    pub fn path(&self, party: Party) -> H256 {
        self.side(party).path
    }

    /// Pair revealed by `party` in this round; at the leaf stage, its leaf.
    pub fn revealed(&self, party: Party) -> Option<NodePair> {
        self.side(party).revealed
    }

    fn side(&self, party: Party) -> &Side {
        match party {
            Party::Solver => &self.solver,
            Party::Challenger => &self.challenger,
        }
    }

    fn side_mut(&mut self, party: Party) -> &mut Side {
        match party {
            Party::Solver => &mut self.solver,
            Party::Challenger => &mut self.challenger,
        }
    }

    /// Records `pair` as the children of `party`'s current node.
    ///
    /// Returns the new stage once both parties have revealed.
    ///
    /// # Errors
    ///
    /// Fails outside of bisection, on a second reveal in the same round, or if `pair` does not
    /// open the party's path. A zero path can only be opened by [`NodePair::ZERO`].
    pub fn respond(
        &mut self,
        party: Party,
        pair: NodePair,
    ) -> Result<Option<DisputeState>, DisputeError> {
        let DisputeState::Bisecting { level } = self.state else {
            return Err(DisputeError::WrongPhase);
        };
        let side = self.side_mut(party);
        if side.revealed.is_some() {
            return Err(DisputeError::AlreadyResponded);
        }
        let opens_path = if side.path == ZERO {
            pair.is_zero()
        } else {
            hash_pair(&pair.left, &pair.right) == side.path
        };
        if !opens_path {
            return Err(DisputeError::InvalidPath { path: side.path });
        }
        side.revealed = Some(pair);

        let (Some(solver), Some(challenger)) = (self.solver.revealed, self.challenger.revealed)
        else {
            return Ok(None);
        };
        self.state = if level == 0 {
            DisputeState::LeafReached
        } else {
            let go_right = solver.left == challenger.left;
            for (side, pair) in [(&mut self.solver, solver), (&mut self.challenger, challenger)] {
                side.path = if go_right { pair.right } else { pair.left };
                side.revealed = None;
            }
            DisputeState::Bisecting { level: level - 1 }
        };
        debug!(state = ?self.state, "bisection round completed");
        Ok(Some(self.state))
    }

    /// Decides the dispute from the re-execution of `submitter`'s leaf and returns the winner.
    ///
    /// # Errors
    ///
    /// Fails outside of the leaf stage, or if the submitter's leaf is padding.
    pub fn adjudicate(
        &mut self,
        submitter: Party,
        outcome: &StepOutcome,
    ) -> Result<Party, DisputeError> {
        if self.state != DisputeState::LeafReached {
            return Err(DisputeError::WrongPhase);
        }
        let leaf = self.side(submitter).revealed.unwrap_or(NodePair::ZERO);
        if leaf.is_zero() {
            return Err(DisputeError::NoLeafToProve);
        }
        let solver_leaf = self.solver.revealed.unwrap_or(NodePair::ZERO);
        let challenger_leaf = self.challenger.revealed.unwrap_or(NodePair::ZERO);

        let winner = if outcome.pre_hash != leaf.left {
            submitter.opponent()
        } else if outcome.post_hash == solver_leaf.right {
            // Claiming a final state that is not reached through `RETURN` / `REVERT` is invalid.
            let proper_end = matches!(outcome.opcode, Some(Opcode::Return | Opcode::Revert));
            if solver_leaf.right == self.solver.final_state && !proper_end {
                Party::Challenger
            } else {
                Party::Solver
            }
        } else if outcome.post_hash == challenger_leaf.right {
            Party::Challenger
        } else {
            submitter.opponent()
        };
        self.state = DisputeState::Ended { winner };
        Ok(winner)
    }

    /// Ends the dispute against the party whose move is overdue and returns the winner.
    ///
    /// While bisecting, `claimant` must have revealed this round and its opponent must not.
    /// At the leaf stage nobody has proven anything, so only the challenger can claim and the
    /// solver loses.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::TimeoutNotApplicable`] if the opponent is not overdue and
    /// [`DisputeError::WrongPhase`] once the dispute has ended.
    pub fn timeout(&mut self, claimant: Party) -> Result<Party, DisputeError> {
        let overdue = match self.state {
            DisputeState::Bisecting { .. } => {
                self.side(claimant).revealed.is_some()
                    && self.side(claimant.opponent()).revealed.is_none()
            }
            DisputeState::LeafReached => claimant == Party::Challenger,
            DisputeState::Ended { .. } => return Err(DisputeError::WrongPhase),
        };
        if !overdue {
            return Err(DisputeError::TimeoutNotApplicable);
        }
        self.state = DisputeState::Ended { winner: claimant };
        Ok(claimant)
    }
}

#[cfg(test)]
mod tests {
    use enforcer_interface::ErrNo;

    use super::*;
    use crate::merkle::{MerkleTree, Node};

    fn tree(leaves: &[(u8, u8)]) -> MerkleTree {
        MerkleTree::new(
            leaves
                .iter()
                .map(|&(pre, post)| Node::leaf(H256::repeat_byte(pre), H256::repeat_byte(post)))
                .collect(),
        )
        .unwrap()
    }

    fn claim(tree: &MerkleTree) -> ResultClaim {
        ResultClaim {
            root: tree.root().hash,
            depth: tree.depth(),
            final_state: tree.leaves()[tree.leaves().len() - 1].right,
        }
    }

    /// Plays both sides honestly according to their trees; returns the leaf index reached.
    fn bisect(dispute: &mut Dispute, solver: &MerkleTree, challenger: &MerkleTree) -> usize {
        let mut index = 0;
        while let DisputeState::Bisecting { level } = dispute.state() {
            let solver_pair = solver.node(level, index).pair();
            let challenger_pair = challenger.node(level, index).pair();
            dispute.respond(Party::Solver, solver_pair).unwrap();
            dispute.respond(Party::Challenger, challenger_pair).unwrap();
            if level > 0 {
                index = 2 * index + usize::from(solver_pair.left == challenger_pair.left);
            }
        }
        index
    }

    fn outcome(pre: u8, post: u8, opcode: Opcode) -> StepOutcome {
        StepOutcome {
            pre_hash: H256::repeat_byte(pre),
            post_hash: H256::repeat_byte(post),
            opcode: Some(opcode),
            errno: ErrNo::NoError,
        }
    }

    #[test]
    fn equal_roots_end_immediately() {
        let solver = tree(&[(1, 2), (2, 3)]);
        let dispute = Dispute::new(&claim(&solver), &claim(&solver));
        assert_eq!(
            dispute.state(),
            DisputeState::Ended {
                winner: Party::Solver
            }
        );
    }

    #[test]
    fn bisection_finds_first_difference() {
        let solver = tree(&[(1, 2), (2, 3), (3, 4), (4, 5), (5, 6)]);
        let challenger = tree(&[(1, 2), (2, 3), (3, 9), (9, 10), (10, 11)]);
        let mut dispute = Dispute::new(&claim(&solver), &claim(&challenger));
        assert_eq!(bisect(&mut dispute, &solver, &challenger), 2);
        assert_eq!(dispute.state(), DisputeState::LeafReached);
        assert_eq!(
            dispute.revealed(Party::Solver),
            Some(solver.leaves()[2].pair())
        );

        let winner = dispute
            .adjudicate(Party::Solver, &outcome(3, 4, Opcode::Add))
            .unwrap();
        assert_eq!(winner, Party::Solver);
        assert_eq!(
            dispute.adjudicate(Party::Challenger, &outcome(3, 9, Opcode::Add)),
            Err(DisputeError::WrongPhase)
        );
    }

    #[test]
    fn wrong_reveals_are_rejected() {
        let solver = tree(&[(1, 2), (2, 3)]);
        let challenger = tree(&[(1, 2), (2, 4)]);
        let mut dispute = Dispute::new(&claim(&solver), &claim(&challenger));
        assert!(matches!(
            dispute.respond(Party::Solver, challenger.root().pair()),
            Err(DisputeError::InvalidPath { .. })
        ));
        dispute.respond(Party::Solver, solver.root().pair()).unwrap();
        assert_eq!(
            dispute.respond(Party::Solver, solver.root().pair()),
            Err(DisputeError::AlreadyResponded)
        );
        assert_eq!(
            dispute.timeout(Party::Challenger),
            Err(DisputeError::TimeoutNotApplicable)
        );
        assert_eq!(dispute.timeout(Party::Solver), Ok(Party::Solver));
        assert_eq!(dispute.timeout(Party::Solver), Err(DisputeError::WrongPhase));
    }

    #[test]
    fn shallower_claim_is_padded() {
        let solver = tree(&[(1, 2), (2, 3), (3, 4)]);
        let mut challenger = tree(&[(1, 2)]);
        let mut dispute = Dispute::new(&claim(&solver), &claim(&challenger));
        assert_eq!(dispute.depth(), 3);
        challenger.pad_to_depth(3).unwrap();
        assert_eq!(dispute.path(Party::Challenger), challenger.root().hash);

        assert_eq!(bisect(&mut dispute, &solver, &challenger), 1);
        assert_eq!(dispute.revealed(Party::Challenger), Some(NodePair::ZERO));
        assert_eq!(
            dispute.adjudicate(Party::Challenger, &outcome(2, 3, Opcode::Add)),
            Err(DisputeError::NoLeafToProve)
        );
        assert_eq!(
            dispute.adjudicate(Party::Solver, &outcome(2, 3, Opcode::Add)),
            Ok(Party::Solver)
        );
    }

    #[test]
    fn improper_final_state_loses() {
        let mut solver = tree(&[(1, 2), (2, 3)]);
        let challenger = tree(&[(1, 2), (2, 3), (3, 4)]);
        let mut dispute = Dispute::new(&claim(&solver), &claim(&challenger));
        solver.pad_to_depth(3).unwrap();
        assert_eq!(bisect(&mut dispute, &solver, &challenger), 2);
        assert_eq!(dispute.revealed(Party::Solver), Some(NodePair::ZERO));
        assert_eq!(
            dispute.adjudicate(Party::Challenger, &outcome(3, 4, Opcode::Add)),
            Ok(Party::Challenger)
        );

        // The solver's last step reproduces, but it claims `STOP` as the end of the execution.
        let solver = tree(&[(1, 2), (2, 3), (3, 5)]);
        let mut dispute = Dispute::new(&claim(&solver), &claim(&challenger));
        assert_eq!(bisect(&mut dispute, &solver, &challenger), 2);
        assert_eq!(
            dispute.adjudicate(Party::Solver, &outcome(3, 5, Opcode::Stop)),
            Ok(Party::Challenger)
        );
    }

    #[test]
    fn timeout_at_leaf_stage_slashes_solver() {
        let solver = tree(&[(1, 2)]);
        let challenger = tree(&[(1, 3)]);
        let mut dispute = Dispute::new(&claim(&solver), &claim(&challenger));
        bisect(&mut dispute, &solver, &challenger);
        assert_eq!(dispute.state(), DisputeState::LeafReached);
        assert_eq!(
            dispute.timeout(Party::Solver),
            Err(DisputeError::TimeoutNotApplicable)
        );
        assert_eq!(dispute.timeout(Party::Challenger), Ok(Party::Challenger));
    }
}
