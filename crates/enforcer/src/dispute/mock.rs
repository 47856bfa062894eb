use enforcer_interface::{CallContext, DisputeState, Party};
use tracing::debug;

use super::Dispute;
use crate::{
    errors::DisputeError,
    merkle::{FragmentTree, Merkelizer, MerkleTree},
    proof::ProofHelper,
    Program, Settings, World,
};

/// Outcome of a locally played dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Winning side.
    pub winner: Party,
    /// Number of completed bisection rounds.
    pub rounds: usize,
    /// Leaf both parties ended up disputing; `None` if the roots agreed.
    pub leaf_index: Option<usize>,
}

/// Plays the dispute game between two traces synchronously, with the same state machine and
/// one-step verification the verifier uses.
#[derive(Debug)]
pub struct DisputeMock<'a, W> {
    program: &'a Program,
    fragments: FragmentTree,
    context: CallContext,
    settings: Settings,
    solver: &'a Merkelizer<W>,
    challenger: &'a Merkelizer<W>,
}

impl<'a, W: World> DisputeMock<'a, W> {
    /// Prepares a dispute over two traces of `program`.
    pub fn new(
        program: &'a Program,
        solver: &'a Merkelizer<W>,
        challenger: &'a Merkelizer<W>,
    ) -> Self {
        Self {
            program,
            fragments: FragmentTree::from_program(program),
            context: CallContext::default(),
            settings: Settings::default(),
            solver,
            challenger,
        }
    }

    /// Sets the call context both traces were executed with.
    #[must_use]
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the settings both traces were executed with.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    fn merkelizer(&self, party: Party) -> &'a Merkelizer<W> {
        match party {
            Party::Solver => self.solver,
            Party::Challenger => self.challenger,
        }
    }

    /// Bisects down to the first differing leaf and adjudicates it.
    ///
    /// The solver proves its leaf if it has one, otherwise the challenger does. A proof that fails
    /// verification resolves against its submitter.
    ///
    /// # Errors
    ///
    /// Only fails if the state machine rejects a move, which indicates a bug in one of the trees.
    pub fn run(&self) -> Result<Verdict, DisputeError> {
        let mut dispute = Dispute::new(&self.solver.claim(), &self.challenger.claim());
        let depth = dispute.depth();
        let pad = |tree: &MerkleTree| -> Result<MerkleTree, DisputeError> {
            let mut tree = tree.clone();
            let local = tree.depth();
            tree.pad_to_depth(depth)
                .map_err(|_| DisputeError::DepthMismatch { local, agreed: depth })?;
            Ok(tree)
        };
        let solver_tree = pad(self.solver.tree())?;
        let challenger_tree = pad(self.challenger.tree())?;

        let mut rounds = 0;
        let mut index = 0;
        while let DisputeState::Bisecting { level } = dispute.state() {
            let solver_pair = solver_tree.node(level, index).pair();
            let challenger_pair = challenger_tree.node(level, index).pair();
            dispute.respond(Party::Solver, solver_pair)?;
            dispute.respond(Party::Challenger, challenger_pair)?;
            rounds += 1;
            if level > 0 {
                index = 2 * index + usize::from(solver_pair.left == challenger_pair.left);
            }
        }
        if let DisputeState::Ended { winner } = dispute.state() {
            return Ok(Verdict {
                winner,
                rounds,
                leaf_index: None,
            });
        }

        let prover = [Party::Solver, Party::Challenger]
            .into_iter()
            .find(|&party| {
                index < self.merkelizer(party).steps().len()
                    && dispute.revealed(party).is_some_and(|leaf| !leaf.is_zero())
            });
        let winner = match prover {
            Some(prover) => {
                let merkelizer = self.merkelizer(prover);
                let proof = ProofHelper::construct_proof(merkelizer, &self.fragments, index)
                    .and_then(|(proofs, input)| {
                        ProofHelper::verify_step(
                            self.program,
                            self.fragments.root(),
                            &self.context,
                            &self.settings,
                            &proofs,
                            &input,
                        )
                    });
                match proof {
                    Ok(outcome) => dispute.adjudicate(prover, &outcome)?,
                    Err(err) => {
                        debug!(%prover, %err, "proof rejected");
                        prover.opponent()
                    }
                }
            }
            None => dispute.timeout(Party::Challenger)?,
        };
        Ok(Verdict {
            winner,
            rounds,
            leaf_index: Some(index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testonly;

    #[test]
    fn identical_traces_need_no_bisection() {
        let (program, _) = testonly::fixture();
        let solver = testonly::fixture_merkelizer();
        let challenger = testonly::fixture_merkelizer();
        let verdict = DisputeMock::new(&program, &solver, &challenger).run().unwrap();
        assert_eq!(
            verdict,
            Verdict {
                winner: Party::Solver,
                rounds: 0,
                leaf_index: None
            }
        );
    }

    #[test]
    fn rounds_are_logarithmic() {
        let (program, _) = testonly::fixture();
        let solver = testonly::fixture_merkelizer();
        let challenger = testonly::corrupted_fixture(3);
        let verdict = DisputeMock::new(&program, &solver, &challenger).run().unwrap();
        assert_eq!(verdict.winner, Party::Solver);
        assert_eq!(verdict.rounds, solver.depth());
        assert_eq!(verdict.leaf_index, Some(3));
    }
}
