use std::collections::{HashMap, HashSet};

use enforcer_interface::{
    DisputeId, DisputeView, ExecutionId, ExecutionInput, ExecutionRequest, NodePair, Notification,
    Party, Proofs, ResultClaim, Submission, Verifier, VerifierError,
};
use parking_lot::Mutex;
use primitive_types::{H160, H256};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::Dispute;
use crate::{errors::DisputeError, merkle::FragmentTree, proof::ProofHelper, Program, Settings};

#[derive(Debug)]
struct Execution {
    request: ExecutionRequest,
    program: Program,
    code_root: H256,
    settings: Settings,
    solver: Option<(H160, ResultClaim)>,
}

#[derive(Debug)]
struct DisputeRecord {
    execution_id: ExecutionId,
    solver: H160,
    challenger: H160,
    game: Dispute,
}

impl DisputeRecord {
    fn party_of(&self, address: H160) -> Result<Party, VerifierError> {
        if address == self.solver {
            Ok(Party::Solver)
        } else if address == self.challenger {
            Ok(Party::Challenger)
        } else {
            Err(rejected(DisputeError::NotAParty))
        }
    }

    fn address_of(&self, party: Party) -> H160 {
        match party {
            Party::Solver => self.solver,
            Party::Challenger => self.challenger,
        }
    }

    fn view(&self, id: DisputeId) -> DisputeView {
        DisputeView {
            id,
            execution_id: self.execution_id,
            solver: self.solver,
            challenger: self.challenger,
            depth: self.game.depth(),
            state: self.game.state(),
            solver_path: self.game.path(Party::Solver),
            challenger_path: self.game.path(Party::Challenger),
            solver_revealed: self.game.revealed(Party::Solver),
            challenger_revealed: self.game.revealed(Party::Challenger),
        }
    }

    fn slashed(&self, id: DisputeId, winner: Party) -> Notification {
        let party = winner.opponent();
        Notification::Slashed {
            dispute_id: id,
            party,
            address: self.address_of(party),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_execution: u64,
    next_dispute: u64,
    executions: HashMap<ExecutionId, Execution>,
    disputes: HashMap<DisputeId, DisputeRecord>,
    used_nonces: HashSet<(H160, u64)>,
}

impl Inner {
    fn use_nonce(&mut self, from: Submission) -> Result<(), VerifierError> {
        if self.used_nonces.insert((from.from, from.nonce)) {
            Ok(())
        } else {
            Err(VerifierError::NonceReused {
                address: from.from,
                nonce: from.nonce,
            })
        }
    }

    fn execution(&self, id: ExecutionId) -> Result<&Execution, VerifierError> {
        self.executions
            .get(&id)
            .ok_or(VerifierError::UnknownExecution(id))
    }

    fn dispute_mut(&mut self, id: DisputeId) -> Result<&mut DisputeRecord, VerifierError> {
        self.disputes
            .get_mut(&id)
            .ok_or(VerifierError::UnknownDispute(id))
    }
}

fn rejected(err: impl ToString) -> VerifierError {
    VerifierError::Rejected(err.to_string())
}

/// Reference [`Verifier`] that keeps all state in memory and applies the adjudication rules
/// of an on-chain enforcer.
///
/// Timeouts have no clock: a timeout can be claimed whenever the opponent is overdue.
#[derive(Debug, Default)]
pub struct InMemoryVerifier {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Notification>>>,
}

impl InMemoryVerifier {
    /// Creates a verifier without executions or subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for every notification emitted from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Runs `action` under the state lock, then publishes the notifications it produced.
    fn apply<R>(
        &self,
        action: impl FnOnce(&mut Inner, &mut Vec<Notification>) -> Result<R, VerifierError>,
    ) -> Result<R, VerifierError> {
        let mut notifications = Vec::new();
        let result = action(&mut self.inner.lock(), &mut notifications);
        if !notifications.is_empty() {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|subscriber| {
                notifications
                    .iter()
                    .all(|notification| subscriber.send(notification.clone()).is_ok())
            });
        }
        result
    }
}

impl Verifier for InMemoryVerifier {
    async fn request_execution(
        &self,
        from: Submission,
        request: ExecutionRequest,
    ) -> Result<ExecutionId, VerifierError> {
        self.apply(|inner, notifications| {
            inner.use_nonce(from)?;
            let execution_id = ExecutionId(inner.next_execution);
            inner.next_execution += 1;

            let program = Program::new(request.code.clone());
            let code_root = FragmentTree::from_program(&program).root();
            let settings = Settings {
                gas_limit: request.gas_limit,
                ..Settings::default()
            };
            info!(%execution_id, code_len = program.len(), "execution requested");
            notifications.push(Notification::ExecutionRequested {
                execution_id,
                request: request.clone(),
            });
            inner.executions.insert(
                execution_id,
                Execution {
                    request,
                    program,
                    code_root,
                    settings,
                    solver: None,
                },
            );
            Ok(execution_id)
        })
    }

    async fn register(
        &self,
        from: Submission,
        execution_id: ExecutionId,
        claim: ResultClaim,
    ) -> Result<(), VerifierError> {
        self.apply(|inner, notifications| {
            inner.use_nonce(from)?;
            let execution = inner
                .executions
                .get_mut(&execution_id)
                .ok_or(VerifierError::UnknownExecution(execution_id))?;
            if execution.solver.is_some() {
                return Err(rejected("result already registered"));
            }
            execution.solver = Some((from.from, claim));
            info!(%execution_id, solver = ?from.from, root = ?claim.root, "result registered");
            notifications.push(Notification::ExecutionRegistered {
                execution_id,
                solver: from.from,
                claim,
            });
            Ok(())
        })
    }

    async fn dispute(
        &self,
        from: Submission,
        execution_id: ExecutionId,
        claim: ResultClaim,
    ) -> Result<DisputeId, VerifierError> {
        self.apply(|inner, notifications| {
            inner.use_nonce(from)?;
            let (solver, solver_claim) = inner
                .execution(execution_id)?
                .solver
                .ok_or_else(|| rejected("no registered result"))?;
            if solver == from.from {
                return Err(rejected("the solver cannot dispute its own result"));
            }

            let dispute_id = DisputeId(inner.next_dispute);
            inner.next_dispute += 1;
            let record = DisputeRecord {
                execution_id,
                solver,
                challenger: from.from,
                game: Dispute::new(&solver_claim, &claim),
            };
            info!(%dispute_id, %execution_id, depth = record.game.depth(), "dispute opened");
            notifications.push(Notification::DisputeOpened {
                dispute_id,
                execution_id,
                solver,
                challenger: from.from,
            });
            if let Some(winner) = record.view(dispute_id).winner() {
                notifications.push(record.slashed(dispute_id, winner));
            }
            inner.disputes.insert(dispute_id, record);
            Ok(dispute_id)
        })
    }

    async fn respond(
        &self,
        from: Submission,
        dispute_id: DisputeId,
        pair: NodePair,
    ) -> Result<(), VerifierError> {
        self.apply(|inner, notifications| {
            inner.use_nonce(from)?;
            let record = inner.dispute_mut(dispute_id)?;
            let party = record.party_of(from.from)?;
            let new_state = record.game.respond(party, pair).map_err(rejected)?;
            debug!(%dispute_id, %party, ?pair, "pair revealed");
            if let Some(state) = new_state {
                notifications.push(Notification::NewRound { dispute_id, state });
            }
            Ok(())
        })
    }

    async fn submit_proof(
        &self,
        from: Submission,
        dispute_id: DisputeId,
        proofs: Proofs,
        input: ExecutionInput,
    ) -> Result<(), VerifierError> {
        self.apply(|inner, notifications| {
            inner.use_nonce(from)?;
            let (party, execution_id) = {
                let record = inner.dispute_mut(dispute_id)?;
                (record.party_of(from.from)?, record.execution_id)
            };
            let execution = inner.execution(execution_id)?;
            let outcome = ProofHelper::verify_step(
                &execution.program,
                execution.code_root,
                &execution.request.context,
                &execution.settings,
                &proofs,
                &input,
            )
            .map_err(rejected)?;

            let record = inner.dispute_mut(dispute_id)?;
            let winner = record.game.adjudicate(party, &outcome).map_err(rejected)?;
            info!(
                %dispute_id,
                submitter = %party,
                %winner,
                opcode = ?outcome.opcode,
                errno = %outcome.errno,
                "proof adjudicated"
            );
            notifications.push(record.slashed(dispute_id, winner));
            Ok(())
        })
    }

    async fn claim_timeout(
        &self,
        from: Submission,
        dispute_id: DisputeId,
    ) -> Result<(), VerifierError> {
        self.apply(|inner, notifications| {
            inner.use_nonce(from)?;
            let record = inner.dispute_mut(dispute_id)?;
            let party = record.party_of(from.from)?;
            let winner = record.game.timeout(party).map_err(rejected)?;
            info!(%dispute_id, %winner, "timeout claimed");
            notifications.push(record.slashed(dispute_id, winner));
            Ok(())
        })
    }

    async fn dispute_view(&self, dispute_id: DisputeId) -> Result<DisputeView, VerifierError> {
        let inner = self.inner.lock();
        let record = inner
            .disputes
            .get(&dispute_id)
            .ok_or(VerifierError::UnknownDispute(dispute_id))?;
        Ok(record.view(dispute_id))
    }
}

#[cfg(test)]
mod tests {
    use enforcer_interface::DisputeState;

    use super::*;
    use crate::{dispute::Wallet, testonly};

    #[tokio::test]
    async fn nonces_cannot_be_reused() {
        let verifier = InMemoryVerifier::new();
        let wallet = Wallet::new(H160::repeat_byte(1));
        let submission = wallet.reserve_nonce();
        verifier
            .request_execution(submission, testonly::fixture_request())
            .await
            .unwrap();
        let err = verifier
            .request_execution(submission, testonly::fixture_request())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VerifierError::NonceReused {
                address: wallet.address(),
                nonce: 0
            }
        );
    }

    #[tokio::test]
    async fn full_dispute_over_corrupted_trace() {
        let verifier = InMemoryVerifier::new();
        let mut notifications = verifier.subscribe();
        let solver = Wallet::new(H160::repeat_byte(1));
        let challenger = Wallet::new(H160::repeat_byte(2));

        let honest = testonly::fixture_merkelizer();
        let corrupted = testonly::corrupted_fixture(7);
        let execution_id = verifier
            .request_execution(solver.reserve_nonce(), testonly::fixture_request())
            .await
            .unwrap();
        verifier
            .register(solver.reserve_nonce(), execution_id, corrupted.claim())
            .await
            .unwrap();
        let dispute_id = verifier
            .dispute(challenger.reserve_nonce(), execution_id, honest.claim())
            .await
            .unwrap();

        let mut index = 0;
        loop {
            let view = verifier.dispute_view(dispute_id).await.unwrap();
            let DisputeState::Bisecting { level } = view.state else {
                break;
            };
            let solver_pair = corrupted.tree().node(level, index).pair();
            let challenger_pair = honest.tree().node(level, index).pair();
            verifier
                .respond(solver.reserve_nonce(), dispute_id, solver_pair)
                .await
                .unwrap();
            verifier
                .respond(challenger.reserve_nonce(), dispute_id, challenger_pair)
                .await
                .unwrap();
            if level > 0 {
                index = 2 * index + usize::from(solver_pair.left == challenger_pair.left);
            }
        }
        assert_eq!(index, 7);

        // A party that is not in the dispute cannot prove anything.
        let fragments = FragmentTree::from_program(&testonly::fixture().0);
        let (proofs, input) = ProofHelper::construct_proof(&honest, &fragments, index).unwrap();
        let outsider = Wallet::new(H160::repeat_byte(3));
        assert!(matches!(
            verifier
                .submit_proof(outsider.reserve_nonce(), dispute_id, proofs, input.clone())
                .await,
            Err(VerifierError::Rejected(_))
        ));
        verifier
            .submit_proof(challenger.reserve_nonce(), dispute_id, proofs, input)
            .await
            .unwrap();

        let view = verifier.dispute_view(dispute_id).await.unwrap();
        assert_eq!(view.winner(), Some(Party::Challenger));

        let mut last = None;
        while let Ok(notification) = notifications.try_recv() {
            last = Some(notification);
        }
        assert_eq!(
            last,
            Some(Notification::Slashed {
                dispute_id,
                party: Party::Solver,
                address: solver.address(),
            })
        );
    }
}
