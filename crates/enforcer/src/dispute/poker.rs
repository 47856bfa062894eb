use std::{collections::HashMap, fmt, ops::Range, sync::Arc};

use enforcer_interface::{
    DisputeId, DisputeState, ExecutionId, ExecutionRequest, NodePair, Notification, Party,
    ResultClaim, Verifier, VerifierError,
};
use primitive_types::{H160, H256};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Wallet;
use crate::{
    errors::{DisputeError, EngineError},
    merkle::{FragmentTree, Merkelizer, MerkleTree},
    proof::ProofHelper,
    ExecutionStep, Program, Settings, TokenBag, VirtualMachine,
};

type TraceHook = Box<dyn Fn(&mut Vec<ExecutionStep<TokenBag>>) + Send + Sync>;

/// Progress of a dispute from the point of view of one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeStatus {
    /// A submission is owed and has not been accepted yet.
    ResponseDue,
    /// Waiting for the opponent or the verifier.
    Waiting,
    /// The one-step proof was accepted for adjudication.
    ProofSubmitted,
    /// The dispute is over.
    Resolved(Party),
}

#[derive(Debug)]
struct LocalExecution {
    fragments: FragmentTree,
    merkelizer: Merkelizer<TokenBag>,
    claim: ResultClaim,
}

#[derive(Debug)]
struct LocalDispute {
    execution_id: ExecutionId,
    party: Party,
    /// Local trace tree, padded to the depth of the dispute.
    tree: MerkleTree,
    /// Index of the last node this party opened.
    index: usize,
    status: DisputeStatus,
}

impl LocalDispute {
    /// Finds the node at `level` that hashes to `path`. Only the children of the node opened in
    /// the previous round are candidates, unless none of them match.
    fn locate(&self, level: usize, path: H256) -> Option<usize> {
        let candidates: Range<usize> = if level + 1 == self.tree.depth() {
            0..1
        } else {
            2 * self.index..2 * self.index + 2
        };
        candidates
            .into_iter()
            .find(|&index| self.tree.node(level, index).hash == path)
            .or_else(|| match self.tree.position(&path) {
                Some((found, index)) if found == level => Some(index),
                _ => None,
            })
    }
}

/// Event-driven dispute engine acting for one party.
///
/// The poker computes every requested execution locally, optionally registers its result, and
/// disputes results registered by others whenever its own trace commits to a different root.
/// Each dispute it is party to is tracked in a table and advanced on every notification.
/// Failed submissions are logged; the next notification retries against fresh verifier state.
pub struct ExecutionPoker<V> {
    verifier: Arc<V>,
    wallet: Wallet,
    register: bool,
    trace_hook: Option<TraceHook>,
    executions: HashMap<ExecutionId, LocalExecution>,
    disputes: HashMap<DisputeId, LocalDispute>,
}

impl<V> fmt::Debug for ExecutionPoker<V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExecutionPoker")
            .field("wallet", &self.wallet)
            .field("register", &self.register)
            .field("has_trace_hook", &self.trace_hook.is_some())
            .field("executions", &self.executions.len())
            .field("disputes", &self.disputes)
            .finish_non_exhaustive()
    }
}

impl<V: Verifier> ExecutionPoker<V> {
    /// Creates a poker that acts as a challenger only.
    pub fn new(verifier: Arc<V>, wallet: Wallet) -> Self {
        Self {
            verifier,
            wallet,
            register: false,
            trace_hook: None,
            executions: HashMap::new(),
            disputes: HashMap::new(),
        }
    }

    /// Makes the poker register its result for every requested execution.
    #[must_use]
    pub fn with_registration(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    /// Installs a hook that edits every computed trace before it is committed.
    ///
    /// Used to simulate dishonest or faulty parties.
    #[must_use]
    pub fn with_trace_hook(
        mut self,
        hook: impl Fn(&mut Vec<ExecutionStep<TokenBag>>) + Send + Sync + 'static,
    ) -> Self {
        self.trace_hook = Some(Box::new(hook));
        self
    }

    /// Address the poker submits from.
    pub fn address(&self) -> H160 {
        self.wallet.address()
    }

    /// Claim computed for an execution, if the poker has seen its request.
    pub fn claim(&self, execution_id: ExecutionId) -> Option<ResultClaim> {
        self.executions
            .get(&execution_id)
            .map(|execution| execution.claim)
    }

    /// Status of a dispute the poker is party to.
    pub fn status(&self, dispute_id: DisputeId) -> Option<DisputeStatus> {
        self.disputes.get(&dispute_id).map(|dispute| dispute.status)
    }

    /// Processes notifications one at a time until the channel closes.
    pub async fn run(mut self, mut notifications: mpsc::UnboundedReceiver<Notification>) -> Self {
        while let Some(notification) = notifications.recv().await {
            if let Err(err) = self.handle(notification).await {
                warn!(address = ?self.wallet.address(), %err, "failed to act on notification");
            }
        }
        self
    }

    /// Reacts to a single notification.
    ///
    /// # Errors
    ///
    /// Propagates rejected submissions and inconsistencies between the local trace and the
    /// verifier's view. None of them leaves the poker in an unusable state.
    pub async fn handle(&mut self, notification: Notification) -> Result<(), EngineError> {
        match notification {
            Notification::ExecutionRequested {
                execution_id,
                request,
            } => self.on_requested(execution_id, &request).await,
            Notification::ExecutionRegistered {
                execution_id,
                solver,
                claim,
            } => self.on_registered(execution_id, solver, claim).await,
            Notification::DisputeOpened {
                dispute_id,
                execution_id,
                solver,
                challenger,
            } => {
                let me = self.wallet.address();
                let party = if solver == me {
                    Party::Solver
                } else if challenger == me {
                    Party::Challenger
                } else {
                    return Ok(());
                };
                self.on_opened(dispute_id, execution_id, party).await
            }
            Notification::NewRound { dispute_id, .. } => {
                match self.status(dispute_id) {
                    None | Some(DisputeStatus::Resolved(_)) => Ok(()),
                    Some(_) => self.act(dispute_id).await,
                }
            }
            Notification::Slashed {
                dispute_id, party, ..
            } => {
                if let Some(dispute) = self.disputes.get_mut(&dispute_id) {
                    let winner = party.opponent();
                    info!(%dispute_id, %winner, won = winner == dispute.party, "dispute resolved");
                    dispute.status = DisputeStatus::Resolved(winner);
                }
                Ok(())
            }
        }
    }

    /// Submits a timeout claim for a dispute whose opponent is overdue.
    ///
    /// # Errors
    ///
    /// Returns the verifier's rejection if the opponent is not overdue.
    pub async fn claim_timeout(&mut self, dispute_id: DisputeId) -> Result<(), EngineError> {
        self.verifier
            .claim_timeout(self.wallet.reserve_nonce(), dispute_id)
            .await?;
        self.act(dispute_id).await
    }

    fn compute(&self, request: &ExecutionRequest) -> Result<LocalExecution, EngineError> {
        let program = Program::new(request.code.clone());
        let settings = Settings {
            gas_limit: request.gas_limit,
            ..Settings::default()
        };
        let world = TokenBag::new(request.custom_environment.iter().cloned());
        let mut vm = VirtualMachine::new(program.clone(), request.data.clone(), world, settings)
            .with_context(request.context.clone());
        let initial = vm.state().clone();
        let call_data = vm.call_data().clone();
        let mut steps = vm.run(0);
        if let Some(hook) = &self.trace_hook {
            hook(&mut steps);
        }

        let merkelizer = Merkelizer::from_steps(initial, call_data, steps)?;
        Ok(LocalExecution {
            fragments: FragmentTree::from_program(&program),
            claim: merkelizer.claim(),
            merkelizer,
        })
    }

    async fn on_requested(
        &mut self,
        execution_id: ExecutionId,
        request: &ExecutionRequest,
    ) -> Result<(), EngineError> {
        let execution = self.compute(request)?;
        let claim = execution.claim;
        debug!(
            %execution_id,
            steps = execution.merkelizer.steps().len(),
            root = ?claim.root,
            "execution computed"
        );
        self.executions.insert(execution_id, execution);
        if self.register {
            self.verifier
                .register(self.wallet.reserve_nonce(), execution_id, claim)
                .await?;
        }
        Ok(())
    }

    async fn on_registered(
        &mut self,
        execution_id: ExecutionId,
        solver: H160,
        claim: ResultClaim,
    ) -> Result<(), EngineError> {
        if solver == self.wallet.address() {
            return Ok(());
        }
        let Some(own) = self.claim(execution_id) else {
            return Ok(());
        };
        if own.root == claim.root {
            debug!(%execution_id, "registered result agrees with the local trace");
            return Ok(());
        }
        info!(%execution_id, registered = ?claim.root, local = ?own.root, "disputing result");
        self.verifier
            .dispute(self.wallet.reserve_nonce(), execution_id, own)
            .await?;
        Ok(())
    }

    async fn on_opened(
        &mut self,
        dispute_id: DisputeId,
        execution_id: ExecutionId,
        party: Party,
    ) -> Result<(), EngineError> {
        if self.disputes.contains_key(&dispute_id) {
            return Ok(());
        }
        let execution = self
            .executions
            .get(&execution_id)
            .ok_or(VerifierError::UnknownExecution(execution_id))?;
        let view = self.verifier.dispute_view(dispute_id).await?;

        let mut tree = execution.merkelizer.tree().clone();
        let local = tree.depth();
        if local > view.depth {
            return Err(DisputeError::DepthMismatch {
                local,
                agreed: view.depth,
            }
            .into());
        }
        tree.pad_to_depth(view.depth)?;
        self.disputes.insert(
            dispute_id,
            LocalDispute {
                execution_id,
                party,
                tree,
                index: 0,
                status: DisputeStatus::ResponseDue,
            },
        );
        self.act(dispute_id).await
    }

    /// Makes the next move the verifier's current view of the dispute asks for.
    async fn act(&mut self, dispute_id: DisputeId) -> Result<(), EngineError> {
        let view = self.verifier.dispute_view(dispute_id).await?;
        let Some(dispute) = self.disputes.get_mut(&dispute_id) else {
            return Ok(());
        };
        let party = dispute.party;

        match view.state {
            DisputeState::Ended { winner } => {
                dispute.status = DisputeStatus::Resolved(winner);
            }
            DisputeState::Bisecting { .. } if view.revealed(party).is_some() => {
                dispute.status = DisputeStatus::Waiting;
            }
            DisputeState::Bisecting { level } => {
                let path = view.path(party);
                let index = dispute
                    .locate(level, path)
                    .ok_or(DisputeError::InvalidPath { path })?;
                let pair = dispute.tree.node(level, index).pair();
                dispute.status = DisputeStatus::ResponseDue;
                debug!(%dispute_id, %party, level, index, "revealing pair");
                self.verifier
                    .respond(self.wallet.reserve_nonce(), dispute_id, pair)
                    .await?;
                dispute.index = index;
                dispute.status = DisputeStatus::Waiting;
            }
            DisputeState::LeafReached => {
                if dispute.status == DisputeStatus::ProofSubmitted {
                    return Ok(());
                }
                let execution = self
                    .executions
                    .get(&dispute.execution_id)
                    .ok_or(VerifierError::UnknownExecution(dispute.execution_id))?;
                let leaf = view.revealed(party).unwrap_or(NodePair::ZERO);
                if leaf.is_zero() || dispute.index >= execution.merkelizer.steps().len() {
                    debug!(%dispute_id, %party, "no step to prove at the disputed leaf");
                    dispute.status = DisputeStatus::Waiting;
                    return Ok(());
                }

                let (proofs, input) = ProofHelper::construct_proof(
                    &execution.merkelizer,
                    &execution.fragments,
                    dispute.index,
                )?;
                dispute.status = DisputeStatus::ResponseDue;
                info!(%dispute_id, %party, leaf = dispute.index, "submitting one-step proof");
                self.verifier
                    .submit_proof(self.wallet.reserve_nonce(), dispute_id, proofs, input)
                    .await?;
                dispute.status = DisputeStatus::ProofSubmitted;
            }
        }
        Ok(())
    }
}
