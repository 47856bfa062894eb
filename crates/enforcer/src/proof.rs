//! One-step proofs: extracting the witness of a disputed step and re-executing it.

use std::sync::Arc;

use enforcer_interface::{
    CallContext, CodeFragment, ErrNo, ExecutionInput, NodePair, Opcode, Proofs,
};
use primitive_types::H256;
use tracing::debug;

use crate::{
    errors::ProofError,
    hash::ZERO,
    memory::Memory,
    merkle::{FragmentTree, Merkelizer},
    stack::{Stack, StackBase, STACK_LIMIT},
    state::{CallData, ExecutionState},
    Program, Settings, TokenBag, VirtualMachine, World,
};

/// Result of re-executing one step from a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Hash of the state reconstructed from the proof.
    pub pre_hash: H256,
    /// Hash of the state after the step.
    pub post_hash: H256,
    /// Executed instruction; `None` for an undefined byte.
    pub opcode: Option<Opcode>,
    /// Fault raised by the step.
    pub errno: ErrNo,
}

/// Builds and checks one-step proofs.
#[derive(Debug)]
pub struct ProofHelper;

impl ProofHelper {
    /// Extracts the witness needed to re-execute step `leaf` of `merkelizer`.
    ///
    /// Components the step needs are sent in full and their hash slot is [`ZERO`]; everything
    /// else is committed by hash only.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::NotALeaf`] if there is no step `leaf`, and
    /// [`ProofError::CodeHashMismatch`] if `fragments` is not a tree over the executed code.
    pub fn construct_proof<W: World>(
        merkelizer: &Merkelizer<W>,
        fragments: &FragmentTree,
        leaf: usize,
    ) -> Result<(Proofs, ExecutionInput), ProofError> {
        let step = merkelizer
            .steps()
            .get(leaf)
            .ok_or(ProofError::NotALeaf(leaf))?;
        let pre = merkelizer
            .state_before(leaf)
            .ok_or(ProofError::NotALeaf(leaf))?;
        let call_data = merkelizer.call_data();

        let (base, compact) = pre.stack.split_top(step.compact_stack.len());
        let mut proofs = Proofs {
            stack_hash: base.hash,
            ..Proofs::default()
        };
        let mut input = ExecutionInput {
            pc: pre.pc as u64,
            gas_remaining: pre.gas_remaining,
            stack: compact.to_vec(),
            stack_size: pre.stack.len() as u64,
            mem_size: pre.memory.size_words() as u64,
            return_data: pre.return_data.clone(),
            log_hash: pre.log_hash,
            ..ExecutionInput::default()
        };

        if step.is_memory_required {
            input.mem = pre.memory.words();
        } else {
            proofs.mem_hash = pre.memory.hash();
        }
        if step.is_call_data_required {
            input.data = call_data.bytes().to_vec();
        } else {
            proofs.data_hash = call_data.hash();
        }
        if step.is_custom_environment_required {
            input.custom_environment = Some(pre.world.records());
        } else {
            proofs.custom_environment_hash = pre.world.environment_hash();
        }

        input.code_fragments = step
            .raw_codes
            .iter()
            .map(|&(slot, _)| {
                fragments
                    .calculate_proof(slot)
                    .map_err(|_| ProofError::CodeHashMismatch { slot: slot as u32 })
            })
            .collect::<Result<_, _>>()?;
        Ok((proofs, input))
    }

    /// Reconstructs the pre-state from a proof and executes exactly one instruction on it.
    ///
    /// `program` is the registered program; only its length and jump table are used; code is
    /// read exclusively from the authenticated fragments.
    ///
    /// # Errors
    ///
    /// Returns an error if a fragment does not authenticate against `code_root`, if the proof
    /// lacks a component or code word the instruction at `pc` needs, or if the claimed stack or
    /// memory size exceeds the machine limits.
    pub fn verify_step(
        program: &Program,
        code_root: H256,
        context: &CallContext,
        settings: &Settings,
        proofs: &Proofs,
        input: &ExecutionInput,
    ) -> Result<StepOutcome, ProofError> {
        for fragment in &input.code_fragments {
            if !FragmentTree::verify_proof(fragment, program.len(), code_root) {
                return Err(ProofError::CodeHashMismatch {
                    slot: fragment.slot,
                });
            }
        }
        let sparse = program.with_fragments(
            input
                .code_fragments
                .iter()
                .map(|fragment| (fragment.slot as usize, fragment.value)),
        );

        let pc = usize::try_from(input.pc).unwrap_or(usize::MAX);
        let opcode = if pc < program.len() {
            if !has_slot(&input.code_fragments, pc / 32) {
                return Err(ProofError::MissingWitness("code"));
            }
            Opcode::from_byte(sparse.byte(pc))
        } else {
            Some(Opcode::Stop)
        };
        if let Some(opcode) = opcode {
            if opcode.touches_memory() && proofs.mem_hash != ZERO {
                return Err(ProofError::MissingWitness("memory"));
            }
            if opcode.reads_call_data() && proofs.data_hash != ZERO {
                return Err(ProofError::MissingWitness("call data"));
            }
            if opcode.uses_custom_environment() && input.custom_environment.is_none() {
                return Err(ProofError::MissingWitness("custom environment"));
            }
        }

        let stack_size = usize::try_from(input.stack_size).unwrap_or(usize::MAX);
        if stack_size > STACK_LIMIT {
            return Err(ProofError::WitnessOutOfRange {
                component: "stack",
                size: input.stack_size,
                limit: STACK_LIMIT as u64,
            });
        }
        let mem_words = if proofs.mem_hash == ZERO {
            input.mem.len() as u64
        } else {
            input.mem_size
        };
        if mem_words > settings.max_memory_words as u64 {
            return Err(ProofError::WitnessOutOfRange {
                component: "memory",
                size: mem_words,
                limit: settings.max_memory_words as u64,
            });
        }
        let expected = opcode.map_or(0, Opcode::stack_inputs).min(stack_size);
        if input.stack.len() != expected {
            return Err(ProofError::CompactStackMismatch {
                expected,
                actual: input.stack.len(),
            });
        }

        let (call_data, state) = Self::pre_state(proofs, input, pc, stack_size);
        let pre_hash = state.hash(call_data.hash());
        let mut vm = VirtualMachine::resume(sparse, call_data, state, *settings)
            .with_context(context.clone());
        let step = vm.execute_step();
        // Every code word the step read has to be authenticated, not only the one at `pc`.
        if let Some(&(slot, _)) = step.raw_codes.iter().find(|&&(slot, _)| {
            slot < program.word_count() && !has_slot(&input.code_fragments, slot)
        }) {
            debug!(slot, pc, "step read an unproven code word");
            return Err(ProofError::MissingWitness("code"));
        }
        Ok(StepOutcome {
            pre_hash,
            post_hash: vm.state_hash(),
            opcode: step.opcode,
            errno: step.errno,
        })
    }

    /// [`Self::verify_step()`] that additionally requires the reconstructed pre-state to be the
    /// left side of `leaf`.
    ///
    /// # Errors
    ///
    /// In addition to the errors of [`Self::verify_step()`], returns
    /// [`ProofError::PreStateMismatch`] if the proof starts from another state.
    pub fn verify_leaf(
        program: &Program,
        code_root: H256,
        context: &CallContext,
        settings: &Settings,
        proofs: &Proofs,
        input: &ExecutionInput,
        leaf: &NodePair,
    ) -> Result<StepOutcome, ProofError> {
        let outcome = Self::verify_step(program, code_root, context, settings, proofs, input)?;
        if outcome.pre_hash != leaf.left {
            return Err(ProofError::PreStateMismatch {
                expected: leaf.left,
                computed: outcome.pre_hash,
            });
        }
        Ok(outcome)
    }

    fn pre_state(
        proofs: &Proofs,
        input: &ExecutionInput,
        pc: usize,
        stack_size: usize,
    ) -> (CallData, ExecutionState<TokenBag>) {
        let stack = Stack::with_base(
            input.stack.clone(),
            StackBase {
                hash: proofs.stack_hash,
                size: stack_size - input.stack.len(),
            },
        );
        let memory = if proofs.mem_hash == ZERO {
            Memory::from_words(&input.mem)
        } else {
            let words = usize::try_from(input.mem_size).unwrap_or(usize::MAX);
            Memory::elided(proofs.mem_hash, words)
        };
        let call_data = if proofs.data_hash == ZERO {
            CallData::new(input.data.clone())
        } else {
            CallData::elided(proofs.data_hash)
        };
        let world = match &input.custom_environment {
            Some(records) => TokenBag::new(records.iter().cloned()),
            None if proofs.custom_environment_hash == ZERO => TokenBag::default(),
            None => TokenBag::elided(proofs.custom_environment_hash),
        };

        let state = ExecutionState {
            pc,
            stack,
            memory,
            return_data: input.return_data.clone(),
            log_hash: input.log_hash,
            gas_remaining: input.gas_remaining,
            world: Arc::new(world),
        };
        (call_data, state)
    }
}

fn has_slot(fragments: &[CodeFragment], slot: usize) -> bool {
    fragments
        .iter()
        .any(|fragment| fragment.slot as usize == slot)
}
