use std::sync::Arc;

use enforcer_interface::{CallContext, ErrNo, Opcode};
use primitive_types::H256;
use tracing::trace;

use crate::{
    config::Settings,
    decode::{decode, decode_program},
    instruction::{ExecutionStatus, Instruction},
    rollback::Rollback,
    state::{CallData, ExecutionState},
    step::{Effects, ExecutionStep},
    Program, World,
};

/// Single-frame interpreter producing one [`ExecutionStep`] per executed instruction.
///
/// The machine is an [`Iterator`] over steps; it ends after the first halting or faulting step.
/// It can start from scratch ([`Self::new()`]) or from any committed state ([`Self::resume()`]),
/// which is how one-step proofs are re-executed.
#[derive(Debug)]
pub struct VirtualMachine<W = ()> {
    pub(crate) program: Program,
    /// Handlers of `program`, decoded once per machine and indexed by `pc`.
    instructions: Arc<[Option<Instruction<W>>]>,
    pub(crate) call_data: CallData,
    pub(crate) context: Arc<CallContext>,
    pub(crate) settings: Settings,
    pub(crate) state: ExecutionState<W>,
    halted: bool,
}

impl<W: World> VirtualMachine<W> {
    /// Creates a machine at `pc` 0 with an empty stack and memory and `settings.gas_limit` gas.
    pub fn new(
        program: Program,
        call_data: impl Into<CallData>,
        world: W,
        settings: Settings,
    ) -> Self {
        let state = ExecutionState::new(world, settings.gas_limit);
        Self::resume(program, call_data, state, settings)
    }

    /// Creates a machine continuing from an arbitrary state.
    pub fn resume(
        program: Program,
        call_data: impl Into<CallData>,
        state: ExecutionState<W>,
        settings: Settings,
    ) -> Self {
        Self {
            instructions: decode_program(&program),
            program,
            call_data: call_data.into(),
            context: Arc::default(),
            settings,
            state,
            halted: false,
        }
    }

    /// Sets the values returned by the environment opcodes.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<Arc<CallContext>>) -> Self {
        self.context = context.into();
        self
    }

    /// Executed program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Call data of the execution.
    pub fn call_data(&self) -> &CallData {
        &self.call_data
    }

    /// Current state.
    pub fn state(&self) -> &ExecutionState<W> {
        &self.state
    }

    /// Hash of the current state.
    pub fn state_hash(&self) -> H256 {
        self.state.hash(self.call_data.hash())
    }

    /// Checks whether the machine will produce no more steps.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Runs at most `step_count` steps (0 means until the execution halts).
    pub fn run(&mut self, step_count: usize) -> Vec<ExecutionStep<W>> {
        let limit = if step_count == 0 { usize::MAX } else { step_count };
        self.by_ref().take(limit).collect()
    }

    /// Executes the instruction at `pc`, unless the machine has halted.
    pub fn step(&mut self) -> Option<ExecutionStep<W>> {
        if self.halted {
            None
        } else {
            Some(self.execute_step())
        }
    }

    pub(crate) fn execute_step(&mut self) -> ExecutionStep<W> {
        let pc = self.state.pc;
        let mut effects = Effects::new(pc);
        let instruction = match self.instructions.get(pc) {
            Some(&instruction) => {
                effects.read_code(pc..pc + 1, self.program.len());
                instruction
            }
            // Running off the end of the code behaves as `STOP`.
            None => Some(decode::<W>(Opcode::Stop)),
        };
        let opcode = instruction.map(|instruction| instruction.opcode);
        let compact_stack = self
            .state
            .stack
            .top(opcode.map_or(0, Opcode::stack_inputs))
            .to_vec();

        let result = match instruction {
            Some(instruction) => self.execute(instruction, &mut effects),
            None => {
                self.state.gas_remaining = 0;
                Err(ErrNo::InvalidOpcode)
            }
        };
        let errno = match result {
            Ok(ExecutionStatus::Running) => {
                let next = self.state.pc;
                effects.read_code(next..next + 1, self.program.len());
                ErrNo::NoError
            }
            Ok(ExecutionStatus::Stopped(errno)) => {
                self.state.pc = pc;
                self.halted = true;
                errno
            }
            Err(errno) => {
                trace!(pc, ?opcode, %errno, "instruction faulted");
                self.halted = true;
                errno
            }
        };

        let raw_codes = effects
            .code_slots
            .iter()
            .map(|&slot| (slot, self.program.word(slot)))
            .collect();
        ExecutionStep {
            executed_pc: pc,
            opcode,
            errno,
            compact_stack,
            mem_read: effects.mem_read,
            mem_write: effects.mem_write,
            call_data_read: effects.call_data_read,
            raw_codes,
            is_memory_required: opcode.is_some_and(Opcode::touches_memory),
            is_call_data_required: opcode.is_some_and(Opcode::reads_call_data),
            is_custom_environment_required: opcode.is_some_and(Opcode::uses_custom_environment),
            state: self.state.clone(),
        }
    }

    /// Runs one instruction. A fault consumes all gas and discards every other effect.
    fn execute(
        &mut self,
        instruction: Instruction<W>,
        effects: &mut Effects,
    ) -> Result<ExecutionStatus, ErrNo> {
        let snapshot = self.state.snapshot();
        let result = (instruction.handler)(self, effects, instruction.opcode);
        if result.is_err() {
            self.state.rollback(snapshot);
            self.state.gas_remaining = 0;
        }
        result
    }
}

impl<W: World> Iterator for VirtualMachine<W> {
    type Item = ExecutionStep<W>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}
