use std::fmt;

use enforcer_interface::{ErrNo, Opcode};

use crate::{step::Effects, vm::VirtualMachine};

/// Outcome of an instruction that did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionStatus {
    Running,
    /// Execution halted; `StateReverted` for `REVERT`, `NoError` otherwise.
    Stopped(ErrNo),
}

/// Decoded instruction: an opcode and the handler executing it.
pub(crate) struct Instruction<W> {
    pub(crate) handler: Handler<W>,
    pub(crate) opcode: Opcode,
}

impl<W> Clone for Instruction<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for Instruction<W> {}

impl<W> fmt::Debug for Instruction<W> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Instruction")
            .field("opcode", &self.opcode)
            .finish_non_exhaustive()
    }
}

/// A fault is returned as `Err` and makes the interpreter roll the state back.
pub(crate) type Handler<W> =
    fn(&mut VirtualMachine<W>, &mut Effects, Opcode) -> Result<ExecutionStatus, ErrNo>;
