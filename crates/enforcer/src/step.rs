use std::{collections::BTreeSet, ops::Range};

use enforcer_interface::{ErrNo, Opcode};
use primitive_types::{H256, U256};

use crate::state::ExecutionState;

/// Result of executing exactly one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStep<W = ()> {
    /// Program counter of the executed instruction.
    pub executed_pc: usize,
    /// Executed instruction; `None` for bytes that do not decode.
    pub opcode: Option<Opcode>,
    /// Fault raised by the instruction.
    pub errno: ErrNo,
    /// Stack elements the instruction consumed or inspected, bottom first.
    pub compact_stack: Vec<U256>,
    /// Memory bytes read.
    pub mem_read: Option<Range<usize>>,
    /// Memory bytes written.
    pub mem_write: Option<Range<usize>>,
    /// Call data bytes read.
    pub call_data_read: Option<Range<usize>>,
    /// Code words read by the instruction plus the word holding the next `pc`, by slot.
    pub raw_codes: Vec<(usize, H256)>,
    /// A one-step proof of this step must carry the memory.
    pub is_memory_required: bool,
    /// A one-step proof of this step must carry the call data.
    pub is_call_data_required: bool,
    /// A one-step proof of this step must carry the ledger snapshot.
    pub is_custom_environment_required: bool,
    /// State after the step.
    pub state: ExecutionState<W>,
}

impl<W> ExecutionStep<W> {
    /// Full stack after the step, bottom first.
    pub fn stack(&self) -> &[U256] {
        self.state.stack.values()
    }

    /// Checks whether the step ended the execution.
    pub fn is_final(&self) -> bool {
        self.errno.is_error() || self.opcode.is_some_and(Opcode::is_halting)
    }
}

/// Side effects of an instruction other than the state change, collected while it runs.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub(crate) pc: usize,
    pub(crate) mem_read: Option<Range<usize>>,
    pub(crate) mem_write: Option<Range<usize>>,
    pub(crate) call_data_read: Option<Range<usize>>,
    pub(crate) code_slots: BTreeSet<usize>,
}

impl Effects {
    pub(crate) fn new(pc: usize) -> Self {
        Self {
            pc,
            ..Self::default()
        }
    }

    /// Records that the code bytes in `range` were read, clipped to `code_len`.
    pub(crate) fn read_code(&mut self, range: Range<usize>, code_len: usize) {
        let end = range.end.min(code_len);
        if range.start < end {
            self.code_slots.extend(range.start / 32..=(end - 1) / 32);
        }
    }
}
