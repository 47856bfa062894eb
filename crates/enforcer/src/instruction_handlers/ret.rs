use enforcer_interface::{ErrNo, Opcode};

use super::common::full_boilerplate;
use crate::{
    instruction::{ExecutionStatus, Handler, Instruction},
    step::Effects,
    VirtualMachine, World,
};

fn stop<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    full_boilerplate(vm, effects, opcode, |_, _| {
        Ok(ExecutionStatus::Stopped(ErrNo::NoError))
    })
}

/// `RETURN` and `REVERT`: the memory range becomes the return data.
fn ret<W: World, const REVERT: bool>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    full_boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset, size] = vm.state.stack.pop();
        let range = vm.expand_memory(offset, size)?;
        vm.state.return_data = range
            .as_ref()
            .map_or_else(Vec::new, |range| vm.state.memory.read_range(range.clone()));
        effects.mem_read = range;
        Ok(ExecutionStatus::Stopped(if REVERT {
            ErrNo::StateReverted
        } else {
            ErrNo::NoError
        }))
    })
}

/// The designated invalid instruction. Faults before any checks or charges.
fn invalid<W: World>(
    _vm: &mut VirtualMachine<W>,
    _effects: &mut Effects,
    _opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    Err(ErrNo::InvalidOpcode)
}

/// Instructions that need more than a single storage-less frame.
fn unsupported<W: World>(
    _vm: &mut VirtualMachine<W>,
    _effects: &mut Effects,
    _opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    Err(ErrNo::InstructionNotSupported)
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_ret(opcode: Opcode) -> Self {
        let handler: Handler<W> = match opcode {
            Opcode::Stop => stop::<W>,
            Opcode::Return => ret::<W, false>,
            Opcode::Revert => ret::<W, true>,
            Opcode::Invalid => invalid::<W>,
            _ => unsupported::<W>,
        };
        Self { handler, opcode }
    }

    pub(crate) fn from_unsupported(opcode: Opcode) -> Self {
        Self {
            handler: unsupported::<W>,
            opcode,
        }
    }
}
