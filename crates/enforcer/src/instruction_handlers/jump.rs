use enforcer_interface::{ErrNo, Opcode};
use primitive_types::U256;

use super::common::boilerplate;
use crate::{
    instruction::{ExecutionStatus, Handler, Instruction},
    step::Effects,
    VirtualMachine, World,
};

/// Moves `pc` to `target`, which must be a `JUMPDEST` outside of `PUSH` data.
fn jump_to<W: World>(vm: &mut VirtualMachine<W>, target: U256) -> Result<(), ErrNo> {
    if target.bits() > 64 {
        return Err(ErrNo::InvalidJumpDestination);
    }
    let target = target.as_usize();
    if !vm.program.is_jump_destination(target) {
        return Err(ErrNo::InvalidJumpDestination);
    }
    vm.state.pc = target;
    Ok(())
}

fn jump<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [target] = vm.state.stack.pop();
        jump_to(vm, target)
    })
}

fn jumpi<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [target, condition] = vm.state.stack.pop();
        if condition.is_zero() {
            Ok(())
        } else {
            jump_to(vm, target)
        }
    })
}

fn jumpdest<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |_, _| Ok(()))
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_jump(opcode: Opcode) -> Self {
        let handler: Handler<W> = match opcode {
            Opcode::Jump => jump::<W>,
            Opcode::JumpI => jumpi::<W>,
            Opcode::JumpDest => jumpdest::<W>,
            _ => return Self::from_unsupported(opcode),
        };
        Self { handler, opcode }
    }
}
