use enforcer_interface::{ErrNo, Opcode};
use primitive_types::{H160, U256};

use super::common::boilerplate;
use crate::{
    instruction::{ExecutionStatus, Handler, Instruction},
    step::Effects,
    VirtualMachine, World,
};

pub(crate) fn address_into_u256(address: H160) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

fn context<W: World, Op: ContextOp>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let result = Op::get(vm, effects);
        vm.state.stack.push(result);
        Ok(())
    })
}

/// Environment value pushed by a zero-input instruction.
trait ContextOp {
    fn get<W: World>(vm: &VirtualMachine<W>, effects: &Effects) -> U256;
}

macro_rules! context_op {
    ($name:ident, |$vm:ident, $effects:ident| $body:expr) => {
        #[derive(Debug)]
        struct $name;

        impl ContextOp for $name {
            #[allow(unused_variables)]
            fn get<W: World>($vm: &VirtualMachine<W>, $effects: &Effects) -> U256 {
                $body
            }
        }
    };
}

context_op!(Address, |vm, effects| address_into_u256(vm.context.address));
context_op!(Origin, |vm, effects| address_into_u256(vm.context.origin));
context_op!(Caller, |vm, effects| address_into_u256(vm.context.caller));
context_op!(CallValue, |vm, effects| vm.context.call_value);
context_op!(GasPrice, |vm, effects| vm.context.gas_price);
context_op!(Coinbase, |vm, effects| address_into_u256(vm.context.block.coinbase));
context_op!(Timestamp, |vm, effects| vm.context.block.timestamp);
context_op!(Number, |vm, effects| vm.context.block.number);
context_op!(Difficulty, |vm, effects| vm.context.block.difficulty);
context_op!(GasLimit, |vm, effects| vm.context.block.gas_limit);
context_op!(CodeSize, |vm, effects| vm.program.len().into());
context_op!(CallDataSize, |vm, effects| vm.call_data.bytes().len().into());
context_op!(ReturnDataSize, |vm, effects| vm.state.return_data.len().into());
context_op!(Pc, |vm, effects| effects.pc.into());
context_op!(MSize, |vm, effects| (vm.state.memory.size_words() * 32).into());
context_op!(Gas, |vm, effects| vm.state.gas_remaining.into());

/// Block hashes are not part of the modelled environment; every lookup yields zero.
fn block_hash<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [_number] = vm.state.stack.pop();
        vm.state.stack.push(U256::zero());
        Ok(())
    })
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_context(opcode: Opcode) -> Self {
        let handler: Handler<W> = match opcode {
            Opcode::Address => context::<W, Address>,
            Opcode::Origin => context::<W, Origin>,
            Opcode::Caller => context::<W, Caller>,
            Opcode::CallValue => context::<W, CallValue>,
            Opcode::GasPrice => context::<W, GasPrice>,
            Opcode::Coinbase => context::<W, Coinbase>,
            Opcode::Timestamp => context::<W, Timestamp>,
            Opcode::Number => context::<W, Number>,
            Opcode::Difficulty => context::<W, Difficulty>,
            Opcode::GasLimit => context::<W, GasLimit>,
            Opcode::CodeSize => context::<W, CodeSize>,
            Opcode::CallDataSize => context::<W, CallDataSize>,
            Opcode::ReturnDataSize => context::<W, ReturnDataSize>,
            Opcode::Pc => context::<W, Pc>,
            Opcode::MSize => context::<W, MSize>,
            Opcode::Gas => context::<W, Gas>,
            Opcode::BlockHash => block_hash::<W>,
            _ => return Self::from_unsupported(opcode),
        };
        Self { handler, opcode }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_right_aligned() {
        let address = H160::from_low_u64_be(0xabcd);
        assert_eq!(address_into_u256(address), U256::from(0xabcd));
    }
}
