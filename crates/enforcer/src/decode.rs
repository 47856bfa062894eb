use std::sync::Arc;

use enforcer_interface::Opcode;

use crate::{
    instruction::{Handler, Instruction},
    instruction_handlers::{
        binop, exp, ternop, unop, Add, AddMod, And, Byte, Div, Gt, IsEqual, IsZero, Lt, Mod, Mul,
        MulMod, Not, Or, SDiv, SGt, SLt, SMod, Sar, Shl, Shr, SignExtend, Sub, Xor,
    },
    Program, World,
};

/// Decodes every byte of `program` once; entry `pc` is the instruction starting there, or `None`
/// for a byte that is not a defined opcode. Bytes inside `PUSH` data decode as well but are never
/// reached.
pub(crate) fn decode_program<W: World>(program: &Program) -> Arc<[Option<Instruction<W>>]> {
    program
        .code()
        .iter()
        .map(|&byte| Opcode::from_byte(byte).map(decode::<W>))
        .collect()
}

/// Maps an opcode to its handler.
///
/// Every defined opcode decodes; instructions outside of the execution model get a handler that
/// faults with `InstructionNotSupported`.
pub(crate) fn decode<W: World>(opcode: Opcode) -> Instruction<W> {
    if !opcode.is_supported() {
        return Instruction::from_unsupported(opcode);
    }

    let arithmetic: Option<Handler<W>> = match opcode {
        Opcode::Add => Some(binop::<W, Add>),
        Opcode::Mul => Some(binop::<W, Mul>),
        Opcode::Sub => Some(binop::<W, Sub>),
        Opcode::Div => Some(binop::<W, Div>),
        Opcode::SDiv => Some(binop::<W, SDiv>),
        Opcode::Mod => Some(binop::<W, Mod>),
        Opcode::SMod => Some(binop::<W, SMod>),
        Opcode::AddMod => Some(ternop::<W, AddMod>),
        Opcode::MulMod => Some(ternop::<W, MulMod>),
        Opcode::Exp => Some(exp::<W>),
        Opcode::SignExtend => Some(binop::<W, SignExtend>),
        Opcode::Lt => Some(binop::<W, Lt>),
        Opcode::Gt => Some(binop::<W, Gt>),
        Opcode::SLt => Some(binop::<W, SLt>),
        Opcode::SGt => Some(binop::<W, SGt>),
        Opcode::Eq => Some(binop::<W, IsEqual>),
        Opcode::IsZero => Some(unop::<W, IsZero>),
        Opcode::And => Some(binop::<W, And>),
        Opcode::Or => Some(binop::<W, Or>),
        Opcode::Xor => Some(binop::<W, Xor>),
        Opcode::Not => Some(unop::<W, Not>),
        Opcode::Byte => Some(binop::<W, Byte>),
        Opcode::Shl => Some(binop::<W, Shl>),
        Opcode::Shr => Some(binop::<W, Shr>),
        Opcode::Sar => Some(binop::<W, Sar>),
        _ => None,
    };
    if let Some(handler) = arithmetic {
        return Instruction { handler, opcode };
    }

    match opcode {
        Opcode::Sha3
        | Opcode::CallDataLoad
        | Opcode::CallDataCopy
        | Opcode::CodeCopy
        | Opcode::ReturnDataCopy
        | Opcode::MLoad
        | Opcode::MStore
        | Opcode::MStore8 => Instruction::from_memory_access(opcode),
        Opcode::Jump | Opcode::JumpI | Opcode::JumpDest => Instruction::from_jump(opcode),
        Opcode::Call | Opcode::StaticCall => Instruction::from_call(opcode),
        Opcode::Stop | Opcode::Return | Opcode::Revert | Opcode::Invalid => {
            Instruction::from_ret(opcode)
        }
        _ if opcode.log_topics().is_some() => Instruction::from_log(opcode),
        _ if opcode == Opcode::Pop
            || opcode.immediate_size() > 0
            || opcode.dup_depth().is_some()
            || opcode.swap_depth().is_some() =>
        {
            Instruction::from_stack_op(opcode)
        }
        _ => Instruction::from_context(opcode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_decodes_to_itself() {
        for byte in 0..=u8::MAX {
            if let Some(opcode) = Opcode::from_byte(byte) {
                assert_eq!(decode::<()>(opcode).opcode, opcode);
            }
        }
    }

    #[test]
    fn programs_decode_byte_by_byte() {
        // PUSH1 0x0c ADD <undefined>
        let program = Program::new(vec![0x60, 0x0c, 0x01, 0x0c]);
        let opcodes: Vec<_> = decode_program::<()>(&program)
            .iter()
            .map(|instruction| instruction.map(|instruction| instruction.opcode))
            .collect();
        assert_eq!(opcodes, [Some(Opcode::Push1), None, Some(Opcode::Add), None]);
    }
}
