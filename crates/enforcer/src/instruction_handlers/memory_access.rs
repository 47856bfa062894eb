use std::ops::Range;

use enforcer_interface::{ErrNo, Opcode};
use primitive_types::U256;

use super::common::boilerplate;
use crate::{
    gas::clamp,
    hash::{h256_to_u256, keccak256},
    instruction::{ExecutionStatus, Handler, Instruction},
    step::Effects,
    VirtualMachine, World,
};

/// Copies `size` bytes of `source` starting at `offset`; bytes past the end read as zero.
///
/// Also returns the part of `source` that was actually read, if any.
fn read_padded(source: &[u8], offset: usize, size: usize) -> (Vec<u8>, Option<Range<usize>>) {
    let mut out = vec![0; size];
    let end = offset.saturating_add(size).min(source.len());
    if offset >= end {
        return (out, None);
    }
    out[..end - offset].copy_from_slice(&source[offset..end]);
    (out, Some(offset..end))
}

fn mload<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset] = vm.state.stack.pop();
        let range = vm.expand_memory(offset, U256::from(32))?;
        let value = range
            .as_ref()
            .map_or_else(U256::zero, |range| vm.state.memory.read_u256(range.start));
        vm.state.stack.push(value);
        effects.mem_read = range;
        Ok(())
    })
}

fn mstore<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset, value] = vm.state.stack.pop();
        let range = vm.expand_memory(offset, U256::from(32))?;
        if let Some(range) = &range {
            vm.state.memory.write_u256(range.start, value);
        }
        effects.mem_write = range;
        Ok(())
    })
}

fn mstore8<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset, value] = vm.state.stack.pop();
        let range = vm.expand_memory(offset, U256::one())?;
        if let Some(range) = &range {
            vm.state.memory.write(range.start, &[value.byte(0)]);
        }
        effects.mem_write = range;
        Ok(())
    })
}

fn sha3<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset, size] = vm.state.stack.pop();
        let range = vm.expand_memory(offset, size)?;
        let data = match &range {
            Some(range) => {
                vm.use_word_gas(6, range.len())?;
                vm.state.memory.read_range(range.clone())
            }
            None => Vec::new(),
        };
        vm.state.stack.push(h256_to_u256(&keccak256(&data)));
        effects.mem_read = range;
        Ok(())
    })
}

fn call_data_load<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [offset] = vm.state.stack.pop();
        let data = vm.call_data.bytes();
        let (word, read) = read_padded(data, clamp(offset, data.len()), 32);
        vm.state.stack.push(U256::from_big_endian(&word));
        effects.call_data_read = read;
        Ok(())
    })
}

/// Source buffer of a `*COPY` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopySource {
    CallData,
    Code,
    ReturnData,
}

fn call_data_copy<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    copy(vm, effects, opcode, CopySource::CallData)
}

fn code_copy<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    copy(vm, effects, opcode, CopySource::Code)
}

fn return_data_copy<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    copy(vm, effects, opcode, CopySource::ReturnData)
}

/// Copies `size` bytes from `source` into memory. Return data must cover the whole source range.
fn copy<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
    source: CopySource,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, effects| {
        let [mem_offset, source_offset, size] = vm.state.stack.pop();
        if source == CopySource::ReturnData {
            let end = source_offset.checked_add(size);
            if end.map_or(true, |end| end > U256::from(vm.state.return_data.len())) {
                return Err(ErrNo::IndexOutOfBounds);
            }
        }

        let Some(range) = vm.expand_memory(mem_offset, size)? else {
            return Ok(());
        };
        vm.use_word_gas(3, range.len())?;

        let data = match source {
            CopySource::CallData => {
                let data = vm.call_data.bytes();
                let (bytes, read) =
                    read_padded(data, clamp(source_offset, data.len()), range.len());
                effects.call_data_read = read;
                bytes
            }
            CopySource::Code => {
                let code_len = vm.program.len();
                let start = clamp(source_offset, code_len);
                let code_range = start..start + range.len();
                effects.read_code(code_range.clone(), code_len);
                vm.program.read(code_range)
            }
            CopySource::ReturnData => {
                let start = source_offset.as_usize();
                vm.state.return_data[start..start + range.len()].to_vec()
            }
        };
        vm.state.memory.write(range.start, &data);
        effects.mem_write = Some(range);
        Ok(())
    })
}

impl<W: World> Instruction<W> {
    pub(crate) fn from_memory_access(opcode: Opcode) -> Self {
        let handler: Handler<W> = match opcode {
            Opcode::MLoad => mload::<W>,
            Opcode::MStore => mstore::<W>,
            Opcode::MStore8 => mstore8::<W>,
            Opcode::Sha3 => sha3::<W>,
            Opcode::CallDataLoad => call_data_load::<W>,
            Opcode::CallDataCopy => call_data_copy::<W>,
            Opcode::CodeCopy => code_copy::<W>,
            Opcode::ReturnDataCopy => return_data_copy::<W>,
            _ => return Self::from_unsupported(opcode),
        };
        Self { handler, opcode }
    }
}
