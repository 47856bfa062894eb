use serde::{Deserialize, Serialize};

/// Fault classification committed with every execution step.
///
/// A non-zero code halts execution, but the faulting step is still part of the trace and is
/// reasoned about by the dispute protocol exactly like a successful one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrNo {
    /// The step completed normally.
    #[default]
    NoError = 0x00,
    /// The instruction would grow the stack beyond 1024 elements.
    StackOverflow = 0x01,
    /// The instruction needs more stack elements than there are.
    StackUnderflow = 0x02,
    /// A read went past the end of a bounded buffer (e.g. the return data).
    IndexOutOfBounds = 0x03,
    /// The byte at `pc` is not a known instruction.
    InvalidOpcode = 0x04,
    /// `JUMP`/`JUMPI` target is not a `JUMPDEST`.
    InvalidJumpDestination = 0x05,
    /// The instruction exists but is outside of the single-frame execution model.
    InstructionNotSupported = 0x06,
    /// Execution ended with `REVERT`.
    StateReverted = 0x07,
    /// A value transfer was requested without any balance to draw from.
    InsufficientFunds = 0x08,
    /// Contract creation would collide with an existing account.
    ContractCreationCollision = 0x09,
    /// Contract creation would exceed the code size limit.
    MaxCodeSizeExceeded = 0x0a,
    /// A state-changing operation was attempted in a read-only context.
    IllegalWriteOperation = 0x0b,
    /// A call targeted a precompile that is not modelled.
    PrecompileNotImplemented = 0x0c,
    /// Not enough gas to complete the instruction.
    OutOfGas = 0x0d,
    /// Resource ceiling hit inside the interpreter (e.g. the memory word limit).
    InternalError = 0xff,
}

impl ErrNo {
    /// Numeric code of this fault.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for anything other than [`Self::NoError`].
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::NoError)
    }

    /// Decodes a numeric fault code.
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::NoError,
            0x01 => Self::StackOverflow,
            0x02 => Self::StackUnderflow,
            0x03 => Self::IndexOutOfBounds,
            0x04 => Self::InvalidOpcode,
            0x05 => Self::InvalidJumpDestination,
            0x06 => Self::InstructionNotSupported,
            0x07 => Self::StateReverted,
            0x08 => Self::InsufficientFunds,
            0x09 => Self::ContractCreationCollision,
            0x0a => Self::MaxCodeSizeExceeded,
            0x0b => Self::IllegalWriteOperation,
            0x0c => Self::PrecompileNotImplemented,
            0x0d => Self::OutOfGas,
            0xff => Self::InternalError,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ErrNo {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{self:?} (0x{:02x})", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 0..=u8::MAX {
            if let Some(errno) = ErrNo::from_code(code) {
                assert_eq!(errno.code(), code);
            }
        }
        assert!(!ErrNo::NoError.is_error());
        assert!(ErrNo::OutOfGas.is_error());
        assert_eq!(ErrNo::from_code(0x0e), None);
    }
}
