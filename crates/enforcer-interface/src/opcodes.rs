use serde::{Deserialize, Serialize};

/// Declares the [`Opcode`] enumeration together with its static metadata.
///
/// Every row reads `byte => Variant("NAME", stack inputs, stack outputs, base gas)`.
macro_rules! define_opcodes {
    ($(
        $byte:literal =>
            $variant:ident($name:literal, $inputs:literal, $outputs:literal, $gas:literal);
    )*) => {
        /// Instructions known to the interpreter, including the ones it refuses to execute.
        ///
        /// Bytes that are not listed here decode to nothing and fault with
        /// [`ErrNo::InvalidOpcode`](crate::ErrNo::InvalidOpcode).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                #[doc = concat!("`", $name, "` (`", stringify!($byte), "`).")]
                $variant = $byte,
            )*
        }

        impl Opcode {
            /// Decodes a single code byte.
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Mnemonic used in traces and logs.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// Number of stack elements the instruction reads. For `DUPn` this is `n`
            /// and for `SWAPn` it is `n + 1`, i.e. the depth of the deepest element touched.
            pub const fn stack_inputs(self) -> usize {
                match self {
                    $(Self::$variant => $inputs,)*
                }
            }

            /// Number of stack elements present in place of the inputs after execution.
            pub const fn stack_outputs(self) -> usize {
                match self {
                    $(Self::$variant => $outputs,)*
                }
            }

            /// Static gas charged before any dynamic component.
            pub const fn base_gas(self) -> u64 {
                match self {
                    $(Self::$variant => $gas,)*
                }
            }
        }
    };
}

define_opcodes! {
    0x00 => Stop("STOP", 0, 0, 0);
    0x01 => Add("ADD", 2, 1, 3);
    0x02 => Mul("MUL", 2, 1, 5);
    0x03 => Sub("SUB", 2, 1, 3);
    0x04 => Div("DIV", 2, 1, 5);
    0x05 => SDiv("SDIV", 2, 1, 5);
    0x06 => Mod("MOD", 2, 1, 5);
    0x07 => SMod("SMOD", 2, 1, 5);
    0x08 => AddMod("ADDMOD", 3, 1, 8);
    0x09 => MulMod("MULMOD", 3, 1, 8);
    0x0a => Exp("EXP", 2, 1, 10);
    0x0b => SignExtend("SIGNEXTEND", 2, 1, 5);
    0x10 => Lt("LT", 2, 1, 3);
    0x11 => Gt("GT", 2, 1, 3);
    0x12 => SLt("SLT", 2, 1, 3);
    0x13 => SGt("SGT", 2, 1, 3);
    0x14 => Eq("EQ", 2, 1, 3);
    0x15 => IsZero("ISZERO", 1, 1, 3);
    0x16 => And("AND", 2, 1, 3);
    0x17 => Or("OR", 2, 1, 3);
    0x18 => Xor("XOR", 2, 1, 3);
    0x19 => Not("NOT", 1, 1, 3);
    0x1a => Byte("BYTE", 2, 1, 3);
    0x1b => Shl("SHL", 2, 1, 3);
    0x1c => Shr("SHR", 2, 1, 3);
    0x1d => Sar("SAR", 2, 1, 3);
    0x20 => Sha3("SHA3", 2, 1, 30);
    0x30 => Address("ADDRESS", 0, 1, 2);
    0x31 => Balance("BALANCE", 1, 1, 400);
    0x32 => Origin("ORIGIN", 0, 1, 2);
    0x33 => Caller("CALLER", 0, 1, 2);
    0x34 => CallValue("CALLVALUE", 0, 1, 2);
    0x35 => CallDataLoad("CALLDATALOAD", 1, 1, 3);
    0x36 => CallDataSize("CALLDATASIZE", 0, 1, 2);
    0x37 => CallDataCopy("CALLDATACOPY", 3, 0, 3);
    0x38 => CodeSize("CODESIZE", 0, 1, 2);
    0x39 => CodeCopy("CODECOPY", 3, 0, 3);
    0x3a => GasPrice("GASPRICE", 0, 1, 2);
    0x3b => ExtCodeSize("EXTCODESIZE", 1, 1, 700);
    0x3c => ExtCodeCopy("EXTCODECOPY", 4, 0, 700);
    0x3d => ReturnDataSize("RETURNDATASIZE", 0, 1, 2);
    0x3e => ReturnDataCopy("RETURNDATACOPY", 3, 0, 3);
    0x3f => ExtCodeHash("EXTCODEHASH", 1, 1, 400);
    0x40 => BlockHash("BLOCKHASH", 1, 1, 20);
    0x41 => Coinbase("COINBASE", 0, 1, 2);
    0x42 => Timestamp("TIMESTAMP", 0, 1, 2);
    0x43 => Number("NUMBER", 0, 1, 2);
    0x44 => Difficulty("DIFFICULTY", 0, 1, 2);
    0x45 => GasLimit("GASLIMIT", 0, 1, 2);
    0x50 => Pop("POP", 1, 0, 2);
    0x51 => MLoad("MLOAD", 1, 1, 3);
    0x52 => MStore("MSTORE", 2, 0, 3);
    0x53 => MStore8("MSTORE8", 2, 0, 3);
    0x54 => SLoad("SLOAD", 1, 1, 200);
    0x55 => SStore("SSTORE", 2, 0, 0);
    0x56 => Jump("JUMP", 1, 0, 8);
    0x57 => JumpI("JUMPI", 2, 0, 10);
    0x58 => Pc("PC", 0, 1, 2);
    0x59 => MSize("MSIZE", 0, 1, 2);
    0x5a => Gas("GAS", 0, 1, 2);
    0x5b => JumpDest("JUMPDEST", 0, 0, 1);
    0x60 => Push1("PUSH1", 0, 1, 3);
    0x61 => Push2("PUSH2", 0, 1, 3);
    0x62 => Push3("PUSH3", 0, 1, 3);
    0x63 => Push4("PUSH4", 0, 1, 3);
    0x64 => Push5("PUSH5", 0, 1, 3);
    0x65 => Push6("PUSH6", 0, 1, 3);
    0x66 => Push7("PUSH7", 0, 1, 3);
    0x67 => Push8("PUSH8", 0, 1, 3);
    0x68 => Push9("PUSH9", 0, 1, 3);
    0x69 => Push10("PUSH10", 0, 1, 3);
    0x6a => Push11("PUSH11", 0, 1, 3);
    0x6b => Push12("PUSH12", 0, 1, 3);
    0x6c => Push13("PUSH13", 0, 1, 3);
    0x6d => Push14("PUSH14", 0, 1, 3);
    0x6e => Push15("PUSH15", 0, 1, 3);
    0x6f => Push16("PUSH16", 0, 1, 3);
    0x70 => Push17("PUSH17", 0, 1, 3);
    0x71 => Push18("PUSH18", 0, 1, 3);
    0x72 => Push19("PUSH19", 0, 1, 3);
    0x73 => Push20("PUSH20", 0, 1, 3);
    0x74 => Push21("PUSH21", 0, 1, 3);
    0x75 => Push22("PUSH22", 0, 1, 3);
    0x76 => Push23("PUSH23", 0, 1, 3);
    0x77 => Push24("PUSH24", 0, 1, 3);
    0x78 => Push25("PUSH25", 0, 1, 3);
    0x79 => Push26("PUSH26", 0, 1, 3);
    0x7a => Push27("PUSH27", 0, 1, 3);
    0x7b => Push28("PUSH28", 0, 1, 3);
    0x7c => Push29("PUSH29", 0, 1, 3);
    0x7d => Push30("PUSH30", 0, 1, 3);
    0x7e => Push31("PUSH31", 0, 1, 3);
    0x7f => Push32("PUSH32", 0, 1, 3);
    0x80 => Dup1("DUP1", 1, 2, 3);
    0x81 => Dup2("DUP2", 2, 3, 3);
    0x82 => Dup3("DUP3", 3, 4, 3);
    0x83 => Dup4("DUP4", 4, 5, 3);
    0x84 => Dup5("DUP5", 5, 6, 3);
    0x85 => Dup6("DUP6", 6, 7, 3);
    0x86 => Dup7("DUP7", 7, 8, 3);
    0x87 => Dup8("DUP8", 8, 9, 3);
    0x88 => Dup9("DUP9", 9, 10, 3);
    0x89 => Dup10("DUP10", 10, 11, 3);
    0x8a => Dup11("DUP11", 11, 12, 3);
    0x8b => Dup12("DUP12", 12, 13, 3);
    0x8c => Dup13("DUP13", 13, 14, 3);
    0x8d => Dup14("DUP14", 14, 15, 3);
    0x8e => Dup15("DUP15", 15, 16, 3);
    0x8f => Dup16("DUP16", 16, 17, 3);
    0x90 => Swap1("SWAP1", 2, 2, 3);
    0x91 => Swap2("SWAP2", 3, 3, 3);
    0x92 => Swap3("SWAP3", 4, 4, 3);
    0x93 => Swap4("SWAP4", 5, 5, 3);
    0x94 => Swap5("SWAP5", 6, 6, 3);
    0x95 => Swap6("SWAP6", 7, 7, 3);
    0x96 => Swap7("SWAP7", 8, 8, 3);
    0x97 => Swap8("SWAP8", 9, 9, 3);
    0x98 => Swap9("SWAP9", 10, 10, 3);
    0x99 => Swap10("SWAP10", 11, 11, 3);
    0x9a => Swap11("SWAP11", 12, 12, 3);
    0x9b => Swap12("SWAP12", 13, 13, 3);
    0x9c => Swap13("SWAP13", 14, 14, 3);
    0x9d => Swap14("SWAP14", 15, 15, 3);
    0x9e => Swap15("SWAP15", 16, 16, 3);
    0x9f => Swap16("SWAP16", 17, 17, 3);
    0xa0 => Log0("LOG0", 2, 0, 375);
    0xa1 => Log1("LOG1", 3, 0, 750);
    0xa2 => Log2("LOG2", 4, 0, 1125);
    0xa3 => Log3("LOG3", 5, 0, 1500);
    0xa4 => Log4("LOG4", 6, 0, 1875);
    0xf0 => Create("CREATE", 3, 1, 32000);
    0xf1 => Call("CALL", 7, 1, 700);
    0xf2 => CallCode("CALLCODE", 7, 1, 700);
    0xf3 => Return("RETURN", 2, 0, 0);
    0xf4 => DelegateCall("DELEGATECALL", 6, 1, 700);
    0xf5 => Create2("CREATE2", 4, 1, 32000);
    0xfa => StaticCall("STATICCALL", 6, 1, 700);
    0xfd => Revert("REVERT", 2, 0, 0);
    0xfe => Invalid("INVALID", 0, 0, 0);
    0xff => SelfDestruct("SELFDESTRUCT", 1, 0, 5000);
}

impl Opcode {
    /// Raw byte of this opcode.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Number of immediate bytes following the opcode (non-zero only for `PUSHn`).
    pub const fn immediate_size(self) -> usize {
        let byte = self as u8;
        if byte >= Self::Push1 as u8 && byte <= Self::Push32 as u8 {
            (byte - Self::Push1 as u8 + 1) as usize
        } else {
            0
        }
    }

    /// `n` for `DUPn`.
    pub const fn dup_depth(self) -> Option<usize> {
        let byte = self as u8;
        if byte >= Self::Dup1 as u8 && byte <= Self::Dup16 as u8 {
            Some((byte - Self::Dup1 as u8 + 1) as usize)
        } else {
            None
        }
    }

    /// `n` for `SWAPn`.
    pub const fn swap_depth(self) -> Option<usize> {
        let byte = self as u8;
        if byte >= Self::Swap1 as u8 && byte <= Self::Swap16 as u8 {
            Some((byte - Self::Swap1 as u8 + 1) as usize)
        } else {
            None
        }
    }

    /// Number of topics for `LOGn`.
    pub const fn log_topics(self) -> Option<usize> {
        let byte = self as u8;
        if byte >= Self::Log0 as u8 && byte <= Self::Log4 as u8 {
            Some((byte - Self::Log0 as u8) as usize)
        } else {
            None
        }
    }

    /// Instructions outside of the single-frame, storage-less execution model.
    pub const fn is_supported(self) -> bool {
        !matches!(
            self,
            Self::Balance
                | Self::ExtCodeSize
                | Self::ExtCodeCopy
                | Self::ExtCodeHash
                | Self::SLoad
                | Self::SStore
                | Self::Create
                | Self::CallCode
                | Self::DelegateCall
                | Self::Create2
                | Self::SelfDestruct
        )
    }

    /// Instructions that end execution when they succeed.
    pub const fn is_halting(self) -> bool {
        matches!(self, Self::Stop | Self::Return | Self::Revert)
    }

    /// Whether a one-step proof of this instruction must carry the full memory.
    pub const fn touches_memory(self) -> bool {
        matches!(
            self,
            Self::Sha3
                | Self::CallDataCopy
                | Self::CodeCopy
                | Self::ReturnDataCopy
                | Self::MLoad
                | Self::MStore
                | Self::MStore8
                | Self::Log0
                | Self::Log1
                | Self::Log2
                | Self::Log3
                | Self::Log4
                | Self::Call
                | Self::StaticCall
                | Self::Return
                | Self::Revert
        )
    }

    /// Whether a one-step proof of this instruction must carry the call data.
    pub const fn reads_call_data(self) -> bool {
        matches!(
            self,
            Self::CallDataLoad | Self::CallDataSize | Self::CallDataCopy
        )
    }

    /// Whether a one-step proof of this instruction must carry the custom environment snapshot.
    pub const fn uses_custom_environment(self) -> bool {
        matches!(self, Self::Call | Self::StaticCall)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_is_consistent() {
        for byte in 0..=u8::MAX {
            if let Some(opcode) = Opcode::from_byte(byte) {
                assert_eq!(opcode.as_byte(), byte);
            }
        }
        assert_eq!(Opcode::from_byte(0x0c), None);
        assert_eq!(Opcode::from_byte(0x5c), None);
    }

    #[test]
    fn variant_families() {
        assert_eq!(Opcode::Push1.immediate_size(), 1);
        assert_eq!(Opcode::Push32.immediate_size(), 32);
        assert_eq!(Opcode::Dup1.immediate_size(), 0);
        assert_eq!(Opcode::Dup16.dup_depth(), Some(16));
        assert_eq!(Opcode::Swap3.swap_depth(), Some(3));
        assert_eq!(Opcode::Swap3.stack_inputs(), 4);
        assert_eq!(Opcode::Log4.log_topics(), Some(4));
        assert_eq!(Opcode::Add.log_topics(), None);
    }

    #[test]
    fn unsupported_instructions() {
        assert!(!Opcode::SStore.is_supported());
        assert!(!Opcode::DelegateCall.is_supported());
        assert!(Opcode::Call.is_supported());
        assert!(Opcode::StaticCall.uses_custom_environment());
    }
}
