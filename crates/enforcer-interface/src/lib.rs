//! # Enforcer Interface
//!
//! Types shared between the off-chain engine and anything that speaks to the verifier:
//! instruction metadata, fault codes, the custom-environment ledger records and the
//! request/response surface of the verifier itself.
//!
//! The types here are part of the dispute wire format. Changing a field or a numeric code
//! changes the hashes the two parties compare, so additions must go into new types or new
//! variants rather than altering existing ones.
//!
//! ```
//! use enforcer_interface::{ErrNo, Opcode};
//!
//! let add = Opcode::from_byte(0x01).unwrap();
//! assert_eq!(add.name(), "ADD");
//! assert_eq!(add.stack_inputs(), 2);
//! assert_eq!(ErrNo::OutOfGas.code(), 0x0d);
//! ```

pub use self::{errno::ErrNo, opcodes::Opcode, tokens::*, verifier::*};

mod errno;
mod opcodes;
mod tokens;
mod verifier;
