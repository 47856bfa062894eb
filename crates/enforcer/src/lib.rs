//! Off-chain engine for interactive fraud proofs over EVM-style bytecode.
//!
//! - [`VirtualMachine`] executes a program and emits one [`ExecutionStep`] per instruction.
//! - [`merkle::Merkelizer`] commits to a trace; [`merkle::FragmentTree`] commits to bytecode.
//! - [`proof::ProofHelper`] extracts and re-executes one-step proofs.
//! - [`dispute`] plays the bisection game against a [`Verifier`].
//!
//! Interpreter faults are data: they are recorded in the step's [`ErrNo`] and committed like any
//! other state.

pub use enforcer_interface::{
    BlockContext, CallContext, CodeFragment, DisputeId, DisputeState, DisputeView, ErrNo,
    ExecutionId, ExecutionInput, ExecutionRequest, NodePair, Notification, Opcode, Party, Proofs,
    ResultClaim, Submission, TokenRecord, TokenType, Verifier, VerifierError,
};

pub use self::{
    config::Settings,
    errors::{DisputeError, EngineError, ProofError, TreeError},
    gas::memory_cost,
    memory::Memory,
    program::Program,
    stack::{Stack, StackBase, STACK_LIMIT},
    state::{CallData, ExecutionState},
    step::ExecutionStep,
    tokens::{decode_word, encode_call, TokenBag},
    vm::VirtualMachine,
    world::{CallOutcome, ExternalCall, World},
};

mod bitset;
mod config;
mod decode;
pub mod dispute;
mod errors;
mod gas;
pub mod hash;
mod instruction;
mod instruction_handlers;
mod memory;
pub mod merkle;
mod program;
pub mod proof;
mod rollback;
mod stack;
mod state;
mod step;
pub mod testonly;
mod tokens;
mod vm;
mod world;

/// Decodes a hex string, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns an error if the string is not valid hex.
pub fn decode_hex(hex: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(hex.strip_prefix("0x").unwrap_or(hex))
}
