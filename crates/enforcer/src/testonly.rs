//! Test-only fixtures shared by unit tests, integration tests and benchmarks.
//!
//! The fixture program adds two constants, stores the sum and the first call data word, hashes
//! both words and returns the hash:
//!
//! ```text
//! PUSH1 03 PUSH1 05 ADD PUSH1 00 MSTORE PUSH1 00 CALLDATALOAD PUSH1 20 MSTORE
//! PUSH1 40 PUSH1 00 SHA3 PUSH1 00 MSTORE PUSH1 20 PUSH1 00 RETURN
//! ```

use primitive_types::U256;

use crate::{
    decode_hex, merkle::Merkelizer, CallContext, CallData, ExecutionRequest, ExecutionStep,
    Program, Settings, VirtualMachine, World,
};

/// Bytecode of the fixture program (17 steps).
pub const FIXTURE_CODE: &str = "0x6003600501600052600035602052604060002060005260206000f3";
/// Call data the fixture is executed with.
pub const FIXTURE_CALL_DATA: &str = "0x00010203040506070809";

/// Parses a hex constant of this module.
fn parse(hex: &str) -> Vec<u8> {
    decode_hex(hex).unwrap_or_else(|err| panic!("invalid fixture hex {hex}: {err}"))
}

/// Fixture program and call data.
pub fn fixture() -> (Program, CallData) {
    (
        Program::new(parse(FIXTURE_CODE)),
        CallData::new(parse(FIXTURE_CALL_DATA)),
    )
}

/// Execution request for the fixture with default settings and an empty ledger.
pub fn fixture_request() -> ExecutionRequest {
    ExecutionRequest {
        code: parse(FIXTURE_CODE),
        data: parse(FIXTURE_CALL_DATA),
        gas_limit: Settings::default().gas_limit,
        context: CallContext::default(),
        custom_environment: Vec::new(),
    }
}

/// Commits to the honest fixture trace.
pub fn fixture_merkelizer() -> Merkelizer {
    let (program, call_data) = fixture();
    let vm = VirtualMachine::new(program, call_data, (), Settings::default());
    Merkelizer::run(vm).unwrap_or_else(|err| panic!("fixture trace is not empty: {err}"))
}

/// Pushes an extra word onto the stack of `step`'s post-state, so that its state hash (and
/// nothing else) changes.
pub fn corrupt_stack<W: World>(step: &mut ExecutionStep<W>) {
    step.state.stack.push(U256::from(0xdead_beef_u64));
}

/// Fixture trace whose `step`-th post-state has a corrupted stack.
///
/// # Panics
///
/// Panics if the fixture has no such step.
pub fn corrupted_fixture(step: usize) -> Merkelizer {
    edited_fixture(|steps| corrupt_stack(&mut steps[step]))
}

/// Fixture trace that stops after `len` steps.
///
/// # Panics
///
/// Panics if `len` is 0.
pub fn truncated_fixture(len: usize) -> Merkelizer {
    edited_fixture(|steps| steps.truncate(len))
}

fn edited_fixture(edit: impl FnOnce(&mut Vec<ExecutionStep>)) -> Merkelizer {
    let (program, call_data) = fixture();
    let mut vm = VirtualMachine::new(program, call_data, (), Settings::default());
    let initial = vm.state().clone();
    let call_data = vm.call_data().clone();
    let mut steps = vm.run(0);
    edit(&mut steps);
    Merkelizer::from_steps(initial, call_data, steps)
        .unwrap_or_else(|err| panic!("edited fixture trace is invalid: {err}"))
}
