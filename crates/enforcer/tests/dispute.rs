use enforcer::{
    dispute::{DisputeMock, Verdict},
    merkle::{FragmentTree, Merkelizer},
    proof::ProofHelper,
    testonly, CallContext, Party, Program, Settings, TokenBag, TokenRecord, VirtualMachine,
};
use pretty_assertions::assert_eq;
use primitive_types::{H160, U256};

fn verdict(solver: &Merkelizer, challenger: &Merkelizer) -> Verdict {
    let (program, _) = testonly::fixture();
    DisputeMock::new(&program, solver, challenger).run().unwrap()
}

#[test]
fn identical_traces_leave_the_solver_standing() {
    let honest = testonly::fixture_merkelizer();
    let verdict = verdict(&honest, &testonly::fixture_merkelizer());
    assert_eq!(verdict.winner, Party::Solver);
    assert_eq!(verdict.leaf_index, None);
}

#[test]
fn mutated_challenger_step_loses() {
    let verdict = verdict(&testonly::fixture_merkelizer(), &testonly::corrupted_fixture(7));
    assert_eq!(
        verdict,
        Verdict {
            winner: Party::Solver,
            rounds: 6,
            leaf_index: Some(7),
        }
    );
}

#[test]
fn mutated_solver_step_loses() {
    let verdict = verdict(&testonly::corrupted_fixture(7), &testonly::fixture_merkelizer());
    assert_eq!(verdict.winner, Party::Challenger);
    assert_eq!(verdict.leaf_index, Some(7));
}

#[test]
fn bisection_finds_the_first_differing_step() {
    let honest = testonly::fixture_merkelizer();
    for step in 0..honest.steps().len() {
        let verdict = verdict(&testonly::corrupted_fixture(step), &honest);
        assert_eq!(verdict.leaf_index, Some(step), "corrupted step {step}");
        assert_eq!(verdict.rounds, honest.depth());
        assert_eq!(verdict.winner, Party::Challenger);
    }
}

#[test]
fn truncated_challenger_loses() {
    for len in [1, 5, 10, 16] {
        let verdict = verdict(&testonly::fixture_merkelizer(), &testonly::truncated_fixture(len));
        assert_eq!(verdict.winner, Party::Solver, "challenger truncated to {len} steps");
        assert_eq!(verdict.leaf_index, Some(len));
    }
}

#[test]
fn truncated_solver_loses() {
    for len in [1, 5, 10, 16] {
        let verdict = verdict(&testonly::truncated_fixture(len), &testonly::fixture_merkelizer());
        assert_eq!(verdict.winner, Party::Challenger, "solver truncated to {len} steps");
    }
}

#[test]
fn compact_proofs_reproduce_every_fixture_step() {
    let (program, _) = testonly::fixture();
    let fragments = FragmentTree::from_program(&program);
    let merkelizer = testonly::fixture_merkelizer();
    for (index, leaf) in merkelizer.tree().leaves().iter().enumerate() {
        let (proofs, input) = ProofHelper::construct_proof(&merkelizer, &fragments, index).unwrap();
        let outcome = ProofHelper::verify_leaf(
            &program,
            fragments.root(),
            &CallContext::default(),
            &Settings::default(),
            &proofs,
            &input,
            &leaf.pair(),
        )
        .unwrap();
        assert_eq!(outcome.post_hash, leaf.right, "step {index}");
        assert_eq!(Some(outcome.opcode), merkelizer.steps().get(index).map(|step| step.opcode));
    }
}

#[test]
fn compact_proofs_carry_the_ledger_for_token_calls() {
    let token = H160::repeat_byte(0xee);
    let alice = H160::repeat_byte(0xa1);
    let bob = H160::repeat_byte(0xb0);
    // Copy the call data to memory, `CALL` the token with it, return the result word.
    let code = format!("0x36600060003760206000366000600073{}5af160206000f3", hex::encode(token));
    let program = Program::from_hex(&code).unwrap();
    let input = enforcer::encode_call(
        "transfer(address,uint256)",
        &[U256::from_big_endian(bob.as_bytes()), U256::from(7)],
    );
    let context = CallContext {
        address: alice,
        ..CallContext::default()
    };
    let world = TokenBag::new([TokenRecord::erc20(token, alice, U256::from(10))]);
    let vm = VirtualMachine::new(program.clone(), input, world, Settings::default())
        .with_context(context.clone());
    let merkelizer = Merkelizer::run(vm).unwrap();
    let fragments = FragmentTree::from_program(&program);

    let mut ledger_proofs = 0;
    for (index, leaf) in merkelizer.tree().leaves().iter().enumerate() {
        let (proofs, input) = ProofHelper::construct_proof(&merkelizer, &fragments, index).unwrap();
        ledger_proofs += usize::from(input.custom_environment.is_some());
        let outcome = ProofHelper::verify_step(
            &program,
            fragments.root(),
            &context,
            &Settings::default(),
            &proofs,
            &input,
        )
        .unwrap();
        assert_eq!((outcome.pre_hash, outcome.post_hash), (leaf.left, leaf.right), "step {index}");
    }
    assert_eq!(ledger_proofs, 1);
}

#[test]
fn tampered_proofs_are_rejected() {
    let (program, _) = testonly::fixture();
    let fragments = FragmentTree::from_program(&program);
    let merkelizer = testonly::fixture_merkelizer();
    let leaf = merkelizer.tree().leaves()[2];

    let (proofs, mut input) = ProofHelper::construct_proof(&merkelizer, &fragments, 2).unwrap();
    input.gas_remaining += 1;
    let result = ProofHelper::verify_leaf(
        &program,
        fragments.root(),
        &CallContext::default(),
        &Settings::default(),
        &proofs,
        &input,
        &leaf.pair(),
    );
    assert!(matches!(result, Err(enforcer::ProofError::PreStateMismatch { .. })));
}
