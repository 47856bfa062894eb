use enforcer::{
    hash::{hash_pair, ZERO},
    merkle::Merkelizer,
    testonly, ExecutionStep, Memory, Settings, VirtualMachine,
};
use pretty_assertions::assert_eq;
use primitive_types::H256;
use proptest::prelude::*;

fn edited(edit: impl FnOnce(&mut Vec<ExecutionStep>)) -> Merkelizer {
    let (program, call_data) = testonly::fixture();
    let mut vm = VirtualMachine::new(program, call_data, (), Settings::default());
    let initial = vm.state().clone();
    let call_data = vm.call_data().clone();
    let mut steps = vm.run(0);
    edit(&mut steps);
    Merkelizer::from_steps(initial, call_data, steps).unwrap()
}

#[test]
fn fixture_trace_shape() {
    let merkelizer = testonly::fixture_merkelizer();
    assert_eq!(merkelizer.steps().len(), 17);
    assert_eq!(merkelizer.depth(), 6);
    assert_eq!(merkelizer.tree().leaves().len(), 17);
    assert!(merkelizer.steps().last().unwrap().is_final());
}

#[test]
fn execution_is_deterministic() {
    let first = testonly::fixture_merkelizer();
    let second = testonly::fixture_merkelizer();
    assert_eq!(first.steps(), second.steps());
    assert_eq!(first.claim(), second.claim());
}

#[test]
fn dropping_or_duplicating_a_step_changes_the_root() {
    let honest = testonly::fixture_merkelizer().root();
    assert_ne!(edited(|steps| drop(steps.remove(5))).root(), honest);
    assert_ne!(
        edited(|steps| {
            let step = steps[5].clone();
            steps.insert(5, step);
        })
        .root(),
        honest
    );
    assert_ne!(testonly::truncated_fixture(16).root(), honest);
}

#[test]
fn padding_pairs_the_root_with_zero() {
    let merkelizer = testonly::truncated_fixture(10);
    let mut tree = merkelizer.tree().clone();
    assert_eq!(tree.depth(), 5);
    tree.pad_to_depth(6).unwrap();
    assert_eq!(tree.root().hash, hash_pair(&merkelizer.root(), &ZERO));
    assert!(tree.pad_to_depth(3).is_err());
}

#[test]
fn replaced_leaves_break_the_chain() {
    let mut merkelizer = testonly::fixture_merkelizer();
    let honest = merkelizer.root();
    merkelizer.replace_leaf(4, 3).unwrap();
    assert_ne!(merkelizer.root(), honest);
    let leaves = merkelizer.tree().leaves();
    assert_ne!(leaves[3].right, leaves[4].left);
    assert!(merkelizer.replace_leaf(40, 0).is_err());
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Gas(u64),
    Pc(usize),
    Stack,
    Memory(u8),
    /// Replaces the step with another step of the same trace.
    Substitute(usize),
}

fn mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        (1..1_000_u64).prop_map(Mutation::Gas),
        (1..64_usize).prop_map(Mutation::Pc),
        Just(Mutation::Stack),
        any::<u8>().prop_map(Mutation::Memory),
        (1..17_usize).prop_map(Mutation::Substitute),
    ]
}

fn apply(steps: &mut [ExecutionStep], index: usize, mutation: Mutation) {
    match mutation {
        Mutation::Gas(delta) => steps[index].state.gas_remaining -= delta,
        Mutation::Pc(delta) => steps[index].state.pc += delta,
        Mutation::Stack => testonly::corrupt_stack(&mut steps[index]),
        Mutation::Memory(byte) => {
            // The fixture never grows memory past two words.
            steps[index].state.memory = Memory::from_words(&[H256::repeat_byte(byte); 3]);
        }
        Mutation::Substitute(offset) => {
            let other = steps[(index + offset) % steps.len()].clone();
            steps[index] = other;
        }
    }
}

proptest! {
    #[test]
    fn any_state_mutation_changes_the_root(index in 0..17_usize, mutation in mutation()) {
        let honest = testonly::fixture_merkelizer();
        let mutated = edited(|steps| apply(steps, index, mutation));
        prop_assert_ne!(mutated.root(), honest.root());
        // Leaves before the mutated step are unaffected.
        prop_assert_eq!(&mutated.tree().leaves()[..index], &honest.tree().leaves()[..index]);
    }
}
