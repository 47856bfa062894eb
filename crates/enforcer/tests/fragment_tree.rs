use enforcer::{merkle::FragmentTree, testonly, Program};
use proptest::prelude::*;

#[test]
fn fixture_code_fits_into_one_word() {
    let (program, _) = testonly::fixture();
    let tree = FragmentTree::from_program(&program);
    assert_eq!(tree.byte_length(), 27);
    assert_eq!(program.word_count(), 1);
    let fragment = tree.calculate_proof(0).unwrap();
    assert_eq!(fragment.value, program.word(0));
    assert!(tree.calculate_proof(1).is_err());
}

#[test]
fn trees_over_different_lengths_differ() {
    let short = Program::new(vec![0x60; 64]);
    let long = Program::new(vec![0x60; 65]);
    let short_tree = FragmentTree::from_program(&short);
    let long_tree = FragmentTree::from_program(&long);
    assert_ne!(short_tree.root(), long_tree.root());

    // The same word at the same slot is bound to the code length.
    let fragment = short_tree.calculate_proof(0).unwrap();
    assert!(!FragmentTree::verify_proof(&fragment, 65, short_tree.root()));
}

proptest! {
    #[test]
    fn proofs_are_sound(code in prop::collection::vec(any::<u8>(), 1..1024)) {
        let tree = FragmentTree::new(&code);
        let root = tree.root();
        for slot in 0..code.len().div_ceil(32) {
            let fragment = tree.calculate_proof(slot).unwrap();
            prop_assert!(FragmentTree::verify_proof(&fragment, code.len(), root));

            let mut forged = fragment.clone();
            forged.value.0[31] ^= 1;
            prop_assert!(!FragmentTree::verify_proof(&forged, code.len(), root));

            let mut moved = fragment;
            moved.slot ^= 1;
            prop_assert!(!FragmentTree::verify_proof(&moved, code.len(), root));
        }
    }
}
