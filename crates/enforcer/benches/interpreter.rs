use divan::{black_box, Bencher};
use enforcer::{
    dispute::DisputeMock,
    merkle::{FragmentTree, Merkelizer},
    proof::ProofHelper,
    testonly, Program, Settings, VirtualMachine,
};

/// `PUSH2 1000` followed by the loop `JUMPDEST PUSH1 1 SWAP1 SUB DUP1 PUSH1 3 JUMPI`.
const COUNTDOWN: &str = "0x6103e85b600190038060035700";

#[divan::bench]
fn countdown_loop(bencher: Bencher) {
    let program = Program::from_hex(COUNTDOWN).unwrap();
    bencher.bench(|| {
        let vm = VirtualMachine::new(program.clone(), vec![], (), Settings::default());
        black_box(vm.count())
    });
}

#[divan::bench]
fn merkelize_countdown(bencher: Bencher) {
    let program = Program::from_hex(COUNTDOWN).unwrap();
    bencher.bench(|| {
        let vm = VirtualMachine::new(program.clone(), vec![], (), Settings::default());
        black_box(Merkelizer::run(vm).unwrap().root())
    });
}

#[divan::bench]
fn prove_every_fixture_step(bencher: Bencher) {
    let (program, _) = testonly::fixture();
    let fragments = FragmentTree::from_program(&program);
    let merkelizer = testonly::fixture_merkelizer();
    bencher.bench(|| {
        for index in 0..merkelizer.steps().len() {
            black_box(ProofHelper::construct_proof(&merkelizer, &fragments, index).unwrap());
        }
    });
}

#[divan::bench]
fn full_local_dispute(bencher: Bencher) {
    let (program, _) = testonly::fixture();
    let honest = testonly::fixture_merkelizer();
    let corrupted = testonly::corrupted_fixture(11);
    bencher.bench(|| black_box(DisputeMock::new(&program, &corrupted, &honest).run().unwrap()));
}

fn main() {
    divan::main();
}
