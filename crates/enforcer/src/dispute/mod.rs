//! Bisection game over execution traces: the state machine, a local driver, an in-memory
//! verifier and the event-driven engine acting for one party.

pub use self::{
    game::Dispute,
    mock::{DisputeMock, Verdict},
    poker::{DisputeStatus, ExecutionPoker},
    verifier::InMemoryVerifier,
    wallet::Wallet,
};

mod game;
mod mock;
mod poker;
mod verifier;
mod wallet;
