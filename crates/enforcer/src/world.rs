use std::fmt;

use enforcer_interface::TokenRecord;
use primitive_types::{H160, H256};

use crate::hash::ZERO;

/// Message call issued by `CALL` / `STATICCALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalCall<'a> {
    /// Callee.
    pub target: H160,
    /// Address of the executing program (`ADDRESS`).
    pub sender: H160,
    /// Call input read from memory.
    pub input: &'a [u8],
    /// Set for `STATICCALL`.
    pub is_static: bool,
}

/// Result of an intercepted call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    /// Whether the callee succeeded; pushed as 1 or 0.
    pub success: bool,
    /// Data returned by the callee.
    pub return_data: Vec<u8>,
}

impl CallOutcome {
    pub(crate) fn failure() -> Self {
        Self::default()
    }

    pub(crate) fn success(return_data: Vec<u8>) -> Self {
        Self {
            success: true,
            return_data,
        }
    }
}

/// Everything outside of the executing program the interpreter can observe.
///
/// The world is part of every [`ExecutionState`](crate::ExecutionState) behind an
/// [`Arc`](std::sync::Arc), so it is only cloned when a call actually mutates it.
pub trait World: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Commitment bound into every state hash.
    fn environment_hash(&self) -> H256;

    /// Handles a message call. Returns `None` if the target is not modelled by this world.
    fn call(&mut self, call: &ExternalCall<'_>) -> Option<CallOutcome>;

    /// Snapshot handed to a one-step verifier. Worlds without state return nothing.
    fn records(&self) -> Vec<TokenRecord>;
}

/// Empty world: commits to [`ZERO`] and intercepts nothing.
impl World for () {
    fn environment_hash(&self) -> H256 {
        ZERO
    }

    fn call(&mut self, _call: &ExternalCall<'_>) -> Option<CallOutcome> {
        None
    }

    fn records(&self) -> Vec<TokenRecord> {
        Vec::new()
    }
}
