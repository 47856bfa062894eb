pub(crate) use self::{
    binop::{
        binop, exp, ternop, unop, Add, AddMod, And, Byte, Div, Gt, IsEqual, IsZero, Lt, Mod, Mul,
        MulMod, Not, Or, SDiv, SGt, SLt, SMod, Sar, Shl, Shr, SignExtend, Sub, Xor,
    },
    context::address_into_u256,
};

mod binop;
mod call;
mod common;
mod context;
mod event;
mod jump;
mod memory_access;
mod ret;
mod stack_ops;
