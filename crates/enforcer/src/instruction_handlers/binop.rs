use enforcer_interface::{ErrNo, Opcode};
use primitive_types::{U256, U512};

use super::common::boilerplate;
use crate::{instruction::ExecutionStatus, step::Effects, VirtualMachine, World};

/// Two operands, one result. `a` is the top of the stack.
pub(crate) trait Binop {
    fn perform(a: U256, b: U256) -> U256;
}

/// One operand, one result.
pub(crate) trait Unop {
    fn perform(a: U256) -> U256;
}

/// Modular arithmetic over three operands.
pub(crate) trait Ternop {
    fn perform(a: U256, b: U256, modulus: U256) -> U256;
}

pub(crate) fn binop<W: World, Op: Binop>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [a, b] = vm.state.stack.pop();
        vm.state.stack.push(Op::perform(a, b));
        Ok(())
    })
}

pub(crate) fn unop<W: World, Op: Unop>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [a] = vm.state.stack.pop();
        vm.state.stack.push(Op::perform(a));
        Ok(())
    })
}

pub(crate) fn ternop<W: World, Op: Ternop>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [a, b, modulus] = vm.state.stack.pop();
        vm.state.stack.push(Op::perform(a, b, modulus));
        Ok(())
    })
}

/// `EXP` additionally charges 50 gas per byte of the exponent.
pub(crate) fn exp<W: World>(
    vm: &mut VirtualMachine<W>,
    effects: &mut Effects,
    opcode: Opcode,
) -> Result<ExecutionStatus, ErrNo> {
    boilerplate(vm, effects, opcode, |vm, _| {
        let [base, exponent] = vm.state.stack.pop();
        vm.use_gas(50 * exponent.bits().div_ceil(8) as u64)?;
        vm.state.stack.push(base.overflowing_pow(exponent).0);
        Ok(())
    })
}

const SIGN_BIT: usize = 255;

fn is_negative(value: U256) -> bool {
    value.bit(SIGN_BIT)
}

fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}

fn truncate(value: U512) -> U256 {
    U256([value.0[0], value.0[1], value.0[2], value.0[3]])
}

fn from_bool(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

macro_rules! binop {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        #[derive(Debug)]
        pub(crate) struct $name;

        impl Binop for $name {
            #[inline(always)]
            fn perform($a: U256, $b: U256) -> U256 {
                $body
            }
        }
    };
}

binop!(Add, |a, b| a.overflowing_add(b).0);
binop!(Mul, |a, b| a.overflowing_mul(b).0);
binop!(Sub, |a, b| a.overflowing_sub(b).0);
binop!(Div, |a, b| if b.is_zero() { U256::zero() } else { a / b });
binop!(Mod, |a, b| if b.is_zero() { U256::zero() } else { a % b });
binop!(SDiv, |a, b| {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if is_negative(a) == is_negative(b) {
        quotient
    } else {
        negate(quotient)
    }
});
binop!(SMod, |a, b| {
    if b.is_zero() {
        return U256::zero();
    }
    let remainder = abs(a) % abs(b);
    if is_negative(a) {
        negate(remainder)
    } else {
        remainder
    }
});
binop!(SignExtend, |size, value| {
    if size >= U256::from(31) {
        return value;
    }
    let bit = size.as_usize() * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if value.bit(bit) {
        value | !mask
    } else {
        value & mask
    }
});
binop!(Lt, |a, b| from_bool(a < b));
binop!(Gt, |a, b| from_bool(a > b));
binop!(SLt, |a, b| from_bool(flip_sign(a) < flip_sign(b)));
binop!(SGt, |a, b| from_bool(flip_sign(a) > flip_sign(b)));
binop!(IsEqual, |a, b| from_bool(a == b));
binop!(And, |a, b| a & b);
binop!(Or, |a, b| a | b);
binop!(Xor, |a, b| a ^ b);
binop!(Byte, |index, value| {
    if index >= U256::from(32) {
        U256::zero()
    } else {
        (value >> (8 * (31 - index.as_usize()))) & U256::from(0xff)
    }
});
binop!(Shl, |shift, value| {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value << shift.as_usize()
    }
});
binop!(Shr, |shift, value| {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value >> shift.as_usize()
    }
});
binop!(Sar, |shift, value| {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        if negative {
            U256::MAX
        } else {
            U256::zero()
        }
    } else if negative {
        !(!value >> shift.as_usize())
    } else {
        value >> shift.as_usize()
    }
});

fn flip_sign(value: U256) -> U256 {
    value ^ (U256::one() << SIGN_BIT)
}

#[derive(Debug)]
pub(crate) struct IsZero;

impl Unop for IsZero {
    fn perform(a: U256) -> U256 {
        from_bool(a.is_zero())
    }
}

#[derive(Debug)]
pub(crate) struct Not;

impl Unop for Not {
    fn perform(a: U256) -> U256 {
        !a
    }
}

#[derive(Debug)]
pub(crate) struct AddMod;

impl Ternop for AddMod {
    fn perform(a: U256, b: U256, modulus: U256) -> U256 {
        if modulus.is_zero() {
            return U256::zero();
        }
        truncate((U512::from(a) + U512::from(b)) % U512::from(modulus))
    }
}

#[derive(Debug)]
pub(crate) struct MulMod;

impl Ternop for MulMod {
    fn perform(a: U256, b: U256, modulus: U256) -> U256 {
        if modulus.is_zero() {
            return U256::zero();
        }
        truncate(a.full_mul(b) % U512::from(modulus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minus(value: u64) -> U256 {
        negate(U256::from(value))
    }

    #[test]
    fn signed_division() {
        assert_eq!(SDiv::perform(minus(7), U256::from(2)), minus(3));
        assert_eq!(SMod::perform(minus(7), U256::from(2)), minus(1));
        assert_eq!(SMod::perform(U256::from(7), minus(2)), U256::one());
        let min = U256::one() << 255;
        assert_eq!(SDiv::perform(min, U256::MAX), min);
        assert_eq!(SDiv::perform(U256::one(), U256::zero()), U256::zero());
    }

    #[test]
    fn comparisons() {
        assert_eq!(SLt::perform(minus(1), U256::one()), U256::one());
        assert_eq!(Lt::perform(minus(1), U256::one()), U256::zero());
        assert_eq!(SGt::perform(U256::zero(), minus(5)), U256::one());
    }

    #[test]
    fn shifts_and_bytes() {
        assert_eq!(Shl::perform(U256::from(4), U256::one()), U256::from(16));
        assert_eq!(Shr::perform(U256::from(300), U256::MAX), U256::zero());
        assert_eq!(Sar::perform(U256::from(4), minus(32)), minus(2));
        assert_eq!(Sar::perform(U256::from(256), minus(1)), U256::MAX);
        assert_eq!(Byte::perform(U256::from(31), U256::from(0xabcd)), U256::from(0xcd));
        assert_eq!(Byte::perform(U256::from(32), U256::MAX), U256::zero());
    }

    #[test]
    fn sign_extension() {
        assert_eq!(SignExtend::perform(U256::zero(), U256::from(0xff)), U256::MAX);
        assert_eq!(SignExtend::perform(U256::zero(), U256::from(0x17f)), U256::from(0x7f));
        assert_eq!(SignExtend::perform(U256::from(40), U256::from(0xff)), U256::from(0xff));
    }

    #[test]
    fn modular_arithmetic() {
        assert_eq!(AddMod::perform(U256::MAX, U256::from(2), U256::from(10)), U256::from(7));
        assert_eq!(MulMod::perform(U256::MAX, U256::MAX, U256::from(12)), U256::from(9));
        assert_eq!(AddMod::perform(U256::one(), U256::one(), U256::zero()), U256::zero());
    }
}
