use core::ops::Rem;

use primitive_types::{U256, U512};

use crate::utils::I256;

/// Low 256 bits of a 512-bit word. Callers only pass values already reduced
/// below a 256-bit modulus.
#[inline]
fn u512_low(v: U512) -> U256 {
	U256([v.0[0], v.0[1], v.0[2], v.0[3]])
}

#[inline]
pub fn div(op1: U256, op2: U256) -> U256 {
	if op2.is_zero() {
		U256::zero()
	} else {
		op1 / op2
	}
}

#[inline]
pub fn sdiv(op1: U256, op2: U256) -> U256 {
	let op1: I256 = op1.into();
	let op2: I256 = op2.into();
	let ret = op1 / op2;
	ret.into()
}

#[inline]
pub fn rem(op1: U256, op2: U256) -> U256 {
	if op2.is_zero() {
		U256::zero()
	} else {
		op1.rem(op2)
	}
}

#[inline]
pub fn srem(op1: U256, op2: U256) -> U256 {
	if op2.is_zero() {
		U256::zero()
	} else {
		let op1: I256 = op1.into();
		let op2: I256 = op2.into();
		let ret = op1.rem(op2);
		ret.into()
	}
}

#[inline]
pub fn addmod(op1: U256, op2: U256, op3: U256) -> U256 {
	if op3.is_zero() {
		return U256::zero();
	}

	let op1: U512 = op1.into();
	let op2: U512 = op2.into();
	let op3: U512 = op3.into();
	u512_low((op1 + op2) % op3)
}

#[inline]
pub fn mulmod(op1: U256, op2: U256, op3: U256) -> U256 {
	if op3.is_zero() {
		return U256::zero();
	}

	let op1: U512 = op1.into();
	let op2: U512 = op2.into();
	let op3: U512 = op3.into();
	u512_low((op1 * op2) % op3)
}

#[inline]
pub fn exp(op1: U256, op2: U256) -> U256 {
	let mut op1 = op1;
	let mut op2 = op2;
	let mut r: U256 = 1.into();

	while !op2.is_zero() {
		if op2 & 1.into() != U256::zero() {
			r = r.overflowing_mul(op1).0;
		}
		op2 >>= 1;
		op1 = op1.overflowing_mul(op1).0;
	}

	r
}

/// Extend the sign of the `op1`-th byte (counting from the least
/// significant) of `op2` over the higher bytes.
#[inline]
pub fn signextend(op1: U256, op2: U256) -> U256 {
	if op1 < U256::from(32) {
		// `low_u32` works since op1 < 32
		let bit_index = (8 * op1.low_u32() + 7) as usize;
		let bit = op2.bit(bit_index);
		let mask = (U256::one() << bit_index) - U256::one();
		if bit {
			op2 | !mask
		} else {
			op2 & mask
		}
	} else {
		op2
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn division_by_zero_is_zero() {
		assert_eq!(div(U256::from(7), U256::zero()), U256::zero());
		assert_eq!(rem(U256::from(7), U256::zero()), U256::zero());
		assert_eq!(sdiv(U256::MAX, U256::zero()), U256::zero());
		assert_eq!(srem(U256::MAX, U256::zero()), U256::zero());
		assert_eq!(addmod(U256::one(), U256::one(), U256::zero()), U256::zero());
		assert_eq!(mulmod(U256::one(), U256::one(), U256::zero()), U256::zero());
	}

	#[test]
	fn modular_ops_do_not_overflow() {
		assert_eq!(
			addmod(U256::MAX, U256::from(2), U256::MAX),
			U256::from(2)
		);
		assert_eq!(mulmod(U256::MAX, U256::MAX, U256::from(12)), U256::from(9));
	}

	#[test]
	fn exp_wraps() {
		assert_eq!(exp(U256::from(2), U256::from(10)), U256::from(1024));
		assert_eq!(exp(U256::from(2), U256::from(256)), U256::zero());
		assert_eq!(exp(U256::zero(), U256::zero()), U256::one());
	}

	#[test]
	fn signextend_byte_boundaries() {
		assert_eq!(signextend(U256::zero(), U256::from(0xff)), U256::MAX);
		assert_eq!(signextend(U256::zero(), U256::from(0x7f)), U256::from(0x7f));
		assert_eq!(
			signextend(U256::one(), U256::from(0x80ff)),
			U256::MAX - U256::from(0x7f00)
		);
		assert_eq!(signextend(U256::from(32), U256::from(0xff)), U256::from(0xff));
	}
}
