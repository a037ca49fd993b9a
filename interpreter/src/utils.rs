//! Word conversions and signed arithmetic over [U256].

use core::{
	cmp::Ordering,
	ops::{Div, Rem},
};

use primitive_types::{H160, H256, U256};

use crate::error::{ExitError, ExitException};

/// Mask clearing the sign bit of a two's complement word.
pub const SIGN_BIT_MASK: U256 = U256([
	0xffff_ffff_ffff_ffff,
	0xffff_ffff_ffff_ffff,
	0xffff_ffff_ffff_ffff,
	0x7fff_ffff_ffff_ffff,
]);

/// Convert [U256] into [H256].
#[must_use]
pub fn u256_to_h256(v: U256) -> H256 {
	let mut r = H256::default();
	v.to_big_endian(&mut r[..]);
	r
}

/// Convert [H256] to [U256].
#[must_use]
pub fn h256_to_u256(v: H256) -> U256 {
	U256::from_big_endian(&v[..])
}

/// Convert [U256] into [H160], keeping the low 20 bytes.
#[must_use]
pub fn u256_to_h160(v: U256) -> H160 {
	u256_to_h256(v).into()
}

/// Convert [H160] into [U256].
#[must_use]
pub fn h160_to_u256(v: H160) -> U256 {
	U256::from_big_endian(&v[..])
}

/// Convert [U256] to [usize].
pub fn u256_to_usize(v: U256) -> Result<usize, ExitError> {
	if v > U256::from(usize::MAX) {
		return Err(ExitException::InvalidRange.into());
	}
	Ok(v.as_usize())
}

/// Sign of [I256].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Sign {
	/// Plus
	Plus,
	/// Minus
	Minus,
	/// Zero
	Zero,
}

/// Signed 256-bit integer, as sign and magnitude.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct I256(pub Sign, pub U256);

impl I256 {
	/// Zero value of I256.
	#[must_use]
	pub const fn zero() -> I256 {
		I256(Sign::Zero, U256::zero())
	}

	/// Minimum value of I256.
	#[must_use]
	pub fn min_value() -> I256 {
		I256(Sign::Minus, (U256::MAX & SIGN_BIT_MASK) + U256::one())
	}
}

impl Ord for I256 {
	fn cmp(&self, other: &I256) -> Ordering {
		match (self.0, other.0) {
			(Sign::Zero, Sign::Zero) => Ordering::Equal,
			(Sign::Zero, Sign::Plus) => Ordering::Less,
			(Sign::Zero, Sign::Minus) => Ordering::Greater,
			(Sign::Minus, Sign::Zero) => Ordering::Less,
			(Sign::Minus, Sign::Plus) => Ordering::Less,
			(Sign::Minus, Sign::Minus) => self.1.cmp(&other.1).reverse(),
			(Sign::Plus, Sign::Minus) => Ordering::Greater,
			(Sign::Plus, Sign::Zero) => Ordering::Greater,
			(Sign::Plus, Sign::Plus) => self.1.cmp(&other.1),
		}
	}
}

impl PartialOrd for I256 {
	fn partial_cmp(&self, other: &I256) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Default for I256 {
	fn default() -> I256 {
		I256::zero()
	}
}

impl From<U256> for I256 {
	fn from(val: U256) -> I256 {
		if val.is_zero() {
			I256::zero()
		} else if val & SIGN_BIT_MASK == val {
			I256(Sign::Plus, val)
		} else {
			I256(Sign::Minus, (!val).overflowing_add(U256::one()).0)
		}
	}
}

impl From<I256> for U256 {
	fn from(value: I256) -> U256 {
		match value.0 {
			Sign::Zero => U256::zero(),
			Sign::Plus => value.1,
			Sign::Minus => (!value.1).overflowing_add(U256::one()).0,
		}
	}
}

impl Div for I256 {
	type Output = I256;

	fn div(self, other: I256) -> I256 {
		if other.1.is_zero() {
			return I256::zero();
		}

		if self == I256::min_value() && other.1 == U256::one() {
			return I256::min_value();
		}

		let d = (self.1 / other.1) & SIGN_BIT_MASK;

		if d.is_zero() {
			return I256::zero();
		}

		match (self.0, other.0) {
			(Sign::Zero, Sign::Plus)
			| (Sign::Plus, Sign::Zero)
			| (Sign::Zero, Sign::Zero)
			| (Sign::Plus, Sign::Plus)
			| (Sign::Minus, Sign::Minus) => I256(Sign::Plus, d),
			(Sign::Zero, Sign::Minus)
			| (Sign::Plus, Sign::Minus)
			| (Sign::Minus, Sign::Zero)
			| (Sign::Minus, Sign::Plus) => I256(Sign::Minus, d),
		}
	}
}

impl Rem for I256 {
	type Output = I256;

	fn rem(self, other: I256) -> I256 {
		if other.1.is_zero() {
			return I256::zero();
		}

		let r = (self.1 % other.1) & SIGN_BIT_MASK;

		if r.is_zero() {
			return I256::zero();
		}

		I256(self.0, r)
	}
}

#[cfg(test)]
mod tests {
	use std::num::Wrapping;

	use super::*;

	#[test]
	fn div_i256() {
		// Sanity checks based on i8. `Wrapping` is needed since the EVM
		// wraps where Rust would panic.
		assert_eq!(Wrapping(i8::MIN) / Wrapping(-1), Wrapping(i8::MIN));

		assert_eq!(100i8 / -1, -100i8);
		assert_eq!(100i8 / 2, 50i8);

		let one = I256(Sign::Zero, U256::from(1));
		let one_hundred = I256(Sign::Zero, U256::from(100));
		let fifty = I256(Sign::Plus, U256::from(50));
		let two = I256(Sign::Zero, U256::from(2));
		let neg_one_hundred = I256(Sign::Minus, U256::from(100));
		let minus_one = I256(Sign::Minus, U256::from(1));
		let max_value = I256(Sign::Plus, U256::from(2).pow(U256::from(255)) - 1);
		let neg_max_value = I256(Sign::Minus, U256::from(2).pow(U256::from(255)) - 1);

		assert_eq!(I256::min_value() / minus_one, I256::min_value());
		assert_eq!(I256::min_value() / one, I256::min_value());
		assert_eq!(max_value / one, max_value);
		assert_eq!(max_value / minus_one, neg_max_value);

		assert_eq!(one_hundred / minus_one, neg_one_hundred);
		assert_eq!(one_hundred / two, fifty);
	}

	#[test]
	fn rem_i256_keeps_dividend_sign() {
		let minus_seven = I256::from(U256::from(7).overflowing_neg().0);
		let three = I256::from(U256::from(3));
		let r: U256 = (minus_seven % three).into();
		assert_eq!(r, U256::from(1).overflowing_neg().0);
		assert_eq!(minus_seven % I256::zero(), I256::zero());
	}

	#[test]
	fn signed_conversion_round_trips_extremes() {
		let min: U256 = I256::min_value().into();
		assert_eq!(min, U256::one() << 255);
		assert_eq!(I256::from(min), I256::min_value());
		assert_eq!(I256::from(U256::MAX), I256(Sign::Minus, U256::one()));
	}

	#[test]
	fn address_conversion_keeps_low_bytes() {
		let address = H160::repeat_byte(0x11);
		assert_eq!(u256_to_h160(h160_to_u256(address)), address);
		assert_eq!(u256_to_usize(U256::MAX), Err(ExitException::InvalidRange.into()));
	}
}
