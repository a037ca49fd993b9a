use primitive_types::U256;

/// Index of the highest set bit. `value` must not be zero.
pub fn log2floor(value: U256) -> u64 {
	debug_assert!(!value.is_zero());
	let mut l: u64 = 256;
	for i in 0..4 {
		let i = 3 - i;
		if value.0[i] == 0u64 {
			l -= 64;
		} else {
			l -= u64::from(value.0[i].leading_zeros());
			if l == 0 {
				return l;
			}
			return l - 1;
		}
	}
	l
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn highest_bit() {
		assert_eq!(log2floor(U256::one()), 0);
		assert_eq!(log2floor(U256::from(255)), 7);
		assert_eq!(log2floor(U256::from(256)), 8);
		assert_eq!(log2floor(U256::MAX), 255);
	}
}
