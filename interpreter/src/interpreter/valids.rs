use alloc::{vec, vec::Vec};

use crate::opcode::Opcode;

/// Mapping of valid jump destination from code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Valids(Vec<bool>);

impl Valids {
	/// Create a new valid mapping from given code bytes.
	#[must_use]
	pub fn new(code: &[u8]) -> Self {
		let mut valids = vec![false; code.len()];

		let mut i = 0;
		while i < code.len() {
			let opcode = Opcode(code[i]);
			if opcode == Opcode::JUMPDEST {
				valids[i] = true;
				i += 1;
			} else if let Some(v) = opcode.is_push() {
				i += v as usize + 1;
			} else {
				i += 1;
			}
		}

		Self(valids)
	}

	/// Returns `true` if the position is a valid jump destination.
	/// If not, returns `false`.
	#[must_use]
	pub fn is_valid(&self, position: usize) -> bool {
		self.0.get(position).copied().unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn jumpdest_inside_push_data_is_invalid() {
		// JUMPDEST PUSH2 0x5b 0x5b JUMPDEST
		let valids = Valids::new(&[0x5b, 0x61, 0x5b, 0x5b, 0x5b]);

		assert!(valids.is_valid(0));
		assert!(!valids.is_valid(1));
		assert!(!valids.is_valid(2));
		assert!(!valids.is_valid(3));
		assert!(valids.is_valid(4));
		assert!(!valids.is_valid(5));
		assert!(!valids.is_valid(usize::MAX));
	}

	#[test]
	fn truncated_push_at_end() {
		let valids = Valids::new(&[0x7f, 0x5b]);

		assert!(!valids.is_valid(1));
	}
}
