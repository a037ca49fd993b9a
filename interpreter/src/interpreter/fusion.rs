use alloc::{vec, vec::Vec};

use crate::opcode::Opcode;

/// Opcodes allowed to take part in a fused `PUSHn` + binary op pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FusionSet([bool; 256]);

impl FusionSet {
	/// No opcode is fused.
	#[must_use]
	pub const fn empty() -> Self {
		Self([false; 256])
	}

	/// `PUSH1` to `PUSH32`, together with every fusable binary op.
	#[must_use]
	pub const fn standard() -> Self {
		let mut set = [false; 256];

		let mut i = 0;
		while i < 256 {
			let opcode = Opcode(i as u8);
			set[i] = opcode.is_push().is_some() || opcode.is_fusable_binop();
			i += 1;
		}

		Self(set)
	}

	/// Remove an opcode, used when its handler has been replaced.
	#[must_use]
	pub const fn without(mut self, opcode: Opcode) -> Self {
		self.0[opcode.as_usize()] = false;
		self
	}

	/// Whether `opcode` may be fused.
	#[must_use]
	pub const fn contains(&self, opcode: Opcode) -> bool {
		self.0[opcode.as_usize()]
	}

	/// Whether nothing can be fused.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.iter().all(|v| !v)
	}
}

impl Default for FusionSet {
	fn default() -> Self {
		Self::empty()
	}
}

/// Positions of `PUSHn` instructions dispatched together with the binary op
/// immediately following their immediate data.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FusionMap(Vec<bool>);

impl FusionMap {
	/// Analyse `code`, fusing only opcodes contained in `set`.
	#[must_use]
	pub fn new(code: &[u8], set: &FusionSet) -> Self {
		if set.is_empty() {
			return Self(Vec::new());
		}

		let mut fused = vec![false; code.len()];

		let mut i = 0;
		while i < code.len() {
			let opcode = Opcode(code[i]);
			if let Some(n) = opcode.is_push() {
				let next = i + 1 + n as usize;
				if let Some(follow) = code.get(next).copied().map(Opcode) {
					// Binary ops are never jump destinations, so the pair
					// cannot be entered halfway.
					if set.contains(opcode) && set.contains(follow) && follow.is_fusable_binop() {
						fused[i] = true;
					}
				}
				i = next;
			} else {
				i += 1;
			}
		}

		Self(fused)
	}

	/// Position of the binary op if the instruction at `position` is fused.
	#[inline]
	#[must_use]
	pub fn fused_op(&self, code: &[u8], position: usize) -> Option<usize> {
		if !self.0.get(position).copied().unwrap_or(false) {
			return None;
		}

		Opcode(code[position])
			.is_push()
			.map(|n| position + 1 + n as usize)
	}

	/// Number of fused pairs.
	#[must_use]
	pub fn count(&self) -> usize {
		self.0.iter().filter(|v| **v).count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fuses_push_followed_by_binop() {
		// PUSH1 1 ADD PUSH2 0 1 MUL STOP
		let code = [0x60, 0x01, 0x01, 0x61, 0x00, 0x01, 0x02, 0x00];
		let map = FusionMap::new(&code, &FusionSet::standard());

		assert_eq!(map.count(), 2);
		assert_eq!(map.fused_op(&code, 0), Some(2));
		assert_eq!(map.fused_op(&code, 3), Some(6));
		assert_eq!(map.fused_op(&code, 2), None);
	}

	#[test]
	fn does_not_fuse_across_jumpdest() {
		// PUSH1 1 JUMPDEST ADD
		let code = [0x60, 0x01, 0x5b, 0x01];
		let map = FusionMap::new(&code, &FusionSet::standard());

		assert_eq!(map.count(), 0);
	}

	#[test]
	fn push_data_is_not_analysed() {
		// PUSH2 0x60 0x01 ADD: the inner bytes are data, but the outer pair fuses.
		let code = [0x61, 0x60, 0x01, 0x01];
		let map = FusionMap::new(&code, &FusionSet::standard());

		assert_eq!(map.fused_op(&code, 0), Some(3));
		assert_eq!(map.fused_op(&code, 1), None);
		assert_eq!(map.count(), 1);
	}

	#[test]
	fn truncated_push_and_non_binops_are_skipped() {
		// PUSH1 1 DIV PUSH1
		let code = [0x60, 0x01, 0x04, 0x60];
		let map = FusionMap::new(&code, &FusionSet::standard());

		assert_eq!(map.count(), 0);
	}

	#[test]
	fn excluded_opcodes_are_not_fused() {
		let code = [0x60, 0x01, 0x01, 0x60, 0x01, 0x03];
		let set = FusionSet::standard().without(Opcode::ADD);
		let map = FusionMap::new(&code, &set);

		assert_eq!(map.fused_op(&code, 0), None);
		assert_eq!(map.fused_op(&code, 3), Some(5));
		assert!(FusionMap::new(&code, &FusionSet::empty()).fused_op(&code, 0).is_none());
	}
}
