use alloc::vec::Vec;
use core::cmp::{max, min};

use primitive_types::U256;

use crate::{
	arena::{ArenaSlice, SharedArena},
	error::{ExitError, ExitException},
};

const WORD: usize = 32;
const INITIAL_WORDS: usize = 16;

/// EVM operand stack, bounded by a configured limit.
///
/// Values live in the shared arena as 32-byte big-endian words. The backing
/// region doubles as the stack deepens and, like the frame's memory, goes
/// away when the arena checkpoint taken before the frame is restored.
#[derive(Debug)]
pub struct Stack {
	arena: SharedArena,
	region: Option<ArenaSlice>,
	len: usize,
	limit: usize,
}

macro_rules! impl_perform_popn_pushn {
	(
		$name:ident,
		$pop_len:expr,
		$push_len:expr,
		($($peek_pop:expr),*),
		($($peek_push:expr),*),
		$pop_pushn_f:ident
	) => {
		/// Pop $pop_len values, then push $push_len values computed by `f`.
		/// The stack is unchanged when `f` fails.
		#[allow(unused_parens)]
		pub fn $name<R, F>(&mut self, f: F) -> Result<R, ExitError> where
			F: FnOnce(
				$(impl_perform_popn_pushn!(INTERNAL_TYPE_RU256, $peek_pop)),*
			) -> Result<(($(impl_perform_popn_pushn!(INTERNAL_TYPE_U256, $peek_push)),*), R), ExitError>
		{
			self.check_pop_push($pop_len, $push_len)?;
			self.reserve(self.len - $pop_len + $push_len)?;

			let (p, ret) = f($(&self.unchecked_peek($peek_pop)),*)?;
			self.$pop_pushn_f($pop_len, p);

			Ok(ret)
		}
	};
	(INTERNAL_TYPE_RU256, $e:expr) => { &U256 };
	(INTERNAL_TYPE_U256, $e:expr) => { U256 };
}

impl Stack {
	/// Create a new stack with given limit. Nothing is taken from `arena`
	/// until the first push.
	#[must_use]
	pub fn new(arena: SharedArena, limit: usize) -> Self {
		Self {
			arena,
			region: None,
			len: 0,
			limit,
		}
	}

	/// Stack limit.
	#[inline]
	#[must_use]
	pub const fn limit(&self) -> usize {
		self.limit
	}

	/// Stack length.
	#[inline]
	#[must_use]
	pub const fn len(&self) -> usize {
		self.len
	}

	/// Whether the stack is empty.
	#[inline]
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Copy of the stack values, bottom first.
	#[must_use]
	pub fn data(&self) -> Vec<U256> {
		(0..self.len).map(|index| self.word(index)).collect()
	}

	/// Clear the stack. The backing region is kept.
	pub fn clear(&mut self) {
		self.len = 0;
	}

	/// Pop a value from the stack.
	/// If the stack is already empty, returns the `StackUnderflow` error.
	#[inline]
	pub fn pop(&mut self) -> Result<U256, ExitException> {
		if self.len == 0 {
			return Err(ExitException::StackUnderflow);
		}
		self.len -= 1;
		Ok(self.word(self.len))
	}

	/// Push a new value into the stack.
	/// Fails with `StackOverflow` past the limit, or `OutOfMemory` when the
	/// arena cannot back another word. The stack is unchanged on failure.
	#[inline]
	pub fn push(&mut self, value: U256) -> Result<(), ExitException> {
		if self.len + 1 > self.limit {
			return Err(ExitException::StackOverflow);
		}
		self.reserve(self.len + 1)?;
		self.write_word(self.len, value);
		self.len += 1;
		Ok(())
	}

	/// Check whether it's possible to pop and push enough items in the stack.
	#[inline]
	pub fn check_pop_push(&self, pop: usize, push: usize) -> Result<(), ExitException> {
		if self.len < pop {
			return Err(ExitException::StackUnderflow);
		}
		if self.len - pop + push > self.limit {
			return Err(ExitException::StackOverflow);
		}
		Ok(())
	}

	/// Make sure the backing region holds at least `words` values.
	fn reserve(&mut self, words: usize) -> Result<(), ExitException> {
		let held = self.region.map_or(0, |region| region.len() / WORD);
		if words <= held {
			return Ok(());
		}

		let target = min(max(words, max(held * 2, INITIAL_WORDS)), self.limit);
		let bytes = target
			.checked_mul(WORD)
			.ok_or(ExitException::OutOfMemory)?;

		let mut arena = self.arena.borrow_mut();
		let region = match self.region {
			Some(region) => arena.relocate(region, bytes, WORD)?,
			None => arena.alloc(bytes, WORD)?,
		};
		self.region = Some(region);

		Ok(())
	}

	fn word(&self, index: usize) -> U256 {
		let Some(region) = self.region else {
			return U256::zero();
		};
		let arena = self.arena.borrow();
		let start = index * WORD;
		arena
			.bytes(&region)
			.get(start..start + WORD)
			.map_or_else(U256::zero, U256::from_big_endian)
	}

	fn write_word(&mut self, index: usize, value: U256) {
		let Some(region) = self.region else {
			return;
		};
		let mut arena = self.arena.borrow_mut();
		let start = index * WORD;
		if let Some(target) = arena.bytes_mut(&region).get_mut(start..start + WORD) {
			value.to_big_endian(target);
		}
	}

	fn unchecked_peek(&self, no_from_top: usize) -> U256 {
		self.word(self.len - no_from_top - 1)
	}

	fn unchecked_pop_push1(&mut self, pop: usize, p1: U256) {
		self.len -= pop;
		self.write_word(self.len, p1);
		self.len += 1;
	}

	fn unchecked_pop_push0(&mut self, pop: usize, _p1: ()) {
		self.len -= pop;
	}

	/// Peek a value at given index for the stack, where the top of
	/// the stack is at index `0`. If the index is too large,
	/// `StackUnderflow` is returned.
	#[inline]
	pub fn peek(&self, no_from_top: usize) -> Result<U256, ExitException> {
		if self.len > no_from_top {
			Ok(self.unchecked_peek(no_from_top))
		} else {
			Err(ExitException::StackUnderflow)
		}
	}

	/// Set a value at given index for the stack, where the top of the
	/// stack is at index `0`. If the index is too large,
	/// `StackUnderflow` is returned.
	#[inline]
	pub fn set(&mut self, no_from_top: usize, val: U256) -> Result<(), ExitException> {
		if self.len > no_from_top {
			self.write_word(self.len - no_from_top - 1, val);
			Ok(())
		} else {
			Err(ExitException::StackUnderflow)
		}
	}

	/// Swap the top with the value `n` below it.
	#[inline]
	pub fn swap(&mut self, n: usize) -> Result<(), ExitException> {
		if self.len <= n {
			return Err(ExitException::StackUnderflow);
		}
		let top = self.unchecked_peek(0);
		let other = self.unchecked_peek(n);
		self.write_word(self.len - 1, other);
		self.write_word(self.len - 1 - n, top);
		Ok(())
	}

	/// Pop `N` values at once, the top of the stack first. Nothing is popped
	/// when fewer than `N` values are held.
	pub fn pop_n<const N: usize>(&mut self) -> Result<[U256; N], ExitException> {
		self.check_pop_push(N, 0)?;
		let values = core::array::from_fn(|i| self.unchecked_peek(i));
		self.len -= N;
		Ok(values)
	}

	impl_perform_popn_pushn!(perform_pop1_push0, 1, 0, (0), (), unchecked_pop_push0);
	impl_perform_popn_pushn!(perform_pop1_push1, 1, 1, (0), (0), unchecked_pop_push1);
	impl_perform_popn_pushn!(perform_pop2_push1, 2, 1, (0, 1), (0), unchecked_pop_push1);
	impl_perform_popn_pushn!(perform_pop3_push1, 3, 1, (0, 1, 2), (0), unchecked_pop_push1);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::arena::GrowingArena;

	fn stack(limit: usize) -> Stack {
		Stack::new(GrowingArena::shared(256, 1 << 16, 200).unwrap(), limit)
	}

	#[test]
	fn push_respects_limit() {
		let mut stack = stack(2);
		stack.push(U256::one()).unwrap();
		stack.push(U256::from(2)).unwrap();
		assert_eq!(stack.push(U256::from(3)), Err(ExitException::StackOverflow));
		assert_eq!(stack.len(), 2);
	}

	#[test]
	fn check_pop_push_allows_exact_fill() {
		let mut stack = stack(2);
		stack.push(U256::one()).unwrap();
		assert_eq!(stack.check_pop_push(0, 1), Ok(()));
		assert_eq!(stack.check_pop_push(0, 2), Err(ExitException::StackOverflow));
		assert_eq!(stack.check_pop_push(2, 0), Err(ExitException::StackUnderflow));
	}

	#[test]
	fn perform_pops_in_order() {
		let mut stack = stack(16);
		stack.push(U256::from(3)).unwrap();
		stack.push(U256::from(10)).unwrap();
		let diff = stack
			.perform_pop2_push1(|a, b| Ok((*a - *b, *a)))
			.unwrap();
		assert_eq!(diff, U256::from(10));
		assert_eq!(stack.data(), &[U256::from(7)]);
	}

	#[test]
	fn failed_perform_leaves_stack() {
		let mut stack = stack(16);
		stack.push(U256::one()).unwrap();
		let res: Result<(), _> =
			stack.perform_pop1_push0(|_| Err(ExitException::OutOfGas.into()));
		assert!(res.is_err());
		assert_eq!(stack.len(), 1);
	}

	#[test]
	fn peek_set_swap() {
		let mut stack = stack(16);
		for i in 0..3u64 {
			stack.push(U256::from(i)).unwrap();
		}
		assert_eq!(stack.peek(2), Ok(U256::zero()));
		stack.set(0, U256::from(9)).unwrap();
		stack.swap(2).unwrap();
		assert_eq!(stack.data(), &[U256::from(9), U256::one(), U256::zero()]);
		assert_eq!(stack.swap(3), Err(ExitException::StackUnderflow));
	}

	#[test]
	fn deep_stacks_grow_through_the_arena() {
		let mut stack = stack(1024);
		for i in 0..100u64 {
			stack.push(U256::from(i)).unwrap();
		}
		assert_eq!(stack.len(), 100);
		assert_eq!(stack.peek(99), Ok(U256::zero()));
		assert_eq!(stack.pop(), Ok(U256::from(99)));
		assert_eq!(stack.data()[..3], [U256::zero(), U256::one(), U256::from(2)]);
	}

	#[test]
	fn arena_exhaustion_is_out_of_memory() {
		let arena = GrowingArena::shared(64, 1024, 200).unwrap();
		let mut stack = Stack::new(arena, 1024);

		let mut pushed = 0u64;
		let err = loop {
			match stack.push(U256::from(pushed)) {
				Ok(()) => pushed += 1,
				Err(err) => break err,
			}
		};

		assert_eq!(err, ExitException::OutOfMemory);
		assert!(pushed >= 16 && pushed < 1024);
		assert_eq!(stack.len() as u64, pushed);
		assert_eq!(stack.peek(0), Ok(U256::from(pushed - 1)));
	}

	#[test]
	fn restoring_the_checkpoint_releases_the_stack() {
		let arena = GrowingArena::shared(256, 1 << 16, 200).unwrap();
		let checkpoint = arena.borrow().checkpoint();
		let mut stack = Stack::new(arena.clone(), 1024);
		stack.push(U256::one()).unwrap();
		assert_eq!(arena.borrow().allocated(), 16 * 32);

		drop(stack);
		arena.borrow_mut().restore(checkpoint);
		assert_eq!(arena.borrow().allocated(), 0);
	}

	#[test]
	fn pop_n_takes_the_top_first() {
		let mut stack = stack(16);
		for value in 1..=4u8 {
			stack.push(U256::from(value)).unwrap();
		}

		assert_eq!(stack.pop_n::<3>(), Ok([U256::from(4), U256::from(3), U256::from(2)]));
		assert_eq!(stack.pop_n::<2>(), Err(ExitException::StackUnderflow));
		assert_eq!(stack.len(), 1);
	}
}
