use core::cmp::min;

use primitive_types::U256;

use crate::{
	error::{ExitError, ExitException, ExitSucceed},
	etable::Control,
	machine::Machine,
};

#[inline]
pub fn codesize<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	let size = U256::from(state.code.len());
	push_u256!(state, size);
	Control::Continue
}

#[inline]
pub fn codecopy<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, memory_offset, code_offset, len);

	try_or_fail!(state.memory.resize_offset(memory_offset, len));
	try_or_fail!(state
		.memory
		.copy_large(memory_offset, code_offset, len, &state.code));
	Control::Continue
}

#[inline]
pub fn calldataload<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, index);

	let mut load = [0u8; 32];
	if index < U256::from(state.data.len()) {
		let index = index.as_usize();
		let end = min(index + 32, state.data.len());
		load[..end - index].copy_from_slice(&state.data[index..end]);
	}

	push_u256!(state, U256::from_big_endian(&load));
	Control::Continue
}

#[inline]
pub fn calldatasize<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	let len = U256::from(state.data.len());
	push_u256!(state, len);
	Control::Continue
}

#[inline]
pub fn calldatacopy<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, memory_offset, data_offset, len);

	try_or_fail!(state.memory.resize_offset(memory_offset, len));
	if len.is_zero() {
		return Control::Continue;
	}

	try_or_fail!(state
		.memory
		.copy_large(memory_offset, data_offset, len, &state.data));
	Control::Continue
}

#[inline]
pub fn pop<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, _val);
	Control::Continue
}

#[inline]
pub fn mload<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, index);
	try_or_fail!(state.memory.resize_offset(index, U256::from(32)));
	let index = as_usize_or_fail!(index);
	let value = state.memory.get_word(index);
	push_u256!(state, value);
	Control::Continue
}

#[inline]
pub fn mstore<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, index, value);
	try_or_fail!(state.memory.resize_offset(index, U256::from(32)));
	let index = as_usize_or_fail!(index);
	let mut word = [0u8; 32];
	value.to_big_endian(&mut word);
	try_or_fail!(state.memory.set(index, &word, Some(32)));
	Control::Continue
}

#[inline]
pub fn mstore8<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, index, value);
	try_or_fail!(state.memory.resize_offset(index, U256::one()));
	let index = as_usize_or_fail!(index);
	let value = value.byte(0);
	try_or_fail!(state.memory.set(index, &[value], Some(1)));
	Control::Continue
}

#[inline]
pub fn mcopy<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, dst, src, len);
	if len.is_zero() {
		return Control::Continue;
	}

	try_or_fail!(state.memory.resize_offset(core::cmp::max(dst, src), len));
	let dst = as_usize_or_fail!(dst);
	let src = as_usize_or_fail!(src);
	let len = as_usize_or_fail!(len);
	try_or_fail!(state.memory.copy(dst, src, len));
	Control::Continue
}

#[inline]
pub fn jump<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, dest);
	let dest = as_usize_or_fail!(dest, ExitException::InvalidJump);

	Control::Jump(dest)
}

#[inline]
pub fn jumpi<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, dest, value);

	if value.is_zero() {
		Control::Continue
	} else {
		let dest = as_usize_or_fail!(dest, ExitException::InvalidJump);
		Control::Jump(dest)
	}
}

#[inline]
pub fn pc<S, Tr>(state: &mut Machine<S>, position: usize) -> Control<Tr> {
	push_u256!(state, U256::from(position));
	Control::Continue
}

#[inline]
pub fn msize<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	push_u256!(state, U256::from(state.memory.effective_len()));
	Control::Continue
}

/// Immediate of a `PUSHn` at `position`, zero-padded past the code end.
#[inline]
pub fn push_value(code: &[u8], n: usize, position: usize) -> U256 {
	let start = min(position + 1, code.len());
	let end = min(position + 1 + n, code.len());
	let slice = &code[start..end];
	let mut val = [0u8; 32];
	val[(32 - n)..(32 - n + slice.len())].copy_from_slice(slice);

	U256::from_big_endian(&val)
}

#[inline]
pub fn push<S, Tr>(state: &mut Machine<S>, n: usize, position: usize) -> Control<Tr> {
	let value = push_value(&state.code, n, position);
	push_u256!(state, value);
	Control::ContinueN(1 + n)
}

#[inline]
pub fn push0<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	push_u256!(state, U256::zero());
	Control::Continue
}

#[inline]
pub fn dup<S, Tr>(state: &mut Machine<S>, n: usize) -> Control<Tr> {
	let value = try_or_fail!(state.stack.peek(n - 1));
	push_u256!(state, value);
	Control::Continue
}

#[inline]
pub fn swap<S, Tr>(state: &mut Machine<S>, n: usize) -> Control<Tr> {
	try_or_fail!(state.stack.swap(n));
	Control::Continue
}

/// Copy the returned range out of the arena into `retval`.
#[inline]
fn copy_out<S>(state: &mut Machine<S>, start: U256, len: U256) -> Result<(), ExitError> {
	state.memory.resize_offset(start, len)?;
	state.retval = if len.is_zero() {
		alloc::vec::Vec::new()
	} else {
		let start = crate::utils::u256_to_usize(start)?;
		let len = crate::utils::u256_to_usize(len)?;
		state.memory.get(start, len)
	};
	Ok(())
}

#[inline]
pub fn ret<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, start, len);
	try_or_fail!(copy_out(state, start, len));
	Control::Exit(ExitSucceed::Returned.into())
}

#[inline]
pub fn revert<S, Tr>(state: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(state, start, len);
	try_or_fail!(copy_out(state, start, len));
	Control::Exit(ExitError::Reverted.into())
}
