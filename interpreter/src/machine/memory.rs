use alloc::vec::Vec;
use core::cmp::{max, min};

use primitive_types::U256;

use crate::{
	arena::{ArenaSlice, SharedArena},
	error::{ExitError, ExitException},
};

/// Linear memory of one frame, carved from the shared arena.
///
/// The backing region only ever grows, in steps of 32 bytes. It is released
/// when the invoker restores the arena checkpoint taken before the frame was
/// created.
#[derive(Debug)]
pub struct Memory {
	arena: SharedArena,
	region: Option<ArenaSlice>,
	effective_len: usize,
	limit: usize,
}

impl Memory {
	/// Create a new memory with the given limit. Nothing is allocated until
	/// the first expansion.
	#[must_use]
	pub fn new(arena: SharedArena, limit: usize) -> Self {
		Self {
			arena,
			region: None,
			effective_len: 0,
			limit,
		}
	}

	/// Memory limit.
	#[must_use]
	pub const fn limit(&self) -> usize {
		self.limit
	}

	/// Bytes of arena backing currently held by this memory.
	#[must_use]
	pub fn len(&self) -> usize {
		self.region.map_or(0, |region| region.len())
	}

	/// Return true if nothing has been allocated yet.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Get the effective length, as reported by `MSIZE`.
	#[must_use]
	pub const fn effective_len(&self) -> usize {
		self.effective_len
	}

	/// Copy of the effective memory range.
	#[must_use]
	pub fn data(&self) -> Vec<u8> {
		self.get(0, self.effective_len)
	}

	/// Resize the memory, making it cover the memory region of `offset..(offset + len)`,
	/// with 32 bytes as the step. If the length is zero, this function does nothing.
	pub fn resize_offset(&mut self, offset: U256, len: U256) -> Result<(), ExitError> {
		if len.is_zero() {
			return Ok(());
		}

		let end = offset
			.checked_add(len)
			.ok_or(ExitException::InvalidRange)?;
		self.resize_end(end)
	}

	/// Resize the memory, making it cover to `end`, with 32 bytes as the step.
	pub fn resize_end(&mut self, end: U256) -> Result<(), ExitError> {
		if end > U256::from(self.limit) {
			return Err(ExitException::MemoryLimitExceeded.into());
		}

		let end = end.as_usize();
		if end > self.effective_len {
			let new_end = next_multiple_of_32(end).ok_or(ExitException::InvalidRange)?;
			self.reserve(new_end)?;
			self.effective_len = new_end;
		}

		Ok(())
	}

	/// Make sure the backing region holds at least `len` bytes.
	fn reserve(&mut self, len: usize) -> Result<(), ExitError> {
		if len > self.limit {
			return Err(ExitException::MemoryLimitExceeded.into());
		}
		let len = next_multiple_of_32(len).ok_or(ExitException::InvalidRange)?;

		let mut arena = self.arena.borrow_mut();
		let region = match self.region {
			Some(region) if region.len() >= len => return Ok(()),
			Some(region) => arena.relocate(region, len, 32)?,
			None => arena.alloc(len, 32)?,
		};
		self.region = Some(region);

		Ok(())
	}

	/// Get memory region at given offset. Bytes past the allocated region
	/// read as zero.
	#[must_use]
	pub fn get(&self, offset: usize, size: usize) -> Vec<u8> {
		let mut ret = alloc::vec![0; size];

		if let Some(region) = self.region {
			let arena = self.arena.borrow();
			let bytes = arena.bytes(&region);
			if offset < bytes.len() {
				let end = min(offset.saturating_add(size), bytes.len());
				ret[..end - offset].copy_from_slice(&bytes[offset..end]);
			}
		}

		ret
	}

	/// Get a 32-byte word at given offset.
	#[must_use]
	pub fn get_word(&self, offset: usize) -> U256 {
		U256::from_big_endian(&self.get(offset, 32))
	}

	/// Set memory region at given offset, zero-filling up to `target_size`
	/// when `value` is shorter. The offset and value are considered untrusted.
	pub fn set(
		&mut self,
		offset: usize,
		value: &[u8],
		target_size: Option<usize>,
	) -> Result<(), ExitError> {
		let target_size = target_size.unwrap_or(value.len());
		if target_size == 0 {
			return Ok(());
		}

		let end = offset
			.checked_add(target_size)
			.ok_or(ExitException::MemoryLimitExceeded)?;
		self.reserve(end)?;

		let Some(region) = self.region else {
			return Err(ExitException::OutOfMemory.into());
		};
		let mut arena = self.arena.borrow_mut();
		let target = &mut arena.bytes_mut(&region)[offset..end];
		let copied = min(value.len(), target_size);
		target[..copied].copy_from_slice(&value[..copied]);
		target[copied..].fill(0);

		Ok(())
	}

	/// Copy `data` into the memory, of given `len`. Source bytes past the end
	/// of `data` are zero.
	pub fn copy_large(
		&mut self,
		memory_offset: U256,
		data_offset: U256,
		len: U256,
		data: &[u8],
	) -> Result<(), ExitError> {
		// A zero-length copy is a no-op regardless of the other inputs.
		if len.is_zero() {
			return Ok(());
		}

		if memory_offset > U256::from(self.limit) || len > U256::from(self.limit) {
			return Err(ExitException::MemoryLimitExceeded.into());
		}
		let memory_offset = memory_offset.as_usize();
		let ulen = len.as_usize();

		let data = match data_offset.checked_add(len) {
			Some(end) if data_offset < U256::from(data.len()) => {
				let data_offset = data_offset.as_usize();
				let end = min(end, U256::from(data.len())).as_usize();
				&data[data_offset..end]
			}
			_ => &[],
		};

		self.set(memory_offset, data, Some(ulen))
	}

	/// Copies part of the memory inside another part of itself, as `MCOPY`
	/// does.
	pub fn copy(&mut self, dst: usize, src: usize, len: usize) -> Result<(), ExitError> {
		if len == 0 {
			return Ok(());
		}

		let end = max(dst, src)
			.checked_add(len)
			.ok_or(ExitException::MemoryLimitExceeded)?;
		self.reserve(end)?;

		let Some(region) = self.region else {
			return Err(ExitException::OutOfMemory.into());
		};
		self.arena
			.borrow_mut()
			.bytes_mut(&region)
			.copy_within(src..src + len, dst);

		Ok(())
	}
}

/// Rounds up `x` to the closest multiple of 32. If `x % 32 == 0` then `x` is returned.
#[inline]
fn next_multiple_of_32(x: usize) -> Option<usize> {
	let r = x.wrapping_neg() & 31;
	x.checked_add(r)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::arena::{ArenaError, GrowingArena};

	fn memory(limit: usize) -> Memory {
		Memory::new(GrowingArena::shared(256, 1 << 16, 200).unwrap(), limit)
	}

	#[test]
	fn test_next_multiple_of_32() {
		// next_multiple_of_32 returns x when it is a multiple of 32
		for i in 0..32 {
			let x = i * 32;
			assert_eq!(Some(x), next_multiple_of_32(x));
		}

		// next_multiple_of_32 rounds up to the nearest multiple of 32 when `x % 32 != 0`
		for x in 0..1024 {
			if x % 32 == 0 {
				continue;
			}
			let next_multiple = x + 32 - (x % 32);
			assert_eq!(Some(next_multiple), next_multiple_of_32(x));
		}

		// next_multiple_of_32 returns None when the next multiple of 32 is too big
		let last_multiple_of_32 = usize::MAX & !31;
		for i in 0..63 {
			let x = usize::MAX - i;
			if x > last_multiple_of_32 {
				assert_eq!(None, next_multiple_of_32(x));
			} else {
				assert_eq!(Some(last_multiple_of_32), next_multiple_of_32(x));
			}
		}
	}

	#[test]
	fn test_memory_copy_works() {
		let mut memory = memory(100);

		// [1,2,3,4] lands at index 3, after three zero bytes.
		memory.set(3, &[1u8, 2, 3, 4], None).unwrap();
		assert_eq!(memory.get(0, 7), [0u8, 0, 0, 1, 2, 3, 4]);

		// Copy 1 byte into index 0.
		memory.copy(0, 3, 1).unwrap();
		assert_eq!(memory.get(0, 7), [1u8, 0, 0, 1, 2, 3, 4]);
	}

	#[test]
	fn test_memory_copy_overlapping() {
		let mut memory = memory(100);

		memory.set(3, &[1u8, 2, 3, 4], None).unwrap();

		// Copy the bytes at indexes 6 and 7, which are [4,0], into index 3.
		memory.copy(3, 6, 2).unwrap();
		assert_eq!(memory.get(0, 8), [0u8, 0, 0, 4, 0, 3, 4, 0]);
	}

	#[test]
	fn resize_rounds_to_words_and_tracks_effective_len() {
		let mut memory = memory(1024);

		memory.resize_offset(U256::from(1), U256::zero()).unwrap();
		assert_eq!(memory.effective_len(), 0);

		memory.resize_offset(U256::from(10), U256::from(1)).unwrap();
		assert_eq!(memory.effective_len(), 32);

		memory.resize_end(U256::from(33)).unwrap();
		assert_eq!(memory.effective_len(), 64);
		assert_eq!(memory.data(), [0u8; 64].to_vec());

		memory.resize_end(U256::from(16)).unwrap();
		assert_eq!(memory.effective_len(), 64);
	}

	#[test]
	fn resize_past_limit_fails() {
		let mut memory = memory(64);

		assert_eq!(
			memory.resize_end(U256::from(65)),
			Err(ExitException::MemoryLimitExceeded.into())
		);
		assert_eq!(
			memory.resize_offset(U256::MAX, U256::from(2)),
			Err(ExitException::InvalidRange.into())
		);
		assert_eq!(memory.effective_len(), 0);
	}

	#[test]
	fn arena_exhaustion_is_out_of_memory() {
		let arena = GrowingArena::shared(64, 128, 200).unwrap();
		let mut memory = Memory::new(arena, 1 << 20);

		memory.resize_end(U256::from(64)).unwrap();
		assert_eq!(
			memory.resize_end(U256::from(4096)),
			Err(ExitError::from(ArenaError::OutOfMemory))
		);
		assert_eq!(memory.effective_len(), 64);
	}

	#[test]
	fn copy_large_pads_with_zeros() {
		let mut memory = memory(1024);

		memory
			.copy_large(U256::zero(), U256::from(2), U256::from(4), &[1, 2, 3, 4])
			.unwrap();
		assert_eq!(memory.get(0, 4), [3u8, 4, 0, 0]);

		memory
			.copy_large(U256::from(8), U256::MAX, U256::from(2), &[1, 2])
			.unwrap();
		assert_eq!(memory.get(8, 2), [0u8, 0]);
		assert_eq!(memory.get_word(0), U256::from(0x0304) << 240);
	}
}
