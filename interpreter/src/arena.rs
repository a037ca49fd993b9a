//! Growing bump arena backing the linear memory of all frames in a call tree.
//!
//! Allocations are addressed through [ArenaSlice] handles, so no pointer into
//! the arena ever escapes. Lifetimes are strictly nested: a child frame takes a
//! [ArenaCheckpoint] on entry and restores it when it retires, and the whole
//! arena is reset at transaction boundaries.

use alloc::{boxed::Box, collections::TryReserveError, rc::Rc, vec::Vec};
use core::{
	cell::RefCell,
	cmp::{max, min},
	fmt,
};

/// Arena shared by every frame of one VM instance.
pub type SharedArena = Rc<RefCell<GrowingArena>>;

/// Arena error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArenaError {
	/// The request cannot be satisfied without exceeding the capacity
	/// ceiling, or the backing allocator refused to hand out more memory.
	OutOfMemory,
}

impl fmt::Display for ArenaError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::OutOfMemory => f.write_str("arena out of memory"),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for ArenaError {}

impl From<TryReserveError> for ArenaError {
	fn from(_: TryReserveError) -> Self {
		Self::OutOfMemory
	}
}

/// Source of raw chunks for the arena.
#[auto_impl::auto_impl(&, Box, Rc)]
pub trait BackingAllocator {
	/// Allocate a zeroed chunk of exactly `len` bytes.
	fn allocate(&self, len: usize) -> Result<Vec<u8>, ArenaError>;
}

/// Backing allocator using the global allocator, reporting failures instead
/// of aborting.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBacking;

impl BackingAllocator for SystemBacking {
	fn allocate(&self, len: usize) -> Result<Vec<u8>, ArenaError> {
		let mut chunk = Vec::new();
		chunk.try_reserve_exact(len)?;
		chunk.resize(len, 0);
		Ok(chunk)
	}
}

/// Handle of one allocation inside the arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArenaSlice {
	chunk: usize,
	offset: usize,
	len: usize,
}

impl ArenaSlice {
	/// Length of the allocation in bytes.
	#[must_use]
	pub const fn len(&self) -> usize {
		self.len
	}

	/// Whether the allocation is empty.
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.len == 0
	}

	const fn end(&self) -> usize {
		self.offset + self.len
	}
}

/// Arena position that can be restored later, releasing everything
/// allocated after it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArenaCheckpoint {
	chunk: usize,
	used: usize,
	last: Option<ArenaSlice>,
}

struct Chunk {
	data: Vec<u8>,
	used: usize,
}

/// Bump allocator with geometric growth and a capacity ceiling.
pub struct GrowingArena {
	backing: Box<dyn BackingAllocator>,
	chunks: Vec<Chunk>,
	current: usize,
	last: Option<ArenaSlice>,
	initial_capacity: usize,
	max_capacity: usize,
	growth_factor_percent: usize,
}

impl fmt::Debug for GrowingArena {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GrowingArena")
			.field("chunks", &self.chunks.len())
			.field("current_capacity", &self.current_capacity())
			.field("allocated", &self.allocated())
			.field("initial_capacity", &self.initial_capacity)
			.field("max_capacity", &self.max_capacity)
			.field("growth_factor_percent", &self.growth_factor_percent)
			.finish()
	}
}

impl GrowingArena {
	/// Create a new arena, preallocating `initial_capacity` bytes from
	/// `backing`.
	pub fn init<B: BackingAllocator + 'static>(
		backing: B,
		initial_capacity: usize,
		max_capacity: usize,
		growth_factor_percent: usize,
	) -> Result<Self, ArenaError> {
		let mut arena = Self {
			backing: Box::new(backing),
			chunks: Vec::new(),
			current: 0,
			last: None,
			initial_capacity,
			max_capacity: max(max_capacity, initial_capacity),
			growth_factor_percent,
		};
		arena.preallocate(initial_capacity)?;
		arena.reset_retain_capacity()?;

		Ok(arena)
	}

	/// Create a new arena against the global allocator and share it.
	pub fn shared(
		initial_capacity: usize,
		max_capacity: usize,
		growth_factor_percent: usize,
	) -> Result<SharedArena, ArenaError> {
		Ok(Rc::new(RefCell::new(Self::init(
			SystemBacking,
			initial_capacity,
			max_capacity,
			growth_factor_percent,
		)?)))
	}

	/// Total bytes currently owned by the arena.
	#[must_use]
	pub fn current_capacity(&self) -> usize {
		self.chunks.iter().map(|chunk| chunk.data.len()).sum()
	}

	/// Bytes handed out since the last reset, including alignment padding.
	#[must_use]
	pub fn allocated(&self) -> usize {
		self.chunks.iter().map(|chunk| chunk.used).sum()
	}

	/// Capacity preallocated on init and on [Self::reset_to_initial_capacity].
	#[must_use]
	pub const fn initial_capacity(&self) -> usize {
		self.initial_capacity
	}

	/// Capacity ceiling.
	#[must_use]
	pub const fn max_capacity(&self) -> usize {
		self.max_capacity
	}

	/// Allocate `len` zeroed bytes, with the offset aligned to `align`.
	pub fn alloc(&mut self, len: usize, align: usize) -> Result<ArenaSlice, ArenaError> {
		let align = max(align, 1);

		if let Some(slice) = self.bump(len, align) {
			return Ok(slice);
		}

		self.grow(len, align)?;
		self.bump(len, align).ok_or(ArenaError::OutOfMemory)
	}

	/// Release an allocation. Only the most recent allocation is actually
	/// rolled back; anything else stays in use until the next reset.
	pub fn free(&mut self, slice: ArenaSlice) {
		if self.last != Some(slice) {
			return;
		}

		if let Some(chunk) = self.chunks.get_mut(slice.chunk) {
			if chunk.used == slice.end() {
				chunk.used = slice.offset;
			}
		}
		self.last = None;
	}

	/// Resize an allocation in place. Shrinking always succeeds. Growing
	/// only succeeds for the most recent allocation when its chunk has room.
	pub fn resize(&mut self, slice: &mut ArenaSlice, new_len: usize) -> bool {
		let is_last = self.last == Some(*slice);

		if new_len <= slice.len {
			if is_last {
				if let Some(chunk) = self.chunks.get_mut(slice.chunk) {
					chunk.used = slice.offset + new_len;
				}
			}
			slice.len = new_len;
			if is_last {
				self.last = Some(*slice);
			}
			return true;
		}

		if !is_last {
			return false;
		}

		let Some(chunk) = self.chunks.get_mut(slice.chunk) else {
			return false;
		};
		let Some(new_end) = slice.offset.checked_add(new_len) else {
			return false;
		};
		if new_end > chunk.data.len() {
			return false;
		}

		chunk.data[slice.end()..new_end].fill(0);
		chunk.used = new_end;
		slice.len = new_len;
		self.last = Some(*slice);
		true
	}

	/// Moving an allocation to a new place is not supported.
	pub fn remap(&mut self, _slice: ArenaSlice, _new_len: usize) -> Option<ArenaSlice> {
		None
	}

	/// Grow an allocation to `new_len`, in place when possible, otherwise by
	/// allocating a new region and copying the old content over. The old
	/// region is not released.
	pub fn relocate(
		&mut self,
		slice: ArenaSlice,
		new_len: usize,
		align: usize,
	) -> Result<ArenaSlice, ArenaError> {
		let mut resized = slice;
		if self.resize(&mut resized, new_len) {
			return Ok(resized);
		}

		let target = self.alloc(new_len, align)?;
		let copy_len = min(slice.len, new_len);

		if target.chunk == slice.chunk {
			let data = &mut self.chunks[slice.chunk].data;
			data.copy_within(slice.offset..slice.offset + copy_len, target.offset);
		} else if target.chunk > slice.chunk {
			let (low, high) = self.chunks.split_at_mut(target.chunk);
			high[0].data[target.offset..target.offset + copy_len]
				.copy_from_slice(&low[slice.chunk].data[slice.offset..slice.offset + copy_len]);
		} else {
			let (low, high) = self.chunks.split_at_mut(slice.chunk);
			low[target.chunk].data[target.offset..target.offset + copy_len]
				.copy_from_slice(&high[0].data[slice.offset..slice.offset + copy_len]);
		}

		Ok(target)
	}

	/// Bytes of an allocation.
	#[must_use]
	pub fn bytes(&self, slice: &ArenaSlice) -> &[u8] {
		self.chunks
			.get(slice.chunk)
			.and_then(|chunk| chunk.data.get(slice.offset..slice.end()))
			.unwrap_or_default()
	}

	/// Mutable bytes of an allocation.
	pub fn bytes_mut(&mut self, slice: &ArenaSlice) -> &mut [u8] {
		self.chunks
			.get_mut(slice.chunk)
			.and_then(|chunk| chunk.data.get_mut(slice.offset..slice.end()))
			.unwrap_or_default()
	}

	/// Current bump position.
	#[must_use]
	pub fn checkpoint(&self) -> ArenaCheckpoint {
		ArenaCheckpoint {
			chunk: self.current,
			used: self.chunks.get(self.current).map_or(0, |chunk| chunk.used),
			last: self.last,
		}
	}

	/// Release everything allocated after `checkpoint`. Capacity is kept, and
	/// the allocation that was the most recent one at checkpoint time can be
	/// grown in place again.
	pub fn restore(&mut self, checkpoint: ArenaCheckpoint) {
		for chunk in self.chunks.iter_mut().skip(checkpoint.chunk + 1) {
			chunk.used = 0;
		}
		if let Some(chunk) = self.chunks.get_mut(checkpoint.chunk) {
			chunk.used = min(chunk.used, checkpoint.used);
		}
		self.current = checkpoint.chunk;
		self.last = checkpoint.last;
	}

	/// Release all allocations. When capacity grew beyond the ceiling, the
	/// arena is rebuilt with exactly `max_capacity`; otherwise the current
	/// capacity is retained, coalesced into a single chunk.
	pub fn reset_retain_capacity(&mut self) -> Result<(), ArenaError> {
		let capacity = self.current_capacity();

		if capacity > self.max_capacity {
			self.chunks.clear();
			self.preallocate(self.max_capacity)?;
		} else if self.chunks.len() > 1 {
			self.chunks.clear();
			self.preallocate(capacity)?;
		} else {
			for chunk in &mut self.chunks {
				chunk.used = 0;
			}
		}

		self.current = 0;
		self.last = None;
		log::debug!(target: "evm", "arena reset, retaining {} bytes", self.current_capacity());
		Ok(())
	}

	/// Release all memory and preallocate `initial_capacity` again.
	pub fn reset_to_initial_capacity(&mut self) -> Result<(), ArenaError> {
		self.chunks.clear();
		self.current = 0;
		self.last = None;
		self.preallocate(self.initial_capacity)?;
		log::debug!(target: "evm", "arena reset to initial {} bytes", self.initial_capacity);
		Ok(())
	}

	fn preallocate(&mut self, len: usize) -> Result<(), ArenaError> {
		if len == 0 {
			return Ok(());
		}

		let data = self.backing.allocate(len)?;
		self.chunks.push(Chunk { data, used: 0 });
		Ok(())
	}

	fn bump(&mut self, len: usize, align: usize) -> Option<ArenaSlice> {
		for index in self.current..self.chunks.len() {
			let chunk = &mut self.chunks[index];
			let offset = align_up(chunk.used, align)?;
			let end = offset.checked_add(len)?;

			if end <= chunk.data.len() {
				chunk.data[offset..end].fill(0);
				chunk.used = end;
				self.current = index;

				let slice = ArenaSlice {
					chunk: index,
					offset,
					len,
				};
				self.last = Some(slice);
				return Some(slice);
			}
		}

		None
	}

	/// Grow geometrically until the capacity covers what is in use plus
	/// `len`, and add the difference as a new chunk.
	///
	/// Only the bytes in use count against the ceiling. The new chunk always
	/// holds `len` at `align`, so the total capacity may briefly pass
	/// `max_capacity`; [Self::reset_retain_capacity] brings it back.
	fn grow(&mut self, len: usize, align: usize) -> Result<(), ArenaError> {
		let used = self.allocated();
		let fits = used
			.checked_add(len)
			.is_some_and(|total| total <= self.max_capacity);
		if !fits {
			return Err(ArenaError::OutOfMemory);
		}

		let needed = len
			.checked_add(align - 1)
			.ok_or(ArenaError::OutOfMemory)?;
		let required = used.saturating_add(needed);
		let current = self.current_capacity();

		let mut capacity = max(current, 1);
		while capacity < required {
			let grown = capacity.saturating_mul(self.growth_factor_percent) / 100;
			capacity = max(grown, capacity.saturating_add(1));
		}
		let capacity = min(capacity, self.max_capacity);
		let chunk = max(capacity.saturating_sub(current), needed);

		self.preallocate(chunk)?;
		self.current = self.chunks.len() - 1;
		log::debug!(
			target: "evm",
			"arena grown from {} to {} bytes",
			current,
			current + chunk,
		);
		Ok(())
	}
}

fn align_up(value: usize, align: usize) -> Option<usize> {
	let rem = value % align;
	if rem == 0 {
		Some(value)
	} else {
		value.checked_add(align - rem)
	}
}
