mod memory;
mod stack;

use alloc::{rc::Rc, vec::Vec};

pub use self::{memory::Memory, stack::Stack};
use crate::arena::SharedArena;

/// Per-frame limits projected from the VM configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameConfig {
	/// Maximum operand stack depth.
	pub stack_limit: usize,
	/// Maximum linear memory size in bytes.
	pub memory_limit: usize,
}

impl Default for FrameConfig {
	fn default() -> Self {
		Self {
			stack_limit: 1024,
			memory_limit: 0xFF_FFFF,
		}
	}
}

/// Core execution layer for EVM.
///
/// Stack and memory are carved from the frame's arena. Input and return data
/// stay on the heap, since they are handed to the parent frame after the
/// arena has been rolled back.
#[derive(Debug)]
pub struct Machine<S> {
	/// Program data.
	pub(crate) data: Rc<Vec<u8>>,
	/// Program code.
	pub(crate) code: Rc<Vec<u8>>,
	/// Return value. Note the difference between `retbuf`.
	/// A `retval` holds what's returned by the current machine, with `RETURN` or `REVERT` opcode.
	/// A `retbuf` holds the buffer of returned value by sub-calls.
	pub retval: Vec<u8>,
	/// Memory, backed by the arena.
	pub memory: Memory,
	/// Stack.
	pub stack: Stack,
	/// Extra state,
	pub state: S,
}

impl<S> Machine<S> {
	/// Create a new machine with given code and data, carving its stack and
	/// memory from `arena`.
	pub fn new(
		code: Rc<Vec<u8>>,
		data: Rc<Vec<u8>>,
		config: &FrameConfig,
		arena: SharedArena,
		state: S,
	) -> Self {
		Self {
			data,
			code,
			retval: Vec::new(),
			memory: Memory::new(arena.clone(), config.memory_limit),
			stack: Stack::new(arena, config.stack_limit),
			state,
		}
	}

	/// Machine code.
	pub fn code(&self) -> &[u8] {
		&self.code
	}

	/// Machine input data.
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	/// Whether the machine has empty code.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.code.is_empty()
	}
}
