//! Interpreters driving a [Machine] to completion or to a trap.

mod etable;
mod fusion;
mod valids;

use alloc::vec::Vec;

pub use self::{
	etable::EtableInterpreter,
	fusion::{FusionMap, FusionSet},
	valids::Valids,
};
use crate::{
	error::{Capture, ExitResult},
	machine::Machine,
};

/// An interpreter owning a machine.
pub trait Interpreter {
	/// Machine state.
	type State;

	/// Reference to the underlying machine.
	fn machine(&self) -> &Machine<Self::State>;
	/// Mutable reference to the underlying machine.
	fn machine_mut(&mut self) -> &mut Machine<Self::State>;

	/// Take out the machine state and the returned value.
	fn deconstruct(self) -> (Self::State, Vec<u8>);
	/// Move past the current opcode, used after a trap has been resolved.
	fn advance(&mut self);
}

/// An interpreter that can run against a handle.
pub trait RunInterpreter<H>: Interpreter {
	type Trap;

	/// Run until exit or trap.
	fn run(&mut self, handle: &mut H) -> Capture<ExitResult, Self::Trap>;
}

/// An interpreter that can be single-stepped.
pub trait StepInterpreter<H>: RunInterpreter<H> {
	/// Execute one instruction, or one fused pair.
	fn step(&mut self, handle: &mut H) -> Result<(), Capture<ExitResult, Self::Trap>>;
}
