//! Arena-backed Ethereum Virtual Machine.
//!
//! The interpreter itself lives in [arena_evm_interpreter]. This crate adds
//! the configuration, gasometer and call/create invoker of [standard], the
//! [backend] state layers, the [Vm] handle tying them together, and a narrow
//! C ABI in [embed].
//!
//! ## Execution flow
//!
//! A transaction enters through [Vm::execute]. The [standard::Invoker]
//! validates it and builds the root frame, whose linear memory is carved
//! from the VM's [GrowingArena]. Every `CALL`/`CREATE` opcode traps out of
//! the interpreter; the [call_stack] then asks the invoker to enter a
//! sub-frame, checkpointing the arena first, and feeds the child's result
//! back to its parent once it retires. The arena is reset at the end of the
//! transaction, after outputs have been copied out.

#![deny(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod backend;
mod call_stack;
#[cfg(feature = "std")]
pub mod embed;
mod invoker;
pub mod standard;
mod vm;

pub use arena_evm_interpreter::*;
pub use arena_evm_precompile as precompile;

pub use crate::{
	call_stack::transact,
	invoker::{DeconstructFor, Invoker, InvokerControl, TrapFor},
	vm::{CallParams, CallResult, Vm, VmError},
};

/// Merge strategy of a substate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeStrategy {
	/// Fully commit the substate into its parent.
	Commit,
	/// Discard state changes, but return the unused gas. Used for `REVERT`.
	Revert,
	/// Discard state changes and consume all gas.
	Discard,
}

/// A backend that can open nested substates.
pub trait TransactionalBackend {
	/// Push a new substate into the substate stack.
	fn push_substate(&mut self);
	/// Pop the last substate, merging it into its parent with `strategy`.
	fn pop_substate(&mut self, strategy: MergeStrategy) -> Result<(), ExitError>;
}
