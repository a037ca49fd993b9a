//! Core layer for the arena-backed EVM: machine, opcode tables and the
//! growing arena its memory is carved from.

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod arena;
pub mod error;
pub mod etable;
pub mod eval;
pub mod interpreter;
pub mod machine;
pub mod opcode;
pub mod runtime;
pub mod safety;
pub mod utils;

pub use self::{
	arena::{ArenaCheckpoint, ArenaError, ArenaSlice, GrowingArena, SharedArena},
	error::{Capture, ExitError, ExitException, ExitFatal, ExitResult, ExitSucceed},
	etable::{Control, Efn, Etable, EtableSet},
	interpreter::{
		EtableInterpreter, FusionMap, FusionSet, Interpreter, RunInterpreter, StepInterpreter,
		Valids,
	},
	machine::{FrameConfig, Machine, Memory, Stack},
	opcode::Opcode,
	runtime::{
		Context, GasState, Log, RuntimeBackend, RuntimeBaseBackend, RuntimeEnvironment,
		RuntimeState, TransactionContext, Transfer,
	},
	safety::{DepthType, LoopSafetyCounter},
};
