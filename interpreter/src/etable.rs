use core::{
	marker::PhantomData,
	ops::{Deref, DerefMut},
};

use crate::{
	error::{CallCreateTrap, ExitResult},
	eval::*,
	machine::Machine,
	opcode::Opcode,
	runtime::{GasState, RuntimeBackend, RuntimeEnvironment, RuntimeState},
};

/// What the interpreter does after a handler returns.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Control<Trap> {
	/// Continue with the next opcode.
	Continue,
	/// Skip `n` bytes, used by `PUSHn`.
	ContinueN(usize),
	/// Exit the frame.
	Exit(ExitResult),
	/// Jump to the given position, which is yet to be validated.
	Jump(usize),
	/// Trap out to the invoker.
	Trap(Trap),
}

/// A set of evaluation tables, dispatched by opcode.
pub trait EtableSet {
	type State;
	type Handle;
	type Trap;

	/// Evaluate one opcode at `position`.
	fn eval(
		&self,
		machine: &mut Machine<Self::State>,
		handle: &mut Self::Handle,
		opcode: Opcode,
		position: usize,
	) -> Control<Self::Trap>;

	/// Evaluate the `PUSHn` at `push_position` together with the binary op at
	/// `op_position` right after it. Errors surface in the same order as two
	/// separate steps would raise them. On `Continue`, the caller resumes
	/// after the op.
	fn eval_fused(
		&self,
		machine: &mut Machine<Self::State>,
		handle: &mut Self::Handle,
		push_position: usize,
		op_position: usize,
	) -> Control<Self::Trap> {
		let push = Opcode(machine.code()[push_position]);
		match self.eval(machine, handle, push, push_position) {
			Control::Continue | Control::ContinueN(_) => (),
			ret => return ret,
		}

		let op = Opcode(machine.code()[op_position]);
		self.eval(machine, handle, op, op_position)
	}
}

impl<S, H, Tr, F> EtableSet for Etable<S, H, Tr, F>
where
	F: Fn(&mut Machine<S>, &mut H, Opcode, usize) -> Control<Tr>,
{
	type State = S;
	type Handle = H;
	type Trap = Tr;

	fn eval(
		&self,
		machine: &mut Machine<S>,
		handle: &mut H,
		opcode: Opcode,
		position: usize,
	) -> Control<Tr> {
		self[opcode.as_usize()](machine, handle, opcode, position)
	}

	/// Runs the built-in push and op semantics directly, without going through
	/// the table. Only opcodes whose entries were not overridden may be fused.
	fn eval_fused(
		&self,
		machine: &mut Machine<S>,
		_handle: &mut H,
		push_position: usize,
		op_position: usize,
	) -> Control<Tr> {
		if let Err(e) = machine.stack.check_pop_push(0, 1) {
			return Control::Exit(Err(e.into()));
		}

		let push = Opcode(machine.code()[push_position]);
		let op = Opcode(machine.code()[op_position]);
		let n = push.is_push().map_or(0, usize::from);
		let value = push_value(machine.code(), n, push_position);

		eval_fused_binop(machine, value, op)
	}
}

/// A gas table evaluated before an execution table. The execution table only
/// runs when the gas table returns `Continue`.
impl<S, H, Tr, ES1, ES2> EtableSet for (ES1, ES2)
where
	ES1: EtableSet<State = S, Handle = H, Trap = Tr>,
	ES2: EtableSet<State = S, Handle = H, Trap = Tr>,
{
	type State = S;
	type Handle = H;
	type Trap = Tr;

	fn eval(
		&self,
		machine: &mut Machine<S>,
		handle: &mut H,
		opcode: Opcode,
		position: usize,
	) -> Control<Tr> {
		let mut ret = self.0.eval(machine, handle, opcode, position);

		if matches!(ret, Control::Continue) {
			ret = self.1.eval(machine, handle, opcode, position);
		}

		ret
	}

	fn eval_fused(
		&self,
		machine: &mut Machine<S>,
		handle: &mut H,
		push_position: usize,
		op_position: usize,
	) -> Control<Tr> {
		let push = Opcode(machine.code()[push_position]);
		match self.0.eval(machine, handle, push, push_position) {
			Control::Continue => (),
			ret => return ret,
		}
		if let Err(e) = machine.stack.check_pop_push(0, 1) {
			return Control::Exit(Err(e.into()));
		}

		let op = Opcode(machine.code()[op_position]);
		match self.0.eval(machine, handle, op, op_position) {
			Control::Continue => (),
			ret => return ret,
		}

		self.1.eval_fused(machine, handle, push_position, op_position)
	}
}

/// Signature of a table entry.
pub type Efn<S, H, Tr> = fn(&mut Machine<S>, &mut H, Opcode, usize) -> Control<Tr>;

/// One handler per opcode byte. `F` is a plain function pointer unless
/// overrides install closures.
pub struct Etable<S, H, Tr, F = Efn<S, H, Tr>>([F; 256], PhantomData<fn() -> (S, H, Tr)>);

impl<S, H, Tr, F: Clone> Clone for Etable<S, H, Tr, F> {
	fn clone(&self) -> Self {
		Self(self.0.clone(), PhantomData)
	}
}

impl<S, H, Tr, F> Deref for Etable<S, H, Tr, F> {
	type Target = [F; 256];

	fn deref(&self) -> &[F; 256] {
		&self.0
	}
}

impl<S, H, Tr, F> DerefMut for Etable<S, H, Tr, F> {
	fn deref_mut(&mut self) -> &mut [F; 256] {
		&mut self.0
	}
}

impl<S, H, Tr, F: Copy> Etable<S, H, Tr, F> {
	/// `f` at every entry.
	pub const fn single(f: F) -> Self {
		Self([f; 256], PhantomData)
	}
}

/// Points `opcode`s of `table` at handlers. A `first..=last` range points
/// every opcode in between at the same handler.
macro_rules! route {
	($table:expr; $($first:ident $(..= $last:ident)? => $f:ident),* $(,)?) => {
		$(
			let mut i = Opcode::$first.as_usize();
			let end = route!(@last $first $($last)?);
			while i <= end {
				$table[i] = $f as _;
				i += 1;
			}
		)*
	};
	(@last $first:ident) => { Opcode::$first.as_usize() };
	(@last $first:ident $last:ident) => { Opcode::$last.as_usize() };
}

impl<S, H, Tr> Etable<S, H, Tr> {
	/// Every entry continues without effect. Filler for gas tables.
	#[must_use]
	pub const fn pass() -> Self {
		Self([eval_pass as _; 256], PhantomData)
	}

	/// Opcodes answered from the frame alone: arithmetic, stack, memory,
	/// control flow and the frame's own code and input.
	#[must_use]
	pub const fn core() -> Self {
		let mut table = [eval_unknown as _; 256];

		route!(table;
			STOP => eval_stop,
			ADD => eval_add,
			MUL => eval_mul,
			SUB => eval_sub,
			DIV => eval_div,
			SDIV => eval_sdiv,
			MOD => eval_mod,
			SMOD => eval_smod,
			ADDMOD => eval_addmod,
			MULMOD => eval_mulmod,
			EXP => eval_exp,
			SIGNEXTEND => eval_signextend,
			LT => eval_lt,
			GT => eval_gt,
			SLT => eval_slt,
			SGT => eval_sgt,
			EQ => eval_eq,
			ISZERO => eval_iszero,
			AND => eval_and,
			OR => eval_or,
			XOR => eval_xor,
			NOT => eval_not,
			BYTE => eval_byte,
			SHL => eval_shl,
			SHR => eval_shr,
			SAR => eval_sar,
			CALLDATALOAD => eval_calldataload,
			CALLDATASIZE => eval_calldatasize,
			CALLDATACOPY => eval_calldatacopy,
			CODESIZE => eval_codesize,
			CODECOPY => eval_codecopy,
			POP => eval_pop,
			MLOAD => eval_mload,
			MSTORE => eval_mstore,
			MSTORE8 => eval_mstore8,
			JUMP => eval_jump,
			JUMPI => eval_jumpi,
			PC => eval_pc,
			MSIZE => eval_msize,
			JUMPDEST => eval_pass,
			MCOPY => eval_mcopy,
			PUSH0 => eval_push0,
			PUSH1..=PUSH32 => eval_push,
			DUP1..=DUP16 => eval_dup,
			SWAP1..=SWAP16 => eval_swap,
			RETURN => eval_return,
			REVERT => eval_revert,
			INVALID => eval_invalid,
		);

		Self(table, PhantomData)
	}
}

impl<S, H, Tr> Etable<S, H, Tr>
where
	S: AsRef<RuntimeState> + GasState,
	H: RuntimeEnvironment + RuntimeBackend,
	Tr: From<CallCreateTrap>,
{
	/// [`Etable::core`] plus everything that reads the transaction, the
	/// block or accounts. Calls and creates trap out to the invoker.
	#[must_use]
	pub const fn runtime() -> Self {
		let mut table = Self::core();

		route!(table.0;
			KECCAK256 => eval_sha3,
			ADDRESS => eval_address,
			BALANCE => eval_balance,
			ORIGIN => eval_origin,
			CALLER => eval_caller,
			CALLVALUE => eval_callvalue,
			GASPRICE => eval_gasprice,
			EXTCODESIZE => eval_extcodesize,
			EXTCODECOPY => eval_extcodecopy,
			RETURNDATASIZE => eval_returndatasize,
			RETURNDATACOPY => eval_returndatacopy,
			EXTCODEHASH => eval_extcodehash,
			BLOCKHASH => eval_blockhash,
			COINBASE => eval_coinbase,
			TIMESTAMP => eval_timestamp,
			NUMBER => eval_number,
			PREVRANDAO => eval_prevrandao,
			GASLIMIT => eval_gaslimit,
			CHAINID => eval_chainid,
			SELFBALANCE => eval_selfbalance,
			BASEFEE => eval_basefee,
			BLOBHASH => eval_blobhash,
			BLOBBASEFEE => eval_blobbasefee,
			SLOAD => eval_sload,
			SSTORE => eval_sstore,
			GAS => eval_gas,
			TLOAD => eval_tload,
			TSTORE => eval_tstore,
			LOG0..=LOG4 => eval_log,
			CREATE => eval_call_create_trap,
			CALL => eval_call_create_trap,
			CALLCODE => eval_call_create_trap,
			DELEGATECALL => eval_call_create_trap,
			CREATE2 => eval_call_create_trap,
			STATICCALL => eval_call_create_trap,
			SELFDESTRUCT => eval_selfdestruct,
		);

		table
	}
}

#[cfg(test)]
mod tests {
	use alloc::{rc::Rc, vec};

	use primitive_types::U256;

	use super::*;
	use crate::{
		arena::GrowingArena,
		error::{ExitException, ExitSucceed},
		machine::FrameConfig,
	};

	type Table = Etable<(), (), ()>;

	fn machine(code: Vec<u8>) -> Machine<()> {
		Machine::new(
			Rc::new(code),
			Rc::new(Vec::new()),
			&FrameConfig::default(),
			GrowingArena::shared(1024, 1 << 16, 200).unwrap(),
			(),
		)
	}

	#[test]
	fn core_table_evaluates_arithmetic() {
		let table = Table::core();
		let mut machine = machine(vec![0x60, 0x02, 0x60, 0x03, 0x01]);

		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::PUSH1, 0),
			Control::ContinueN(2)
		);
		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::PUSH1, 2),
			Control::ContinueN(2)
		);
		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::ADD, 4),
			Control::Continue
		);
		assert_eq!(machine.stack.data(), &[U256::from(5)]);
	}

	#[test]
	fn ranged_entries_read_their_width_from_the_opcode() {
		let table = Table::core();
		// PUSH2 0x0102 PUSH1 3 DUP2 SWAP1 JUMPDEST
		let mut machine = machine(vec![0x61, 0x01, 0x02, 0x60, 0x03, 0x81, 0x90, 0x5b]);

		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode(0x61), 0),
			Control::ContinueN(3)
		);
		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::PUSH1, 3),
			Control::ContinueN(2)
		);
		assert_eq!(table.eval(&mut machine, &mut (), Opcode(0x81), 5), Control::Continue);
		assert_eq!(table.eval(&mut machine, &mut (), Opcode::SWAP1, 6), Control::Continue);
		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::JUMPDEST, 7),
			Control::Continue
		);
		assert_eq!(
			machine.stack.data(),
			&[U256::from(0x0102), U256::from(0x0102), U256::from(3)]
		);
		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::INVALID, 7),
			Control::Exit(ExitException::DesignatedInvalid.into())
		);
	}

	#[test]
	fn unknown_opcode_reports_itself() {
		let table = Table::core();
		let mut machine = machine(vec![0x0c]);

		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode(0x0c), 0),
			Control::Exit(ExitException::InvalidOpcode(Opcode(0x0c)).into())
		);
		assert_eq!(
			table.eval(&mut machine, &mut (), Opcode::STOP, 0),
			Control::Exit(ExitSucceed::Stopped.into())
		);
	}

	#[test]
	fn fused_matches_sequential() {
		let table = Table::core();
		let code = vec![0x60, 0x05, 0x03];

		let mut fused = machine(code.clone());
		fused.stack.push(U256::from(2)).unwrap();
		assert_eq!(table.eval_fused(&mut fused, &mut (), 0, 2), Control::Continue);

		let mut sequential = machine(code);
		sequential.stack.push(U256::from(2)).unwrap();
		table.eval(&mut sequential, &mut (), Opcode::PUSH1, 0);
		table.eval(&mut sequential, &mut (), Opcode::SUB, 2);

		assert_eq!(fused.stack.data(), sequential.stack.data());
		assert_eq!(fused.stack.data(), &[U256::from(3)]);
	}

	#[test]
	fn fused_reports_underflow_after_push() {
		let table = Table::core();
		let mut machine = machine(vec![0x60, 0x05, 0x01]);

		assert_eq!(
			table.eval_fused(&mut machine, &mut (), 0, 2),
			Control::Exit(ExitException::StackUnderflow.into())
		);
	}
}
