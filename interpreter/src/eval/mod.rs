//! Opcode handlers, in the shape every execution table entry takes.
//!
//! The handlers here only adapt the table signature. The semantics live in
//! `arithmetic`, `bitwise`, `misc` and `system`.

#[macro_use]
mod macros;
mod arithmetic;
mod bitwise;
mod misc;
mod system;

use core::ops::{BitAnd, BitOr, BitXor};

use primitive_types::U256;

pub use self::misc::push_value;
use crate::{
	error::{CallCreateTrap, ExitException, ExitSucceed},
	etable::Control,
	machine::Machine,
	opcode::Opcode,
	runtime::{GasState, RuntimeBackend, RuntimeEnvironment, RuntimeState},
};

/// Declares table handlers sharing the bounds in the header. Each entry
/// names its four parameters so the body can pick the ones it reads.
macro_rules! handlers {
	(
		<S: $state:path, H: $host:path>
		$(
			$(#[$attr:meta])*
			$name:ident($machine:ident, $handle:ident, $opcode:ident, $position:ident) => $body:expr;
		)*
	) => {
		$(
			$(#[$attr])*
			#[inline]
			pub fn $name<S: $state, H: $host, Tr>(
				$machine: &mut Machine<S>,
				$handle: &mut H,
				$opcode: Opcode,
				$position: usize,
			) -> Control<Tr> {
				$body
			}
		)*
	};
}

handlers! {
	<S: Sized, H: Sized>

	/// Accepts the opcode and moves on. Used for `JUMPDEST` and as the filler
	/// of gas tables.
	eval_pass(_machine, _handle, _opcode, _position) => Control::Continue;
	/// Fails with `InvalidOpcode`, naming the byte.
	eval_unknown(_machine, _handle, opcode, _position) =>
		Control::Exit(ExitException::InvalidOpcode(opcode).into());
	/// `0xFE`, which fails with its own reason so that it can be told apart
	/// from bytes with no meaning.
	eval_invalid(_machine, _handle, _opcode, _position) =>
		Control::Exit(ExitException::DesignatedInvalid.into());
	eval_stop(_machine, _handle, _opcode, _position) => Control::Exit(ExitSucceed::Stopped.into());

	eval_add(machine, _handle, _opcode, _position) => op2_u256_tuple!(machine, overflowing_add);
	eval_mul(machine, _handle, _opcode, _position) => op2_u256_tuple!(machine, overflowing_mul);
	eval_sub(machine, _handle, _opcode, _position) => op2_u256_tuple!(machine, overflowing_sub);
	eval_div(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::arithmetic::div);
	eval_sdiv(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::arithmetic::sdiv);
	eval_mod(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::arithmetic::rem);
	eval_smod(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::arithmetic::srem);
	eval_addmod(machine, _handle, _opcode, _position) =>
		op3_u256_fn!(machine, self::arithmetic::addmod);
	eval_mulmod(machine, _handle, _opcode, _position) =>
		op3_u256_fn!(machine, self::arithmetic::mulmod);
	eval_exp(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::arithmetic::exp);
	eval_signextend(machine, _handle, _opcode, _position) =>
		op2_u256_fn!(machine, self::arithmetic::signextend);

	eval_lt(machine, _handle, _opcode, _position) => op2_u256_bool_ref!(machine, lt);
	eval_gt(machine, _handle, _opcode, _position) => op2_u256_bool_ref!(machine, gt);
	eval_slt(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::bitwise::slt);
	eval_sgt(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::bitwise::sgt);
	eval_eq(machine, _handle, _opcode, _position) => op2_u256_bool_ref!(machine, eq);
	eval_iszero(machine, _handle, _opcode, _position) =>
		op1_u256_fn!(machine, self::bitwise::iszero);
	eval_and(machine, _handle, _opcode, _position) => op2_u256!(machine, bitand);
	eval_or(machine, _handle, _opcode, _position) => op2_u256!(machine, bitor);
	eval_xor(machine, _handle, _opcode, _position) => op2_u256!(machine, bitxor);
	eval_not(machine, _handle, _opcode, _position) => op1_u256_fn!(machine, self::bitwise::not);
	eval_byte(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::bitwise::byte);
	eval_shl(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::bitwise::shl);
	eval_shr(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::bitwise::shr);
	eval_sar(machine, _handle, _opcode, _position) => op2_u256_fn!(machine, self::bitwise::sar);

	eval_codesize(machine, _handle, _opcode, _position) => self::misc::codesize(machine);
	eval_codecopy(machine, _handle, _opcode, _position) => self::misc::codecopy(machine);
	eval_calldataload(machine, _handle, _opcode, _position) => self::misc::calldataload(machine);
	eval_calldatasize(machine, _handle, _opcode, _position) => self::misc::calldatasize(machine);
	eval_calldatacopy(machine, _handle, _opcode, _position) => self::misc::calldatacopy(machine);

	eval_pop(machine, _handle, _opcode, _position) => self::misc::pop(machine);
	eval_mload(machine, _handle, _opcode, _position) => self::misc::mload(machine);
	eval_mstore(machine, _handle, _opcode, _position) => self::misc::mstore(machine);
	eval_mstore8(machine, _handle, _opcode, _position) => self::misc::mstore8(machine);
	eval_msize(machine, _handle, _opcode, _position) => self::misc::msize(machine);
	eval_mcopy(machine, _handle, _opcode, _position) => self::misc::mcopy(machine);
	eval_jump(machine, _handle, _opcode, _position) => self::misc::jump(machine);
	eval_jumpi(machine, _handle, _opcode, _position) => self::misc::jumpi(machine);
	eval_pc(machine, _handle, _opcode, position) => self::misc::pc(machine, position);
	eval_return(machine, _handle, _opcode, _position) => self::misc::ret(machine);
	eval_revert(machine, _handle, _opcode, _position) => self::misc::revert(machine);

	eval_push0(machine, _handle, _opcode, _position) => self::misc::push0(machine);
	/// `PUSH1` to `PUSH32`, reading the width off the opcode.
	eval_push(machine, _handle, opcode, position) =>
		self::misc::push(machine, usize::from(opcode.0 - Opcode::PUSH0.0), position);
	/// `DUP1` to `DUP16`.
	eval_dup(machine, _handle, opcode, _position) =>
		self::misc::dup(machine, usize::from(opcode.0 - Opcode::DUP1.0) + 1);
	/// `SWAP1` to `SWAP16`.
	eval_swap(machine, _handle, opcode, _position) =>
		self::misc::swap(machine, usize::from(opcode.0 - Opcode::SWAP1.0) + 1);
}

handlers! {
	<S: AsRef<RuntimeState>, H: Sized>

	eval_sha3(machine, _handle, _opcode, _position) => self::system::sha3(machine);
	eval_address(machine, _handle, _opcode, _position) => self::system::address(machine);
	eval_origin(machine, _handle, _opcode, _position) => self::system::origin(machine);
	eval_caller(machine, _handle, _opcode, _position) => self::system::caller(machine);
	eval_callvalue(machine, _handle, _opcode, _position) => self::system::callvalue(machine);
	eval_gasprice(machine, _handle, _opcode, _position) => self::system::gasprice(machine);
	eval_returndatasize(machine, _handle, _opcode, _position) =>
		self::system::returndatasize(machine);
	eval_returndatacopy(machine, _handle, _opcode, _position) =>
		self::system::returndatacopy(machine);
}

handlers! {
	<S: GasState, H: Sized>

	eval_gas(machine, _handle, _opcode, _position) => self::system::gas(machine);
}

handlers! {
	<S: Sized, H: RuntimeBackend>

	eval_balance(machine, handle, _opcode, _position) => self::system::balance(machine, handle);
	eval_extcodesize(machine, handle, _opcode, _position) =>
		self::system::extcodesize(machine, handle);
	eval_extcodehash(machine, handle, _opcode, _position) =>
		self::system::extcodehash(machine, handle);
	eval_extcodecopy(machine, handle, _opcode, _position) =>
		self::system::extcodecopy(machine, handle);
}

handlers! {
	<S: Sized, H: RuntimeEnvironment>

	eval_blockhash(machine, handle, _opcode, _position) => self::system::blockhash(machine, handle);
	eval_coinbase(machine, handle, _opcode, _position) => self::system::coinbase(machine, handle);
	eval_timestamp(machine, handle, _opcode, _position) => self::system::timestamp(machine, handle);
	eval_number(machine, handle, _opcode, _position) => self::system::number(machine, handle);
	/// Block randomness after the merge, the difficulty before it.
	eval_prevrandao(machine, handle, _opcode, _position) =>
		self::system::prevrandao(machine, handle);
	eval_gaslimit(machine, handle, _opcode, _position) => self::system::gaslimit(machine, handle);
	eval_chainid(machine, handle, _opcode, _position) => self::system::chainid(machine, handle);
	eval_basefee(machine, handle, _opcode, _position) => self::system::basefee(machine, handle);
	eval_blobhash(machine, handle, _opcode, _position) => self::system::blobhash(machine, handle);
	eval_blobbasefee(machine, handle, _opcode, _position) =>
		self::system::blobbasefee(machine, handle);
}

handlers! {
	<S: AsRef<RuntimeState>, H: RuntimeBackend>

	eval_selfbalance(machine, handle, _opcode, _position) =>
		self::system::selfbalance(machine, handle);
	eval_sload(machine, handle, _opcode, _position) => self::system::sload(machine, handle);
	eval_sstore(machine, handle, _opcode, _position) => self::system::sstore(machine, handle);
	eval_tload(machine, handle, _opcode, _position) => self::system::tload(machine, handle);
	eval_tstore(machine, handle, _opcode, _position) => self::system::tstore(machine, handle);
	/// `LOG0` to `LOG4`.
	eval_log(machine, handle, opcode, _position) =>
		self::system::log(machine, opcode.0 - Opcode::LOG0.0, handle);
	eval_selfdestruct(machine, handle, _opcode, _position) =>
		self::system::selfdestruct(machine, handle);
}

/// Runs a `PUSHn` fused with the binary op after it. `value` is the
/// immediate, which becomes the op's top operand. The caller has already
/// ruled out the push overflowing the stack.
pub fn eval_fused_binop<S, Tr>(machine: &mut Machine<S>, value: U256, op: Opcode) -> Control<Tr> {
	let ret = machine.stack.perform_pop1_push1(|b| {
		let a = value;
		let v = match op {
			Opcode::ADD => a.overflowing_add(*b).0,
			Opcode::SUB => a.overflowing_sub(*b).0,
			Opcode::MUL => a.overflowing_mul(*b).0,
			Opcode::AND => a.bitand(*b),
			Opcode::OR => a.bitor(*b),
			Opcode::XOR => a.bitxor(*b),
			Opcode::EQ => U256::from(u8::from(a == *b)),
			Opcode::LT => U256::from(u8::from(a < *b)),
			Opcode::GT => U256::from(u8::from(a > *b)),
			_ => return Err(ExitException::InvalidOpcode(op).into()),
		};
		Ok((v, ()))
	});

	match ret {
		Ok(()) => Control::Continue,
		Err(e) => Control::Exit(Err(e)),
	}
}

/// The six call and create opcodes. They trap to the invoker with their
/// operands still on the stack. Writes from a static frame are refused here,
/// before any gas for the child is set aside.
pub fn eval_call_create_trap<S: AsRef<RuntimeState>, H, Tr: From<CallCreateTrap>>(
	machine: &mut Machine<S>,
	_handle: &mut H,
	opcode: Opcode,
	_position: usize,
) -> Control<Tr> {
	let trap = match opcode {
		Opcode::CREATE => CallCreateTrap::Create,
		Opcode::CREATE2 => CallCreateTrap::Create2,
		Opcode::CALL => CallCreateTrap::Call,
		Opcode::CALLCODE => CallCreateTrap::CallCode,
		Opcode::DELEGATECALL => CallCreateTrap::DelegateCall,
		Opcode::STATICCALL => CallCreateTrap::StaticCall,
		_ => return Control::Exit(ExitException::InvalidOpcode(opcode).into()),
	};

	if machine.state.as_ref().is_static {
		let writes = match trap {
			CallCreateTrap::Create | CallCreateTrap::Create2 => true,
			CallCreateTrap::Call => !try_or_fail!(machine.stack.peek(2)).is_zero(),
			_ => false,
		};
		if writes {
			return Control::Exit(ExitException::StaticModeViolation.into());
		}
	}

	Control::Trap(trap.into())
}
