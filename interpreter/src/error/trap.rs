//! Call and create traps. The interpreter stops on one of these opcodes and
//! leaves the stack untouched; the invoker then pulls the call parameters out
//! of the machine and, once the child frame retires, feeds the result back.

use alloc::vec::Vec;
use core::cmp::{max, min};

use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

use crate::{
	error::{ExitError, ExitException, ExitResult},
	interpreter::Interpreter,
	machine::{Machine, Memory},
	runtime::{Context, RuntimeBaseBackend, RuntimeState, Transfer},
	utils::{h160_to_u256, u256_to_h160, u256_to_h256, u256_to_usize},
};

/// Opcode that trapped out of the interpreter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallCreateTrap {
	Create,
	Create2,
	Call,
	CallCode,
	DelegateCall,
	StaticCall,
}

/// Everything the invoker needs to start the child frame of a trap.
#[derive(Clone, Debug)]
pub enum CallCreateTrapData {
	Call(CallTrapData),
	Create(CreateTrapData),
}

impl CallCreateTrapData {
	/// Gas requested by the caller, for calls.
	#[must_use]
	pub const fn target_gas(&self) -> Option<U256> {
		match self {
			Self::Call(call) => Some(call.gas),
			Self::Create(_) => None,
		}
	}

	/// Pop the operands of `opcode` from the machine.
	pub fn new_from<S: AsRef<RuntimeState> + AsMut<RuntimeState>>(
		opcode: CallCreateTrap,
		machine: &mut Machine<S>,
	) -> Result<Self, ExitError> {
		let scheme = match opcode {
			CallCreateTrap::Create => return Ok(Self::Create(CreateTrapData::new_from(machine, false)?)),
			CallCreateTrap::Create2 => return Ok(Self::Create(CreateTrapData::new_from(machine, true)?)),
			CallCreateTrap::Call => CallScheme::Call,
			CallCreateTrap::CallCode => CallScheme::CallCode,
			CallCreateTrap::DelegateCall => CallScheme::DelegateCall,
			CallCreateTrap::StaticCall => CallScheme::StaticCall,
		};

		Ok(Self::Call(CallTrapData::new_from(scheme, machine)?))
	}

	/// Code the child frame will run.
	pub fn code<H: RuntimeBaseBackend>(&self, handler: &H) -> Vec<u8> {
		match self {
			Self::Call(call) => handler.code(call.target),
			Self::Create(create) => create.code.clone(),
		}
	}
}

/// How a call frame relates to its caller.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallScheme {
	/// Runs the target's code on the target, moving value to it.
	Call,
	/// Runs the target's code on the caller's own account.
	CallCode,
	/// Like `CallCode`, keeping the caller's caller and value.
	DelegateCall,
	/// Like `Call` without value, with every write refused.
	StaticCall,
}

/// A trapped call, with its input already copied out of memory.
#[derive(Clone, Debug)]
pub struct CallTrapData {
	pub target: H160,
	pub transfer: Option<Transfer>,
	pub input: Vec<u8>,
	pub gas: U256,
	pub is_static: bool,
	/// Where the caller wants the return data.
	pub out_offset: U256,
	pub out_len: U256,
	pub context: Context,
}

impl CallTrapData {
	/// Pop the operands of a `scheme` call. Memory is expanded to cover both
	/// the input and the output range before the input is read.
	pub fn new_from<S: AsRef<RuntimeState> + AsMut<RuntimeState>>(
		scheme: CallScheme,
		machine: &mut Machine<S>,
	) -> Result<Self, ExitError> {
		let [gas, to, value, in_offset, in_len, out_offset, out_len] = match scheme {
			CallScheme::Call | CallScheme::CallCode => machine.stack.pop_n::<7>()?,
			CallScheme::DelegateCall | CallScheme::StaticCall => {
				let [gas, to, in_offset, in_len, out_offset, out_len] = machine.stack.pop_n::<6>()?;
				[gas, to, U256::zero(), in_offset, in_len, out_offset, out_len]
			}
		};
		let target = u256_to_h160(to);

		let in_end = in_offset
			.checked_add(in_len)
			.ok_or(ExitException::InvalidRange)?;
		let out_end = out_offset
			.checked_add(out_len)
			.ok_or(ExitException::InvalidRange)?;
		let reach = max(
			if in_len.is_zero() { U256::zero() } else { in_end },
			if out_len.is_zero() { U256::zero() } else { out_end },
		);
		if !reach.is_zero() {
			machine.memory.resize_end(reach)?;
		}
		let input = read_range(&mut machine.memory, in_offset, in_len)?;

		let current = &machine.state.as_ref().context;
		let here = current.address;
		let (context, transfer) = match scheme {
			CallScheme::Call => (
				Context {
					address: target,
					caller: here,
					apparent_value: value,
				},
				Some(Transfer {
					source: here,
					target,
					value,
				}),
			),
			CallScheme::StaticCall => (
				Context {
					address: target,
					caller: here,
					apparent_value: value,
				},
				None,
			),
			CallScheme::CallCode => (
				Context {
					address: here,
					caller: here,
					apparent_value: value,
				},
				Some(Transfer {
					source: here,
					target: here,
					value,
				}),
			),
			CallScheme::DelegateCall => (
				Context {
					address: here,
					caller: current.caller,
					apparent_value: current.apparent_value,
				},
				None,
			),
		};

		machine.state.as_mut().retbuf = Vec::new();

		Ok(Self {
			target,
			transfer,
			input,
			gas,
			is_static: scheme == CallScheme::StaticCall,
			out_offset,
			out_len,
			context,
		})
	}

	/// Push the call status, copy the return data into the output range and
	/// resume the interpreter. A reverted child still hands back its data.
	/// Fatal errors are passed through.
	pub fn feedback<I: Interpreter>(
		self,
		reason: ExitResult,
		retbuf: Vec<u8>,
		interpreter: &mut I,
	) -> Result<(), ExitError>
	where
		I::State: AsRef<RuntimeState> + AsMut<RuntimeState>,
	{
		let machine = interpreter.machine_mut();
		let copied = min(self.out_len, U256::from(retbuf.len()));
		let copy_out = |memory: &mut Memory| {
			memory
				.copy_large(self.out_offset, U256::zero(), copied, &retbuf)
				.is_ok()
		};

		let succeeded = match &reason {
			Ok(_) => copy_out(&mut machine.memory),
			Err(ExitError::Reverted) => {
				copy_out(&mut machine.memory);
				false
			}
			Err(_) => false,
		};
		machine.stack.push(U256::from(u8::from(succeeded)))?;
		if let Err(ExitError::Fatal(fatal)) = reason {
			return Err(fatal.into());
		}

		machine.state.as_mut().retbuf = retbuf;
		interpreter.advance();

		Ok(())
	}

	/// Whether the call carries a non-zero value.
	#[must_use]
	pub fn has_value(&self) -> bool {
		self.transfer
			.as_ref()
			.is_some_and(|transfer| !transfer.value.is_zero())
	}
}

/// Copy `len` bytes at `offset` out of memory, expanding it as needed.
fn read_range(memory: &mut Memory, offset: U256, len: U256) -> Result<Vec<u8>, ExitError> {
	if len.is_zero() {
		return Ok(Vec::new());
	}

	memory.resize_offset(offset, len)?;
	Ok(memory.get(u256_to_usize(offset)?, u256_to_usize(len)?))
}

/// How the address of a new contract is derived.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CreateScheme {
	/// `CREATE`: from the caller and its nonce.
	Legacy { caller: H160 },
	/// `CREATE2`: from the caller, a salt and the init code hash.
	Create2 {
		caller: H160,
		code_hash: H256,
		salt: H256,
	},
}

impl CreateScheme {
	/// Address the contract is deployed at. For `CREATE` this reads the
	/// caller's nonce, so it must be derived before the nonce is bumped.
	pub fn address<H: RuntimeBaseBackend>(&self, handler: &H) -> H160 {
		let hash = match self {
			Self::Create2 {
				caller,
				code_hash,
				salt,
			} => {
				let mut preimage = [0xff; 85];
				preimage[1..21].copy_from_slice(caller.as_bytes());
				preimage[21..53].copy_from_slice(salt.as_bytes());
				preimage[53..].copy_from_slice(code_hash.as_bytes());
				Keccak256::digest(preimage)
			}
			Self::Legacy { caller } => {
				let mut stream = rlp::RlpStream::new_list(2);
				stream.append(caller);
				stream.append(&handler.nonce(*caller));
				Keccak256::digest(stream.out())
			}
		};

		H160::from_slice(&hash[12..])
	}

	#[must_use]
	pub const fn caller(&self) -> H160 {
		match self {
			Self::Legacy { caller } | Self::Create2 { caller, .. } => *caller,
		}
	}
}

/// A trapped create, with its init code already copied out of memory.
#[derive(Clone, Debug)]
pub struct CreateTrapData {
	pub scheme: CreateScheme,
	pub value: U256,
	pub code: Vec<u8>,
}

impl CreateTrapData {
	/// Pop the operands of `CREATE`, or of `CREATE2` when `salted`.
	pub fn new_from<S: AsRef<RuntimeState> + AsMut<RuntimeState>>(
		machine: &mut Machine<S>,
		salted: bool,
	) -> Result<Self, ExitError> {
		let (value, code_offset, code_len, salt) = if salted {
			let [value, offset, len, salt] = machine.stack.pop_n::<4>()?;
			(value, offset, len, Some(salt))
		} else {
			let [value, offset, len] = machine.stack.pop_n::<3>()?;
			(value, offset, len, None)
		};

		let code = read_range(&mut machine.memory, code_offset, code_len)?;
		let caller = machine.state.as_ref().context.address;
		let scheme = match salt {
			Some(salt) => CreateScheme::Create2 {
				caller,
				code_hash: H256::from_slice(&Keccak256::digest(&code)),
				salt: u256_to_h256(salt),
			},
			None => CreateScheme::Legacy { caller },
		};

		machine.state.as_mut().retbuf = Vec::new();

		Ok(Self {
			scheme,
			value,
			code,
		})
	}

	/// Push the created address, or zero on failure, and resume the
	/// interpreter. Fatal errors are passed through.
	pub fn feedback<I: Interpreter>(
		self,
		reason: Result<H160, ExitError>,
		retbuf: Vec<u8>,
		interpreter: &mut I,
	) -> Result<(), ExitError>
	where
		I::State: AsRef<RuntimeState> + AsMut<RuntimeState>,
	{
		let machine = interpreter.machine_mut();

		let created = match &reason {
			Ok(address) => h160_to_u256(*address),
			Err(_) => U256::zero(),
		};
		machine.stack.push(created)?;
		if let Err(ExitError::Fatal(fatal)) = reason {
			return Err(fatal.into());
		}

		machine.state.as_mut().retbuf = retbuf;
		interpreter.advance();

		Ok(())
	}
}
