//! Narrow C ABI around [Vm], backed by the in-memory database.
//!
//! Every VM lives behind an opaque handle returned by [arena_evm_init] and
//! released by [arena_evm_deinit]. There is no global state. Addresses are
//! 20 raw bytes and words 32 big-endian bytes. Output buffers handed out in
//! an [ArenaEvmResult] are owned by the caller until passed to
//! [arena_evm_result_free].

#![allow(unsafe_code)]

use alloc::{boxed::Box, vec::Vec};
use core::{ffi::c_char, ptr, ptr::NonNull, slice};

use arena_evm_interpreter::{ExitError, ExitException, ExitFatal, ExitResult};
use primitive_types::{H160, U256};

use crate::{
	backend::{InMemoryDatabase, InMemoryEnvironment},
	standard::{ArenaConfig, Config, Hardfork},
	CallParams, CallResult, Vm, VmError,
};

/// Address [arena_evm_execute] installs its bytecode at.
pub const EXECUTION_ADDRESS: H160 = H160([
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xc0, 0xde,
]);

/// Status of an ABI call.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArenaEvmStatus {
	Success = 0,
	Revert = 1,
	OutOfGas = 2,
	StackUnderflow = 3,
	StackOverflow = 4,
	InvalidJump = 5,
	InvalidOpcode = 6,
	CallDepthExceeded = 7,
	MemoryLimitExceeded = 8,
	OutOfMemory = 9,
	LoopQuotaExceeded = 10,
	/// Any other exception of the root frame.
	ExecutionFailed = 11,
	/// Null pointer or out of range argument.
	InvalidArgument = 12,
	/// The message was rejected before running, or the VM could not be built.
	Rejected = 13,
	/// Execution aborted by the backend.
	Fatal = 14,
}

impl ArenaEvmStatus {
	const ALL: [Self; 15] = [
		Self::Success,
		Self::Revert,
		Self::OutOfGas,
		Self::StackUnderflow,
		Self::StackOverflow,
		Self::InvalidJump,
		Self::InvalidOpcode,
		Self::CallDepthExceeded,
		Self::MemoryLimitExceeded,
		Self::OutOfMemory,
		Self::LoopQuotaExceeded,
		Self::ExecutionFailed,
		Self::InvalidArgument,
		Self::Rejected,
		Self::Fatal,
	];

	/// Status with the given integer code.
	pub fn from_code(code: i32) -> Option<Self> {
		Self::ALL.into_iter().find(|status| *status as i32 == code)
	}

	fn of_exit(exit: &ExitResult) -> Self {
		match exit {
			Ok(_) => Self::Success,
			Err(ExitError::Reverted) => Self::Revert,
			Err(ExitError::Exception(exception)) => match exception {
				ExitException::OutOfGas => Self::OutOfGas,
				ExitException::StackUnderflow => Self::StackUnderflow,
				ExitException::StackOverflow => Self::StackOverflow,
				ExitException::InvalidJump => Self::InvalidJump,
				ExitException::InvalidOpcode(_) | ExitException::DesignatedInvalid => {
					Self::InvalidOpcode
				}
				ExitException::CallDepthExceeded => Self::CallDepthExceeded,
				ExitException::MemoryLimitExceeded => Self::MemoryLimitExceeded,
				ExitException::OutOfMemory => Self::OutOfMemory,
				_ => Self::ExecutionFailed,
			},
			Err(ExitError::Fatal(ExitFatal::LoopQuotaExceeded)) => Self::LoopQuotaExceeded,
			Err(ExitError::Fatal(_)) => Self::Fatal,
		}
	}

	fn of_error(err: &VmError) -> Self {
		match err {
			VmError::Fatal(ExitFatal::LoopQuotaExceeded) => Self::LoopQuotaExceeded,
			VmError::Fatal(_) | VmError::Database(_) | VmError::Poisoned => Self::Fatal,
			VmError::Config(_) | VmError::Arena(_) | VmError::Rejected(_) => Self::Rejected,
		}
	}
}

/// 20-byte account address.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ArenaEvmAddress {
	pub bytes: [u8; 20],
}

/// 32-byte big-endian word.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ArenaEvmWord {
	pub bytes: [u8; 32],
}

/// VM settings. Zero `loop_quota` means unlimited.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ArenaEvmConfig {
	/// Index into Frontier, Homestead, Tangerine Whistle, Spurious Dragon,
	/// Byzantium, Petersburg, Istanbul, Berlin, London, Shanghai, Cancun.
	pub hardfork: u32,
	pub max_call_depth: u32,
	pub max_input_size: u64,
	pub memory_limit: u64,
	pub block_gas_limit: u64,
	pub loop_quota: u64,
	pub arena_initial_capacity: u64,
	pub arena_max_capacity: u64,
	pub arena_growth_factor_percent: u32,
	pub disable_gas_checks: bool,
	pub disable_balance_checks: bool,
	pub enable_fusion: bool,
	pub enable_precompiles: bool,
}

/// Result of [arena_evm_execute] and [arena_evm_call].
#[repr(C)]
#[derive(Debug)]
pub struct ArenaEvmResult {
	pub status: ArenaEvmStatus,
	pub gas_used: u64,
	pub gas_left: u64,
	pub output: *mut u8,
	pub output_len: usize,
	pub has_created_address: bool,
	pub created_address: ArenaEvmAddress,
}

impl ArenaEvmResult {
	fn empty(status: ArenaEvmStatus) -> Self {
		Self {
			status,
			gas_used: 0,
			gas_left: 0,
			output: ptr::null_mut(),
			output_len: 0,
			has_created_address: false,
			created_address: ArenaEvmAddress::default(),
		}
	}

	fn from_call(result: CallResult) -> Self {
		let status = ArenaEvmStatus::of_exit(&result.exit);
		let output_len = result.output.len();
		let output = if output_len == 0 {
			ptr::null_mut()
		} else {
			Box::into_raw(result.output.into_boxed_slice()).cast::<u8>()
		};

		Self {
			status,
			gas_used: result.gas_used,
			gas_left: result.gas_left,
			output,
			output_len,
			has_created_address: result.created_address.is_some(),
			created_address: ArenaEvmAddress {
				bytes: result.created_address.unwrap_or_default().0,
			},
		}
	}
}

/// Opaque VM handle.
pub struct ArenaEvmHandle {
	vm: Vm<'static, InMemoryEnvironment, InMemoryDatabase>,
	// Owned, and only released after `vm` is dropped.
	config: NonNull<Config>,
}

fn hardfork(index: u32) -> Option<Hardfork> {
	Some(match index {
		0 => Hardfork::Frontier,
		1 => Hardfork::Homestead,
		2 => Hardfork::TangerineWhistle,
		3 => Hardfork::SpuriousDragon,
		4 => Hardfork::Byzantium,
		5 => Hardfork::Petersburg,
		6 => Hardfork::Istanbul,
		7 => Hardfork::Berlin,
		8 => Hardfork::London,
		9 => Hardfork::Shanghai,
		10 => Hardfork::Cancun,
		_ => return None,
	})
}

fn to_usize(value: u64) -> Option<usize> {
	usize::try_from(value).ok()
}

impl ArenaEvmConfig {
	fn resolve(&self) -> Option<Config> {
		let mut config = Config::from_hardfork(hardfork(self.hardfork)?);
		config.max_call_depth = to_usize(self.max_call_depth.into())?;
		config.max_input_size = to_usize(self.max_input_size)?;
		config.memory_limit = to_usize(self.memory_limit)?;
		config.block_gas_limit = self.block_gas_limit;
		config.loop_quota = (self.loop_quota != 0).then_some(self.loop_quota);
		config.arena = ArenaConfig {
			initial_capacity: to_usize(self.arena_initial_capacity)?,
			max_capacity: to_usize(self.arena_max_capacity)?,
			growth_factor_percent: to_usize(self.arena_growth_factor_percent.into())?,
		};
		config.disable_gas_checks = self.disable_gas_checks;
		config.disable_balance_checks = self.disable_balance_checks;
		config.enable_fusion = self.enable_fusion;
		config.enable_precompiles = self.enable_precompiles;
		Some(config)
	}
}

/// Settings of `hardfork` with its default limits.
#[no_mangle]
pub extern "C" fn arena_evm_default_config(hardfork_index: u32) -> ArenaEvmConfig {
	let config = hardfork(hardfork_index).map_or_else(Config::cancun, Config::from_hardfork);
	ArenaEvmConfig {
		hardfork: hardfork_index,
		max_call_depth: u32::try_from(config.max_call_depth).unwrap_or(u32::MAX),
		max_input_size: config.max_input_size as u64,
		memory_limit: config.memory_limit as u64,
		block_gas_limit: config.block_gas_limit,
		loop_quota: config.loop_quota.unwrap_or(0),
		arena_initial_capacity: config.arena.initial_capacity as u64,
		arena_max_capacity: config.arena.max_capacity as u64,
		arena_growth_factor_percent: u32::try_from(config.arena.growth_factor_percent)
			.unwrap_or(u32::MAX),
		disable_gas_checks: config.disable_gas_checks,
		disable_balance_checks: config.disable_balance_checks,
		enable_fusion: config.enable_fusion,
		enable_precompiles: config.enable_precompiles,
	}
}

/// Build a VM. Returns null when `config` is null or inconsistent.
///
/// # Safety
///
/// `config` must be null or point to a valid [ArenaEvmConfig].
#[no_mangle]
pub unsafe extern "C" fn arena_evm_init(config: *const ArenaEvmConfig) -> *mut ArenaEvmHandle {
	let Some(config) = (unsafe { config.as_ref() }).and_then(ArenaEvmConfig::resolve) else {
		return ptr::null_mut();
	};

	let config = NonNull::from(Box::leak(Box::new(config)));
	// The handle owns the config and outlives the borrow taken by the VM.
	let config_ref: &'static Config = unsafe { config.as_ref() };
	match Vm::new(
		config_ref,
		InMemoryEnvironment::default(),
		InMemoryDatabase::new(),
	) {
		Ok(vm) => Box::into_raw(Box::new(ArenaEvmHandle { vm, config })),
		Err(err) => {
			log::debug!(target: "evm", "embedded vm refused: {}", err);
			drop(unsafe { Box::from_raw(config.as_ptr()) });
			ptr::null_mut()
		}
	}
}

/// Release a VM.
///
/// # Safety
///
/// `handle` must be null or come from [arena_evm_init], and must not be
/// used afterwards.
#[no_mangle]
pub unsafe extern "C" fn arena_evm_deinit(handle: *mut ArenaEvmHandle) {
	if handle.is_null() {
		return;
	}

	let handle = unsafe { Box::from_raw(handle) };
	let config = handle.config;
	drop(handle);
	drop(unsafe { Box::from_raw(config.as_ptr()) });
}

unsafe fn bytes<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
	if len == 0 {
		Some(&[])
	} else if data.is_null() {
		None
	} else {
		Some(unsafe { slice::from_raw_parts(data, len) })
	}
}

unsafe fn run(
	handle: *mut ArenaEvmHandle,
	out_result: *mut ArenaEvmResult,
	params: impl FnOnce(&mut Vm<'static, InMemoryEnvironment, InMemoryDatabase>) -> Option<CallParams>,
) -> ArenaEvmStatus {
	let (Some(handle), false) = (unsafe { handle.as_mut() }, out_result.is_null()) else {
		return ArenaEvmStatus::InvalidArgument;
	};
	let Some(params) = params(&mut handle.vm) else {
		unsafe { out_result.write(ArenaEvmResult::empty(ArenaEvmStatus::InvalidArgument)) };
		return ArenaEvmStatus::InvalidArgument;
	};

	let result = match handle.vm.execute(params) {
		Ok(result) => ArenaEvmResult::from_call(result),
		Err(err) => ArenaEvmResult::empty(ArenaEvmStatus::of_error(&err)),
	};
	let status = result.status;
	unsafe { out_result.write(result) };
	status
}

/// Run `bytecode` as the code of [EXECUTION_ADDRESS], called by `caller`
/// with `value` and no input.
///
/// # Safety
///
/// `handle` must come from [arena_evm_init]. `bytecode` must point to `len`
/// readable bytes, `caller` and `value` to valid structs, and `out_result`
/// to writable memory for one [ArenaEvmResult].
#[no_mangle]
pub unsafe extern "C" fn arena_evm_execute(
	handle: *mut ArenaEvmHandle,
	bytecode: *const u8,
	len: usize,
	caller: *const ArenaEvmAddress,
	value: *const ArenaEvmWord,
	gas_limit: u64,
	out_result: *mut ArenaEvmResult,
) -> ArenaEvmStatus {
	let code = unsafe { bytes(bytecode, len) };
	let caller = unsafe { caller.as_ref() };
	let value = unsafe { value.as_ref() };

	unsafe {
		run(handle, out_result, |vm| {
			let (code, caller, value) = (code?, caller?, value?);
			let database = vm.database_mut()?;
			let balance = database.balance(EXECUTION_ADDRESS);
			database.insert_account(EXECUTION_ADDRESS, balance, code.to_vec());

			Some(CallParams::Call {
				caller: H160(caller.bytes),
				to: EXECUTION_ADDRESS,
				value: U256::from_big_endian(&value.bytes),
				input: Vec::new(),
				gas: gas_limit,
			})
		})
	}
}

/// Send a message from `caller` to `to`.
///
/// # Safety
///
/// As for [arena_evm_execute], with `input` pointing to `input_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn arena_evm_call(
	handle: *mut ArenaEvmHandle,
	caller: *const ArenaEvmAddress,
	to: *const ArenaEvmAddress,
	value: *const ArenaEvmWord,
	input: *const u8,
	input_len: usize,
	gas_limit: u64,
	out_result: *mut ArenaEvmResult,
) -> ArenaEvmStatus {
	let input = unsafe { bytes(input, input_len) };
	let caller = unsafe { caller.as_ref() };
	let to = unsafe { to.as_ref() };
	let value = unsafe { value.as_ref() };

	unsafe {
		run(handle, out_result, |_| {
			Some(CallParams::Call {
				caller: H160(caller?.bytes),
				to: H160(to?.bytes),
				value: U256::from_big_endian(&value?.bytes),
				input: input?.to_vec(),
				gas: gas_limit,
			})
		})
	}
}

/// Release the output buffer of `result` and clear it.
///
/// # Safety
///
/// `result` must be null or point to a result filled by this library whose
/// output was not freed yet.
#[no_mangle]
pub unsafe extern "C" fn arena_evm_result_free(result: *mut ArenaEvmResult) {
	let Some(result) = (unsafe { result.as_mut() }) else {
		return;
	};

	if !result.output.is_null() {
		let output = ptr::slice_from_raw_parts_mut(result.output, result.output_len);
		drop(unsafe { Box::from_raw(output) });
	}
	result.output = ptr::null_mut();
	result.output_len = 0;
}

/// Static, nul-terminated description of a status code. Codes outside
/// [ArenaEvmStatus] read as "unknown status".
#[no_mangle]
pub extern "C" fn arena_evm_status_string(status: i32) -> *const c_char {
	let Some(status) = ArenaEvmStatus::from_code(status) else {
		return c"unknown status".as_ptr();
	};
	let description = match status {
		ArenaEvmStatus::Success => c"success",
		ArenaEvmStatus::Revert => c"reverted",
		ArenaEvmStatus::OutOfGas => c"out of gas",
		ArenaEvmStatus::StackUnderflow => c"stack underflow",
		ArenaEvmStatus::StackOverflow => c"stack overflow",
		ArenaEvmStatus::InvalidJump => c"invalid jump destination",
		ArenaEvmStatus::InvalidOpcode => c"invalid opcode",
		ArenaEvmStatus::CallDepthExceeded => c"call depth exceeded",
		ArenaEvmStatus::MemoryLimitExceeded => c"memory limit exceeded",
		ArenaEvmStatus::OutOfMemory => c"out of memory",
		ArenaEvmStatus::LoopQuotaExceeded => c"loop quota exceeded",
		ArenaEvmStatus::ExecutionFailed => c"execution failed",
		ArenaEvmStatus::InvalidArgument => c"invalid argument",
		ArenaEvmStatus::Rejected => c"rejected",
		ArenaEvmStatus::Fatal => c"fatal error",
	};
	description.as_ptr()
}

/// Set the balance of `address`, keeping its code.
///
/// # Safety
///
/// `handle` must come from [arena_evm_init]; `address` and `balance` must
/// point to valid structs.
#[no_mangle]
pub unsafe extern "C" fn arena_evm_set_balance(
	handle: *mut ArenaEvmHandle,
	address: *const ArenaEvmAddress,
	balance: *const ArenaEvmWord,
) -> bool {
	let (Some(handle), Some(address), Some(balance)) =
		(unsafe { (handle.as_mut(), address.as_ref(), balance.as_ref()) })
	else {
		return false;
	};
	let Some(database) = handle.vm.database_mut() else {
		return false;
	};

	let address = H160(address.bytes);
	let code = database.code(address);
	database.insert_account(address, U256::from_big_endian(&balance.bytes), code);
	true
}

/// Deploy `code` at `address`, keeping its balance.
///
/// # Safety
///
/// `handle` must come from [arena_evm_init], `address` must point to a valid
/// struct and `code` to `code_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn arena_evm_set_code(
	handle: *mut ArenaEvmHandle,
	address: *const ArenaEvmAddress,
	code: *const u8,
	code_len: usize,
) -> bool {
	let (Some(handle), Some(address), Some(code)) =
		(unsafe { (handle.as_mut(), address.as_ref(), bytes(code, code_len)) })
	else {
		return false;
	};
	let Some(database) = handle.vm.database_mut() else {
		return false;
	};

	let address = H160(address.bytes);
	let balance = database.balance(address);
	database.insert_account(address, balance, code.to_vec());
	true
}

#[cfg(test)]
mod tests {
	use core::ffi::CStr;

	use super::*;

	fn init() -> *mut ArenaEvmHandle {
		let config = arena_evm_default_config(10);
		unsafe { arena_evm_init(&config) }
	}

	#[test]
	fn execute_returns_output() {
		let handle = init();
		assert!(!handle.is_null());

		// PUSH1 0x2a PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
		let code = [0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
		let caller = ArenaEvmAddress { bytes: [0x11; 20] };
		let value = ArenaEvmWord::default();
		let mut result = ArenaEvmResult::empty(ArenaEvmStatus::Fatal);

		let status = unsafe {
			arena_evm_execute(
				handle,
				code.as_ptr(),
				code.len(),
				&caller,
				&value,
				100_000,
				&mut result,
			)
		};
		assert_eq!(status, ArenaEvmStatus::Success);
		assert_eq!(result.output_len, 32);
		let output = unsafe { slice::from_raw_parts(result.output, result.output_len) };
		assert_eq!(output[31], 0x2a);
		assert_eq!(result.gas_used + result.gas_left, 100_000);

		unsafe {
			arena_evm_result_free(&mut result);
			arena_evm_deinit(handle);
		}
		assert!(result.output.is_null());
	}

	#[test]
	fn bad_arguments() {
		let mut config = arena_evm_default_config(10);
		config.hardfork = 99;
		assert!(unsafe { arena_evm_init(&config) }.is_null());
		assert!(unsafe { arena_evm_init(ptr::null()) }.is_null());

		let handle = init();
		let mut result = ArenaEvmResult::empty(ArenaEvmStatus::Success);
		let status = unsafe {
			arena_evm_execute(
				handle,
				ptr::null(),
				4,
				ptr::null(),
				ptr::null(),
				0,
				&mut result,
			)
		};
		assert_eq!(status, ArenaEvmStatus::InvalidArgument);
		unsafe { arena_evm_deinit(handle) };
	}

	#[test]
	fn seeded_accounts_are_callable() {
		let handle = init();
		let caller = ArenaEvmAddress { bytes: [0x11; 20] };
		let target = ArenaEvmAddress { bytes: [0x22; 20] };
		let mut value = ArenaEvmWord::default();
		value.bytes[31] = 7;

		// CALLVALUE PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
		let code = [0x34, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
		let mut result = ArenaEvmResult::empty(ArenaEvmStatus::Fatal);
		let call = |result: &mut ArenaEvmResult| unsafe {
			arena_evm_call(
				handle,
				&caller,
				&target,
				&value,
				ptr::null(),
				0,
				100_000,
				result,
			)
		};

		unsafe {
			assert!(arena_evm_set_code(handle, &target, code.as_ptr(), code.len()));
		}
		// The caller cannot pay yet.
		assert_eq!(call(&mut result), ArenaEvmStatus::Rejected);

		let mut balance = ArenaEvmWord::default();
		balance.bytes[30] = 1;
		unsafe {
			assert!(arena_evm_set_balance(handle, &caller, &balance));
			assert!(!arena_evm_set_balance(handle, ptr::null(), &balance));
		}
		assert_eq!(call(&mut result), ArenaEvmStatus::Success);
		let output = unsafe { slice::from_raw_parts(result.output, result.output_len) };
		assert_eq!(output[31], 7);

		unsafe {
			arena_evm_result_free(&mut result);
			arena_evm_deinit(handle);
		}
	}

	#[test]
	fn status_strings() {
		let text = |code| unsafe { CStr::from_ptr(arena_evm_status_string(code)) }.to_str();
		assert_eq!(text(ArenaEvmStatus::OutOfGas as i32), Ok("out of gas"));
		assert_eq!(text(ArenaEvmStatus::Fatal as i32), Ok("fatal error"));
		assert_eq!(text(-1), Ok("unknown status"));
		assert_eq!(text(15), Ok("unknown status"));
	}
}
