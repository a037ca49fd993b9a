mod consts;
mod costs;
mod utils;

use alloc::vec::Vec;
use core::cmp::{max, min};

use arena_evm_interpreter::{
	utils::{u256_to_h160, u256_to_h256},
	Control, ExitError, ExitException, Machine, Opcode, RuntimeBackend, RuntimeState, Stack,
};
use primitive_types::{H160, H256, U256};

use crate::{standard::Config, MergeStrategy};

/// Gas accounting of one frame.
///
/// `used_gas` and `memory_gas` are tracked apart because memory is priced by
/// its high-water mark: each expansion replaces the memory charge instead of
/// adding to it.
pub struct GasometerState<'config> {
	gas_limit: u64,
	memory_gas: u64,
	used_gas: u64,
	refunded_gas: u64,
	pub config: &'config Config,
}

impl<'config> GasometerState<'config> {
	/// Create a new gasometer with the given gas limit and chain config.
	pub fn new(gas_limit: u64, config: &'config Config) -> Self {
		Self {
			gas_limit,
			memory_gas: 0,
			used_gas: 0,
			refunded_gas: 0,
			config,
		}
	}

	/// Run `f`, and burn all remaining gas if it fails.
	#[inline]
	pub fn perform<R, F: FnOnce(&mut Self) -> Result<R, ExitError>>(
		&mut self,
		f: F,
	) -> Result<R, ExitError> {
		f(self).inspect_err(|_| self.oog())
	}

	/// Burn all remaining gas and forget any refund.
	pub fn oog(&mut self) {
		self.memory_gas = 0;
		self.refunded_gas = 0;
		self.used_gas = self.gas_limit;
	}

	/// Gas spent so far, memory included.
	pub fn total_used_gas(&self) -> u64 {
		self.used_gas + self.memory_gas
	}

	/// Gas the frame started with.
	pub fn gas_limit(&self) -> u64 {
		self.gas_limit
	}

	/// Refund counter, before the end-of-transaction cap.
	pub fn refunded_gas(&self) -> u64 {
		self.refunded_gas
	}

	/// Gas left, as `GAS` reports it.
	pub fn gas64(&self) -> u64 {
		self.gas_limit - self.memory_gas - self.used_gas
	}

	pub fn gas(&self) -> U256 {
		self.gas64().into()
	}

	/// Charge `cost`, failing with `OutOfGas` if it does not fit.
	pub fn record_gas64(&mut self, cost: u64) -> Result<(), ExitError> {
		match self.total_used_gas().checked_add(cost) {
			Some(total) if total <= self.gas_limit => {
				self.used_gas += cost;
				Ok(())
			}
			_ => Err(ExitException::OutOfGas.into()),
		}
	}

	pub fn record_gas(&mut self, cost: U256) -> Result<(), ExitError> {
		if cost > U256::from(u64::MAX) {
			return Err(ExitException::OutOfGas.into());
		}

		self.record_gas64(cost.as_u64())
	}

	/// Charge the per-byte deposit of a created contract's code.
	pub fn record_codedeposit(&mut self, len: usize) -> Result<(), ExitError> {
		if self.config.disable_gas_checks {
			return Ok(());
		}

		self.perform(|gasometer| {
			let cost = (len as u64)
				.checked_mul(consts::G_CODEDEPOSIT)
				.ok_or(ExitException::OutOfGas)?;
			gasometer.record_gas64(cost)
		})
	}

	/// Replace the memory charge with `memory_cost`.
	pub fn set_memory_gas(&mut self, memory_cost: u64) -> Result<(), ExitError> {
		match self.used_gas.checked_add(memory_cost) {
			Some(total) if total <= self.gas_limit => {
				self.memory_gas = memory_cost;
				Ok(())
			}
			_ => Err(ExitException::OutOfGas.into()),
		}
	}

	fn new_transact(gas_limit: U256, intrinsic: u64, config: &'config Config) -> Result<Self, ExitError> {
		if gas_limit > U256::from(u64::MAX) {
			return Err(ExitException::OutOfGas.into());
		}

		let mut gasometer = Self::new(gas_limit.as_u64(), config);
		if !config.disable_gas_checks {
			gasometer.record_gas64(intrinsic)?;
		}
		Ok(gasometer)
	}

	/// Gasometer of a call transaction, charged with the intrinsic cost.
	pub fn new_transact_call(
		gas_limit: U256,
		data: &[u8],
		access_list: &[(H160, Vec<H256>)],
		config: &'config Config,
	) -> Result<Self, ExitError> {
		let intrinsic = intrinsic_gas(data, access_list, false, config);
		Self::new_transact(gas_limit, intrinsic, config)
	}

	/// Gasometer of a create transaction, charged with the intrinsic cost.
	pub fn new_transact_create(
		gas_limit: U256,
		code: &[u8],
		access_list: &[(H160, Vec<H256>)],
		config: &'config Config,
	) -> Result<Self, ExitError> {
		let intrinsic = intrinsic_gas(code, access_list, true, config);
		Self::new_transact(gas_limit, intrinsic, config)
	}

	/// Gas left at the end of the transaction, with the refund counter applied
	/// up to its cap when `with_refund` is set.
	pub fn effective_gas(&self, with_refund: bool) -> U256 {
		let used = self.total_used_gas();
		let refunded = if with_refund {
			min(used / self.config.max_refund_quotient(), self.refunded_gas)
		} else {
			0
		};

		U256::from(self.gas_limit - (used - refunded))
	}

	/// Reserve `gas_limit` for a child frame. Value-bearing calls receive the
	/// stipend on top, free of charge.
	pub fn submeter(&mut self, gas_limit: U256, call_has_value: bool) -> Result<Self, ExitError> {
		if gas_limit > U256::from(u64::MAX) {
			return Err(ExitException::OutOfGas.into());
		}
		let reserved = gas_limit.as_u64();
		self.record_gas64(reserved)?;

		let stipend = if call_has_value {
			self.config.call_stipend()
		} else {
			0
		};
		Ok(Self::new(reserved.saturating_add(stipend), self.config))
	}

	/// Fold a retired child gasometer back into this one. Its unspent gas
	/// comes back unless the child was discarded; refunds only survive a
	/// commit.
	pub fn merge(&mut self, other: Self, strategy: MergeStrategy) {
		if matches!(strategy, MergeStrategy::Discard) {
			return;
		}

		self.used_gas = self.used_gas.saturating_sub(other.gas64());
		if matches!(strategy, MergeStrategy::Commit) {
			self.refunded_gas += other.refunded_gas;
		}
	}
}

/// Gas charged before the first opcode runs: the base fee of the
/// transaction kind, its payload bytes and its access list. Creates pay for
/// their init code words once initcode metering is on.
fn intrinsic_gas(
	data: &[u8],
	access_list: &[(H160, Vec<H256>)],
	create: bool,
	config: &Config,
) -> u64 {
	let zeros = data.iter().filter(|byte| **byte == 0).count() as u64;
	let non_zeros = data.len() as u64 - zeros;
	let keys = access_list.iter().map(|(_, keys)| keys.len()).sum::<usize>() as u64;

	let base = if create {
		config.gas_transaction_create()
	} else {
		config.gas_transaction_call()
	};
	let mut gas = base
		+ zeros * config.gas_transaction_zero_data()
		+ non_zeros * config.gas_transaction_non_zero_data()
		+ access_list.len() as u64 * config.gas_access_list_address()
		+ keys * config.gas_access_list_storage_key();

	if create && config.max_initcode_size().is_some() {
		gas += consts::G_INITCODE_WORD * (data.len() as u64).div_ceil(32);
	}

	gas
}

/// Gas table entry: charge `opcode` before it executes.
pub fn eval<'config, S, H, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
	opcode: Opcode,
	_position: usize,
) -> Control<Tr>
where
	S: AsRef<GasometerState<'config>> + AsMut<GasometerState<'config>> + AsRef<RuntimeState>,
	H: RuntimeBackend,
{
	match charge(machine, handler, opcode) {
		Ok(()) => Control::Continue,
		Err(err) => Control::Exit(Err(err)),
	}
}

fn charge<'config, S, H>(
	machine: &mut Machine<S>,
	handler: &mut H,
	opcode: Opcode,
) -> Result<(), ExitError>
where
	S: AsRef<GasometerState<'config>> + AsMut<GasometerState<'config>> + AsRef<RuntimeState>,
	H: RuntimeBackend,
{
	if machine.code().is_empty() {
		return Ok(());
	}

	let gasometer: &GasometerState<'config> = machine.state.as_ref();
	if gasometer.config.disable_gas_checks {
		return Ok(());
	}

	let address = AsRef::<RuntimeState>::as_ref(&machine.state)
		.context
		.address;

	let stack = &machine.stack;
	let gasometer: &mut GasometerState<'config> = machine.state.as_mut();
	gasometer.perform(|gasometer| {
		if let Some(cost) = consts::STATIC_COST_TABLE[opcode.as_usize()] {
			return gasometer.record_gas64(cost);
		}

		let config = gasometer.config;
		let owed = dynamic_charge(address, opcode, stack, gasometer.gas64(), config, handler)?;

		gasometer.record_gas64(owed.gas)?;
		gasometer.refunded_gas = gasometer.refunded_gas.saturating_add_signed(owed.refund);
		if let Some(memory_cost) = owed.memory.map(MemoryRange::cost).transpose()?.flatten() {
			gasometer.set_memory_gas(max(gasometer.memory_gas, memory_cost))?;
		}

		if let Some(forwarded) = owed.forwarded {
			costs::call_extra_check(forwarded, gasometer.gas64(), config)?;
		}

		Ok(())
	})
}

/// Whether `target` counts as an existing account for new-account charges.
fn target_exists<H: RuntimeBackend>(target: H160, config: &Config, handler: &H) -> bool {
	if config.eip161_empty_check {
		handler.nonce(target) != U256::zero()
			|| handler.balance(target) != U256::zero()
			|| handler.code_size(target) != U256::zero()
	} else {
		handler.exists(target)
	}
}

/// What a dynamically priced opcode owes, worked out from its operands
/// before it runs.
#[derive(Debug, Default)]
struct Charge {
	gas: u64,
	/// Signed change to the refund counter.
	refund: i64,
	/// Memory the opcode reads or writes.
	memory: Option<MemoryRange>,
	/// Gas requested for a child frame. Pre-EIP-150 rules fail the call when
	/// less than this is left after paying.
	forwarded: Option<U256>,
}

impl Charge {
	fn flat(gas: u64) -> Self {
		Self {
			gas,
			..Self::default()
		}
	}

	fn touching(gas: u64, memory: MemoryRange) -> Self {
		Self {
			gas,
			memory: Some(memory),
			..Self::default()
		}
	}
}

fn dynamic_charge<H: RuntimeBackend>(
	address: H160,
	opcode: Opcode,
	stack: &Stack,
	gas_left: u64,
	config: &Config,
	handler: &H,
) -> Result<Charge, ExitError> {
	let operand = |n: usize| stack.peek(n);
	let target = |n: usize| operand(n).map(u256_to_h160);
	let range = |offset: usize, len: usize| -> Result<MemoryRange, ExitError> {
		Ok(MemoryRange {
			offset: operand(offset)?,
			len: operand(len)?,
		})
	};

	Ok(match opcode {
		// INVALID costs nothing itself; its handler then consumes the frame's gas.
		Opcode::INVALID => Charge::flat(0),
		Opcode::RETURN | Opcode::REVERT => Charge::touching(0, range(0, 1)?),

		Opcode::MLOAD | Opcode::MSTORE | Opcode::MSTORE8 => {
			let len = if opcode == Opcode::MSTORE8 { 1 } else { 32 };
			Charge::touching(
				consts::G_VERYLOW,
				MemoryRange {
					offset: operand(0)?,
					len: U256::from(len),
				},
			)
		}

		Opcode::BALANCE | Opcode::EXTCODESIZE | Opcode::EXTCODEHASH => {
			let pre_berlin = match opcode {
				Opcode::BALANCE => config.gas_balance(),
				Opcode::EXTCODESIZE => config.gas_ext_code(),
				_ => config.gas_ext_code_hash(),
			};
			let is_cold = handler.is_cold(target(0)?, None);
			Charge::flat(costs::address_access_cost(is_cold, pre_berlin, config))
		}
		Opcode::EXTCODECOPY => {
			let is_cold = handler.is_cold(target(0)?, None);
			Charge::touching(
				costs::extcodecopy_cost(operand(3)?, is_cold, config)?,
				range(1, 3)?,
			)
		}

		Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL | Opcode::STATICCALL => {
			let carries_value = matches!(opcode, Opcode::CALL | Opcode::CALLCODE);
			let (value, args) = if carries_value {
				(operand(2)?, 3)
			} else {
				(U256::zero(), 2)
			};
			let callee = target(1)?;
			let gas = costs::call_cost(
				value,
				handler.is_cold(callee, None),
				carries_value,
				matches!(opcode, Opcode::CALL | Opcode::STATICCALL),
				!target_exists(callee, config, handler),
				config,
			);

			Charge {
				gas,
				refund: 0,
				memory: Some(range(args, args + 1)?.join(range(args + 2, args + 3)?)),
				forwarded: Some(operand(0)?),
			}
		}

		Opcode::KECCAK256 => Charge::touching(costs::sha3_cost(operand(1)?)?, range(0, 1)?),
		Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::RETURNDATACOPY => {
			Charge::touching(costs::verylowcopy_cost(operand(2)?)?, range(0, 2)?)
		}
		Opcode::MCOPY => Charge::touching(
			costs::verylowcopy_cost(operand(2)?)?,
			range(0, 2)?.join(range(1, 2)?),
		),
		Opcode::EXP => Charge::flat(costs::exp_cost(operand(1)?, config)?),

		Opcode::SLOAD => {
			let index = u256_to_h256(operand(0)?);
			Charge::flat(costs::sload_cost(handler.is_cold(address, Some(index)), config))
		}
		Opcode::SSTORE => {
			let index = u256_to_h256(operand(0)?);
			let new = u256_to_h256(operand(1)?);
			let original = handler.original_storage(address, index);
			let current = handler.storage(address, index);
			let is_cold = handler.is_cold(address, Some(index));

			Charge {
				gas: costs::sstore_cost(original, current, new, gas_left, is_cold, config)?,
				refund: costs::sstore_refund(original, current, new, config),
				..Charge::default()
			}
		}

		Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4 => {
			let topics = opcode.as_u8() - Opcode::LOG0.as_u8();
			Charge::touching(costs::log_cost(topics, operand(1)?)?, range(0, 1)?)
		}
		Opcode::CREATE => Charge::touching(costs::create_cost(operand(2)?, config)?, range(1, 2)?),
		Opcode::CREATE2 => {
			Charge::touching(costs::create2_cost(operand(2)?, config)?, range(1, 2)?)
		}

		Opcode::SELFDESTRUCT => {
			let beneficiary = target(0)?;
			let gas = costs::suicide_cost(
				handler.balance(address),
				handler.is_cold(beneficiary, None),
				target_exists(beneficiary, config, handler),
				config,
			);
			let refund = if config.eip3529_decrease_clears_refund {
				0
			} else {
				costs::suicide_refund(handler.deleted(address))
			};

			Charge {
				gas,
				refund,
				..Charge::default()
			}
		}

		_ => return Err(ExitException::InvalidOpcode(opcode).into()),
	})
}

/// A span of memory an opcode touches. Empty spans never expand memory.
#[derive(Debug, Clone, Copy)]
struct MemoryRange {
	offset: U256,
	len: U256,
}

impl MemoryRange {
	/// Whichever of the two reaches further, ignoring empty spans.
	fn join(self, other: Self) -> Self {
		if self.len.is_zero() {
			return other;
		}
		if other.len.is_zero() {
			return self;
		}

		if self.offset.saturating_add(self.len) >= other.offset.saturating_add(other.len) {
			self
		} else {
			other
		}
	}

	/// Memory charge once the span is covered, or `None` for an empty span.
	fn cost(self) -> Result<Option<u64>, ExitError> {
		if self.len.is_zero() {
			return Ok(None);
		}

		let end = self
			.offset
			.checked_add(self.len)
			.filter(|end| *end <= U256::from(usize::MAX))
			.ok_or(ExitException::OutOfGas)?;

		costs::memory_gas(end.as_usize().div_ceil(32)).map(Some)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intrinsic_costs() {
		let config = Config::cancun();
		let data = [0u8, 1, 0, 2];
		let gasometer =
			GasometerState::new_transact_call(U256::from(100_000), &data, &[], &config).unwrap();
		assert_eq!(gasometer.total_used_gas(), 21000 + 2 * 4 + 2 * 16);

		let access_list = [(H160::repeat_byte(1), vec![H256::zero(), H256::repeat_byte(2)])];
		let gasometer =
			GasometerState::new_transact_call(U256::from(100_000), &[], &access_list, &config)
				.unwrap();
		assert_eq!(gasometer.total_used_gas(), 21000 + 2400 + 2 * 1900);

		let gasometer =
			GasometerState::new_transact_create(U256::from(100_000), &[1; 33], &[], &config)
				.unwrap();
		assert_eq!(gasometer.total_used_gas(), 53000 + 33 * 16 + 4);

		assert!(
			GasometerState::new_transact_call(U256::from(20_000), &[], &[], &config).is_err()
		);
	}

	#[test]
	fn disabled_gas_checks_skip_intrinsic_cost() {
		let mut config = Config::cancun();
		config.disable_gas_checks = true;
		let gasometer =
			GasometerState::new_transact_call(U256::from(1000), &[1, 2, 3], &[], &config).unwrap();
		assert_eq!(gasometer.gas64(), 1000);
	}

	#[test]
	fn submeter_and_merge() {
		let config = Config::cancun();
		let mut parent = GasometerState::new(100_000, &config);
		parent.record_gas64(10_000).unwrap();

		let mut child = parent.submeter(U256::from(10_000), true).unwrap();
		assert_eq!(child.gas64(), 12_300);
		assert_eq!(parent.gas64(), 80_000);

		// Unused stipend flows back to the caller.
		child.record_gas64(300).unwrap();
		parent.merge(child, MergeStrategy::Commit);
		assert_eq!(parent.gas64(), 92_000);

		let mut child = parent.submeter(U256::from(1000), false).unwrap();
		child.record_gas64(400).unwrap();
		parent.merge(child, MergeStrategy::Revert);
		assert_eq!(parent.gas64(), 91_600);

		let child = parent.submeter(U256::from(1000), false).unwrap();
		parent.merge(child, MergeStrategy::Discard);
		assert_eq!(parent.gas64(), 90_600);
	}

	#[test]
	fn refund_is_capped() {
		let config = Config::london();
		let mut gasometer = GasometerState::new(100_000, &config);
		gasometer.record_gas64(50_000).unwrap();
		gasometer.refunded_gas = 20_000;

		assert_eq!(gasometer.effective_gas(false), U256::from(50_000));
		assert_eq!(gasometer.effective_gas(true), U256::from(60_000));
	}

	#[test]
	fn oog_consumes_everything() {
		let config = Config::cancun();
		let mut gasometer = GasometerState::new(1000, &config);
		assert!(gasometer.perform(|g| g.record_gas64(2000)).is_err());
		assert_eq!(gasometer.gas64(), 0);
		assert_eq!(gasometer.total_used_gas(), 1000);
	}

	#[test]
	fn memory_range_takes_the_further_span() {
		let near = MemoryRange {
			offset: U256::from(64),
			len: U256::from(32),
		};
		let far = MemoryRange {
			offset: U256::zero(),
			len: U256::from(200),
		};
		let empty = MemoryRange {
			offset: U256::MAX,
			len: U256::zero(),
		};

		assert_eq!(near.join(far).cost().unwrap(), Some(costs::memory_gas(7).unwrap()));
		assert_eq!(empty.join(near).cost().unwrap(), Some(costs::memory_gas(3).unwrap()));
		assert_eq!(empty.cost().unwrap(), None);
		assert!(MemoryRange {
			offset: U256::MAX,
			len: U256::one(),
		}
		.cost()
		.is_err());
	}
}
