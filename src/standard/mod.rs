//! # Standard configuration, gasometer and invoker
//!
//! This module implements the Ethereum mainnet flavour of the interpreter: a
//! hardfork-driven [Config], a gasometer running as its own dispatch table in
//! front of the execution table, and an [Invoker] handling calls and creates.
//! Opcode and precompile [Overrides] are patched into the tables once, when
//! they are built.

mod config;
mod gasometer;
mod invoker;
mod overrides;

use alloc::vec::Vec;

use arena_evm_interpreter::{
	error::CallCreateTrap, ExitError, GasState, RuntimeState,
};
use primitive_types::{H160, H256, U256};

pub use self::{
	config::{ArenaConfig, Config, ConfigError, Eip, EipOverride, Hardfork},
	gasometer::{eval as eval_gasometer, GasometerState},
	invoker::{
		EtableResolver, Invoker, InvokerState, PrecompileSet, Resolver, SubstackInvoke,
		TransactArgs, TransactInvoke, TransactValue,
	},
	overrides::{OverrideFn, Overrides},
};
use crate::MergeStrategy;

/// Machine state of a standard frame: the runtime context together with the
/// frame's gasometer.
pub struct State<'config> {
	pub runtime: RuntimeState,
	pub gasometer: GasometerState<'config>,
}

impl<'config> AsRef<RuntimeState> for State<'config> {
	fn as_ref(&self) -> &RuntimeState {
		&self.runtime
	}
}

impl<'config> AsMut<RuntimeState> for State<'config> {
	fn as_mut(&mut self) -> &mut RuntimeState {
		&mut self.runtime
	}
}

impl<'config> AsRef<GasometerState<'config>> for State<'config> {
	fn as_ref(&self) -> &GasometerState<'config> {
		&self.gasometer
	}
}

impl<'config> AsMut<GasometerState<'config>> for State<'config> {
	fn as_mut(&mut self) -> &mut GasometerState<'config> {
		&mut self.gasometer
	}
}

impl<'config> GasState for State<'config> {
	fn gas(&self) -> U256 {
		self.gasometer.gas()
	}
}

impl<'config> InvokerState<'config> for State<'config> {
	fn new_transact_call(
		runtime: RuntimeState,
		gas_limit: U256,
		data: &[u8],
		access_list: &[(H160, Vec<H256>)],
		config: &'config Config,
	) -> Result<Self, ExitError> {
		Ok(Self {
			runtime,
			gasometer: GasometerState::new_transact_call(gas_limit, data, access_list, config)?,
		})
	}

	fn new_transact_create(
		runtime: RuntimeState,
		gas_limit: U256,
		code: &[u8],
		access_list: &[(H160, Vec<H256>)],
		config: &'config Config,
	) -> Result<Self, ExitError> {
		Ok(Self {
			runtime,
			gasometer: GasometerState::new_transact_create(gas_limit, code, access_list, config)?,
		})
	}

	fn substate(
		&mut self,
		runtime: RuntimeState,
		gas_limit: U256,
		call_has_value: bool,
	) -> Result<Self, ExitError> {
		Ok(Self {
			runtime,
			gasometer: self.gasometer.submeter(gas_limit, call_has_value)?,
		})
	}

	fn merge(&mut self, substate: Self, strategy: MergeStrategy) {
		self.gasometer.merge(substate.gasometer, strategy)
	}

	fn record_codedeposit(&mut self, len: usize) -> Result<(), ExitError> {
		self.gasometer.record_codedeposit(len)
	}

	fn record_gas(&mut self, cost: U256) -> Result<(), ExitError> {
		self.gasometer.record_gas(cost)
	}

	fn is_static(&self) -> bool {
		self.runtime.is_static
	}

	fn effective_gas(&self, with_refund: bool) -> U256 {
		self.gasometer.effective_gas(with_refund)
	}
}

/// Standard machine.
pub type Machine<'config> = crate::Machine<State<'config>>;

/// Standard Etable opcode handle function.
pub type Efn<'config, H> = crate::Efn<State<'config>, H, CallCreateTrap>;

/// Standard Etable.
pub type Etable<'config, H, F = Efn<'config, H>> =
	crate::Etable<State<'config>, H, CallCreateTrap, F>;

/// Gas table evaluated in front of the execution table.
pub type EtableSet<'config, H> = (Etable<'config, H>, Etable<'config, H>);

#[cfg(test)]
mod tests {
	use alloc::rc::Rc;

	use arena_evm_interpreter::{Context, TransactionContext};

	use super::*;

	fn runtime() -> RuntimeState {
		RuntimeState {
			context: Context {
				address: H160::repeat_byte(1),
				caller: H160::repeat_byte(2),
				apparent_value: U256::zero(),
			},
			transaction_context: Rc::new(TransactionContext {
				gas_price: U256::one(),
				origin: H160::repeat_byte(2),
			}),
			retbuf: Vec::new(),
			is_static: false,
		}
	}

	#[test]
	fn substate_reserves_and_returns_gas() {
		let config = Config::cancun();
		let mut parent =
			State::new_transact_call(runtime(), U256::from(100_000), &[], &[], &config).unwrap();
		assert_eq!(parent.gas(), U256::from(79_000));

		let mut child = parent
			.substate(runtime(), U256::from(50_000), false)
			.unwrap();
		assert_eq!(parent.gas(), U256::from(29_000));
		assert_eq!(child.gas(), U256::from(50_000));

		child.record_gas(U256::from(1_000)).unwrap();
		parent.merge(child, MergeStrategy::Revert);
		assert_eq!(parent.gas(), U256::from(78_000));
	}

	#[test]
	fn static_flag_follows_runtime() {
		let config = Config::cancun();
		let mut rt = runtime();
		rt.is_static = true;
		let state = State::new_transact_call(rt, U256::from(30_000), &[], &[], &config).unwrap();
		assert!(state.is_static());
	}
}
