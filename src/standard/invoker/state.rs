use alloc::vec::Vec;

use arena_evm_interpreter::{ExitError, GasState, RuntimeState};
use primitive_types::{H160, H256, U256};

use crate::{standard::Config, MergeStrategy};

/// Frame state driven by [crate::standard::Invoker].
pub trait InvokerState<'config>: GasState + Sized {
	/// Create the root state of a call transaction, charging intrinsic gas.
	fn new_transact_call(
		runtime: RuntimeState,
		gas_limit: U256,
		data: &[u8],
		access_list: &[(H160, Vec<H256>)],
		config: &'config Config,
	) -> Result<Self, ExitError>;
	/// Create the root state of a create transaction, charging intrinsic gas.
	fn new_transact_create(
		runtime: RuntimeState,
		gas_limit: U256,
		code: &[u8],
		access_list: &[(H160, Vec<H256>)],
		config: &'config Config,
	) -> Result<Self, ExitError>;

	/// Create a child state, reserving `gas_limit` from this one.
	fn substate(
		&mut self,
		runtime: RuntimeState,
		gas_limit: U256,
		call_has_value: bool,
	) -> Result<Self, ExitError>;
	/// Merge a retired child state back using the given strategy.
	fn merge(&mut self, substate: Self, strategy: MergeStrategy);

	/// Charge the deposit of `len` bytes of contract code.
	fn record_codedeposit(&mut self, len: usize) -> Result<(), ExitError>;
	/// Charge a fixed amount, used by precompiles.
	fn record_gas(&mut self, cost: U256) -> Result<(), ExitError>;
	/// Whether the frame is static.
	fn is_static(&self) -> bool;
	/// Gas left for the caller at the end of the transaction.
	fn effective_gas(&self, with_refund: bool) -> U256;
}
