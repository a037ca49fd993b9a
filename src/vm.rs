use alloc::vec::Vec;
use core::{fmt, mem};

use arena_evm_interpreter::{
	error::CallScheme, ArenaError, ExitError, ExitFatal, ExitResult, FusionSet, GrowingArena, Log,
	RuntimeEnvironment, SharedArena,
};
use arena_evm_precompile::Precompiles;
use primitive_types::{H160, H256, U256};

use crate::{
	backend::{Database, DatabaseError, OverlayedBackend},
	standard::{
		Config, ConfigError, EtableResolver, EtableSet, Invoker, Overrides, TransactArgs,
		TransactValue,
	},
	transact,
};

/// Frames up to this depth recurse natively, deeper ones use the heap.
const TRANSACT_HEAP_DEPTH: Option<usize> = Some(4);

/// Handler every frame of a [Vm] runs against.
pub type VmBackend<'config, E, D> = OverlayedBackend<'config, E, D>;

/// A top-level message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallParams {
	Call {
		caller: H160,
		to: H160,
		value: U256,
		input: Vec<u8>,
		gas: u64,
	},
	CallCode {
		caller: H160,
		to: H160,
		value: U256,
		input: Vec<u8>,
		gas: u64,
	},
	DelegateCall {
		caller: H160,
		to: H160,
		input: Vec<u8>,
		gas: u64,
	},
	StaticCall {
		caller: H160,
		to: H160,
		input: Vec<u8>,
		gas: u64,
	},
	Create {
		caller: H160,
		value: U256,
		init_code: Vec<u8>,
		gas: u64,
	},
	Create2 {
		caller: H160,
		value: U256,
		init_code: Vec<u8>,
		salt: H256,
		gas: u64,
	},
}

impl CallParams {
	/// Sender of the message.
	#[must_use]
	pub const fn caller(&self) -> H160 {
		match self {
			Self::Call { caller, .. }
			| Self::CallCode { caller, .. }
			| Self::DelegateCall { caller, .. }
			| Self::StaticCall { caller, .. }
			| Self::Create { caller, .. }
			| Self::Create2 { caller, .. } => *caller,
		}
	}

	/// Gas limit of the message.
	#[must_use]
	pub const fn gas(&self) -> u64 {
		match self {
			Self::Call { gas, .. }
			| Self::CallCode { gas, .. }
			| Self::DelegateCall { gas, .. }
			| Self::StaticCall { gas, .. }
			| Self::Create { gas, .. }
			| Self::Create2 { gas, .. } => *gas,
		}
	}

	fn into_transact_args(self, gas_price: U256) -> TransactArgs {
		let call = |caller, address, value, data, gas: u64, scheme| TransactArgs::Call {
			caller,
			address,
			value,
			data,
			gas_limit: U256::from(gas),
			gas_price,
			access_list: Vec::new(),
			scheme,
		};
		let create = |caller, value, init_code, salt, gas: u64| TransactArgs::Create {
			caller,
			value,
			init_code,
			salt,
			gas_limit: U256::from(gas),
			gas_price,
			access_list: Vec::new(),
		};

		match self {
			Self::Call {
				caller,
				to,
				value,
				input,
				gas,
			} => call(caller, to, value, input, gas, CallScheme::Call),
			Self::CallCode {
				caller,
				to,
				value,
				input,
				gas,
			} => call(caller, to, value, input, gas, CallScheme::CallCode),
			Self::DelegateCall {
				caller,
				to,
				input,
				gas,
			} => call(caller, to, U256::zero(), input, gas, CallScheme::DelegateCall),
			Self::StaticCall {
				caller,
				to,
				input,
				gas,
			} => call(caller, to, U256::zero(), input, gas, CallScheme::StaticCall),
			Self::Create {
				caller,
				value,
				init_code,
				gas,
			} => create(caller, value, init_code, None, gas),
			Self::Create2 {
				caller,
				value,
				init_code,
				salt,
				gas,
			} => create(caller, value, init_code, Some(salt), gas),
		}
	}
}

/// Outcome of an executed message. Owns its data, independent of the arena.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallResult {
	pub success: bool,
	pub gas_left: u64,
	pub gas_used: u64,
	/// Returned data, or revert data.
	pub output: Vec<u8>,
	pub logs: Vec<Log>,
	pub created_address: Option<H160>,
	pub exit: ExitResult,
}

impl CallResult {
	fn new(value: TransactValue, gas_limit: u64, logs: Vec<Log>) -> Self {
		let gas_used = if value.used_gas > U256::from(gas_limit) {
			gas_limit
		} else {
			value.used_gas.low_u64()
		};

		Self {
			success: value.exit.is_ok(),
			gas_left: gas_limit - gas_used,
			gas_used,
			output: value.retval,
			logs,
			created_address: value.created,
			exit: value.exit,
		}
	}
}

/// Failure to build a [Vm] or to run a message to completion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VmError {
	/// The configuration is inconsistent.
	Config(ConfigError),
	/// The arena could not be set up or reset.
	Arena(ArenaError),
	/// The message was rejected before any frame ran. Nothing was written.
	Rejected(ExitError),
	/// Execution aborted. Nothing was written.
	Fatal(ExitFatal),
	/// The change set could not be written back. Writes already made were
	/// undone.
	Database(DatabaseError),
	/// A previous execution panicked and took the state with it.
	Poisoned,
}

impl fmt::Display for VmError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Config(err) => write!(f, "invalid config: {err}"),
			Self::Arena(err) => write!(f, "{err}"),
			Self::Rejected(err) => write!(f, "rejected: {err}"),
			Self::Fatal(err) => write!(f, "fatal: {err}"),
			Self::Database(err) => write!(f, "database: {err}"),
			Self::Poisoned => f.write_str("vm state lost by an earlier panic"),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for VmError {}

impl From<ConfigError> for VmError {
	fn from(err: ConfigError) -> Self {
		Self::Config(err)
	}
}

impl From<ArenaError> for VmError {
	fn from(err: ArenaError) -> Self {
		Self::Arena(err)
	}
}

impl From<DatabaseError> for VmError {
	fn from(err: DatabaseError) -> Self {
		Self::Database(err)
	}
}

impl From<ExitError> for VmError {
	fn from(err: ExitError) -> Self {
		match err {
			ExitError::Fatal(fatal) => Self::Fatal(fatal),
			other => Self::Rejected(other),
		}
	}
}

/// An EVM instance: a resolved configuration, the dispatch tables built from
/// it, one arena and the world state.
///
/// Messages run one at a time. Each one sees the changes of the previous
/// ones, and the arena is reset in between.
pub struct Vm<'config, E, D> {
	config: &'config Config,
	etables: EtableSet<'config, VmBackend<'config, E, D>>,
	fusion: FusionSet,
	precompiles: Precompiles,
	arena: SharedArena,
	parts: Option<(E, D)>,
	gas_price: U256,
}

impl<'config, E, D> Vm<'config, E, D>
where
	E: RuntimeEnvironment,
	D: Database,
{
	/// Build a VM without overrides.
	pub fn new(config: &'config Config, environment: E, database: D) -> Result<Self, VmError> {
		Self::with_overrides(config, environment, database, Overrides::new())
	}

	/// Build a VM, patching `overrides` into its tables.
	pub fn with_overrides(
		config: &'config Config,
		environment: E,
		database: D,
		overrides: Overrides<VmBackend<'config, E, D>>,
	) -> Result<Self, VmError> {
		config.validate()?;

		let arena = GrowingArena::shared(
			config.arena.initial_capacity,
			config.arena.max_capacity,
			config.arena.growth_factor_percent,
		)?;

		Ok(Self {
			config,
			etables: overrides.etables(config),
			fusion: overrides.fusion_set(config),
			precompiles: overrides.into_precompiles(config),
			arena,
			parts: Some((environment, database)),
			gas_price: U256::zero(),
		})
	}

	/// Run one message and write its changes back to the database.
	///
	/// Any outcome of the message itself, including reverts and exceptions,
	/// is a [CallResult]: the sender's nonce and fee are still written. Only
	/// rejected or aborted messages leave the database untouched.
	pub fn execute(&mut self, params: CallParams) -> Result<CallResult, VmError> {
		let gas_limit = params.gas();
		let (environment, database) = self.parts.take().ok_or(VmError::Poisoned)?;

		let mut backend = OverlayedBackend::new(environment, database, self.config);
		let resolver = EtableResolver::new(
			self.config,
			&self.precompiles,
			&self.etables,
			&self.fusion,
			self.arena.clone(),
		);
		let invoker = Invoker::new(self.config, &resolver);
		let result = transact(
			params.into_transact_args(self.gas_price),
			TRANSACT_HEAP_DEPTH,
			&mut backend,
			&invoker,
		);

		let (environment, mut database, mut changes) = backend.deconstruct();
		let outcome = match result {
			Ok(value) => {
				let logs = mem::take(&mut changes.logs);
				changes
					.apply(&mut database)
					.map(|()| CallResult::new(value, gas_limit, logs))
					.map_err(VmError::from)
			}
			Err(err) => {
				log::debug!(target: "evm", "message dropped: {}", err);
				Err(err.into())
			}
		};
		self.parts = Some((environment, database));

		self.arena.borrow_mut().reset_retain_capacity()?;
		outcome
	}
}

impl<'config, E, D> Vm<'config, E, D> {
	/// The configuration the VM was built with.
	#[must_use]
	pub const fn config(&self) -> &'config Config {
		self.config
	}

	/// Gas price charged for subsequent messages. Zero by default.
	pub fn set_gas_price(&mut self, gas_price: U256) {
		self.gas_price = gas_price;
	}

	/// World state. `None` only after a panic during execution.
	#[must_use]
	pub fn database(&self) -> Option<&D> {
		self.parts.as_ref().map(|(_, database)| database)
	}

	/// Mutable world state, for seeding accounts between messages.
	pub fn database_mut(&mut self) -> Option<&mut D> {
		self.parts.as_mut().map(|(_, database)| database)
	}

	/// Block and chain information.
	pub fn environment_mut(&mut self) -> Option<&mut E> {
		self.parts.as_mut().map(|(environment, _)| environment)
	}

	/// Bytes currently owned by the arena.
	#[must_use]
	pub fn arena_capacity(&self) -> usize {
		self.arena.borrow().current_capacity()
	}

	/// Give back everything the arena grew beyond its initial capacity.
	pub fn shrink_arena(&mut self) -> Result<(), VmError> {
		self.arena.borrow_mut().reset_to_initial_capacity()?;
		Ok(())
	}

	/// Take the environment and the database back.
	#[must_use]
	pub fn into_parts(self) -> Option<(E, D)> {
		self.parts
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		backend::{Account, InMemoryDatabase, InMemoryEnvironment},
		ExitException,
	};

	const SENDER: H160 = H160([0x11; 20]);
	const TARGET: H160 = H160([0x22; 20]);

	fn vm(config: &Config) -> Vm<'_, InMemoryEnvironment, InMemoryDatabase> {
		let mut db = InMemoryDatabase::new();
		db.insert_account(SENDER, U256::from(1_000_000), Vec::new());
		Vm::new(config, InMemoryEnvironment::default(), db).unwrap()
	}

	#[test]
	fn invalid_config_is_refused() {
		let mut config = Config::cancun();
		config.arena.growth_factor_percent = 100;
		assert!(matches!(
			Vm::new(&config, InMemoryEnvironment::default(), InMemoryDatabase::new()),
			Err(VmError::Config(ConfigError::GrowthFactorTooSmall(100)))
		));
	}

	#[test]
	fn rejected_message_writes_nothing() {
		let config = Config::cancun();
		let mut vm = vm(&config);
		let result = vm.execute(CallParams::Call {
			caller: SENDER,
			to: TARGET,
			value: U256::zero(),
			input: Vec::new(),
			gas: 20_000,
		});

		assert_eq!(
			result,
			Err(VmError::Rejected(ExitException::OutOfGas.into()))
		);
		assert_eq!(vm.database().unwrap().nonce(SENDER), U256::zero());
	}

	/// Refuses account writes, accepts everything else.
	struct FrozenAccounts(InMemoryDatabase);

	impl Database for FrozenAccounts {
		fn get_account(&self, address: H160) -> Option<Account> {
			self.0.get_account(address)
		}
		fn set_account(&mut self, _: H160, _: Account) -> Result<(), DatabaseError> {
			Err(DatabaseError::ReadOnly)
		}
		fn get_storage(&self, address: H160, slot: U256) -> U256 {
			self.0.get_storage(address, slot)
		}
		fn storage_slots(&self, address: H160) -> Vec<(U256, U256)> {
			self.0.storage_slots(address)
		}
		fn set_storage(
			&mut self,
			address: H160,
			slot: U256,
			value: U256,
		) -> Result<(), DatabaseError> {
			self.0.set_storage(address, slot, value)
		}
		fn set_code(&mut self, code: Vec<u8>) -> Result<H256, DatabaseError> {
			self.0.set_code(code)
		}
		fn get_code(&self, code_hash: H256) -> Vec<u8> {
			self.0.get_code(code_hash)
		}
		fn delete_account(&mut self, address: H160) -> Result<(), DatabaseError> {
			self.0.delete_account(address)
		}
		fn clear_storage(&mut self, address: H160) -> Result<(), DatabaseError> {
			self.0.clear_storage(address)
		}
	}

	#[test]
	fn failed_write_back_leaves_no_partial_state() {
		let config = Config::cancun();
		let mut db = InMemoryDatabase::new();
		db.insert_account(SENDER, U256::from(1_000_000), Vec::new());
		// PUSH1 42 PUSH1 0 SSTORE STOP
		db.insert_account(TARGET, U256::zero(), vec![0x60, 0x2a, 0x60, 0x00, 0x55, 0x00]);
		let mut vm = Vm::new(&config, InMemoryEnvironment::default(), FrozenAccounts(db)).unwrap();

		let result = vm.execute(CallParams::Call {
			caller: SENDER,
			to: TARGET,
			value: U256::zero(),
			input: Vec::new(),
			gas: 100_000,
		});
		assert_eq!(result, Err(VmError::Database(DatabaseError::ReadOnly)));

		let db = &vm.database().unwrap().0;
		assert_eq!(db.get_storage(TARGET, U256::zero()), U256::zero());
		assert_eq!(db.nonce(SENDER), U256::zero());
	}

	#[test]
	fn failed_message_still_bumps_the_nonce() {
		let config = Config::cancun();
		let mut vm = vm(&config);
		vm.database_mut()
			.unwrap()
			.insert_account(TARGET, U256::zero(), vec![0xfe]);

		let result = vm
			.execute(CallParams::Call {
				caller: SENDER,
				to: TARGET,
				value: U256::zero(),
				input: Vec::new(),
				gas: 50_000,
			})
			.unwrap();

		assert!(!result.success);
		assert_eq!(result.gas_used, 50_000);
		assert_eq!(result.gas_left, 0);
		assert_eq!(
			result.exit,
			Err(ExitException::DesignatedInvalid.into())
		);
		assert_eq!(vm.database().unwrap().nonce(SENDER), U256::one());
	}
}
