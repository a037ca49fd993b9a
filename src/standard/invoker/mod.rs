mod resolver;
mod routines;
mod state;

use alloc::{rc::Rc, vec::Vec};
use core::{cmp::min, convert::Infallible};

use arena_evm_interpreter::{
	error::{
		CallCreateTrap, CallCreateTrapData, CallScheme, CallTrapData, CreateScheme,
		CreateTrapData,
	},
	ArenaCheckpoint, Capture, Context, ExitError, ExitException, ExitResult, GasState,
	Interpreter, RuntimeBackend, RuntimeEnvironment, RuntimeState, TransactionContext, Transfer,
};
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

pub use self::{
	resolver::{EtableResolver, PrecompileSet, Resolver},
	state::InvokerState,
};
use crate::{
	invoker::{DeconstructFor, InvokerControl},
	standard::Config,
	MergeStrategy, TransactionalBackend,
};

/// A top-level transaction.
#[derive(Clone, Debug)]
pub enum TransactArgs {
	/// Message call to `address`. The scheme decides the frame context the
	/// same way the opcode of the same name does.
	Call {
		caller: H160,
		address: H160,
		value: U256,
		data: Vec<u8>,
		gas_limit: U256,
		gas_price: U256,
		access_list: Vec<(H160, Vec<H256>)>,
		scheme: CallScheme,
	},
	/// Contract creation. With a salt the address is derived as `CREATE2`
	/// would, otherwise from the caller's nonce.
	Create {
		caller: H160,
		value: U256,
		init_code: Vec<u8>,
		salt: Option<H256>,
		gas_limit: U256,
		gas_price: U256,
		access_list: Vec<(H160, Vec<H256>)>,
	},
}

impl TransactArgs {
	/// Transaction sender.
	#[must_use]
	pub const fn caller(&self) -> H160 {
		match self {
			Self::Call { caller, .. } | Self::Create { caller, .. } => *caller,
		}
	}

	/// Gas limit of the whole transaction.
	#[must_use]
	pub const fn gas_limit(&self) -> U256 {
		match self {
			Self::Call { gas_limit, .. } | Self::Create { gas_limit, .. } => *gas_limit,
		}
	}

	/// Gas price paid by the sender.
	#[must_use]
	pub const fn gas_price(&self) -> U256 {
		match self {
			Self::Call { gas_price, .. } | Self::Create { gas_price, .. } => *gas_price,
		}
	}

	/// Value moved by the root frame.
	#[must_use]
	pub const fn value(&self) -> U256 {
		match self {
			Self::Call { value, .. } | Self::Create { value, .. } => *value,
		}
	}

	/// Call data or init code.
	#[must_use]
	pub fn input(&self) -> &[u8] {
		match self {
			Self::Call { data, .. } => data,
			Self::Create { init_code, .. } => init_code,
		}
	}

	/// Addresses and storage keys declared up front.
	#[must_use]
	pub fn access_list(&self) -> &[(H160, Vec<H256>)] {
		match self {
			Self::Call { access_list, .. } | Self::Create { access_list, .. } => access_list,
		}
	}
}

/// Bookkeeping of a running transaction, used to finalize it.
#[derive(Clone, Debug)]
pub struct TransactInvoke {
	pub create_address: Option<H160>,
	pub gas_limit: U256,
	pub gas_price: U256,
	pub caller: H160,
}

/// Outcome of a transaction that was not aborted.
#[derive(Clone, Debug)]
pub struct TransactValue {
	/// Exit reason of the root frame. Never fatal.
	pub exit: ExitResult,
	/// Gas charged to the sender, after refunds.
	pub used_gas: U256,
	/// Returned data, or revert data.
	pub retval: Vec<u8>,
	/// Address of the deployed contract, for successful creates.
	pub created: Option<H160>,
}

/// A sub-frame entered through a trap.
pub enum SubstackInvoke {
	Call {
		trap: CallTrapData,
		checkpoint: ArenaCheckpoint,
	},
	Create {
		trap: CreateTrapData,
		address: H160,
		checkpoint: ArenaCheckpoint,
	},
}

/// The standard [crate::Invoker].
///
/// Frames are built by the [Resolver], which also owns the arena. Every child
/// frame runs in a fresh backend substate, so a revert or exception rolls its
/// changes back while the parent keeps going.
pub struct Invoker<'config, 'resolver, R> {
	config: &'config Config,
	resolver: &'resolver R,
}

impl<'config, 'resolver, R> Invoker<'config, 'resolver, R> {
	/// Create a new standard invoker with the given config and resolver.
	pub fn new(config: &'config Config, resolver: &'resolver R) -> Self {
		Self { config, resolver }
	}
}

fn merge_strategy<T>(result: &Result<T, ExitError>) -> MergeStrategy {
	match result {
		Ok(_) => MergeStrategy::Commit,
		// The value could not be moved, so nothing ran and the reserved gas
		// goes back to the caller.
		Err(ExitError::Reverted) | Err(ExitError::Exception(ExitException::OutOfFund)) => {
			MergeStrategy::Revert
		}
		Err(_) => MergeStrategy::Discard,
	}
}

fn l64(gas: U256) -> U256 {
	gas - gas / U256::from(64)
}

impl<'config, 'resolver, H, R> crate::Invoker<H> for Invoker<'config, 'resolver, R>
where
	R::State: InvokerState<'config> + AsRef<RuntimeState> + AsMut<RuntimeState>,
	H: RuntimeEnvironment + RuntimeBackend + TransactionalBackend,
	R: Resolver<H>,
{
	type Interpreter = R::Interpreter;
	type Interrupt = Infallible;
	type TransactArgs = TransactArgs;
	type TransactInvoke = TransactInvoke;
	type TransactValue = TransactValue;
	type SubstackInvoke = SubstackInvoke;

	fn new_transact(
		&self,
		args: TransactArgs,
		handler: &mut H,
	) -> Result<
		(
			TransactInvoke,
			InvokerControl<Self::Interpreter, (ExitResult, DeconstructFor<Self::Interpreter>)>,
		),
		ExitError,
	> {
		let caller = args.caller();
		let gas_limit = args.gas_limit();
		let gas_price = args.gas_price();
		let value = args.value();

		if args.input().len() > self.config.max_input_size {
			return Err(ExitException::InputTooLarge.into());
		}
		if gas_limit > U256::from(self.config.block_gas_limit) {
			return Err(ExitException::BlockGasLimitExceeded.into());
		}
		if let (TransactArgs::Create { init_code, .. }, Some(limit)) =
			(&args, self.config.max_initcode_size())
		{
			if init_code.len() > limit {
				return Err(ExitException::InitcodeTooLarge.into());
			}
		}

		let transaction_context = Rc::new(TransactionContext {
			gas_price,
			origin: caller,
		});

		// The create address depends on the nonce before the transaction
		// bumps it.
		let (target, context, transfer, is_static) = match &args {
			TransactArgs::Call {
				address, scheme, ..
			} => match scheme {
				CallScheme::Call => (
					*address,
					Context {
						address: *address,
						caller,
						apparent_value: value,
					},
					Some(Transfer {
						source: caller,
						target: *address,
						value,
					}),
					false,
				),
				CallScheme::CallCode => (
					*address,
					Context {
						address: caller,
						caller,
						apparent_value: value,
					},
					Some(Transfer {
						source: caller,
						target: caller,
						value,
					}),
					false,
				),
				CallScheme::DelegateCall => (
					*address,
					Context {
						address: caller,
						caller,
						apparent_value: value,
					},
					None,
					false,
				),
				CallScheme::StaticCall => (
					*address,
					Context {
						address: *address,
						caller,
						apparent_value: U256::zero(),
					},
					None,
					true,
				),
			},
			TransactArgs::Create {
				init_code, salt, ..
			} => {
				let scheme = match salt {
					Some(salt) => CreateScheme::Create2 {
						caller,
						code_hash: H256::from_slice(Keccak256::digest(init_code).as_slice()),
						salt: *salt,
					},
					None => CreateScheme::Legacy { caller },
				};
				let address = scheme.address(handler);
				(
					address,
					Context {
						address,
						caller,
						apparent_value: value,
					},
					None,
					false,
				)
			}
		};

		let runtime = RuntimeState {
			context,
			transaction_context,
			retbuf: Vec::new(),
			is_static,
		};
		let state = match &args {
			TransactArgs::Call {
				data, access_list, ..
			} => R::State::new_transact_call(runtime, gas_limit, data, access_list, self.config)?,
			TransactArgs::Create {
				init_code,
				access_list,
				..
			} => R::State::new_transact_create(
				runtime,
				gas_limit,
				init_code,
				access_list,
				self.config,
			)?,
		};

		if !self.config.disable_balance_checks {
			let fee = gas_limit
				.checked_mul(gas_price)
				.ok_or(ExitException::OutOfFund)?;
			let total = fee.checked_add(value).ok_or(ExitException::OutOfFund)?;
			if handler.balance(caller) < total {
				return Err(ExitException::OutOfFund.into());
			}
			handler.withdrawal(caller, fee)?;
		}
		handler.inc_nonce(caller)?;

		if self.config.eip2929_increase_state_access_gas {
			if self.config.eip3651_warm_coinbase_address {
				let coinbase = handler.block_coinbase();
				handler.mark_hot(coinbase, None);
			}
			handler.mark_hot(caller, None);
			handler.mark_hot(target, None);
			for (address, keys) in args.access_list() {
				handler.mark_hot(*address, None);
				for key in keys {
					handler.mark_hot(*address, Some(*key));
				}
			}
			for address in self.resolver.precompile_addresses() {
				handler.mark_hot(address, None);
			}
		}

		log::debug!(
			target: "evm",
			"transact from {:?} to {:?}, gas limit {}",
			caller,
			target,
			gas_limit,
		);

		handler.push_substate();

		let invoke = TransactInvoke {
			create_address: match &args {
				TransactArgs::Create { .. } => Some(target),
				TransactArgs::Call { .. } => None,
			},
			gas_limit,
			gas_price,
			caller,
		};

		let control = match args {
			TransactArgs::Call { data, .. } => {
				if let Some(transfer) = transfer {
					if let Err(err) = handler.transfer(transfer) {
						return Ok((
							invoke,
							InvokerControl::DirectExit((Err(err), (state, Vec::new()))),
						));
					}
				}
				self.resolver.resolve_call(target, data, state, handler)
			}
			TransactArgs::Create { init_code, .. } => {
				match routines::prepare_create_account(self.config, caller, target, value, handler)
				{
					Ok(()) => self.resolver.resolve_create(init_code, state, handler),
					Err(err) => InvokerControl::DirectExit((Err(err), (state, Vec::new()))),
				}
			}
		};

		Ok((invoke, control))
	}

	fn finalize_transact(
		&self,
		invoke: &TransactInvoke,
		exit: ExitResult,
		(mut state, retval): DeconstructFor<Self::Interpreter>,
		handler: &mut H,
	) -> Result<TransactValue, ExitError> {
		let exit = match (exit, invoke.create_address) {
			(Ok(succeed), Some(address)) => routines::deploy_create_code(
				self.config,
				address,
				retval.clone(),
				&mut state,
				handler,
			)
			.map(|()| succeed),
			(exit, _) => exit,
		};

		let strategy = merge_strategy(&exit);
		handler.pop_substate(strategy)?;

		if let Err(err @ ExitError::Fatal(_)) = exit {
			return Err(err);
		}

		let used_gas = match strategy {
			MergeStrategy::Discard => invoke.gas_limit,
			MergeStrategy::Commit => invoke.gas_limit - state.effective_gas(true),
			MergeStrategy::Revert => invoke.gas_limit - state.effective_gas(false),
		};

		if !self.config.disable_balance_checks {
			let left = invoke.gas_limit - used_gas;
			handler.deposit(invoke.caller, left.saturating_mul(invoke.gas_price));

			let coinbase_price = if self.config.eip1559_fee_market {
				invoke
					.gas_price
					.saturating_sub(handler.block_base_fee_per_gas())
			} else {
				invoke.gas_price
			};
			let coinbase = handler.block_coinbase();
			handler.deposit(coinbase, used_gas.saturating_mul(coinbase_price));
		}

		log::debug!(
			target: "evm",
			"transact from {:?} finished: {:?}, used gas {}",
			invoke.caller,
			exit,
			used_gas,
		);

		let created = match (&exit, invoke.create_address) {
			(Ok(_), Some(address)) => Some(address),
			_ => None,
		};

		Ok(TransactValue {
			exit,
			used_gas,
			retval,
			created,
		})
	}

	fn enter_substack(
		&self,
		trap: CallCreateTrap,
		machine: &mut R::Interpreter,
		handler: &mut H,
		depth: usize,
	) -> Capture<
		Result<
			(
				SubstackInvoke,
				InvokerControl<Self::Interpreter, (ExitResult, DeconstructFor<Self::Interpreter>)>,
			),
			ExitError,
		>,
		Infallible,
	> {
		if depth > self.config.max_call_depth {
			log::debug!(target: "evm", "{:?} rejected at depth {}", trap, depth);
			return Capture::Exit(Err(ExitException::CallDepthExceeded.into()));
		}

		let trap_data = match CallCreateTrapData::new_from(trap, machine.machine_mut()) {
			Ok(trap_data) => trap_data,
			Err(err) => return Capture::Exit(Err(err)),
		};

		let state = &mut machine.machine_mut().state;
		let after_gas = if self.config.eip150_call_l64_after_gas {
			l64(state.gas())
		} else {
			state.gas()
		};
		let target_gas = trap_data.target_gas().unwrap_or(after_gas);
		let gas_limit = min(after_gas, target_gas);

		let parent_runtime: &RuntimeState = (*state).as_ref();
		let transaction_context = parent_runtime.transaction_context.clone();
		let parent_static = parent_runtime.is_static;

		match trap_data {
			CallCreateTrapData::Call(call) => {
				let runtime = RuntimeState {
					context: call.context.clone(),
					transaction_context,
					retbuf: Vec::new(),
					is_static: parent_static || call.is_static,
				};
				let substate = match state.substate(runtime, gas_limit, call.has_value()) {
					Ok(substate) => substate,
					Err(err) => return Capture::Exit(Err(err)),
				};

				log::debug!(
					target: "evm",
					"enter call to {:?} at depth {}, gas {}",
					call.target,
					depth,
					gas_limit,
				);

				let checkpoint = self.resolver.checkpoint();
				let control =
					routines::enter_call_substack(self.resolver, &call, call.target, substate, handler);

				Capture::Exit(Ok((
					SubstackInvoke::Call {
						trap: call,
						checkpoint,
					},
					control,
				)))
			}
			CallCreateTrapData::Create(create) => {
				let caller = create.scheme.caller();
				let address = create.scheme.address(handler);

				let runtime = RuntimeState {
					context: Context {
						address,
						caller,
						apparent_value: create.value,
					},
					transaction_context,
					retbuf: Vec::new(),
					is_static: parent_static,
				};
				let substate = match state.substate(runtime, gas_limit, false) {
					Ok(substate) => substate,
					Err(err) => return Capture::Exit(Err(err)),
				};

				log::debug!(
					target: "evm",
					"enter create of {:?} at depth {}, gas {}",
					address,
					depth,
					gas_limit,
				);

				let checkpoint = self.resolver.checkpoint();
				let control = routines::enter_create_substack(
					self.config,
					self.resolver,
					&create,
					address,
					true,
					substate,
					handler,
				);

				Capture::Exit(Ok((
					SubstackInvoke::Create {
						trap: create,
						address,
						checkpoint,
					},
					control,
				)))
			}
		}
	}

	fn exit_substack(
		&self,
		result: ExitResult,
		(mut child, retval): DeconstructFor<Self::Interpreter>,
		trap_data: SubstackInvoke,
		parent: &mut Self::Interpreter,
		handler: &mut H,
	) -> Result<(), ExitError> {
		match trap_data {
			SubstackInvoke::Call { trap, checkpoint } => {
				self.resolver.restore(checkpoint);

				let strategy = merge_strategy(&result);
				log::debug!(
					target: "evm",
					"exit call to {:?}: {:?}",
					trap.target,
					result,
				);

				parent.machine_mut().state.merge(child, strategy);
				handler.pop_substate(strategy)?;

				trap.feedback(result, retval, parent)
			}
			SubstackInvoke::Create {
				trap,
				address,
				checkpoint,
			} => {
				self.resolver.restore(checkpoint);

				let result = match result {
					Ok(_) => routines::deploy_create_code(
						self.config,
						address,
						retval.clone(),
						&mut child,
						handler,
					)
					.map(|()| address),
					Err(err) => Err(err),
				};
				let retbuf = match result {
					Err(ExitError::Reverted) => retval,
					_ => Vec::new(),
				};

				let strategy = merge_strategy(&result);
				log::debug!(
					target: "evm",
					"exit create of {:?}: {:?}",
					address,
					result,
				);

				parent.machine_mut().state.merge(child, strategy);
				handler.pop_substate(strategy)?;

				trap.feedback(result, retbuf, parent)
			}
		}
	}
}
