use alloc::{rc::Rc, vec::Vec};

use arena_evm_interpreter::{
	error::CallCreateTrap, ArenaCheckpoint, EtableInterpreter, EtableSet, ExitException,
	ExitResult, ExitSucceed, FusionSet, Interpreter, Machine, RunInterpreter, RuntimeBaseBackend,
	SharedArena,
};
use arena_evm_precompile::Precompiles;
use primitive_types::H160;

use crate::{
	invoker::InvokerControl,
	standard::{Config, State},
};

/// A code resolver.
///
/// The resolver decides how a call (with the target code address) or create
/// (with the init code) turns into an interpreter. It can construct a new
/// frame, pushing the call stack, or exit directly, handling a precompile.
pub trait Resolver<H> {
	type State;
	type Interpreter: Interpreter<State = Self::State> + RunInterpreter<H, Trap = CallCreateTrap>;

	/// Resolve a call (with the target code address).
	#[allow(clippy::type_complexity)]
	fn resolve_call(
		&self,
		code_address: H160,
		input: Vec<u8>,
		state: Self::State,
		handler: &mut H,
	) -> InvokerControl<Self::Interpreter, (ExitResult, (Self::State, Vec<u8>))>;

	/// Resolve a create (with the init code).
	#[allow(clippy::type_complexity)]
	fn resolve_create(
		&self,
		init_code: Vec<u8>,
		state: Self::State,
		handler: &mut H,
	) -> InvokerControl<Self::Interpreter, (ExitResult, (Self::State, Vec<u8>))>;

	/// Addresses warmed at the start of every transaction.
	fn precompile_addresses(&self) -> Vec<H160>;

	/// Current arena position, taken before a child frame is built.
	fn checkpoint(&self) -> ArenaCheckpoint;
	/// Release the memory of every frame built after `checkpoint`.
	fn restore(&self, checkpoint: ArenaCheckpoint);
}

/// A set of precompiles.
pub trait PrecompileSet<S, H> {
	/// Attempt to execute the precompile at `code_address`. Returns `None` if
	/// it's not a precompile.
	fn execute(
		&self,
		code_address: H160,
		input: &[u8],
		state: &mut S,
		handler: &mut H,
	) -> Option<(ExitResult, Vec<u8>)>;

	/// Installed addresses.
	fn addresses(&self) -> Vec<H160>;
}

impl<S, H> PrecompileSet<S, H> for () {
	fn execute(
		&self,
		_code_address: H160,
		_input: &[u8],
		_state: &mut S,
		_handler: &mut H,
	) -> Option<(ExitResult, Vec<u8>)> {
		None
	}

	fn addresses(&self) -> Vec<H160> {
		Vec::new()
	}
}

impl<'config, H> PrecompileSet<State<'config>, H> for Precompiles {
	fn execute(
		&self,
		code_address: H160,
		input: &[u8],
		state: &mut State<'config>,
		_handler: &mut H,
	) -> Option<(ExitResult, Vec<u8>)> {
		let precompile = self.get(&code_address)?;

		let gas_limit = state.gasometer.gas64();
		let output = precompile.execute(input, gas_limit);
		log::debug!(
			target: "evm",
			"precompile {:?}: success {}, gas used {} of {}",
			code_address,
			output.success,
			output.gas_used,
			gas_limit,
		);

		if let Err(err) = state.gasometer.record_gas64(output.gas_used) {
			state.gasometer.oog();
			return Some((Err(err), Vec::new()));
		}
		if !output.success {
			return Some((Err(ExitException::PrecompileFailed.into()), Vec::new()));
		}

		Some((Ok(ExitSucceed::Returned), output.output))
	}

	fn addresses(&self) -> Vec<H160> {
		Precompiles::addresses(self)
	}
}

/// The standard code resolver, building [EtableInterpreter]s whose memory is
/// carved from a shared arena.
pub struct EtableResolver<'config, 'precompile, 'etable, Pre, ES> {
	config: &'config Config,
	precompiles: &'precompile Pre,
	etable: &'etable ES,
	fusion: &'etable FusionSet,
	arena: SharedArena,
}

impl<'config, 'precompile, 'etable, Pre, ES>
	EtableResolver<'config, 'precompile, 'etable, Pre, ES>
{
	/// Create a new resolver.
	pub fn new(
		config: &'config Config,
		precompiles: &'precompile Pre,
		etable: &'etable ES,
		fusion: &'etable FusionSet,
		arena: SharedArena,
	) -> Self {
		Self {
			config,
			precompiles,
			etable,
			fusion,
			arena,
		}
	}

	fn interpreter<S>(
		&self,
		code: Vec<u8>,
		data: Vec<u8>,
		state: S,
	) -> EtableInterpreter<'etable, S, ES> {
		let machine = Machine::new(
			Rc::new(code),
			Rc::new(data),
			&self.config.frame_config(),
			self.arena.clone(),
			state,
		);

		let interpreter = EtableInterpreter::new(machine, self.etable)
			.with_loop_counter(self.config.create_loop_safety_counter());
		if self.config.enable_fusion {
			interpreter.with_fusion(self.fusion)
		} else {
			interpreter
		}
	}
}

impl<'config, 'precompile, 'etable, H, Pre, ES> Resolver<H>
	for EtableResolver<'config, 'precompile, 'etable, Pre, ES>
where
	H: RuntimeBaseBackend,
	Pre: PrecompileSet<State<'config>, H>,
	ES: EtableSet<State = State<'config>, Handle = H, Trap = CallCreateTrap>,
{
	type State = State<'config>;
	type Interpreter = EtableInterpreter<'etable, State<'config>, ES>;

	fn resolve_call(
		&self,
		code_address: H160,
		input: Vec<u8>,
		mut state: State<'config>,
		handler: &mut H,
	) -> InvokerControl<Self::Interpreter, (ExitResult, (State<'config>, Vec<u8>))> {
		if let Some((exit, retval)) =
			self.precompiles
				.execute(code_address, &input, &mut state, handler)
		{
			return InvokerControl::DirectExit((exit, (state, retval)));
		}

		let code = handler.code(code_address);
		InvokerControl::Enter(self.interpreter(code, input, state))
	}

	fn resolve_create(
		&self,
		init_code: Vec<u8>,
		state: State<'config>,
		_handler: &mut H,
	) -> InvokerControl<Self::Interpreter, (ExitResult, (State<'config>, Vec<u8>))> {
		InvokerControl::Enter(self.interpreter(init_code, Vec::new(), state))
	}

	fn precompile_addresses(&self) -> Vec<H160> {
		self.precompiles.addresses()
	}

	fn checkpoint(&self) -> ArenaCheckpoint {
		self.arena.borrow().checkpoint()
	}

	fn restore(&self, checkpoint: ArenaCheckpoint) {
		self.arena.borrow_mut().restore(checkpoint);
	}
}

