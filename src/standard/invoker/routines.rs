use alloc::vec::Vec;

use arena_evm_interpreter::{
	error::{CallTrapData, CreateTrapData},
	ExitError, ExitException, ExitResult, Opcode, RuntimeBackend, RuntimeEnvironment,
	RuntimeState, Transfer,
};
use primitive_types::{H160, U256};

use super::{InvokerState, Resolver};
use crate::{invoker::InvokerControl, standard::Config, TransactionalBackend};

#[allow(clippy::type_complexity)]
pub type ResolveResult<R, H> = InvokerControl<
	<R as Resolver<H>>::Interpreter,
	(ExitResult, (<R as Resolver<H>>::State, Vec<u8>)),
>;

/// Open the substate of a call frame, move the value and resolve the code.
/// Failures after the substate is opened exit directly, leaving the substate
/// for the caller to pop.
pub fn enter_call_substack<'config, H, R>(
	resolver: &R,
	trap: &CallTrapData,
	code_address: H160,
	state: R::State,
	handler: &mut H,
) -> ResolveResult<R, H>
where
	H: RuntimeEnvironment + RuntimeBackend + TransactionalBackend,
	R: Resolver<H>,
	R::State: InvokerState<'config> + AsRef<RuntimeState>,
{
	handler.push_substate();
	handler.mark_hot(trap.target, None);

	if let Some(transfer) = &trap.transfer {
		if let Err(err) = handler.transfer(transfer.clone()) {
			return InvokerControl::DirectExit((Err(err), (state, Vec::new())));
		}
	}

	resolver.resolve_call(code_address, trap.input.clone(), state, handler)
}

/// Bump the creator's nonce, open the substate of a create frame, set up the
/// new account and resolve the init code.
pub fn enter_create_substack<'config, H, R>(
	config: &Config,
	resolver: &R,
	trap: &CreateTrapData,
	address: H160,
	bump_caller_nonce: bool,
	state: R::State,
	handler: &mut H,
) -> ResolveResult<R, H>
where
	H: RuntimeEnvironment + RuntimeBackend + TransactionalBackend,
	R: Resolver<H>,
	R::State: InvokerState<'config> + AsRef<RuntimeState>,
{
	let caller = trap.scheme.caller();

	if let Err(err) = check_create(config, caller, trap, handler) {
		handler.push_substate();
		return InvokerControl::DirectExit((Err(err), (state, Vec::new())));
	}

	if bump_caller_nonce {
		if let Err(err) = handler.inc_nonce(caller) {
			handler.push_substate();
			return InvokerControl::DirectExit((Err(err), (state, Vec::new())));
		}
	}

	handler.push_substate();
	match prepare_create_account(config, caller, address, trap.value, handler) {
		Ok(()) => resolver.resolve_create(trap.code.clone(), state, handler),
		Err(err) => InvokerControl::DirectExit((Err(err), (state, Vec::new()))),
	}
}

fn check_create<H: RuntimeBackend>(
	config: &Config,
	caller: H160,
	trap: &CreateTrapData,
	handler: &H,
) -> Result<(), ExitError> {
	if let Some(limit) = config.max_initcode_size() {
		if trap.code.len() > limit {
			return Err(ExitException::InitcodeTooLarge.into());
		}
	}

	if !config.disable_balance_checks && trap.value > handler.balance(caller) {
		return Err(ExitException::OutOfFund.into());
	}

	Ok(())
}

/// Reject collisions, then mark `address` created and move the endowment.
pub fn prepare_create_account<H: RuntimeBackend>(
	config: &Config,
	caller: H160,
	address: H160,
	value: U256,
	handler: &mut H,
) -> Result<(), ExitError> {
	handler.mark_hot(address, None);

	if handler.code_size(address) != U256::zero() || handler.nonce(address) > U256::zero() {
		return Err(ExitException::CreateCollision.into());
	}

	handler.mark_create(address);
	if config.eip161_create_increase_nonce {
		handler.inc_nonce(address)?;
	}
	handler.reset_storage(address);

	handler.transfer(Transfer {
		source: caller,
		target: address,
		value,
	})
}

fn check_first_byte(config: &Config, code: &[u8]) -> Result<(), ExitError> {
	if config.eip3541_disallow_executable_format && Some(&Opcode::EOFMAGIC.as_u8()) == code.first()
	{
		return Err(ExitException::InvalidCode.into());
	}
	Ok(())
}

/// Store the code returned by init code at `address`, charging the deposit.
pub fn deploy_create_code<'config, S, H>(
	config: &Config,
	address: H160,
	retbuf: Vec<u8>,
	state: &mut S,
	handler: &mut H,
) -> Result<(), ExitError>
where
	S: InvokerState<'config>,
	H: RuntimeBackend,
{
	check_first_byte(config, &retbuf[..])?;

	if let Some(limit) = config.create_contract_limit() {
		if retbuf.len() > limit {
			return Err(ExitException::CreateContractLimit.into());
		}
	}

	match state.record_codedeposit(retbuf.len()) {
		Ok(()) => (),
		Err(_) if !config.eip2_no_empty_contract => {
			log::debug!(target: "evm", "code deposit of {:?} skipped, out of gas", address);
			return Ok(());
		}
		Err(err) => return Err(err),
	}

	handler.set_code(address, retbuf)
}
