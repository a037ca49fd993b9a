use alloc::vec::Vec;

use primitive_types::{H256, U256};
use sha3::{Digest, Keccak256};

use crate::{
	error::{ExitException, ExitSucceed},
	etable::Control,
	machine::Machine,
	runtime::{GasState, Log, RuntimeBackend, RuntimeEnvironment, RuntimeState, Transfer},
	utils::{h160_to_u256, u256_to_h160},
};

macro_rules! fail_if_static {
	($machine:expr) => {
		if $machine.state.as_ref().is_static {
			return Control::Exit(ExitException::StaticModeViolation.into());
		}
	};
}

pub fn sha3<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(machine, from, len);

	try_or_fail!(machine.memory.resize_offset(from, len));
	let data = if len.is_zero() {
		Vec::new()
	} else {
		let from = as_usize_or_fail!(from);
		let len = as_usize_or_fail!(len);

		machine.memory.get(from, len)
	};

	let ret = Keccak256::digest(data.as_slice());
	push_h256!(machine, H256::from_slice(ret.as_slice()));

	Control::Continue
}

pub fn chainid<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	push_u256!(machine, handler.chain_id());

	Control::Continue
}

pub fn address<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let ret = h160_to_u256(machine.state.as_ref().context.address);
	push_u256!(machine, ret);

	Control::Continue
}

pub fn balance<S, H: RuntimeBackend, Tr>(machine: &mut Machine<S>, handler: &mut H) -> Control<Tr> {
	pop_u256!(machine, address);
	let address = u256_to_h160(address);
	handler.mark_hot(address, None);
	push_u256!(machine, handler.balance(address));

	Control::Continue
}

pub fn selfbalance<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &H,
) -> Control<Tr> {
	let balance = handler.balance(machine.state.as_ref().context.address);
	push_u256!(machine, balance);

	Control::Continue
}

pub fn origin<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let ret = h160_to_u256(machine.state.as_ref().transaction_context.origin);
	push_u256!(machine, ret);

	Control::Continue
}

pub fn caller<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let ret = h160_to_u256(machine.state.as_ref().context.caller);
	push_u256!(machine, ret);

	Control::Continue
}

pub fn callvalue<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let ret = machine.state.as_ref().context.apparent_value;
	push_u256!(machine, ret);

	Control::Continue
}

pub fn gasprice<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let ret = machine.state.as_ref().transaction_context.gas_price;
	push_u256!(machine, ret);

	Control::Continue
}

pub fn basefee<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	push_u256!(machine, handler.block_base_fee_per_gas());

	Control::Continue
}

pub fn blobhash<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	pop_u256!(machine, index);
	let hash = handler.blob_hash(index).unwrap_or_default();
	push_h256!(machine, hash);

	Control::Continue
}

pub fn blobbasefee<S, H: RuntimeEnvironment, Tr>(
	machine: &mut Machine<S>,
	handler: &H,
) -> Control<Tr> {
	push_u256!(machine, handler.blob_base_fee_per_gas());

	Control::Continue
}

pub fn extcodesize<S, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	pop_u256!(machine, address);
	let address = u256_to_h160(address);
	handler.mark_hot(address, None);
	let code_size = handler.code_size(address);
	push_u256!(machine, code_size);

	Control::Continue
}

pub fn extcodehash<S, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	pop_u256!(machine, address);
	let address = u256_to_h160(address);
	handler.mark_hot(address, None);
	let code_hash = if handler.exists(address) {
		handler.code_hash(address)
	} else {
		H256::zero()
	};
	push_h256!(machine, code_hash);

	Control::Continue
}

pub fn extcodecopy<S, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	pop_u256!(machine, address, memory_offset, code_offset, len);
	let address = u256_to_h160(address);

	handler.mark_hot(address, None);
	try_or_fail!(machine.memory.resize_offset(memory_offset, len));

	let code = handler.code(address);
	try_or_fail!(machine
		.memory
		.copy_large(memory_offset, code_offset, len, &code));

	Control::Continue
}

pub fn returndatasize<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let size = U256::from(machine.state.as_ref().retbuf.len());
	push_u256!(machine, size);

	Control::Continue
}

pub fn returndatacopy<S: AsRef<RuntimeState>, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	pop_u256!(machine, memory_offset, data_offset, len);

	try_or_fail!(machine.memory.resize_offset(memory_offset, len));
	if data_offset
		.checked_add(len)
		.map_or(true, |l| l > U256::from(machine.state.as_ref().retbuf.len()))
	{
		return Control::Exit(ExitException::OutOfOffset.into());
	}

	try_or_fail!(machine.memory.copy_large(
		memory_offset,
		data_offset,
		len,
		&machine.state.as_ref().retbuf,
	));
	Control::Continue
}

pub fn blockhash<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	pop_u256!(machine, number);
	push_h256!(machine, handler.block_hash(number));

	Control::Continue
}

pub fn coinbase<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	push_u256!(machine, h160_to_u256(handler.block_coinbase()));
	Control::Continue
}

pub fn timestamp<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	push_u256!(machine, handler.block_timestamp());
	Control::Continue
}

pub fn number<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	push_u256!(machine, handler.block_number());
	Control::Continue
}

pub fn difficulty<S, H: RuntimeEnvironment, Tr>(
	machine: &mut Machine<S>,
	handler: &H,
) -> Control<Tr> {
	push_u256!(machine, handler.block_difficulty());
	Control::Continue
}

pub fn prevrandao<S, H: RuntimeEnvironment, Tr>(
	machine: &mut Machine<S>,
	handler: &H,
) -> Control<Tr> {
	if let Some(rand) = handler.block_randomness() {
		push_h256!(machine, rand);
		Control::Continue
	} else {
		difficulty(machine, handler)
	}
}

pub fn gaslimit<S, H: RuntimeEnvironment, Tr>(machine: &mut Machine<S>, handler: &H) -> Control<Tr> {
	push_u256!(machine, handler.block_gas_limit());
	Control::Continue
}

pub fn sload<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	pop_h256!(machine, index);
	let address = machine.state.as_ref().context.address;
	handler.mark_hot(address, Some(index));
	let value = handler.storage(address, index);
	push_h256!(machine, value);

	Control::Continue
}

pub fn sstore<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	fail_if_static!(machine);
	pop_h256!(machine, index, value);
	let address = machine.state.as_ref().context.address;
	handler.mark_hot(address, Some(index));

	try_or_fail!(handler.set_storage(address, index, value));
	Control::Continue
}

pub fn tload<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	pop_h256!(machine, index);
	let value = handler.transient_storage(machine.state.as_ref().context.address, index);
	push_h256!(machine, value);

	Control::Continue
}

pub fn tstore<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	fail_if_static!(machine);
	pop_h256!(machine, index, value);

	try_or_fail!(handler.set_transient_storage(
		machine.state.as_ref().context.address,
		index,
		value
	));
	Control::Continue
}

pub fn gas<S: GasState, Tr>(machine: &mut Machine<S>) -> Control<Tr> {
	let gas = machine.state.gas();
	push_u256!(machine, gas);

	Control::Continue
}

pub fn log<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	n: u8,
	handler: &mut H,
) -> Control<Tr> {
	fail_if_static!(machine);
	pop_u256!(machine, offset, len);

	try_or_fail!(machine.memory.resize_offset(offset, len));
	let data = if len.is_zero() {
		Vec::new()
	} else {
		let offset = as_usize_or_fail!(offset);
		let len = as_usize_or_fail!(len);

		machine.memory.get(offset, len)
	};

	let mut topics = Vec::with_capacity(n as usize);
	for _ in 0..(n as usize) {
		pop_h256!(machine, topic);
		topics.push(topic);
	}

	try_or_fail!(handler.log(Log {
		address: machine.state.as_ref().context.address,
		topics,
		data,
	}));
	Control::Continue
}

pub fn selfdestruct<S: AsRef<RuntimeState>, H: RuntimeBackend, Tr>(
	machine: &mut Machine<S>,
	handler: &mut H,
) -> Control<Tr> {
	fail_if_static!(machine);
	let address = machine.state.as_ref().context.address;

	match machine.stack.perform_pop1_push0(|target| {
		let target = u256_to_h160(*target);
		let balance = handler.balance(address);
		handler.mark_hot(target, None);

		handler.transfer(Transfer {
			source: address,
			target,
			value: balance,
		})?;

		handler.mark_delete(address);
		handler.reset_balance(address);

		Ok(((), ()))
	}) {
		Ok(()) => Control::Exit(ExitSucceed::Suicided.into()),
		Err(e) => Control::Exit(Err(e)),
	}
}
