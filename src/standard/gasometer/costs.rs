use arena_evm_interpreter::{ExitError, ExitException};
use primitive_types::{H256, U256};

use super::{consts::*, utils::log2floor};
use crate::standard::Config;

pub fn call_extra_check(gas: U256, after_gas: u64, config: &Config) -> Result<(), ExitError> {
	if !config.eip150_no_err_on_call_with_more_gas && U256::from(after_gas) < gas {
		Err(ExitException::OutOfGas.into())
	} else {
		Ok(())
	}
}

pub fn suicide_refund(already_removed: bool) -> i64 {
	if already_removed {
		0
	} else {
		R_SUICIDE
	}
}

#[allow(clippy::collapsible_else_if)]
pub fn sstore_refund(original: H256, current: H256, new: H256, config: &Config) -> i64 {
	if config.eip2200_sstore_gas_metering {
		if current == new {
			0
		} else {
			if original == current && new == H256::default() {
				config.refund_sstore_clears()
			} else {
				let mut refund = 0;

				if original != H256::default() {
					if current == H256::default() {
						refund -= config.refund_sstore_clears();
					} else if new == H256::default() {
						refund += config.refund_sstore_clears();
					}
				}

				if original == new {
					if original == H256::default() {
						refund += (config.gas_sstore_set() - config.gas_sload()) as i64;
					} else {
						refund += (config.gas_sstore_reset() - config.gas_sload()) as i64;
					}
				}

				refund
			}
		}
	} else {
		if current != H256::default() && new == H256::default() {
			config.refund_sstore_clears()
		} else {
			0
		}
	}
}

pub fn create_cost(len: U256, config: &Config) -> Result<u64, ExitError> {
	G_CREATE
		.checked_add(init_code_word_cost(len, config)?)
		.ok_or(ExitException::OutOfGas.into())
}

pub fn create2_cost(len: U256, config: &Config) -> Result<u64, ExitError> {
	let wordd = words(len)?;
	let cost = G_SHA3WORD
		.checked_mul(wordd)
		.and_then(|hash| G_CREATE.checked_add(hash))
		.and_then(|cost| cost.checked_add(init_code_word_cost(len, config).ok()?))
		.ok_or(ExitException::OutOfGas)?;

	Ok(cost)
}

fn init_code_word_cost(len: U256, config: &Config) -> Result<u64, ExitError> {
	if config.max_initcode_size().is_none() {
		return Ok(0);
	}

	G_INITCODE_WORD
		.checked_mul(words(len)?)
		.ok_or(ExitException::OutOfGas.into())
}

pub fn exp_cost(power: U256, config: &Config) -> Result<u64, ExitError> {
	if power == U256::zero() {
		Ok(G_EXP)
	} else {
		let gas = U256::from(G_EXP)
			.checked_add(
				U256::from(config.gas_expbyte())
					.checked_mul(U256::from(log2floor(power) / 8 + 1))
					.ok_or(ExitException::OutOfGas)?,
			)
			.ok_or(ExitException::OutOfGas)?;

		if gas > U256::from(u64::MAX) {
			return Err(ExitException::OutOfGas.into());
		}

		Ok(gas.as_u64())
	}
}

pub fn verylowcopy_cost(len: U256) -> Result<u64, ExitError> {
	G_COPY
		.checked_mul(words(len)?)
		.and_then(|copy| copy.checked_add(G_VERYLOW))
		.ok_or(ExitException::OutOfGas.into())
}

pub fn extcodecopy_cost(len: U256, is_cold: bool, config: &Config) -> Result<u64, ExitError> {
	G_COPY
		.checked_mul(words(len)?)
		.and_then(|copy| {
			copy.checked_add(address_access_cost(is_cold, config.gas_ext_code(), config))
		})
		.ok_or(ExitException::OutOfGas.into())
}

pub fn log_cost(n: u8, len: U256) -> Result<u64, ExitError> {
	if len > U256::from(u64::MAX) {
		return Err(ExitException::OutOfGas.into());
	}

	G_LOGDATA
		.checked_mul(len.as_u64())
		.and_then(|data| data.checked_add(G_LOG))
		.and_then(|cost| cost.checked_add(G_LOGTOPIC * u64::from(n)))
		.ok_or(ExitException::OutOfGas.into())
}

pub fn sha3_cost(len: U256) -> Result<u64, ExitError> {
	G_SHA3WORD
		.checked_mul(words(len)?)
		.and_then(|hash| hash.checked_add(G_SHA3))
		.ok_or(ExitException::OutOfGas.into())
}

pub fn sload_cost(is_cold: bool, config: &Config) -> u64 {
	if config.eip2929_increase_state_access_gas {
		if is_cold {
			config.gas_sload_cold()
		} else {
			config.gas_storage_read_warm()
		}
	} else {
		config.gas_sload()
	}
}

#[allow(clippy::collapsible_else_if)]
pub fn sstore_cost(
	original: H256,
	current: H256,
	new: H256,
	gas: u64,
	is_cold: bool,
	config: &Config,
) -> Result<u64, ExitError> {
	let gas_cost = if config.eip2200_sstore_gas_metering {
		if config.eip2200_sstore_revert_under_stipend && gas <= config.call_stipend() {
			return Err(ExitException::OutOfGas.into());
		}

		if new == current {
			config.gas_sload()
		} else {
			if original == current {
				if original == H256::zero() {
					config.gas_sstore_set()
				} else {
					config.gas_sstore_reset()
				}
			} else {
				config.gas_sload()
			}
		}
	} else {
		if current == H256::zero() && new != H256::zero() {
			config.gas_sstore_set()
		} else {
			config.gas_sstore_reset()
		}
	};

	Ok(gas_cost
		+ if is_cold {
			config.gas_sload_cold()
		} else {
			0
		})
}

pub fn suicide_cost(value: U256, is_cold: bool, target_exists: bool, config: &Config) -> u64 {
	let should_charge_topup = if config.eip161_empty_check {
		value != U256::zero() && !target_exists
	} else {
		!target_exists
	};

	let suicide_gas_topup = if should_charge_topup {
		config.gas_suicide_new_account()
	} else {
		0
	};

	let mut gas = config.gas_suicide() + suicide_gas_topup;
	if config.eip2929_increase_state_access_gas && is_cold {
		gas += config.gas_account_access_cold();
	}

	gas
}

pub fn call_cost(
	value: U256,
	is_cold: bool,
	is_call_or_callcode: bool,
	is_call_or_staticcall: bool,
	new_account: bool,
	config: &Config,
) -> u64 {
	let transfers_value = value != U256::default();
	address_access_cost(is_cold, config.gas_call(), config)
		+ xfer_cost(is_call_or_callcode, transfers_value)
		+ new_cost(is_call_or_staticcall, new_account, transfers_value, config)
}

pub fn address_access_cost(is_cold: bool, regular_value: u64, config: &Config) -> u64 {
	if config.eip2929_increase_state_access_gas {
		if is_cold {
			config.gas_account_access_cold()
		} else {
			config.gas_storage_read_warm()
		}
	} else {
		regular_value
	}
}

fn xfer_cost(is_call_or_callcode: bool, transfers_value: bool) -> u64 {
	if is_call_or_callcode && transfers_value {
		G_CALLVALUE
	} else {
		0
	}
}

fn new_cost(
	is_call_or_staticcall: bool,
	new_account: bool,
	transfers_value: bool,
	config: &Config,
) -> u64 {
	if is_call_or_staticcall {
		if config.eip161_empty_check {
			if transfers_value && new_account {
				G_NEWACCOUNT
			} else {
				0
			}
		} else if new_account {
			G_NEWACCOUNT
		} else {
			0
		}
	} else {
		0
	}
}

pub fn memory_gas(a: usize) -> Result<u64, ExitError> {
	let a = a as u64;
	G_MEMORY
		.checked_mul(a)
		.ok_or(ExitException::OutOfGas)?
		.checked_add(a.checked_mul(a).ok_or(ExitException::OutOfGas)? / 512)
		.ok_or(ExitException::OutOfGas.into())
}

/// Number of 32-byte words covering `len` bytes.
fn words(len: U256) -> Result<u64, ExitError> {
	if len > U256::from(u64::MAX - 31) {
		return Err(ExitException::OutOfGas.into());
	}

	Ok((len.as_u64() + 31) / 32)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn h(v: u64) -> H256 {
		H256::from_low_u64_be(v)
	}

	#[test]
	fn sstore_net_metering() {
		let config = Config::istanbul();
		let gas = 10_000;

		// Fresh slot.
		assert_eq!(
			sstore_cost(h(0), h(0), h(1), gas, false, &config).unwrap(),
			20000
		);
		// Dirty slot.
		assert_eq!(
			sstore_cost(h(0), h(1), h(2), gas, false, &config).unwrap(),
			800
		);
		// Below the stipend.
		assert!(sstore_cost(h(0), h(0), h(1), 2300, false, &config).is_err());

		// Clearing refunds.
		assert_eq!(sstore_refund(h(1), h(1), h(0), &config), 15000);
		// Resetting to the original value.
		assert_eq!(sstore_refund(h(0), h(1), h(0), &config), 19200);
	}

	#[test]
	fn sstore_cold_access() {
		let config = Config::berlin();
		assert_eq!(
			sstore_cost(h(0), h(0), h(1), 10_000, true, &config).unwrap(),
			22100
		);
		assert_eq!(
			sstore_cost(h(1), h(1), h(2), 10_000, false, &config).unwrap(),
			2900
		);
		assert_eq!(sstore_refund(h(1), h(1), h(0), &Config::london()), 4800);
	}

	#[test]
	fn frontier_sstore() {
		let config = Config::frontier();
		assert_eq!(
			sstore_cost(h(0), h(0), h(1), 0, false, &config).unwrap(),
			20000
		);
		assert_eq!(sstore_cost(h(1), h(1), h(0), 0, false, &config).unwrap(), 5000);
		assert_eq!(sstore_refund(h(1), h(1), h(0), &config), 15000);
	}

	#[test]
	fn call_costs() {
		let config = Config::cancun();
		assert_eq!(call_cost(U256::zero(), true, true, true, false, &config), 2600);
		assert_eq!(call_cost(U256::one(), false, true, true, true, &config), 34100);
		assert_eq!(call_cost(U256::one(), false, false, false, true, &config), 100);

		let frontier = Config::frontier();
		assert_eq!(
			call_cost(U256::zero(), false, true, true, true, &frontier),
			25040
		);
	}

	#[test]
	fn word_based_costs() {
		assert_eq!(sha3_cost(U256::from(33)).unwrap(), 42);
		assert_eq!(verylowcopy_cost(U256::from(64)).unwrap(), 9);
		assert_eq!(log_cost(2, U256::from(10)).unwrap(), 375 + 80 + 750);
		assert_eq!(exp_cost(U256::from(256), &Config::cancun()).unwrap(), 110);
		assert_eq!(exp_cost(U256::zero(), &Config::cancun()).unwrap(), 10);
		assert_eq!(create_cost(U256::from(64), &Config::cancun()).unwrap(), 32004);
		assert_eq!(create_cost(U256::from(64), &Config::london()).unwrap(), 32000);
		assert_eq!(create2_cost(U256::from(64), &Config::cancun()).unwrap(), 32016);
		assert!(sha3_cost(U256::MAX).is_err());
		assert_eq!(memory_gas(1).unwrap(), 3);
		assert_eq!(memory_gas(1024).unwrap(), 3 * 1024 + 2048);
	}
}
