
use arena_evm::{
	backend::Database, standard::Config, CallParams, ExitError, ExitException, ExitSucceed, Log,
};
use mock::{call, contract, run_code, sender, vm};
use primitive_types::{H160, H256, U256};

#[test]
fn simple_transfer() {
	let config = Config::cancun();
	let target = H160::from_low_u64_be(0x3000);
	let mut vm = vm(&config, &[]);

	let result = vm
		.execute(CallParams::Call {
			caller: sender(),
			to: target,
			value: U256::from(1),
			input: Vec::new(),
			gas: 21_000,
		})
		.unwrap();

	assert!(result.success);
	assert_eq!(result.gas_used, 21_000);
	assert_eq!(result.gas_left, 0);
	assert!(result.output.is_empty());
	assert_eq!(result.exit, Ok(ExitSucceed::Stopped));

	let db = vm.database().unwrap();
	assert_eq!(db.balance(target), U256::one());
	assert_eq!(db.balance(sender()), U256::exp10(18) - U256::one());
	assert_eq!(db.nonce(sender()), U256::one());
}

#[test]
fn storage_write() {
	// PUSH1 42 PUSH1 0 SSTORE STOP
	let (result, db) = run_code(&Config::cancun(), "602a60005500", 100_000);

	assert!(result.success);
	assert_eq!(result.gas_used, 43_106);
	assert_eq!(db.get_storage(contract(), U256::zero()), U256::from(42));
}

#[test]
fn revert_charges_used_gas_and_undoes_writes() {
	// PUSH1 42 PUSH1 0 SSTORE PUSH1 0 PUSH1 0 REVERT
	let (result, db) = run_code(&Config::cancun(), "602a60005560006000fd", 100_000);

	assert!(!result.success);
	assert_eq!(result.exit, Err(ExitError::Reverted));
	assert_eq!(result.gas_used, 43_112);
	assert_eq!(result.gas_left, 100_000 - 43_112);
	assert_eq!(db.get_storage(contract(), U256::zero()), U256::zero());
	assert_eq!(db.nonce(sender()), U256::one());
}

#[test]
fn exception_consumes_all_gas() {
	// PUSH1 1 ADD
	let (result, _) = run_code(&Config::cancun(), "600101", 50_000);

	assert_eq!(
		result.exit,
		Err(ExitError::Exception(ExitException::StackUnderflow))
	);
	assert_eq!(result.gas_used, 50_000);
	assert_eq!(result.gas_left, 0);
}

#[test]
fn designated_invalid_is_not_an_unknown_opcode() {
	// PUSH1 1 INVALID
	let (result, _) = run_code(&Config::cancun(), "6001fe", 50_000);
	assert_eq!(
		result.exit,
		Err(ExitError::Exception(ExitException::DesignatedInvalid))
	);
	assert_eq!(result.gas_used, 50_000);

	let (frontier, _) = run_code(&Config::frontier(), "6001fe", 50_000);
	assert_eq!(frontier.exit, result.exit);
}

#[test]
fn returned_data_is_copied_out() {
	// PUSH1 0x2a PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
	let (result, _) = run_code(&Config::cancun(), "602a60005260206000f3", 100_000);

	assert_eq!(result.exit, Ok(ExitSucceed::Returned));
	assert_eq!(result.output, H256::from_low_u64_be(42).as_bytes().to_vec());
}

#[test]
fn logs_are_reported() {
	// PUSH1 0xaa PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 LOG0 STOP
	let (result, _) = run_code(&Config::cancun(), "60aa60005360016000a000", 100_000);

	assert!(result.success);
	assert_eq!(
		result.logs,
		vec![Log {
			address: contract(),
			topics: Vec::new(),
			data: vec![0xaa],
		}]
	);

	// Same, then REVERT.
	let (result, _) = run_code(
		&Config::cancun(),
		"60aa60005360016000a060006000fd",
		100_000,
	);
	assert!(!result.success);
	assert!(result.logs.is_empty());
}

#[test]
fn identical_inputs_give_identical_results() {
	let config = Config::cancun();
	// PUSH1 42 PUSH1 0 SSTORE PUSH1 32 PUSH1 0 RETURN
	let hex = "602a60005560206000f3";

	let run = || {
		let mut vm = vm(&config, &[(contract(), hex)]);
		vm.execute(call(contract(), vec![1, 2, 3], 200_000)).unwrap()
	};
	assert_eq!(run(), run());
}

#[test]
fn later_messages_see_earlier_changes() {
	let config = Config::cancun();
	// Increment slot 0: PUSH1 0 SLOAD PUSH1 1 ADD PUSH1 0 SSTORE STOP
	let mut vm = vm(&config, &[(contract(), "60005460010160005500")]);

	for _ in 0..3 {
		let result = vm.execute(call(contract(), Vec::new(), 100_000)).unwrap();
		assert!(result.success);
	}

	let db = vm.database().unwrap();
	assert_eq!(db.get_storage(contract(), U256::zero()), U256::from(3));
	assert_eq!(db.nonce(sender()), U256::from(3));
}

#[test]
fn oversized_input_is_rejected() {
	let mut config = Config::cancun();
	config.max_input_size = 4;
	let mut vm = vm(&config, &[]);

	let result = vm.execute(call(contract(), vec![1; 5], 100_000));
	assert_eq!(
		result,
		Err(arena_evm::VmError::Rejected(
			ExitException::InputTooLarge.into()
		))
	);
}
