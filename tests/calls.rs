
use arena_evm::{
	backend::Database, standard::Config, CallParams, ExitError, ExitException, ExitSucceed,
};
use mock::{call, contract, sender, vm};
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

// PUSH1 0 (x5) PUSH20 <callee> GAS CALL STOP
fn call_with_all_gas(callee: H160) -> String {
	format!("6000600060006000600073{}5af100", hex::encode(callee.as_bytes()))
}

#[test]
fn child_receives_all_but_one_64th() {
	let callee = H160::from_low_u64_be(0x3000);
	let caller_code = call_with_all_gas(callee);
	// GAS PUSH1 0 SSTORE STOP
	let callee_code = "5a60005500";

	let config = Config::cancun();
	let mut vm = vm(&config, &[(contract(), &caller_code), (callee, callee_code)]);
	let result = vm.execute(call(contract(), Vec::new(), 1_000_000)).unwrap();
	assert!(result.success);

	// 1_000_000 - 21_000 intrinsic - 20 for the pushes and GAS, minus 2_600
	// for the cold CALL leaves 976_380, of which 961_125 is forwarded. The
	// callee's GAS costs 2.
	let db = vm.database().unwrap();
	assert_eq!(db.get_storage(callee, U256::zero()), U256::from(961_123));
}

#[test]
fn frontier_forwards_the_requested_gas() {
	let callee = H160::from_low_u64_be(0x3000);
	// PUSH1 0 (x5) PUSH20 <callee> PUSH3 0x010000 CALL STOP
	let caller_code = format!(
		"6000600060006000600073{}62010000f100",
		hex::encode(callee.as_bytes())
	);

	let config = Config::frontier();
	let mut vm = vm(
		&config,
		&[(contract(), &caller_code), (callee, "5a60005500")],
	);
	let result = vm.execute(call(contract(), Vec::new(), 1_000_000)).unwrap();
	assert!(result.success);

	let db = vm.database().unwrap();
	assert_eq!(
		db.get_storage(callee, U256::zero()),
		U256::from(0x10000 - 2)
	);
}

// Stores 1 at slot n, calls itself with n + 1, then stores the call's
// success flag at slot 100 + n. n is the first word of the call data.
const RECURSIVE: &str = concat!(
	"600035",                 // PUSH1 0 CALLDATALOAD
	"60018155",               // PUSH1 1 DUP2 SSTORE
	"80600101600052",         // DUP1 PUSH1 1 ADD PUSH1 0 MSTORE
	"6000600060206000600030", // PUSH1 0 PUSH1 0 PUSH1 32 PUSH1 0 PUSH1 0 ADDRESS
	"5af1",                   // GAS CALL
	"9060640155",             // SWAP1 PUSH1 100 ADD SSTORE
	"00",                     // STOP
);

#[test]
fn call_depth_is_bounded() {
	let mut config = Config::cancun();
	config.max_call_depth = 4;
	let mut vm = vm(&config, &[(contract(), RECURSIVE)]);

	let result = vm
		.execute(call(contract(), vec![0; 32], 5_000_000))
		.unwrap();
	assert!(result.success);

	let db = vm.database().unwrap();
	let slot = |n: u64| db.get_storage(contract(), U256::from(n));

	// Frames at levels 0 to 3 completed.
	for n in 0..4 {
		assert_eq!(slot(n), U256::one(), "frame {n}");
	}
	for n in 100..103 {
		assert_eq!(slot(n), U256::one(), "call from frame {}", n - 100);
	}

	// The frame at level 4 failed when it tried to go deeper, taking its own
	// write with it, and its caller saw the failure.
	assert_eq!(slot(4), U256::zero());
	assert_eq!(slot(103), U256::zero());
	assert_eq!(slot(104), U256::zero());
}

#[test]
fn deep_recursion_runs_off_the_native_stack() {
	let mut config = Config::cancun();
	config.max_call_depth = 64;
	let mut vm = vm(&config, &[(contract(), RECURSIVE)]);

	let result = vm
		.execute(call(contract(), vec![0; 32], 29_000_000))
		.unwrap();
	assert!(result.success);
	assert_eq!(
		vm.database()
			.unwrap()
			.get_storage(contract(), U256::from(10)),
		U256::one()
	);
}

#[test]
fn value_beyond_balance_fails_the_call_only() {
	let callee = H160::from_low_u64_be(0x3000);
	// PUSH1 0 PUSH1 0 PUSH1 0 PUSH1 0 PUSH1 1 PUSH20 <callee> GAS CALL
	// PUSH1 0 SSTORE STOP
	let caller_code = format!(
		"6000600060006000600173{}5af160005500",
		hex::encode(callee.as_bytes())
	);

	let config = Config::cancun();
	let mut vm = vm(&config, &[(contract(), &caller_code)]);
	// Slot 0 starts non-zero so that the failed call's 0 is observable.
	vm.database_mut()
		.unwrap()
		.set_storage(contract(), U256::zero(), U256::from(7))
		.unwrap();

	let result = vm.execute(call(contract(), Vec::new(), 200_000)).unwrap();
	assert!(result.success);

	let db = vm.database().unwrap();
	assert_eq!(db.get_storage(contract(), U256::zero()), U256::zero());
	assert_eq!(db.balance(callee), U256::zero());
}

#[test]
fn identity_precompile() {
	let config = Config::cancun();
	let identity = H160::from_low_u64_be(4);
	let mut vm = vm(&config, &[]);

	let result = vm
		.execute(call(identity, b"hello".to_vec(), 100_000))
		.unwrap();
	assert_eq!(result.exit, Ok(ExitSucceed::Returned));
	assert_eq!(result.output, b"hello".to_vec());
	// Intrinsic 21_000, 5 non-zero bytes at 16, and 15 + 3 for one word.
	assert_eq!(result.gas_used, 21_000 + 80 + 18);
}

#[test]
fn precompile_out_of_gas_consumes_everything() {
	let config = Config::cancun();
	let sha256 = H160::from_low_u64_be(2);
	let mut vm = vm(&config, &[]);

	let result = vm.execute(call(sha256, vec![0; 64], 21_300)).unwrap();
	assert_eq!(
		result.exit,
		Err(ExitError::Exception(ExitException::OutOfGas))
	);
	assert_eq!(result.gas_used, 21_300);
}

#[test]
fn disabled_precompiles_are_plain_accounts() {
	let mut config = Config::cancun();
	config.enable_precompiles = false;
	let mut vm = vm(&config, &[]);

	let result = vm
		.execute(call(H160::from_low_u64_be(4), b"hello".to_vec(), 100_000))
		.unwrap();
	assert!(result.success);
	assert!(result.output.is_empty());
}

fn legacy_create_address(caller: H160, nonce: U256) -> H160 {
	let mut stream = rlp::RlpStream::new_list(2);
	stream.append(&caller);
	stream.append(&nonce);
	H160::from_slice(&Keccak256::digest(stream.out())[12..])
}

#[test]
fn create_deploys_returned_code() {
	let config = Config::cancun();
	let mut vm = vm(&config, &[]);

	// PUSH1 0xfe PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 RETURN
	let result = vm
		.execute(CallParams::Create {
			caller: sender(),
			value: U256::zero(),
			init_code: hex::decode("60fe60005360016000f3").unwrap(),
			gas: 200_000,
		})
		.unwrap();

	let expected = legacy_create_address(sender(), U256::zero());
	assert!(result.success);
	assert_eq!(result.created_address, Some(expected));

	let db = vm.database().unwrap();
	assert_eq!(db.code(expected), vec![0xfe]);
	assert_eq!(db.nonce(expected), U256::one());
	assert_eq!(db.nonce(sender()), U256::one());
}

#[test]
fn create2_address_follows_the_salt() {
	let config = Config::cancun();
	let mut vm = vm(&config, &[]);
	let init_code = hex::decode("60fe60005360016000f3").unwrap();
	let salt = H256::from_low_u64_be(4);

	let result = vm
		.execute(CallParams::Create2 {
			caller: sender(),
			value: U256::zero(),
			init_code: init_code.clone(),
			salt,
			gas: 200_000,
		})
		.unwrap();

	let mut preimage = vec![0xff];
	preimage.extend_from_slice(sender().as_bytes());
	preimage.extend_from_slice(salt.as_bytes());
	preimage.extend_from_slice(&Keccak256::digest(&init_code));
	let expected = H160::from_slice(&Keccak256::digest(&preimage)[12..]);

	assert_eq!(result.created_address, Some(expected));
}

#[test]
fn code_starting_with_ef_is_refused() {
	let config = Config::cancun();
	let mut vm = vm(&config, &[]);

	// PUSH1 0xef PUSH1 0 MSTORE8 PUSH1 1 PUSH1 0 RETURN
	let result = vm
		.execute(CallParams::Create {
			caller: sender(),
			value: U256::zero(),
			init_code: hex::decode("60ef60005360016000f3").unwrap(),
			gas: 200_000,
		})
		.unwrap();

	assert_eq!(
		result.exit,
		Err(ExitError::Exception(ExitException::InvalidCode))
	);
	assert_eq!(result.created_address, None);
	assert_eq!(result.gas_used, 200_000);

	let address = legacy_create_address(sender(), U256::zero());
	assert!(vm.database().unwrap().get_account(address).is_none());
}

#[test]
fn reverted_callee_keeps_no_state_and_returns_its_gas() {
	let callee = H160::from_low_u64_be(0x3000);
	// GAS, PUSH1 0 (x5) PUSH20 <callee> PUSH3 0x010000 CALL, GAS, then
	// store the later GAS at slot 2, the flag at slot 1 and the earlier GAS
	// at slot 0.
	let caller_code = format!(
		"5a6000600060006000600073{}62010000f15a600255600155600055",
		hex::encode(callee.as_bytes())
	);
	// PUSH1 0x2a PUSH1 0 SSTORE PUSH1 0 PUSH1 0 REVERT
	let callee_code = "602a60005560006000fd";

	let config = Config::cancun();
	let mut vm = vm(&config, &[(contract(), &caller_code), (callee, callee_code)]);
	vm.database_mut()
		.unwrap()
		.set_storage(contract(), U256::one(), U256::from(7))
		.unwrap();

	let result = vm.execute(call(contract(), Vec::new(), 1_000_000)).unwrap();
	assert!(result.success);

	let db = vm.database().unwrap();
	assert_eq!(db.get_storage(callee, U256::zero()), U256::zero());
	assert_eq!(db.get_storage(contract(), U256::one()), U256::zero());

	// The callee spent 3 + 3 + 22_100 for a fresh cold SSTORE + 3 + 3 before
	// reverting. The rest of its 0x10000 came back. Between the two GAS
	// reads the caller paid 7 pushes, 2_600 for the cold CALL and the second
	// GAS.
	let callee_used = 22_112;
	let call_cost = 5 * 3 + 3 + 3 + 2_600;
	let before = db.get_storage(contract(), U256::zero());
	let after = db.get_storage(contract(), U256::from(2));
	assert_eq!(before - after, U256::from(callee_used + call_cost + 2));
}

#[test]
fn oversized_deployed_code_is_refused() {
	let mut config = Config::cancun();
	config.max_bytecode_size = 4;
	let mut vm = vm(&config, &[]);

	// PUSH1 5 PUSH1 0 RETURN
	let result = vm
		.execute(CallParams::Create {
			caller: sender(),
			value: U256::zero(),
			init_code: hex::decode("60056000f3").unwrap(),
			gas: 200_000,
		})
		.unwrap();

	assert_eq!(
		result.exit,
		Err(ExitError::Exception(ExitException::CreateContractLimit))
	);
	assert_eq!(result.created_address, None);
}
