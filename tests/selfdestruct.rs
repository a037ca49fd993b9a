
use arena_evm::{backend::Database, standard::Config, CallParams};
use mock::{call, sender, vm};
use primitive_types::{H160, U256};

// Deploys CALLER SELFDESTRUCT:
// PUSH2 0x33ff PUSH1 0 MSTORE PUSH1 2 PUSH1 30 RETURN
const DEPLOY_DESTRUCTIBLE: &str = "6133ff6000526002601ef3";

fn create(vm: &mut mock::TestVm<'_>, init_code: &str) -> H160 {
	let result = vm
		.execute(CallParams::Create {
			caller: sender(),
			value: U256::zero(),
			init_code: hex::decode(init_code).unwrap(),
			gas: 400_000,
		})
		.unwrap();
	assert!(result.success, "{:?}", result.exit);
	result.created_address.unwrap()
}

#[test]
fn selfdestruct_deletes_before_cancun() {
	let config = Config::shanghai();
	let mut vm = vm(&config, &[]);
	let address = create(&mut vm, DEPLOY_DESTRUCTIBLE);
	assert_eq!(vm.database().unwrap().code(address), vec![0x33, 0xff]);

	let result = vm.execute(call(address, Vec::new(), 100_000)).unwrap();
	assert!(result.success);
	assert!(vm.database().unwrap().get_account(address).is_none());
}

#[test]
fn selfdestruct_keeps_account_from_cancun() {
	let config = Config::cancun();
	let mut vm = vm(&config, &[]);
	let address = create(&mut vm, DEPLOY_DESTRUCTIBLE);

	let result = vm.execute(call(address, Vec::new(), 100_000)).unwrap();
	assert!(result.success);

	let db = vm.database().unwrap();
	assert!(db.get_account(address).is_some());
	assert_eq!(db.code(address), vec![0x33, 0xff]);
}

#[test]
fn selfdestruct_during_creation_deletes_from_cancun() {
	let config = Config::cancun();
	let mut vm = vm(&config, &[]);

	// CALLER SELFDESTRUCT as init code.
	let address = create(&mut vm, "33ff");
	assert!(vm.database().unwrap().get_account(address).is_none());
}
