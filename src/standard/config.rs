use alloc::vec::Vec;
use core::fmt;

use crate::{DepthType, FrameConfig, LoopSafetyCounter, Opcode};

/// Ethereum hard forks with a built-in configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hardfork {
	Frontier,
	Homestead,
	TangerineWhistle,
	SpuriousDragon,
	Byzantium,
	Petersburg,
	Istanbul,
	Berlin,
	London,
	Shanghai,
	Cancun,
}

/// Sizing of the arena frame memory is carved from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArenaConfig {
	/// Bytes preallocated when the VM is built, and retained across resets.
	pub initial_capacity: usize,
	/// Ceiling the arena never grows past.
	pub max_capacity: usize,
	/// Geometric growth step, in percent of the current capacity.
	pub growth_factor_percent: usize,
}

impl ArenaConfig {
	/// 64 KiB initially, growing by half up to 64 MiB.
	pub const fn new() -> Self {
		Self {
			initial_capacity: 64 * 1024,
			max_capacity: 64 * 1024 * 1024,
			growth_factor_percent: 150,
		}
	}
}

impl Default for ArenaConfig {
	fn default() -> Self {
		Self::new()
	}
}

/// A feature switch that can be overridden on top of a hard fork.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Eip {
	Eip2NoEmptyContract,
	Eip2CreateTransactionIncrease,
	Eip7DelegateCall,
	Eip140Revert,
	Eip145BitwiseShifting,
	Eip150GasIncrease,
	Eip150NoErrOnCallWithMoreGas,
	Eip150CallL64AfterGas,
	Eip160ExpIncrease,
	Eip161EmptyCheck,
	Eip161CreateIncreaseNonce,
	Eip170CreateContractLimit,
	Eip211ReturnData,
	Eip214StaticCall,
	Eip1014Create2,
	Eip1052ExtCodeHash,
	Eip1153TransientStorage,
	Eip1344ChainId,
	Eip1559FeeMarket,
	Eip1884TrieRepricing,
	Eip1884SelfBalance,
	Eip2028TransactionCalldataDecrease,
	Eip2200SstoreGasMetering,
	Eip2200SstoreRevertUnderStipend,
	Eip2929IncreaseStateAccessGas,
	Eip2930AccessList,
	Eip3198BaseFee,
	Eip3529DecreaseClearsRefund,
	Eip3541DisallowExecutableFormat,
	Eip3651WarmCoinbaseAddress,
	Eip3855Push0,
	Eip3860MaxInitcodeSize,
	Eip4844BlobHash,
	Eip5656Mcopy,
	Eip6780SuicideOnlyInSameTx,
	Eip7516BlobBaseFee,
}

/// Enable or disable one [Eip], applied after the hard fork defaults.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EipOverride {
	pub eip: Eip,
	pub enabled: bool,
}

impl EipOverride {
	pub const fn enable(eip: Eip) -> Self {
		Self { eip, enabled: true }
	}

	pub const fn disable(eip: Eip) -> Self {
		Self {
			eip,
			enabled: false,
		}
	}
}

/// Inconsistent configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
	/// The arena growth factor must be above 100 percent.
	GrowthFactorTooSmall(usize),
	/// The arena would start above its ceiling.
	InitialCapacityAboveMax { initial: usize, max: usize },
	/// The arena ceiling is zero.
	ZeroArenaCapacity,
	/// Frames need at least one stack slot.
	ZeroStackLimit,
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::GrowthFactorTooSmall(factor) => {
				write!(f, "arena growth factor {factor}% must be above 100%")
			}
			Self::InitialCapacityAboveMax { initial, max } => write!(
				f,
				"arena initial capacity {initial} is above the maximum {max}"
			),
			Self::ZeroArenaCapacity => f.write_str("arena maximum capacity is zero"),
			Self::ZeroStackLimit => f.write_str("stack limit is zero"),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Runtime configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Config {
	/// Hard fork the EIP flags were derived from.
	pub hardfork: Hardfork,
	/// Disallow empty contract creation.
	pub eip2_no_empty_contract: bool,
	/// Increase contract creation transaction cost.
	pub eip2_create_transaction_increase: bool,
	/// EIP-1884: trie repricing.
	pub eip1884_trie_repricing: bool,
	/// EIP-1283.
	pub eip2200_sstore_gas_metering: bool,
	/// EIP-1706.
	pub eip2200_sstore_revert_under_stipend: bool,
	/// EIP-2929
	pub eip2929_increase_state_access_gas: bool,
	/// EIP-3529
	pub eip3529_decrease_clears_refund: bool,
	/// EIP-3541
	pub eip3541_disallow_executable_format: bool,
	/// EIP-3651
	pub eip3651_warm_coinbase_address: bool,
	/// Gas increases of EIP150.
	pub eip150_gas_increase: bool,
	/// Whether to throw out of gas error when
	/// CALL/CALLCODE/DELEGATECALL requires more than maximum amount
	/// of gas.
	pub eip150_no_err_on_call_with_more_gas: bool,
	/// Take l64 for callcreate after gas.
	pub eip150_call_l64_after_gas: bool,
	/// Empty accounts count as non-existent, and touched empty accounts are
	/// removed.
	pub eip161_empty_check: bool,
	/// Whether create transactions and create opcode increases nonce by one.
	pub eip161_create_increase_nonce: bool,
	/// EIP170.
	pub eip170_create_contract_limit: bool,
	/// EIP-3860, maximum size limit of init_code.
	pub eip3860_max_initcode_size: bool,
	/// Has delegate call.
	pub eip7_delegate_call: bool,
	/// Has create2.
	pub eip1014_create2: bool,
	/// Has revert.
	pub eip140_revert: bool,
	/// EIP160.
	pub eip160_exp_increase: bool,
	/// Has return data.
	pub eip211_return_data: bool,
	/// Static call.
	pub eip214_static_call: bool,
	/// Has bitwise shifting.
	pub eip145_bitwise_shifting: bool,
	/// Has chain ID.
	pub eip1344_chain_id: bool,
	/// Has self balance.
	pub eip1884_self_balance: bool,
	/// Has ext code hash.
	pub eip1052_ext_code_hash: bool,
	/// Has ext block fee. See [EIP-3198](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-3198.md)
	pub eip3198_base_fee: bool,
	/// Has PUSH0 opcode. See [EIP-3855](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-3855.md)
	pub eip3855_push0: bool,
	/// Enables transient storage. See [EIP-1153](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-1153.md)
	pub eip1153_transient_storage: bool,
	/// Enables MCOPY instruction. See [EIP-5656](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-5656.md)
	pub eip5656_mcopy: bool,
	/// Enables BLOBHASH.
	pub eip4844_blob_hash: bool,
	/// `SELFDESTRUCT` only deletes accounts created in the same transaction.
	pub eip6780_suicide_only_in_same_tx: bool,
	/// Uses EIP-1559 (Base fee is burned when this flag is enabled) [EIP-1559](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-1559.md)
	pub eip1559_fee_market: bool,
	/// Call data gas cost reduction.
	pub eip2028_transaction_calldata_decrease: bool,
	/// EIP-2930: Optional access list.
	pub eip2930_access_list: bool,
	/// EIP-7516: Blob base fee per gas.
	pub eip7516_blob_base_fee: bool,

	/// Deepest call stack level a frame may run at. The root frame is level 0.
	pub max_call_depth: usize,
	/// Largest accepted transaction input.
	pub max_input_size: usize,
	/// Largest deployable code, enforced with EIP-170.
	pub max_bytecode_size: usize,
	/// Largest linear memory of a single frame.
	pub memory_limit: usize,
	/// Largest operand stack.
	pub stack_limit: usize,
	/// Ceiling for a transaction's gas limit.
	pub block_gas_limit: u64,
	/// Run without charging any gas.
	pub disable_gas_checks: bool,
	/// Let value transfers proceed past the sender's balance.
	pub disable_balance_checks: bool,
	/// Dispatch `PUSHn` + binary op pairs as one instruction.
	pub enable_fusion: bool,
	/// Route calls to precompile addresses to their native implementation.
	pub enable_precompiles: bool,
	/// Taken jumps allowed per frame, unlimited when `None`.
	pub loop_quota: Option<u64>,
	/// Arena sizing.
	pub arena: ArenaConfig,
}

impl Config {
	/// Frontier hard fork configuration.
	pub const fn frontier() -> Config {
		Config {
			hardfork: Hardfork::Frontier,
			eip2_no_empty_contract: false,
			eip2_create_transaction_increase: false,
			eip2200_sstore_gas_metering: false,
			eip2200_sstore_revert_under_stipend: false,
			eip2929_increase_state_access_gas: false,
			eip3529_decrease_clears_refund: false,
			eip3541_disallow_executable_format: false,
			eip3651_warm_coinbase_address: false,
			eip150_no_err_on_call_with_more_gas: false,
			eip161_empty_check: false,
			eip161_create_increase_nonce: false,
			eip150_call_l64_after_gas: false,
			eip170_create_contract_limit: false,
			eip3860_max_initcode_size: false,
			eip7_delegate_call: false,
			eip1014_create2: false,
			eip140_revert: false,
			eip211_return_data: false,
			eip145_bitwise_shifting: false,
			eip1344_chain_id: false,
			eip1884_self_balance: false,
			eip1052_ext_code_hash: false,
			eip3198_base_fee: false,
			eip3855_push0: false,
			eip1153_transient_storage: false,
			eip5656_mcopy: false,
			eip4844_blob_hash: false,
			eip6780_suicide_only_in_same_tx: false,
			eip1559_fee_market: false,
			eip150_gas_increase: false,
			eip160_exp_increase: false,
			eip1884_trie_repricing: false,
			eip214_static_call: false,
			eip2028_transaction_calldata_decrease: false,
			eip2930_access_list: false,
			eip7516_blob_base_fee: false,

			max_call_depth: 1024,
			max_input_size: 128 * 1024,
			max_bytecode_size: 0x6000,
			memory_limit: 0xFF_FFFF,
			stack_limit: 1024,
			block_gas_limit: 30_000_000,
			disable_gas_checks: false,
			disable_balance_checks: false,
			enable_fusion: true,
			enable_precompiles: true,
			loop_quota: None,
			arena: ArenaConfig::new(),
		}
	}

	/// Homestead
	pub const fn homestead() -> Config {
		let mut config = Self::frontier();
		config.hardfork = Hardfork::Homestead;
		config.eip2_no_empty_contract = true;
		config.eip2_create_transaction_increase = true;
		config.eip7_delegate_call = true;
		config
	}

	/// Tangerine whistle
	pub const fn tangerine_whistle() -> Config {
		let mut config = Self::homestead();
		config.hardfork = Hardfork::TangerineWhistle;
		config.eip150_gas_increase = true;
		config.eip150_no_err_on_call_with_more_gas = true;
		config.eip150_call_l64_after_gas = true;
		config
	}

	/// Spurious dragon
	pub const fn spurious_dragon() -> Config {
		let mut config = Self::tangerine_whistle();
		config.hardfork = Hardfork::SpuriousDragon;
		config.eip161_empty_check = true;
		config.eip161_create_increase_nonce = true;
		config.eip160_exp_increase = true;
		config.eip170_create_contract_limit = true;
		config
	}

	/// Byzantium
	pub const fn byzantium() -> Config {
		let mut config = Self::spurious_dragon();
		config.hardfork = Hardfork::Byzantium;
		config.eip140_revert = true;
		config.eip211_return_data = true;
		config.eip214_static_call = true;
		config
	}

	/// Petersburg
	pub const fn petersburg() -> Config {
		let mut config = Self::byzantium();
		config.hardfork = Hardfork::Petersburg;
		config.eip145_bitwise_shifting = true;
		config.eip1014_create2 = true;
		config.eip1052_ext_code_hash = true;
		config
	}

	/// Istanbul hard fork configuration.
	pub const fn istanbul() -> Config {
		let mut config = Self::petersburg();
		config.hardfork = Hardfork::Istanbul;
		config.eip1344_chain_id = true;
		config.eip1884_trie_repricing = true;
		config.eip1884_self_balance = true;
		config.eip2028_transaction_calldata_decrease = true;
		config.eip2200_sstore_gas_metering = true;
		config.eip2200_sstore_revert_under_stipend = true;
		config
	}

	/// Berlin
	pub const fn berlin() -> Config {
		let mut config = Self::istanbul();
		config.hardfork = Hardfork::Berlin;
		config.eip2929_increase_state_access_gas = true;
		config.eip2930_access_list = true;
		config
	}

	/// London
	pub const fn london() -> Config {
		let mut config = Self::berlin();
		config.hardfork = Hardfork::London;
		config.eip1559_fee_market = true;
		config.eip3198_base_fee = true;
		config.eip3529_decrease_clears_refund = true;
		config.eip3541_disallow_executable_format = true;
		config
	}

	/// Shanghai
	pub const fn shanghai() -> Config {
		let mut config = Self::london();
		config.hardfork = Hardfork::Shanghai;
		config.eip3651_warm_coinbase_address = true;
		config.eip3855_push0 = true;
		config.eip3860_max_initcode_size = true;
		config
	}

	/// Cancun
	pub const fn cancun() -> Config {
		let mut config = Self::shanghai();
		config.hardfork = Hardfork::Cancun;
		config.eip1153_transient_storage = true;
		config.eip5656_mcopy = true;
		config.eip4844_blob_hash = true;
		config.eip6780_suicide_only_in_same_tx = true;
		config.eip7516_blob_base_fee = true;
		config
	}

	/// Configuration of a hard fork.
	pub const fn from_hardfork(hardfork: Hardfork) -> Config {
		match hardfork {
			Hardfork::Frontier => Self::frontier(),
			Hardfork::Homestead => Self::homestead(),
			Hardfork::TangerineWhistle => Self::tangerine_whistle(),
			Hardfork::SpuriousDragon => Self::spurious_dragon(),
			Hardfork::Byzantium => Self::byzantium(),
			Hardfork::Petersburg => Self::petersburg(),
			Hardfork::Istanbul => Self::istanbul(),
			Hardfork::Berlin => Self::berlin(),
			Hardfork::London => Self::london(),
			Hardfork::Shanghai => Self::shanghai(),
			Hardfork::Cancun => Self::cancun(),
		}
	}

	/// Apply `overrides` in order. A later override of the same EIP wins.
	#[must_use]
	pub fn with_overrides(mut self, overrides: &[EipOverride]) -> Config {
		for o in overrides {
			*self.eip_mut(o.eip) = o.enabled;
		}
		self
	}

	/// Whether `eip` is active.
	pub fn is_enabled(&self, eip: Eip) -> bool {
		match eip {
			Eip::Eip2NoEmptyContract => self.eip2_no_empty_contract,
			Eip::Eip2CreateTransactionIncrease => self.eip2_create_transaction_increase,
			Eip::Eip7DelegateCall => self.eip7_delegate_call,
			Eip::Eip140Revert => self.eip140_revert,
			Eip::Eip145BitwiseShifting => self.eip145_bitwise_shifting,
			Eip::Eip150GasIncrease => self.eip150_gas_increase,
			Eip::Eip150NoErrOnCallWithMoreGas => self.eip150_no_err_on_call_with_more_gas,
			Eip::Eip150CallL64AfterGas => self.eip150_call_l64_after_gas,
			Eip::Eip160ExpIncrease => self.eip160_exp_increase,
			Eip::Eip161EmptyCheck => self.eip161_empty_check,
			Eip::Eip161CreateIncreaseNonce => self.eip161_create_increase_nonce,
			Eip::Eip170CreateContractLimit => self.eip170_create_contract_limit,
			Eip::Eip211ReturnData => self.eip211_return_data,
			Eip::Eip214StaticCall => self.eip214_static_call,
			Eip::Eip1014Create2 => self.eip1014_create2,
			Eip::Eip1052ExtCodeHash => self.eip1052_ext_code_hash,
			Eip::Eip1153TransientStorage => self.eip1153_transient_storage,
			Eip::Eip1344ChainId => self.eip1344_chain_id,
			Eip::Eip1559FeeMarket => self.eip1559_fee_market,
			Eip::Eip1884TrieRepricing => self.eip1884_trie_repricing,
			Eip::Eip1884SelfBalance => self.eip1884_self_balance,
			Eip::Eip2028TransactionCalldataDecrease => self.eip2028_transaction_calldata_decrease,
			Eip::Eip2200SstoreGasMetering => self.eip2200_sstore_gas_metering,
			Eip::Eip2200SstoreRevertUnderStipend => self.eip2200_sstore_revert_under_stipend,
			Eip::Eip2929IncreaseStateAccessGas => self.eip2929_increase_state_access_gas,
			Eip::Eip2930AccessList => self.eip2930_access_list,
			Eip::Eip3198BaseFee => self.eip3198_base_fee,
			Eip::Eip3529DecreaseClearsRefund => self.eip3529_decrease_clears_refund,
			Eip::Eip3541DisallowExecutableFormat => self.eip3541_disallow_executable_format,
			Eip::Eip3651WarmCoinbaseAddress => self.eip3651_warm_coinbase_address,
			Eip::Eip3855Push0 => self.eip3855_push0,
			Eip::Eip3860MaxInitcodeSize => self.eip3860_max_initcode_size,
			Eip::Eip4844BlobHash => self.eip4844_blob_hash,
			Eip::Eip5656Mcopy => self.eip5656_mcopy,
			Eip::Eip6780SuicideOnlyInSameTx => self.eip6780_suicide_only_in_same_tx,
			Eip::Eip7516BlobBaseFee => self.eip7516_blob_base_fee,
		}
	}

	fn eip_mut(&mut self, eip: Eip) -> &mut bool {
		match eip {
			Eip::Eip2NoEmptyContract => &mut self.eip2_no_empty_contract,
			Eip::Eip2CreateTransactionIncrease => &mut self.eip2_create_transaction_increase,
			Eip::Eip7DelegateCall => &mut self.eip7_delegate_call,
			Eip::Eip140Revert => &mut self.eip140_revert,
			Eip::Eip145BitwiseShifting => &mut self.eip145_bitwise_shifting,
			Eip::Eip150GasIncrease => &mut self.eip150_gas_increase,
			Eip::Eip150NoErrOnCallWithMoreGas => &mut self.eip150_no_err_on_call_with_more_gas,
			Eip::Eip150CallL64AfterGas => &mut self.eip150_call_l64_after_gas,
			Eip::Eip160ExpIncrease => &mut self.eip160_exp_increase,
			Eip::Eip161EmptyCheck => &mut self.eip161_empty_check,
			Eip::Eip161CreateIncreaseNonce => &mut self.eip161_create_increase_nonce,
			Eip::Eip170CreateContractLimit => &mut self.eip170_create_contract_limit,
			Eip::Eip211ReturnData => &mut self.eip211_return_data,
			Eip::Eip214StaticCall => &mut self.eip214_static_call,
			Eip::Eip1014Create2 => &mut self.eip1014_create2,
			Eip::Eip1052ExtCodeHash => &mut self.eip1052_ext_code_hash,
			Eip::Eip1153TransientStorage => &mut self.eip1153_transient_storage,
			Eip::Eip1344ChainId => &mut self.eip1344_chain_id,
			Eip::Eip1559FeeMarket => &mut self.eip1559_fee_market,
			Eip::Eip1884TrieRepricing => &mut self.eip1884_trie_repricing,
			Eip::Eip1884SelfBalance => &mut self.eip1884_self_balance,
			Eip::Eip2028TransactionCalldataDecrease => {
				&mut self.eip2028_transaction_calldata_decrease
			}
			Eip::Eip2200SstoreGasMetering => &mut self.eip2200_sstore_gas_metering,
			Eip::Eip2200SstoreRevertUnderStipend => &mut self.eip2200_sstore_revert_under_stipend,
			Eip::Eip2929IncreaseStateAccessGas => &mut self.eip2929_increase_state_access_gas,
			Eip::Eip2930AccessList => &mut self.eip2930_access_list,
			Eip::Eip3198BaseFee => &mut self.eip3198_base_fee,
			Eip::Eip3529DecreaseClearsRefund => &mut self.eip3529_decrease_clears_refund,
			Eip::Eip3541DisallowExecutableFormat => &mut self.eip3541_disallow_executable_format,
			Eip::Eip3651WarmCoinbaseAddress => &mut self.eip3651_warm_coinbase_address,
			Eip::Eip3855Push0 => &mut self.eip3855_push0,
			Eip::Eip3860MaxInitcodeSize => &mut self.eip3860_max_initcode_size,
			Eip::Eip4844BlobHash => &mut self.eip4844_blob_hash,
			Eip::Eip5656Mcopy => &mut self.eip5656_mcopy,
			Eip::Eip6780SuicideOnlyInSameTx => &mut self.eip6780_suicide_only_in_same_tx,
			Eip::Eip7516BlobBaseFee => &mut self.eip7516_blob_base_fee,
		}
	}

	/// Check the numeric limits for consistency.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.arena.growth_factor_percent <= 100 {
			return Err(ConfigError::GrowthFactorTooSmall(
				self.arena.growth_factor_percent,
			));
		}
		if self.arena.max_capacity == 0 {
			return Err(ConfigError::ZeroArenaCapacity);
		}
		if self.arena.initial_capacity > self.arena.max_capacity {
			return Err(ConfigError::InitialCapacityAboveMax {
				initial: self.arena.initial_capacity,
				max: self.arena.max_capacity,
			});
		}
		if self.stack_limit == 0 {
			return Err(ConfigError::ZeroStackLimit);
		}

		Ok(())
	}

	/// Limits every frame is created with.
	pub const fn frame_config(&self) -> FrameConfig {
		FrameConfig {
			stack_limit: self.stack_limit,
			memory_limit: self.memory_limit,
		}
	}

	/// Smallest width able to count up to `max_call_depth`.
	pub const fn get_depth_type(&self) -> DepthType {
		DepthType::for_bound(self.max_call_depth as u64)
	}

	/// Fresh per-frame jump counter for `loop_quota`.
	pub const fn create_loop_safety_counter(&self) -> LoopSafetyCounter {
		LoopSafetyCounter::new(self.loop_quota)
	}

	/// Whether the hard fork defines `opcode`. Undefined opcodes are left
	/// alone, as they fail regardless.
	pub fn opcode_enabled(&self, opcode: Opcode) -> bool {
		match opcode {
			Opcode::DELEGATECALL => self.eip7_delegate_call,
			Opcode::REVERT => self.eip140_revert,
			Opcode::RETURNDATASIZE | Opcode::RETURNDATACOPY => self.eip211_return_data,
			Opcode::STATICCALL => self.eip214_static_call,
			Opcode::SHL | Opcode::SHR | Opcode::SAR => self.eip145_bitwise_shifting,
			Opcode::CREATE2 => self.eip1014_create2,
			Opcode::EXTCODEHASH => self.eip1052_ext_code_hash,
			Opcode::CHAINID => self.eip1344_chain_id,
			Opcode::SELFBALANCE => self.eip1884_self_balance,
			Opcode::BASEFEE => self.eip3198_base_fee,
			Opcode::PUSH0 => self.eip3855_push0,
			Opcode::TLOAD | Opcode::TSTORE => self.eip1153_transient_storage,
			Opcode::MCOPY => self.eip5656_mcopy,
			Opcode::BLOBHASH => self.eip4844_blob_hash,
			Opcode::BLOBBASEFEE => self.eip7516_blob_base_fee,
			_ => true,
		}
	}

	/// Opcodes the hard fork does not define yet.
	pub fn disabled_opcodes(&self) -> Vec<Opcode> {
		(0..=u8::MAX)
			.map(Opcode)
			.filter(|opcode| !self.opcode_enabled(*opcode))
			.collect()
	}

	/// Gas paid for extcode.
	pub fn gas_ext_code(&self) -> u64 {
		if self.eip150_gas_increase {
			700
		} else {
			20
		}
	}

	/// Gas paid for extcodehash.
	pub fn gas_ext_code_hash(&self) -> u64 {
		if self.eip1884_trie_repricing {
			700
		} else {
			400
		}
	}

	/// Gas paid for sstore set.
	pub fn gas_sstore_set(&self) -> u64 {
		20000
	}

	/// Gas paid for sstore reset.
	pub fn gas_sstore_reset(&self) -> u64 {
		if self.eip2929_increase_state_access_gas {
			2900
		} else {
			5000
		}
	}

	/// Gas paid for sstore refund.
	pub fn refund_sstore_clears(&self) -> i64 {
		if self.eip3529_decrease_clears_refund {
			4800
		} else {
			15000
		}
	}

	/// EIP-3529
	pub fn max_refund_quotient(&self) -> u64 {
		if self.eip3529_decrease_clears_refund {
			5
		} else {
			2
		}
	}

	/// Gas paid for BALANCE opcode.
	pub fn gas_balance(&self) -> u64 {
		if self.eip1884_trie_repricing {
			700
		} else if self.eip150_gas_increase {
			400
		} else {
			20
		}
	}

	/// Gas paid for SLOAD opcode.
	pub fn gas_sload(&self) -> u64 {
		if self.eip2929_increase_state_access_gas {
			100
		} else if self.eip2200_sstore_gas_metering {
			800
		} else if self.eip150_gas_increase {
			200
		} else {
			50
		}
	}

	/// Gas paid for cold SLOAD opcode.
	pub fn gas_sload_cold(&self) -> u64 {
		if self.eip2929_increase_state_access_gas {
			2100
		} else {
			0
		}
	}

	/// Gas paid for SELFDESTRUCT opcode.
	pub fn gas_suicide(&self) -> u64 {
		if self.eip150_gas_increase {
			5000
		} else {
			0
		}
	}

	/// Gas paid for SELFDESTRUCT opcode when it hits a new account.
	pub fn gas_suicide_new_account(&self) -> u64 {
		if self.eip150_gas_increase {
			25000
		} else {
			0
		}
	}

	/// Gas paid for CALL opcode.
	pub fn gas_call(&self) -> u64 {
		if self.eip150_gas_increase {
			700
		} else {
			40
		}
	}

	/// Gas paid for EXP opcode for every byte.
	pub fn gas_expbyte(&self) -> u64 {
		if self.eip160_exp_increase {
			50
		} else {
			10
		}
	}

	/// Gas paid for a contract creation transaction.
	pub fn gas_transaction_create(&self) -> u64 {
		if self.eip2_create_transaction_increase {
			53000
		} else {
			21000
		}
	}

	/// Gas paid for a message call transaction.
	pub fn gas_transaction_call(&self) -> u64 {
		21000
	}

	/// Gas paid for zero data in a transaction.
	pub fn gas_transaction_zero_data(&self) -> u64 {
		4
	}

	/// Gas paid for non-zero data in a transaction.
	pub fn gas_transaction_non_zero_data(&self) -> u64 {
		if self.eip2028_transaction_calldata_decrease {
			16
		} else {
			68
		}
	}

	/// Gas paid per address in transaction access list (see EIP-2930).
	pub fn gas_access_list_address(&self) -> u64 {
		if self.eip2930_access_list {
			2400
		} else {
			0
		}
	}

	/// Gas paid per storage key in transaction access list (see EIP-2930).
	pub fn gas_access_list_storage_key(&self) -> u64 {
		if self.eip2930_access_list {
			1900
		} else {
			0
		}
	}

	/// Gas paid for accessing cold account.
	pub fn gas_account_access_cold(&self) -> u64 {
		if self.eip2929_increase_state_access_gas {
			2600
		} else {
			0
		}
	}

	/// Gas paid for accessing ready storage.
	pub fn gas_storage_read_warm(&self) -> u64 {
		if self.eip2929_increase_state_access_gas {
			100
		} else {
			0
		}
	}

	/// Call stipend.
	pub fn call_stipend(&self) -> u64 {
		2300
	}

	/// Maximum size limit of init code.
	pub fn max_initcode_size(&self) -> Option<usize> {
		if self.eip3860_max_initcode_size {
			Some(self.max_bytecode_size.saturating_mul(2))
		} else {
			None
		}
	}

	/// Create contract limit.
	pub fn create_contract_limit(&self) -> Option<usize> {
		if self.eip170_create_contract_limit {
			Some(self.max_bytecode_size)
		} else {
			None
		}
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::cancun()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hardforks_build_on_each_other() {
		let frontier = Config::frontier();
		assert_eq!(frontier.gas_call(), 40);
		assert_eq!(frontier.gas_sload(), 50);
		assert_eq!(frontier.gas_transaction_create(), 21000);
		assert_eq!(frontier.gas_transaction_non_zero_data(), 68);
		assert_eq!(frontier.create_contract_limit(), None);

		assert_eq!(Config::tangerine_whistle().gas_sload(), 200);
		assert_eq!(Config::istanbul().gas_sload(), 800);

		let berlin = Config::berlin();
		assert_eq!(berlin.gas_call(), 700);
		assert_eq!(berlin.gas_sload(), 100);
		assert_eq!(berlin.gas_sload_cold(), 2100);
		assert_eq!(berlin.gas_transaction_non_zero_data(), 16);
		assert_eq!(berlin.max_refund_quotient(), 2);
		assert_eq!(Config::london().max_refund_quotient(), 5);

		let cancun = Config::cancun();
		assert_eq!(cancun.gas_transaction_create(), 53000);
		assert_eq!(cancun.create_contract_limit(), Some(0x6000));
		assert_eq!(cancun.max_initcode_size(), Some(0xc000));
		assert_eq!(cancun.call_stipend(), 2300);
		assert_eq!(Config::from_hardfork(Hardfork::Cancun), cancun);
	}

	#[test]
	fn later_overrides_win() {
		let config = Config::shanghai().with_overrides(&[
			EipOverride::disable(Eip::Eip3855Push0),
			EipOverride::enable(Eip::Eip5656Mcopy),
			EipOverride::enable(Eip::Eip3855Push0),
			EipOverride::disable(Eip::Eip2929IncreaseStateAccessGas),
		]);

		assert!(config.is_enabled(Eip::Eip3855Push0));
		assert!(config.is_enabled(Eip::Eip5656Mcopy));
		assert!(!config.is_enabled(Eip::Eip2929IncreaseStateAccessGas));
		assert_eq!(config.gas_sload(), 800);
		assert!(config.opcode_enabled(Opcode::MCOPY));
		assert!(!config.opcode_enabled(Opcode::TLOAD));
	}

	#[test]
	fn disabled_opcodes_follow_the_hardfork() {
		let frontier = Config::frontier().disabled_opcodes();
		assert!(frontier.contains(&Opcode::DELEGATECALL));
		assert!(frontier.contains(&Opcode::PUSH0));
		assert!(!frontier.contains(&Opcode::ADD));

		let london = Config::london().disabled_opcodes();
		assert!(london.contains(&Opcode::PUSH0));
		assert!(!london.contains(&Opcode::BASEFEE));

		assert!(Config::cancun().disabled_opcodes().is_empty());
	}

	#[test]
	fn derived_limits() {
		let mut config = Config::cancun();
		assert_eq!(config.get_depth_type(), DepthType::U16);
		assert_eq!(
			config.create_loop_safety_counter(),
			LoopSafetyCounter::Disabled
		);

		config.max_call_depth = 4;
		config.loop_quota = Some(100_000);
		config.memory_limit = 1024;
		assert_eq!(config.get_depth_type(), DepthType::U8);
		assert_eq!(
			config.create_loop_safety_counter().depth_type(),
			Some(DepthType::U32)
		);
		assert_eq!(config.frame_config().memory_limit, 1024);
		assert_eq!(config.frame_config().stack_limit, 1024);
	}

	#[test]
	fn validate_rejects_inconsistent_limits() {
		assert_eq!(Config::cancun().validate(), Ok(()));

		let mut config = Config::cancun();
		config.arena.growth_factor_percent = 100;
		assert_eq!(config.validate(), Err(ConfigError::GrowthFactorTooSmall(100)));

		let mut config = Config::cancun();
		config.arena.initial_capacity = 2048;
		config.arena.max_capacity = 1024;
		assert_eq!(
			config.validate(),
			Err(ConfigError::InitialCapacityAboveMax {
				initial: 2048,
				max: 1024
			})
		);

		let mut config = Config::cancun();
		config.stack_limit = 0;
		assert_eq!(config.validate(), Err(ConfigError::ZeroStackLimit));
	}
}
