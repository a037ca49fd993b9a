use alloc::{collections::BTreeMap, vec::Vec};

use arena_evm_interpreter::RuntimeEnvironment;
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

use super::{Account, Database, DatabaseError, EMPTY_CODE_HASH};

/// Block and chain information held in memory.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InMemoryEnvironment {
	pub block_hashes: BTreeMap<U256, H256>,
	pub block_number: U256,
	pub block_coinbase: H160,
	pub block_timestamp: U256,
	pub block_difficulty: U256,
	pub block_randomness: Option<H256>,
	pub block_gas_limit: U256,
	pub block_base_fee_per_gas: U256,
	pub blob_hashes: Vec<H256>,
	pub blob_base_fee_per_gas: U256,
	pub chain_id: U256,
}

impl Default for InMemoryEnvironment {
	fn default() -> Self {
		Self {
			block_hashes: BTreeMap::new(),
			block_number: U256::zero(),
			block_coinbase: H160::zero(),
			block_timestamp: U256::zero(),
			block_difficulty: U256::zero(),
			block_randomness: None,
			block_gas_limit: U256::from(30_000_000),
			block_base_fee_per_gas: U256::zero(),
			blob_hashes: Vec::new(),
			blob_base_fee_per_gas: U256::one(),
			chain_id: U256::one(),
		}
	}
}

impl RuntimeEnvironment for InMemoryEnvironment {
	fn block_hash(&self, number: U256) -> H256 {
		self.block_hashes.get(&number).copied().unwrap_or_default()
	}

	fn block_number(&self) -> U256 {
		self.block_number
	}

	fn block_coinbase(&self) -> H160 {
		self.block_coinbase
	}

	fn block_timestamp(&self) -> U256 {
		self.block_timestamp
	}

	fn block_difficulty(&self) -> U256 {
		self.block_difficulty
	}

	fn block_randomness(&self) -> Option<H256> {
		self.block_randomness
	}

	fn block_gas_limit(&self) -> U256 {
		self.block_gas_limit
	}

	fn block_base_fee_per_gas(&self) -> U256 {
		self.block_base_fee_per_gas
	}

	fn blob_hash(&self, index: U256) -> Option<H256> {
		if index >= U256::from(self.blob_hashes.len()) {
			return None;
		}
		self.blob_hashes.get(index.as_usize()).copied()
	}

	fn blob_base_fee_per_gas(&self) -> U256 {
		self.blob_base_fee_per_gas
	}

	fn chain_id(&self) -> U256 {
		self.chain_id
	}
}

/// Reference [Database] keeping everything in ordered maps.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDatabase {
	accounts: BTreeMap<H160, Account>,
	storage: BTreeMap<(H160, U256), U256>,
	codes: BTreeMap<H256, Vec<u8>>,
}

impl InMemoryDatabase {
	/// An empty database.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Create or replace an account holding `balance` and `code`.
	pub fn insert_account(&mut self, address: H160, balance: U256, code: Vec<u8>) {
		let code_hash = self.store_code(code);
		let nonce = self
			.accounts
			.get(&address)
			.map_or_else(U256::zero, |account| account.nonce);
		self.accounts.insert(
			address,
			Account {
				balance,
				nonce,
				code_hash,
			},
		);
	}

	/// Balance of `address`, zero if it does not exist.
	#[must_use]
	pub fn balance(&self, address: H160) -> U256 {
		self.get_account(address)
			.map_or_else(U256::zero, |account| account.balance)
	}

	/// Nonce of `address`, zero if it does not exist.
	#[must_use]
	pub fn nonce(&self, address: H160) -> U256 {
		self.get_account(address)
			.map_or_else(U256::zero, |account| account.nonce)
	}

	/// Code deployed at `address`.
	#[must_use]
	pub fn code(&self, address: H160) -> Vec<u8> {
		self.get_account(address)
			.map(|account| self.get_code(account.code_hash))
			.unwrap_or_default()
	}

	/// Number of accounts.
	#[must_use]
	pub fn len(&self) -> usize {
		self.accounts.len()
	}

	/// Whether there is no account.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.accounts.is_empty()
	}

	fn store_code(&mut self, code: Vec<u8>) -> H256 {
		if code.is_empty() {
			return EMPTY_CODE_HASH;
		}

		let hash = H256::from_slice(Keccak256::digest(&code).as_slice());
		self.codes.insert(hash, code);
		hash
	}
}

impl Database for InMemoryDatabase {
	fn get_account(&self, address: H160) -> Option<Account> {
		self.accounts.get(&address).copied()
	}

	fn set_account(&mut self, address: H160, account: Account) -> Result<(), DatabaseError> {
		self.accounts.insert(address, account);
		Ok(())
	}

	fn get_storage(&self, address: H160, slot: U256) -> U256 {
		self.storage
			.get(&(address, slot))
			.copied()
			.unwrap_or_default()
	}

	fn storage_slots(&self, address: H160) -> Vec<(U256, U256)> {
		self.storage
			.range((address, U256::zero())..=(address, U256::MAX))
			.map(|((_, slot), value)| (*slot, *value))
			.collect()
	}

	fn set_storage(
		&mut self,
		address: H160,
		slot: U256,
		value: U256,
	) -> Result<(), DatabaseError> {
		if value.is_zero() {
			self.storage.remove(&(address, slot));
		} else {
			self.storage.insert((address, slot), value);
		}
		Ok(())
	}

	fn set_code(&mut self, code: Vec<u8>) -> Result<H256, DatabaseError> {
		Ok(self.store_code(code))
	}

	fn get_code(&self, code_hash: H256) -> Vec<u8> {
		self.codes.get(&code_hash).cloned().unwrap_or_default()
	}

	fn delete_account(&mut self, address: H160) -> Result<(), DatabaseError> {
		self.accounts.remove(&address);
		self.clear_storage(address)
	}

	fn clear_storage(&mut self, address: H160) -> Result<(), DatabaseError> {
		self.storage.retain(|(owner, _), _| *owner != address);
		Ok(())
	}
}
