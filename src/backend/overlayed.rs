use alloc::{
	boxed::Box,
	collections::{BTreeMap, BTreeSet},
	vec::Vec,
};
use core::mem;

use arena_evm_interpreter::{
	runtime::{checked_withdrawal, Log, RuntimeBackend, RuntimeBaseBackend, RuntimeEnvironment},
	utils::{h256_to_u256, u256_to_h256},
	ExitError, ExitException, ExitFatal,
};
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

use super::{Account, Database, DatabaseError, EMPTY_CODE_HASH};
use crate::{standard::Config, MergeStrategy, TransactionalBackend};

/// Changes of one finished transaction, ready to be applied to a [Database].
#[derive(Clone, Debug, Default)]
pub struct OverlayedChangeSet {
	pub logs: Vec<Log>,
	pub balances: BTreeMap<H160, U256>,
	pub codes: BTreeMap<H160, Vec<u8>>,
	pub nonces: BTreeMap<H160, U256>,
	pub storage_resets: BTreeSet<H160>,
	pub storages: BTreeMap<(H160, H256), H256>,
	pub deletes: BTreeSet<H160>,
}

impl OverlayedChangeSet {
	/// Write every change into `database`. Deletions run last, so an account
	/// both written and deleted ends up deleted.
	///
	/// Either every write lands or, on the first failure, the ones already
	/// made are undone from the values read before each of them.
	pub fn apply<D: Database>(self, database: &mut D) -> Result<(), DatabaseError> {
		let mut undo = Vec::new();
		let result = self.write(database, &mut undo);

		if let Err(err) = &result {
			log::debug!(
				target: "evm",
				"applying changes failed: {}, undoing {} writes",
				err,
				undo.len(),
			);
			for entry in undo.into_iter().rev() {
				if let Err(err) = entry.restore(database) {
					log::warn!(target: "evm", "undoing a database write failed: {}", err);
				}
			}
		}

		result
	}

	fn write<D: Database>(self, database: &mut D, undo: &mut Vec<Undo>) -> Result<(), DatabaseError> {
		for address in &self.storage_resets {
			undo.push(Undo::Slots(*address, database.storage_slots(*address)));
			database.clear_storage(*address)?;
		}

		for ((address, key), value) in self.storages {
			let slot = h256_to_u256(key);
			undo.push(Undo::Storage(address, slot, database.get_storage(address, slot)));
			database.set_storage(address, slot, h256_to_u256(value))?;
		}

		let mut codes = self.codes;
		let touched = self
			.balances
			.keys()
			.chain(self.nonces.keys())
			.chain(codes.keys())
			.copied()
			.collect::<BTreeSet<_>>();

		for address in touched {
			let previous = database.get_account(address);
			let mut account = previous.unwrap_or_default();
			if let Some(balance) = self.balances.get(&address) {
				account.balance = *balance;
			}
			if let Some(nonce) = self.nonces.get(&address) {
				account.nonce = *nonce;
			}
			if let Some(code) = codes.remove(&address) {
				account.code_hash = database.set_code(code)?;
			}

			if previous.is_none() {
				undo.push(Undo::Slots(address, database.storage_slots(address)));
			}
			undo.push(Undo::Account(address, previous));
			database.set_account(address, account)?;
		}

		for address in self.deletes {
			undo.push(Undo::Slots(address, database.storage_slots(address)));
			undo.push(Undo::Account(address, database.get_account(address)));
			database.delete_account(address)?;
		}

		Ok(())
	}
}

/// Database state overwritten while applying a change set.
enum Undo {
	Storage(H160, U256, U256),
	Account(H160, Option<Account>),
	Slots(H160, Vec<(U256, U256)>),
}

impl Undo {
	fn restore<D: Database>(self, database: &mut D) -> Result<(), DatabaseError> {
		match self {
			Self::Storage(address, slot, value) => database.set_storage(address, slot, value),
			Self::Account(address, Some(account)) => database.set_account(address, account),
			Self::Account(address, None) => database.delete_account(address),
			Self::Slots(address, slots) => {
				for (slot, value) in slots {
					database.set_storage(address, slot, value)?;
				}
				Ok(())
			}
		}
	}
}

/// Transaction-scoped view over a [Database].
///
/// Writes land in a stack of substates. Committing a substate folds it into
/// its parent, reverting drops it, warm marks included.
pub struct OverlayedBackend<'config, E, D> {
	environment: E,
	database: D,
	substate: Box<Substate>,
	config: &'config Config,
}

impl<'config, E, D> OverlayedBackend<'config, E, D> {
	pub fn new(environment: E, database: D, config: &'config Config) -> Self {
		Self {
			environment,
			database,
			substate: Box::new(Substate::new()),
			config,
		}
	}

	/// Number of substates pushed on top of the transaction root.
	pub fn depth(&self) -> usize {
		self.substate.depth()
	}
}

impl<'config, E, D: Database> OverlayedBackend<'config, E, D> {
	/// Split into the environment, the untouched database and the changes of
	/// the transaction. Substates that were never popped are dropped.
	pub fn deconstruct(mut self) -> (E, D, OverlayedChangeSet) {
		while let Some(parent) = self.substate.parent.take() {
			self.substate = parent;
		}

		let mut deletes = mem::take(&mut self.substate.deletes);
		if self.config.eip161_empty_check {
			for address in &self.substate.touched {
				if self.is_empty(*address) {
					deletes.insert(*address);
				}
			}
		}

		let substate = *self.substate;
		(
			self.environment,
			self.database,
			OverlayedChangeSet {
				logs: substate.logs,
				balances: substate.balances,
				codes: substate.codes,
				nonces: substate.nonces,
				storage_resets: substate.storage_resets,
				storages: substate.storages,
				deletes,
			},
		)
	}

	fn is_empty(&self, address: H160) -> bool {
		self.balance(address).is_zero()
			&& self.nonce(address).is_zero()
			&& self.code_size(address).is_zero()
	}
}

impl<E: RuntimeEnvironment, D> RuntimeEnvironment for OverlayedBackend<'_, E, D> {
	fn block_hash(&self, number: U256) -> H256 {
		self.environment.block_hash(number)
	}

	fn block_number(&self) -> U256 {
		self.environment.block_number()
	}

	fn block_coinbase(&self) -> H160 {
		self.environment.block_coinbase()
	}

	fn block_timestamp(&self) -> U256 {
		self.environment.block_timestamp()
	}

	fn block_difficulty(&self) -> U256 {
		self.environment.block_difficulty()
	}

	fn block_randomness(&self) -> Option<H256> {
		self.environment.block_randomness()
	}

	fn block_gas_limit(&self) -> U256 {
		self.environment.block_gas_limit()
	}

	fn block_base_fee_per_gas(&self) -> U256 {
		self.environment.block_base_fee_per_gas()
	}

	fn blob_hash(&self, index: U256) -> Option<H256> {
		self.environment.blob_hash(index)
	}

	fn blob_base_fee_per_gas(&self) -> U256 {
		self.environment.blob_base_fee_per_gas()
	}

	fn chain_id(&self) -> U256 {
		self.environment.chain_id()
	}
}

impl<E, D: Database> RuntimeBaseBackend for OverlayedBackend<'_, E, D> {
	fn balance(&self, address: H160) -> U256 {
		self.substate.known_balance(address).unwrap_or_else(|| {
			self.database
				.get_account(address)
				.map_or_else(U256::zero, |account| account.balance)
		})
	}

	fn code_hash(&self, address: H160) -> H256 {
		if !self.exists(address) {
			return H256::zero();
		}

		match self.substate.known_code(address) {
			Some(code) if code.is_empty() => EMPTY_CODE_HASH,
			Some(code) => H256::from_slice(Keccak256::digest(code).as_slice()),
			None => self
				.database
				.get_account(address)
				.map_or(EMPTY_CODE_HASH, |account| account.code_hash),
		}
	}

	fn code(&self, address: H160) -> Vec<u8> {
		match self.substate.known_code(address) {
			Some(code) => code.clone(),
			None => self
				.database
				.get_account(address)
				.map(|account| self.database.get_code(account.code_hash))
				.unwrap_or_default(),
		}
	}

	fn storage(&self, address: H160, index: H256) -> H256 {
		self.substate
			.known_storage(address, index)
			.unwrap_or_else(|| {
				u256_to_h256(self.database.get_storage(address, h256_to_u256(index)))
			})
	}

	fn transient_storage(&self, address: H160, index: H256) -> H256 {
		self.substate
			.known_transient_storage(address, index)
			.unwrap_or_default()
	}

	fn exists(&self, address: H160) -> bool {
		self.substate.known_exists(address) || self.database.get_account(address).is_some()
	}

	fn nonce(&self, address: H160) -> U256 {
		self.substate.known_nonce(address).unwrap_or_else(|| {
			self.database
				.get_account(address)
				.map_or_else(U256::zero, |account| account.nonce)
		})
	}
}

impl<E, D: Database> RuntimeBackend for OverlayedBackend<'_, E, D> {
	fn original_storage(&self, address: H160, index: H256) -> H256 {
		if self.substate.storage_reset(address) {
			H256::zero()
		} else {
			u256_to_h256(self.database.get_storage(address, h256_to_u256(index)))
		}
	}

	fn created(&self, address: H160) -> bool {
		self.substate.created(address)
	}

	fn deleted(&self, address: H160) -> bool {
		self.substate.deleted(address)
	}

	fn is_cold(&self, address: H160, index: Option<H256>) -> bool {
		!self.substate.accessed(address, index)
	}

	fn mark_hot(&mut self, address: H160, index: Option<H256>) {
		self.substate.accessed.insert((address, index));
	}

	fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), ExitError> {
		self.substate.touched.insert(address);
		self.substate.storages.insert((address, index), value);
		Ok(())
	}

	fn set_transient_storage(
		&mut self,
		address: H160,
		index: H256,
		value: H256,
	) -> Result<(), ExitError> {
		self.substate
			.transient_storage
			.insert((address, index), value);
		Ok(())
	}

	fn log(&mut self, log: Log) -> Result<(), ExitError> {
		self.substate.logs.push(log);
		Ok(())
	}

	fn mark_delete(&mut self, address: H160) {
		if !self.config.eip6780_suicide_only_in_same_tx || self.created(address) {
			self.substate.deletes.insert(address);
		}
	}

	fn mark_create(&mut self, address: H160) {
		self.substate.creates.insert(address);
	}

	fn reset_storage(&mut self, address: H160) {
		self.substate
			.storages
			.retain(|(owner, _), _| *owner != address);
		self.substate.storage_resets.insert(address);
	}

	fn set_code(&mut self, address: H160, code: Vec<u8>) -> Result<(), ExitError> {
		self.substate.touched.insert(address);
		self.substate.codes.insert(address, code);
		Ok(())
	}

	fn reset_balance(&mut self, address: H160) {
		// A surviving account keeps whatever it sent to itself.
		if self.config.eip6780_suicide_only_in_same_tx && !self.created(address) {
			return;
		}

		self.substate.balances.insert(address, U256::zero());
	}

	fn deposit(&mut self, target: H160, value: U256) {
		self.substate.touched.insert(target);
		if value.is_zero() && self.config.eip161_empty_check {
			return;
		}

		let balance = self.balance(target);
		self.substate
			.balances
			.insert(target, balance.saturating_add(value));
	}

	fn withdrawal(&mut self, source: H160, value: U256) -> Result<(), ExitError> {
		self.substate.touched.insert(source);
		if value.is_zero() {
			return Ok(());
		}

		let balance = self.balance(source);
		let remaining = if self.config.disable_balance_checks {
			balance.saturating_sub(value)
		} else {
			checked_withdrawal(balance, value)?
		};
		self.substate.balances.insert(source, remaining);
		Ok(())
	}

	fn inc_nonce(&mut self, address: H160) -> Result<(), ExitError> {
		let nonce = self.nonce(address);
		if nonce >= U256::from(u64::MAX) {
			return Err(ExitException::MaxNonce.into());
		}

		self.substate.touched.insert(address);
		self.substate.nonces.insert(address, nonce + U256::one());
		Ok(())
	}
}

impl<E, D> TransactionalBackend for OverlayedBackend<'_, E, D> {
	fn push_substate(&mut self) {
		let mut parent = Box::new(Substate::new());
		mem::swap(&mut parent, &mut self.substate);
		self.substate.parent = Some(parent);
	}

	fn pop_substate(&mut self, strategy: MergeStrategy) -> Result<(), ExitError> {
		let mut child = self
			.substate
			.parent
			.take()
			.ok_or(ExitError::Fatal(ExitFatal::UnevenSubstate))?;
		mem::swap(&mut child, &mut self.substate);

		match strategy {
			MergeStrategy::Commit => self.substate.absorb(*child),
			MergeStrategy::Revert | MergeStrategy::Discard => (),
		}

		Ok(())
	}
}

#[derive(Default)]
struct Substate {
	parent: Option<Box<Substate>>,
	logs: Vec<Log>,
	balances: BTreeMap<H160, U256>,
	codes: BTreeMap<H160, Vec<u8>>,
	nonces: BTreeMap<H160, U256>,
	storage_resets: BTreeSet<H160>,
	storages: BTreeMap<(H160, H256), H256>,
	transient_storage: BTreeMap<(H160, H256), H256>,
	deletes: BTreeSet<H160>,
	creates: BTreeSet<H160>,
	touched: BTreeSet<H160>,
	accessed: BTreeSet<(H160, Option<H256>)>,
}

impl Substate {
	fn new() -> Self {
		Self::default()
	}

	fn depth(&self) -> usize {
		self.parent.as_ref().map_or(0, |parent| parent.depth() + 1)
	}

	fn absorb(&mut self, child: Substate) {
		self.logs.extend(child.logs);
		self.balances.extend(child.balances);
		self.codes.extend(child.codes);
		self.nonces.extend(child.nonces);
		for address in child.storage_resets {
			self.storages.retain(|(owner, _), _| *owner != address);
			self.storage_resets.insert(address);
		}
		self.storages.extend(child.storages);
		self.transient_storage.extend(child.transient_storage);
		self.deletes.extend(child.deletes);
		self.creates.extend(child.creates);
		self.touched.extend(child.touched);
		self.accessed.extend(child.accessed);
	}

	fn known_balance(&self, address: H160) -> Option<U256> {
		match self.balances.get(&address) {
			Some(balance) => Some(*balance),
			None => self.parent.as_ref()?.known_balance(address),
		}
	}

	fn known_code(&self, address: H160) -> Option<&Vec<u8>> {
		match self.codes.get(&address) {
			Some(code) => Some(code),
			None => self.parent.as_ref()?.known_code(address),
		}
	}

	fn known_nonce(&self, address: H160) -> Option<U256> {
		match self.nonces.get(&address) {
			Some(nonce) => Some(*nonce),
			None => self.parent.as_ref()?.known_nonce(address),
		}
	}

	fn known_storage(&self, address: H160, key: H256) -> Option<H256> {
		if let Some(value) = self.storages.get(&(address, key)) {
			Some(*value)
		} else if self.storage_resets.contains(&address) {
			Some(H256::zero())
		} else {
			self.parent.as_ref()?.known_storage(address, key)
		}
	}

	fn known_transient_storage(&self, address: H160, key: H256) -> Option<H256> {
		match self.transient_storage.get(&(address, key)) {
			Some(value) => Some(*value),
			None => self.parent.as_ref()?.known_transient_storage(address, key),
		}
	}

	fn known_exists(&self, address: H160) -> bool {
		self.balances.contains_key(&address)
			|| self.nonces.contains_key(&address)
			|| self.codes.contains_key(&address)
			|| self
				.parent
				.as_ref()
				.is_some_and(|parent| parent.known_exists(address))
	}

	fn storage_reset(&self, address: H160) -> bool {
		self.storage_resets.contains(&address)
			|| self
				.parent
				.as_ref()
				.is_some_and(|parent| parent.storage_reset(address))
	}

	fn deleted(&self, address: H160) -> bool {
		self.deletes.contains(&address)
			|| self
				.parent
				.as_ref()
				.is_some_and(|parent| parent.deleted(address))
	}

	fn created(&self, address: H160) -> bool {
		self.creates.contains(&address)
			|| self
				.parent
				.as_ref()
				.is_some_and(|parent| parent.created(address))
	}

	fn accessed(&self, address: H160, index: Option<H256>) -> bool {
		self.accessed.contains(&(address, index))
			|| self
				.parent
				.as_ref()
				.is_some_and(|parent| parent.accessed(address, index))
	}
}
