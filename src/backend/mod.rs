//! # Backend-related traits and implementations
//!
//! A backend exposes external information that is available to an EVM
//! interpreter. This includes block information such as the current coinbase,
//! block gas limit, etc, as well as the state such as account balance, storage
//! and code.
//!
//! Persistent state lives behind a [Database]. During a transaction, the
//! interpreter talks to an [OverlayedBackend] instead, which records every
//! change in nested substates and only touches the database when the change
//! set is applied at the end.

mod in_memory;
mod overlayed;

use alloc::{borrow::Cow, string::ToString, vec::Vec};
use core::fmt;

use arena_evm_interpreter::{ExitError, ExitFatal};
use auto_impl::auto_impl;
use primitive_types::{H160, H256, U256};

pub use self::{
	in_memory::{InMemoryDatabase, InMemoryEnvironment},
	overlayed::{OverlayedBackend, OverlayedChangeSet},
};

/// Keccak-256 of the empty byte string.
pub const EMPTY_CODE_HASH: H256 = H256([
	0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
	0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Persistent account record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
	pub balance: U256,
	pub nonce: U256,
	pub code_hash: H256,
}

impl Default for Account {
	fn default() -> Self {
		Self {
			balance: U256::zero(),
			nonce: U256::zero(),
			code_hash: EMPTY_CODE_HASH,
		}
	}
}

impl Account {
	/// Empty in the sense of EIP-161: no balance, no nonce and no code.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.balance.is_zero() && self.nonce.is_zero() && self.code_hash == EMPTY_CODE_HASH
	}
}

/// Failure of a database write.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DatabaseError {
	/// The database does not accept writes.
	ReadOnly,
	/// Implementation-specific failure.
	Other(Cow<'static, str>),
}

impl fmt::Display for DatabaseError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ReadOnly => f.write_str("database is read-only"),
			Self::Other(msg) => f.write_str(msg),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for ExitError {
	fn from(err: DatabaseError) -> Self {
		ExitFatal::Database(Cow::Owned(err.to_string())).into()
	}
}

/// Persistent world state.
///
/// Reads never fail: a missing account or slot reads as empty. Writes only
/// happen when a finished transaction is applied. A failed write aborts that
/// application, and the writes already made are rolled back.
#[auto_impl(&mut, Box)]
pub trait Database {
	/// Account at `address`, if it exists.
	fn get_account(&self, address: H160) -> Option<Account>;
	/// Create or replace the account at `address`.
	fn set_account(&mut self, address: H160, account: Account) -> Result<(), DatabaseError>;
	/// Storage value of `address` at `slot`.
	fn get_storage(&self, address: H160, slot: U256) -> U256;
	/// Every non-zero storage slot of `address`.
	fn storage_slots(&self, address: H160) -> Vec<(U256, U256)>;
	/// Set the storage value of `address` at `slot`. Zero clears the slot.
	fn set_storage(&mut self, address: H160, slot: U256, value: U256)
		-> Result<(), DatabaseError>;
	/// Store `code` and return its hash.
	fn set_code(&mut self, code: Vec<u8>) -> Result<H256, DatabaseError>;
	/// Code with the given hash. Unknown hashes read as empty code.
	fn get_code(&self, code_hash: H256) -> Vec<u8>;
	/// Remove the account at `address`, together with its storage.
	fn delete_account(&mut self, address: H160) -> Result<(), DatabaseError>;
	/// Remove every storage slot of `address`.
	fn clear_storage(&mut self, address: H160) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
	use sha3::{Digest, Keccak256};

	use super::*;

	#[test]
	fn empty_code_hash_is_keccak_of_nothing() {
		assert_eq!(
			EMPTY_CODE_HASH,
			H256::from_slice(Keccak256::digest([]).as_slice())
		);
		assert!(Account::default().is_empty());
	}

	#[test]
	fn database_errors_are_fatal() {
		let err: ExitError = DatabaseError::ReadOnly.into();
		assert!(err.is_fatal());
	}
}
