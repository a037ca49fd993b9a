//! Precompiled contracts of the arena-backed EVM.
//!
//! A precompile is a native function living at a fixed address. It runs
//! without spawning a frame: the caller forwards a gas limit and gets back the
//! output together with the gas it consumed.

#![deny(warnings)]
#![forbid(unsafe_code, unused_variables)]
#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod simple;

use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};

use primitive_types::H160;

pub use crate::simple::{ECRecover, Identity, Ripemd160, Sha256};

/// Result of running a precompile.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PrecompileOutput {
	/// Returned bytes.
	pub output: Vec<u8>,
	/// Gas consumed. May exceed the forwarded limit, in which case the
	/// caller treats the run as out of gas.
	pub gas_used: u64,
	/// Whether the precompile completed.
	pub success: bool,
}

impl PrecompileOutput {
	/// A completed run.
	#[must_use]
	pub const fn ok(output: Vec<u8>, gas_used: u64) -> Self {
		Self {
			output,
			gas_used,
			success: true,
		}
	}

	/// A failed run. The caller consumes all forwarded gas.
	#[must_use]
	pub const fn failure(gas_used: u64) -> Self {
		Self {
			output: Vec::new(),
			gas_used,
			success: false,
		}
	}
}

/// A native contract.
pub trait Precompile {
	/// Run against `input` with at most `gas_limit` available.
	fn execute(&self, input: &[u8], gas_limit: u64) -> PrecompileOutput;
}

impl<F> Precompile for F
where
	F: Fn(&[u8], u64) -> PrecompileOutput,
{
	fn execute(&self, input: &[u8], gas_limit: u64) -> PrecompileOutput {
		self(input, gas_limit)
	}
}

/// Precompiles keyed by address.
#[derive(Default)]
pub struct Precompiles {
	map: BTreeMap<H160, Box<dyn Precompile>>,
}

impl core::fmt::Debug for Precompiles {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_set().entries(self.map.keys()).finish()
	}
}

impl Precompiles {
	/// No precompile at all.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// `ecrecover`, `sha256`, `ripemd160` and `identity` at 0x01 to 0x04.
	#[must_use]
	pub fn standard() -> Self {
		let mut set = Self::new();
		set.insert(address(1), Box::new(ECRecover));
		set.insert(address(2), Box::new(Sha256));
		set.insert(address(3), Box::new(Ripemd160));
		set.insert(address(4), Box::new(Identity));
		set
	}

	/// Install `precompile` at `address`, replacing any previous one.
	pub fn insert(&mut self, address: H160, precompile: Box<dyn Precompile>) {
		if self.map.insert(address, precompile).is_some() {
			log::debug!(target: "evm", "precompile at {:?} replaced", address);
		}
	}

	/// Precompile at `address`.
	#[must_use]
	pub fn get(&self, address: &H160) -> Option<&dyn Precompile> {
		self.map.get(address).map(|p| p.as_ref())
	}

	/// Whether a precompile lives at `address`.
	#[must_use]
	pub fn contains(&self, address: &H160) -> bool {
		self.map.contains_key(address)
	}

	/// Installed addresses, in ascending order.
	#[must_use]
	pub fn addresses(&self) -> Vec<H160> {
		self.map.keys().copied().collect()
	}

	/// Run the precompile at `address`, if any.
	#[must_use]
	pub fn execute(&self, address: &H160, input: &[u8], gas_limit: u64) -> Option<PrecompileOutput> {
		self.get(address).map(|p| p.execute(input, gas_limit))
	}
}

fn linear_cost(len: usize, base: u64, word: u64) -> u64 {
	let words = (len as u64).saturating_add(31) / 32;
	base.saturating_add(word.saturating_mul(words))
}

/// Address with all bytes zero except the last one.
#[must_use]
pub const fn address(last: u8) -> H160 {
	H160([
		0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, last,
	])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn standard_set_addresses() {
		let set = Precompiles::standard();
		assert_eq!(
			set.addresses(),
			vec![address(1), address(2), address(3), address(4)]
		);
		assert!(set.get(&address(5)).is_none());
	}

	#[test]
	fn closures_can_be_installed() {
		let mut set = Precompiles::standard();
		set.insert(
			address(4),
			Box::new(|input: &[u8], _gas: u64| PrecompileOutput::ok(input.iter().rev().copied().collect(), 1)),
		);

		let out = set.execute(&address(4), &[1, 2, 3], 100).unwrap();
		assert_eq!(out, PrecompileOutput::ok(vec![3, 2, 1], 1));
	}

	#[test]
	fn linear_cost_rounds_up_to_words() {
		assert_eq!(linear_cost(0, 15, 3), 15);
		assert_eq!(linear_cost(1, 15, 3), 18);
		assert_eq!(linear_cost(32, 15, 3), 18);
		assert_eq!(linear_cost(33, 15, 3), 21);
	}
}
