use alloc::vec::Vec;
use core::cmp::min;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use primitive_types::H256;
use sha2::Digest;
use sha3::Keccak256;

use crate::{linear_cost, Precompile, PrecompileOutput};

macro_rules! charge {
	($cost:expr, $gas_limit:expr) => {{
		let cost = $cost;
		if cost > $gas_limit {
			return PrecompileOutput::failure(cost);
		}
		cost
	}};
}

/// Public key recovery at `0x01`.
pub struct ECRecover;

impl ECRecover {
	fn recover(input: &[u8; 128]) -> Option<H256> {
		// v must be 27 or 28 over the full 32-byte word.
		if input[32..63] != [0u8; 31] || ![27, 28].contains(&input[63]) {
			return None;
		}

		let mut sig = [0u8; 64];
		sig.copy_from_slice(&input[64..128]);
		let sig = Signature::from_bytes((&sig[..]).into()).ok()?;
		let recid = RecoveryId::from_byte(input[63] - 27)?;

		let pubkey = VerifyingKey::recover_from_prehash(&input[0..32], &sig, recid).ok()?;
		let encoded = pubkey.to_encoded_point(false);
		let mut address = H256::from_slice(Keccak256::digest(&encoded.as_bytes()[1..]).as_slice());
		address.0[0..12].copy_from_slice(&[0u8; 12]);

		Some(address)
	}
}

impl Precompile for ECRecover {
	fn execute(&self, i: &[u8], gas_limit: u64) -> PrecompileOutput {
		let cost = charge!(3000, gas_limit);

		let mut input = [0u8; 128];
		input[..min(i.len(), 128)].copy_from_slice(&i[..min(i.len(), 128)]);

		match Self::recover(&input) {
			Some(address) => PrecompileOutput::ok(address.0.to_vec(), cost),
			None => PrecompileOutput::ok(Vec::new(), cost),
		}
	}
}

/// SHA-256 at `0x02`.
pub struct Sha256;

impl Precompile for Sha256 {
	fn execute(&self, input: &[u8], gas_limit: u64) -> PrecompileOutput {
		let cost = charge!(linear_cost(input.len(), 60, 12), gas_limit);

		let hash = sha2::Sha256::digest(input);
		PrecompileOutput::ok(hash.to_vec(), cost)
	}
}

/// RIPEMD-160 at `0x03`, left-padded to a word.
pub struct Ripemd160;

impl Precompile for Ripemd160 {
	fn execute(&self, input: &[u8], gas_limit: u64) -> PrecompileOutput {
		let cost = charge!(linear_cost(input.len(), 600, 120), gas_limit);

		let mut ret = [0u8; 32];
		let hash = ripemd::Ripemd160::digest(input);
		ret[12..32].copy_from_slice(&hash);

		PrecompileOutput::ok(ret.to_vec(), cost)
	}
}

/// Data copy at `0x04`.
pub struct Identity;

impl Precompile for Identity {
	fn execute(&self, input: &[u8], gas_limit: u64) -> PrecompileOutput {
		let cost = charge!(linear_cost(input.len(), 15, 3), gas_limit);

		PrecompileOutput::ok(input.to_vec(), cost)
	}
}

#[cfg(test)]
mod tests {
	use hex_literal::hex;

	use super::*;

	#[test]
	fn sha256_of_empty_input() {
		let out = Sha256.execute(&[], 100);
		assert!(out.success);
		assert_eq!(out.gas_used, 60);
		assert_eq!(
			out.output,
			hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855").to_vec()
		);
	}

	#[test]
	fn ripemd160_is_left_padded() {
		let out = Ripemd160.execute(&[], 1000);
		assert!(out.success);
		assert_eq!(out.gas_used, 600);
		assert_eq!(
			out.output,
			hex!("0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31").to_vec()
		);
	}

	#[test]
	fn identity_charges_per_word() {
		let out = Identity.execute(&[7u8; 33], 100);
		assert_eq!(out, PrecompileOutput::ok(vec![7u8; 33], 21));
	}

	#[test]
	fn insufficient_gas_fails() {
		let out = Identity.execute(&[1, 2, 3], 17);
		assert!(!out.success);
		assert_eq!(out.gas_used, 18);
		assert!(out.output.is_empty());
	}

	#[test]
	fn ecrecover_rejects_bad_v() {
		let mut input = [0u8; 128];
		input[63] = 29;
		let out = ECRecover.execute(&input, 3000);
		assert!(out.success);
		assert!(out.output.is_empty());
	}

	#[test]
	fn ecrecover_recovers_known_signer() {
		let input = hex!(
			"38d18acb67d25c8bb9942764b62f18e17054f66a817bd4295423adf9ed98873e"
			"000000000000000000000000000000000000000000000000000000000000001b"
			"38d18acb67d25c8bb9942764b62f18e17054f66a817bd4295423adf9ed98873e"
			"789d1dd423d25f0772d2748d60f7e4b81bb14d086eba8e8e8efb6dcff8a4ae02"
		);
		let out = ECRecover.execute(&input, 3000);
		assert!(out.success);
		assert_eq!(
			out.output,
			hex!("000000000000000000000000ceaccac640adf55b2028469bd36ba501f28b699d").to_vec()
		);
	}
}
