use alloc::{boxed::Box, collections::BTreeMap};
use core::fmt;

use arena_evm_interpreter::{
	error::CallCreateTrap, eval::eval_pass, eval::eval_unknown, Control, FusionSet, Opcode,
	RuntimeBackend, RuntimeEnvironment,
};
use arena_evm_precompile::{Precompile, Precompiles};
use primitive_types::H160;

use crate::standard::{gasometer, Config, Efn, Etable, EtableSet, Machine};

/// Replacement handler for one opcode.
///
/// An override takes the opcode over entirely: the gasometer steps aside, so
/// the handler charges its own gas through `machine.state.gasometer`.
pub type OverrideFn<H> =
	for<'config> fn(&mut Machine<'config>, &mut H, Opcode, usize) -> Control<CallCreateTrap>;

/// Opcode and precompile replacements, installed once when a VM is built.
pub struct Overrides<H> {
	opcodes: [Option<OverrideFn<H>>; 256],
	precompiles: BTreeMap<H160, Box<dyn Precompile>>,
}

impl<H> Default for Overrides<H> {
	fn default() -> Self {
		Self {
			opcodes: [None; 256],
			precompiles: BTreeMap::new(),
		}
	}
}

impl<H> fmt::Debug for Overrides<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let opcodes = self
			.opcodes
			.iter()
			.enumerate()
			.filter(|(_, f)| f.is_some())
			.map(|(i, _)| Opcode(i as u8));

		f.debug_struct("Overrides")
			.field("opcodes", &opcodes.collect::<alloc::vec::Vec<_>>())
			.field("precompiles", &self.precompiles.keys())
			.finish()
	}
}

impl<H> Overrides<H> {
	/// No override.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the handler of `opcode`, defined or not.
	#[must_use]
	pub fn with_opcode(mut self, opcode: Opcode, f: OverrideFn<H>) -> Self {
		self.opcodes[opcode.as_usize()] = Some(f);
		self
	}

	/// Install `precompile` at `address`, on top of the standard set.
	#[must_use]
	pub fn with_precompile(mut self, address: H160, precompile: Box<dyn Precompile>) -> Self {
		self.precompiles.insert(address, precompile);
		self
	}

	/// Override of `opcode`, if any.
	#[must_use]
	pub fn opcode(&self, opcode: Opcode) -> Option<OverrideFn<H>> {
		self.opcodes[opcode.as_usize()]
	}

	/// Opcodes that may be fused. Overridden opcodes never are, since the
	/// fused path runs the built-in semantics.
	#[must_use]
	pub fn fusion_set(&self, config: &Config) -> FusionSet {
		if !config.enable_fusion {
			return FusionSet::empty();
		}

		self.opcodes
			.iter()
			.enumerate()
			.filter(|(_, f)| f.is_some())
			.fold(FusionSet::standard(), |set, (i, _)| set.without(Opcode(i as u8)))
	}

	/// The precompiles reachable by calls: the standard set plus the
	/// overrides, or nothing when precompiles are disabled.
	#[must_use]
	pub fn into_precompiles(self, config: &Config) -> Precompiles {
		if !config.enable_precompiles {
			return Precompiles::new();
		}

		let mut set = Precompiles::standard();
		for (address, precompile) in self.precompiles {
			set.insert(address, precompile);
		}
		set
	}
}

impl<H> Overrides<H>
where
	H: RuntimeEnvironment + RuntimeBackend,
{
	/// Gas and execution tables for `config`, with the overrides patched in.
	/// Opcodes the hardfork does not know yet fail as undefined.
	#[must_use]
	pub fn etables<'config>(&self, config: &Config) -> EtableSet<'config, H> {
		let mut gas: Etable<'config, H> = if config.disable_gas_checks {
			Etable::pass()
		} else {
			let eval: Efn<'config, H> = gasometer::eval;
			Etable::single(eval)
		};

		let mut exec: Etable<'config, H> = Etable::runtime();
		for opcode in config.disabled_opcodes() {
			exec[opcode.as_usize()] = eval_unknown;
		}

		for (i, f) in self.opcodes.iter().enumerate() {
			if let Some(f) = f {
				gas[i] = eval_pass;
				exec[i] = *f;
			}
		}

		(gas, exec)
	}
}

#[cfg(test)]
mod tests {
	use arena_evm_interpreter::ExitSucceed;

	use super::*;
	use crate::backend::{InMemoryDatabase, InMemoryEnvironment, OverlayedBackend};

	type Backend<'config> = OverlayedBackend<'config, InMemoryEnvironment, InMemoryDatabase>;

	fn stop<H>(_: &mut Machine<'_>, _: &mut H, _: Opcode, _: usize) -> Control<CallCreateTrap> {
		Control::Exit(Ok(ExitSucceed::Stopped))
	}

	#[test]
	fn overridden_opcodes_leave_the_fusion_set() {
		let overrides = Overrides::<Backend<'static>>::new().with_opcode(Opcode::ADD, stop);
		let set = overrides.fusion_set(&Config::cancun());
		assert!(!set.contains(Opcode::ADD));
		assert!(set.contains(Opcode::SUB));
		assert!(set.contains(Opcode::PUSH1));
	}

	#[test]
	fn fusion_can_be_disabled() {
		let mut config = Config::cancun();
		config.enable_fusion = false;
		assert!(Overrides::<Backend<'static>>::new()
			.fusion_set(&config)
			.is_empty());
	}

	#[test]
	fn disabled_precompiles_drop_overrides_too() {
		let precompile = |_: &[u8], _: u64| arena_evm_precompile::PrecompileOutput::ok(vec![], 0);
		let overrides = Overrides::<Backend<'static>>::new()
			.with_precompile(H160::repeat_byte(0xaa), Box::new(precompile));

		let mut config = Config::cancun();
		config.enable_precompiles = false;
		assert!(overrides.into_precompiles(&config).addresses().is_empty());

		let overrides = Overrides::<Backend<'static>>::new()
			.with_precompile(H160::repeat_byte(0xaa), Box::new(precompile));
		let set = overrides.into_precompiles(&Config::cancun());
		assert_eq!(set.addresses().len(), 5);
		assert!(set.contains(&H160::repeat_byte(0xaa)));
	}
}
