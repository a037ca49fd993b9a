use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use crate::{
	error::{Capture, ExitError, ExitException, ExitResult, ExitSucceed},
	etable::{Control, EtableSet},
	interpreter::{FusionMap, FusionSet, Interpreter, RunInterpreter, StepInterpreter, Valids},
	machine::{Machine, Stack},
	opcode::Opcode,
	safety::LoopSafetyCounter,
};

/// Interpreter dispatching every opcode through an [EtableSet].
pub struct EtableInterpreter<'etable, S, ES> {
	valids: Valids,
	fusion: FusionMap,
	loop_counter: LoopSafetyCounter,
	position: usize,
	machine: Machine<S>,
	etable: &'etable ES,
}

impl<'etable, S, ES> AsRef<Machine<S>> for EtableInterpreter<'etable, S, ES> {
	fn as_ref(&self) -> &Machine<S> {
		&self.machine
	}
}

impl<'etable, S, ES> AsMut<Machine<S>> for EtableInterpreter<'etable, S, ES> {
	fn as_mut(&mut self) -> &mut Machine<S> {
		&mut self.machine
	}
}

impl<'etable, S, ES> Deref for EtableInterpreter<'etable, S, ES> {
	type Target = Machine<S>;

	fn deref(&self) -> &Machine<S> {
		&self.machine
	}
}

impl<'etable, S, ES> DerefMut for EtableInterpreter<'etable, S, ES> {
	fn deref_mut(&mut self) -> &mut Machine<S> {
		&mut self.machine
	}
}

impl<'etable, S, ES> EtableInterpreter<'etable, S, ES> {
	/// Return a reference of the program counter.
	pub const fn position(&self) -> usize {
		self.position
	}

	/// Interpreter without fusion and without a loop quota.
	pub fn new(machine: Machine<S>, etable: &'etable ES) -> Self {
		let valids = Valids::new(&machine.code[..]);

		Self {
			machine,
			valids,
			fusion: FusionMap::default(),
			loop_counter: LoopSafetyCounter::Disabled,
			position: 0,
			etable,
		}
	}

	/// Fuse `PUSHn` + binary op pairs whose opcodes are all in `set`.
	#[must_use]
	pub fn with_fusion(mut self, set: &FusionSet) -> Self {
		self.fusion = FusionMap::new(&self.machine.code[..], set);
		self
	}

	/// Count taken jumps against `counter`.
	#[must_use]
	pub fn with_loop_counter(mut self, counter: LoopSafetyCounter) -> Self {
		self.loop_counter = counter;
		self
	}

	/// Taken jumps so far.
	pub const fn loop_counter(&self) -> &LoopSafetyCounter {
		&self.loop_counter
	}

	/// Explicit exit of the machine. Further step will return error.
	pub fn exit(&mut self) {
		self.position = self.machine.code.len();
	}

	/// Inspect the machine's next opcode and current stack.
	pub fn inspect(&self) -> Option<(Opcode, &Stack)> {
		self.machine
			.code
			.get(self.position)
			.map(|v| (Opcode(*v), &self.machine.stack))
	}

	/// Perform any operation. If the operation fails, then set the machine
	/// status to already exited.
	pub fn perform<R, F: FnOnce(&mut Self) -> Result<R, ExitError>>(
		&mut self,
		f: F,
	) -> Result<R, ExitError> {
		match f(self) {
			Ok(r) => Ok(r),
			Err(e) => {
				self.exit();
				Err(e)
			}
		}
	}

	/// Pick the next opcode.
	pub fn peek_opcode(&self) -> Option<Opcode> {
		self.machine
			.code
			.get(self.position)
			.map(|opcode| Opcode(*opcode))
	}
}

impl<'etable, S, ES> Interpreter for EtableInterpreter<'etable, S, ES> {
	type State = S;

	fn machine(&self) -> &Machine<S> {
		&self.machine
	}

	fn machine_mut(&mut self) -> &mut Machine<S> {
		&mut self.machine
	}

	fn deconstruct(self) -> (S, Vec<u8>) {
		(self.machine.state, self.machine.retval)
	}

	fn advance(&mut self) {
		if self.position == self.machine.code.len() {
			return;
		}

		self.position += 1;
	}
}

impl<'etable, S, H, ES> RunInterpreter<H> for EtableInterpreter<'etable, S, ES>
where
	ES: EtableSet<State = S, Handle = H>,
{
	type Trap = ES::Trap;

	fn run(&mut self, handle: &mut H) -> Capture<ExitResult, Self::Trap> {
		loop {
			match self.step(handle) {
				Ok(()) => (),
				Err(res) => return res,
			}
		}
	}
}

impl<'etable, S, H, ES> StepInterpreter<H> for EtableInterpreter<'etable, S, ES>
where
	ES: EtableSet<State = S, Handle = H>,
{
	#[inline]
	fn step(&mut self, handle: &mut H) -> Result<(), Capture<ExitResult, ES::Trap>> {
		let position = self.position;
		if position >= self.machine.code.len() {
			return Err(Capture::Exit(ExitSucceed::Stopped.into()));
		}

		let (control, next) =
			if let Some(op_position) = self.fusion.fused_op(&self.machine.code[..], position) {
				log::trace!(
					target: "evm",
					"fused {} {} at {}",
					Opcode(self.machine.code[position]),
					Opcode(self.machine.code[op_position]),
					position,
				);
				(
					self.etable
						.eval_fused(&mut self.machine, handle, position, op_position),
					op_position + 1,
				)
			} else {
				let opcode = Opcode(self.machine.code[position]);
				log::trace!(target: "evm", "{} at {}", opcode, position);
				(
					self.etable.eval(&mut self.machine, handle, opcode, position),
					position + 1,
				)
			};

		match control {
			Control::Continue => {
				self.position = next;
			}
			Control::ContinueN(n) => {
				self.position = position + n;
			}
			Control::Exit(e) => {
				self.exit();
				return Err(Capture::Exit(e));
			}
			Control::Jump(p) => {
				if let Err(e) = self.loop_counter.increment() {
					self.exit();
					return Err(Capture::Exit(Err(e)));
				}

				if self.valids.is_valid(p) {
					self.position = p;
				} else {
					self.exit();
					return Err(Capture::Exit(ExitException::InvalidJump.into()));
				}
			}
			Control::Trap(trap) => return Err(Capture::Trap(trap)),
		};

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use alloc::{rc::Rc, vec, vec::Vec};

	use primitive_types::U256;

	use super::*;
	use crate::{
		arena::GrowingArena,
		error::ExitFatal,
		etable::Etable,
		machine::FrameConfig,
	};

	fn machine(code: Vec<u8>) -> Machine<()> {
		Machine::new(
			Rc::new(code),
			Rc::new(Vec::new()),
			&FrameConfig::default(),
			GrowingArena::shared(1024, 1 << 16, 200).unwrap(),
			(),
		)
	}

	#[test]
	fn runs_to_implicit_stop() {
		let etable = Etable::<(), (), ()>::core();
		// PUSH1 3 PUSH1 4 MUL
		let mut vm = EtableInterpreter::new(machine(vec![0x60, 0x03, 0x60, 0x04, 0x02]), &etable);

		assert_eq!(vm.run(&mut ()), Capture::Exit(Ok(ExitSucceed::Stopped)));
		assert_eq!(vm.stack.data(), &[U256::from(12)]);
	}

	#[test]
	fn invalid_jump_is_rejected() {
		let etable = Etable::<(), (), ()>::core();
		// PUSH1 3 JUMP PUSH1 0x5b
		let mut vm = EtableInterpreter::new(machine(vec![0x60, 0x03, 0x56, 0x60, 0x5b]), &etable);

		assert_eq!(
			vm.run(&mut ()),
			Capture::Exit(Err(ExitException::InvalidJump.into()))
		);
		assert_eq!(vm.position(), 5);
	}

	#[test]
	fn fused_and_plain_runs_agree() {
		let etable = Etable::<(), (), ()>::core();
		// PUSH1 1 PUSH1 2 ADD PUSH1 7 SUB PUSH1 3 MUL PUSH1 0 MSTORE
		let code = vec![
			0x60, 0x01, 0x60, 0x02, 0x01, 0x60, 0x07, 0x03, 0x60, 0x03, 0x02, 0x60, 0x00, 0x52,
		];

		let mut plain = EtableInterpreter::new(machine(code.clone()), &etable);
		let mut fused =
			EtableInterpreter::new(machine(code), &etable).with_fusion(&FusionSet::standard());

		assert_eq!(plain.run(&mut ()), fused.run(&mut ()));
		assert_eq!(plain.stack.data(), fused.stack.data());
		assert_eq!(plain.memory.data(), fused.memory.data());
		assert_eq!(fused.memory.get_word(0), U256::from(12));
	}

	#[test]
	fn loop_quota_stops_infinite_loop() {
		let etable = Etable::<(), (), ()>::core();
		// JUMPDEST PUSH1 0 JUMP
		let mut vm = EtableInterpreter::new(machine(vec![0x5b, 0x60, 0x00, 0x56]), &etable)
			.with_loop_counter(LoopSafetyCounter::new(Some(10)));

		assert_eq!(
			vm.run(&mut ()),
			Capture::Exit(Err(ExitFatal::LoopQuotaExceeded.into()))
		);
		assert_eq!(vm.loop_counter().count(), 10);
	}
}
