use alloc::vec::Vec;

use crate::{Capture, ExitError, ExitResult, Interpreter, RunInterpreter};

/// State and return value left behind by a retired interpreter.
pub type DeconstructFor<I> = (<I as Interpreter>::State, Vec<u8>);

/// Trap raised by an interpreter running against `H`.
pub type TrapFor<H, I> = <I as RunInterpreter<H>>::Trap;

/// What the call stack should do with a freshly prepared frame.
pub enum InvokerControl<VE, VD> {
	/// Run the frame on top of the stack.
	Enter(VE),
	/// The frame finished without running, as with precompiles and
	/// early failures.
	DirectExit(VD),
}

/// Builds frames for the call stack and folds their results back.
///
/// The call stack owns the loop; the invoker owns the semantics of entering
/// and leaving a frame: gas forwarding, substates and value transfer.
pub trait Invoker<H> {
	type Interpreter: RunInterpreter<H>;
	/// Returned by the call stack when entering a frame must be suspended.
	type Interrupt;

	type TransactArgs;
	/// Kept for the whole transaction and handed back at finalization.
	type TransactInvoke;
	type TransactValue;
	/// Kept per frame and handed back when that frame retires.
	type SubstackInvoke;

	/// Validate a transaction and prepare its root frame.
	#[allow(clippy::type_complexity)]
	fn new_transact(
		&self,
		args: Self::TransactArgs,
		handler: &mut H,
	) -> Result<
		(
			Self::TransactInvoke,
			InvokerControl<Self::Interpreter, (ExitResult, DeconstructFor<Self::Interpreter>)>,
		),
		ExitError,
	>;

	/// Settle gas and fees once the root frame has retired.
	fn finalize_transact(
		&self,
		invoke: &Self::TransactInvoke,
		exit: ExitResult,
		machine: DeconstructFor<Self::Interpreter>,
		handler: &mut H,
	) -> Result<Self::TransactValue, ExitError>;

	/// Prepare the child frame `trap` asks for. `depth` is the level the child would run
	/// at, the transaction's root frame being level 0.
	#[allow(clippy::type_complexity)]
	fn enter_substack(
		&self,
		trap: TrapFor<H, Self::Interpreter>,
		machine: &mut Self::Interpreter,
		handler: &mut H,
		depth: usize,
	) -> Capture<
		Result<
			(
				Self::SubstackInvoke,
				InvokerControl<Self::Interpreter, (ExitResult, DeconstructFor<Self::Interpreter>)>,
			),
			ExitError,
		>,
		Self::Interrupt,
	>;

	/// Merge a retired child into its parent.
	fn exit_substack(
		&self,
		result: ExitResult,
		child: DeconstructFor<Self::Interpreter>,
		trap_data: Self::SubstackInvoke,
		parent: &mut Self::Interpreter,
		handler: &mut H,
	) -> Result<(), ExitError>;
}
