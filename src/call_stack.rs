use alloc::vec::Vec;
use core::convert::Infallible;

use crate::{
	invoker::{Invoker, InvokerControl},
	Capture, ExitError, ExitFatal, ExitResult, Interpreter, RunInterpreter,
};

struct Substack<M, TrD> {
	invoke: TrD,
	machine: M,
}

struct LastSubstack<M, Tr> {
	machine: M,
	status: LastSubstackStatus<Tr>,
}

enum LastSubstackStatus<Tr> {
	Running,
	Exited(Capture<ExitResult, Tr>),
}

/// Heap-based call stack, used past `heap_depth` so that deep call chains do
/// not overflow the native stack.
struct CallStack<'backend, 'invoker, H, I: Invoker<H>> {
	stack: Vec<Substack<I::Interpreter, I::SubstackInvoke>>,
	last: Option<LastSubstack<I::Interpreter, <I::Interpreter as RunInterpreter<H>>::Trap>>,
	initial_depth: usize,
	backend: &'backend mut H,
	invoker: &'invoker I,
}

impl<'backend, 'invoker, H, I> CallStack<'backend, 'invoker, H, I>
where
	I: Invoker<H, Interrupt = Infallible>,
{
	fn new(
		machine: I::Interpreter,
		initial_depth: usize,
		backend: &'backend mut H,
		invoker: &'invoker I,
	) -> Self {
		Self {
			stack: Vec::new(),
			last: Some(LastSubstack {
				machine,
				status: LastSubstackStatus::Running,
			}),
			initial_depth,
			backend,
			invoker,
		}
	}

	fn run(&mut self) -> Result<(ExitResult, I::Interpreter), ExitFatal> {
		loop {
			if let Some(ret) = self.step_run() {
				return ret;
			}
		}
	}

	fn step_run(&mut self) -> Option<Result<(ExitResult, I::Interpreter), ExitFatal>> {
		let mut step_ret = None;

		self.last = match self.last.take() {
			None => {
				step_ret = Some(Err(ExitFatal::AlreadyExited));
				None
			}
			Some(LastSubstack {
				status: LastSubstackStatus::Running,
				mut machine,
			}) => {
				let status = LastSubstackStatus::Exited(machine.run(self.backend));
				Some(LastSubstack { status, machine })
			}
			Some(LastSubstack {
				status: LastSubstackStatus::Exited(Capture::Exit(exit)),
				machine,
			}) => match self.stack.pop() {
				None => {
					step_ret = Some(Ok((exit, machine)));
					None
				}
				Some(mut upward) => {
					let feedback_result = self.invoker.exit_substack(
						exit,
						machine.deconstruct(),
						upward.invoke,
						&mut upward.machine,
						self.backend,
					);

					Some(LastSubstack {
						status: match feedback_result {
							Ok(()) => LastSubstackStatus::Running,
							Err(err) => LastSubstackStatus::Exited(Capture::Exit(Err(err))),
						},
						machine: upward.machine,
					})
				}
			},
			Some(LastSubstack {
				status: LastSubstackStatus::Exited(Capture::Trap(trap)),
				mut machine,
			}) => {
				match self.invoker.enter_substack(
					trap,
					&mut machine,
					self.backend,
					self.initial_depth + self.stack.len() + 1,
				) {
					Capture::Exit(Ok((invoke, InvokerControl::Enter(sub_machine)))) => {
						self.stack.push(Substack { invoke, machine });

						Some(LastSubstack {
							status: LastSubstackStatus::Running,
							machine: sub_machine,
						})
					}
					Capture::Exit(Ok((invoke, InvokerControl::DirectExit((exit, sub_machine))))) => {
						let feedback_result = self.invoker.exit_substack(
							exit,
							sub_machine,
							invoke,
							&mut machine,
							self.backend,
						);

						Some(LastSubstack {
							status: match feedback_result {
								Ok(()) => LastSubstackStatus::Running,
								Err(err) => LastSubstackStatus::Exited(Capture::Exit(Err(err))),
							},
							machine,
						})
					}
					Capture::Exit(Err(err)) => Some(LastSubstack {
						status: LastSubstackStatus::Exited(Capture::Exit(Err(err))),
						machine,
					}),
					Capture::Trap(infallible) => match infallible {},
				}
			}
		};

		step_ret
	}
}

fn execute<H, I>(
	mut machine: I::Interpreter,
	depth: usize,
	heap_depth: Option<usize>,
	backend: &mut H,
	invoker: &I,
) -> Result<(ExitResult, I::Interpreter), ExitFatal>
where
	I: Invoker<H, Interrupt = Infallible>,
{
	let mut result = machine.run(backend);

	loop {
		match result {
			Capture::Exit(exit) => return Ok((exit, machine)),
			Capture::Trap(trap) => {
				let feedback_result =
					match invoker.enter_substack(trap, &mut machine, backend, depth + 1) {
						Capture::Exit(Ok((invoke, InvokerControl::Enter(sub_machine)))) => {
							let (sub_result, sub_machine) =
								if heap_depth.map_or(false, |hd| depth + 1 >= hd) {
									CallStack::new(sub_machine, depth + 1, backend, invoker)
										.run()?
								} else {
									execute(sub_machine, depth + 1, heap_depth, backend, invoker)?
								};

							invoker.exit_substack(
								sub_result,
								sub_machine.deconstruct(),
								invoke,
								&mut machine,
								backend,
							)
						}
						Capture::Exit(Ok((
							invoke,
							InvokerControl::DirectExit((sub_result, sub_machine)),
						))) => invoker.exit_substack(
							sub_result,
							sub_machine,
							invoke,
							&mut machine,
							backend,
						),
						Capture::Exit(Err(err)) => Err(err),
						Capture::Trap(infallible) => match infallible {},
					};

				match feedback_result {
					Ok(()) => {
						result = machine.run(backend);
					}
					Err(err) => return Ok((Err(err), machine)),
				}
			}
		}
	}
}

/// Initiate a transaction, using a hybrid call stack.
///
/// Up until `heap_depth`, frames recurse on the native stack, which is faster
/// but bounded by the platform's stack size. Deeper frames are driven by a
/// heap-based call stack. If `heap_depth` is `None`, then always use the
/// native stack.
pub fn transact<H, I>(
	args: I::TransactArgs,
	heap_depth: Option<usize>,
	backend: &mut H,
	invoker: &I,
) -> Result<I::TransactValue, ExitError>
where
	I: Invoker<H, Interrupt = Infallible>,
{
	let (transact_invoke, control) = invoker.new_transact(args, backend)?;

	match control {
		InvokerControl::Enter(machine) => {
			let (ret, machine) = execute(machine, 0, heap_depth, backend, invoker)?;
			let machine = machine.deconstruct();
			invoker.finalize_transact(&transact_invoke, ret, machine, backend)
		}
		InvokerControl::DirectExit((exit, machine)) => {
			invoker.finalize_transact(&transact_invoke, exit, machine, backend)
		}
	}
}
