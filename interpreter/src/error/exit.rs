use alloc::borrow::Cow;
use core::fmt;

use crate::{arena::ArenaError, opcode::Opcode};

/// Exit result.
pub type ExitResult = Result<ExitSucceed, ExitError>;

/// Exit reason.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitError {
	/// Machine returns a normal EVM error.
	Exception(ExitException),
	/// Machine encountered an explicit revert.
	Reverted,
	/// Machine encountered an error that aborts the whole transaction, such
	/// as a failing backend or an exhausted loop quota.
	Fatal(ExitFatal),
}

impl ExitError {
	/// Whether the error aborts the whole transaction.
	#[must_use]
	pub const fn is_fatal(&self) -> bool {
		matches!(self, Self::Fatal(_))
	}
}

impl From<ExitError> for ExitResult {
	fn from(s: ExitError) -> Self {
		Err(s)
	}
}

impl fmt::Display for ExitError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Exception(e) => write!(f, "exception: {e}"),
			Self::Reverted => f.write_str("reverted"),
			Self::Fatal(e) => write!(f, "fatal: {e}"),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for ExitError {}

/// Exit succeed reason.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitSucceed {
	/// Machine encountered an explicit stop.
	Stopped,
	/// Machine encountered an explicit return.
	Returned,
	/// Machine encountered an explicit suicide.
	Suicided,
}

impl From<ExitSucceed> for ExitResult {
	fn from(s: ExitSucceed) -> Self {
		Ok(s)
	}
}

/// Exit error reason. Terminates the current frame only, consuming all of
/// its gas.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitException {
	/// Trying to pop from an empty stack.
	StackUnderflow,
	/// Trying to push into a stack over stack limit.
	StackOverflow,
	/// Jump destination is invalid.
	InvalidJump,
	/// An opcode accesses memory region, but the region is invalid.
	InvalidRange,
	/// Encountered the designated invalid opcode.
	DesignatedInvalid,
	/// Call stack is too deep.
	CallDepthExceeded,
	/// Create opcode encountered collision.
	CreateCollision,
	/// Deployed code exceeds the configured bytecode size.
	CreateContractLimit,
	/// Deployed code starts with the reserved `0xEF` byte.
	InvalidCode,
	/// Init code exceeds the configured limit.
	InitcodeTooLarge,
	/// Transaction input exceeds the configured limit.
	InputTooLarge,
	/// Opcode not enabled in the current configuration.
	InvalidOpcode(Opcode),
	/// An opcode accesses external information, but the request is off offset
	/// limit.
	OutOfOffset,
	/// Execution runs out of gas.
	OutOfGas,
	/// Not enough fund to start the execution.
	OutOfFund,
	/// Memory expansion past the configured memory limit.
	MemoryLimitExceeded,
	/// The arena could not provide backing storage for memory expansion.
	OutOfMemory,
	/// State modification attempted inside a static call.
	StaticModeViolation,
	/// Nonce reached maximum value of 2^64-1.
	MaxNonce,
	/// A precompile reported failure.
	PrecompileFailed,
	/// Transaction gas limit above the block gas limit.
	BlockGasLimitExceeded,
	/// Operation not supported by this frame.
	NotSupported,
}

impl From<ExitException> for ExitResult {
	fn from(s: ExitException) -> Self {
		Err(ExitError::Exception(s))
	}
}

impl From<ExitException> for ExitError {
	fn from(s: ExitException) -> Self {
		Self::Exception(s)
	}
}

impl From<ArenaError> for ExitException {
	fn from(_: ArenaError) -> Self {
		Self::OutOfMemory
	}
}

impl From<ArenaError> for ExitError {
	fn from(e: ArenaError) -> Self {
		Self::Exception(e.into())
	}
}

impl fmt::Display for ExitException {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidOpcode(opcode) => write!(f, "invalid opcode 0x{:02x}", opcode.as_u8()),
			Self::StackUnderflow => f.write_str("stack underflow"),
			Self::StackOverflow => f.write_str("stack overflow"),
			Self::InvalidJump => f.write_str("invalid jump destination"),
			Self::InvalidRange => f.write_str("invalid memory range"),
			Self::DesignatedInvalid => f.write_str("designated invalid opcode"),
			Self::CallDepthExceeded => f.write_str("call depth exceeded"),
			Self::CreateCollision => f.write_str("create collision"),
			Self::CreateContractLimit => f.write_str("contract size limit exceeded"),
			Self::InvalidCode => f.write_str("invalid code prefix"),
			Self::InitcodeTooLarge => f.write_str("init code too large"),
			Self::InputTooLarge => f.write_str("input too large"),
			Self::OutOfOffset => f.write_str("out of offset"),
			Self::OutOfGas => f.write_str("out of gas"),
			Self::OutOfFund => f.write_str("out of fund"),
			Self::MemoryLimitExceeded => f.write_str("memory limit exceeded"),
			Self::OutOfMemory => f.write_str("out of memory"),
			Self::StaticModeViolation => f.write_str("state modification in static call"),
			Self::MaxNonce => f.write_str("nonce overflow"),
			Self::PrecompileFailed => f.write_str("precompile failed"),
			Self::BlockGasLimitExceeded => f.write_str("gas limit above block gas limit"),
			Self::NotSupported => f.write_str("not supported"),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for ExitException {}

/// Exit fatal reason. Aborts the whole transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitFatal {
	/// The configured loop quota was exhausted.
	LoopQuotaExceeded,
	/// The database backend failed.
	Database(Cow<'static, str>),
	/// The operation is not supported.
	NotSupported,
	/// Already exited.
	AlreadyExited,
	/// Unfinished execution.
	Unfinished,
	/// A substate was popped without a matching push.
	UnevenSubstate,
	/// Other fatal errors.
	Other(Cow<'static, str>),
}

impl From<ExitFatal> for ExitResult {
	fn from(s: ExitFatal) -> Self {
		Err(ExitError::Fatal(s))
	}
}

impl From<ExitFatal> for ExitError {
	fn from(s: ExitFatal) -> Self {
		Self::Fatal(s)
	}
}

impl fmt::Display for ExitFatal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::LoopQuotaExceeded => f.write_str("loop quota exceeded"),
			Self::Database(msg) => write!(f, "database: {msg}"),
			Self::NotSupported => f.write_str("not supported"),
			Self::AlreadyExited => f.write_str("already exited"),
			Self::Unfinished => f.write_str("unfinished"),
			Self::UnevenSubstate => f.write_str("uneven substate"),
			Self::Other(msg) => f.write_str(msg),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for ExitFatal {}
