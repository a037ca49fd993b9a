//! Iteration and depth bookkeeping sized to the configured limits.

use crate::error::{ExitError, ExitFatal};

/// Smallest unsigned width able to hold a configured bound.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DepthType {
	/// `u8`
	U8,
	/// `u16`
	U16,
	/// `u32`
	U32,
	/// `u64`
	U64,
}

impl DepthType {
	/// Select the smallest width representing `bound`.
	#[must_use]
	pub const fn for_bound(bound: u64) -> Self {
		if bound <= u8::MAX as u64 {
			Self::U8
		} else if bound <= u16::MAX as u64 {
			Self::U16
		} else if bound <= u32::MAX as u64 {
			Self::U32
		} else {
			Self::U64
		}
	}

	/// Number of bits of the width.
	#[must_use]
	pub const fn bits(&self) -> u32 {
		match self {
			Self::U8 => 8,
			Self::U16 => 16,
			Self::U32 => 32,
			Self::U64 => 64,
		}
	}
}

/// Counter of taken jumps, aborting execution once a quota is exceeded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopSafetyCounter {
	/// No quota, never fails.
	Disabled,
	/// Counter stored as `u8`.
	U8 { count: u8, quota: u8 },
	/// Counter stored as `u16`.
	U16 { count: u16, quota: u16 },
	/// Counter stored as `u32`.
	U32 { count: u32, quota: u32 },
	/// Counter stored as `u64`.
	U64 { count: u64, quota: u64 },
}

impl Default for LoopSafetyCounter {
	fn default() -> Self {
		Self::Disabled
	}
}

macro_rules! increment_or_exceed {
	($count:expr, $quota:expr) => {{
		if *$count >= *$quota {
			return Err(ExitFatal::LoopQuotaExceeded.into());
		}
		*$count += 1;
		Ok(())
	}};
}

impl LoopSafetyCounter {
	/// Counter for an optional quota, sized to the smallest width holding it.
	#[must_use]
	pub const fn new(quota: Option<u64>) -> Self {
		match quota {
			None => Self::Disabled,
			Some(quota) => match DepthType::for_bound(quota) {
				DepthType::U8 => Self::U8 {
					count: 0,
					quota: quota as u8,
				},
				DepthType::U16 => Self::U16 {
					count: 0,
					quota: quota as u16,
				},
				DepthType::U32 => Self::U32 {
					count: 0,
					quota: quota as u32,
				},
				DepthType::U64 => Self::U64 { count: 0, quota },
			},
		}
	}

	/// Whether a quota is enforced.
	#[must_use]
	pub const fn is_enabled(&self) -> bool {
		!matches!(self, Self::Disabled)
	}

	/// Width used for the counter, if enabled.
	#[must_use]
	pub const fn depth_type(&self) -> Option<DepthType> {
		match self {
			Self::Disabled => None,
			Self::U8 { .. } => Some(DepthType::U8),
			Self::U16 { .. } => Some(DepthType::U16),
			Self::U32 { .. } => Some(DepthType::U32),
			Self::U64 { .. } => Some(DepthType::U64),
		}
	}

	/// Iterations counted so far.
	#[must_use]
	pub const fn count(&self) -> u64 {
		match self {
			Self::Disabled => 0,
			Self::U8 { count, .. } => *count as u64,
			Self::U16 { count, .. } => *count as u64,
			Self::U32 { count, .. } => *count as u64,
			Self::U64 { count, .. } => *count,
		}
	}

	/// Record one taken jump.
	#[inline]
	pub fn increment(&mut self) -> Result<(), ExitError> {
		match self {
			Self::Disabled => Ok(()),
			Self::U8 { count, quota } => increment_or_exceed!(count, quota),
			Self::U16 { count, quota } => increment_or_exceed!(count, quota),
			Self::U32 { count, quota } => increment_or_exceed!(count, quota),
			Self::U64 { count, quota } => increment_or_exceed!(count, quota),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn depth_type_selects_smallest_width() {
		assert_eq!(DepthType::for_bound(0), DepthType::U8);
		assert_eq!(DepthType::for_bound(255), DepthType::U8);
		assert_eq!(DepthType::for_bound(256), DepthType::U16);
		assert_eq!(DepthType::for_bound(1024), DepthType::U16);
		assert_eq!(DepthType::for_bound(70_000), DepthType::U32);
		assert_eq!(DepthType::for_bound(u64::MAX), DepthType::U64);
	}

	#[test]
	fn counter_sized_to_quota() {
		assert_eq!(LoopSafetyCounter::new(None), LoopSafetyCounter::Disabled);
		assert_eq!(
			LoopSafetyCounter::new(Some(100)).depth_type(),
			Some(DepthType::U8)
		);
		assert_eq!(
			LoopSafetyCounter::new(Some(1_000_000)).depth_type(),
			Some(DepthType::U32)
		);
	}

	#[test]
	fn counter_fails_after_quota() {
		let mut counter = LoopSafetyCounter::new(Some(3));
		for _ in 0..3 {
			counter.increment().unwrap();
		}
		assert_eq!(counter.count(), 3);
		assert_eq!(
			counter.increment(),
			Err(ExitFatal::LoopQuotaExceeded.into())
		);

		let mut disabled = LoopSafetyCounter::Disabled;
		for _ in 0..1000 {
			disabled.increment().unwrap();
		}
	}
}
