//! Difficulty schedule for Kestrel
//!
//! Targets shrink in steps: every `every_x_blocks` blocks the divisor grows
//! and is raised to `curve`, so the target falls off polynomially with
//! height.

/// Largest integer a double can hold exactly (2^53 - 1).
pub const BASE_DIFFICULTY: u64 = 9_007_199_254_740_991;

/// Blocks per difficulty step
const EVERY_X_BLOCKS: u64 = 5;

/// Exponent applied to the step count
const POW_CURVE: u32 = 5;

/// Height-based difficulty schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultySchedule {
    /// Target at height zero
    base: u64,
    /// Blocks per step
    every_x_blocks: u64,
    /// Exponent applied to the step count
    curve: u32,
}

impl DifficultySchedule {
    /// Create the schedule with default parameters
    pub const fn new() -> Self {
        Self {
            base: BASE_DIFFICULTY,
            every_x_blocks: EVERY_X_BLOCKS,
            curve: POW_CURVE,
        }
    }

    /// Create a schedule with custom parameters
    pub const fn with_params(base: u64, every_x_blocks: u64, curve: u32) -> Self {
        Self {
            base,
            every_x_blocks,
            curve,
        }
    }

    /// A schedule that never tightens, for tests and devnets.
    pub const fn constant(target: u64) -> Self {
        Self {
            base: target,
            every_x_blocks: u64::MAX,
            curve: 1,
        }
    }

    /// Target for the block at `index`.
    pub fn difficulty_at(&self, index: u64) -> u64 {
        let steps = index.saturating_add(1) / self.every_x_blocks.max(1);
        let divisor = steps.saturating_add(1).saturating_pow(self.curve);
        self.base / divisor
    }
}

impl Default for DifficultySchedule {
    fn default() -> Self {
        Self::new()
    }
}
