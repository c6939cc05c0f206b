/// Tick backoff after consecutive inference failures.
///
/// After the n-th failure in a row, the next `min(2^(n-1) - 1, max_skip)`
/// ticks skip dispatch: 0, 1, 3, 7, 15, ... A success resets the schedule.
#[derive(Clone, Debug)]
pub struct FailureBackoff {
    consecutive_failures: u32,
    skip_remaining: u32,
    max_skip: u32,
}

impl FailureBackoff {
    pub fn new(max_skip: u32) -> Self {
        Self {
            consecutive_failures: 0,
            skip_remaining: 0,
            max_skip,
        }
    }

    /// Records a failure and returns how many ticks will now be skipped.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.skip_remaining = 1u32
            .checked_shl(self.consecutive_failures - 1)
            .map_or(u32::MAX, |v| v - 1)
            .min(self.max_skip);
        self.skip_remaining
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.skip_remaining = 0;
    }

    /// Consumes one skipped tick, if any are pending.
    pub fn should_skip(&mut self) -> bool {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
