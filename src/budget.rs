// ⏱️ Execution Budget - explicit timeout signal from the execution boundary
//
// The host runtime gives each request a bounded amount of compute. The
// executor asks the budget for admission before every step; a refusal is
// reported as `MergeError::ResourceExhausted` before the step touches storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::MergeStep;

pub trait ExecutionBudget {
    /// Claim budget for `step`. `false` means the budget is spent.
    fn admit(&self, step: MergeStep) -> bool;
}

/// No limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl ExecutionBudget for Unbounded {
    fn admit(&self, _step: MergeStep) -> bool {
        true
    }
}

/// Wall-clock budget measured from construction
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    deadline: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Deadline {
            deadline: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl ExecutionBudget for Deadline {
    fn admit(&self, _step: MergeStep) -> bool {
        Instant::now() < self.deadline
    }
}

/// Admits a fixed number of steps, then refuses every further step
#[derive(Debug)]
pub struct StepBudget {
    remaining: AtomicUsize,
}

impl StepBudget {
    pub fn new(steps: usize) -> Self {
        StepBudget {
            remaining: AtomicUsize::new(steps),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

impl ExecutionBudget for StepBudget {
    fn admit(&self, _step: MergeStep) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}
