//! Logical clock and delayed-task scheduler.
//!
//! DESIGN
//! ======
//! Every timeout decision uses `LogicalTime`, the virtual clock the replicated
//! runtime shares across replicas. Wall-clock time never enters the core.
//!
//! The `Scheduler` keys tasks by `(due, sequence)`. Tasks due at the same
//! instant run in the order they were scheduled, so every replica fires them
//! identically. Periodic work is re-armed by the caller after each run,
//! relative to the time it actually ran, never on a fixed grid.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// LOGICAL TIME
// =============================================================================

/// Logical milliseconds since session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalTime(u64);

impl LogicalTime {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Elapsed logical milliseconds since `earlier`. Saturates at zero.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// `ms` later, or `None` past the end of logical time.
    #[must_use]
    pub const fn after(self, ms: u64) -> Option<Self> {
        match self.0.checked_add(ms) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

impl fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Pending delayed tasks ordered by due time, then by scheduling order.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    pending: BTreeMap<(LogicalTime, u64), T>,
    next_seq: u64,
}

impl<T> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { pending: BTreeMap::new(), next_seq: 0 }
    }

    /// Schedule `task` to run once the clock reaches `due`.
    pub fn schedule_at(&mut self, due: LogicalTime, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((due, seq), task);
    }

    /// Remove and return the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: LogicalTime) -> Option<(LogicalTime, T)> {
        let (&(due, _), _) = self.pending.first_key_value()?;
        if due > now {
            return None;
        }
        self.pending
            .pop_first()
            .map(|((due, _), task)| (due, task))
    }

    /// Due time of the earliest pending task.
    #[must_use]
    pub fn next_due(&self) -> Option<LogicalTime> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending task matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) {
        self.pending.retain(|_, task| !pred(task));
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "clock_test.rs"]
mod tests;
