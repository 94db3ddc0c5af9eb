//! Cancelable delayed restore of the instruction text.
//!
//! At most one restore is pending at any time. Scheduling a new one replaces
//! the previous one, and every handle carries a generation number so a stale
//! handle can never cancel or fire a newer restore.

use serde::{Deserialize, Serialize};

/// Identifies one scheduled restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestoreHandle(u64);

impl RestoreHandle {
    /// Generation number of the handle.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    handle: RestoreHandle,
    due_at_ms: u64,
}

/// Single-slot scheduler for the delayed restore.
#[derive(Debug, Clone, Default)]
pub struct DelayedRestore {
    pending: Option<Pending>,
    generation: u64,
}

impl DelayedRestore {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a restore at `due_at_ms`, replacing any pending one.
    pub fn schedule(&mut self, due_at_ms: u64) -> RestoreHandle {
        self.generation += 1;
        let handle = RestoreHandle(self.generation);
        self.pending = Some(Pending { handle, due_at_ms });
        handle
    }

    /// Cancels whatever is pending. Returns `true` if something was cancelled.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Cancels `handle` only if it is still the pending restore.
    pub fn cancel_handle(&mut self, handle: RestoreHandle) -> bool {
        if self.pending.is_some_and(|p| p.handle == handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Deadline of the pending restore.
    #[must_use]
    pub fn due_at(&self) -> Option<u64> {
        self.pending.map(|p| p.due_at_ms)
    }

    /// Handle of the pending restore.
    #[must_use]
    pub fn pending(&self) -> Option<RestoreHandle> {
        self.pending.map(|p| p.handle)
    }

    /// Removes and returns the pending restore if it is due at `now_ms`.
    pub fn take_due(&mut self, now_ms: u64) -> Option<RestoreHandle> {
        match self.pending {
            Some(p) if p.due_at_ms <= now_ms => {
                self.pending = None;
                Some(p.handle)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_and_take_due() {
        let mut restore = DelayedRestore::new();
        let handle = restore.schedule(2000);
        assert_eq!(restore.take_due(1999), None);
        assert_eq!(restore.take_due(2000), Some(handle));
        assert_eq!(restore.take_due(5000), None);
    }

    #[test]
    fn test_schedule_replaces_pending() {
        let mut restore = DelayedRestore::new();
        let first = restore.schedule(2000);
        let second = restore.schedule(3000);
        assert_ne!(first, second);
        assert_eq!(restore.pending(), Some(second));
        assert_eq!(restore.take_due(2500), None);
        assert_eq!(restore.take_due(3000), Some(second));
    }

    #[test]
    fn test_cancel() {
        let mut restore = DelayedRestore::new();
        restore.schedule(2000);
        assert!(restore.cancel());
        assert!(!restore.cancel());
        assert_eq!(restore.take_due(10_000), None);
    }

    #[test]
    fn test_stale_handle_cannot_cancel_newer_restore() {
        let mut restore = DelayedRestore::new();
        let stale = restore.schedule(2000);
        let fresh = restore.schedule(4000);
        assert!(!restore.cancel_handle(stale));
        assert_eq!(restore.pending(), Some(fresh));
        assert!(restore.cancel_handle(fresh));
        assert!(restore.pending().is_none());
    }

    #[test]
    fn test_generations_increase() {
        let mut restore = DelayedRestore::new();
        let a = restore.schedule(1);
        restore.cancel();
        let b = restore.schedule(1);
        assert!(b.generation() > a.generation());
    }
}
