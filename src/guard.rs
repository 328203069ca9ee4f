//! Reentrancy and thread-affinity guard
//!
//! A processor's stacks are unsynchronized. The guard binds the processor to
//! the first thread that enters it and rejects entry from any other thread
//! until the nesting depth drops back to zero. Reentry from the owning thread
//! (script calls host, host calls back into script) just deepens the nesting.
//!
//! This is an identity check, not a lock: a second thread fails fast instead
//! of waiting.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::warn;

use crate::error::{Result, ScriptError};

const UNBOUND: u64 = 0;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Small process-unique id of the calling OS thread (never 0)
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

#[derive(Debug, Default)]
pub struct ExecutionGuard {
    owner: AtomicU64,
    nesting: AtomicUsize,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        ExecutionGuard::default()
    }

    /// Enter on the calling thread, returning the new nesting depth
    ///
    /// Fails with `CrossThreadAccess` without changing any state when another
    /// thread currently owns the guard.
    pub fn enter(&self) -> Result<usize> {
        let caller = current_thread_id();

        if let Err(owner) =
            self.owner
                .compare_exchange(UNBOUND, caller, Ordering::AcqRel, Ordering::Acquire)
        {
            if owner != caller {
                warn!(owner, caller, "rejected processor entry from a second thread");
                return Err(ScriptError::CrossThreadAccess { owner, caller });
            }
        }

        Ok(self.nesting.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Leave one level; returns true on the outermost exit (1 -> 0)
    ///
    /// The outermost exit unbinds the owner so the next call may come from
    /// another thread.
    pub fn leave(&self) -> bool {
        let previous = self
            .nesting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.owner.store(UNBOUND, Ordering::Release);
                true
            }
            Ok(_) => false,
            Err(_) => {
                debug_assert!(false, "leave() without matching enter()");
                false
            }
        }
    }

    pub fn nesting(&self) -> usize {
        self.nesting.load(Ordering::Acquire)
    }

    /// Owning thread id, if bound
    pub fn owner(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            UNBOUND => None,
            id => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_reentry_on_same_thread() {
        let guard = ExecutionGuard::new();
        assert_eq!(guard.enter(), Ok(1));
        assert_eq!(guard.enter(), Ok(2));
        assert_eq!(guard.owner(), Some(current_thread_id()));

        assert!(!guard.leave());
        assert_eq!(guard.nesting(), 1);
        assert!(guard.leave());
        assert_eq!(guard.nesting(), 0);
        assert_eq!(guard.owner(), None);
    }

    #[test]
    fn test_second_thread_rejected_while_owned() {
        let guard = ExecutionGuard::new();
        guard.enter().unwrap();
        let owner = current_thread_id();

        let result = thread::scope(|s| s.spawn(|| guard.enter()).join().unwrap());

        let Err(ScriptError::CrossThreadAccess { owner: seen, caller }) = result else {
            unreachable!("Expected CrossThreadAccess");
        };
        assert_eq!(seen, owner);
        assert_ne!(caller, owner);

        // Rejected entry left the guard untouched
        assert_eq!(guard.nesting(), 1);
        assert_eq!(guard.owner(), Some(owner));
        assert!(guard.leave());
    }

    #[test]
    fn test_rebind_after_outermost_exit() {
        let guard = ExecutionGuard::new();
        guard.enter().unwrap();
        guard.leave();

        let entered = thread::scope(|s| {
            s.spawn(|| {
                let depth = guard.enter();
                guard.leave();
                depth
            })
            .join()
            .unwrap()
        });

        assert_eq!(entered, Ok(1));
        assert_eq!(guard.nesting(), 0);
    }

    #[test]
    fn test_thread_ids_are_distinct() {
        let here = current_thread_id();
        let there = thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
        assert_ne!(here, 0);
    }
}
