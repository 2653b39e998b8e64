use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread::{self, ThreadId},
};

use crossbeam::utils::Backoff;
use parking_lot::{Mutex, RwLock};

const STATE_EMPTY: usize = 0; // No value, nobody is computing
const STATE_COMPUTING: usize = 1; // Value is being computed (should not compute nor read)
const STATE_READY: usize = 2; // Value is present and never changes again

/// Thread-safe write-once slot with fail-open initialization.
///
/// The first caller of [`LazySlot::get_or_try_init`] runs the computation while every other
/// caller waits. On success the value is cached forever; on failure (or panic) the slot returns
/// to its empty state and the next caller computes again.
///
/// Calling [`LazySlot::get_or_try_init`] on the same slot from inside its own computation fails
/// with the error built by `reentered` instead of waiting for itself.
pub struct LazySlot<T> {
    elem: RwLock<Option<T>>,
    state: AtomicUsize,
    // Thread running the computation, set while the state is COMPUTING
    owner: Mutex<Option<ThreadId>>,
}

/// Returns the slot to [`STATE_EMPTY`] if the computation unwinds.
struct ResetOnDrop<'a> {
    state: &'a AtomicUsize,
    owner: &'a Mutex<Option<ThreadId>>,
    armed: bool,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.owner.lock() = None;
            self.state.store(STATE_EMPTY, Ordering::Release);
        }
    }
}

impl<T: Clone> Default for LazySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LazySlot<T> {
    pub const fn new() -> Self {
        Self {
            elem: RwLock::new(None),
            state: AtomicUsize::new(STATE_EMPTY),
            owner: Mutex::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_READY
    }

    /// Cached value, without computing or waiting.
    pub fn peek(&self) -> Option<T> {
        if self.is_ready() {
            self.elem.read().clone()
        } else {
            None
        }
    }

    pub fn get_or_try_init<E>(
        &self,
        compute: impl FnOnce() -> Result<T, E>,
        reentered: impl FnOnce() -> E,
    ) -> Result<T, E> {
        // Here is the logic:
        // - If the state is READY, return the value
        // - If the state is EMPTY, compute the value and set the state to READY (or back to EMPTY)
        // - If the state is COMPUTING on this thread, fail with `reentered`
        // - If the state is COMPUTING on another thread, wait
        let backoff = Backoff::new();
        let current = thread::current().id();

        loop {
            match self.state.load(Ordering::Acquire) {
                STATE_READY => {
                    if let Some(value) = self.elem.read().as_ref() {
                        return Ok(value.clone());
                    }
                }
                STATE_EMPTY => {
                    if self
                        .state
                        .compare_exchange(
                            STATE_EMPTY,
                            STATE_COMPUTING,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        *self.owner.lock() = Some(current);
                        let mut reset = ResetOnDrop {
                            state: &self.state,
                            owner: &self.owner,
                            armed: true,
                        };

                        // The lock is not held while computing, other slots may be resolved
                        // from inside `compute`.
                        let value = compute()?;
                        *self.elem.write() = Some(value.clone());

                        // Cleared before leaving COMPUTING, the next owner may set it right after
                        *self.owner.lock() = None;
                        reset.armed = false;
                        self.state.store(STATE_READY, Ordering::Release);
                        return Ok(value);
                    }
                }
                _ => {
                    if *self.owner.lock() == Some(current) {
                        return Err(reentered());
                    }

                    // Wait until the state is either EMPTY or READY
                    backoff.snooze();
                }
            }
        }
    }
}
