//! The engine's recursive access lock and the unlockers used around waits.
//!
//! All statement execution happens under one recursive lock. A thread that
//! has to block (waiting for a lock held by another transaction, or for an
//! answer from the error handler) must not keep that lock while it sleeps,
//! so the unlockers here release every recursion level, wait, and restore
//! exactly the same depth afterwards.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Recursive mutex with an observable per-owner depth.
#[derive(Debug, Default)]
pub struct EngineLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl EngineLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> EngineLockGuard<'_> {
        self.acquire(1);
        EngineLockGuard { lock: self }
    }

    /// Recursion depth held by the calling thread.
    pub fn depth(&self) -> usize {
        let state = lock_unpoisoned(&self.state);
        match state.owner {
            Some(owner) if owner == thread::current().id() => state.depth,
            _ => 0,
        }
    }

    fn acquire(&self, count: usize) {
        if count == 0 {
            return;
        }
        let me = thread::current().id();
        let mut state = lock_unpoisoned(&self.state);
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = count;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += count;
                    return;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn release(&self) {
        let mut state = lock_unpoisoned(&self.state);
        if state.owner != Some(thread::current().id()) {
            return;
        }
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }

    /// Drop every level held by the calling thread and return how many.
    fn release_all(&self) -> usize {
        let mut state = lock_unpoisoned(&self.state);
        if state.owner != Some(thread::current().id()) {
            return 0;
        }
        let depth = state.depth;
        state.depth = 0;
        state.owner = None;
        self.released.notify_one();
        depth
    }
}

pub struct EngineLockGuard<'a> {
    lock: &'a EngineLock,
}

impl Drop for EngineLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Fully releases the engine lock while a condition is awaited.
///
/// Construction takes the engine lock first and the wait mutex second, so
/// the lock order is the same as for any thread that signals the condition.
pub struct WaitingUnlocker<'a, T> {
    lock: &'a EngineLock,
    condvar: &'a Condvar,
    guard: Option<MutexGuard<'a, T>>,
    depth: usize,
}

impl<'a, T> WaitingUnlocker<'a, T> {
    pub fn new(lock: &'a EngineLock, mutex: &'a Mutex<T>, condvar: &'a Condvar) -> Self {
        lock.acquire(1);
        let guard = lock_unpoisoned(mutex);
        let depth = lock.release_all().saturating_sub(1);
        Self {
            lock,
            condvar,
            guard: Some(guard),
            depth,
        }
    }

    /// Wait for a notification or until `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) {
        if let Some(guard) = self.guard.take() {
            let (guard, _) = self
                .condvar
                .wait_timeout(guard, timeout)
                .unwrap_or_else(PoisonError::into_inner);
            self.guard = Some(guard);
        }
    }

    /// Wait while `condition` holds for the protected value.
    pub fn wait_while(&mut self, mut condition: impl FnMut(&mut T) -> bool) {
        if let Some(guard) = self.guard.take() {
            let guard = self
                .condvar
                .wait_while(guard, |value| condition(value))
                .unwrap_or_else(PoisonError::into_inner);
            self.guard = Some(guard);
        }
    }

    pub fn value(&mut self) -> Option<&mut T> {
        self.guard.as_deref_mut()
    }
}

impl<T> Drop for WaitingUnlocker<'_, T> {
    fn drop(&mut self) {
        self.guard.take();
        self.lock.acquire(self.depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_recursive_depth() {
        let lock = EngineLock::new();
        let outer = lock.lock();
        let inner = lock.lock();
        assert_eq!(lock.depth(), 2);
        drop(inner);
        assert_eq!(lock.depth(), 1);
        drop(outer);
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn test_unlocker_restores_depth_and_lets_others_in() {
        let lock = Arc::new(EngineLock::new());
        let signal = Arc::new((Mutex::new(false), Condvar::new()));

        let _a = lock.lock();
        let _b = lock.lock();

        let other = {
            let lock = Arc::clone(&lock);
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                // Only reachable while the main thread is parked in the unlocker.
                let _held = lock.lock();
                let (flag, cv) = &*signal;
                *lock_unpoisoned(flag) = true;
                cv.notify_all();
            })
        };

        {
            let (flag, cv) = &*signal;
            let mut unlocker = WaitingUnlocker::new(&lock, flag, cv);
            unlocker.wait_while(|done| !*done);
        }
        assert_eq!(lock.depth(), 2);
        other.join().unwrap();
    }
}
