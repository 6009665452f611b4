//! Bounded lock acquisition.
//!
//! State-mutating operations never block indefinitely: locks are taken with
//! `try_*` and retried with exponential backoff. Once the budget is spent the
//! caller sees [`EngineError::Conflict`].

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::thread;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Retry budget for contended locks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` until it yields a value, fails, or the budget is spent.
    ///
    /// `Ok(None)` from `attempt` means "contended, try again".
    pub fn run<T>(
        &self,
        what: &str,
        mut attempt: impl FnMut() -> EngineResult<Option<T>>,
    ) -> EngineResult<T> {
        let attempts = self.max_attempts.max(1);
        for n in 1..=attempts {
            if let Some(value) = attempt()? {
                return Ok(value);
            }
            if n < attempts {
                thread::sleep(self.backoff(n));
            }
        }
        tracing::warn!(resource = what, attempts, "lock retries exhausted");
        Err(EngineError::conflict(format!(
            "{what} is busy; gave up after {attempts} attempts"
        )))
    }

    pub fn read<'a, T>(&self, lock: &'a RwLock<T>, what: &str) -> EngineResult<RwLockReadGuard<'a, T>> {
        self.run(what, || try_read(lock, what))
    }

    pub fn write<'a, T>(
        &self,
        lock: &'a RwLock<T>,
        what: &str,
    ) -> EngineResult<RwLockWriteGuard<'a, T>> {
        self.run(what, || try_write(lock, what))
    }

    /// Exponential backoff: base * 2^(attempt-1), capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let pow = 1u32 << attempt.saturating_sub(1).min(10);
        let ms = self.base_backoff.as_micros().saturating_mul(pow as u128);
        Duration::from_micros(ms.min(self.max_backoff.as_micros()) as u64)
    }
}

/// Single non-blocking read attempt.
pub fn try_read<'a, T>(lock: &'a RwLock<T>, what: &str) -> EngineResult<Option<RwLockReadGuard<'a, T>>> {
    match lock.try_read() {
        Ok(guard) => Ok(Some(guard)),
        Err(TryLockError::WouldBlock) => Ok(None),
        Err(TryLockError::Poisoned(_)) => Err(EngineError::conflict(format!("{what} lock poisoned"))),
    }
}

/// Single non-blocking write attempt.
pub fn try_write<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> EngineResult<Option<RwLockWriteGuard<'a, T>>> {
    match lock.try_write() {
        Ok(guard) => Ok(Some(guard)),
        Err(TryLockError::WouldBlock) => Ok(None),
        Err(TryLockError::Poisoned(_)) => Err(EngineError::conflict(format!("{what} lock poisoned"))),
    }
}
