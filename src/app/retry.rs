//! Bounded retry with a cooperative poll hook.
//!
//! Link bring-up uses a fixed attempt count with a fixed delay instead of a
//! wall-clock deadline.  Between attempts the caller gets a hook to service
//! other work (operator commands) and may cancel the remaining budget.

use embedded_hal::delay::DelayNs;

pub use crate::config::RetryBudget;

/// Returned by the between-attempts hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryControl {
    Continue,
    /// Abandon the remaining attempts.
    Cancel,
}

/// Why a budgeted operation gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error.
    Exhausted(E),
    /// The hook cancelled after `attempts` tries.
    Cancelled { attempts: u8 },
}

impl RetryBudget {
    /// Run `attempt` up to `max_attempts` times.
    ///
    /// After each failed attempt except the last, `between` runs and then
    /// the delay elapses on `ctx`.  `attempt` receives the 1-based attempt
    /// number.
    pub fn run<C, T, E>(
        &self,
        ctx: &mut C,
        mut attempt: impl FnMut(&mut C, u8) -> Result<T, E>,
        mut between: impl FnMut(&mut C) -> RetryControl,
    ) -> Result<T, RetryError<E>>
    where
        C: DelayNs,
    {
        let attempts = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            let err = match attempt(ctx, n) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            if n >= attempts {
                return Err(RetryError::Exhausted(err));
            }
            if between(ctx) == RetryControl::Cancel {
                return Err(RetryError::Cancelled { attempts: n });
            }
            ctx.delay_ms(self.delay_ms);
            n += 1;
        }
    }
}
