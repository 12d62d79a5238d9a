//! Client-side rate limiting for quote sources.
//!
//! Each source gets one token bucket shared by every call to it. Tokens refill
//! at `max_calls / per`; `burst` caps how many calls may go out back-to-back.
//! When a source reports a rate limit anyway, the bucket is put into a
//! cool-down that delays the *next* call to that source only.

use crate::config::RateLimitSettings;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    blocked_until: Option<Instant>,
}

/// Token bucket with a cool-down penalty.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    /// Time to earn one token.
    refill_every: Duration,
    cooldown: Duration,
}

impl RateLimiter {
    /// `max_calls` per `per`, allowing `burst` immediate calls.
    pub fn new(max_calls: u32, per: Duration, burst: u32, cooldown: Duration) -> Self {
        let max_calls = max_calls.max(1);
        let capacity = f64::from(burst.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                blocked_until: None,
            }),
            capacity,
            refill_every: per / max_calls,
            cooldown,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(
            settings.max_calls,
            Duration::from_secs(settings.per_secs),
            settings.burst,
            Duration::from_secs(settings.cooldown_secs),
        )
    }

    /// Take a token now, or report how long until one is available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some(until) = state.blocked_until {
            if until > now {
                return Err(until - now);
            }
            state.blocked_until = None;
        }

        self.refill(&mut state, now);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(self.refill_every.mul_f64(missing))
        }
    }

    /// Block until a token is available, unless that takes longer than `max_wait`.
    ///
    /// Returns the time spent waiting, or the wait that would have been required.
    pub fn acquire(&self, max_wait: Duration) -> Result<Duration, Duration> {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_acquire() {
                Ok(()) => return Ok(waited),
                Err(wait) => {
                    if waited + wait > max_wait {
                        return Err(wait);
                    }
                    std::thread::sleep(wait);
                    waited += wait;
                }
            }
        }
    }

    /// Penalize the source after it rejected a call for rate limiting.
    ///
    /// The pause is the configured cool-down, or the source's own retry hint
    /// when that is longer (a daily quota outlasts any per-minute window).
    pub fn cool_down(&self, retry_after: Option<Duration>) {
        let pause = retry_after.map_or(self.cooldown, |hint| hint.max(self.cooldown));
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        state.tokens = 0.0;
        state.last_refill = now;
        state.blocked_until = Some(now + pause);
    }

    /// Remaining cool-down (zero when not cooling down).
    pub fn remaining_cooldown(&self) -> Duration {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .blocked_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        if self.refill_every.is_zero() {
            state.tokens = self.capacity;
        } else {
            let earned = elapsed.as_secs_f64() / self.refill_every.as_secs_f64();
            state.tokens = (state.tokens + earned).min(self.capacity);
        }
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_spacing() {
        let rl = RateLimiter::new(5, Duration::from_secs(60), 2, Duration::from_secs(60));
        assert!(rl.try_acquire().is_ok());
        assert!(rl.try_acquire().is_ok());
        let wait = rl.try_acquire().unwrap_err();
        // One token every 12s.
        assert!(wait > Duration::from_secs(11) && wait <= Duration::from_secs(12));
    }

    #[test]
    fn acquire_refuses_waits_beyond_max() {
        let rl = RateLimiter::new(1, Duration::from_secs(60), 1, Duration::from_secs(60));
        assert_eq!(rl.acquire(Duration::ZERO), Ok(Duration::ZERO));
        let required = rl.acquire(Duration::from_millis(5)).unwrap_err();
        assert!(required > Duration::from_secs(50));
    }

    #[test]
    fn acquire_sleeps_for_short_waits() {
        let rl = RateLimiter::new(1, Duration::from_millis(20), 1, Duration::ZERO);
        rl.acquire(Duration::ZERO).unwrap();
        let waited = rl.acquire(Duration::from_secs(1)).unwrap();
        assert!(waited > Duration::ZERO);
    }

    #[test]
    fn cool_down_blocks_next_call() {
        let rl = RateLimiter::new(100, Duration::from_secs(1), 10, Duration::from_secs(60));
        rl.cool_down(None);
        assert!(rl.remaining_cooldown() > Duration::from_secs(59));
        let wait = rl.try_acquire().unwrap_err();
        assert!(wait > Duration::from_secs(59));
    }

    #[test]
    fn longer_retry_hint_extends_cool_down() {
        let rl = RateLimiter::new(5, Duration::from_secs(60), 1, Duration::from_secs(60));
        rl.cool_down(Some(Duration::from_secs(24 * 3600)));
        assert!(rl.remaining_cooldown() > Duration::from_secs(23 * 3600));

        // A hint shorter than the configured pause doesn't shorten it.
        let rl = RateLimiter::new(5, Duration::from_secs(60), 1, Duration::from_secs(60));
        rl.cool_down(Some(Duration::from_secs(1)));
        assert!(rl.remaining_cooldown() > Duration::from_secs(59));
    }

    #[test]
    fn cool_down_expires() {
        let rl = RateLimiter::new(1000, Duration::from_secs(1), 1, Duration::from_millis(10));
        rl.cool_down(None);
        assert!(rl.try_acquire().is_err());
        std::thread::sleep(Duration::from_millis(15));
        assert!(rl.try_acquire().is_ok());
        assert_eq!(rl.remaining_cooldown(), Duration::ZERO);
    }
}
