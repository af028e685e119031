//! Circuit breaker guarding calls to the external ledger.

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through
    Closed,
    /// Calls are rejected until the cooldown elapses
    Open,
    /// A limited number of trial calls pass through
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed circuit
    pub failure_threshold: u32,
    /// Time spent open before trial calls are admitted
    pub open_cooldown: Duration,
    /// Trial calls admitted while half-open; that many successes close the circuit
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_cooldown: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

/// Proof that a call was admitted, tagged with the breaker period it was admitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    generation: u64,
}

/// Circuit breaker state machine. Not synchronized; callers wrap it in a lock.
///
/// Every state change starts a new generation. Results of calls admitted in an earlier
/// generation are ignored, so a slow call admitted while closed cannot count as a half-open trial.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    state: CircuitState,
    generation: u64,
    /// Consecutive failures while closed
    failure_count: u32,
    /// Trial calls admitted in the current half-open period
    trial_calls: u32,
    /// Trial calls that succeeded in the current half-open period
    success_count: u32,
    opened_at: Option<Instant>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed,
            generation: 0,
            failure_count: 0,
            trial_calls: 0,
            success_count: 0,
            opened_at: None,
            config,
        }
    }

    /// Decides whether a call may go through right now, moving from open to half-open once the
    /// cooldown has elapsed. The returned admission must be handed back with the call's result.
    pub fn try_acquire(&mut self) -> Option<Admission> {
        match self.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                let cooled_down = self
                    .opened_at
                    .is_none_or(|opened| opened.elapsed() >= self.config.open_cooldown);
                if !cooled_down {
                    return None;
                }
                info!(breaker = %self.name, "circuit breaker half-opening");
                self.transition(CircuitState::HalfOpen);
                self.trial_calls = 1;
            }
            CircuitState::HalfOpen => {
                if self.trial_calls >= self.config.half_open_max_calls {
                    return None;
                }
                self.trial_calls += 1;
            }
        }
        Some(Admission {
            generation: self.generation,
        })
    }

    pub fn record_success(&mut self, admission: Admission) {
        if self.is_stale(admission) {
            return;
        }
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.half_open_max_calls {
                    info!(breaker = %self.name, "circuit breaker closing");
                    self.transition(CircuitState::Closed);
                    self.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self, admission: Admission) {
        if self.is_stale(admission) {
            return;
        }
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = self.failure_count,
                        "circuit breaker opening"
                    );
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "trial call failed, circuit breaker re-opening");
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    fn is_stale(&self, admission: Admission) -> bool {
        admission.generation != self.generation
    }

    fn open(&mut self) {
        self.transition(CircuitState::Open);
        self.opened_at = Some(Instant::now());
    }

    fn transition(&mut self, state: CircuitState) {
        self.state = state;
        self.generation += 1;
        self.failure_count = 0;
        self.trial_calls = 0;
        self.success_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                open_cooldown: cooldown,
                half_open_max_calls: 2,
            },
        )
    }

    fn fail(cb: &mut CircuitBreaker) {
        let admission = cb.try_acquire().unwrap();
        cb.record_failure(admission);
    }

    fn succeed(cb: &mut CircuitBreaker) {
        let admission = cb.try_acquire().unwrap();
        cb.record_success(admission);
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let mut cb = breaker(Duration::from_secs(60));
        assert_eq!(cb.state(), CircuitState::Closed);

        fail(&mut cb);
        fail(&mut cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&mut cb);

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_none());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut cb = breaker(Duration::from_secs(60));
        fail(&mut cb);
        fail(&mut cb);
        succeed(&mut cb);
        fail(&mut cb);
        fail(&mut cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_limits_trials_and_closes() {
        let mut cb = breaker(Duration::ZERO);
        for _ in 0..3 {
            fail(&mut cb);
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Cooldown of zero: the next acquisition is the first trial.
        let first = cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let second = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_none());

        cb.record_success(first);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success(second);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_some());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut cb = breaker(Duration::ZERO);
        for _ in 0..3 {
            fail(&mut cb);
        }
        fail(&mut cb);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_open_rejects_until_cooldown() {
        let mut cb = breaker(Duration::from_millis(30));
        for _ in 0..3 {
            fail(&mut cb);
        }
        assert!(cb.try_acquire().is_none());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.try_acquire().is_some());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_results_from_an_earlier_period_are_ignored() {
        let mut cb = breaker(Duration::ZERO);

        // Admitted while closed, still in flight when the circuit opens.
        let slow_success = cb.try_acquire().unwrap();
        let slow_failure = cb.try_acquire().unwrap();
        for _ in 0..3 {
            fail(&mut cb);
        }

        let trial = cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success(slow_success);
        cb.record_success(slow_success);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure(slow_failure);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success(trial);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&mut cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
