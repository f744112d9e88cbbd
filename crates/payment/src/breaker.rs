//! Circuit breaker for the payment gateway connection.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker thresholds.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a probe request.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without being attempted.
    Open,
    /// One probe request is allowed through.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    /// When the current probe was handed out; None when none is in flight.
    probe_started: Option<Instant>,
}

/// Tracks consecutive transport failures and short-circuits requests while
/// the gateway looks dead, so a stuck collaborator cannot pin reservations.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given thresholds.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                probe_started: None,
            }),
        }
    }

    /// Returns true if a request may be attempted right now.
    ///
    /// An open circuit transitions to half-open once the recovery timeout
    /// has elapsed and hands out exactly one probe slot; further callers
    /// are rejected until the probe reports a result. A probe that never
    /// reports frees the slot after another recovery timeout.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let probe_stale = inner
                    .probe_started
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if probe_stale {
                    inner.probe_started = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started = Some(Instant::now());
                    tracing::info!("payment circuit half-open, allowing probe request");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Resets the breaker after any definitive gateway response.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures = 0;
        inner.state = CircuitState::Closed;
        inner.probe_started = None;
    }

    /// Counts a transport failure, opening the circuit at the threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());
        inner.probe_started = None;
        if inner.failures >= self.config.failure_threshold {
            if inner.state != CircuitState::Open {
                metrics::counter!("payment_circuit_opened_total").increment(1);
                tracing::warn!(failures = inner.failures, "payment circuit opened");
            }
            inner.state = CircuitState::Open;
        }
    }

    /// Current breaker state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
