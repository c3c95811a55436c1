//! Circuit breaker guarding a gateway dependency.
//!
//! Failures are counted over a rolling time window rather than as a
//! consecutive run, so a burst of failures trips the breaker even when
//! interleaved with successes. State transitions fire optional hooks
//! exactly once each, and [`CircuitBreaker::execute`] wraps a call with
//! the full check / record / short-circuit sequence.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use payrail_core::{ErrorCode, PaymentError};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation — calls flow through.
    Closed,
    /// Dependency is failing — calls are rejected immediately.
    Open,
    /// Recovery probe — limited calls are allowed to test dependency health.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures within the rolling window before opening.
    pub failure_threshold: u32,
    /// Number of consecutive successes in `HalfOpen` state to close.
    pub success_threshold: u32,
    /// How long to stay `Open` before transitioning to `HalfOpen`.
    pub reset_timeout: Duration,
    /// Width of the rolling window failures are counted over.
    pub rolling_window: Duration,
}

impl CircuitBreakerConfig {
    /// Validate configuration values.
    ///
    /// `reset_timeout = 0` is intentionally allowed (useful for testing);
    /// a zero-width rolling window would never accumulate failures and is
    /// rejected.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.failure_threshold < 1 {
            return Err(PaymentError::new(
                ErrorCode::InvalidIntent,
                "failure_threshold must be >= 1",
            ));
        }
        if self.success_threshold < 1 {
            return Err(PaymentError::new(
                ErrorCode::InvalidIntent,
                "success_threshold must be >= 1",
            ));
        }
        if self.rolling_window.is_zero() {
            return Err(PaymentError::new(
                ErrorCode::InvalidIntent,
                "rolling_window must be non-zero",
            ));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            rolling_window: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker, for operational dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    /// Current state.
    pub state: CircuitState,
    /// Failures currently inside the rolling window.
    pub recent_failures: usize,
    /// Consecutive half-open probe successes.
    pub consecutive_successes: u32,
    /// How long the breaker has been open, when it is.
    pub open_for_ms: Option<u64>,
}

type TransitionHook = Arc<dyn Fn() + Send + Sync>;
type FailurePredicate = Arc<dyn Fn(&PaymentError) -> bool + Send + Sync>;

/// Internal mutable state for a single circuit breaker.
struct CircuitData {
    state: CircuitState,
    /// Timestamps of recent failures; pruned to the rolling window.
    failures: VecDeque<Instant>,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    /// Whether a probe call is currently in flight during `HalfOpen` state.
    /// Allows only one probe at a time to avoid a thundering herd.
    probe_in_flight: bool,
}

impl CircuitData {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            consecutive_successes: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    /// Drop failure timestamps that fell out of the rolling window.
    fn prune_failures(&mut self, now: Instant, window: Duration) {
        while let Some(first) = self.failures.front() {
            if now.duration_since(*first) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Circuit breaker for a single dependency.
///
/// State transitions:
/// - `Closed` -> `Open` when failures within the rolling window reach the threshold
/// - `Open` -> `HalfOpen` after the reset timeout elapses
/// - `HalfOpen` -> `Closed` after consecutive successes reach the threshold
/// - `HalfOpen` -> `Open` on any counted failure
pub struct CircuitBreaker {
    dependency: String,
    config: CircuitBreakerConfig,
    data: RwLock<CircuitData>,
    is_failure: Option<FailurePredicate>,
    on_open: Option<TransitionHook>,
    on_close: Option<TransitionHook>,
    on_half_open: Option<TransitionHook>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the given dependency.
    #[must_use]
    pub fn new(dependency: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            config,
            data: RwLock::new(CircuitData::new()),
            is_failure: None,
            on_open: None,
            on_close: None,
            on_half_open: None,
        }
    }

    /// Install a predicate deciding which errors count as breaker failures.
    ///
    /// Errors the predicate rejects (business declines, validation) are
    /// recorded as successes: the dependency answered, it just said no.
    #[must_use]
    pub fn with_failure_predicate(
        mut self,
        predicate: impl Fn(&PaymentError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_failure = Some(Arc::new(predicate));
        self
    }

    /// Hook fired once per transition into `Open`.
    #[must_use]
    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(hook));
        self
    }

    /// Hook fired once per transition into `Closed`.
    #[must_use]
    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(hook));
        self
    }

    /// Hook fired once per transition into `HalfOpen`.
    #[must_use]
    pub fn on_half_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_half_open = Some(Arc::new(hook));
        self
    }

    /// Check if a call should be allowed through.
    ///
    /// May trigger `Open` -> `HalfOpen` when the reset timeout has elapsed.
    /// In `HalfOpen` state only one probe is allowed at a time; while one is
    /// in flight the effective state reported here is `Open`.
    ///
    /// Returns `(state, Option<(from, to)>)` where the second element is
    /// `Some` when a state transition occurred.
    pub fn check(&self) -> (CircuitState, Option<(CircuitState, CircuitState)>) {
        let result = {
            let mut data = self
                .data
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            if data.state == CircuitState::Open
                && let Some(opened_at) = data.opened_at
                && opened_at.elapsed() >= self.config.reset_timeout
            {
                debug!(
                    dependency = %self.dependency,
                    "circuit breaker transitioning from open to half-open"
                );
                data.state = CircuitState::HalfOpen;
                data.consecutive_successes = 0;
                data.probe_in_flight = true;
                (
                    CircuitState::HalfOpen,
                    Some((CircuitState::Open, CircuitState::HalfOpen)),
                )
            } else if data.state == CircuitState::HalfOpen && data.probe_in_flight {
                // Probe already in flight: reject like an open circuit.
                (CircuitState::Open, None)
            } else {
                if data.state == CircuitState::HalfOpen {
                    data.probe_in_flight = true;
                }
                (data.state, None)
            }
        };
        self.notify(result.1);
        result
    }

    /// Record a successful call.
    ///
    /// In `Closed` state a success changes nothing: failures age out of the
    /// rolling window on their own instead of being reset.
    ///
    /// Returns `Some((from, to))` if a state transition occurred.
    pub fn record_success(&self) -> Option<(CircuitState, CircuitState)> {
        let transition = {
            let mut data = self
                .data
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            match data.state {
                CircuitState::HalfOpen => {
                    data.consecutive_successes += 1;
                    data.probe_in_flight = false;
                    if data.consecutive_successes >= self.config.success_threshold {
                        info!(
                            dependency = %self.dependency,
                            successes = data.consecutive_successes,
                            "circuit breaker closing after successful probes"
                        );
                        data.state = CircuitState::Closed;
                        data.failures.clear();
                        data.consecutive_successes = 0;
                        data.opened_at = None;
                        Some((CircuitState::HalfOpen, CircuitState::Closed))
                    } else {
                        None
                    }
                }
                CircuitState::Closed | CircuitState::Open => None,
            }
        };
        self.notify(transition);
        transition
    }

    /// Record a failed call.
    ///
    /// Returns `Some((from, to))` if a state transition occurred.
    pub fn record_failure(&self) -> Option<(CircuitState, CircuitState)> {
        let transition = {
            let mut data = self
                .data
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let now = Instant::now();

            match data.state {
                CircuitState::Closed => {
                    data.failures.push_back(now);
                    data.prune_failures(now, self.config.rolling_window);
                    if data.failures.len() >= self.config.failure_threshold as usize {
                        info!(
                            dependency = %self.dependency,
                            failures = data.failures.len(),
                            threshold = self.config.failure_threshold,
                            "circuit breaker opening"
                        );
                        data.state = CircuitState::Open;
                        data.opened_at = Some(now);
                        Some((CircuitState::Closed, CircuitState::Open))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    info!(
                        dependency = %self.dependency,
                        "circuit breaker re-opening after half-open probe failure"
                    );
                    data.state = CircuitState::Open;
                    data.opened_at = Some(now);
                    data.consecutive_successes = 0;
                    data.probe_in_flight = false;
                    Some((CircuitState::HalfOpen, CircuitState::Open))
                }
                CircuitState::Open => {
                    // Extends the open period.
                    data.opened_at = Some(now);
                    None
                }
            }
        };
        self.notify(transition);
        transition
    }

    /// Wrap a call with the full breaker sequence.
    ///
    /// An open circuit short-circuits to `CIRCUIT_OPEN` without invoking
    /// `f`. Otherwise the outcome is recorded: errors the failure predicate
    /// rejects count as successes.
    pub async fn execute<T, F, Fut>(&self, f: F) -> Result<T, PaymentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PaymentError>>,
    {
        let (state, _) = self.check();
        if state == CircuitState::Open {
            warn!(dependency = %self.dependency, "circuit open, short-circuiting call");
            return Err(PaymentError::new(
                ErrorCode::CircuitOpen,
                format!("circuit for {} is open", self.dependency),
            ));
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if self.counts_as_failure(&err) {
                    self.record_failure();
                } else {
                    self.record_success();
                }
                Err(err)
            }
        }
    }

    fn counts_as_failure(&self, err: &PaymentError) -> bool {
        self.is_failure.as_ref().is_none_or(|pred| pred(err))
    }

    /// Force the breaker open, regardless of recorded outcomes.
    ///
    /// Returns `Some((from, to))` if this changed the state.
    pub fn trip(&self) -> Option<(CircuitState, CircuitState)> {
        let transition = {
            let mut data = self
                .data
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if data.state == CircuitState::Open {
                None
            } else {
                info!(dependency = %self.dependency, "circuit breaker tripped manually");
                let from = data.state;
                data.state = CircuitState::Open;
                data.opened_at = Some(Instant::now());
                data.consecutive_successes = 0;
                data.probe_in_flight = false;
                Some((from, CircuitState::Open))
            }
        };
        self.notify(transition);
        transition
    }

    /// Reset the breaker to `Closed` state, clearing all recorded history.
    ///
    /// Returns `Some((from, to))` if this changed the state.
    pub fn reset(&self) -> Option<(CircuitState, CircuitState)> {
        let transition = {
            let mut data = self
                .data
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let from = data.state;
            data.state = CircuitState::Closed;
            data.failures.clear();
            data.consecutive_successes = 0;
            data.opened_at = None;
            data.probe_in_flight = false;
            if from == CircuitState::Closed {
                None
            } else {
                info!(dependency = %self.dependency, %from, "circuit breaker reset manually");
                Some((from, CircuitState::Closed))
            }
        };
        self.notify(transition);
        transition
    }

    /// Get current state without triggering transitions.
    pub fn state(&self) -> CircuitState {
        self.data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .state
    }

    /// Point-in-time statistics. Prunes the failure window as a side effect.
    pub fn stats(&self) -> CircuitStats {
        let mut data = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        data.prune_failures(Instant::now(), self.config.rolling_window);
        CircuitStats {
            state: data.state,
            recent_failures: data.failures.len(),
            consecutive_successes: data.consecutive_successes,
            open_for_ms: data
                .opened_at
                .filter(|_| data.state == CircuitState::Open)
                .map(|at| u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Get the configuration for this circuit breaker.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the dependency name.
    pub fn dependency_name(&self) -> &str {
        &self.dependency
    }

    fn notify(&self, transition: Option<(CircuitState, CircuitState)>) {
        if let Some((_, to)) = transition {
            let hook = match to {
                CircuitState::Open => &self.on_open,
                CircuitState::Closed => &self.on_close,
                CircuitState::HalfOpen => &self.on_half_open,
            };
            if let Some(hook) = hook {
                hook();
            }
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self
            .data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f.debug_struct("CircuitBreaker")
            .field("dependency", &self.dependency)
            .field("config", &self.config)
            .field("state", &data.state)
            .field("recent_failures", &data.failures.len())
            .field("consecutive_successes", &data.consecutive_successes)
            .finish_non_exhaustive()
    }
}

/// Registry managing circuit breakers for multiple dependencies.
///
/// Built once at engine construction time and then used immutably for
/// circuit state lookups. Individual [`CircuitBreaker`] instances handle
/// their own internal mutability.
pub struct CircuitBreakerRegistry {
    breakers: HashMap<String, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakers: HashMap::new(),
        }
    }

    /// Register a plain circuit breaker for a dependency.
    pub fn register(&mut self, dependency: impl Into<String>, config: CircuitBreakerConfig) {
        let name = dependency.into();
        self.breakers
            .insert(name.clone(), CircuitBreaker::new(name, config));
    }

    /// Insert a pre-built breaker (with hooks or predicates attached).
    pub fn insert(&mut self, breaker: CircuitBreaker) {
        self.breakers.insert(breaker.dependency.clone(), breaker);
    }

    /// Look up the circuit breaker for a dependency.
    #[must_use]
    pub fn get(&self, dependency: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(dependency)
    }

    /// Return a sorted list of all dependency names that have breakers.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.breakers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Return the number of registered circuit breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Return `true` if no circuit breakers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("dependencies", &self.dependencies())
            .finish()
    }
}
