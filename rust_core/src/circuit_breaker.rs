//! Circuit breakers for upstream API calls, one per team feed.
//!
//! Consecutive failures on a feed open its circuit and later polls for that
//! feed fail fast. After `recovery_timeout` requests are let through again
//! (half-open) until enough succeed to close it, or one fails and reopens it.
//! Feeds never share a breaker, so a broken team id cannot block other teams.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without touching the network
    Open,
    /// Probing whether the feed has recovered
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before requests are retried
    pub recovery_timeout: Duration,
    /// Successes needed in half-open to close
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

/// Breaker guarding a single feed
#[derive(Debug)]
pub struct CircuitBreaker {
    scope: String,
    config: BreakerConfig,
    phase: Mutex<Phase>,
}

impl CircuitBreaker {
    pub fn new(scope: &str, config: BreakerConfig) -> Self {
        Self {
            scope: scope.to_string(),
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn state(&self) -> CircuitState {
        match *self.phase.lock() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Run `call` through the breaker. Returns `None` without invoking it
    /// while the circuit is open.
    pub async fn call<F, Fut, T, E>(&self, call: F) -> Option<Result<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return None;
        }

        let result = call().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        Some(result)
    }

    fn try_acquire(&self) -> bool {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Open { since } if since.elapsed() >= self.config.recovery_timeout => {
                debug!(scope = %self.scope, "Circuit half-open, retrying feed");
                *phase = Phase::HalfOpen { successes: 0 };
                true
            }
            Phase::Open { .. } => false,
            Phase::Closed { .. } | Phase::HalfOpen { .. } => true,
        }
    }

    fn on_success(&self) {
        let mut phase = self.phase.lock();
        *phase = match *phase {
            Phase::HalfOpen { successes } if successes + 1 < self.config.success_threshold => {
                Phase::HalfOpen {
                    successes: successes + 1,
                }
            }
            Phase::HalfOpen { .. } => {
                info!(scope = %self.scope, "Circuit closed, feed recovered");
                Phase::Closed { failures: 0 }
            }
            Phase::Closed { .. } | Phase::Open { .. } => Phase::Closed { failures: 0 },
        };
    }

    fn on_failure(&self) {
        let mut phase = self.phase.lock();
        *phase = match *phase {
            Phase::Closed { failures } if failures + 1 >= self.config.failure_threshold => {
                warn!(scope = %self.scope, failures = failures + 1, "Circuit OPENED");
                Phase::Open {
                    since: Instant::now(),
                }
            }
            Phase::Closed { failures } => Phase::Closed {
                failures: failures + 1,
            },
            Phase::HalfOpen { .. } => {
                warn!(scope = %self.scope, "Circuit re-OPENED, feed still failing");
                Phase::Open {
                    since: Instant::now(),
                }
            }
            open @ Phase::Open { .. } => open,
        };
    }
}

/// Breakers keyed by feed scope, created on first use
#[derive(Debug)]
pub struct BreakerSet {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerSet {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, scope: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(scope) {
            return breaker.clone();
        }

        self.breakers
            .write()
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(scope, self.config.clone())))
            .clone()
    }

    /// State of a feed's breaker; feeds never called are closed
    pub fn state(&self, scope: &str) -> CircuitState {
        self.breakers
            .read()
            .get(scope)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(failure_threshold: u32, success_threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold,
            recovery_timeout: Duration::from_millis(10),
            success_threshold,
        }
    }

    async fn fail(cb: &CircuitBreaker) -> Option<Result<(), &'static str>> {
        cb.call(|| async { Err("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Option<Result<(), &'static str>> {
        cb.call(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let cb = CircuitBreaker::new("football/nfl/33", config(3, 2));

        fail(&cb).await;
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed); // 2 < 3

        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(succeed(&cb).await.is_none());
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("football/nfl/33", config(2, 1));

        fail(&cb).await;
        succeed(&cb).await;
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_recovers_through_half_open() {
        let cb = CircuitBreaker::new("football/nfl/33", config(1, 2));
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(succeed(&cb).await, Some(Ok(()))));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("football/nfl/33", config(1, 1));
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(fail(&cb).await, Some(Err("boom"))));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_call_skips_when_open() {
        let cb = CircuitBreaker::new("football/nfl/33", config(1, 1));
        fail(&cb).await;

        let mut invoked = false;
        let skipped: Option<Result<(), &str>> = cb
            .call(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;
        assert!(skipped.is_none());
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_feeds_have_separate_breakers() {
        let set = BreakerSet::new(config(2, 1));
        let broken = set.get("football/nfl/BAD");

        fail(&broken).await;
        fail(&broken).await;

        assert_eq!(set.state("football/nfl/BAD"), CircuitState::Open);
        assert_eq!(set.state("football/nfl/33"), CircuitState::Closed);
        assert!(matches!(succeed(&set.get("football/nfl/33")).await, Some(Ok(()))));
        assert!(Arc::ptr_eq(&broken, &set.get("football/nfl/BAD")));
    }
}
