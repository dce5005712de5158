//! Circuit breaking for the situation-generator collaborator (§6).
//!
//! Grounded on the teacher's `CircuitBreaker` (`src/distributed.rs`): a
//! three-state (closed/open/half-open) breaker guarding a fallible async
//! call, consolidated into a single mutex-protected inner state to avoid
//! interleaved reads/writes across the state check and the outcome update.
//! The teacher's companion `DistributedLock`/`InMemoryDistributedLock` (used
//! there for cross-instance coordination) has no counterpart here: every
//! room transaction is already serialized by a plain per-room mutex
//! ([`crate::engine::GameEngine::room_lock`]), and a single-instance,
//! in-memory store has nothing to coordinate across.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct CircuitBreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Trips open after `failure_threshold` consecutive failures, refusing calls
/// for `timeout` before allowing one probe call through (half-open).
pub struct CircuitBreaker {
    inner: Arc<Mutex<CircuitBreakerInner>>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CircuitBreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
            })),
            failure_threshold,
            timeout,
        }
    }

    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Debug + From<anyhow::Error>,
    {
        {
            let mut inner = self.inner.lock().await;
            match inner.state {
                CircuitState::Open => {
                    if let Some(last_failure_time) = inner.last_failure_time {
                        let elapsed = chrono::Utc::now()
                            .signed_duration_since(last_failure_time)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        if elapsed < self.timeout {
                            return Err(E::from(anyhow::anyhow!("circuit breaker is open")));
                        }
                    }
                    inner.state = CircuitState::HalfOpen;
                }
                CircuitState::HalfOpen | CircuitState::Closed => {}
            }
        }

        match operation.await {
            Ok(result) => {
                let mut inner = self.inner.lock().await;
                if inner.state == CircuitState::HalfOpen {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                }
                Ok(result)
            }
            Err(error) => {
                let mut inner = self.inner.lock().await;
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_failure_time = Some(chrono::Utc::now());
                }
                Err(error)
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));

        for _ in 0..2 {
            let result = breaker
                .call(async { Err::<(), anyhow::Error>(anyhow::anyhow!("boom")) })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(breaker.state().await, CircuitState::Open);

        let result = breaker.call(async { Ok::<(), anyhow::Error>(()) }).await;
        assert!(result.is_err(), "open breaker should refuse calls before the timeout elapses");
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));

        let _ = breaker
            .call(async { Err::<(), anyhow::Error>(anyhow::anyhow!("boom")) })
            .await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = breaker.call(async { Ok::<(), anyhow::Error>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }
}
