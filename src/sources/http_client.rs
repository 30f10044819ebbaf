//! Shared HTTP client with connection pooling, rate limiting and a circuit breaker
//!
//! One [`HttpClient`] is built per process and handed to every HTTP-backed
//! source as an `Arc`. The circuit breaker is shared too: once an upstream
//! keeps failing, all sources fail fast with [`SourceError::CircuitBreakerOpen`]
//! until the recovery timeout lets a probe through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{CircuitBreakerConfig, HttpConfig};
use crate::error::SourceError;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Instant },
    HalfOpen,
}

/// Failure counting state machine
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail fast while open; move to half-open once the recovery timeout passed
    pub fn check(&self) -> Result<(), SourceError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { opened_at } => {
                let recovery = Duration::from_secs(self.config.recovery_timeout_seconds);
                if opened_at.elapsed() >= recovery {
                    inner.state = CircuitState::HalfOpen;
                    inner.successes = 0;
                    info!("circuit breaker half-open");
                    Ok(())
                } else {
                    Err(SourceError::CircuitBreakerOpen)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => inner.failures = 0,
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    info!("circuit breaker closed");
                }
            }
            CircuitState::Open { .. } => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        let reopen = matches!(inner.state, CircuitState::HalfOpen);
        if reopen || (inner.state == CircuitState::Closed && inner.failures >= self.config.failure_threshold) {
            inner.state = CircuitState::Open {
                opened_at: Instant::now(),
            };
            warn!(failures = inner.failures, "circuit breaker opened");
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }
}

/// Request statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub rejected_by_breaker: u64,
}

/// reqwest client plus rate limiting and circuit breaking
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    in_flight: Semaphore,
    rate_limit_delay: Option<Duration>,
    last_request: tokio::sync::Mutex<Option<Instant>>,
    breaker: CircuitBreaker,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    rejected: AtomicU64,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let pool = &config.connection_pool;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_seconds))
            .tcp_keepalive(Duration::from_secs(pool.keep_alive_seconds))
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            in_flight: Semaphore::new(config.max_in_flight.max(1)),
            rate_limit_delay: config.rate_limit_ms.map(Duration::from_millis),
            last_request: tokio::sync::Mutex::new(None),
            breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// GET and decode JSON; 404 is `Ok(None)`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Option<T>, SourceError> {
        let Some(response) = self.get(url, timeout).await? else {
            return Ok(None);
        };
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| SourceError::Decode(format!("{url}: {e}")))
    }

    /// GET a text body; 404 is `Ok(None)`
    pub async fn get_text(&self, url: &str, timeout: Duration) -> Result<Option<String>, SourceError> {
        match self.get(url, timeout).await? {
            Some(response) => Ok(Some(response.text().await?)),
            None => Ok(None),
        }
    }

    /// GET with full protection; non-success statuses other than 404 are errors
    async fn get(&self, url: &str, timeout: Duration) -> Result<Option<reqwest::Response>, SourceError> {
        if let Err(e) = self.breaker.check() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| SourceError::Unavailable(format!("rate limiter closed: {e}")))?;

        if let Some(delay) = self.rate_limit_delay {
            let mut last = self.last_request.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < delay {
                    sleep(delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        debug!(url, "GET");
        let result = self.client.get(url).timeout(timeout).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                self.breaker.record_success();
                Ok(Some(response))
            }
            // Not found is an answer, not an outage
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                self.breaker.record_success();
                Ok(None)
            }
            Ok(response) => {
                self.record_failure();
                Err(SourceError::Http {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                })
            }
            Err(e) if e.is_timeout() => {
                self.record_failure();
                Err(SourceError::Timeout(timeout))
            }
            Err(e) => {
                self.record_failure();
                Err(e.into())
            }
        }
    }

    fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.breaker.record_failure();
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rejected_by_breaker: self.rejected.load(Ordering::Relaxed),
        }
    }
}
