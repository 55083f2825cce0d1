//! Readiness polling against a health endpoint.
//!
//! The poller probes at a fixed interval until the probe succeeds or the
//! deadline passes. Probe errors count as "not ready yet". Both the clock and
//! the probe are injectable so the deadline logic can be tested without
//! sleeping for real.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interval between probes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request timeout for HTTP probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of time for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += duration;
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A single readiness check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Description of what is probed, for logs.
    fn target(&self) -> &str;

    /// `true` once the target is ready. Must not error; failures are `false`.
    async fn probe(&self) -> bool;
}

/// Probes an HTTP endpoint; any 200 response means ready.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn target(&self) -> &str {
        &self.url
    }

    async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                debug!("{} -> {}", self.url, response.status());
                response.status() == reqwest::StatusCode::OK
            }
            Err(e) => {
                debug!("{} not reachable yet: {}", self.url, e);
                false
            }
        }
    }
}

/// Outcome of one readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessResult {
    pub ready: bool,
    pub elapsed: Duration,
    pub attempts: u32,
}

/// Bounded retry loop over a [`Probe`].
pub struct ReadinessPoller<C: Clock = TokioClock> {
    clock: C,
}

impl Default for ReadinessPoller<TokioClock> {
    fn default() -> Self {
        Self::new(TokioClock)
    }
}

impl<C: Clock> ReadinessPoller<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Probe until ready or until `timeout` has elapsed.
    ///
    /// A timeout too large to represent as a deadline waits indefinitely.
    pub async fn wait(&self, probe: &dyn Probe, timeout: Duration) -> ReadinessResult {
        info!("Waiting for {} (timeout {}s)", probe.target(), timeout.as_secs());
        let start = self.clock.now();
        let deadline = start.checked_add(timeout);
        let mut attempts = 0;

        loop {
            let now = self.clock.now();
            if deadline.is_some_and(|d| now >= d) {
                break;
            }

            attempts += 1;
            if probe.probe().await {
                let elapsed = self.clock.now().duration_since(start);
                info!("{} is ready after {:?} ({} attempts)", probe.target(), elapsed, attempts);
                return ReadinessResult {
                    ready: true,
                    elapsed,
                    attempts,
                };
            }

            let pause = match deadline {
                Some(d) => POLL_INTERVAL.min(d.saturating_duration_since(self.clock.now())),
                None => POLL_INTERVAL,
            };
            self.clock.sleep(pause).await;
        }

        let elapsed = self.clock.now().duration_since(start);
        warn!("Timed out waiting for {} after {:?}", probe.target(), elapsed);
        ReadinessResult {
            ready: false,
            elapsed,
            attempts,
        }
    }

    /// Convenience: poll an HTTP URL. Returns `false` on timeout.
    pub async fn wait_ready(&self, url: &str, timeout: Duration) -> bool {
        match HttpProbe::new(url) {
            Ok(probe) => self.wait(&probe, timeout).await.ready,
            Err(e) => {
                warn!("Could not build HTTP client for {}: {}", url, e);
                false
            }
        }
    }
}

/// Health endpoint of the mock server.
pub fn status_url(base_url: &str) -> String {
    format!("{}/__status", base_url.trim_end_matches('/'))
}
