use std::time::Duration;

use crate::{FailureKind, RetryToggles};

pub(crate) const DEFAULT_QUERIES_PER_SECOND: u32 = 50;

/// Configures throttling, timeouts and retry behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientOptions {
    /// Maximum request rate across all calls from one context; `0` disables throttling.
    pub queries_per_second: u32,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: Option<u32>,
    /// Time after the first attempt beyond which no retry is started.
    pub retry_timeout: Option<Duration>,
    /// Base retry backoff (exponential strategy).
    pub retry_backoff: Duration,
    /// Cap on a single backoff delay before jitter.
    pub max_retry_delay: Duration,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Read budget, folded into the per-request timeout.
    pub read_timeout: Duration,
    /// Write budget, folded into the per-request timeout.
    pub write_timeout: Duration,
    /// Master switch; when `false` every call makes exactly one attempt.
    pub retries_enabled: bool,
    /// Per-kind retryability overrides.
    pub retry_toggles: RetryToggles,
}

impl ClientOptions {
    /// Total budget for one attempt once connected.
    pub fn request_timeout(&self) -> Duration {
        self.read_timeout.saturating_add(self.write_timeout)
    }

    pub fn toggle_retry(mut self, kind: FailureKind, retryable: bool) -> Self {
        self.retry_toggles.set(kind, retryable);
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            queries_per_second: DEFAULT_QUERIES_PER_SECOND,
            max_retries: Some(3),
            retry_timeout: Some(Duration::from_secs(60)),
            retry_backoff: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            retries_enabled: true,
            retry_toggles: RetryToggles::default(),
        }
    }
}
