use std::{fmt, sync::Arc, time::Duration};

use serde_json::{Map, Value};
use tokio::{runtime::Handle, time::sleep};
use url::Url;

use crate::{
    pending::{pending_pair, Completion},
    response::decode_response,
    ApiResponse, ClientOptions, Credentials, ErrorClassifier, FailureKind, GeoApiError,
    JsonResponse, PendingResult, RateLimiter, RequestDescriptor, RequestSigner, Result,
    RetryDecision, RetryPolicy, RetryState,
};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

/// Value of the `User-Agent` header sent with every request.
pub const USER_AGENT: &str = concat!("geoapi-http/", env!("CARGO_PKG_VERSION"));

/// Shared execution context for API calls.
///
/// One context owns one rate limiter and one retry policy; clones share
/// both, so every call issued through any clone is throttled together.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
    limiter: RateLimiter,
    policy: RetryPolicy,
    classifier: ErrorClassifier,
    request_timeout: Duration,
    runtime: Handle,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("base_url", &self.inner.base_url)
            .field("credentials", self.inner.signer.credentials())
            .field("limiter", &self.inner.limiter)
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl RequestContext {
    /// Starts configuring a context.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Creates an API-key context with default options.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Creates a context from environment variables.
    ///
    /// Reads either:
    /// - `GEOAPI_KEY` — API key, or
    /// - `GEOAPI_CLIENT_ID` and `GEOAPI_CLIENT_SECRET` — signed mode.
    ///
    /// `GEOAPI_BASE_URL` optionally overrides the API host.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn run() {
    /// use geoapi_http::RequestContext;
    ///
    /// let ctx = RequestContext::from_env().expect("missing GEOAPI_* env vars");
    /// # }
    /// ```
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        match (
            non_empty_env("GEOAPI_KEY"),
            non_empty_env("GEOAPI_CLIENT_ID"),
            non_empty_env("GEOAPI_CLIENT_SECRET"),
        ) {
            (Some(key), None, None) => builder = builder.api_key(key),
            (None, Some(client_id), Some(secret)) => {
                builder = builder.enterprise_credentials(client_id, secret)
            }
            (None, None, None) => {
                return Err(GeoApiError::Config(
                    "missing GEOAPI_KEY or GEOAPI_CLIENT_ID/GEOAPI_CLIENT_SECRET environment variables"
                        .to_owned(),
                ))
            }
            _ => {
                return Err(GeoApiError::Config(
                    "set either GEOAPI_KEY or both GEOAPI_CLIENT_ID and GEOAPI_CLIENT_SECRET"
                        .to_owned(),
                ))
            }
        }
        if let Some(base_url) = non_empty_env("GEOAPI_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        self.inner.signer.credentials()
    }

    /// Submits a call and returns its handle.
    ///
    /// The retry loop starts immediately on the context's runtime. `R`
    /// supplies the body shape and the conversion into the caller's result.
    pub fn get<R: ApiResponse>(&self, descriptor: RequestDescriptor) -> PendingResult<R::Output> {
        let (completion, pending) = pending_pair(self.inner.runtime.clone());
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let result = inner.execute::<R>(descriptor, &completion).await;
            completion.resolve(result);
        });
        pending
    }

    /// Submits a call whose body is returned as untyped JSON members.
    pub fn get_json(&self, descriptor: RequestDescriptor) -> PendingResult<Map<String, Value>> {
        self.get::<JsonResponse>(descriptor)
    }
}

impl Inner {
    async fn execute<R: ApiResponse>(
        &self,
        descriptor: RequestDescriptor,
        completion: &Completion<R::Output>,
    ) -> Result<R::Output> {
        #[cfg(feature = "tracing")]
        let shape = descriptor
            .response_shape()
            .map(str::to_owned)
            .unwrap_or_else(|| std::any::type_name::<R>().to_owned());
        let url = self.request_url(descriptor)?;
        let mut state = RetryState::new();

        loop {
            tokio::select! {
                biased;
                _ = completion.cancelled() => return Err(GeoApiError::Cancelled),
                _ = self.limiter.acquire() => {}
            }
            if completion.is_cancel_requested() {
                return Err(GeoApiError::Cancelled);
            }

            state.record_attempt();
            let error = match self.dispatch::<R>(&url).await {
                Ok(output) => return Ok(output),
                Err(error) => error,
            };
            let verdict = self.classifier.verdict(&error);
            state.record_failure(&error);

            if completion.is_cancel_requested() {
                return Err(GeoApiError::Cancelled);
            }

            match self.policy.decide(&state, verdict) {
                RetryDecision::Stop => {
                    #[cfg(feature = "tracing")]
                    if verdict.is_retryable() {
                        tracing::warn!(
                            response = %shape,
                            attempts = state.attempts(),
                            error = %error,
                            "giving up on retryable failure"
                        );
                    }
                    return Err(error);
                }
                RetryDecision::RetryAfter(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        response = %shape,
                        attempt = state.attempts(),
                        kind = ?verdict.kind(),
                        delay_ms = delay.as_millis() as u64,
                        error = state.last_error().unwrap_or_default(),
                        "retrying request"
                    );
                    tokio::select! {
                        biased;
                        _ = completion.cancelled() => return Err(GeoApiError::Cancelled),
                        _ = sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn dispatch<R: ApiResponse>(&self, url: &Url) -> Result<R::Output> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(GeoApiError::Transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(GeoApiError::Transport)?;
        decode_response::<R>(status, &body)
    }

    fn request_url(&self, descriptor: RequestDescriptor) -> Result<Url> {
        let signed = self.signer.sign(descriptor)?;
        let path_and_query = signed.path_and_query();
        let separator = if path_and_query.starts_with('/') { "" } else { "/" };
        let raw = format!("{}{separator}{path_and_query}", self.base_url);
        Url::parse(&raw)
            .map_err(|err| GeoApiError::Validation(format!("invalid request URL '{raw}': {err}")))
    }
}

/// Incremental configuration for a [`RequestContext`].
///
/// Exactly one credential form must be supplied: an API key, or a client
/// ID with its signing secret.
#[derive(Clone, Default)]
pub struct ContextBuilder {
    api_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    channel: Option<String>,
    base_url: Option<String>,
    runtime: Option<Handle>,
    options: ClientOptions,
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("channel", &self.channel)
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish()
    }
}

impl ContextBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Client ID and URL-safe base64 signing secret.
    pub fn enterprise_credentials(
        mut self,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(secret.into());
        self
    }

    /// Usage-reporting channel, sent with signed requests only.
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Replaces every option at once.
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Requests per second across all calls; `0` disables throttling.
    pub fn query_rate_limit(mut self, queries_per_second: u32) -> Self {
        self.options.queries_per_second = queries_per_second;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.options.max_retries = Some(max_retries);
        self
    }

    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.options.retry_timeout = Some(timeout);
        self
    }

    pub fn retry_backoff(mut self, base: Duration) -> Self {
        self.options.retry_backoff = base;
        self
    }

    pub fn max_retry_delay(mut self, max: Duration) -> Self {
        self.options.max_retry_delay = max;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.options.write_timeout = timeout;
        self
    }

    /// Forces failures of `kind` to be retried or not, regardless of default.
    pub fn toggle_retry(mut self, kind: FailureKind, retryable: bool) -> Self {
        self.options.retry_toggles.set(kind, retryable);
        self
    }

    /// Every call makes exactly one attempt.
    pub fn disable_retries(mut self) -> Self {
        self.options.retries_enabled = false;
        self
    }

    /// Overrides the API host, e.g. to point at a local mock server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Runtime that runs submitted calls.
    ///
    /// Defaults to the runtime `build` is called from. Set this to build a
    /// context on a plain thread and consume results with
    /// [`PendingResult::blocking_wait`].
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<RequestContext> {
        let credentials = match (self.api_key, self.client_id, self.client_secret) {
            (Some(key), None, None) => {
                if key.trim().is_empty() {
                    return Err(GeoApiError::Config("API key is empty".to_owned()));
                }
                Credentials::api_key(key.trim())
            }
            (None, Some(client_id), Some(secret)) => {
                let credentials = Credentials::signed(client_id, &secret)?;
                match self.channel {
                    Some(channel) => credentials.with_channel(channel),
                    None => credentials,
                }
            }
            (None, None, None) => {
                return Err(GeoApiError::Config(
                    "an API key or a client ID with signing secret is required".to_owned(),
                ))
            }
            (Some(_), _, _) => {
                return Err(GeoApiError::Config(
                    "API key and client ID credentials are mutually exclusive".to_owned(),
                ))
            }
            _ => {
                return Err(GeoApiError::Config(
                    "client ID and signing secret must be provided together".to_owned(),
                ))
            }
        };

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| {
                GeoApiError::Config(
                    "no Tokio runtime: build inside a runtime or set one with `runtime()`"
                        .to_owned(),
                )
            })?,
        };

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.options.connect_timeout)
            .build()
            .map_err(|err| GeoApiError::Config(format!("failed to build HTTP client: {err}")))?;

        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        let parsed = Url::parse(&base_url)
            .map_err(|err| GeoApiError::Config(format!("invalid base URL '{base_url}': {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
            return Err(GeoApiError::Config(format!(
                "base URL '{base_url}' must be an absolute http(s) URL"
            )));
        }

        Ok(RequestContext {
            inner: Arc::new(Inner {
                http,
                base_url,
                signer: RequestSigner::new(credentials),
                limiter: RateLimiter::new(self.options.queries_per_second),
                policy: RetryPolicy::from_options(&self.options),
                classifier: ErrorClassifier::new(self.options.retry_toggles.clone()),
                request_timeout: self.options.request_timeout(),
                runtime,
            }),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
