//! Mapping from HTTP status / API status to typed, retry-tagged failures.

use std::collections::HashMap;

use reqwest::StatusCode;

use crate::GeoApiError;

/// Category of a failed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ServerError,
    OverQueryLimit,
    RequestDenied,
    InvalidRequest,
    NetworkError,
    Unauthorized,
    Unknown,
}

impl FailureKind {
    /// Retryability applied when no override is configured.
    pub fn retryable_by_default(self) -> bool {
        match self {
            Self::ServerError | Self::OverQueryLimit | Self::NetworkError | Self::Unknown => true,
            Self::RequestDenied | Self::InvalidRequest | Self::Unauthorized => false,
        }
    }
}

/// Classified outcome of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Retryable(FailureKind),
    Terminal(FailureKind),
}

impl Verdict {
    pub fn kind(self) -> FailureKind {
        match self {
            Self::Retryable(kind) | Self::Terminal(kind) => kind,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Per-kind retryability overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryToggles {
    overrides: HashMap<FailureKind, bool>,
}

impl RetryToggles {
    /// Forces `kind` to be retryable (`true`) or terminal (`false`).
    pub fn set(&mut self, kind: FailureKind, retryable: bool) {
        self.overrides.insert(kind, retryable);
    }

    pub fn with(mut self, kind: FailureKind, retryable: bool) -> Self {
        self.set(kind, retryable);
        self
    }

    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.retryable_by_default())
    }
}

/// Turns failures into verdicts using the default table plus toggles.
#[derive(Clone, Debug, Default)]
pub struct ErrorClassifier {
    toggles: RetryToggles,
}

impl ErrorClassifier {
    pub fn new(toggles: RetryToggles) -> Self {
        Self { toggles }
    }

    /// Classifies a non-successful response.
    ///
    /// The body's `status` field takes precedence over the HTTP code.
    pub fn classify(
        &self,
        http_status: StatusCode,
        status: Option<&str>,
        error_message: Option<&str>,
    ) -> Verdict {
        self.verdict(&Self::api_error(http_status, status, error_message))
    }

    /// Builds the error surfaced to callers for a non-successful response.
    ///
    /// Without a status or message the text names the HTTP status with its
    /// canonical reason phrase (`Server Error: 500 Internal Server Error`),
    /// not whatever reason the server put on its status line.
    pub fn api_error(
        http_status: StatusCode,
        status: Option<&str>,
        error_message: Option<&str>,
    ) -> GeoApiError {
        let kind = match status {
            Some(status) => kind_for_status(status),
            None => kind_for_http(http_status),
        };
        let message = match (error_message, status) {
            (Some(message), _) if !message.is_empty() => message.to_owned(),
            (_, Some(status)) => status.to_owned(),
            (_, None) if http_status.is_server_error() => format!("Server Error: {http_status}"),
            (_, None) => format!("HTTP Error: {http_status}"),
        };
        GeoApiError::api(kind, status, message)
    }

    /// Classifies an error that has already been constructed.
    ///
    /// Errors without a kind (validation, configuration, cancellation) are
    /// always terminal.
    pub fn verdict(&self, error: &GeoApiError) -> Verdict {
        match error.kind() {
            Some(kind) => self.verdict_for(kind),
            None => Verdict::Terminal(FailureKind::Unknown),
        }
    }

    pub fn verdict_for(&self, kind: FailureKind) -> Verdict {
        if self.toggles.is_retryable(kind) {
            Verdict::Retryable(kind)
        } else {
            Verdict::Terminal(kind)
        }
    }
}

fn kind_for_status(status: &str) -> FailureKind {
    match status {
        "OVER_QUERY_LIMIT" => FailureKind::OverQueryLimit,
        "REQUEST_DENIED" | "OVER_DAILY_LIMIT" => FailureKind::RequestDenied,
        "INVALID_REQUEST" | "NOT_FOUND" => FailureKind::InvalidRequest,
        s if s.starts_with("MAX_") => FailureKind::InvalidRequest,
        _ => FailureKind::Unknown,
    }
}

fn kind_for_http(status: StatusCode) -> FailureKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => FailureKind::OverQueryLimit,
        s if s.is_server_error() => FailureKind::ServerError,
        s if s.is_client_error() => FailureKind::InvalidRequest,
        _ => FailureKind::Unknown,
    }
}
