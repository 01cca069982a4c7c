use crate::FailureKind;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum GeoApiError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The response arrived but its body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// Error reported by the remote API, classified by status.
    #[error("{message}")]
    Api {
        /// Classified failure kind.
        kind: FailureKind,
        /// Raw `status` field from the response body, when present.
        status: Option<String>,
        /// Upstream error message, or a description of the HTTP status.
        message: String,
    },
    /// Caller input was rejected before any network I/O.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The context could not be constructed from the given configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// The call was cancelled before it reached a terminal state.
    #[error("request cancelled")]
    Cancelled,
}

impl GeoApiError {
    /// Returns the failure kind used for retry classification.
    ///
    /// Validation, configuration and cancellation errors have no kind: they
    /// never enter the retry loop.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Transport(_) | Self::Decode(_) => Some(FailureKind::NetworkError),
            Self::Api { kind, .. } => Some(*kind),
            Self::Validation(_) | Self::Config(_) | Self::Cancelled => None,
        }
    }

    pub(crate) fn api(kind: FailureKind, status: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            status: status.map(str::to_owned),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{FailureKind, GeoApiError};

    #[test]
    fn api_error_displays_upstream_message() {
        let err = GeoApiError::api(
            FailureKind::ServerError,
            None,
            "Server Error: 500 Internal Server Error",
        );
        assert_eq!(err.to_string(), "Server Error: 500 Internal Server Error");
        assert_eq!(err.kind(), Some(FailureKind::ServerError));
    }

    #[test]
    fn decode_errors_are_network_class() {
        let err = GeoApiError::Decode("unexpected end of input".to_owned());
        assert_eq!(err.kind(), Some(FailureKind::NetworkError));
    }

    #[test]
    fn validation_errors_have_no_kind() {
        assert_eq!(GeoApiError::Validation("radius".to_owned()).kind(), None);
        assert_eq!(GeoApiError::Cancelled.kind(), None);
    }
}
