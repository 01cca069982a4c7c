//! Response-parsing contract shared by every endpoint.

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use crate::{ErrorClassifier, GeoApiError, Result};

/// Response body shape for one endpoint.
///
/// Deserialization is the "raw bytes to response" step; [`into_output`]
/// is the "response to result" step. The context only calls `into_output`
/// for bodies whose status reports success.
///
/// [`into_output`]: ApiResponse::into_output
pub trait ApiResponse: DeserializeOwned + Send + 'static {
    /// Value delivered to the caller on success.
    type Output: Send + 'static;

    /// The body's `status` field.
    fn status(&self) -> Option<&str>;

    /// The body's `error_message` field.
    fn error_message(&self) -> Option<&str> {
        None
    }

    /// `OK` and `ZERO_RESULTS` are both success.
    fn is_successful(&self) -> bool {
        matches!(self.status(), Some("OK" | "ZERO_RESULTS"))
    }

    fn into_output(self) -> Result<Self::Output>;
}

/// Untyped response: status fields plus the remaining JSON members.
#[derive(Clone, Debug, Deserialize)]
pub struct JsonResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ApiResponse for JsonResponse {
    type Output = Map<String, Value>;

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn into_output(self) -> Result<Self::Output> {
        Ok(self.body)
    }
}

/// Turns a transported response into the endpoint's output or a classified error.
pub(crate) fn decode_response<R: ApiResponse>(
    http_status: StatusCode,
    body: &[u8],
) -> Result<R::Output> {
    let response = match serde_json::from_slice::<R>(body) {
        Ok(response) => response,
        Err(err) if http_status.is_success() => {
            return Err(GeoApiError::Decode(format!(
                "invalid response JSON: {err}; body: {}",
                body_excerpt(body)
            )));
        }
        Err(_) => return Err(ErrorClassifier::api_error(http_status, None, None)),
    };

    if response.is_successful() {
        return response.into_output();
    }

    match response.status() {
        None if http_status.is_success() => Err(GeoApiError::Decode(
            "response is missing the status field".to_owned(),
        )),
        status => Err(ErrorClassifier::api_error(
            http_status,
            status,
            response.error_message(),
        )),
    }
}

const BODY_EXCERPT_CHARS: usize = 200;

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}... ({} bytes)", &text[..cut], body.len()),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{decode_response, JsonResponse};
    use crate::{FailureKind, GeoApiError};

    #[test]
    fn ok_body_yields_members() {
        let body = br#"{"status":"OK","results":[{"place_id":"abc"}]}"#;
        let output = decode_response::<JsonResponse>(StatusCode::OK, body).expect("must decode");
        assert!(output.contains_key("results"));
        assert!(!output.contains_key("status"));
    }

    #[test]
    fn zero_results_is_success() {
        let body = br#"{"status":"ZERO_RESULTS","results":[]}"#;
        let output = decode_response::<JsonResponse>(StatusCode::OK, body).expect("must decode");
        assert_eq!(output["results"], serde_json::json!([]));
    }

    #[test]
    fn malformed_success_body_is_decode_error() {
        let err = decode_response::<JsonResponse>(StatusCode::OK, b"{\"status\": \"OK\"")
            .expect_err("must fail");
        assert!(matches!(err, GeoApiError::Decode(_)));
    }

    #[test]
    fn decode_error_quotes_only_a_body_prefix() {
        let page = format!("<html>{}</html>", "x".repeat(10_000));
        let err = decode_response::<JsonResponse>(StatusCode::OK, page.as_bytes())
            .expect_err("must fail");
        let message = err.to_string();
        assert!(message.contains("<html>xxx"));
        assert!(message.contains("(10013 bytes)"));
        assert!(message.len() < 500, "message was {} bytes", message.len());
    }

    #[test]
    fn missing_status_is_decode_error() {
        let err = decode_response::<JsonResponse>(StatusCode::OK, b"{}").expect_err("must fail");
        assert!(matches!(err, GeoApiError::Decode(_)));
    }

    #[test]
    fn plain_text_server_error_is_classified() {
        let err = decode_response::<JsonResponse>(
            StatusCode::INTERNAL_SERVER_ERROR,
            b"Uh-oh. Server Error.",
        )
        .expect_err("must fail");
        assert_eq!(err.kind(), Some(FailureKind::ServerError));
        assert_eq!(err.to_string(), "Server Error: 500 Internal Server Error");
    }

    #[test]
    fn api_status_carries_error_message() {
        let body = br#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid."}"#;
        let err = decode_response::<JsonResponse>(StatusCode::OK, body).expect_err("must fail");
        match err {
            GeoApiError::Api {
                kind,
                status,
                message,
            } => {
                assert_eq!(kind, FailureKind::RequestDenied);
                assert_eq!(status.as_deref(), Some("REQUEST_DENIED"));
                assert_eq!(message, "The provided API key is invalid.");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
