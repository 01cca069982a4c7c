//! `geoapi-http` is the request-execution core of an async client for
//! geographic web-service APIs (place search, geocoding and similar).
//!
//! A [`RequestContext`] owns the pieces every call goes through:
//! - a shared [`RateLimiter`] spacing requests across all concurrent callers;
//! - a [`RequestSigner`] attaching an API key or a client ID and signature;
//! - an [`ErrorClassifier`] and [`RetryPolicy`] deciding which failures are
//!   retried and when.
//!
//! Each call is submitted with [`RequestContext::get`] and returns a
//! [`PendingResult`], which can be awaited, waited on from a blocking
//! thread, or given callbacks.
//!
//! ```no_run
//! use geoapi_http::{places, RequestContext};
//!
//! # async fn run() -> geoapi_http::Result<()> {
//! let ctx = RequestContext::new("AIza...")?;
//! let page = places::text_search_query(&ctx, "pizza in New York")
//!     .submit()?
//!     .await?;
//! println!("{} results", page.results.len());
//! # Ok(())
//! # }
//! ```

mod classify;
mod context;
mod descriptor;
mod error;
mod options;
mod pending;
mod rate_limit;
mod response;
mod retry;
mod signer;

pub mod places;

pub use classify::{ErrorClassifier, FailureKind, RetryToggles, Verdict};
pub use context::{ContextBuilder, RequestContext, DEFAULT_BASE_URL, USER_AGENT};
pub use descriptor::RequestDescriptor;
pub use error::GeoApiError;
pub use options::ClientOptions;
pub use pending::{CancelHandle, PendingResult, ResultState};
pub use rate_limit::RateLimiter;
pub use response::{ApiResponse, JsonResponse};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use signer::{Credentials, RequestSigner};

pub type Result<T> = std::result::Result<T, GeoApiError>;
