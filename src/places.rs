//! Places text search.
//!
//! Individual place results are passed through as raw JSON values.

use serde::Deserialize;
use serde_json::Value;

use crate::{ApiResponse, GeoApiError, PendingResult, RequestContext, RequestDescriptor, Result};

pub const TEXT_SEARCH_PATH: &str = "/maps/api/place/textsearch/json";

const MAX_RADIUS_METERS: u32 = 50_000;
const MAX_PRICE_LEVEL: u8 = 4;

/// Starts a text search such as `"pizza in New York"`.
pub fn text_search_query(context: &RequestContext, query: impl Into<String>) -> TextSearchRequest {
    TextSearchRequest::new(context).query(query)
}

/// Fetches the page after a previous search.
///
/// The token encodes the original search; no other parameters are sent.
pub fn text_search_next_page(
    context: &RequestContext,
    next_page_token: impl Into<String>,
) -> TextSearchRequest {
    TextSearchRequest::new(context).page_token(next_page_token)
}

/// Parameters for one text search call.
///
/// Setters only record values. All checks happen in [`validate`](Self::validate),
/// which [`submit`](Self::submit) runs before anything is sent.
#[derive(Clone, Debug)]
pub struct TextSearchRequest {
    context: RequestContext,
    query: Option<String>,
    location: Option<(f64, f64)>,
    radius: Option<u32>,
    min_price: Option<u8>,
    max_price: Option<u8>,
    open_now: Option<bool>,
    page_token: Option<String>,
}

impl TextSearchRequest {
    pub fn new(context: &RequestContext) -> Self {
        Self {
            context: context.clone(),
            query: None,
            location: None,
            radius: None,
            min_price: None,
            max_price: None,
            open_now: None,
            page_token: None,
        }
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Latitude/longitude to bias results around. Requires a radius.
    pub fn location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some((lat, lng));
        self
    }

    /// Bias radius in meters, at most 50 000.
    pub fn radius(mut self, meters: u32) -> Self {
        self.radius = Some(meters);
        self
    }

    pub fn min_price(mut self, level: u8) -> Self {
        self.min_price = Some(level);
        self
    }

    pub fn max_price(mut self, level: u8) -> Self {
        self.max_price = Some(level);
        self
    }

    pub fn open_now(mut self, open_now: bool) -> Self {
        self.open_now = Some(open_now);
        self
    }

    pub fn page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Checks the assembled parameters.
    pub fn validate(&self) -> Result<()> {
        let has_query = self.query.as_deref().is_some_and(|q| !q.trim().is_empty());
        let has_token = self.page_token.as_deref().is_some_and(|t| !t.is_empty());
        if !has_query && !has_token {
            return Err(invalid("request must contain 'query' or a 'pagetoken'"));
        }
        if let Some((lat, lng)) = self.location {
            if self.radius.is_none() {
                return Err(invalid(
                    "request must contain 'radius' when it contains 'location'",
                ));
            }
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(invalid(format!("location {lat},{lng} is out of range")));
            }
        }
        if self.radius.is_some_and(|r| r > MAX_RADIUS_METERS) {
            return Err(invalid("the maximum allowed radius is 50,000 meters"));
        }
        if self.min_price.is_some_and(|p| p > MAX_PRICE_LEVEL) {
            return Err(invalid("minprice must be between 0 and 4, inclusive"));
        }
        if self.max_price.is_some_and(|p| p > MAX_PRICE_LEVEL) {
            return Err(invalid("maxprice must be between 0 and 4, inclusive"));
        }
        Ok(())
    }

    /// Query parameters in wire order.
    pub fn descriptor(&self) -> RequestDescriptor {
        let descriptor = RequestDescriptor::new(TEXT_SEARCH_PATH).with_response_shape("text_search");
        if let Some(token) = &self.page_token {
            return descriptor.param("pagetoken", token.as_str());
        }

        let mut descriptor = descriptor;
        if let Some(query) = &self.query {
            descriptor = descriptor.param("query", query.as_str());
        }
        if let Some((lat, lng)) = self.location {
            descriptor = descriptor.param("location", format!("{lat:.8},{lng:.8}"));
        }
        if let Some(radius) = self.radius {
            descriptor = descriptor.param("radius", radius.to_string());
        }
        if let Some(level) = self.min_price {
            descriptor = descriptor.param("minprice", level.to_string());
        }
        if let Some(level) = self.max_price {
            descriptor = descriptor.param("maxprice", level.to_string());
        }
        if let Some(open_now) = self.open_now {
            descriptor = descriptor.param("opennow", open_now.to_string());
        }
        descriptor
    }

    /// Validates and submits the search.
    ///
    /// Validation failures are returned here, before any network I/O.
    pub fn submit(&self) -> Result<PendingResult<PlacesSearchResponse>> {
        self.validate()?;
        Ok(self.context.get::<TextSearchResponse>(self.descriptor()))
    }
}

/// One page of search results.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacesSearchResponse {
    pub html_attributions: Vec<String>,
    pub results: Vec<Value>,
    pub next_page_token: Option<String>,
}

impl PlacesSearchResponse {
    /// Request for the following page, if there is one.
    pub fn next_page(&self, context: &RequestContext) -> Option<TextSearchRequest> {
        self.next_page_token
            .as_deref()
            .map(|token| text_search_next_page(context, token))
    }
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    html_attributions: Vec<String>,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl ApiResponse for TextSearchResponse {
    type Output = PlacesSearchResponse;

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn into_output(self) -> Result<Self::Output> {
        Ok(PlacesSearchResponse {
            html_attributions: self.html_attributions,
            results: self.results,
            next_page_token: self.next_page_token,
        })
    }
}

fn invalid(message: impl Into<String>) -> GeoApiError {
    GeoApiError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::{text_search_next_page, text_search_query, TextSearchRequest};
    use crate::{GeoApiError, RequestContext};

    fn context() -> RequestContext {
        RequestContext::builder()
            .api_key("AIza-test")
            .base_url("http://127.0.0.1:9")
            .build()
            .expect("must build")
    }

    fn assert_invalid(request: &TextSearchRequest) {
        assert!(matches!(
            request.validate(),
            Err(GeoApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn query_or_page_token_is_required() {
        let ctx = context();
        assert_invalid(&TextSearchRequest::new(&ctx));
        assert!(text_search_query(&ctx, "restaurant").validate().is_ok());
        assert!(text_search_next_page(&ctx, "CpQCAgEAAF").validate().is_ok());
    }

    #[tokio::test]
    async fn location_requires_radius() {
        let ctx = context();
        assert_invalid(&text_search_query(&ctx, "pizza").location(40.7, -74.0));
        assert!(text_search_query(&ctx, "pizza")
            .location(40.7, -74.0)
            .radius(500)
            .validate()
            .is_ok());
    }

    #[tokio::test]
    async fn ranges_are_checked_regardless_of_setter_order() {
        let ctx = context();
        assert_invalid(&text_search_query(&ctx, "pizza").radius(50_001));
        assert_invalid(&text_search_query(&ctx, "pizza").min_price(5));
        assert_invalid(&text_search_query(&ctx, "pizza").max_price(9));
        assert_invalid(&TextSearchRequest::new(&ctx).max_price(9).query("pizza"));
    }

    #[tokio::test]
    async fn submit_rejects_invalid_request_before_dispatch() {
        let ctx = context();
        let err = text_search_query(&ctx, "pizza")
            .radius(60_000)
            .submit()
            .expect_err("must reject");
        assert!(matches!(err, GeoApiError::Validation(_)));
    }

    #[tokio::test]
    async fn descriptor_orders_parameters() {
        let ctx = context();
        let descriptor = text_search_query(&ctx, "pizza")
            .open_now(true)
            .location(1.5, 2.25)
            .radius(1000)
            .min_price(1)
            .max_price(3)
            .descriptor();
        assert_eq!(
            descriptor.query_string(),
            "query=pizza&location=1.50000000%2C2.25000000&radius=1000&minprice=1&maxprice=3&opennow=true"
        );
    }

    #[tokio::test]
    async fn next_page_sends_only_the_token() {
        let ctx = context();
        let descriptor = text_search_query(&ctx, "pizza")
            .radius(10)
            .page_token("next-token")
            .descriptor();
        assert_eq!(descriptor.query_string(), "pagetoken=next-token");
    }
}
