use std::fs;

use geoapi_http::{places, FailureKind, GeoApiError, RequestContext, RequestDescriptor};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SecretsFile {
    #[serde(rename = "GEOAPI_KEY")]
    geoapi_key: Option<String>,
}

fn load_live_api_key() -> Result<String, String> {
    if let Ok(key) = std::env::var("GEOAPI_KEY") {
        return Ok(key);
    }

    let content = fs::read_to_string("secrets.json")
        .map_err(|_| "GEOAPI_KEY env or secrets.json is required".to_owned())?;
    let parsed: SecretsFile = serde_json::from_str(&content)
        .map_err(|err| format!("secrets.json could not be parsed: {err}"))?;
    parsed
        .geoapi_key
        .ok_or_else(|| "missing GEOAPI_KEY in secrets.json".to_owned())
}

#[tokio::test]
async fn live_text_search_and_denied_key() {
    let key = match load_live_api_key() {
        Ok(key) => key,
        Err(_) => {
            eprintln!("skipping live test: credentials not found in env or secrets.json");
            return;
        }
    };

    let ctx = RequestContext::builder()
        .api_key(key)
        .query_rate_limit(5)
        .build()
        .expect("context must build");

    let page = places::text_search_query(&ctx, "Googleplex")
        .submit()
        .expect("request must validate")
        .await
        .expect("text search must succeed");
    assert!(!page.results.is_empty());

    let bogus = RequestContext::builder()
        .api_key("not-a-real-key")
        .build()
        .expect("context must build");
    let err = bogus
        .get_json(RequestDescriptor::new("/maps/api/geocode/json").param("address", "Googleplex"))
        .await
        .expect_err("bogus key must be rejected");
    match err {
        GeoApiError::Api { kind, .. } => assert_eq!(kind, FailureKind::RequestDenied),
        other => panic!("expected request denied, got {other:?}"),
    }
}
