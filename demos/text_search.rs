use std::time::Duration;

use geoapi_http::{places, RequestContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let key = std::env::var("GEOAPI_KEY")?;
    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "pizza in New York".to_owned());

    let ctx = RequestContext::builder()
        .api_key(key)
        .query_rate_limit(10)
        .retry_timeout(Duration::from_secs(30))
        .build()?;

    let mut page = places::text_search_query(&ctx, query).submit()?.await?;
    loop {
        for place in &page.results {
            println!("{}", place["name"].as_str().unwrap_or("<unnamed>"));
        }
        let Some(next) = page.next_page(&ctx) else {
            break;
        };
        // Page tokens take a moment to become valid upstream.
        tokio::time::sleep(Duration::from_secs(2)).await;
        page = next.submit()?.await?;
    }

    Ok(())
}
