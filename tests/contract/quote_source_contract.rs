//! Contract tests for quote sources driven through `BulkQuoter`.
//!
//! Any source, scripted or Yahoo-backed, must yield a subset of the requested symbols and
//! never turn a bad batch into a failed run.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quotesnap_core::{
    BulkQuoter, HttpClient, HttpError, HttpRequest, HttpResponse, QuoteSource, RetryConfig,
    YahooQuoteSource,
};
use quotesnap_tests::{point, symbol, symbols, ScriptedSource};

/// Canned transport: crumb endpoints succeed, quote calls answer with `quote_body`.
struct CannedHttpClient {
    quote_status: u16,
    quote_body: String,
    urls: Mutex<Vec<String>>,
}

impl CannedHttpClient {
    fn new(quote_status: u16, quote_body: &str) -> Self {
        Self {
            quote_status,
            quote_body: quote_body.to_owned(),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn quote_calls(&self) -> usize {
        self.urls
            .lock()
            .expect("url log should not be poisoned")
            .iter()
            .filter(|url| url.contains("/v7/finance/quote"))
            .count()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = if request.url.contains("getcrumb") {
            HttpResponse::ok("crumb123")
        } else if request.url.contains("/v7/finance/quote") {
            HttpResponse::with_status(self.quote_status, self.quote_body.clone())
        } else {
            HttpResponse::with_status(404, "")
        };
        self.urls
            .lock()
            .expect("url log should not be poisoned")
            .push(request.url);
        Box::pin(async move { Ok(response) })
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig::fixed(Duration::ZERO, 3)
}

#[tokio::test]
async fn bulk_result_is_a_subset_of_the_request() {
    // Given: A source that prices one requested symbol and volunteers an unrequested one
    let source = ScriptedSource::new()
        .with_batch("AAA.AX", point(1.0, "2024-01-02"))
        .with_unsolicited("ZZZ.AX", point(9.0, "2024-01-02"));
    let quoter = BulkQuoter::new(source, fast_retry());

    // When: Two symbols are fetched in bulk
    let found = quoter.fetch_bulk(&symbols(&["AAA.AX", "BBB.AX"]), 200).await;

    // Then: Only the requested, priced symbol comes back
    assert_eq!(found.len(), 1);
    assert!(found.contains_key(&symbol("AAA.AX")));
}

#[tokio::test]
async fn bulk_chunks_never_exceed_batch_size() {
    // Given: Seven symbols and a batch size of three
    let source = Arc::new(ScriptedSource::new());
    let quoter = BulkQuoter::new(Arc::clone(&source), fast_retry());
    let names = (0..7).map(|i| format!("C{i}.AX")).collect::<Vec<_>>();
    let input = names.iter().map(|n| symbol(n)).collect::<Vec<_>>();

    // When: They are fetched in bulk
    quoter.fetch_bulk(&input, 3).await;

    // Then: The provider saw chunks of 3, 3 and 1, covering the input in order
    let sizes = source.batch_calls().iter().map(Vec::len).collect::<Vec<_>>();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(source.batch_calls().concat(), input);
}

#[tokio::test]
async fn failing_batches_yield_an_empty_map_not_an_error() {
    // Given: A provider that fails more often than the retry budget allows
    let source = Arc::new(
        ScriptedSource::new()
            .with_batch("AAA.AX", point(1.0, "2024-01-02"))
            .failing_first_batches(10),
    );
    let quoter = BulkQuoter::new(Arc::clone(&source), fast_retry());

    // When: One batch is fetched
    let found = quoter.fetch_bulk(&symbols(&["AAA.AX"]), 200).await;

    // Then: The batch was tried three times, then abandoned quietly
    assert!(found.is_empty());
    assert_eq!(source.batch_calls().len(), 3);
}

#[tokio::test]
async fn yahoo_partial_response_is_a_partial_map() {
    // Given: Yahoo answers with a price for BHP only
    let body = r#"{"quoteResponse":{"result":[
        {"symbol":"BHP.AX","regularMarketPrice":45.5,"currency":"AUD","regularMarketTime":1704171600,"gmtOffSetMilliseconds":39600000}
    ],"error":null}}"#;
    let client = Arc::new(CannedHttpClient::new(200, body));
    let quoter = BulkQuoter::new(YahooQuoteSource::new(client.clone(), "AUD"), fast_retry());

    // When: BHP and an unknown symbol are fetched
    let found = quoter.fetch_bulk(&symbols(&["BHP.AX", "NOPE.AX"]), 200).await;

    // Then: BHP is priced, the unknown symbol is simply absent, and one call sufficed
    assert_eq!(found.len(), 1);
    assert_eq!(found[&symbol("BHP.AX")].price, 45.5);
    assert_eq!(client.quote_calls(), 1);
    assert_eq!(quoter.source().name(), "yahoo");
}

#[tokio::test]
async fn yahoo_server_errors_are_retried_then_abandoned() {
    // Given: Yahoo keeps answering 503
    let client = Arc::new(CannedHttpClient::new(503, "service unavailable"));
    let quoter = BulkQuoter::new(YahooQuoteSource::new(client.clone(), "AUD"), fast_retry());

    // When: One batch is fetched
    let found = quoter.fetch_bulk(&symbols(&["BHP.AX"]), 200).await;

    // Then: All three attempts were spent and nothing was returned
    assert!(found.is_empty());
    assert_eq!(client.quote_calls(), 3);
}

#[tokio::test]
async fn yahoo_undecodable_payload_is_not_retried() {
    // Given: Yahoo answers 200 with something that is not a quote document
    let client = Arc::new(CannedHttpClient::new(200, "<html>consent required</html>"));
    let quoter = BulkQuoter::new(YahooQuoteSource::new(client.clone(), "AUD"), fast_retry());

    // When: One batch is fetched
    let found = quoter.fetch_bulk(&symbols(&["BHP.AX"]), 200).await;

    // Then: The batch is abandoned after a single call
    assert!(found.is_empty());
    assert_eq!(client.quote_calls(), 1);
}

#[tokio::test]
async fn single_lookup_errors_become_absent() {
    // Given: A Yahoo source whose chart endpoint knows nothing (404)
    let client = Arc::new(CannedHttpClient::new(200, "{}"));
    let quoter = BulkQuoter::new(YahooQuoteSource::new(client, "AUD"), fast_retry());

    // When / Then: The single lookup reports no price rather than failing
    assert!(quoter.fetch_single(&symbol("NOPE.AX")).await.is_none());
}
