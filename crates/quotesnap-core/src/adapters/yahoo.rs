use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::source::{QuoteMap, QuoteSource, SourceError};
use crate::{MarketDate, QuotePoint, Symbol};

const REFERER: &str = "https://finance.yahoo.com/";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const CHART_HOSTS: [&str; 2] = [
    "https://query1.finance.yahoo.com",
    "https://query2.finance.yahoo.com",
];
const QUOTE_FIELDS: &str = "regularMarketPrice,regularMarketTime,currency,gmtOffSetMilliseconds";

// ============================================================================
// Yahoo Auth Manager - cookie/crumb session handling
// ============================================================================

#[derive(Debug, Clone)]
struct CachedCrumb {
    value: String,
    fetched_at: Instant,
}

/// Manages the Yahoo Finance session crumb.
///
/// Yahoo's unofficial quote API requires:
/// 1. A session cookie from fc.yahoo.com (kept by the client's cookie jar)
/// 2. A crumb token from `/v1/test/getcrumb`, passed as a query parameter
#[derive(Debug)]
pub struct YahooAuthManager {
    crumb: Mutex<Option<CachedCrumb>>,
    ttl: Duration,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self {
            crumb: Mutex::new(None),
            ttl: Duration::from_secs(3600),
        }
    }
}

impl YahooAuthManager {
    fn cached(&self) -> Option<String> {
        let guard = self.crumb.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.value.clone())
    }

    /// Current crumb, refreshing the session when missing or expired.
    pub async fn crumb(&self, http_client: &dyn HttpClient) -> Result<String, SourceError> {
        if let Some(crumb) = self.cached() {
            return Ok(crumb);
        }

        let crumb = Self::fetch_crumb(http_client).await?;
        *self.crumb.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedCrumb {
            value: crumb.clone(),
            fetched_at: Instant::now(),
        });
        Ok(crumb)
    }

    /// Drops the cached crumb so the next call refreshes the session.
    pub fn invalidate(&self) {
        *self.crumb.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn fetch_crumb(http_client: &dyn HttpClient) -> Result<String, SourceError> {
        // fc.yahoo.com answers 404 but still sets the session cookie.
        let cookie_request = HttpRequest::get(COOKIE_URL).with_header("referer", REFERER);
        http_client.execute(cookie_request).await.map_err(|e| {
            SourceError::unavailable(format!("failed to fetch Yahoo cookie: {}", e.message()))
        })?;

        for endpoint in CRUMB_URLS {
            let request = HttpRequest::get(endpoint).with_header("referer", REFERER);
            let Ok(response) = http_client.execute(request).await else {
                continue;
            };
            let body = response.body.trim();

            if response.status == 429 || body.to_ascii_lowercase().contains("too many requests") {
                return Err(SourceError::rate_limited(
                    "Yahoo rate limited while fetching crumb",
                ));
            }
            if !response.is_success() || body.contains("<html") || body.contains("<!DOCTYPE") {
                continue;
            }
            if !body.is_empty() && body.len() < 100 && !body.contains(' ') {
                return Ok(body.to_owned());
            }
        }

        Err(SourceError::unavailable(
            "failed to fetch Yahoo crumb from all endpoints",
        ))
    }
}

// ============================================================================
// Yahoo Quote Source
// ============================================================================

/// Yahoo Finance quote source: v7 `quote` for batches, v8 `chart` for single symbols.
#[derive(Clone)]
pub struct YahooQuoteSource {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    auth_manager: Arc<YahooAuthManager>,
    default_currency: String,
    timeout_ms: u64,
}

impl YahooQuoteSource {
    pub fn new(http_client: Arc<dyn HttpClient>, default_currency: impl Into<String>) -> Self {
        Self {
            http_client,
            auth: HttpAuth::None,
            auth_manager: Arc::new(YahooAuthManager::default()),
            default_currency: default_currency.into(),
            timeout_ms: 10_000,
        }
    }

    /// Uses a fixed session cookie from `YAHOO_COOKIE` when set.
    pub fn with_env_auth(mut self) -> Self {
        if let Ok(cookie) = std::env::var("YAHOO_COOKIE") {
            if !cookie.trim().is_empty() {
                self.auth = HttpAuth::Cookie(cookie);
            }
        }
        self
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn request(&self, url: impl Into<String>) -> HttpRequest {
        HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms)
    }

    fn quote_url(symbols: &[Symbol], crumb: &str) -> String {
        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{QUOTE_URL}?symbols={}&fields={QUOTE_FIELDS}&crumb={}",
            urlencoding::encode(&joined),
            urlencoding::encode(crumb)
        )
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SourceError> {
        self.http_client.execute(request).await.map_err(|e| {
            if e.retryable() {
                SourceError::unavailable(format!("yahoo transport error: {}", e.message()))
            } else {
                SourceError::internal(format!("yahoo transport error: {}", e.message()))
            }
        })
    }

    /// Batch quote call with one crumb refresh on 401/429.
    async fn fetch_batch(&self, symbols: &[Symbol]) -> Result<QuoteMap, SourceError> {
        if symbols.is_empty() {
            return Ok(QuoteMap::new());
        }

        let crumb = self.auth_manager.crumb(self.http_client.as_ref()).await?;
        let mut response = self
            .send(self.request(Self::quote_url(symbols, &crumb)))
            .await?;

        if response.status == 401 || response.status == 429 {
            self.auth_manager.invalidate();
            let crumb = self.auth_manager.crumb(self.http_client.as_ref()).await?;
            response = self
                .send(self.request(Self::quote_url(symbols, &crumb)))
                .await?;
            if response.status == 429 {
                return Err(SourceError::rate_limited(
                    "yahoo returned 429 after auth refresh",
                ));
            }
        }

        if !response.is_success() {
            return Err(SourceError::unavailable(format!(
                "yahoo returned status {}",
                response.status
            )));
        }

        parse_quote_response(&response.body, &self.default_currency)
    }

    /// Chart lookup for one symbol, trying each query host in turn.
    async fn fetch_chart(&self, symbol: &Symbol) -> Result<Option<QuotePoint>, SourceError> {
        let mut last_error = SourceError::unavailable("no chart host attempted");

        for host in CHART_HOSTS {
            let url = format!(
                "{host}/v8/finance/chart/{}?range=10d&interval=1d",
                urlencoding::encode(symbol.as_str())
            );
            let response = match self.send(self.request(url)).await {
                Ok(response) => response,
                Err(error) => {
                    last_error = error;
                    continue;
                }
            };

            if response.status == 404 {
                return Ok(None);
            }
            if !response.is_success() {
                last_error = SourceError::unavailable(format!(
                    "yahoo chart returned status {}",
                    response.status
                ));
                continue;
            }

            return parse_chart_response(&response.body, &self.default_currency);
        }

        Err(last_error)
    }
}

impl QuoteSource for YahooQuoteSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn quote_batch<'a>(
        &'a self,
        symbols: &'a [Symbol],
    ) -> Pin<Box<dyn Future<Output = Result<QuoteMap, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_batch(symbols))
    }

    fn quote_single<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QuotePoint>, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_chart(symbol))
    }
}

fn parse_quote_response(body: &str, default_currency: &str) -> Result<QuoteMap, SourceError> {
    let response: YahooQuoteResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse yahoo quote: {e}")))?;

    if let Some(error) = response.quote_response.error.filter(|e| !e.is_null()) {
        return Err(SourceError::unavailable(format!("yahoo API error: {error}")));
    }

    let quotes = response
        .quote_response
        .result
        .into_iter()
        .filter_map(|quote| {
            let symbol = Symbol::parse(&quote.symbol).ok()?;
            let market_date = quote.regular_market_time.and_then(|seconds| {
                let offset = quote.gmt_offset_milliseconds.unwrap_or(0) / 1000;
                MarketDate::from_unix_with_offset(seconds, offset).ok()
            });
            let currency = quote
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| default_currency.to_owned());
            let point = QuotePoint::new(quote.regular_market_price?, currency, market_date).ok()?;
            Some((symbol, point))
        })
        .collect();

    Ok(quotes)
}

fn parse_chart_response(
    body: &str,
    default_currency: &str,
) -> Result<Option<QuotePoint>, SourceError> {
    let response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse yahoo chart: {e}")))?;

    if response.chart.error.is_some_and(|e| !e.is_null()) {
        return Ok(None);
    }
    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };

    let closes = result
        .indicators
        .quote
        .first()
        .map(|q| q.close.as_slice())
        .unwrap_or_default();
    let timestamps = result.timestamp.unwrap_or_default();

    let latest = closes
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, close)| close.filter(|c| c.is_finite() && *c > 0.0).map(|c| (i, c)));
    let Some((index, close)) = latest else {
        return Ok(None);
    };

    let offset = result.meta.gmtoffset.unwrap_or(0);
    let market_date = timestamps
        .get(index)
        .and_then(|&ts| MarketDate::from_unix_with_offset(ts, offset).ok());
    let currency = result
        .meta
        .currency
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| default_currency.to_owned());

    Ok(QuotePoint::new(close, currency, market_date).ok())
}

// Yahoo Finance API response structures
#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: YahooQuoteResponseData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteResponseData {
    #[serde(default)]
    result: Vec<YahooQuoteData>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteData {
    symbol: String,
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
    currency: Option<String>,
    #[serde(rename = "gmtOffSetMilliseconds")]
    gmt_offset_milliseconds: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    meta: YahooChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YahooChartMeta {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpError;

    /// Answers each request with the first canned response whose key occurs in the URL.
    struct RoutingHttpClient {
        routes: Vec<(&'static str, Result<HttpResponse, HttpError>)>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RoutingHttpClient {
        fn new(routes: Vec<(&'static str, Result<HttpResponse, HttpError>)>) -> Self {
            Self {
                routes,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    impl HttpClient for RoutingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = self
                .routes
                .iter()
                .find(|(key, _)| request.url.contains(key))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "")));
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            Box::pin(async move { response })
        }
    }

    const QUOTE_BODY: &str = r#"{"quoteResponse":{"result":[
        {"symbol":"BHP.AX","regularMarketPrice":45.12,"currency":"AUD","regularMarketTime":1704171600,"gmtOffSetMilliseconds":39600000},
        {"symbol":"CBA.AX","regularMarketPrice":null,"currency":"AUD"},
        {"symbol":"NAB.AX","regularMarketPrice":33.5}
    ],"error":null}}"#;

    const CHART_BODY: &str = r#"{"chart":{"result":[{
        "meta":{"currency":"AUD","gmtoffset":39600},
        "timestamp":[1704085200,1704171600,1704258000],
        "indicators":{"quote":[{"close":[10.5,11.25,null]}]}
    }],"error":null}}"#;

    fn symbols(values: &[&str]) -> Vec<Symbol> {
        values
            .iter()
            .map(|value| Symbol::parse(value).expect("valid symbol"))
            .collect()
    }

    fn source(client: Arc<RoutingHttpClient>) -> YahooQuoteSource {
        YahooQuoteSource::new(client, "AUD")
    }

    #[tokio::test]
    async fn batch_quote_parses_priced_symbols_only() {
        let client = Arc::new(RoutingHttpClient::new(vec![
            ("fc.yahoo.com", Ok(HttpResponse::with_status(404, ""))),
            ("getcrumb", Ok(HttpResponse::ok("abcCrumb"))),
            ("/v7/finance/quote", Ok(HttpResponse::ok(QUOTE_BODY))),
        ]));
        let yahoo = source(client.clone());

        let found = yahoo
            .quote_batch(&symbols(&["BHP.AX", "CBA.AX", "NAB.AX"]))
            .await
            .expect("batch should succeed");

        assert_eq!(found.len(), 2);
        let bhp = &found[&Symbol::parse("BHP.AX").expect("valid")];
        assert_eq!(bhp.price, 45.12);
        assert_eq!(bhp.market_date.map(MarketDate::format).as_deref(), Some("2024-01-02"));
        let nab = &found[&Symbol::parse("NAB.AX").expect("valid")];
        assert_eq!(nab.currency, "AUD", "missing currency falls back to default");

        let quote_url = client
            .urls()
            .into_iter()
            .find(|url| url.contains("/v7/finance/quote"))
            .expect("quote endpoint called");
        assert!(quote_url.contains("symbols=BHP.AX%2CCBA.AX%2CNAB.AX"));
        assert!(quote_url.contains("crumb=abcCrumb"));
    }

    #[tokio::test]
    async fn crumb_is_cached_between_batches() {
        let client = Arc::new(RoutingHttpClient::new(vec![
            ("fc.yahoo.com", Ok(HttpResponse::ok(""))),
            ("getcrumb", Ok(HttpResponse::ok("abcCrumb"))),
            ("/v7/finance/quote", Ok(HttpResponse::ok(QUOTE_BODY))),
        ]));
        let yahoo = source(client.clone());

        for _ in 0..2 {
            yahoo
                .quote_batch(&symbols(&["BHP.AX"]))
                .await
                .expect("batch should succeed");
        }

        let crumb_calls = client
            .urls()
            .iter()
            .filter(|url| url.contains("getcrumb"))
            .count();
        assert_eq!(crumb_calls, 1);
    }

    #[tokio::test]
    async fn persistent_rate_limit_is_retryable() {
        let client = Arc::new(RoutingHttpClient::new(vec![
            ("fc.yahoo.com", Ok(HttpResponse::ok(""))),
            ("getcrumb", Ok(HttpResponse::ok("abcCrumb"))),
            ("/v7/finance/quote", Ok(HttpResponse::with_status(429, ""))),
        ]));
        let yahoo = source(client.clone());

        let error = yahoo
            .quote_batch(&symbols(&["BHP.AX"]))
            .await
            .expect_err("429 should surface");

        assert!(error.retryable());
        let quote_calls = client
            .urls()
            .iter()
            .filter(|url| url.contains("/v7/finance/quote"))
            .count();
        assert_eq!(quote_calls, 2, "one retry after refreshing the crumb");
    }

    #[tokio::test]
    async fn garbage_payload_is_not_retryable() {
        let client = Arc::new(RoutingHttpClient::new(vec![
            ("fc.yahoo.com", Ok(HttpResponse::ok(""))),
            ("getcrumb", Ok(HttpResponse::ok("abcCrumb"))),
            ("/v7/finance/quote", Ok(HttpResponse::ok("<html>oops</html>"))),
        ]));

        let error = source(client)
            .quote_batch(&symbols(&["BHP.AX"]))
            .await
            .expect_err("html is not a quote payload");
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn chart_lookup_uses_last_finite_close() {
        let client = Arc::new(RoutingHttpClient::new(vec![(
            "/v8/finance/chart/",
            Ok(HttpResponse::ok(CHART_BODY)),
        )]));

        let point = source(client)
            .quote_single(&Symbol::parse("XYZ.AX").expect("valid"))
            .await
            .expect("chart call should succeed")
            .expect("a close is present");

        assert_eq!(point.price, 11.25);
        assert_eq!(point.market_date.map(MarketDate::format).as_deref(), Some("2024-01-02"));
    }

    #[tokio::test]
    async fn chart_falls_back_to_second_host() {
        let client = Arc::new(RoutingHttpClient::new(vec![
            ("query1.finance.yahoo.com/v8", Err(HttpError::new("connection reset"))),
            ("query2.finance.yahoo.com/v8", Ok(HttpResponse::ok(CHART_BODY))),
        ]));

        let point = source(client.clone())
            .quote_single(&Symbol::parse("XYZ.AX").expect("valid"))
            .await
            .expect("second host answers");

        assert!(point.is_some());
        assert_eq!(client.urls().len(), 2);
    }

    #[tokio::test]
    async fn unknown_symbol_has_no_price() {
        let client = Arc::new(RoutingHttpClient::new(vec![]));

        let point = source(client)
            .quote_single(&Symbol::parse("NOPE.AX").expect("valid"))
            .await
            .expect("404 is not an error");
        assert!(point.is_none());
    }

    #[test]
    fn cookie_override_is_sent_with_requests() {
        let client = Arc::new(RoutingHttpClient::new(vec![]));
        let yahoo = source(client).with_auth(HttpAuth::Cookie(String::from("B=secure")));

        let request = yahoo.request("https://query1.finance.yahoo.com/v7/finance/quote");
        assert_eq!(request.headers.get("cookie").map(String::as_str), Some("B=secure"));
        assert_eq!(request.headers.get("referer").map(String::as_str), Some(REFERER));
    }
}
