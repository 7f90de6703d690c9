//! Quote source contract and the bulk adapter built on top of it.
//!
//! A [`QuoteSource`] performs exactly one provider call per batch or symbol and reports
//! failures as [`SourceError`]. [`BulkQuoter`] turns that into the best-effort contract the
//! fetch pipeline relies on: chunk the symbol list, retry each failed chunk with backoff,
//! and hand back whatever subset of prices it managed to collect. It never fails.
//!
//! | Operation | Provider calls | Failure mode |
//! |-----------|----------------|--------------|
//! | [`BulkQuoter::fetch_bulk`] | one per chunk, retried | chunk dropped, partial map returned |
//! | [`BulkQuoter::fetch_single`] | one | `None` |

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::retry::RetryConfig;
use crate::{QuotePoint, Symbol};

/// Prices keyed by symbol, as returned by one provider call.
pub type QuoteMap = HashMap<Symbol, QuotePoint>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Malformed,
    Internal,
}

/// Structured source error; `retryable` drives the per-batch retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Raw quote provider contract.
///
/// Implementations may silently omit symbols they could not price; only transport-level or
/// payload-level failures are errors.
pub trait QuoteSource: Send + Sync {
    /// Short provider name used in logs and the snapshot `source` field.
    fn name(&self) -> &'static str;

    /// Prices for one batch of symbols in a single provider call.
    fn quote_batch<'a>(
        &'a self,
        symbols: &'a [Symbol],
    ) -> Pin<Box<dyn Future<Output = Result<QuoteMap, SourceError>> + Send + 'a>>;

    /// Slower, dedicated lookup for one symbol. `Ok(None)` means the provider has no price.
    fn quote_single<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QuotePoint>, SourceError>> + Send + 'a>>;
}

impl<S: QuoteSource + ?Sized> QuoteSource for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn quote_batch<'a>(
        &'a self,
        symbols: &'a [Symbol],
    ) -> Pin<Box<dyn Future<Output = Result<QuoteMap, SourceError>> + Send + 'a>> {
        (**self).quote_batch(symbols)
    }

    fn quote_single<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QuotePoint>, SourceError>> + Send + 'a>> {
        (**self).quote_single(symbol)
    }
}

/// Best-effort bulk adapter over a [`QuoteSource`].
#[derive(Debug, Clone)]
pub struct BulkQuoter<S> {
    source: S,
    retry: RetryConfig,
}

impl<S: QuoteSource> BulkQuoter<S> {
    pub fn new(source: S, retry: RetryConfig) -> Self {
        Self { source, retry }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches `symbols` in chunks of `batch_size`, retrying failed chunks.
    ///
    /// Returns only prices for requested symbols; a chunk that exhausts its retries
    /// contributes nothing.
    pub async fn fetch_bulk(&self, symbols: &[Symbol], batch_size: usize) -> QuoteMap {
        let mut prices = QuoteMap::with_capacity(symbols.len());
        if symbols.is_empty() {
            return prices;
        }

        let batch_size = batch_size.max(1);
        let total = symbols.len().div_ceil(batch_size);
        for (index, chunk) in symbols.chunks(batch_size).enumerate() {
            let label = format!("{} chunk {}/{}", self.source.name(), index + 1, total);
            match self
                .retry
                .run(&label, |_| self.source.quote_batch(chunk))
                .await
            {
                Ok(found) => {
                    let requested = chunk.iter().collect::<HashSet<_>>();
                    for (symbol, point) in found {
                        if requested.contains(&symbol) {
                            prices.entry(symbol).or_insert(point);
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!("{label} abandoned: {error}");
                }
            }
        }

        prices
    }

    /// Last-resort lookup for one symbol; errors are logged and reported as `None`.
    pub async fn fetch_single(&self, symbol: &Symbol) -> Option<QuotePoint> {
        match self.source.quote_single(symbol).await {
            Ok(point) => point,
            Err(error) => {
                tracing::debug!(
                    "{} single lookup for {symbol} failed: {error}",
                    self.source.name()
                );
                None
            }
        }
    }
}
