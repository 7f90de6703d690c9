//! Shared fixtures for the quotesnap integration tests: value helpers and a scripted
//! in-memory quote source with call-count spies.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use quotesnap_core::{
    FetchConfig, MarketDate, QuoteMap, QuotePoint, QuoteSource, RetryConfig, SnapshotConfig,
    SourceError, Symbol, UtcDateTime,
};

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

pub fn symbols(values: &[&str]) -> Vec<Symbol> {
    values.iter().map(|value| symbol(value)).collect()
}

pub fn ts(value: &str) -> UtcDateTime {
    UtcDateTime::parse(value).expect("valid timestamp")
}

pub fn point(price: f64, date: &str) -> QuotePoint {
    let market_date = MarketDate::parse(date).expect("valid date");
    QuotePoint::new(price, "AUD", Some(market_date)).expect("valid point")
}

/// Config with no sleeping anywhere, for fast deterministic runs.
pub fn instant_config(batch_size: usize) -> SnapshotConfig {
    SnapshotConfig {
        fetch: FetchConfig::default()
            .with_batch_size(batch_size)
            .expect("non-zero batch size")
            .without_single_delay(),
        retry: RetryConfig::fixed(Duration::ZERO, 3),
        ..SnapshotConfig::default()
    }
}

/// Quote source answering from fixed tables.
///
/// `quote_batch` prices any requested symbol found in `batch`; `quote_single` uses
/// `single`. The first `fail_batches` batch calls fail with a retryable error.
#[derive(Default)]
pub struct ScriptedSource {
    batch: HashMap<Symbol, QuotePoint>,
    single: HashMap<Symbol, QuotePoint>,
    extra: HashMap<Symbol, QuotePoint>,
    fail_batches: AtomicUsize,
    batch_calls: Mutex<Vec<Vec<Symbol>>>,
    single_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(mut self, name: &str, quote: QuotePoint) -> Self {
        self.batch.insert(symbol(name), quote);
        self
    }

    pub fn with_single(mut self, name: &str, quote: QuotePoint) -> Self {
        self.single.insert(symbol(name), quote);
        self
    }

    /// Returned by every batch call, requested or not, unless the batch already priced it.
    pub fn with_unsolicited(mut self, name: &str, quote: QuotePoint) -> Self {
        self.extra.insert(symbol(name), quote);
        self
    }

    pub fn failing_first_batches(self, count: usize) -> Self {
        self.fail_batches.store(count, Ordering::SeqCst);
        self
    }

    pub fn batch_calls(&self) -> Vec<Vec<Symbol>> {
        self.batch_calls
            .lock()
            .expect("call log should not be poisoned")
            .clone()
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }
}

impl QuoteSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn quote_batch<'a>(
        &'a self,
        symbols: &'a [Symbol],
    ) -> Pin<Box<dyn Future<Output = Result<QuoteMap, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.batch_calls
                .lock()
                .expect("call log should not be poisoned")
                .push(symbols.to_vec());

            let failing = self
                .fail_batches
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SourceError::unavailable("connection reset by peer"));
            }

            let mut found = symbols
                .iter()
                .filter_map(|s| self.batch.get(s).map(|q| (s.clone(), q.clone())))
                .collect::<QuoteMap>();
            for (s, q) in &self.extra {
                found.entry(s.clone()).or_insert_with(|| q.clone());
            }
            Ok(found)
        })
    }

    fn quote_single<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QuotePoint>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.single.get(symbol).cloned())
        })
    }
}
