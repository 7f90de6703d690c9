//! Multi-pass fetch driver.
//!
//! Four passes of narrowing batch size run strictly in sequence, each over the symbols the
//! previous passes left unpriced:
//!
//! | Pass | Batch size | Record source |
//! |------|------------|---------------|
//! | [`FetchPass::Bulk`] | `B` | `bulk` |
//! | [`FetchPass::RetryBulk`] | `clamp(B/2, 40, 120)` | `retry_bulk` |
//! | [`FetchPass::RetryBulkSmall`] | `clamp(B/4, 20, 60)` | `retry_bulk_small` |
//! | [`FetchPass::Single`] | one symbol per call | `single` |

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::source::{BulkQuoter, QuoteMap, QuoteSource};
use crate::{FetchStats, PriceRecord, PriceSource, QuotePoint, Symbol, UtcDateTime, ValidationError};

/// One pass of the fetch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchPass {
    Bulk,
    RetryBulk,
    RetryBulkSmall,
    Single,
}

impl FetchPass {
    /// Passes in execution order.
    pub const ALL: [Self; 4] = [
        Self::Bulk,
        Self::RetryBulk,
        Self::RetryBulkSmall,
        Self::Single,
    ];

    /// Batch size used by this pass for a base batch size `base`.
    pub fn batch_size(self, base: usize) -> usize {
        match self {
            Self::Bulk => base.max(1),
            Self::RetryBulk => (base / 2).clamp(40, 120),
            Self::RetryBulkSmall => (base / 4).clamp(20, 60),
            Self::Single => 1,
        }
    }

    pub const fn source(self) -> PriceSource {
        match self {
            Self::Bulk => PriceSource::Bulk,
            Self::RetryBulk => PriceSource::RetryBulk,
            Self::RetryBulkSmall => PriceSource::RetryBulkSmall,
            Self::Single => PriceSource::Single,
        }
    }

    pub const fn as_str(self) -> &'static str {
        self.source().as_str()
    }
}

/// Knobs for one fetch run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Base batch size `B` of the first pass.
    pub batch_size: usize,
    /// Lower bound of the random pause between single-symbol calls.
    pub single_delay_min: Duration,
    /// Upper bound of the random pause between single-symbol calls.
    pub single_delay_max: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            single_delay_min: Duration::from_millis(120),
            single_delay_max: Duration::from_millis(300),
        }
    }
}

impl FetchConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, ValidationError> {
        if batch_size == 0 {
            return Err(ValidationError::ZeroBatchSize);
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Disables the pause between single-symbol calls.
    pub fn without_single_delay(mut self) -> Self {
        self.single_delay_min = Duration::ZERO;
        self.single_delay_max = Duration::ZERO;
        self
    }

    fn single_delay(&self) -> Duration {
        let low = self.single_delay_min.min(self.single_delay_max).as_millis() as u64;
        let high = self.single_delay_min.max(self.single_delay_max).as_millis() as u64;
        Duration::from_millis(fastrand::u64(low..=high))
    }
}

/// Result of one pass: new prices plus the symbols still unpriced, in input order.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub pass: FetchPass,
    pub found: Vec<(Symbol, QuotePoint)>,
    pub still_missing: Vec<Symbol>,
}

impl PassOutcome {
    fn split(pass: FetchPass, misses: Vec<Symbol>, mut quotes: QuoteMap) -> Self {
        let mut found = Vec::with_capacity(quotes.len());
        let mut still_missing = Vec::new();
        for symbol in misses {
            match quotes.remove(&symbol) {
                Some(point) => found.push((symbol, point)),
                None => still_missing.push(symbol),
            }
        }

        Self {
            pass,
            found,
            still_missing,
        }
    }
}

/// Fresh records, unresolved symbols and per-pass counters of one run.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub records: HashMap<Symbol, PriceRecord>,
    pub missing: Vec<Symbol>,
    pub stats: FetchStats,
}

/// Drives the four passes over a [`BulkQuoter`].
#[derive(Debug, Clone)]
pub struct FetchOrchestrator<S> {
    quoter: BulkQuoter<S>,
    config: FetchConfig,
}

impl<S: QuoteSource> FetchOrchestrator<S> {
    pub fn new(quoter: BulkQuoter<S>, config: FetchConfig) -> Self {
        Self { quoter, config }
    }

    pub fn quoter(&self) -> &BulkQuoter<S> {
        &self.quoter
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches `symbols`, stamping every fresh record with `fetched_at`.
    ///
    /// Duplicate symbols are dropped (first appearance wins). A pass with nothing left to
    /// fetch makes no provider calls, and no pass replaces a record an earlier pass produced.
    pub async fn run(&self, symbols: &[Symbol], fetched_at: UtcDateTime) -> FetchReport {
        let requested = dedupe(symbols);
        let mut report = FetchReport {
            records: HashMap::with_capacity(requested.len()),
            missing: requested,
            stats: FetchStats::default(),
        };
        report.stats.requested = report.missing.len();

        for pass in FetchPass::ALL {
            if report.missing.is_empty() {
                tracing::debug!("skipping {} pass: nothing missing", pass.as_str());
                continue;
            }

            let misses = std::mem::take(&mut report.missing);
            let attempted = misses.len();
            let outcome = self.run_pass(pass, misses).await;
            let added = apply(&mut report, outcome, fetched_at);
            tracing::info!(
                "{} pass: {added}/{attempted} priced, {} still missing",
                pass.as_str(),
                report.missing.len()
            );
        }

        report
    }

    async fn run_pass(&self, pass: FetchPass, misses: Vec<Symbol>) -> PassOutcome {
        let quotes = match pass {
            FetchPass::Single => self.fetch_singles(&misses).await,
            _ => {
                let batch_size = pass.batch_size(self.config.batch_size);
                self.quoter.fetch_bulk(&misses, batch_size).await
            }
        };
        PassOutcome::split(pass, misses, quotes)
    }

    async fn fetch_singles(&self, misses: &[Symbol]) -> QuoteMap {
        let mut quotes = QuoteMap::new();
        for (index, symbol) in misses.iter().enumerate() {
            if index > 0 {
                let pause = self.config.single_delay();
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            if let Some(point) = self.quoter.fetch_single(symbol).await {
                quotes.insert(symbol.clone(), point);
            }
        }
        quotes
    }
}

/// Folds one pass into the report. Returns how many records it added.
fn apply(report: &mut FetchReport, outcome: PassOutcome, fetched_at: UtcDateTime) -> usize {
    let source = outcome.pass.source();
    let mut added = 0;
    for (symbol, point) in outcome.found {
        if report.records.contains_key(&symbol) {
            continue;
        }
        report
            .records
            .insert(symbol, PriceRecord::fresh(point, source, fetched_at));
        added += 1;
    }

    report.stats.record_success(source, added);
    report.missing = outcome
        .still_missing
        .into_iter()
        .filter(|symbol| !report.records.contains_key(symbol))
        .collect();
    added
}

/// Drops repeated symbols, keeping first appearance order.
pub fn dedupe(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut seen = HashSet::with_capacity(symbols.len());
    symbols
        .iter()
        .filter(|symbol| seen.insert(*symbol))
        .cloned()
        .collect()
}
