//! Merges fresh fetch results with the previous snapshot into a dense price table.

use std::collections::HashMap;

use crate::orchestrator::{dedupe, FetchReport};
use crate::{
    FetchStats, PriceRecord, PriceSource, PriceTable, Snapshot, SnapshotWindow, Symbol,
    UtcDateTime,
};

/// Lookup of the last priced record per symbol.
pub trait LastKnownGood {
    fn last_known_good(&self, symbol: &Symbol) -> Option<&PriceRecord>;

    /// Fetch time to assume for records that never carried one.
    fn fallback_fetched_at(&self) -> Option<UtcDateTime> {
        None
    }
}

impl LastKnownGood for Snapshot {
    fn last_known_good(&self, symbol: &Symbol) -> Option<&PriceRecord> {
        self.prices
            .get(symbol)
            .filter(|record| record.price().is_some())
    }

    fn fallback_fetched_at(&self) -> Option<UtcDateTime> {
        Some(self.as_of_utc)
    }
}

impl<T: LastKnownGood> LastKnownGood for Option<T> {
    fn last_known_good(&self, symbol: &Symbol) -> Option<&PriceRecord> {
        self.as_ref()?.last_known_good(symbol)
    }

    fn fallback_fetched_at(&self) -> Option<UtcDateTime> {
        self.as_ref()?.fallback_fetched_at()
    }
}

/// Dense table plus the tallies the snapshot header reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub prices: PriceTable,
    pub fetched_now: usize,
    pub filled_from_previous: usize,
    pub missing: Vec<Symbol>,
}

/// Builds one record per requested symbol, in input order.
///
/// Fresh records win, then a stale copy of the previous value, then a `missing` placeholder.
pub fn merge(
    symbols: &[Symbol],
    fresh: &HashMap<Symbol, PriceRecord>,
    previous: &impl LastKnownGood,
    default_currency: &str,
) -> MergeOutcome {
    let requested = dedupe(symbols);
    let mut outcome = MergeOutcome {
        prices: PriceTable::with_capacity(requested.len()),
        ..MergeOutcome::default()
    };

    let fallback = previous.fallback_fetched_at();
    for symbol in requested {
        let record = if let Some(record) = fresh.get(&symbol) {
            outcome.fetched_now += 1;
            record.clone()
        } else if let Some(stale) = previous
            .last_known_good(&symbol)
            .and_then(|old| PriceRecord::backfilled(old, fallback, default_currency))
        {
            outcome.filled_from_previous += 1;
            stale
        } else {
            outcome.missing.push(symbol.clone());
            PriceRecord::missing(default_currency)
        };
        outcome.prices.insert(symbol, record);
    }

    outcome
}

/// Header fields of a snapshot document that do not derive from the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    pub dataset: String,
    pub source: String,
    pub as_of_utc: UtcDateTime,
    pub as_of_local: String,
    pub window: SnapshotWindow,
    pub missing_cap: usize,
}

/// Runs the merge and assembles the snapshot document.
pub fn build_snapshot(
    header: SnapshotHeader,
    symbols: &[Symbol],
    report: &FetchReport,
    previous: &impl LastKnownGood,
    default_currency: &str,
) -> Snapshot {
    let merged = merge(symbols, &report.records, previous, default_currency);
    tracing::info!(
        "merged {} symbols: {} fresh, {} from previous, {} missing",
        merged.prices.len(),
        merged.fetched_now,
        merged.filled_from_previous,
        merged.missing.len()
    );

    let stats = FetchStats {
        requested: merged.prices.len(),
        ..report.stats
    };
    let count_missing = merged.missing.len();
    let mut missing = merged.missing;
    missing.truncate(header.missing_cap);

    Snapshot {
        dataset: header.dataset,
        as_of_utc: header.as_of_utc,
        as_of_local: header.as_of_local,
        window: header.window,
        source: header.source,
        count_tickers: merged.prices.len(),
        count_fetched_now: merged.fetched_now,
        count_filled_from_previous: merged.filled_from_previous,
        count_missing,
        missing,
        stats,
        prices: merged.prices,
    }
}

/// Number of records in `table` with the given source.
pub fn count_by_source(table: &PriceTable, source: PriceSource) -> usize {
    table
        .iter()
        .filter(|(_, record)| record.source() == source)
        .count()
}
