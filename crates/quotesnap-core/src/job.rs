//! One snapshot run: fetch passes, backfill and document assembly.

use crate::backfill::{build_snapshot, LastKnownGood, SnapshotHeader};
use crate::calendar::{classify_window, format_local};
use crate::config::{SnapshotConfig, SNAPSHOT_SOURCE};
use crate::orchestrator::FetchOrchestrator;
use crate::source::{BulkQuoter, QuoteSource};
use crate::{Snapshot, Symbol, UtcDateTime};

/// Wires a [`QuoteSource`] into the fetch and merge stages using one [`SnapshotConfig`].
#[derive(Debug, Clone)]
pub struct SnapshotJob<S> {
    orchestrator: FetchOrchestrator<S>,
    config: SnapshotConfig,
}

impl<S: QuoteSource> SnapshotJob<S> {
    pub fn new(source: S, config: SnapshotConfig) -> Self {
        let quoter = BulkQuoter::new(source, config.retry.clone());
        Self {
            orchestrator: FetchOrchestrator::new(quoter, config.fetch.clone()),
            config,
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator<S> {
        &self.orchestrator
    }

    /// Builds the dense snapshot for `symbols` as of `now`.
    pub async fn collect(
        &self,
        symbols: &[Symbol],
        previous: &impl LastKnownGood,
        now: UtcDateTime,
    ) -> Snapshot {
        let report = self.orchestrator.run(symbols, now).await;
        let header = SnapshotHeader {
            dataset: self.config.dataset.clone(),
            source: SNAPSHOT_SOURCE.to_owned(),
            as_of_utc: now,
            as_of_local: format_local(now, self.config.display_tz),
            window: classify_window(now, self.config.exchange_tz),
            missing_cap: self.config.missing_cap,
        };

        build_snapshot(
            header,
            symbols,
            &report,
            previous,
            &self.config.default_currency,
        )
    }
}
