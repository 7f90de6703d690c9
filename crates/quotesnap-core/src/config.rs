//! Run configuration with the batch job's defaults.

use std::path::PathBuf;

use chrono_tz::Tz;

use crate::calendar::{DEFAULT_DISPLAY_TZ, DEFAULT_EXCHANGE_TZ};
use crate::orchestrator::FetchConfig;
use crate::retry::RetryConfig;
use crate::store::SnapshotStore;
use crate::universe::TickerSources;

pub const DEFAULT_TICKERS_FILE: &str = "asx/tickers_asx.txt";
pub const DEFAULT_OUTPUT_FILE: &str = "asx/prices_latest.json";
pub const DEFAULT_HISTORY_DIR: &str = "asx/history";
pub const DEFAULT_UNIVERSE_FILE: &str = "asx/universe.csv";
pub const DATASET: &str = "asx/prices";
pub const SNAPSHOT_SOURCE: &str = "yahoo_bulk_quote_resilient";

/// Every knob of one `prices` run.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    pub tickers_file: PathBuf,
    pub output: PathBuf,
    pub history_dir: PathBuf,
    pub keep_history: bool,
    pub keep_days: u64,
    pub max_age_minutes: i64,
    pub missing_cap: usize,
    pub dataset: String,
    pub default_currency: String,
    pub exchange_suffix: String,
    pub exchange_tz: Tz,
    pub display_tz: Tz,
    pub http_timeout_ms: u64,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            tickers_file: PathBuf::from(DEFAULT_TICKERS_FILE),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            keep_history: false,
            keep_days: 45,
            max_age_minutes: 20,
            missing_cap: 500,
            dataset: String::from(DATASET),
            default_currency: String::from("AUD"),
            exchange_suffix: String::from(".AX"),
            exchange_tz: DEFAULT_EXCHANGE_TZ,
            display_tz: DEFAULT_DISPLAY_TZ,
            http_timeout_ms: 10_000,
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl SnapshotConfig {
    pub fn ticker_sources(&self) -> TickerSources {
        TickerSources::beside(&self.tickers_file, &self.exchange_suffix)
    }

    pub fn store(&self) -> SnapshotStore {
        let store = SnapshotStore::new(&self.output);
        if self.keep_history {
            store.with_history(&self.history_dir, self.keep_days)
        } else {
            store
        }
    }
}
