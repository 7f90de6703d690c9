//! # Quotesnap Core
//!
//! Resilient price fetching, backfill and snapshot storage for the `quotesnap` batch job.
//!
//! ## Overview
//!
//! A run turns an unreliable bulk quote API into a dense, append-safe price snapshot:
//!
//! - **Quote source contract** with a Yahoo Finance implementation
//! - **Multi-pass fetch orchestrator** that narrows batch size and falls back to single calls
//! - **Backfill merger** that fills gaps from the previous snapshot
//! - **Atomic snapshot store** with a pruned, dated history
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Yahoo) |
//! | [`backfill`] | Merge of fresh records with the last known good values |
//! | [`calendar`] | Trading-day oracle, session windows, local time |
//! | [`config`] | Run configuration and defaults |
//! | [`domain`] | Domain models (Symbol, PriceRecord, Snapshot) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`job`] | One end-to-end snapshot run |
//! | [`orchestrator`] | Multi-pass fetch driver |
//! | [`retry`] | Per-batch retry with backoff and jitter |
//! | [`source`] | Quote source trait and the bulk adapter |
//! | [`store`] | Atomic writes, history and recency |
//! | [`universe`] | Ticker lists and the listed-company universe |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / cron     │
//! └────────┬────────┘
//!          │ symbols
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ FetchOrchestr.  │────▶│ BulkQuoter       │
//! │ (4 passes)      │     │ (chunks + retry) │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       ▼
//!          │              ┌──────────────────┐
//!          │              │ QuoteSource      │
//!          │              │ (Yahoo / double) │
//!          │              └──────────────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Backfill merge  │◀────│ previous snapshot│
//! └────────┬────────┘     └──────────────────┘
//!          ▼
//! ┌─────────────────┐
//! │ SnapshotStore   │
//! │ (tmp + rename)  │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never abort a run; they are classified so the retry loop knows what
//! to do with them:
//!
//! ```rust
//! use quotesnap_core::{SourceError, SourceErrorKind};
//!
//! fn should_retry(error: &SourceError) -> bool {
//!     match error.kind() {
//!         SourceErrorKind::RateLimited | SourceErrorKind::Unavailable => true,
//!         _ => error.retryable(),
//!     }
//! }
//!
//! assert!(should_retry(&SourceError::unavailable("timeout")));
//! assert!(!should_retry(&SourceError::malformed("not json")));
//! ```

pub mod adapters;
pub mod backfill;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod job;
pub mod orchestrator;
pub mod retry;
pub mod source;
pub mod store;
pub mod universe;

// Adapter implementations
pub use adapters::{YahooAuthManager, YahooQuoteSource};

// Backfill
pub use backfill::{build_snapshot, merge, LastKnownGood, MergeOutcome, SnapshotHeader};

// Calendar
pub use calendar::{classify_window, format_local, local_date, TradingCalendar, WeekdayCalendar};

// Configuration
pub use config::SnapshotConfig;

// Domain models
pub use domain::{
    validate_currency_code, FetchStats, MarketDate, PriceRecord, PriceSource, PriceTable,
    QuotePoint, Snapshot, SnapshotWindow, Symbol, UtcDateTime,
};

// Error types
pub use error::{CoreError, StoreError, UniverseError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Run wiring
pub use job::SnapshotJob;

// Fetch pipeline
pub use orchestrator::{FetchConfig, FetchOrchestrator, FetchPass, FetchReport, PassOutcome};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Quote sources
pub use source::{BulkQuoter, QuoteMap, QuoteSource, SourceError, SourceErrorKind};

// Storage
pub use store::{prune_history, write_json_atomic, SnapshotStore, StagedWrite, WriteReport};

// Universe
pub use universe::{read_tickers, ListedCompany, TickerSources};
