//! # Domain Models
//!
//! Canonical domain types for quotesnap price snapshots.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated provider ticker (`BHP.AX`) |
//! | [`QuotePoint`] | One provider observation (price, currency, market date) |
//! | [`PriceRecord`] | Per-symbol snapshot entry with provenance |
//! | [`PriceSource`] | Which pass (or backfill) produced a record |
//! | [`PriceTable`] | Insertion-ordered symbol → record mapping |
//! | [`Snapshot`] | Persisted snapshot document |
//! | [`FetchStats`] | Per-pass success counters |
//! | [`UtcDateTime`] | UTC timestamp |
//! | [`MarketDate`] | Exchange-local trading date |
//!
//! ## Invariants
//!
//! [`PriceRecord`] is only built through its constructors, so a record without a price is
//! always [`PriceSource::Missing`] and a [`PriceSource::Previous`] record is always stale:
//!
//! ```rust
//! use quotesnap_core::{PriceRecord, PriceSource};
//!
//! let placeholder = PriceRecord::missing("AUD");
//! assert_eq!(placeholder.source(), PriceSource::Missing);
//! assert!(placeholder.price().is_none());
//! ```

mod record;
mod snapshot;
mod symbol;
mod timestamp;

pub use record::{validate_currency_code, PriceRecord, PriceSource, QuotePoint};
pub use snapshot::{FetchStats, PriceTable, Snapshot, SnapshotWindow};
pub use symbol::Symbol;
pub use timestamp::{MarketDate, UtcDateTime};
