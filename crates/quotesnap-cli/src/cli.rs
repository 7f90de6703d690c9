//! CLI argument definitions for quotesnap.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prices` | Fetch a dense price snapshot for the ticker list |
//! | `universe` | Refresh `universe.csv` and the ticker file from the exchange |
//!
//! Every flag also reads a `QUOTESNAP_*` environment variable, so a cron job can be
//! configured without touching the command line.
//!
//! # Examples
//!
//! ```bash
//! # Scheduled run: honours the trading-day and recency gates
//! quotesnap prices --keep-history
//!
//! # Manual rerun
//! quotesnap prices --force --batch-size 100
//!
//! # Refresh the ticker universe
//! quotesnap universe
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quotesnap_core::calendar::parse_time_zone;
use quotesnap_core::config::{
    DEFAULT_HISTORY_DIR, DEFAULT_OUTPUT_FILE, DEFAULT_TICKERS_FILE, DEFAULT_UNIVERSE_FILE,
};
use quotesnap_core::universe::LISTED_COMPANIES_URL;
use quotesnap_core::{FetchConfig, SnapshotConfig, ValidationError};

/// Resilient exchange price snapshots.
#[derive(Debug, Parser)]
#[command(
    name = "quotesnap",
    author,
    version,
    about = "Resilient exchange price snapshots",
    long_about = "quotesnap fetches a dense daily price snapshot for an exchange's ticker list. \
Failed batches are retried with smaller batches and single-symbol calls, and anything still \
missing is backfilled from the previous snapshot.\n\
\n\
Logs go to stderr (RUST_LOG controls verbosity); a JSON run summary goes to stdout."
)]
pub struct Cli {
    /// Pretty-print the JSON summary.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Per-request HTTP timeout in milliseconds.
    #[arg(long, global = true, env = "QUOTESNAP_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch prices for every ticker and write the snapshot.
    ///
    /// Skips (exit 0) outside trading days, outside the session windows when
    /// --require-window is set, and when the current snapshot is still fresh.
    /// --force bypasses all three gates.
    Prices(PricesArgs),

    /// Download the listed-companies file and rewrite the universe and ticker files.
    Universe(UniverseArgs),
}

/// Arguments for the `prices` command.
#[derive(Debug, Args)]
pub struct PricesArgs {
    /// Ticker file, one provider symbol per line.
    #[arg(long, env = "QUOTESNAP_TICKERS", default_value = DEFAULT_TICKERS_FILE)]
    pub tickers: PathBuf,

    /// Snapshot output file.
    #[arg(long, env = "QUOTESNAP_OUT", default_value = DEFAULT_OUTPUT_FILE)]
    pub out: PathBuf,

    /// Directory for dated history snapshots.
    #[arg(long, env = "QUOTESNAP_HISTORY_DIR", default_value = DEFAULT_HISTORY_DIR)]
    pub history_dir: PathBuf,

    /// Also write a dated copy into the history directory and prune old copies.
    #[arg(long, env = "QUOTESNAP_KEEP_HISTORY", default_value_t = false)]
    pub keep_history: bool,

    /// History retention in days.
    #[arg(long, env = "QUOTESNAP_KEEP_DAYS", default_value_t = 45)]
    pub keep_days: u64,

    /// Skip when the current snapshot is younger than this.
    #[arg(long, env = "QUOTESNAP_MAX_AGE_MINUTES", default_value_t = 20)]
    pub max_age_minutes: i64,

    /// Symbols per bulk request in the first pass.
    #[arg(
        long,
        env = "QUOTESNAP_BATCH_SIZE",
        default_value_t = 200,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub batch_size: u32,

    /// Only run inside the mid-session or close windows.
    #[arg(long, env = "QUOTESNAP_REQUIRE_WINDOW", default_value_t = false)]
    pub require_window: bool,

    /// File of exchange holidays, one YYYY-MM-DD per line.
    #[arg(long, env = "QUOTESNAP_HOLIDAYS")]
    pub holidays: Option<PathBuf>,

    /// Run even on non-trading days, outside windows, or with a fresh snapshot.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Maximum number of symbols listed in the snapshot's `missing` field.
    #[arg(long, env = "QUOTESNAP_MISSING_CAP", default_value_t = 500)]
    pub missing_cap: usize,

    /// Currency assumed when the provider reports none.
    #[arg(long, env = "QUOTESNAP_CURRENCY", default_value = "AUD")]
    pub currency: String,

    /// Suffix appended to bare exchange codes.
    #[arg(long, env = "QUOTESNAP_SUFFIX", default_value = ".AX")]
    pub suffix: String,

    /// IANA zone the exchange session is defined in.
    #[arg(long, env = "QUOTESNAP_EXCHANGE_TZ", default_value = "Australia/Sydney")]
    pub exchange_tz: String,

    /// IANA zone used for `asOfLocal`.
    #[arg(long, env = "QUOTESNAP_DISPLAY_TZ", default_value = "Australia/Perth")]
    pub display_tz: String,
}

impl PricesArgs {
    pub fn to_config(&self, timeout_ms: u64) -> Result<SnapshotConfig, ValidationError> {
        let defaults = SnapshotConfig::default();
        Ok(SnapshotConfig {
            tickers_file: self.tickers.clone(),
            output: self.out.clone(),
            history_dir: self.history_dir.clone(),
            keep_history: self.keep_history,
            keep_days: self.keep_days,
            max_age_minutes: self.max_age_minutes,
            missing_cap: self.missing_cap,
            default_currency: quotesnap_core::validate_currency_code(&self.currency)?,
            exchange_suffix: self.suffix.trim().to_ascii_uppercase(),
            exchange_tz: parse_time_zone(&self.exchange_tz)?,
            display_tz: parse_time_zone(&self.display_tz)?,
            http_timeout_ms: timeout_ms,
            fetch: FetchConfig::default().with_batch_size(self.batch_size as usize)?,
            ..defaults
        })
    }
}

/// Arguments for the `universe` command.
#[derive(Debug, Args)]
pub struct UniverseArgs {
    /// Output CSV of listed companies.
    #[arg(long, env = "QUOTESNAP_UNIVERSE_CSV", default_value = DEFAULT_UNIVERSE_FILE)]
    pub out_csv: PathBuf,

    /// Output ticker file.
    #[arg(long, env = "QUOTESNAP_TICKERS", default_value = DEFAULT_TICKERS_FILE)]
    pub out_tickers: PathBuf,

    /// Listed-companies CSV to download.
    #[arg(long, env = "QUOTESNAP_UNIVERSE_URL", default_value = LISTED_COMPANIES_URL)]
    pub url: String,

    /// Suffix appended to exchange codes.
    #[arg(long, env = "QUOTESNAP_SUFFIX", default_value = ".AX")]
    pub suffix: String,

    /// IANA zone used for the extraction timestamp.
    #[arg(long, env = "QUOTESNAP_DISPLAY_TZ", default_value = "Australia/Perth")]
    pub display_tz: String,
}
