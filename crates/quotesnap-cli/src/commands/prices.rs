use std::path::PathBuf;
use std::sync::Arc;

use quotesnap_core::{
    classify_window, local_date, read_tickers, ReqwestHttpClient, SnapshotConfig,
    SnapshotJob, SnapshotStore, SnapshotWindow, TradingCalendar, UtcDateTime, WeekdayCalendar,
    YahooQuoteSource,
};
use serde::Serialize;

use crate::cli::PricesArgs;
use crate::error::CliError;

use super::Summary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesSummary {
    as_of_utc: UtcDateTime,
    window: SnapshotWindow,
    output: PathBuf,
    history: Option<PathBuf>,
    pruned: usize,
    total: usize,
    fresh: usize,
    backfilled: usize,
    missing: usize,
}

pub async fn run(args: &PricesArgs, timeout_ms: u64) -> Result<Summary, CliError> {
    let config = args.to_config(timeout_ms)?;
    let store = config.store();
    let now = UtcDateTime::now();

    if args.force {
        tracing::info!("--force set: skipping trading-day, window and recency gates");
    } else if let Some(reason) = skip_reason(args, &config, &store, now)? {
        tracing::info!("skipping run: {reason}");
        return Ok(Summary::Skipped { reason });
    }

    let symbols = read_tickers(&config.ticker_sources())?;
    tracing::info!("loaded {} tickers", symbols.len());
    let previous = store.previous();

    let http_client = ReqwestHttpClient::new()?;
    let source = YahooQuoteSource::new(Arc::new(http_client), &config.default_currency)
        .with_env_auth()
        .with_timeout_ms(config.http_timeout_ms);
    let job = SnapshotJob::new(source, config);

    let snapshot = job.collect(&symbols, &previous, now).await;
    let written = store.write(&snapshot)?;

    Ok(Summary::Written(PricesSummary {
        as_of_utc: snapshot.as_of_utc,
        window: snapshot.window,
        output: written.output,
        history: written.history,
        pruned: written.pruned.len(),
        total: snapshot.count_tickers,
        fresh: snapshot.count_fetched_now,
        backfilled: snapshot.count_filled_from_previous,
        missing: snapshot.count_missing,
    }))
}

/// Why a scheduled run should not fetch, if it should not.
fn skip_reason(
    args: &PricesArgs,
    config: &SnapshotConfig,
    store: &SnapshotStore,
    now: UtcDateTime,
) -> Result<Option<String>, CliError> {
    let calendar = match &args.holidays {
        Some(path) => WeekdayCalendar::from_file(path)?,
        None => WeekdayCalendar::new(),
    };
    let today = local_date(now, config.exchange_tz);
    if !calendar.is_trading_day(today) {
        return Ok(Some(format!("{today} is not a trading day")));
    }

    if args.require_window && classify_window(now, config.exchange_tz) == SnapshotWindow::Manual {
        return Ok(Some(String::from("outside the mid-session and close windows")));
    }

    if store.is_recent(config.max_age_minutes, now) {
        return Ok(Some(format!(
            "{} is at most {} minutes old",
            store.output().display(),
            config.max_age_minutes
        )));
    }

    Ok(None)
}
