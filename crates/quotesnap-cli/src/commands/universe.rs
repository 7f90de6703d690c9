use std::path::PathBuf;

use quotesnap_core::calendar::parse_time_zone;
use quotesnap_core::universe::{fetch_listed_companies, write_tickers_file, write_universe_csv};
use quotesnap_core::{HttpClient, ReqwestHttpClient, UtcDateTime};
use serde::Serialize;

use crate::cli::UniverseArgs;
use crate::error::CliError;

use super::Summary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseSummary {
    extracted_at_utc: UtcDateTime,
    companies: usize,
    universe_csv: PathBuf,
    tickers: PathBuf,
}

pub async fn run(args: &UniverseArgs, timeout_ms: u64) -> Result<Summary, CliError> {
    let display_tz = parse_time_zone(&args.display_tz)?;
    let suffix = args.suffix.trim().to_ascii_uppercase();

    let http_client = ReqwestHttpClient::new()?;
    let companies =
        fetch_listed_companies(&http_client as &dyn HttpClient, &args.url, timeout_ms).await?;

    let now = UtcDateTime::now();
    let universe_csv = write_universe_csv(&companies, &args.out_csv, &suffix, now, display_tz)?;
    let tickers = write_tickers_file(&companies, &args.out_tickers, &suffix, now, display_tz)?;
    tracing::info!(
        "wrote {} and {} ({} companies)",
        universe_csv.display(),
        tickers.display(),
        companies.len()
    );

    Ok(Summary::Universe(UniverseSummary {
        extracted_at_utc: now,
        companies: companies.len(),
        universe_csv,
        tickers,
    }))
}
