//! Behavior-driven tests for ticker lists and the listed-company universe.

use std::fs;
use std::future::Future;
use std::pin::Pin;

use quotesnap_core::calendar::DEFAULT_DISPLAY_TZ;
use quotesnap_core::universe::{
    fetch_listed_companies, write_tickers_file, write_universe_csv, LISTED_COMPANIES_URL,
};
use quotesnap_core::{
    read_tickers, HttpClient, HttpError, HttpRequest, HttpResponse, Symbol, TickerSources,
    UniverseError,
};
use quotesnap_tests::ts;

struct StaticHttpClient {
    response: HttpResponse,
}

impl HttpClient for StaticHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}

const LISTED_CSV: &str = "ASX listed companies as at Tue Jan 02 2024\n\
\n\
Company name,ASX code,GICS industry group\n\
\"WESFARMERS LIMITED\",\"WES\",\"Consumer Discretionary Distribution & Retail\"\n\
\"BHP GROUP LIMITED\",\"BHP\",\"Materials\"\n\
\"1ST GROUP LIMITED\",\"1ST\",\"Health Care Equipment & Services\"\n";

fn names(symbols: &[Symbol]) -> Vec<&str> {
    symbols.iter().map(Symbol::as_str).collect()
}

// =============================================================================
// Ticker lists
// =============================================================================

#[test]
fn tickers_are_the_ordered_union_of_all_sources() {
    // Given: A primary file with comments, an extra file and a universe with bare codes
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("tickers_asx.txt"),
        "# header\nbhp.ax\n\nCBA.AX\nnot a symbol!\nBHP.AX\n",
    )
    .expect("write primary");
    fs::write(dir.path().join("tickers_extra.txt"), "# extras\nXYZ.AX\n").expect("write extra");
    fs::write(
        dir.path().join("universe.csv"),
        "code,name\nCBA,COMMONWEALTH BANK\n1AE,AURORA ENERGY\nnan,\n",
    )
    .expect("write universe");

    // When: The run's ticker list is read
    let sources = TickerSources::beside(dir.path().join("tickers_asx.txt"), ".AX");
    let symbols = read_tickers(&sources).expect("tickers");

    // Then: Symbols are normalized, deduplicated and keep first-appearance order
    assert_eq!(names(&symbols), vec!["BHP.AX", "CBA.AX", "XYZ.AX", "1AE.AX"]);
}

#[test]
fn yahoo_symbol_column_wins_over_code_column() {
    // Given: A universe file carrying both columns
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("tickers_asx.txt"), "BHP.AX\n").expect("write primary");
    fs::write(
        dir.path().join("universe.csv"),
        "code,yahoo_symbol,name\nWES,WES.AX,WESFARMERS\nQAN,QAN,QANTAS\n",
    )
    .expect("write universe");

    // When: The ticker list is read
    let sources = TickerSources::beside(dir.path().join("tickers_asx.txt"), ".AX");
    let symbols = read_tickers(&sources).expect("tickers");

    // Then: Provider symbols are used as-is and bare values still get the suffix
    assert_eq!(names(&symbols), vec!["BHP.AX", "WES.AX", "QAN.AX"]);
}

#[test]
fn missing_ticker_file_is_an_input_error() {
    // Given: No ticker file at all
    let dir = tempfile::tempdir().expect("tempdir");
    let sources = TickerSources::beside(dir.path().join("tickers_asx.txt"), ".AX");

    // When / Then: Reading fails before anything else happens
    assert!(matches!(
        read_tickers(&sources),
        Err(UniverseError::TickersNotFound(_))
    ));
}

#[test]
fn ticker_file_with_only_comments_is_an_input_error() {
    // Given: A ticker file with nothing but comments and no siblings
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tickers_asx.txt");
    fs::write(&path, "# nothing here\n\n").expect("write primary");

    // When / Then: The empty list is rejected
    assert!(matches!(
        read_tickers(&TickerSources::only(&path, ".AX")),
        Err(UniverseError::Empty(_))
    ));
}

// =============================================================================
// Universe refresh
// =============================================================================

#[tokio::test]
async fn universe_refresh_writes_files_the_ticker_reader_accepts() {
    // Given: The exchange serves its listed-companies file with a preamble
    let client = StaticHttpClient {
        response: HttpResponse::ok(LISTED_CSV),
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let csv_path = dir.path().join("universe.csv");
    let tickers_path = dir.path().join("tickers_asx.txt");
    let now = ts("2024-01-02T06:00:00Z");

    // When: The universe is fetched and both files are written
    let companies = fetch_listed_companies(&client, LISTED_COMPANIES_URL, 20_000)
        .await
        .expect("fetch");
    write_universe_csv(&companies, &csv_path, ".AX", now, DEFAULT_DISPLAY_TZ).expect("csv");
    write_tickers_file(&companies, &tickers_path, ".AX", now, DEFAULT_DISPLAY_TZ)
        .expect("tickers");

    // Then: Companies are sorted by code and the CSV has the documented header
    let codes = companies.iter().map(|c| c.code.as_str()).collect::<Vec<_>>();
    assert_eq!(codes, vec!["1ST", "BHP", "WES"]);
    let csv_text = fs::read_to_string(&csv_path).expect("read csv");
    let mut lines = csv_text.lines();
    assert_eq!(
        lines.next(),
        Some("code,yahoo_symbol,name,sector,industry,last_extracted_utc,last_extracted_local")
    );
    assert_eq!(
        lines.next(),
        Some("1ST,1ST.AX,1ST GROUP LIMITED,Health Care Equipment & Services,,2024-01-02T06:00:00Z,2024-01-02 14:00:00 AWST")
    );

    // And: The ticker file starts with comments and round-trips through the reader
    let tickers_text = fs::read_to_string(&tickers_path).expect("read tickers");
    assert!(tickers_text.starts_with("# "));
    assert!(tickers_text.contains("# last_extracted_utc: 2024-01-02T06:00:00Z"));
    let symbols = read_tickers(&TickerSources::beside(&tickers_path, ".AX")).expect("tickers");
    assert_eq!(names(&symbols), vec!["1ST.AX", "BHP.AX", "WES.AX"]);
}

#[tokio::test]
async fn universe_fetch_failure_is_reported() {
    // Given: The exchange answers with a server error
    let client = StaticHttpClient {
        response: HttpResponse::with_status(503, "maintenance"),
    };

    // When / Then: The refresh fails as an upstream error
    let result = fetch_listed_companies(&client, LISTED_COMPANIES_URL, 20_000).await;
    assert!(matches!(result, Err(UniverseError::Fetch(_))));
}
