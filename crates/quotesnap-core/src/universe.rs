//! Ticker lists and the exchange's listed-company universe.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;

use crate::calendar::format_local;
use crate::http_client::{HttpClient, HttpRequest};
use crate::store::write_atomic;
use crate::{Symbol, UniverseError, UtcDateTime};

pub const LISTED_COMPANIES_URL: &str = "https://www.asx.com.au/asx/research/ASXListedCompanies.csv";

const CODE_COLUMNS: [&str; 5] = ["asx code", "asx code.", "asx", "code", "ticker"];
const NAME_COLUMNS: [&str; 3] = ["company name", "name", "company"];
const SECTOR_COLUMNS: [&str; 2] = ["gics industry group", "gics industry group."];
const INDUSTRY_COLUMNS: [&str; 2] = ["industry group", "industry"];

/// One row of the listed-companies file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedCompany {
    pub code: String,
    pub name: String,
    pub sector: String,
    pub industry: String,
}

/// Upper-cases `code` and strips everything but ASCII letters and digits.
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Provider symbol for an exchange code, e.g. `BHP` or `bhp.ax` → `BHP.AX`.
pub fn yahoo_symbol(code: &str, suffix: &str) -> String {
    let upper = code.trim().to_ascii_uppercase();
    let bare = upper
        .strip_suffix(suffix.to_ascii_uppercase().as_str())
        .unwrap_or(&upper);
    let code = normalize_code(bare);
    if code.is_empty() {
        code
    } else {
        format!("{code}{suffix}")
    }
}

/// Parses the listed-companies CSV, skipping any preamble before the header row.
pub fn parse_listed_companies(text: &str) -> Result<Vec<ListedCompany>, UniverseError> {
    let lines = text.lines().collect::<Vec<_>>();
    let header = lines
        .iter()
        .position(|line| {
            let lower = line.to_ascii_lowercase();
            lower.contains("company name") && lower.contains("asx code") && lower.contains("gics")
        })
        .unwrap_or(0);
    let body = lines[header..].join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let columns = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim().to_ascii_lowercase(), index))
        .collect::<HashMap<_, _>>();
    let find = |candidates: &[&str]| candidates.iter().find_map(|c| columns.get(*c).copied());
    let code_at = find(&CODE_COLUMNS);
    let name_at = find(&NAME_COLUMNS);
    let sector_at = find(&SECTOR_COLUMNS);
    let industry_at = find(&INDUSTRY_COLUMNS);

    let mut companies = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |at: Option<usize>| {
            at.and_then(|i| record.get(i))
                .map(|value| value.trim().to_owned())
                .unwrap_or_default()
        };
        let company = ListedCompany {
            code: normalize_code(&field(code_at)),
            name: field(name_at),
            sector: field(sector_at),
            industry: field(industry_at),
        };
        if !company.code.is_empty() && !company.name.is_empty() {
            companies.push(company);
        }
    }

    Ok(companies)
}

/// Downloads and parses the listed-companies file, sorted by code.
pub async fn fetch_listed_companies(
    http_client: &dyn HttpClient,
    url: &str,
    timeout_ms: u64,
) -> Result<Vec<ListedCompany>, UniverseError> {
    let response = http_client
        .execute(HttpRequest::get(url).with_timeout_ms(timeout_ms))
        .await
        .map_err(|e| UniverseError::Fetch(e.message().to_owned()))?;
    if !response.is_success() {
        return Err(UniverseError::Fetch(format!(
            "{url} returned status {}",
            response.status
        )));
    }

    let mut companies = parse_listed_companies(&response.body)?;
    if companies.is_empty() {
        return Err(UniverseError::Fetch(format!("{url} contained no companies")));
    }
    companies.sort_by(|a, b| a.code.cmp(&b.code));
    tracing::info!("fetched {} listed companies", companies.len());
    Ok(companies)
}

/// Writes `universe.csv` atomically.
pub fn write_universe_csv(
    companies: &[ListedCompany],
    path: &Path,
    suffix: &str,
    extracted_at: UtcDateTime,
    display_tz: Tz,
) -> Result<PathBuf, UniverseError> {
    let extracted_utc = extracted_at.format_rfc3339();
    let extracted_local = format_local(extracted_at, display_tz);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "code",
        "yahoo_symbol",
        "name",
        "sector",
        "industry",
        "last_extracted_utc",
        "last_extracted_local",
    ])?;
    for company in companies {
        writer.write_record([
            company.code.as_str(),
            yahoo_symbol(&company.code, suffix).as_str(),
            company.name.as_str(),
            company.sector.as_str(),
            company.industry.as_str(),
            extracted_utc.as_str(),
            extracted_local.as_str(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| UniverseError::Io {
        path: path.to_path_buf(),
        source: e.into_error(),
    })?;

    Ok(write_atomic(path, &bytes)?)
}

/// Writes the ticker file: comment header then sorted unique provider symbols.
pub fn write_tickers_file(
    companies: &[ListedCompany],
    path: &Path,
    suffix: &str,
    extracted_at: UtcDateTime,
    display_tz: Tz,
) -> Result<PathBuf, UniverseError> {
    let mut symbols = companies
        .iter()
        .map(|company| yahoo_symbol(&company.code, suffix))
        .filter(|symbol| !symbol.is_empty())
        .collect::<Vec<_>>();
    symbols.sort();
    symbols.dedup();

    let mut text = format!(
        "# exchange universe tickers (provider symbols, {suffix})\n\
         # last_extracted_utc: {}\n\
         # last_extracted_local: {}\n\
         # one symbol per line\n",
        extracted_at.format_rfc3339(),
        format_local(extracted_at, display_tz)
    );
    for symbol in &symbols {
        text.push_str(symbol);
        text.push('\n');
    }

    Ok(write_atomic(path, text.as_bytes())?)
}

/// Files the run's symbol list is assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSources {
    pub primary: PathBuf,
    pub extra: Option<PathBuf>,
    pub universe: Option<PathBuf>,
    pub suffix: String,
}

impl TickerSources {
    /// `primary` plus `tickers_extra.txt` and `universe.csv` from the same directory.
    pub fn beside(primary: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        let primary = primary.into();
        let dir = primary.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            extra: Some(dir.join("tickers_extra.txt")),
            universe: Some(dir.join("universe.csv")),
            primary,
            suffix: suffix.into(),
        }
    }

    pub fn only(primary: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            extra: None,
            universe: None,
            suffix: suffix.into(),
        }
    }
}

/// Union of all ticker sources, first appearance wins. Fails when the primary file is
/// absent or the union is empty.
pub fn read_tickers(sources: &TickerSources) -> Result<Vec<Symbol>, UniverseError> {
    let primary = match fs::read_to_string(&sources.primary) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(UniverseError::TickersNotFound(sources.primary.clone()))
        }
        Err(e) => {
            return Err(UniverseError::Io {
                path: sources.primary.clone(),
                source: e,
            })
        }
    };

    let mut candidates = list_lines(&primary);
    if let Some(extra) = &sources.extra {
        if let Ok(text) = fs::read_to_string(extra) {
            candidates.extend(list_lines(&text));
        }
    }
    if let Some(universe) = sources.universe.as_deref().filter(|path| path.exists()) {
        match universe_symbols(universe, &sources.suffix) {
            Ok(symbols) => candidates.extend(symbols),
            Err(error) => tracing::warn!("ignoring {}: {error}", universe.display()),
        }
    }

    let mut seen = HashSet::new();
    let mut symbols = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match Symbol::parse(&candidate) {
            Ok(symbol) => {
                if seen.insert(symbol.clone()) {
                    symbols.push(symbol);
                }
            }
            Err(error) => tracing::warn!("skipping ticker '{candidate}': {error}"),
        }
    }

    if symbols.is_empty() {
        return Err(UniverseError::Empty(sources.primary.clone()));
    }
    Ok(symbols)
}

fn list_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// `yahoo_symbol` column of a universe file, else `code` with the suffix added.
fn universe_symbols(path: &Path, suffix: &str) -> Result<Vec<String>, UniverseError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (column, is_code) = match (position("yahoo_symbol"), position("code")) {
        (Some(at), _) => (at, false),
        (None, Some(at)) => (at, true),
        (None, None) => return Ok(Vec::new()),
    };

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record?;
        let value = record.get(column).unwrap_or_default().trim().to_ascii_uppercase();
        if value.is_empty() || value == "NAN" {
            continue;
        }
        let symbol = if is_code || !value.ends_with(suffix) {
            Symbol::from_exchange_code(&value, suffix)
                .map(|s| s.as_str().to_owned())
                .unwrap_or(value)
        } else {
            value
        };
        symbols.push(symbol);
    }
    Ok(symbols)
}
