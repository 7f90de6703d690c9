use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{MarketDate, UtcDateTime, ValidationError};

/// Where a record's price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Bulk,
    RetryBulk,
    RetryBulkSmall,
    Single,
    Previous,
    Missing,
}

impl PriceSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::RetryBulk => "retry_bulk",
            Self::RetryBulkSmall => "retry_bulk_small",
            Self::Single => "single",
            Self::Previous => "previous",
            Self::Missing => "missing",
        }
    }

    pub const fn is_fresh(self) -> bool {
        matches!(
            self,
            Self::Bulk | Self::RetryBulk | Self::RetryBulkSmall | Self::Single
        )
    }
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider observation: latest close, its currency and exchange-local date.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePoint {
    pub price: f64,
    pub currency: String,
    pub market_date: Option<MarketDate>,
}

impl QuotePoint {
    pub fn new(
        price: f64,
        currency: impl AsRef<str>,
        market_date: Option<MarketDate>,
    ) -> Result<Self, ValidationError> {
        if !price.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "price" });
        }
        if price <= 0.0 {
            return Err(ValidationError::NonPositiveValue { field: "price" });
        }

        Ok(Self {
            price,
            currency: validate_currency_code(currency.as_ref())?,
            market_date,
        })
    }
}

/// Per-symbol entry of a snapshot.
///
/// Constructors keep the record consistent: a record without a price is always
/// `missing`, and a `previous` record is always stale and keeps its original fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    price: Option<f64>,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    market_date: Option<MarketDate>,
    #[serde(default, rename = "fetchedAtUtc", alias = "fetchedAt")]
    fetched_at: Option<UtcDateTime>,
    source: PriceSource,
    #[serde(default)]
    stale: bool,
}

impl PriceRecord {
    /// A record produced by the current run.
    ///
    /// # Panics
    ///
    /// Debug builds assert that `source` is one of the fetch passes.
    pub fn fresh(point: QuotePoint, source: PriceSource, fetched_at: UtcDateTime) -> Self {
        debug_assert!(source.is_fresh(), "fresh records need a fetch-pass source");
        Self {
            price: Some(point.price),
            currency: point.currency,
            market_date: point.market_date,
            fetched_at: Some(fetched_at),
            source,
            stale: false,
        }
    }

    /// Copy of a last-known-good record, marked stale.
    ///
    /// Returns `None` when `previous` carries no price. The original fetch time is kept;
    /// `fallback_fetched_at` only fills records that never had one.
    pub fn backfilled(
        previous: &PriceRecord,
        fallback_fetched_at: Option<UtcDateTime>,
        default_currency: &str,
    ) -> Option<Self> {
        let price = previous.price?;
        let currency = if previous.currency.trim().is_empty() {
            default_currency.to_owned()
        } else {
            previous.currency.clone()
        };

        Some(Self {
            price: Some(price),
            currency,
            market_date: previous.market_date,
            fetched_at: previous.fetched_at.or(fallback_fetched_at),
            source: PriceSource::Previous,
            stale: true,
        })
    }

    /// Placeholder for a symbol with no value at all.
    pub fn missing(currency: impl Into<String>) -> Self {
        Self {
            price: None,
            currency: currency.into(),
            market_date: None,
            fetched_at: None,
            source: PriceSource::Missing,
            stale: false,
        }
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn market_date(&self) -> Option<MarketDate> {
        self.market_date
    }

    pub fn fetched_at(&self) -> Option<UtcDateTime> {
        self.fetched_at
    }

    pub const fn source(&self) -> PriceSource {
        self.source
    }

    pub const fn stale(&self) -> bool {
        self.stale
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}
